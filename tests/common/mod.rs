#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tripbook::api::{BillingDetails, BookingReceipt, BookingRequest, PaymentIntent, TripApi};
use tripbook::error::BookingError;
use tripbook::model::{ApiTrip, Seat, Trip};
use tripbook::prompt::{Notice, Prompter};
use tripbook::query::TripQuery;
use tripbook::storage::{MemoryStore, SessionTokenStore, SharedStore};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Search(TripQuery),
    Book(BookingRequest),
    Intent(String, BillingDetails),
    Cancel(String),
}

/// In-memory trip API recording every call.
pub struct FakeApi {
    pub calls: Mutex<Vec<Call>>,
    pub trips: Mutex<Result<Vec<ApiTrip>, BookingError>>,
    pub booking: Mutex<Result<BookingReceipt, BookingError>>,
    pub intent: Mutex<Result<PaymentIntent, BookingError>>,
    pub cancel: Mutex<Result<(), BookingError>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            trips: Mutex::new(Ok(Vec::new())),
            booking: Mutex::new(Ok(BookingReceipt {
                id: "bk-1".into(),
                status: Some("PENDING".into()),
            })),
            intent: Mutex::new(Ok(PaymentIntent {
                redirect_url: Some("https://pay/x".into()),
            })),
            cancel: Mutex::new(Ok(())),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_trips(self, trips: Vec<ApiTrip>) -> Self {
        *self.trips.lock().unwrap() = Ok(trips);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Cancel(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn searches(&self) -> Vec<TripQuery> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Search(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TripApi for FakeApi {
    async fn search_trips(&self, query: &TripQuery) -> Result<Vec<ApiTrip>, BookingError> {
        self.record(Call::Search(query.clone()));
        self.trips.lock().unwrap().clone()
    }

    async fn create_booking(
        &self,
        _token: &str,
        request: &BookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        self.record(Call::Book(request.clone()));
        self.booking.lock().unwrap().clone()
    }

    async fn create_payment_intent(
        &self,
        _token: &str,
        booking_id: &str,
        billing: &BillingDetails,
    ) -> Result<PaymentIntent, BookingError> {
        self.record(Call::Intent(booking_id.to_string(), billing.clone()));
        self.intent.lock().unwrap().clone()
    }

    async fn cancel_booking(&self, _token: &str, booking_id: &str) -> Result<(), BookingError> {
        self.record(Call::Cancel(booking_id.to_string()));
        self.cancel.lock().unwrap().clone()
    }
}

/// Answers confirmations from a script (declining once it runs out) and keeps every notice.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    pub questions: Mutex<Vec<String>>,
    pub notices: Mutex<Vec<(Notice, String)>>,
}

impl ScriptedPrompter {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<(Notice, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn saw(&self, level: Notice, needle: &str) -> bool {
        self.notices()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str) -> bool {
        self.questions.lock().unwrap().push(message.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }

    fn notify(&self, level: Notice, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

pub fn api_trip(id: &str, from: &str, to: &str) -> ApiTrip {
    ApiTrip {
        id: Some(id.to_string()),
        origin: from.to_string(),
        destination: to.to_string(),
        departure_time: "2026-11-03T09:30:00.000Z".to_string(),
        available_seats: 30,
        flight_number: "GA101".to_string(),
        base_price: 120.0,
        currency: "USD".to_string(),
        seat_map: None,
    }
}

pub fn trip(id: &str, from: &str, to: &str) -> Trip {
    tripbook::mapper::map_trip(api_trip(id, from, to))
}

/// Deterministic 4-seat map: 1A and 1B free, 1C taken, 1D free.
pub fn seats() -> Vec<Seat> {
    [("1A", true), ("1B", true), ("1C", false), ("1D", true)]
        .into_iter()
        .map(|(label, available)| Seat {
            id: format!("s-{label}"),
            seat_number: label.to_string(),
            is_available: available,
            is_selected: false,
        })
        .collect()
}

pub fn store() -> SharedStore {
    MemoryStore::shared()
}

pub fn signed_in_store() -> SharedStore {
    let store = MemoryStore::shared();
    SessionTokenStore::new(Arc::clone(&store))
        .set_token("tok-123")
        .unwrap();
    store
}
