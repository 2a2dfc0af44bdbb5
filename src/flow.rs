//! Booking flow for a single trip: seat selection and passenger details, the sign-in
//! gate, booking creation, payment intent, payment confirmation or abandonment.
//!
//! ```text
//! SelectingSeatsAndDetails ──submit──▶ Submitting ──▶ AwaitingPayment ──complete──▶ Confirmed
//!        │ (no token: draft saved)          │ (booking failed)   │ back / close
//!        ▼                                  ▼                    ▼
//!      Closed                  SelectingSeatsAndDetails       Cancelling ──▶ SelectingSeatsAndDetails | Closed
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{BillingDetails, BookingRequest, TripApi};
use crate::error::BookingError;
use crate::model::{BookingDetails, Seat, Trip};
use crate::passenger::PassengerForm;
use crate::prompt::Prompter;
use crate::seatmap;
use crate::storage::{DraftBooking, DraftBookingStore, SearchParams, SessionTokenStore, SharedStore};

pub const CANCEL_ON_BACK: &str =
    "Going back will cancel your current booking. Are you sure you want to continue?";

#[derive(Debug, Clone, PartialEq)]
pub struct FlowOptions {
    pub sign_in_url: String,
    pub billing_city: String,
    pub billing_country: String,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            sign_in_url: "/signin".to_string(),
            billing_city: "Cairo".to_string(),
            billing_country: "EG".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    SelectingSeatsAndDetails,
    Submitting,
    /// `redirect_url` is `None` when the booking exists but no payment intent was obtained.
    AwaitingPayment { redirect_url: Option<String> },
    Cancelling,
    Confirmed(BookingDetails),
    Closed,
}

impl FlowState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SelectingSeatsAndDetails => "selecting seats and details",
            Self::Submitting => "submitting",
            Self::AwaitingPayment { .. } => "awaiting payment",
            Self::Cancelling => "cancelling",
            Self::Confirmed(_) => "confirmed",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// No session token: the draft was saved and the flow closed.
    SignInRequired { sign_in_url: String },
    AwaitingPayment { booking_id: String, redirect_url: String },
    /// The booking was accepted without a payment step.
    Booked { booking_id: String },
}

/// First token of the name, and the rest; a single-token name fills both.
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split(' ');
    let first = parts.next().filter(|p| !p.is_empty()).unwrap_or(name);
    let rest = parts.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() { name } else { rest.as_str() };
    (first.to_string(), last.to_string())
}

pub struct BookingFlow {
    trip: Trip,
    seats: Vec<Seat>,
    selected: Vec<String>,
    form: PassengerForm,
    state: FlowState,
    current_booking_id: Option<String>,
    validation_error: Option<String>,
    search_params: Option<SearchParams>,
    api: Arc<dyn TripApi>,
    tokens: SessionTokenStore,
    drafts: DraftBookingStore,
    options: FlowOptions,
    on_close: Option<Box<dyn FnMut() + Send>>,
}

impl BookingFlow {
    pub fn new(trip: Trip, api: Arc<dyn TripApi>, store: SharedStore, options: FlowOptions) -> Self {
        let seats = seatmap::build(trip.seat_map.as_deref(), &mut rand::rng());
        info!(trip = %trip.key(), seats = seats.len(), "booking flow opened");

        Self {
            trip,
            seats,
            selected: Vec::new(),
            form: PassengerForm::new(),
            state: FlowState::SelectingSeatsAndDetails,
            current_booking_id: None,
            validation_error: None,
            search_params: None,
            api,
            tokens: SessionTokenStore::new(Arc::clone(&store)),
            drafts: DraftBookingStore::new(store),
            options,
            on_close: None,
        }
    }

    pub fn with_search_params(mut self, params: SearchParams) -> Self {
        self.search_params = Some(params);
        self
    }

    pub fn on_close(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn selected_seats(&self) -> &[String] {
        &self.selected
    }

    pub fn form(&self) -> &PassengerForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut PassengerForm {
        &mut self.form
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn current_booking_id(&self) -> Option<&str> {
        self.current_booking_id.as_deref()
    }

    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn payment_url(&self) -> Option<&str> {
        match &self.state {
            FlowState::AwaitingPayment { redirect_url } => redirect_url.as_deref(),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FlowState::Submitting | FlowState::Cancelling)
    }

    pub fn total_amount(&self) -> f64 {
        self.form.total_amount(self.trip.base_price)
    }

    /// Replaces the trip and rebuilds its seat map from scratch.
    pub fn set_trip(&mut self, trip: Trip) {
        self.seats = seatmap::build(trip.seat_map.as_deref(), &mut rand::rng());
        self.trip = trip;
        self.sync_seat_flags();
    }

    /// Replaces the seat map; used when the caller controls seat synthesis.
    pub fn set_seats(&mut self, seats: Vec<Seat>) {
        self.seats = seats;
        self.sync_seat_flags();
    }

    /// Resolves a seat label ("3B") or id to the seat id.
    pub fn seat_id_for(&self, label_or_id: &str) -> Option<&str> {
        self.seats
            .iter()
            .find(|s| s.id == label_or_id || s.seat_number.eq_ignore_ascii_case(label_or_id))
            .map(|s| s.id.as_str())
    }

    /// Rebuilds the passenger list; see [`PassengerForm::resize`].
    pub fn set_adults(&mut self, adults: u32) {
        self.form.resize(adults);
    }

    pub fn set_infants(&mut self, infants: u32) {
        self.form.set_infants(infants);
    }

    /// Deselects a chosen seat, or selects an available one while fewer seats than
    /// adults are chosen. Anything else is ignored. Returns whether the selection changed.
    pub fn toggle_seat(&mut self, seat_id: &str) -> bool {
        if self.state != FlowState::SelectingSeatsAndDetails {
            return false;
        }

        if let Some(pos) = self.selected.iter().position(|id| id == seat_id) {
            self.selected.remove(pos);
            self.sync_seat_flags();
            return true;
        }

        let available = self
            .seats
            .iter()
            .any(|s| s.id == seat_id && s.is_available);
        if !available || self.selected.len() >= self.form.number_of_adults() as usize {
            return false;
        }

        self.selected.push(seat_id.to_string());
        self.sync_seat_flags();
        true
    }

    /// Puts a stored draft's fields back in place.
    pub fn restore(&mut self, draft: &DraftBooking) {
        self.form.restore(
            &draft.booker_name,
            &draft.booker_email,
            &draft.booker_phone,
            draft.number_of_adults,
            draft.number_of_infants,
            draft.passengers.clone(),
        );
        self.selected = draft.selected_seats.clone();
        if draft.search_params.is_some() {
            self.search_params = draft.search_params.clone();
        }
        self.sync_seat_flags();
        info!(trip = %self.trip.key(), "draft restored");
    }

    /// Snapshot of the working set, stamped now, reopen flag unset.
    pub fn draft(&self) -> DraftBooking {
        DraftBooking {
            trip_data: Some(self.trip.clone()),
            booker_name: self.form.booker_name.clone(),
            booker_email: self.form.booker_email.clone(),
            booker_phone: self.form.booker_phone().to_string(),
            number_of_adults: self.form.number_of_adults(),
            number_of_infants: self.form.number_of_infants(),
            passengers: self.form.passengers().to_vec(),
            selected_seats: self.selected.clone(),
            total_amount: self.total_amount(),
            from: self.trip.from.clone(),
            to: self.trip.to.clone(),
            search_params: self.search_params.clone(),
            should_reopen_modal: false,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub async fn submit(&mut self) -> Result<Submission, BookingError> {
        match self.state {
            FlowState::SelectingSeatsAndDetails => {}
            FlowState::Submitting => {
                return Err(BookingError::InvalidState(
                    "a booking request is already in progress".into(),
                ))
            }
            ref other => {
                return Err(BookingError::InvalidState(format!(
                    "cannot submit a booking while {}",
                    other.label()
                )))
            }
        }

        if let Err(e) = self.form.validate(self.selected.len()) {
            self.validation_error = Some(e.to_string());
            return Err(e);
        }
        self.validation_error = None;

        let Some(token) = self.tokens.token() else {
            self.drafts.save(&self.draft())?;
            info!(trip = %self.trip.key(), "sign-in required, draft saved");
            self.finish_close();
            return Ok(Submission::SignInRequired {
                sign_in_url: self.options.sign_in_url.clone(),
            });
        };

        self.state = FlowState::Submitting;

        let request = BookingRequest {
            trip_id: self.trip.id.clone(),
            seat_ids: self.selected.clone(),
            passengers: self.form.passengers().to_vec(),
        };
        let receipt = match self.api.create_booking(&token, &request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, "booking creation failed");
                self.state = FlowState::SelectingSeatsAndDetails;
                return Err(e);
            }
        };
        info!(booking_id = %receipt.id, "booking created");
        self.current_booking_id = Some(receipt.id.clone());

        let billing = self.billing_details();
        let intent = match self
            .api
            .create_payment_intent(&token, &receipt.id, &billing)
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                warn!(booking_id = %receipt.id, error = %e, "payment intent failed, booking left unpaid");
                self.state = FlowState::AwaitingPayment { redirect_url: None };
                return Err(e);
            }
        };

        if let Err(e) = self.drafts.clear() {
            warn!(error = %e, "cannot clear draft booking");
        }

        match intent.redirect_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                info!(booking_id = %receipt.id, "awaiting payment");
                self.state = FlowState::AwaitingPayment {
                    redirect_url: Some(url.clone()),
                };
                Ok(Submission::AwaitingPayment {
                    booking_id: receipt.id,
                    redirect_url: url,
                })
            }
            None => {
                info!(booking_id = %receipt.id, "booked without payment step");
                self.finish_close();
                Ok(Submission::Booked {
                    booking_id: receipt.id,
                })
            }
        }
    }

    /// Leaves the payment step for the booking form. When a booking is held the user
    /// must confirm first, then its cancellation is requested; the outcome of that
    /// request is logged and does not affect the transition. Returns `false` when the
    /// user declined.
    pub async fn go_back(&mut self, prompter: &dyn Prompter) -> Result<bool, BookingError> {
        if !matches!(self.state, FlowState::AwaitingPayment { .. }) {
            return Err(BookingError::InvalidState(format!(
                "nothing to go back from while {}",
                self.state.label()
            )));
        }

        let Some(booking_id) = self.current_booking_id.clone() else {
            self.state = FlowState::SelectingSeatsAndDetails;
            return Ok(true);
        };

        if !prompter.confirm(CANCEL_ON_BACK) {
            return Ok(false);
        }

        self.state = FlowState::Cancelling;
        match self.tokens.token() {
            Some(token) => cancel(self.api.as_ref(), &token, &booking_id).await,
            None => warn!(booking_id = %booking_id, "no session token, booking not cancelled"),
        }

        self.current_booking_id = None;
        self.state = FlowState::SelectingSeatsAndDetails;
        Ok(true)
    }

    /// The payment surface reported success.
    pub fn complete_payment(&mut self) -> Result<BookingDetails, BookingError> {
        if !matches!(self.state, FlowState::AwaitingPayment { redirect_url: Some(_) }) {
            return Err(BookingError::InvalidState(format!(
                "no payment in progress while {}",
                self.state.label()
            )));
        }

        let booking_id = self.current_booking_id.take().unwrap_or_default();
        let details = self.booking_details(booking_id);

        if let Err(e) = self.drafts.clear() {
            warn!(error = %e, "cannot clear draft booking");
        }

        info!(booking_id = %details.booking_id, "payment completed");
        self.state = FlowState::Confirmed(details.clone());
        Ok(details)
    }

    /// Closes the flow from any state. A booking held at the payment step gets a
    /// fire-and-forget cancellation; the returned handle lets callers wait for it.
    pub fn close(&mut self) -> Option<JoinHandle<()>> {
        if self.state == FlowState::Closed {
            return None;
        }

        let pending = match (&self.state, self.current_booking_id.take()) {
            (FlowState::AwaitingPayment { .. }, Some(booking_id)) => self.spawn_cancel(booking_id),
            _ => None,
        };

        self.finish_close();
        pending
    }

    fn finish_close(&mut self) {
        self.current_booking_id = None;
        self.validation_error = None;
        self.state = FlowState::Closed;
        if let Some(callback) = self.on_close.as_mut() {
            callback();
        }
    }

    fn spawn_cancel(&self, booking_id: String) -> Option<JoinHandle<()>> {
        let Some(token) = self.tokens.token() else {
            warn!(booking_id = %booking_id, "no session token, booking not cancelled");
            return None;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(booking_id = %booking_id, error = %e, "no runtime, booking not cancelled");
                return None;
            }
        };

        let api = Arc::clone(&self.api);
        Some(runtime.spawn(async move {
            cancel(api.as_ref(), &token, &booking_id).await;
        }))
    }

    fn billing_details(&self) -> BillingDetails {
        let (first_name, last_name) = split_name(&self.form.booker_name);
        BillingDetails {
            first_name,
            last_name,
            email: self.form.booker_email.clone(),
            phone: self.form.booker_phone().to_string(),
            city: self.options.billing_city.clone(),
            country: self.options.billing_country.clone(),
        }
    }

    fn booking_details(&self, booking_id: String) -> BookingDetails {
        let selected_seats = self
            .selected
            .iter()
            .map(|id| {
                self.seats
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.seat_number.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect();

        BookingDetails {
            booking_id,
            trip_id: self.trip.id.clone(),
            from: self.trip.from.clone(),
            to: self.trip.to.clone(),
            departure: self
                .trip
                .departure_time
                .clone()
                .unwrap_or_else(|| self.trip.departure.clone()),
            flight_number: self.trip.flight_number.clone(),
            price: self.trip.price.clone(),
            selected_seats,
            passengers: self
                .form
                .passengers()
                .iter()
                .filter(|p| !p.name.trim().is_empty())
                .cloned()
                .collect(),
            booker_name: self.form.booker_name.clone(),
            booker_email: self.form.booker_email.clone(),
            booker_phone: self.form.booker_phone().to_string(),
            total_amount: self.total_amount(),
            currency: self.trip.currency.clone(),
        }
    }

    fn sync_seat_flags(&mut self) {
        for seat in &mut self.seats {
            seat.is_selected = self.selected.contains(&seat.id);
        }
    }
}

async fn cancel(api: &dyn TripApi, token: &str, booking_id: &str) {
    match api.cancel_booking(token, booking_id).await {
        Ok(()) => info!(booking_id, "booking cancelled"),
        Err(e) => warn!(booking_id, error = %e, "booking cancellation failed"),
    }
}
