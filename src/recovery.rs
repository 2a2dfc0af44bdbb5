//! Picks an interrupted booking back up after the sign-in redirect.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::TripApi;
use crate::error::BookingError;
use crate::mapper::{self, DEFAULT_IMAGE};
use crate::model::Trip;
use crate::passenger::DEFAULT_BASE_PRICE;
use crate::prompt::{Notice, Prompter};
use crate::query::TripQuery;
use crate::storage::{DraftBooking, DraftBookingStore, SessionTokenStore, SharedStore};

pub const FALLBACK_SEATS: u32 = 10;
pub const FALLBACK_FLIGHT_NUMBER: &str = "TEMP001";
pub const FALLBACK_CURRENCY: &str = "USD";

pub const DISCARD_STALE_DRAFT: &str =
    "You have a pending booking for a different trip. Would you like to clear it and start fresh?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPath {
    /// The trip was already among the current results.
    ExactMatch,
    /// Found by a fresh search; `exact` is false when only the route matched.
    AutoSearch { exact: bool },
    /// Rebuilt from the stored trip data without checking it against the API.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// No draft, or nothing asks for it to be resumed yet.
    Idle,
    /// The draft was older than a day and has been discarded.
    Expired,
    /// Reopen the booking flow for `trip` and restore `draft` into it. `results` holds
    /// the trips of an automatic re-search, when one ran.
    Reopen {
        trip: Trip,
        draft: DraftBooking,
        path: RecoveryPath,
        results: Option<Vec<Trip>>,
    },
    /// Nothing left to rebuild a trip from; the draft has been discarded.
    Unrecoverable,
}

pub struct RecoveryCoordinator {
    api: Arc<dyn TripApi>,
    tokens: SessionTokenStore,
    drafts: DraftBookingStore,
}

impl RecoveryCoordinator {
    pub fn new(api: Arc<dyn TripApi>, store: SharedStore) -> Self {
        Self {
            api,
            tokens: SessionTokenStore::new(Arc::clone(&store)),
            drafts: DraftBookingStore::new(store),
        }
    }

    /// Runs once search results are available after a (re)load.
    pub async fn recover(&self, results: &[Trip], prompter: &dyn Prompter) -> Recovery {
        let Some(mut draft) = self.drafts.load() else {
            return Recovery::Idle;
        };

        if draft.is_stale() {
            self.discard();
            prompter.notify(Notice::Error, "Booking session expired. Please search again.");
            return Recovery::Expired;
        }

        if self.tokens.token().is_none() || !draft.should_reopen_modal {
            return Recovery::Idle;
        }

        if let Some(trip) = results.iter().find(|t| {
            t.same_route(&draft.from, &draft.to) && t.id.as_deref() == draft.trip_id()
        }) {
            info!(trip = %trip.key(), "draft matches a current result");
            return self.reopen(trip.clone(), &mut draft, RecoveryPath::ExactMatch, None);
        }

        if let Some(query) = auto_search_query(&draft) {
            prompter.notify(Notice::Info, "Searching for your trip...");
            match self.auto_search(&query, &draft).await {
                Ok((trip, exact, found)) => {
                    prompter.notify(Notice::Success, "Found your trips! Opening booking...");
                    if !exact && found.iter().any(|t| t.same_route(&query.from, &query.to)) {
                        prompter.notify(
                            Notice::Warning,
                            "Similar trip found. Please verify the details match your needs.",
                        );
                    }
                    return self.reopen(
                        trip,
                        &mut draft,
                        RecoveryPath::AutoSearch { exact },
                        Some(found),
                    );
                }
                Err(e) => warn!(error = %e, "auto-search failed, using stored trip data"),
            }
        }

        match placeholder_trip(&draft) {
            Some(trip) => {
                prompter.notify(Notice::Info, "Restoring your trip data...");
                let recovery = self.reopen(trip, &mut draft, RecoveryPath::Fallback, None);
                prompter.notify(
                    Notice::Warning,
                    "Your trip data has been restored. Please verify and continue booking.",
                );
                recovery
            }
            None => {
                self.discard();
                prompter.notify(
                    Notice::Error,
                    "Unable to restore trip data. Please search for your trip again.",
                );
                Recovery::Unrecoverable
            }
        }
    }

    /// Offers to drop a draft for a route that none of `results` serve. Drafts waiting
    /// to be reopened are left alone. Returns whether the draft was cleared.
    pub fn check_stale_draft(&self, results: &[Trip], prompter: &dyn Prompter) -> bool {
        if results.is_empty() {
            return false;
        }
        let Some(draft) = self.drafts.load() else {
            return false;
        };
        if draft.should_reopen_modal || results.iter().any(|t| t.same_route(&draft.from, &draft.to)) {
            return false;
        }

        if !prompter.confirm(DISCARD_STALE_DRAFT) {
            return false;
        }

        self.discard();
        prompter.notify(
            Notice::Success,
            "Previous booking cleared. You can start a new booking.",
        );
        true
    }

    async fn auto_search(
        &self,
        query: &TripQuery,
        draft: &DraftBooking,
    ) -> Result<(Trip, bool, Vec<Trip>), BookingError> {
        let found = mapper::map_trips(self.api.search_trips(query).await?);
        if found.is_empty() {
            return Err(BookingError::NoResults);
        }

        let exact = draft
            .trip_id()
            .and_then(|id| found.iter().find(|t| t.id.as_deref() == Some(id)));
        let is_exact = exact.is_some();
        let target = match exact {
            Some(trip) => trip,
            None => found
                .iter()
                .find(|t| t.same_route(&query.from, &query.to))
                .unwrap_or(&found[0]),
        }
        .clone();

        Ok((target, is_exact, found))
    }

    fn reopen(
        &self,
        trip: Trip,
        draft: &mut DraftBooking,
        path: RecoveryPath,
        results: Option<Vec<Trip>>,
    ) -> Recovery {
        draft.should_reopen_modal = false;
        if let Err(e) = self.drafts.save(draft) {
            warn!(error = %e, "cannot clear reopen flag on draft");
        }
        info!(trip = %trip.key(), ?path, "reopening booking");
        Recovery::Reopen {
            trip,
            draft: draft.clone(),
            path,
            results,
        }
    }

    fn discard(&self) {
        if let Err(e) = self.drafts.clear() {
            warn!(error = %e, "cannot remove draft booking");
        }
    }
}

fn parse_departure(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Search for the draft's trip, from explicit search params or from its route.
pub fn auto_search_query(draft: &DraftBooking) -> Option<TripQuery> {
    let (from, to, departure) = match &draft.search_params {
        Some(params) => (params.from.as_str(), params.to.as_str(), params.departure.clone()),
        None if !draft.from.is_empty() && !draft.to.is_empty() => (
            draft.from.as_str(),
            draft.to.as_str(),
            draft.trip_data.as_ref().and_then(|t| t.departure_time.clone()),
        ),
        None => return None,
    };

    let departure = departure
        .as_deref()
        .and_then(parse_departure)
        .unwrap_or_else(Utc::now);

    Some(TripQuery::auto_search(from, to, departure))
}

/// Stand-in trip built from whatever the draft kept, with defaults for the rest.
pub fn placeholder_trip(draft: &DraftBooking) -> Option<Trip> {
    let original = draft.trip_data.as_ref();
    if original.is_none() && draft.from.is_empty() {
        return None;
    }

    let departure_time = original.and_then(|t| t.departure_time.clone());
    let departure = match departure_time.as_deref() {
        Some(iso) => mapper::format_departure(iso),
        None => Utc::now().format("%-m/%-d/%Y").to_string(),
    };

    let base_price = original
        .map(|t| t.base_price)
        .filter(|p| *p > 0.0)
        .unwrap_or(DEFAULT_BASE_PRICE);
    let currency = original
        .map(|t| t.currency.clone())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| FALLBACK_CURRENCY.to_string());

    let id = original
        .and_then(|t| t.id.clone())
        .unwrap_or_else(|| format!("temp-{}", Utc::now().timestamp_millis()));

    let (from, to) = if draft.from.is_empty() {
        original
            .map(|t| (t.from.clone(), t.to.clone()))
            .unwrap_or_default()
    } else {
        (draft.from.clone(), draft.to.clone())
    };

    Some(Trip {
        id: Some(id),
        from,
        to,
        departure,
        departure_time,
        available_seats: original
            .map(|t| t.available_seats)
            .filter(|n| *n > 0)
            .unwrap_or(FALLBACK_SEATS),
        flight_number: original
            .map(|t| t.flight_number.clone())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| FALLBACK_FLIGHT_NUMBER.to_string()),
        price: mapper::format_price(base_price, &currency),
        image: DEFAULT_IMAGE.to_string(),
        seat_map: original.and_then(|t| t.seat_map.clone()),
        base_price,
        currency,
    })
}
