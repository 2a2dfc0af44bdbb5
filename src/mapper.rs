use chrono::DateTime;
use tracing::warn;

use crate::model::{ApiTrip, Trip};

pub const DEFAULT_IMAGE: &str = "/siwa.jpg";

pub fn format_price(base_price: f64, currency: &str) -> String {
    format!("${base_price} {currency}")
}

/// `M/D/YYYY` of an ISO-8601 timestamp; the raw value when it does not parse.
pub fn format_departure(iso: &str) -> String {
    match DateTime::parse_from_rfc3339(iso) {
        Ok(dt) => dt.format("%-m/%-d/%Y").to_string(),
        Err(e) => {
            warn!(value = iso, error = %e, "departure time is not ISO-8601");
            iso.to_string()
        }
    }
}

pub fn map_trip(trip: ApiTrip) -> Trip {
    Trip {
        departure: format_departure(&trip.departure_time),
        price: format_price(trip.base_price, &trip.currency),
        image: DEFAULT_IMAGE.to_string(),
        id: trip.id,
        from: trip.origin,
        to: trip.destination,
        departure_time: Some(trip.departure_time),
        available_seats: trip.available_seats,
        flight_number: trip.flight_number,
        seat_map: trip.seat_map,
        base_price: trip.base_price,
        currency: trip.currency,
    }
}

/// Upstream order is kept; nothing is filtered or sorted.
pub fn map_trips(trips: Vec<ApiTrip>) -> Vec<Trip> {
    trips.into_iter().map(map_trip).collect()
}
