use chrono::{TimeZone, Utc};
use tripbook::error::BookingError;
use tripbook::query::TripQuery;

fn make_valid_query() -> TripQuery {
    TripQuery::new("Siwa", "Cairo")
        .with_departure_days("2026-03-01", Some("2026-03-04"))
        .unwrap()
}

#[test]
fn valid_query_passes() {
    assert!(make_valid_query().validate().is_ok());
}

#[test]
fn route_only_query_passes() {
    assert!(TripQuery::new("Siwa", "Cairo").validate().is_ok());
}

#[test]
fn rejects_empty_origin() {
    let mut q = make_valid_query();
    q.from = "  ".into();
    assert!(matches!(q.validate(), Err(BookingError::Validation(_))));
}

#[test]
fn rejects_empty_destination() {
    let mut q = make_valid_query();
    q.to.clear();
    assert!(matches!(q.validate(), Err(BookingError::Validation(_))));
}

#[test]
fn rejects_malformed_timestamp() {
    let mut q = make_valid_query();
    q.arrival_from = Some("2026-03-01".into());
    assert!(matches!(q.validate(), Err(BookingError::InvalidDate(_))));
}

#[test]
fn rejects_invalid_date_format() {
    let err = TripQuery::new("Siwa", "Cairo")
        .with_departure_days("03-01-2026", None)
        .unwrap_err();
    assert_eq!(err, BookingError::InvalidDate("03-01-2026".into()));
}

#[test]
fn rejects_invalid_month() {
    assert!(TripQuery::new("Siwa", "Cairo")
        .with_departure_days("2026-13-01", None)
        .is_err());
}

#[test]
fn rejects_window_ending_before_start() {
    let err = TripQuery::new("Siwa", "Cairo")
        .with_departure_days("2026-03-04", Some("2026-03-01"))
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

#[test]
fn window_covers_whole_days() {
    let q = make_valid_query();
    assert_eq!(q.departure_from.as_deref(), Some("2026-03-01T00:00:00.000Z"));
    assert_eq!(q.departure_to.as_deref(), Some("2026-03-04T23:59:59.000Z"));
    assert_eq!(q.arrival_from, None);
}

#[test]
fn url_params_in_order() {
    let mut q = make_valid_query();
    q.offset = 20;
    let params = q.to_url_params();
    let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["from", "to", "departureFrom", "departureTo", "offset"]);
    assert_eq!(params[4].1, "20");
}

#[test]
fn route_only_params_skip_dates() {
    let params = TripQuery::new("Siwa", "Cairo").to_url_params();
    assert_eq!(
        params,
        vec![
            ("from".to_string(), "Siwa".to_string()),
            ("to".to_string(), "Cairo".to_string()),
            ("offset".to_string(), "0".to_string()),
        ]
    );
}

#[test]
fn auto_search_crosses_month_end() {
    let departure = Utc.with_ymd_and_hms(2026, 1, 28, 23, 10, 0).unwrap();
    let q = TripQuery::auto_search("Siwa", "Cairo", departure);
    assert_eq!(q.departure_from.as_deref(), Some("2026-01-28T00:00:00.000Z"));
    assert_eq!(q.departure_to.as_deref(), Some("2026-02-04T23:59:59.000Z"));
    assert_eq!(q.arrival_from.as_deref(), Some("2026-01-29T00:00:00.000Z"));
    assert_eq!(q.arrival_to.as_deref(), Some("2026-02-07T00:00:00.000Z"));
    assert!(q.validate().is_ok());
}

#[test]
fn arrival_window_is_independent() {
    let q = TripQuery::new("Siwa", "Cairo")
        .with_arrival_days("2026-03-02", Some("2026-03-03"))
        .unwrap();
    assert_eq!(q.departure_from, None);
    assert_eq!(q.arrival_from.as_deref(), Some("2026-03-02T00:00:00.000Z"));
    assert_eq!(q.arrival_to.as_deref(), Some("2026-03-03T23:59:59.000Z"));
    assert!(q.validate().is_ok());
}
