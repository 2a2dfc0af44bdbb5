use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::error::BookingError;

const ISO_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Number of days covered by an automatic re-search, counted from the recorded departure.
pub const AUTO_SEARCH_DAYS: u64 = 7;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripQuery {
    pub from: String,
    pub to: String,
    pub departure_from: Option<String>,
    pub departure_to: Option<String>,
    pub arrival_from: Option<String>,
    pub arrival_to: Option<String>,
    pub offset: u32,
}

fn parse_day(date: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| BookingError::InvalidDate(date.to_string()))
}

fn validate_timestamp(value: &str) -> Result<(), BookingError> {
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| BookingError::InvalidDate(value.to_string()))
}

fn start_of_day(day: NaiveDate) -> String {
    day.and_time(NaiveTime::MIN).and_utc().format(ISO_MILLIS).to_string()
}

fn end_of_day(day: NaiveDate) -> String {
    format!("{}T23:59:59.000Z", day.format("%Y-%m-%d"))
}

fn day_window(start: &str, end: Option<&str>) -> Result<(NaiveDate, NaiveDate), BookingError> {
    let first = parse_day(start)?;
    let last = match end {
        Some(end) => parse_day(end)?,
        None => first,
    };
    if last < first {
        return Err(BookingError::Validation(format!(
            "date window ends ({last}) before it starts ({first})"
        )));
    }
    Ok((first, last))
}

fn add_days(day: NaiveDate, days: u64) -> NaiveDate {
    day.checked_add_days(Days::new(days)).unwrap_or(day)
}

impl TripQuery {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Departure window covering whole days, `YYYY-MM-DD` inclusive on both ends.
    pub fn with_departure_days(mut self, start: &str, end: Option<&str>) -> Result<Self, BookingError> {
        let (first, last) = day_window(start, end)?;
        self.departure_from = Some(start_of_day(first));
        self.departure_to = Some(end_of_day(last));
        Ok(self)
    }

    pub fn with_arrival_days(mut self, start: &str, end: Option<&str>) -> Result<Self, BookingError> {
        let (first, last) = day_window(start, end)?;
        self.arrival_from = Some(start_of_day(first));
        self.arrival_to = Some(end_of_day(last));
        Ok(self)
    }

    /// Query used to find a trip again after a sign-in redirect: a seven day departure
    /// window from the recorded departure, arrivals from the following day until three
    /// days past the window.
    pub fn auto_search(from: &str, to: &str, departure: DateTime<Utc>) -> Self {
        let start = departure.date_naive();
        let end = add_days(start, AUTO_SEARCH_DAYS);

        Self {
            from: from.to_string(),
            to: to.to_string(),
            departure_from: Some(start_of_day(start)),
            departure_to: Some(end_of_day(end)),
            arrival_from: Some(start_of_day(add_days(start, 1))),
            arrival_to: Some(start_of_day(add_days(end, 3))),
            offset: 0,
        }
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        if self.from.trim().is_empty() {
            return Err(BookingError::Validation("origin is required".into()));
        }
        if self.to.trim().is_empty() {
            return Err(BookingError::Validation("destination is required".into()));
        }

        for value in [
            &self.departure_from,
            &self.departure_to,
            &self.arrival_from,
            &self.arrival_to,
        ]
        .into_iter()
        .flatten()
        {
            validate_timestamp(value)?;
        }

        Ok(())
    }

    pub fn to_url_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("from".to_string(), self.from.clone()),
            ("to".to_string(), self.to.clone()),
        ];

        let optional = [
            ("departureFrom", &self.departure_from),
            ("departureTo", &self.departure_to),
            ("arrivalFrom", &self.arrival_from),
            ("arrivalTo", &self.arrival_to),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                params.push((name.to_string(), value.clone()));
            }
        }

        params.push(("offset".to_string(), self.offset.to_string()));
        params
    }
}
