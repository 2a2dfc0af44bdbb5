use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    Timeout,
    ConnectionFailed(String),
    DnsResolution(String),
    ProxyError(String),
    TlsError(String),
    Unauthorized,
    SearchFailed(u16),
    BookingFailed(u16),
    PaymentIntentFailed(u16),
    CancelFailed(u16),
    InvalidResponse(String),
    NoResults,
    Validation(String),
    InvalidPhone(String),
    InvalidDate(String),
    InvalidState(String),
    Storage(String),
    Invoice(String),
    Io(String),
}

impl fmt::Display for BookingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(
                f,
                "request timed out — the trip API may be slow or unreachable. \
                 Try increasing --timeout or check your connection"
            ),
            Self::ConnectionFailed(detail) => write!(
                f,
                "connection failed — check your internet connection ({detail})"
            ),
            Self::DnsResolution(detail) => write!(
                f,
                "DNS resolution failed — check --api-url and your connection ({detail})"
            ),
            Self::ProxyError(detail) => write!(
                f,
                "proxy error — check your --proxy URL is correct ({detail})"
            ),
            Self::TlsError(detail) => write!(
                f,
                "TLS/SSL error — connection to the trip API failed ({detail})"
            ),
            Self::Unauthorized => write!(
                f,
                "session token was rejected — sign in again with `tripbook login`"
            ),
            Self::SearchFailed(status) => write!(f, "trip search failed (HTTP {status})"),
            Self::BookingFailed(status) => {
                write!(f, "booking creation failed (HTTP {status})")
            }
            Self::PaymentIntentFailed(status) => write!(
                f,
                "payment intent creation failed (HTTP {status}) — the booking exists but is unpaid"
            ),
            Self::CancelFailed(status) => {
                write!(f, "booking cancellation failed (HTTP {status})")
            }
            Self::InvalidResponse(detail) => {
                write!(f, "unexpected response from the trip API — {detail}")
            }
            Self::NoResults => write!(f, "no trips found for this search"),
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::InvalidPhone(phone) => write!(
                f,
                "invalid phone number \"{phone}\" — must be +20 followed by exactly 10 digits (e.g. +201012345678)"
            ),
            Self::InvalidDate(date) => write!(
                f,
                "invalid date \"{date}\" — must be YYYY-MM-DD or an ISO-8601 timestamp"
            ),
            Self::InvalidState(msg) => write!(f, "{msg}"),
            Self::Storage(detail) => write!(f, "local storage error — {detail}"),
            Self::Invoice(detail) => write!(f, "failed to generate PDF invoice — {detail}"),
            Self::Io(detail) => write!(f, "{detail}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<std::io::Error> for BookingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub fn from_http_error(err: wreq::Error) -> BookingError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();

    if err.is_timeout() {
        return BookingError::Timeout;
    }

    if err.is_connect() {
        if lower.contains("dns") || lower.contains("resolve") || lower.contains("getaddrinfo") {
            return BookingError::DnsResolution(msg);
        }
        return BookingError::ConnectionFailed(msg);
    }

    if lower.contains("proxy") || lower.contains("socks") {
        return BookingError::ProxyError(msg);
    }

    if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate") {
        return BookingError::TlsError(msg);
    }

    BookingError::ConnectionFailed(msg)
}
