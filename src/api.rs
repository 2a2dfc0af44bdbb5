use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wreq::Client;

use crate::error::{self, BookingError};
use crate::model::{ApiTrip, Passenger};
use crate::query::TripQuery;

pub const DEFAULT_API_URL: &str = "https://gaber-airplans.onrender.com/api/v1";

#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub base_url: String,
    pub proxy: Option<String>,
    pub timeout: u64,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            proxy: None,
            timeout: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    pub seat_ids: Vec<String>,
    pub passengers: Vec<Passenger>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookingReceipt {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TripsResponse {
    Wrapped { trips: Vec<ApiTrip> },
    Bare(Vec<ApiTrip>),
}

impl TripsResponse {
    fn into_trips(self) -> Vec<ApiTrip> {
        match self {
            Self::Wrapped { trips } => trips,
            Self::Bare(trips) => trips,
        }
    }
}

/// The remote trip, booking and payment service.
#[async_trait]
pub trait TripApi: Send + Sync {
    async fn search_trips(&self, query: &TripQuery) -> Result<Vec<ApiTrip>, BookingError>;

    async fn create_booking(
        &self,
        token: &str,
        request: &BookingRequest,
    ) -> Result<BookingReceipt, BookingError>;

    async fn create_payment_intent(
        &self,
        token: &str,
        booking_id: &str,
        billing: &BillingDetails,
    ) -> Result<PaymentIntent, BookingError>;

    async fn cancel_booking(&self, token: &str, booking_id: &str) -> Result<(), BookingError>;
}

pub struct HttpTripApi {
    client: Client,
    base_url: String,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BookingError> {
    serde_json::from_str(body).map_err(|e| BookingError::InvalidResponse(e.to_string()))
}

fn check_status(status: u16, failed: fn(u16) -> BookingError) -> Result<(), BookingError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(BookingError::Unauthorized),
        _ => Err(failed(status)),
    }
}

impl HttpTripApi {
    pub fn new(options: &ApiOptions) -> Result<Self, BookingError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(options.timeout));

        if let Some(ref proxy) = options.proxy {
            builder = builder.proxy(wreq::Proxy::all(proxy).map_err(error::from_http_error)?);
        }

        let client = builder.build().map_err(error::from_http_error)?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json<B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<(u16, String), BookingError> {
        let payload =
            serde_json::to_string(body).map_err(|e| BookingError::Validation(e.to_string()))?;

        debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {token}"))
            .body(payload)
            .send()
            .await
            .map_err(error::from_http_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(error::from_http_error)?;
        Ok((status, text))
    }
}

#[async_trait]
impl TripApi for HttpTripApi {
    async fn search_trips(&self, query: &TripQuery) -> Result<Vec<ApiTrip>, BookingError> {
        let params = query.to_url_params();
        debug!(from = %query.from, to = %query.to, "GET /trips");

        let response = self
            .client
            .get(self.url("/trips"))
            .query(&params)
            .send()
            .await
            .map_err(error::from_http_error)?;

        check_status(response.status().as_u16(), BookingError::SearchFailed)?;

        let body = response.text().await.map_err(error::from_http_error)?;
        let trips: TripsResponse = decode(&body)?;
        Ok(trips.into_trips())
    }

    async fn create_booking(
        &self,
        token: &str,
        request: &BookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        let (status, body) = self.send_json("/bookings", token, request).await?;
        check_status(status, BookingError::BookingFailed)?;
        decode(&body)
    }

    async fn create_payment_intent(
        &self,
        token: &str,
        booking_id: &str,
        billing: &BillingDetails,
    ) -> Result<PaymentIntent, BookingError> {
        let path = format!("/bookings/{booking_id}/payments/intent");
        let (status, body) = self.send_json(&path, token, billing).await?;
        check_status(status, BookingError::PaymentIntentFailed)?;
        if body.trim().is_empty() {
            return Ok(PaymentIntent::default());
        }
        decode(&body)
    }

    async fn cancel_booking(&self, token: &str, booking_id: &str) -> Result<(), BookingError> {
        debug!(booking_id, "PATCH cancel");
        let response = self
            .client
            .patch(self.url(&format!("/bookings/{booking_id}/cancel")))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(error::from_http_error)?;

        check_status(response.status().as_u16(), BookingError::CancelFailed)
    }
}
