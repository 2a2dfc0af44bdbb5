use serde::{Deserialize, Serialize};

/// Seat record as delivered by the trip API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRecord {
    pub id: String,
    pub seat_number: String,
    pub is_available: bool,
}

/// Trip record as delivered by `GET /trips`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTrip {
    #[serde(default)]
    pub id: Option<String>,
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    #[serde(default)]
    pub available_seats: u32,
    #[serde(default)]
    pub flight_number: String,
    #[serde(default)]
    pub base_price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub seat_map: Option<Vec<SeatRecord>>,
}

/// Display and booking-ready trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub departure: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    pub available_seats: u32,
    pub flight_number: String,
    pub price: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_map: Option<Vec<SeatRecord>>,
    #[serde(default)]
    pub base_price: f64,
    #[serde(default)]
    pub currency: String,
}

impl Trip {
    /// Identity used to address a trip in a result list; route-based when the id is absent.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}-{}", self.from, self.to),
        }
    }

    pub fn same_route(&self, from: &str, to: &str) -> bool {
        self.from == from && self.to == to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub seat_number: String,
    pub is_available: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerType {
    Adult,
    Infant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Passport,
    BirthCertificate,
}

impl From<PassengerType> for DocumentType {
    fn from(kind: PassengerType) -> Self {
        match kind {
            PassengerType::Adult => Self::Passport,
            PassengerType::Infant => Self::BirthCertificate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerFile {
    #[serde(rename = "type")]
    pub kind: DocumentType,
    pub original_filename: String,
    pub mime_type: String,
    pub base64_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    #[serde(rename = "type")]
    pub kind: PassengerType,
    pub name: String,
    pub passport_number_or_id_number: String,
    #[serde(default)]
    pub files: Vec<PassengerFile>,
}

impl Passenger {
    pub fn adult() -> Self {
        Self {
            kind: PassengerType::Adult,
            name: String::new(),
            passport_number_or_id_number: String::new(),
            files: Vec::new(),
        }
    }
}

/// Snapshot shown on the confirmation screen once payment completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub booking_id: String,
    pub trip_id: Option<String>,
    pub from: String,
    pub to: String,
    pub departure: String,
    pub flight_number: String,
    pub price: String,
    pub selected_seats: Vec<String>,
    pub passengers: Vec<Passenger>,
    pub booker_name: String,
    pub booker_email: String,
    pub booker_phone: String,
    pub total_amount: f64,
    pub currency: String,
}
