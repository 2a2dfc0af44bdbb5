use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::BookingError;
use crate::model::{DocumentType, Passenger, PassengerFile};

pub const PHONE_PREFIX: &str = "+20";
pub const PHONE_DIGITS: usize = 10;
/// Input cap: the prefix, ten digits and one more.
pub const PHONE_MAX_LEN: usize = 14;
pub const DEFAULT_BASE_PRICE: f64 = 200.0;
pub const INFANT_PRICE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerField {
    Name,
    PassportNumberOrIdNumber,
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone
        .strip_prefix(PHONE_PREFIX)
        .is_some_and(|rest| rest.len() == PHONE_DIGITS && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Keeps the `+20` prefix in place whatever the user typed and caps the length.
pub fn normalize_phone(raw: &str) -> String {
    let mut phone = if raw.starts_with(PHONE_PREFIX) {
        raw.to_string()
    } else {
        let unsigned = raw.strip_prefix('+').unwrap_or(raw);
        let rest = match unsigned.strip_prefix('2') {
            Some(after) => after.strip_prefix('0').unwrap_or(after),
            None => raw,
        };
        format!("{PHONE_PREFIX}{rest}")
    };

    if let Some((cut, _)) = phone.char_indices().nth(PHONE_MAX_LEN) {
        phone.truncate(cut);
    }
    phone
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Booker contact fields plus one passenger record per adult.
///
/// Changing the adult count rebuilds the passenger list from scratch: entries typed
/// before the change are dropped, not merged.
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerForm {
    pub booker_name: String,
    pub booker_email: String,
    booker_phone: String,
    number_of_adults: u32,
    number_of_infants: u32,
    passengers: Vec<Passenger>,
}

impl Default for PassengerForm {
    fn default() -> Self {
        Self::new()
    }
}

impl PassengerForm {
    pub fn new() -> Self {
        let mut form = Self {
            booker_name: String::new(),
            booker_email: String::new(),
            booker_phone: PHONE_PREFIX.to_string(),
            number_of_adults: 0,
            number_of_infants: 0,
            passengers: Vec::new(),
        };
        form.resize(1);
        form
    }

    pub fn booker_phone(&self) -> &str {
        &self.booker_phone
    }

    pub fn number_of_adults(&self) -> u32 {
        self.number_of_adults
    }

    pub fn number_of_infants(&self) -> u32 {
        self.number_of_infants
    }

    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    pub fn set_phone(&mut self, raw: &str) {
        self.booker_phone = normalize_phone(raw);
    }

    /// Inline error for the phone field; silent until more than the prefix is typed.
    pub fn phone_error(&self) -> Option<BookingError> {
        if self.booker_phone.len() > PHONE_PREFIX.len() && !is_valid_phone(&self.booker_phone) {
            Some(BookingError::InvalidPhone(self.booker_phone.clone()))
        } else {
            None
        }
    }

    /// Replaces the passenger list with `adults` blank adult records. At least one
    /// adult is always kept.
    pub fn resize(&mut self, adults: u32) {
        let adults = adults.max(1);
        self.number_of_adults = adults;
        self.passengers = (0..adults).map(|_| Passenger::adult()).collect();
    }

    pub fn set_infants(&mut self, infants: u32) {
        self.number_of_infants = infants;
    }

    /// Out-of-range indexes are ignored.
    pub fn update(&mut self, index: usize, field: PassengerField, value: impl Into<String>) {
        if let Some(passenger) = self.passengers.get_mut(index) {
            match field {
                PassengerField::Name => passenger.name = value.into(),
                PassengerField::PassportNumberOrIdNumber => {
                    passenger.passport_number_or_id_number = value.into()
                }
            }
        }
    }

    /// Stores `bytes` as the passenger's only document, typed from the passenger type.
    pub fn attach(&mut self, index: usize, filename: &str, mime_type: &str, bytes: &[u8]) {
        if let Some(passenger) = self.passengers.get_mut(index) {
            passenger.files = vec![PassengerFile {
                kind: DocumentType::from(passenger.kind),
                original_filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                base64_content: STANDARD.encode(bytes),
            }];
        }
    }

    pub async fn attach_file(&mut self, index: usize, path: &Path) -> Result<(), BookingError> {
        if index >= self.passengers.len() {
            return Ok(());
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BookingError::Io(format!("cannot read {}: {e}", path.display())))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.attach(index, &filename, mime_for(path), &bytes);
        Ok(())
    }

    /// Restores every field as stored. Stored passengers are kept in order, cut or
    /// padded with blank adults so there is exactly one record per adult.
    pub fn restore(
        &mut self,
        booker_name: &str,
        booker_email: &str,
        booker_phone: &str,
        adults: u32,
        infants: u32,
        passengers: Vec<Passenger>,
    ) {
        self.booker_name = booker_name.to_string();
        self.booker_email = booker_email.to_string();
        self.booker_phone = if booker_phone.is_empty() {
            PHONE_PREFIX.to_string()
        } else {
            booker_phone.to_string()
        };
        self.number_of_adults = adults.max(1);
        self.number_of_infants = infants;
        self.passengers = passengers;
        self.passengers
            .resize_with(self.number_of_adults as usize, Passenger::adult);
    }

    pub fn validate(&self, selected_seats: usize) -> Result<(), BookingError> {
        if self.booker_name.trim().is_empty() {
            return Err(BookingError::Validation("booker name is required".into()));
        }
        if self.booker_email.trim().is_empty() {
            return Err(BookingError::Validation("booker email is required".into()));
        }
        if !is_valid_phone(&self.booker_phone) {
            return Err(BookingError::InvalidPhone(self.booker_phone.clone()));
        }
        if selected_seats != self.number_of_adults as usize {
            return Err(BookingError::Validation(format!(
                "select {} seat(s), {selected_seats} selected",
                self.number_of_adults
            )));
        }
        if self.passengers.len() != self.number_of_adults as usize {
            return Err(BookingError::Validation(format!(
                "expected {} passenger record(s), found {}",
                self.number_of_adults,
                self.passengers.len()
            )));
        }
        for (i, passenger) in self.passengers.iter().enumerate() {
            if passenger.name.is_empty() || passenger.passport_number_or_id_number.is_empty() {
                return Err(BookingError::Validation(format!(
                    "passenger {} needs a name and a passport or ID number",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    pub fn is_complete(&self, selected_seats: usize) -> bool {
        self.validate(selected_seats).is_ok()
    }

    pub fn total_amount(&self, base_price: f64) -> f64 {
        let base = if base_price > 0.0 {
            base_price
        } else {
            DEFAULT_BASE_PRICE
        };
        self.number_of_adults as f64 * base + self.number_of_infants as f64 * INFANT_PRICE
    }
}
