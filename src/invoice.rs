//! Single-page PDF invoice for a paid booking.
//!
//! Layout is expressed in millimetres from the top-left corner of an A4 page and
//! converted to PDF points when the content stream is written.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::BookingError;
use crate::model::{BookingDetails, PassengerType};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const BRAND: (u8, u8, u8) = (23, 159, 219);
const LINE_HEIGHT: f32 = 7.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePassenger {
    #[serde(rename = "type")]
    pub kind: PassengerType,
    pub name: String,
    pub passport_number_or_id_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingData {
    pub booking_id: String,
    #[serde(default)]
    pub trip_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub departure: String,
    #[serde(default)]
    pub flight_number: String,
    #[serde(default)]
    pub seats: Vec<String>,
    #[serde(default)]
    pub passengers: Vec<InvoicePassenger>,
    #[serde(default)]
    pub booker_name: String,
    #[serde(default)]
    pub booker_email: String,
    #[serde(default)]
    pub booker_phone: String,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub payment_status: String,
}

impl BookingData {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.booking_id.is_empty() || self.from.is_empty() || self.to.is_empty() {
            return Err(BookingError::Invoice(
                "missing required booking data (booking id, origin and destination)".into(),
            ));
        }
        Ok(())
    }

    /// `Invoice_<bookingId>.pdf`, with path separators, control characters and `..`
    /// in the id replaced so the name stays inside the output directory.
    pub fn file_name(&self) -> String {
        let id: String = self
            .booking_id
            .chars()
            .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
            .collect();
        format!("Invoice_{}.pdf", id.replace("..", "_"))
    }
}

impl From<&BookingDetails> for BookingData {
    fn from(details: &BookingDetails) -> Self {
        Self {
            booking_id: details.booking_id.clone(),
            trip_id: details.trip_id.clone().unwrap_or_default(),
            from: details.from.clone(),
            to: details.to.clone(),
            departure: details.departure.clone(),
            flight_number: details.flight_number.clone(),
            seats: details.selected_seats.clone(),
            passengers: details
                .passengers
                .iter()
                .map(|p| InvoicePassenger {
                    kind: p.kind,
                    name: p.name.clone(),
                    passport_number_or_id_number: p.passport_number_or_id_number.clone(),
                })
                .collect(),
            booker_name: details.booker_name.clone(),
            booker_email: details.booker_email.clone(),
            booker_phone: details.booker_phone.clone(),
            total_amount: details.total_amount,
            currency: details.currency.clone(),
            booking_date: Local::now().to_rfc3339(),
            payment_status: "PAID".to_string(),
        }
    }
}

fn pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

fn rgb((r, g, b): (u8, u8, u8)) -> Vec<Object> {
    vec![
        (r as f32 / 255.0).into(),
        (g as f32 / 255.0).into(),
        (b as f32 / 255.0).into(),
    ]
}

/// Content stream builder working in page millimetres, origin top-left.
#[derive(Default)]
struct Canvas {
    ops: Vec<Operation>,
}

impl Canvas {
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: (u8, u8, u8)) {
        self.ops.push(Operation::new("rg", rgb(color)));
        self.ops.push(Operation::new(
            "re",
            vec![
                pt(x).into(),
                pt(PAGE_HEIGHT_MM - y - h).into(),
                pt(w).into(),
                pt(h).into(),
            ],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32, color: (u8, u8, u8)) {
        let y = pt(PAGE_HEIGHT_MM - y);
        self.ops.push(Operation::new("RG", rgb(color)));
        self.ops.push(Operation::new("w", vec![1.0_f32.into()]));
        self.ops.push(Operation::new("m", vec![pt(x1).into(), y.into()]));
        self.ops.push(Operation::new("l", vec![pt(x2).into(), y.into()]));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, color: (u8, u8, u8)) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("rg", rgb(color)));
        self.ops.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
        self.ops.push(Operation::new(
            "Td",
            vec![pt(x).into(), pt(PAGE_HEIGHT_MM - y).into()],
        ));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(latin1(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn encode(self) -> Result<Vec<u8>, BookingError> {
        Content {
            operations: self.ops,
        }
        .encode()
        .map_err(|e| BookingError::Invoice(e.to_string()))
    }
}

/// Helvetica only covers Latin-1; anything else becomes `?`.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn display_departure(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%-m/%-d/%Y, %-I:%M:%S %p")
            .to_string(),
        Err(_) => value.to_string(),
    }
}

fn layout(data: &BookingData) -> Canvas {
    const BLACK: (u8, u8, u8) = (0, 0, 0);
    const WHITE: (u8, u8, u8) = (255, 255, 255);
    const GREY: (u8, u8, u8) = (100, 100, 100);

    let mut c = Canvas::default();

    c.fill_rect(0.0, 0.0, PAGE_WIDTH_MM, 40.0, BRAND);
    c.text("Flight Booking System", 20.0, 25.0, 28.0, WHITE);

    c.text("BOOKING INVOICE", 20.0, 55.0, 20.0, BLACK);
    let today = Local::now().format("%-m/%-d/%Y");
    c.text(&format!("Invoice Date: {today}"), 120.0, 45.0, 10.0, GREY);
    c.text(&format!("Booking ID: {}", data.booking_id), 120.0, 52.0, 10.0, GREY);

    let mut y = 75.0;
    c.text("Booking Details", 20.0, y, 14.0, BRAND);
    c.rule(20.0, 190.0, y + 5.0, BRAND);

    y += 20.0;
    let details = [
        format!("Route: {} -> {}", data.from, data.to),
        format!("Departure: {}", display_departure(&data.departure)),
        format!("Flight: {}", data.flight_number),
        format!("Seats: {}", data.seats.join(", ")),
        format!("Passengers: {}", data.passengers.len()),
    ];
    for (i, line) in details.iter().enumerate() {
        c.text(line, 20.0, y + LINE_HEIGHT * i as f32, 10.0, BLACK);
    }

    y += LINE_HEIGHT * (details.len() as f32 + 1.0);
    c.text("Contact Information", 20.0, y, 14.0, BRAND);
    c.rule(20.0, 190.0, y + 5.0, BRAND);

    y += 20.0;
    c.text(&format!("Name: {}", data.booker_name), 20.0, y, 10.0, BLACK);
    c.text(&format!("Email: {}", data.booker_email), 20.0, y + LINE_HEIGHT, 10.0, BLACK);
    c.text(&format!("Phone: {}", data.booker_phone), 20.0, y + LINE_HEIGHT * 2.0, 10.0, BLACK);

    y += LINE_HEIGHT * 4.0;
    c.fill_rect(20.0, y - 5.0, 170.0, 25.0, BRAND);
    c.text(
        &format!("Total: {} {}", data.total_amount, data.currency),
        25.0,
        y + 10.0,
        16.0,
        WHITE,
    );

    c.text(
        "Thank you for choosing our flight booking service!",
        20.0,
        280.0,
        8.0,
        (150, 150, 150),
    );

    c
}

/// Renders the invoice. Fails before drawing anything when required fields are missing.
pub fn render(data: &BookingData) -> Result<Vec<u8>, BookingError> {
    data.validate()?;

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let content = layout(data).encode()?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.0_f32.into(), 0.0_f32.into(), pt(PAGE_WIDTH_MM).into(), pt(PAGE_HEIGHT_MM).into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1_i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(format!("Invoice {}", data.booking_id)),
        "Producer" => Object::string_literal("tripbook"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| BookingError::Invoice(e.to_string()))?;
    Ok(buffer)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Opened(PathBuf),
    Saved(PathBuf),
}

/// Writes the invoice into `dir` and, when asked, opens it in the system viewer. A
/// viewer that fails to start leaves the file saved for the user to open.
pub fn deliver(data: &BookingData, dir: &Path, open_viewer: bool) -> Result<Delivery, BookingError> {
    let bytes = render(data)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(data.file_name());
    std::fs::write(&path, &bytes)?;
    info!(path = %path.display(), "invoice written");

    if !open_viewer {
        return Ok(Delivery::Saved(path));
    }
    match open::that(&path) {
        Ok(()) => Ok(Delivery::Opened(path)),
        Err(e) => {
            warn!(error = %e, "cannot open invoice viewer");
            Ok(Delivery::Saved(path))
        }
    }
}
