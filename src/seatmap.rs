use rand::Rng;

use crate::model::{Seat, SeatRecord};

pub const ROWS: u32 = 11;
pub const COLUMNS: [char; 4] = ['A', 'B', 'C', 'D'];
pub const AVAILABILITY: f64 = 0.7;

/// Seat list for a trip. Real inventory is mapped one to one; without it an 11×4 grid
/// is synthesized with each seat independently available at 70%. Synthesized ids are
/// derived from the label only and repeat across trips.
pub fn build<R: Rng + ?Sized>(inventory: Option<&[SeatRecord]>, rng: &mut R) -> Vec<Seat> {
    match inventory {
        Some(records) if !records.is_empty() => records
            .iter()
            .map(|record| Seat {
                id: record.id.clone(),
                seat_number: record.seat_number.clone(),
                is_available: record.is_available,
                is_selected: false,
            })
            .collect(),
        _ => synthesize(rng),
    }
}

fn synthesize<R: Rng + ?Sized>(rng: &mut R) -> Vec<Seat> {
    let mut seats = Vec::with_capacity(ROWS as usize * COLUMNS.len());
    for row in 1..=ROWS {
        for column in COLUMNS {
            let label = format!("{row}{column}");
            seats.push(Seat {
                id: format!("mock-seat-{label}"),
                seat_number: label,
                is_available: rng.random_bool(AVAILABILITY),
                is_selected: false,
            });
        }
    }
    seats
}
