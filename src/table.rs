use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::model::{Seat, Trip};

pub fn render(trips: &[Trip]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Flight", "Route", "Departure", "Seats", "Price", "Trip ID"]);

    for (i, trip) in trips.iter().enumerate() {
        let index = (i + 1).to_string();
        let route = format!("{} → {}", trip.from, trip.to);
        let seats = trip.available_seats.to_string();
        let id = trip.id.clone().unwrap_or_else(|| "—".to_string());

        table.add_row(vec![
            &index,
            &trip.flight_number,
            &route,
            &trip.departure,
            &seats,
            &trip.price,
            &id,
        ]);
    }

    table.to_string()
}

pub fn compact_line(trip: &Trip) -> String {
    format!(
        "{} | {}>{} | {} | {} seats | {} | {}",
        trip.flight_number,
        trip.from,
        trip.to,
        trip.departure,
        trip.available_seats,
        trip.price,
        trip.id.as_deref().unwrap_or("—"),
    )
}

/// Seat grid, four seats per row: `[ 3B]` free, `  3B*` selected, ` ××× ` taken.
pub fn render_seats(seats: &[Seat]) -> String {
    seats
        .chunks(4)
        .map(|row| {
            row.iter()
                .map(|seat| {
                    if seat.is_selected {
                        format!(" {:>3}*", seat.seat_number)
                    } else if seat.is_available {
                        format!("[{:>3}]", seat.seat_number)
                    } else {
                        " ××× ".to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
