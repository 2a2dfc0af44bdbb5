pub mod api;
pub mod error;
pub mod flow;
pub mod invoice;
pub mod mapper;
pub mod model;
pub mod passenger;
pub mod prompt;
pub mod query;
pub mod recovery;
pub mod seatmap;
pub mod storage;
pub mod table;

use api::TripApi;
use error::BookingError;
use model::Trip;
use query::TripQuery;

pub async fn search(api: &dyn TripApi, query: &TripQuery) -> Result<Vec<Trip>, BookingError> {
    query.validate()?;
    let trips = api.search_trips(query).await?;
    Ok(mapper::map_trips(trips))
}
