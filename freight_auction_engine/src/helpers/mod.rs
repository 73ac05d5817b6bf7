mod geo;
mod stats;

pub use geo::{haversine_km, EARTH_RADIUS_KM};
pub use stats::median;
