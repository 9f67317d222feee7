// Geofencing: WGS84 polygons, the zone store and point-in-zone classification.

pub mod classifier;
pub mod polygon;
pub mod store;

pub use classifier::{check_zone, classify, classify_batch, classify_point, ZoneCheck};
pub use store::{Zone, ZoneStore};
