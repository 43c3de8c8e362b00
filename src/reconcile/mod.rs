// src/reconcile/mod.rs

pub mod address;
pub mod distance;
pub mod engine;

pub use address::{format_address, is_usable_address};
pub use distance::haversine_distance_km;
pub use engine::{ReconciliationEngine, GEOCODING_FAILED, INCOMPLETE_ADDRESS};
