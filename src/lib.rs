// src/lib.rs
pub mod config;
pub mod db;
pub mod error;
pub mod geocoding;
pub mod models;
pub mod payload;
pub mod reconcile;
pub mod report;
pub mod store;

// Re-export common types for easier access
pub use models::{
    Coordinate, FacilityId, FacilityRecord, OutcomeStatus, ReconciliationOutcome, RunReport,
    RunSummary,
};

// Re-export important functionality
pub use db::PgPool;
pub use geocoding::{GeocodeProvider, MapboxGeocoder};
pub use reconcile::ReconciliationEngine;
pub use store::FacilityStore;
