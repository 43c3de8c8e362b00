// src/geocoding/mod.rs

pub mod mapbox;

use async_trait::async_trait;

use crate::models::Coordinate;

pub use mapbox::MapboxGeocoder;

/// Turns free-text addresses into coordinates.
///
/// Implementations swallow every failure: no match, a bad status, a broken
/// body and a dead connection all come back as `None`. Callers pace
/// themselves; providers don't rate limit.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<Coordinate>;
}
