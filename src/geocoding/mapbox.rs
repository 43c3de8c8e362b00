// src/geocoding/mapbox.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::MapboxConfig;
use crate::models::Coordinate;

use super::GeocodeProvider;

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    center: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

impl Feature {
    /// Mapbox orders positions as `[lng, lat]`.
    fn coordinate(&self) -> Option<Coordinate> {
        let position = self
            .geometry
            .as_ref()
            .map(|g| g.coordinates.as_slice())
            .filter(|p| p.len() >= 2)
            .or_else(|| self.center.as_deref().filter(|p| p.len() >= 2))?;
        Some(Coordinate::new(position[1], position[0]))
    }
}

/// Forward geocoding against the Mapbox Places API, one best match per query.
pub struct MapboxGeocoder {
    http: Client,
    config: MapboxConfig,
}

impl MapboxGeocoder {
    pub fn new(config: MapboxConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build Mapbox HTTP client")?;
        Ok(Self { http, config })
    }

    /// The address goes in as a single percent-encoded path segment.
    fn request_url(&self, address: &str) -> Result<Url> {
        let mut url = Url::parse(self.config.base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid Mapbox base URL {}", self.config.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Mapbox base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places"])
            .push(&format!("{}.json", address));
        url.query_pairs_mut()
            .append_pair("access_token", &self.config.access_token)
            .append_pair("limit", "1");
        Ok(url)
    }

    async fn lookup(&self, address: &str) -> Result<Option<Coordinate>> {
        let url = self.request_url(address)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Mapbox request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Mapbox returned status {}", status.as_u16()));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .context("Mapbox response was not valid JSON")?;
        Ok(body.features.first().and_then(Feature::coordinate))
    }
}

#[async_trait]
impl GeocodeProvider for MapboxGeocoder {
    async fn geocode(&self, address: &str) -> Option<Coordinate> {
        match self.lookup(address).await {
            Ok(Some(coordinate)) => {
                debug!(
                    "Geocoded '{}' to {:.6}, {:.6}",
                    address, coordinate.latitude, coordinate.longitude
                );
                Some(coordinate)
            }
            Ok(None) => {
                debug!("No geocoding match for '{}'", address);
                None
            }
            Err(e) => {
                warn!("Geocoding error for '{}': {:#}", address, e);
                None
            }
        }
    }
}
