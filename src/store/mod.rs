// src/store/mod.rs
//
// Record store seam: where facilities come from and where corrected
// coordinates go back to.

pub mod postgres;
pub mod supabase;

use async_trait::async_trait;
use log::info;

use crate::error::{StoreError, UpdateError};
use crate::models::{Coordinate, FacilityId, FacilityRecord};

pub use postgres::PgFacilityStore;
pub use supabase::SupabaseFacilityStore;

#[async_trait]
pub trait FacilityStore: Send + Sync {
    /// Every facility, with the company name already resolved.
    async fn list_facilities(&self) -> Result<Vec<FacilityRecord>, StoreError>;

    async fn update_coordinates(
        &self,
        id: &FacilityId,
        coordinate: Coordinate,
    ) -> Result<(), UpdateError>;
}

/// Reads through to the wrapped store but never writes.
pub struct DryRunStore<S> {
    inner: S,
}

impl<S: FacilityStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: FacilityStore> FacilityStore for DryRunStore<S> {
    async fn list_facilities(&self) -> Result<Vec<FacilityRecord>, StoreError> {
        self.inner.list_facilities().await
    }

    async fn update_coordinates(
        &self,
        id: &FacilityId,
        coordinate: Coordinate,
    ) -> Result<(), UpdateError> {
        info!(
            "[dry run] would set facility {} to {:.6}, {:.6}",
            id, coordinate.latitude, coordinate.longitude
        );
        Ok(())
    }
}

#[async_trait]
impl<S: FacilityStore + ?Sized> FacilityStore for Box<S> {
    async fn list_facilities(&self) -> Result<Vec<FacilityRecord>, StoreError> {
        (**self).list_facilities().await
    }

    async fn update_coordinates(
        &self,
        id: &FacilityId,
        coordinate: Coordinate,
    ) -> Result<(), UpdateError> {
        (**self).update_coordinates(id, coordinate).await
    }
}
