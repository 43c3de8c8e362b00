// src/store/postgres.rs

use async_trait::async_trait;
use log::{debug, info};
use std::time::Instant;
use tokio_postgres::Row as PgRow;

use crate::db::PgPool;
use crate::error::{StoreError, UpdateError};
use crate::models::{Coordinate, FacilityId, FacilityRecord};

use super::FacilityStore;

const LIST_FACILITIES_SQL: &str = "
    SELECT
        f.id::text AS id,
        f.company_id::text AS company_id,
        f.street_address,
        f.city,
        f.state,
        f.zip_code,
        f.country,
        f.latitude::float8 AS latitude,
        f.longitude::float8 AS longitude,
        c.company_name
    FROM
        facilities f
        LEFT JOIN companies c ON c.id = f.company_id
";

const UPDATE_COORDINATES_SQL: &str = "
    UPDATE facilities
    SET latitude = $1::float8, longitude = $2::float8
    WHERE id::text = $3
";

/// Facilities table read straight from Postgres.
pub struct PgFacilityStore {
    pool: PgPool,
}

impl PgFacilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> FacilityRecord {
    FacilityRecord {
        id: row.get("id"),
        company_id: row.get("company_id"),
        street_address: row.get("street_address"),
        city: row.get("city"),
        state: row.get("state"),
        zip_code: row.get("zip_code"),
        country: row.get("country"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        company_name: row.get("company_name"),
    }
}

#[async_trait]
impl FacilityStore for PgFacilityStore {
    async fn list_facilities(&self) -> Result<Vec<FacilityRecord>, StoreError> {
        let start = Instant::now();
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(format!("failed to get connection: {}", e)))?;

        let rows = conn.query(LIST_FACILITIES_SQL, &[]).await?;
        let records: Vec<FacilityRecord> = rows.iter().map(record_from_row).collect();

        info!(
            "Fetched {} facilities from Postgres in {:.2?}",
            records.len(),
            start.elapsed()
        );
        Ok(records)
    }

    async fn update_coordinates(
        &self,
        id: &FacilityId,
        coordinate: Coordinate,
    ) -> Result<(), UpdateError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| UpdateError::Database(format!("failed to get connection: {}", e)))?;

        let affected = conn
            .execute(
                UPDATE_COORDINATES_SQL,
                &[&coordinate.latitude, &coordinate.longitude, id],
            )
            .await?;

        if affected == 0 {
            return Err(UpdateError::NotFound(id.to_string()));
        }
        debug!("Updated {} row(s) for facility {}", affected, id);
        Ok(())
    }
}
