// src/models.rs

use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------

/// Strongly typed identifier for facility records
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FacilityId(pub String);

impl FacilityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FacilityId {
    fn from(value: &str) -> Self {
        FacilityId(value.to_string())
    }
}

// PostgREST hands back text ids for uuid columns and numbers for serial ones.
impl<'de> Deserialize<'de> for FacilityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => FacilityId(s),
            RawId::Number(n) => FacilityId(n.to_string()),
        })
    }
}

impl ToSql for FacilityId {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.0.to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        <String as ToSql>::accepts(ty)
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.0.to_sql_checked(ty, out)
    }
}

impl<'a> FromSql<'a> for FacilityId {
    fn from_sql(ty: &Type, raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let s = String::from_sql(ty, raw)?;
        Ok(FacilityId(s))
    }

    fn accepts(ty: &Type) -> bool {
        <String as FromSql>::accepts(ty)
    }
}

//------------------------------------------------------------------------------
// CORE DOMAIN MODELS
//------------------------------------------------------------------------------

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A facility row as read from the record store.
///
/// Nothing about the address is guaranteed: any of the address fields may be
/// missing, and so may either half of the stored coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: FacilityId,
    pub company_id: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Resolved from the company join by the store, never by the engine.
    pub company_name: Option<String>,
}

impl FacilityRecord {
    /// The stored coordinate, only when both halves are present.
    pub fn stored_coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or(UNKNOWN_COMPANY)
    }
}

pub const UNKNOWN_COMPANY: &str = "Unknown";

/// The stored pair exactly as found, each half optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredCoordinate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&FacilityRecord> for StoredCoordinate {
    fn from(record: &FacilityRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
        }
    }
}

//------------------------------------------------------------------------------
// RECONCILIATION RESULTS
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Updated,
    Unchanged,
    Error,
}

/// Result of one reconciliation pass over a single facility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub facility_id: FacilityId,
    pub company_name: String,
    pub formatted_address: String,
    pub current_coordinate: StoredCoordinate,
    pub new_coordinate: Option<Coordinate>,
    pub distance_km: Option<f64>,
    pub status: OutcomeStatus,

    /// Present iff `status` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Run-level counters. `processed == updated + errors + unchanged`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub updated: usize,
    pub errors: usize,
    pub unchanged: usize,
}

impl RunSummary {
    /// Derives the counters from a finished outcome list.
    pub fn from_outcomes(outcomes: &[ReconciliationOutcome]) -> Self {
        let processed = outcomes.len();
        let updated = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Updated)
            .count();
        let errors = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Error)
            .count();
        Self {
            processed,
            updated,
            errors,
            unchanged: processed - updated - errors,
        }
    }
}

/// Everything a single run produced, handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,

    /// Records returned by the store, before any scope filtering.
    pub fetched: usize,
    pub summary: RunSummary,
    pub outcomes: Vec<ReconciliationOutcome>,
}

impl RunReport {
    pub fn with_status(
        &self,
        status: OutcomeStatus,
    ) -> impl Iterator<Item = &ReconciliationOutcome> + '_ {
        self.outcomes.iter().filter(move |o| o.status == status)
    }
}
