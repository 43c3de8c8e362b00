// src/reconcile/engine.rs

use chrono::Utc;
use log::{debug, info, warn};
use std::time::Instant;
use uuid::Uuid;

use crate::config::{ReconcileConfig, RecordScope};
use crate::error::ReconcileError;
use crate::geocoding::GeocodeProvider;
use crate::models::{
    Coordinate, FacilityId, FacilityRecord, OutcomeStatus, ReconciliationOutcome, RunReport,
    RunSummary, StoredCoordinate,
};
use crate::store::FacilityStore;

use super::address::{format_address, is_usable_address};
use super::distance::haversine_distance_km;

pub const INCOMPLETE_ADDRESS: &str = "Incomplete address";
pub const GEOCODING_FAILED: &str = "Geocoding failed";

/// Walks every facility once: format, geocode, compare, and write back
/// when the stored point is missing or too far off.
pub struct ReconciliationEngine<'a> {
    store: &'a dyn FacilityStore,
    geocoder: &'a dyn GeocodeProvider,
    config: ReconcileConfig,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(
        store: &'a dyn FacilityStore,
        geocoder: &'a dyn GeocodeProvider,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            geocoder,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunReport, ReconcileError> {
        self.run_with_progress(|_, _| {}).await
    }

    /// `on_progress(processed, total)` fires every `progress_interval`
    /// records, before that record is handled.
    pub async fn run_with_progress<F>(
        &self,
        mut on_progress: F,
    ) -> Result<RunReport, ReconcileError>
    where
        F: FnMut(usize, usize),
    {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        info!("Run ID: {}", run_id);

        let records = self.store.list_facilities().await?;
        let fetched = records.len();
        let records: Vec<FacilityRecord> = match self.config.scope {
            RecordScope::All => records,
            RecordScope::MissingOnly => records
                .into_iter()
                .filter(|r| r.stored_coordinate().is_none())
                .collect(),
        };
        info!(
            "Reconciling {} of {} facilities (threshold {} km)",
            records.len(),
            fetched,
            self.config.distance_threshold_km
        );

        let total = records.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, record) in records.iter().enumerate() {
            let processed = index + 1;
            if self.config.progress_interval > 0 && processed % self.config.progress_interval == 0
            {
                on_progress(processed, total);
            }
            outcomes.push(self.reconcile_record(record).await);
        }

        let summary = RunSummary::from_outcomes(&outcomes);
        info!(
            "Reconciliation finished in {:.2?}: {} processed, {} updated, {} errors, {} unchanged",
            start.elapsed(),
            summary.processed,
            summary.updated,
            summary.errors,
            summary.unchanged
        );

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: self.config.dry_run,
            fetched,
            summary,
            outcomes,
        })
    }

    /// One facility, start to finish. Never fails: every fault becomes an
    /// error outcome.
    async fn reconcile_record(&self, record: &FacilityRecord) -> ReconciliationOutcome {
        let address = format_address(record);
        let draft = OutcomeDraft::new(record, address);

        if !is_usable_address(&draft.formatted_address) {
            debug!("Facility {} has an incomplete address", record.id);
            return draft.error(INCOMPLETE_ADDRESS.to_string(), None, None);
        }

        let geocoded = self.geocoder.geocode(&draft.formatted_address).await;
        let outcome = match geocoded {
            Some(new_coordinate) => self.apply(record, draft, new_coordinate).await,
            None => draft.error(GEOCODING_FAILED.to_string(), None, None),
        };

        // Paces the provider after every geocode attempt, hit or miss.
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
        outcome
    }

    async fn apply(
        &self,
        record: &FacilityRecord,
        draft: OutcomeDraft,
        new_coordinate: Coordinate,
    ) -> ReconciliationOutcome {
        let (distance_km, should_update) = match record.stored_coordinate() {
            Some(stored) => {
                let distance = haversine_distance_km(stored, new_coordinate);
                (Some(distance), distance > self.config.distance_threshold_km)
            }
            None => (None, true),
        };

        if !should_update {
            return draft.finish(OutcomeStatus::Unchanged, new_coordinate, distance_km);
        }

        match self
            .store
            .update_coordinates(&record.id, new_coordinate)
            .await
        {
            Ok(()) => {
                match distance_km {
                    Some(d) => info!("Updated {}: {:.2}km", draft.company_name, d),
                    None => info!("Updated {}: missing coords", draft.company_name),
                }
                draft.finish(OutcomeStatus::Updated, new_coordinate, distance_km)
            }
            Err(e) => {
                warn!("Failed to update facility {}: {}", record.id, e);
                draft.error(
                    format!("Update failed: {}", e),
                    Some(new_coordinate),
                    distance_km,
                )
            }
        }
    }
}

/// The parts of an outcome known before geocoding.
struct OutcomeDraft {
    facility_id: FacilityId,
    company_name: String,
    formatted_address: String,
    current_coordinate: StoredCoordinate,
}

impl OutcomeDraft {
    fn new(record: &FacilityRecord, formatted_address: String) -> Self {
        Self {
            facility_id: record.id.clone(),
            company_name: record.display_name().to_string(),
            formatted_address,
            current_coordinate: StoredCoordinate::from(record),
        }
    }

    fn finish(
        self,
        status: OutcomeStatus,
        new_coordinate: Coordinate,
        distance_km: Option<f64>,
    ) -> ReconciliationOutcome {
        ReconciliationOutcome {
            facility_id: self.facility_id,
            company_name: self.company_name,
            formatted_address: self.formatted_address,
            current_coordinate: self.current_coordinate,
            new_coordinate: Some(new_coordinate),
            distance_km,
            status,
            error_message: None,
        }
    }

    fn error(
        self,
        message: String,
        new_coordinate: Option<Coordinate>,
        distance_km: Option<f64>,
    ) -> ReconciliationOutcome {
        ReconciliationOutcome {
            facility_id: self.facility_id,
            company_name: self.company_name,
            formatted_address: self.formatted_address,
            current_coordinate: self.current_coordinate,
            new_coordinate,
            distance_km,
            status: OutcomeStatus::Error,
            error_message: Some(message),
        }
    }
}
