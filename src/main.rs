// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::time::{Duration, Instant};

use facility_geo_lib::{
    config::{self, MapboxConfig, ReconcileConfig, RecordScope, StoreConfig, StoreKind},
    db,
    geocoding::MapboxGeocoder,
    reconcile::ReconciliationEngine,
    report,
    store::{DryRunStore, FacilityStore, PgFacilityStore, SupabaseFacilityStore},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    Postgres,
    Supabase,
}

impl From<StoreArg> for StoreKind {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Postgres => StoreKind::Postgres,
            StoreArg::Supabase => StoreKind::Supabase,
        }
    }
}

/// Check every facility's stored coordinate against Mapbox and fix the ones
/// that are missing or too far off.
#[derive(Debug, Parser)]
#[command(name = "validate_coordinates", version)]
struct Args {
    /// Replace stored coordinates further than this from the geocoded point
    #[arg(long, env = "DISTANCE_THRESHOLD_KM", default_value_t = config::DISTANCE_THRESHOLD_KM)]
    threshold_km: f64,

    /// Pause after each geocoding request, in milliseconds
    #[arg(long, env = "GEOCODE_DELAY_MS", default_value_t = config::GEOCODE_DELAY_MS)]
    delay_ms: u64,

    /// Report what would change without writing anything
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Only look at facilities that have no stored coordinate
    #[arg(long, env = "MISSING_ONLY")]
    missing_only: bool,

    /// Record store backend; picked from the environment when omitted
    #[arg(long, value_enum, env = "FACILITY_STORE")]
    store: Option<StoreArg>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    config::load_env();
    let args = Args::parse();

    info!("Starting coordinate validation");
    let start_time = Instant::now();

    let reconcile_config = ReconcileConfig {
        distance_threshold_km: args.threshold_km,
        request_delay: Duration::from_millis(args.delay_ms),
        scope: if args.missing_only {
            RecordScope::MissingOnly
        } else {
            RecordScope::All
        },
        dry_run: args.dry_run,
        ..ReconcileConfig::default()
    };

    let mapbox_config = MapboxConfig::from_env().context("Mapbox is not configured")?;
    let geocoder = MapboxGeocoder::new(mapbox_config)?;

    let store_config = StoreConfig::from_env(args.store.map(StoreKind::from))
        .context("Record store is not configured")?;
    let store = open_store(&store_config).await?;
    let store: Box<dyn FacilityStore> = if args.dry_run {
        info!("Dry run: no coordinates will be written");
        Box::new(DryRunStore::new(store))
    } else {
        store
    };

    println!("Starting coordinate validation...");
    println!("Distance threshold: {} km", reconcile_config.distance_threshold_km);
    if reconcile_config.dry_run {
        println!("Dry run: YES (no changes will be made)");
    }
    println!();

    let engine = ReconciliationEngine::new(store.as_ref(), &geocoder, reconcile_config);
    let run_report = engine
        .run_with_progress(|processed, total| {
            println!("Processing {}/{}...", processed, total);
        })
        .await
        .context("Coordinate validation aborted")?;

    print!("{}", report::render_summary(&run_report));

    info!(
        "Coordinate validation completed in {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

async fn open_store(store_config: &StoreConfig) -> Result<Box<dyn FacilityStore>> {
    match store_config {
        StoreConfig::Postgres(settings) => {
            let pool = db::connect(settings)
                .await
                .context("Failed to connect to database")?;
            info!("Successfully connected to the database");
            Ok(Box::new(PgFacilityStore::new(pool)))
        }
        StoreConfig::Supabase(settings) => {
            let store = SupabaseFacilityStore::new(settings)
                .context("Failed to set up Supabase client")?;
            info!("Using Supabase REST store at {}", settings.url);
            Ok(Box::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_only_has_env_fallback() {
        std::env::set_var("MISSING_ONLY", "true");
        let args = Args::try_parse_from(["validate_coordinates"]);
        std::env::remove_var("MISSING_ONLY");

        let args = args.unwrap();
        assert!(args.missing_only);
        assert!(!args.dry_run);
    }
}
