// src/bin/estimate_company_payload.rs
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use facility_geo_lib::payload;

/// Estimate the size of the nested company payload built from the DB export
#[derive(Debug, Parser)]
#[command(name = "estimate_company_payload")]
struct Args {
    /// Path to the flat CSV export
    #[arg(default_value = "data/EMS_Companies_Database_-_DB_Export.csv")]
    export: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = Args::parse();
    let payload = payload::load_payload(&args.export)?;
    info!("Assembled {} companies", payload.len());

    let stats = payload::payload_stats(&payload)?;
    println!("Companies analysed: {}", stats.companies);
    println!(
        "Payload size: {} bytes (~{:.1} KB)",
        stats.size_bytes,
        stats.size_kb()
    );
    println!("Approx per-company footprint: {:.1} bytes", stats.per_company_bytes);
    Ok(())
}
