// src/report.rs

use std::fmt::Write;

use crate::models::{OutcomeStatus, ReconciliationOutcome, RunReport};

/// How many error outcomes the summary lists before truncating.
pub const MAX_ERROR_SAMPLES: usize = 10;

const HEAVY_RULE: &str = "═════════════════════════════════════════";
const LIGHT_RULE: &str = "─────────────────────────────────────────";

/// Renders the end-of-run block printed by the CLI: counts, every updated
/// facility with old and new coordinates, and a sample of errors.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    // Writing into a String cannot fail.
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", HEAVY_RULE);
    if report.dry_run {
        let _ = writeln!(out, "VALIDATION SUMMARY (DRY RUN, nothing was written)");
    } else {
        let _ = writeln!(out, "VALIDATION SUMMARY");
    }
    let _ = writeln!(out, "{}", HEAVY_RULE);
    let _ = writeln!(out, "Run ID: {}", report.run_id);
    let _ = writeln!(
        out,
        "Duration: {:.1}s",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
    if report.fetched != summary.processed {
        let _ = writeln!(out, "Facilities fetched: {}", report.fetched);
    }
    let _ = writeln!(out, "Total processed: {}", summary.processed);
    let _ = writeln!(out, "Updated: {}", summary.updated);
    let _ = writeln!(out, "Errors: {}", summary.errors);
    let _ = writeln!(out, "Unchanged: {}", summary.unchanged);
    let _ = writeln!(out);

    if summary.updated > 0 {
        let _ = writeln!(out, "Updated Facilities:");
        let _ = writeln!(out, "{}", LIGHT_RULE);
        for outcome in report.with_status(OutcomeStatus::Updated) {
            write_updated(&mut out, outcome);
        }
    }

    if summary.errors > 0 {
        let _ = writeln!(out, "Failed Geocodings:");
        let _ = writeln!(out, "{}", LIGHT_RULE);
        let error_outcomes: Vec<&ReconciliationOutcome> =
            report.with_status(OutcomeStatus::Error).collect();
        for outcome in error_outcomes.iter().take(MAX_ERROR_SAMPLES) {
            let _ = writeln!(
                out,
                "  {}: {}",
                outcome.company_name,
                outcome.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        if error_outcomes.len() > MAX_ERROR_SAMPLES {
            let _ = writeln!(
                out,
                "  ... and {} more",
                error_outcomes.len() - MAX_ERROR_SAMPLES
            );
        }
    }

    let _ = writeln!(out, "{}", HEAVY_RULE);
    let _ = writeln!(out, "Validation complete!");
    out
}

fn write_updated(out: &mut String, outcome: &ReconciliationOutcome) {
    let old = &outcome.current_coordinate;
    let _ = writeln!(out, "  {} ({})", outcome.company_name, outcome.facility_id);
    let _ = writeln!(
        out,
        "    Old: {}, {}",
        optional_degrees(old.latitude),
        optional_degrees(old.longitude)
    );
    if let Some(new) = outcome.new_coordinate {
        let _ = writeln!(out, "    New: {:.6}, {:.6}", new.latitude, new.longitude);
    }
    if let Some(distance) = outcome.distance_km {
        let _ = writeln!(out, "    Distance: {:.2}km", distance);
    }
    let _ = writeln!(out);
}

fn optional_degrees(value: Option<f64>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, FacilityId, RunSummary, StoredCoordinate};
    use chrono::Utc;

    fn outcome(
        id: &str,
        status: OutcomeStatus,
        current: (Option<f64>, Option<f64>),
        new: Option<Coordinate>,
        distance_km: Option<f64>,
        error: Option<&str>,
    ) -> ReconciliationOutcome {
        ReconciliationOutcome {
            facility_id: FacilityId::from(id),
            company_name: format!("Company {}", id),
            formatted_address: "1 Main St, Town".to_string(),
            current_coordinate: StoredCoordinate {
                latitude: current.0,
                longitude: current.1,
            },
            new_coordinate: new,
            distance_km,
            status,
            error_message: error.map(String::from),
        }
    }

    fn report(outcomes: Vec<ReconciliationOutcome>) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: "run-1".to_string(),
            started_at: now,
            finished_at: now,
            dry_run: false,
            fetched: outcomes.len(),
            summary: RunSummary::from_outcomes(&outcomes),
            outcomes,
        }
    }

    #[test]
    fn lists_updated_facilities_with_old_and_new() {
        let text = render_summary(&report(vec![
            outcome(
                "a",
                OutcomeStatus::Updated,
                (Some(40.0), Some(-74.0)),
                Some(Coordinate::new(41.0, -74.0)),
                Some(111.19),
                None,
            ),
            outcome(
                "b",
                OutcomeStatus::Updated,
                (None, None),
                Some(Coordinate::new(30.2672, -97.7431)),
                None,
                None,
            ),
        ]));

        assert!(text.contains("Total processed: 2"));
        assert!(text.contains("Updated: 2"));
        assert!(text.contains("  Company a (a)\n    Old: 40, -74\n    New: 41.000000, -74.000000\n    Distance: 111.19km"));
        assert!(text.contains("  Company b (b)\n    Old: None, None\n    New: 30.267200, -97.743100\n\n"));
        assert!(!text.contains("Failed Geocodings"));
    }

    #[test]
    fn truncates_error_samples() {
        let outcomes = (0..13)
            .map(|i| {
                outcome(
                    &i.to_string(),
                    OutcomeStatus::Error,
                    (None, None),
                    None,
                    None,
                    Some("Geocoding failed"),
                )
            })
            .collect();
        let text = render_summary(&report(outcomes));

        assert!(text.contains("Errors: 13"));
        assert_eq!(text.matches(": Geocoding failed").count(), MAX_ERROR_SAMPLES);
        assert!(text.contains("  ... and 3 more"));
    }

    #[test]
    fn dry_run_is_flagged_in_header() {
        let mut r = report(vec![]);
        r.dry_run = true;
        let text = render_summary(&r);
        assert!(text.contains("DRY RUN"));
        assert!(text.contains("Unchanged: 0"));
    }
}
