// src/reconcile/address.rs

use crate::models::FacilityRecord;

/// Fewer components than this and the geocoder is not worth asking.
pub const MIN_ADDRESS_COMPONENTS: usize = 2;

/// Joins the non-empty address fields in street → country order.
pub fn format_address(record: &FacilityRecord) -> String {
    [
        record.street_address.as_deref(),
        record.city.as_deref(),
        record.state.as_deref(),
        record.zip_code.as_deref(),
        record.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn is_usable_address(address: &str) -> bool {
    !address.is_empty() && address.split(',').count() >= MIN_ADDRESS_COMPONENTS
}
