// src/store/supabase.rs
//
// Facilities read and written through Supabase's PostgREST endpoint, for
// deployments where only the service key is handed out.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::time::Instant;
use url::Url;

use crate::config::SupabaseSettings;
use crate::error::{StoreError, UpdateError};
use crate::models::{Coordinate, FacilityId, FacilityRecord};

use super::FacilityStore;

const FACILITY_SELECT: &str = "id,company_id,street_address,city,state,zip_code,country,latitude,longitude,companies(company_name)";

// Requested page size. A project's `max-rows` may cap pages below this, so
// only an empty page ends the listing.
const PAGE_SIZE: usize = 1000;

/// The embedded `companies` relation. PostgREST renders a to-one join as an
/// object, but the same select against a view or a many-to-one without a
/// detected foreign key comes back as a list.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CompanyJoin {
    Many(Vec<CompanyRef>),
    One(CompanyRef),
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct CompanyRef {
    #[serde(default)]
    pub company_name: Option<String>,
}

impl CompanyJoin {
    pub fn into_company_name(self) -> Option<String> {
        match self {
            CompanyJoin::One(company) => company.company_name,
            CompanyJoin::Many(companies) => companies.into_iter().next()?.company_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FacilityRow {
    id: FacilityId,
    #[serde(default, deserialize_with = "text_or_number")]
    company_id: Option<String>,
    street_address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    companies: Option<CompanyJoin>,
}

impl From<FacilityRow> for FacilityRecord {
    fn from(row: FacilityRow) -> Self {
        FacilityRecord {
            id: row.id,
            company_id: row.company_id,
            street_address: row.street_address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            country: row.country,
            latitude: row.latitude,
            longitude: row.longitude,
            company_name: row.companies.and_then(CompanyJoin::into_company_name),
        }
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

pub struct SupabaseFacilityStore {
    http: Client,
    facilities_url: Url,
    service_key: String,
}

impl SupabaseFacilityStore {
    pub fn new(settings: &SupabaseSettings) -> Result<Self, StoreError> {
        let base = settings.url.trim_end_matches('/');
        let facilities_url = Url::parse(&format!("{}/rest/v1/facilities", base))
            .map_err(|e| StoreError::Database(format!("invalid Supabase URL {}: {}", base, e)))?;
        let http = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            http,
            facilities_url,
            service_key: settings.service_key.clone(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<FacilityRow>, StoreError> {
        let mut url = self.facilities_url.clone();
        url.query_pairs_mut()
            .append_pair("select", FACILITY_SELECT)
            .append_pair("order", "id")
            .append_pair("limit", &PAGE_SIZE.to_string())
            .append_pair("offset", &offset.to_string());

        let response = self.authorized(self.http.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Vec<FacilityRow>>().await?)
    }
}

#[async_trait]
impl FacilityStore for SupabaseFacilityStore {
    async fn list_facilities(&self) -> Result<Vec<FacilityRecord>, StoreError> {
        let start = Instant::now();
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(offset).await?;
            let page_len = page.len();
            debug!("Fetched page at offset {} with {} facilities", offset, page_len);
            if page_len == 0 {
                break;
            }
            records.extend(page.into_iter().map(FacilityRecord::from));
            offset += page_len;
        }

        info!(
            "Fetched {} facilities from Supabase in {:.2?}",
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
        let mut url = self.facilities_url.clone();
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id))
            .append_pair("select", "id");

        let body = serde_json::json!({
            "latitude": coordinate.latitude,
            "longitude": coordinate.longitude,
        });

        let response = self
            .authorized(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdateError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let touched: Vec<serde_json::Value> = response.json().await?;
        if touched.is_empty() {
            return Err(UpdateError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
