// src/payload.rs
//
// Rebuilds the nested company payload the directory front end loads, from the
// flat DB export, to estimate how large that payload is.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

type Row = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompanyPayload {
    pub id: String,
    pub slug: String,
    pub company_name: String,
    pub dba_name: String,
    pub description: String,
    pub employee_count_range: String,
    pub is_active: String,
    pub website_url: String,
    pub updated_at: String,
    pub facilities: Vec<FacilityPayload>,
    pub capabilities: Vec<CapabilitiesPayload>,
    pub certifications: Vec<CertificationPayload>,
    pub industries: Vec<IndustryPayload>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FacilityPayload {
    pub id: String,
    pub company_id: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub latitude: String,
    pub longitude: String,
    pub facility_type: String,
    pub is_primary: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CapabilitiesPayload {
    pub pcb_assembly_smt: String,
    pub pcb_assembly_through_hole: String,
    pub cable_harness_assembly: String,
    pub box_build_assembly: String,
    pub prototyping: String,
    pub low_volume_production: String,
    pub medium_volume_production: String,
    pub high_volume_production: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CertificationPayload {
    pub id: String,
    pub certification_type: String,
    pub certification_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndustryPayload {
    pub id: String,
    pub industry_name: String,
}

/// Size figures for an assembled payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayloadStats {
    pub companies: usize,
    pub size_bytes: usize,
    pub per_company_bytes: f64,
}

impl PayloadStats {
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

fn field(row: &Row, name: &str) -> Result<String> {
    row.get(name)
        .cloned()
        .ok_or_else(|| anyhow!("CSV export is missing column '{}'", name))
}

/// Accumulates rows keyed by company id. Companies keep first-seen order.
#[derive(Default)]
struct PayloadBuilder {
    companies: Vec<CompanyPayload>,
    index: HashMap<String, usize>,
    facilities: HashMap<String, Vec<FacilityPayload>>,
    capabilities: HashMap<String, CapabilitiesPayload>,
    certifications: HashMap<String, Vec<CertificationPayload>>,
    industries: HashMap<String, Vec<IndustryPayload>>,
}

impl PayloadBuilder {
    fn add_row(&mut self, row: &Row) -> Result<()> {
        let table_name = field(row, "table_name")?;
        match table_name.as_str() {
            "companies" => {
                let company = CompanyPayload {
                    id: field(row, "companies.id")?,
                    slug: field(row, "companies.slug")?,
                    company_name: field(row, "companies.company_name")?,
                    dba_name: field(row, "companies.dba_name")?,
                    description: field(row, "companies.description")?,
                    employee_count_range: field(row, "companies.employee_count_range")?,
                    is_active: field(row, "companies.is_active")?,
                    website_url: field(row, "companies.website_url")?,
                    updated_at: field(row, "companies.updated_at")?,
                    facilities: Vec::new(),
                    capabilities: Vec::new(),
                    certifications: Vec::new(),
                    industries: Vec::new(),
                };
                match self.index.get(&company.id) {
                    Some(&pos) => self.companies[pos] = company,
                    None => {
                        self.index.insert(company.id.clone(), self.companies.len());
                        self.companies.push(company);
                    }
                }
            }
            "facilities" => {
                let company_id = field(row, "company_id")?;
                let facility = FacilityPayload {
                    id: field(row, "id")?,
                    company_id: company_id.clone(),
                    city: field(row, "city")?,
                    state: field(row, "state")?,
                    country: field(row, "country")?,
                    latitude: field(row, "latitude")?,
                    longitude: field(row, "longitude")?,
                    facility_type: field(row, "facility_type")?,
                    is_primary: field(row, "is_primary")?,
                };
                self.facilities.entry(company_id).or_default().push(facility);
            }
            "capabilities" => {
                let company_id = field(row, "company_id")?;
                let capabilities = CapabilitiesPayload {
                    pcb_assembly_smt: field(row, "pcb_assembly_smt")?,
                    pcb_assembly_through_hole: field(row, "pcb_assembly_through_hole")?,
                    cable_harness_assembly: field(row, "cable_harness_assembly")?,
                    box_build_assembly: field(row, "box_build_assembly")?,
                    prototyping: field(row, "prototyping")?,
                    low_volume_production: field(row, "low_volume_production")?,
                    medium_volume_production: field(row, "medium_volume_production")?,
                    high_volume_production: field(row, "high_volume_production")?,
                };
                self.capabilities.insert(company_id, capabilities);
            }
            "certifications" => {
                let company_id = field(row, "company_id")?;
                // The export carries no separate name column.
                let certification_type = field(row, "certification_type")?;
                let certification = CertificationPayload {
                    id: field(row, "id")?,
                    certification_name: certification_type.clone(),
                    certification_type,
                };
                self.certifications
                    .entry(company_id)
                    .or_default()
                    .push(certification);
            }
            "industries" => {
                let company_id = field(row, "company_id")?;
                let industry = IndustryPayload {
                    id: field(row, "id")?,
                    industry_name: field(row, "industry_name")?,
                };
                self.industries.entry(company_id).or_default().push(industry);
            }
            other => debug!("Ignoring row for table '{}'", other),
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<CompanyPayload> {
        let mut payload: Vec<CompanyPayload> = self
            .companies
            .into_iter()
            .map(|mut company| {
                company.facilities = self.facilities.remove(&company.id).unwrap_or_default();
                company.capabilities = self
                    .capabilities
                    .remove(&company.id)
                    .into_iter()
                    .collect();
                company.certifications = self
                    .certifications
                    .remove(&company.id)
                    .unwrap_or_default();
                company.industries = self.industries.remove(&company.id).unwrap_or_default();
                company
            })
            .collect();

        // sort_by is stable, so ties keep first-seen order.
        payload.sort_by(|a, b| a.company_name.cmp(&b.company_name));
        payload
    }
}

/// Assembles the nested payload from any CSV source with a header row.
pub fn assemble_payload<R: Read>(reader: R) -> Result<Vec<CompanyPayload>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut builder = PayloadBuilder::default();

    for (line, record) in csv_reader.deserialize::<Row>().enumerate() {
        let row = record.with_context(|| format!("Failed to parse CSV row {}", line + 1))?;
        builder
            .add_row(&row)
            .with_context(|| format!("Invalid CSV row {}", line + 1))?;
    }

    Ok(builder.finish())
}

pub fn load_payload(path: &Path) -> Result<Vec<CompanyPayload>> {
    info!("Reading company export from {}", path.display());
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    assemble_payload(file)
}

/// Writes `", "` and `": "` between items. Payload sizes are reported for
/// this layout.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}

fn to_spaced_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value
        .serialize(&mut serializer)
        .context("Failed to encode payload as JSON")?;
    Ok(buf)
}

pub fn payload_stats(payload: &[CompanyPayload]) -> Result<PayloadStats> {
    let size_bytes = to_spaced_json(payload)?.len();
    Ok(PayloadStats {
        companies: payload.len(),
        size_bytes,
        per_company_bytes: size_bytes as f64 / payload.len().max(1) as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "table_name,companies.id,companies.slug,companies.company_name,companies.dba_name,companies.description,companies.employee_count_range,companies.is_active,companies.website_url,companies.updated_at,id,company_id,city,state,country,latitude,longitude,facility_type,is_primary,pcb_assembly_smt,pcb_assembly_through_hole,cable_harness_assembly,box_build_assembly,prototyping,low_volume_production,medium_volume_production,high_volume_production,certification_type,industry_name";

    fn company_row(id: &str, name: &str) -> String {
        format!(
            "companies,{id},{id}-slug,{name},,desc,10-50,true,https://{id}.example,2024-01-01,,,,,,,,,,,,,,,,,,,"
        )
    }

    fn csv(rows: &[String]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text
    }

    #[test]
    fn groups_children_and_sorts_by_name() {
        let data = csv(&[
            company_row("c2", "Zeta Circuits"),
            company_row("c1", "Alpha Assembly"),
            "facilities,,,,,,,,,,f1,c1,Austin,TX,US,30.2,-97.7,manufacturing,true,,,,,,,,,,".to_string(),
            "facilities,,,,,,,,,,f2,c1,Dallas,TX,US,,,office,false,,,,,,,,,,".to_string(),
            "capabilities,,,,,,,,,,,c1,,,,,,,,true,false,true,false,true,true,false,false,,".to_string(),
            "certifications,,,,,,,,,,cert1,c2,,,,,,,,,,,,,,,,ISO 9001,".to_string(),
            "industries,,,,,,,,,,ind1,c2,,,,,,,,,,,,,,,,,Aerospace".to_string(),
            "facilities,,,,,,,,,,f9,ghost,Nowhere,,,,,,,,,,,,,,,,".to_string(),
        ]);

        let payload = assemble_payload(data.as_bytes()).unwrap();

        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].company_name, "Alpha Assembly");
        assert_eq!(payload[0].facilities.len(), 2);
        assert_eq!(payload[0].facilities[0].city, "Austin");
        assert_eq!(payload[0].capabilities.len(), 1);
        assert_eq!(payload[0].capabilities[0].pcb_assembly_smt, "true");
        assert!(payload[0].certifications.is_empty());

        assert_eq!(payload[1].company_name, "Zeta Circuits");
        assert!(payload[1].facilities.is_empty());
        assert!(payload[1].capabilities.is_empty());
        assert_eq!(payload[1].certifications[0].certification_type, "ISO 9001");
        assert_eq!(payload[1].certifications[0].certification_name, "ISO 9001");
        assert_eq!(payload[1].industries[0].industry_name, "Aerospace");
    }

    #[test]
    fn repeated_company_replaces_fields_but_keeps_children() {
        let data = csv(&[
            company_row("c1", "Old Name"),
            "facilities,,,,,,,,,,f1,c1,Austin,TX,US,,,,,,,,,,,,,,".to_string(),
            company_row("c1", "New Name"),
        ]);

        let payload = assemble_payload(data.as_bytes()).unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].company_name, "New Name");
        assert_eq!(payload[0].facilities.len(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let data = "table_name,id\nfacilities,f1\n";
        let err = assemble_payload(data.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("company_id"));
    }

    #[test]
    fn stats_for_empty_payload_do_not_divide_by_zero() {
        let stats = payload_stats(&[]).unwrap();
        assert_eq!(stats.companies, 0);
        assert_eq!(stats.size_bytes, 2);
        assert_eq!(stats.per_company_bytes, 2.0);
    }

    #[test]
    fn size_counts_spaced_separators() {
        let value = serde_json::json!({"a": [1, 2], "b": {}, "c": "é"});
        let encoded = to_spaced_json(&value).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert_eq!(text, r#"{"a": [1, 2], "b": {}, "c": "é"}"#);
        // "é" is two bytes in UTF-8.
        assert_eq!(text.len(), 33);
    }

    #[test]
    fn load_payload_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, csv(&[company_row("c1", "Acme")])).unwrap();

        let payload = load_payload(&path).unwrap();
        let stats = payload_stats(&payload).unwrap();
        assert_eq!(stats.companies, 1);
        assert_eq!(stats.size_bytes as f64, stats.per_company_bytes);
    }
}
