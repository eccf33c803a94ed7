// src/fetch/city.rs

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use url::Url;

use super::sparql::strip_entity_prefix;
use crate::{
    config::Config,
    error::ProviderError,
    model::{CityApiRow, ObservationDate},
};

/// CKAN response envelope.
#[derive(Debug, Deserialize)]
pub struct CkanEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    pub result: Option<CkanPage<T>>,
}

#[derive(Debug, Deserialize)]
pub struct CkanPage<T> {
    pub records: Vec<T>,
    #[serde(default)]
    pub total: Option<usize>,
}

impl<T> CkanEnvelope<T> {
    fn into_page(self, endpoint: &str) -> Result<CkanPage<T>, ProviderError> {
        match (self.success, self.result) {
            (true, Some(page)) => Ok(page),
            _ => Err(ProviderError::Api {
                endpoint: endpoint.to_string(),
                message: self
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "success=false".into()),
            }),
        }
    }
}

/// Datastore values arrive as numbers or as text depending on the column type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Decimal string form; numeric text loses leading zeros.
    fn code(&self, field: &'static str) -> Result<String, ProviderError> {
        self.integer(field).map(|n| n.to_string())
    }

    fn integer(&self, field: &'static str) -> Result<u64, ProviderError> {
        match self {
            Scalar::Int(n) if *n >= 0 => Ok(*n as u64),
            Scalar::Float(f) if f.is_finite() && *f >= 0.0 && f.fract() == 0.0 => Ok(*f as u64),
            Scalar::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| ProviderError::invalid(field, s.as_str())),
            other => Err(ProviderError::invalid(field, format!("{:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulationRecord {
    #[serde(rename = "QuarSort")]
    pub quarter: Scalar,
    #[serde(rename = "QuarLang")]
    pub name: String,
    #[serde(rename = "StichtagDatJahr")]
    pub year: Scalar,
    #[serde(rename = "AnzBestWir")]
    pub population: Scalar,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingRecord {
    #[serde(rename = "QNr")]
    pub quarter: Scalar,
    #[serde(rename = "DataItemNr")]
    pub wikidata_id: String,
}

/// Fetch city population counts and attach each quarter's Wikidata id.
#[instrument(level = "info", skip_all)]
pub async fn fetch_city_api(client: &Client, cfg: &Config) -> Result<Vec<CityApiRow>> {
    let population: Vec<PopulationRecord> =
        fetch_all_records(client, cfg, &cfg.city_population_resource)
            .await
            .context("fetching city population records")?;
    let mapping: Vec<MappingRecord> = fetch_all_records(client, cfg, &cfg.city_mapping_resource)
        .await
        .context("fetching city quarter mapping")?;

    let rows = apply_mapping(population, mapping)?;
    info!(entries = rows.len(), "import city API: extracted entries");
    Ok(rows)
}

/// Page through one datastore resource until `total` is reached or a page comes back empty.
async fn fetch_all_records<T: DeserializeOwned>(
    client: &Client,
    cfg: &Config,
    resource_id: &str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    loop {
        let url = page_url(&cfg.city_datastore_url, resource_id, cfg.city_page_size, out.len())?;
        let envelope: CkanEnvelope<T> = super::get_json(client, &url).await?;
        let page = envelope.into_page(&cfg.city_datastore_url)?;

        let n = page.records.len();
        out.extend(page.records);
        debug!(resource = resource_id, page = n, so_far = out.len(), total = ?page.total, "datastore page");

        if is_last_page(n, out.len(), page.total, cfg.city_page_size) {
            break;
        }
    }
    Ok(out)
}

/// An empty page always ends paging; otherwise stop at `total`, or on a
/// short page when the datastore reports no total.
fn is_last_page(page_len: usize, so_far: usize, total: Option<usize>, page_size: usize) -> bool {
    if page_len == 0 {
        return true;
    }
    match total {
        Some(total) => so_far >= total,
        None => page_len < page_size,
    }
}

fn page_url(base: &str, resource_id: &str, limit: usize, offset: usize) -> Result<Url> {
    let mut url =
        Url::parse(base).with_context(|| format!("parsing datastore URL {}", base))?;
    url.query_pairs_mut()
        .append_pair("resource_id", resource_id)
        .append_pair("limit", &limit.to_string())
        .append_pair("offset", &offset.to_string());
    Ok(url)
}

/// Join population records to the quarter mapping by quarter code.
/// Any record whose code has no mapping entry fails the whole table.
pub fn apply_mapping(
    population: Vec<PopulationRecord>,
    mapping: Vec<MappingRecord>,
) -> Result<Vec<CityApiRow>, ProviderError> {
    let lookup: HashMap<String, String> = mapping
        .into_iter()
        .map(|m| {
            let code = m.quarter.code("QNr")?;
            Ok::<_, ProviderError>((code, strip_entity_prefix(m.wikidata_id.trim()).to_string()))
        })
        .collect::<Result<_, _>>()?;

    population
        .into_iter()
        .map(|rec| -> Result<CityApiRow, ProviderError> {
            let quarter = rec.quarter.code("QuarSort")?;
            let wikidata_id = lookup
                .get(&quarter)
                .cloned()
                .ok_or_else(|| ProviderError::MissingMapping {
                    code: quarter.clone(),
                })?;
            let year = rec.year.integer("StichtagDatJahr")?;
            let year = i32::try_from(year)
                .map_err(|_| ProviderError::invalid("StichtagDatJahr", year.to_string()))?;
            Ok(CityApiRow {
                quarter,
                name: rec.name,
                date: ObservationDate::end_of_year(year)?,
                population: rec.population.integer("AnzBestWir")?,
                wikidata_id,
            })
        })
        .collect()
}
