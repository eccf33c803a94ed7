// src/fetch/sparql.rs

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::ProviderError;

pub const WIKIDATA_ENTITY: &str = "http://www.wikidata.org/entity/";

#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    pub bindings: Vec<Binding>,
}

/// One RDF term of a result binding.
#[derive(Debug, Clone, Deserialize)]
pub struct Term {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// One solution row: variable name → term.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Binding(HashMap<String, Term>);

impl Binding {
    /// Value of `var`; `row` is only used for the error.
    pub fn required(&self, var: &str, row: usize) -> Result<&str, ProviderError> {
        self.optional(var)
            .ok_or_else(|| ProviderError::MalformedBinding {
                var: var.to_string(),
                row,
            })
    }

    pub fn optional(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(|t| t.value.as_str())
    }

    /// Bare Wikidata id (`Q72`) from an entity URI.
    pub fn entity(&self, var: &str, row: usize) -> Result<String, ProviderError> {
        self.required(var, row)
            .map(|v| strip_entity_prefix(v).to_string())
    }

    pub fn integer<T: std::str::FromStr>(
        &self,
        var: &'static str,
        row: usize,
    ) -> Result<T, ProviderError> {
        let raw = self.required(var, row)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| ProviderError::invalid(var, raw))
    }
}

pub fn strip_entity_prefix(value: &str) -> &str {
    value.strip_prefix(WIKIDATA_ENTITY).unwrap_or(value)
}

/// Run a SELECT query over HTTP GET and return its bindings.
pub async fn select(client: &Client, endpoint: &str, query: &str) -> Result<Vec<Binding>> {
    debug!(endpoint, query_len = query.len(), "SPARQL select");
    let response: SparqlResponse = client
        .get(endpoint)
        .query(&[("query", query)])
        .header(reqwest::header::ACCEPT, "application/sparql-results+json")
        .send()
        .await
        .with_context(|| format!("SPARQL request to {} failed", endpoint))?
        .error_for_status()
        .with_context(|| format!("Non-success status from {}", endpoint))?
        .json()
        .await
        .with_context(|| format!("Decoding SPARQL results from {}", endpoint))?;
    Ok(response.results.bindings)
}

/// Decode a SPARQL JSON results document.
pub fn parse_results(body: &str) -> Result<Vec<Binding>, ProviderError> {
    let response: SparqlResponse = serde_json::from_str(body)?;
    Ok(response.results.bindings)
}
