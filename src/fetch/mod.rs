// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::Config;

pub mod canton;
pub mod city;
pub mod linked;
pub mod sparql;
pub mod zips;

/// Shared HTTP client. No timeouts or retries: a failed request aborts the run.
pub fn http_client(cfg: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .gzip(true)
        .build()
        .context("building HTTP client")
}

pub(crate) async fn get_bytes(client: &Client, url: &Url) -> Result<Vec<u8>> {
    debug!(%url, "GET bytes");
    let bytes = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .bytes()
        .await
        .with_context(|| format!("Reading body from {}", url))?;
    Ok(bytes.to_vec())
}

pub(crate) async fn get_json<T: DeserializeOwned>(client: &Client, url: &Url) -> Result<T> {
    debug!(%url, "GET json");
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .json::<T>()
        .await
        .with_context(|| format!("Decoding JSON from {}", url))
}
