// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Endpoints and knobs for one comparison run.
///
/// Every field has a production default, so a YAML file only needs the keys
/// it wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Zip export of the canton's population indicator (wide, one column per year).
    pub canton_export_url: String,
    /// CKAN `datastore_search` action of the city's open-data portal.
    pub city_datastore_url: String,
    pub city_population_resource: String,
    pub city_mapping_resource: String,
    /// Records requested per datastore page.
    pub city_page_size: usize,
    pub registry_endpoint: String,
    pub wikidata_endpoint: String,
    /// Canton whose municipalities the registry query keeps.
    pub canton_name: String,
    pub user_agent: String,
    /// Rows shown per table preview.
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canton_export_url:
                "https://www.web.statistik.zh.ch:8443/gp/GP?type=EXPORT&indikatoren=133&raumtyp=1&export=csv"
                    .into(),
            city_datastore_url: "https://data.stadt-zuerich.ch/api/3/action/datastore_search".into(),
            city_population_resource: "570f006e-2f2a-4b1f-9233-c4916c753475".into(),
            city_mapping_resource: "0090f2ed-1df9-4953-9561-5d413fd74758".into(),
            city_page_size: 10_000,
            registry_endpoint: "https://ld.geo.admin.ch/query".into(),
            wikidata_endpoint: "https://query.wikidata.org/sparql".into(),
            canton_name: "Zürich".into(),
            user_agent: concat!(
                "zhpop/",
                env!("CARGO_PKG_VERSION"),
                " (population reconciliation)"
            )
            .into(),
            preview_rows: 5,
        }
    }
}

impl Config {
    /// Read a YAML override file on top of the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        if cfg.city_page_size == 0 {
            anyhow::bail!("city_page_size must be at least 1");
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = Config::from_yaml("canton_name: Bern\npreview_rows: 10\n").unwrap();
        assert_eq!(cfg.canton_name, "Bern");
        assert_eq!(cfg.preview_rows, 10);
        assert_eq!(cfg.wikidata_endpoint, Config::default().wikidata_endpoint);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(Config::from_yaml("city_page_size: 0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "registry_endpoint: http://localhost:7878/query").unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.registry_endpoint, "http://localhost:7878/query");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("nope.yaml")).is_err());
    }
}
