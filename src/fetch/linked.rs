// src/fetch/linked.rs
//
// Linked-data providers: the swisstopo registry crosswalk and the two
// Wikidata population queries.

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, instrument};

use super::sparql::{self, Binding};
use crate::{
    config::Config,
    error::ProviderError,
    model::{CrosswalkRow, ObservationDate, Rank, WikidataCantonRow, WikidataCityRow},
};

// Q70208 municipality of Switzerland, P771 BFS number
fn registry_query(canton_name: &str) -> String {
    let canton_name = canton_name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        r#"
PREFIX schema: <http://schema.org/>
PREFIX gn: <http://www.geonames.org/ontology#>
PREFIX wdt: <http://www.wikidata.org/prop/direct/>
PREFIX wd: <http://www.wikidata.org/entity/>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX st: <https://ld.geo.admin.ch/def/>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>

SELECT ?Municipality ?Name ?bfs ?wikidata_id
WHERE {{
  ?Municipality gn:featureCode gn:A.ADM3 .
  ?Municipality schema:name ?Name .
  ?Municipality gn:population ?Population .
  ?Municipality st:bfsNumber ?bfs .
  ?Municipality dct:issued ?date .
  ?Municipality schema:validUntil ?validuntil .
  ?Municipality gn:parentADM1 ?InCanton .
  ?InCanton schema:name ?CantonName .

  FILTER (now() <= ?validuntil)
  FILTER (?CantonName = '{canton_name}')

  {{
    SELECT DISTINCT (xsd:integer(?bfsWD) AS ?bfs) ?wikidata_id WHERE {{
      SERVICE <https://query.wikidata.org/bigdata/namespace/wdq/sparql> {{
        ?wikidata_id wdt:P771 ?bfsWD .
        ?wikidata_id wdt:P31 wd:Q70208 .
      }}
    }}
  }}
}}
"#
    )
}

// Q11943 Canton of Zürich, P1082 population, P585 point in time,
// P854 reference URL, P123 publisher
const WIKIDATA_CANTON_QUERY: &str = r#"
SELECT ?bfs_id ?wikidata_id ?date ?population ?qualifier ?refurl ?refpublisher
WHERE {
  ?wikidata_id wdt:P771 ?bfs_id .
  ?wikidata_id wdt:P31 wd:Q70208 .
  ?wikidata_id wdt:P131 wd:Q11943 .
  ?wikidata_id p:P1082 ?myvalue .
  ?myvalue pq:P585 ?date .
  ?myvalue ps:P1082 ?population .
  ?myvalue wikibase:rank ?qualifier .
  ?myvalue prov:wasDerivedFrom ?refnode .
  OPTIONAL { ?refnode pr:P854 ?refurl . }
  OPTIONAL { ?refnode pr:P123 ?refpublisher . }
}
ORDER BY ?bfs_id ?date
"#;

// Q19644586 quarter of Zürich
const WIKIDATA_CITY_QUERY: &str = r#"
SELECT ?wikidata_id ?date ?population ?qualifier
WHERE {
  ?wikidata_id wdt:P31 wd:Q19644586 .
  ?wikidata_id p:P1082 ?myvalue .
  ?myvalue pq:P585 ?date .
  ?myvalue ps:P1082 ?population .
  ?myvalue wikibase:rank ?qualifier .
}
"#;

/// BFS number ↔ Wikidata id for the canton's currently valid municipalities.
#[instrument(level = "info", skip_all, fields(canton = %cfg.canton_name))]
pub async fn fetch_registry_crosswalk(client: &Client, cfg: &Config) -> Result<Vec<CrosswalkRow>> {
    let bindings = sparql::select(client, &cfg.registry_endpoint, &registry_query(&cfg.canton_name))
        .await
        .context("querying geographic registry")?;
    let rows = parse_crosswalk(&bindings)?;
    info!(entries = rows.len(), "import registry crosswalk: extracted entries");
    Ok(rows)
}

#[instrument(level = "info", skip_all)]
pub async fn fetch_wikidata_canton(client: &Client, cfg: &Config) -> Result<Vec<WikidataCantonRow>> {
    let bindings = sparql::select(client, &cfg.wikidata_endpoint, WIKIDATA_CANTON_QUERY)
        .await
        .context("querying Wikidata for canton municipalities")?;
    let rows = parse_wikidata_canton(&bindings)?;
    info!(entries = rows.len(), "import Wikidata canton: extracted entries");
    Ok(rows)
}

#[instrument(level = "info", skip_all)]
pub async fn fetch_wikidata_city(client: &Client, cfg: &Config) -> Result<Vec<WikidataCityRow>> {
    let bindings = sparql::select(client, &cfg.wikidata_endpoint, WIKIDATA_CITY_QUERY)
        .await
        .context("querying Wikidata for city quarters")?;
    let rows = parse_wikidata_city(&bindings)?;
    info!(entries = rows.len(), "import Wikidata city: extracted entries");
    Ok(rows)
}

pub fn parse_crosswalk(bindings: &[Binding]) -> Result<Vec<CrosswalkRow>, ProviderError> {
    bindings
        .iter()
        .enumerate()
        .map(|(row, b)| -> Result<CrosswalkRow, ProviderError> {
            Ok(CrosswalkRow {
                name: b.required("Name", row)?.to_string(),
                bfs: b.integer("bfs", row)?,
                wikidata_id: b.entity("wikidata_id", row)?,
            })
        })
        .collect()
}

pub fn parse_wikidata_canton(bindings: &[Binding]) -> Result<Vec<WikidataCantonRow>, ProviderError> {
    bindings
        .iter()
        .enumerate()
        .map(|(row, b)| -> Result<WikidataCantonRow, ProviderError> {
            Ok(WikidataCantonRow {
                wikidata_id: b.entity("wikidata_id", row)?,
                bfs_id: b.integer("bfs_id", row)?,
                date: ObservationDate::parse(b.required("date", row)?)?,
                population: b.integer("population", row)?,
                rank: Rank::parse(b.required("qualifier", row)?)?,
                ref_url: b.optional("refurl").map(str::to_string),
                ref_publisher: b
                    .optional("refpublisher")
                    .map(|p| sparql::strip_entity_prefix(p).to_string()),
            })
        })
        .collect()
}

/// Quarter dates recorded as January 1st move to December 31st of the same
/// year, the convention the city API dates its counts with.
pub fn parse_wikidata_city(bindings: &[Binding]) -> Result<Vec<WikidataCityRow>, ProviderError> {
    bindings
        .iter()
        .enumerate()
        .map(|(row, b)| -> Result<WikidataCityRow, ProviderError> {
            let date = ObservationDate::parse(b.required("date", row)?)?;
            Ok(WikidataCityRow {
                wikidata_id: b.entity("wikidata_id", row)?,
                date: date.new_year_to_end_of_year(),
                population: b.integer("population", row)?,
                rank: Rank::parse(b.required("qualifier", row)?)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(v: serde_json::Value) -> Vec<Binding> {
        sparql::parse_results(&json!({"results": {"bindings": v}}).to_string()).unwrap()
    }

    fn uri(v: &str) -> serde_json::Value {
        json!({"type": "uri", "value": v})
    }

    fn lit(v: &str) -> serde_json::Value {
        json!({"type": "literal", "value": v})
    }

    #[test]
    fn test_parse_crosswalk() {
        let b = bindings(json!([{
            "Municipality": uri("https://ld.geo.admin.ch/boundaries/municipality/261:2021"),
            "Name": lit("Zürich"),
            "bfs": lit("261"),
            "wikidata_id": uri("http://www.wikidata.org/entity/Q72"),
        }]));
        let rows = parse_crosswalk(&b).unwrap();
        assert_eq!(
            rows,
            vec![CrosswalkRow {
                name: "Zürich".into(),
                bfs: 261,
                wikidata_id: "Q72".into(),
            }]
        );
    }

    #[test]
    fn test_parse_wikidata_canton_optional_refs() {
        let b = bindings(json!([
            {
                "bfs_id": lit("261"),
                "wikidata_id": uri("http://www.wikidata.org/entity/Q72"),
                "date": lit("2020-12-31T00:00:00Z"),
                "population": lit("421878"),
                "qualifier": uri("http://wikiba.se/ontology#PreferredRank"),
                "refurl": uri("https://www.bfs.admin.ch/"),
                "refpublisher": uri("http://www.wikidata.org/entity/Q658360"),
            },
            {
                "bfs_id": lit("1"),
                "wikidata_id": uri("http://www.wikidata.org/entity/Q63992"),
                "date": lit("2019-12-31T00:00:00Z"),
                "population": lit("1977"),
                "qualifier": uri("http://wikiba.se/ontology#NormalRank"),
            },
        ]));
        let rows = parse_wikidata_canton(&b).unwrap();

        assert_eq!(rows[0].date.to_string(), "2020-12-31");
        assert_eq!(rows[0].rank, Rank::Preferred);
        assert_eq!(rows[0].ref_publisher.as_deref(), Some("Q658360"));
        assert_eq!(rows[1].bfs_id, 1);
        assert_eq!(rows[1].ref_url, None);
    }

    #[test]
    fn test_parse_wikidata_city_shifts_new_year() {
        let b = bindings(json!([{
            "wikidata_id": uri("http://www.wikidata.org/entity/Q692728"),
            "date": lit("2016-01-01T00:00:00Z"),
            "population": lit("3100"),
            "qualifier": uri("http://wikiba.se/ontology#NormalRank"),
        }]));
        let rows = parse_wikidata_city(&b).unwrap();
        assert_eq!(rows[0].date.to_string(), "2016-12-31");
        assert_eq!(rows[0].wikidata_id, "Q692728");
    }

    #[test]
    fn test_malformed_binding_rejected_early() {
        let b = bindings(json!([{
            "wikidata_id": uri("http://www.wikidata.org/entity/Q692728"),
            "population": lit("3100"),
            "qualifier": uri("http://wikiba.se/ontology#NormalRank"),
        }]));
        assert!(matches!(
            parse_wikidata_city(&b),
            Err(ProviderError::MalformedBinding { ref var, row: 0 }) if var == "date"
        ));
    }

    #[test]
    fn test_registry_query_names_canton() {
        let q = registry_query("Zürich");
        assert!(q.contains("FILTER (?CantonName = 'Zürich')"));
        assert!(registry_query("O'Bern").contains("'O\\'Bern'"));
    }
}
