// src/fetch/canton.rs

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::io::Cursor;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::zips;
use crate::{
    config::Config,
    error::ProviderError,
    model::{CantonApiRow, ObservationDate},
};

static YEAR_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}$").expect("year header pattern should compile"));

/// Download the canton export, unpack it inside a scoped temp dir, and
/// unpivot it into one row per (municipality, year).
#[instrument(level = "info", skip_all, fields(url = %cfg.canton_export_url))]
pub async fn fetch_canton_api(client: &Client, cfg: &Config) -> Result<Vec<CantonApiRow>> {
    let url = Url::parse(&cfg.canton_export_url)
        .with_context(|| format!("parsing canton export URL {}", cfg.canton_export_url))?;

    // removed on drop, including when anything below bails out
    let workdir = tempfile::Builder::new()
        .prefix("zhpop-canton-")
        .tempdir()
        .context("creating temporary working directory")?;

    let zip_path = zips::download_zip(client, &url, workdir.path(), "dataKt.zip").await?;
    let (entry, data) = zips::read_first_entry(&zip_path)
        .with_context(|| format!("reading {}", zip_path.display()))?;
    debug!(entry = %entry, bytes = data.len(), "unpacked export");

    let rows = unpivot(&data).with_context(|| format!("parsing {}", entry))?;
    workdir
        .close()
        .context("removing temporary working directory")?;

    info!(entries = rows.len(), "import canton export: extracted entries");
    Ok(rows)
}

/// Turn the wide `;`-separated export (code, name, one column per year) into
/// long rows dated `<year>-12-31`, in row-major order.
pub fn unpivot(data: &[u8]) -> Result<Vec<CantonApiRow>, ProviderError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let mut headers: Vec<String> = rdr.byte_headers()?.iter().map(decode_cell).collect();
    if let Some(first) = headers.first_mut() {
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    // the export ends in a non-year column, usually nameless from a trailing separator
    if headers.len() > 2 && headers.last().is_some_and(|h| !YEAR_HEADER.is_match(h.trim())) {
        if let Some(dropped) = headers.pop() {
            if !dropped.trim().is_empty() {
                warn!(header = %dropped, "dropping trailing non-year column");
            }
        }
    }
    if headers.len() < 2 {
        return Err(ProviderError::invalid("header", headers.join(";")));
    }

    let years = headers[2..]
        .iter()
        .map(|h| {
            let h = h.trim();
            if !YEAR_HEADER.is_match(h) {
                return Err(ProviderError::invalid("year column", h));
            }
            let year: i32 = h.parse().map_err(|_| ProviderError::invalid("year column", h))?;
            ObservationDate::end_of_year(year)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record)? {
        let code = record.get(0).map(decode_cell).unwrap_or_default();
        let code = code.trim();
        let bfs_nr: u32 = code
            .parse()
            .map_err(|_| ProviderError::invalid("BFS_NR", code))?;
        let name = record
            .get(1)
            .map(decode_cell)
            .unwrap_or_default()
            .trim()
            .to_string();

        for (offset, date) in years.iter().enumerate() {
            let cell = record.get(offset + 2).map(decode_cell).unwrap_or_default();
            rows.push(CantonApiRow {
                bfs_nr,
                name: name.clone(),
                date: *date,
                population: parse_population(&cell)?,
            });
        }
    }
    Ok(rows)
}

/// UTF-8 where valid, otherwise read as ISO-8859-1.
fn decode_cell(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

fn parse_population(cell: &str) -> Result<Option<u64>, ProviderError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(n) = cell.parse::<u64>() {
        return Ok(Some(n));
    }
    // exports sometimes render counts as floats ("1234.0")
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
        _ => Err(ProviderError::invalid("population", cell)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::zips::tests::write_zip;
    use tempfile::tempdir;

    #[test]
    fn test_unpivot_two_years_one_row() {
        let csv = "BFS_NR;GEBIET_NAME;2019;2020\n261;Zürich;415367;421878\n";
        let rows = unpivot(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.to_string(), "2019-12-31");
        assert_eq!(rows[1].date.to_string(), "2020-12-31");
        assert_eq!(rows[0].bfs_nr, 261);
        assert_eq!(rows[0].name, "Zürich");
        assert_eq!(rows[0].population, Some(415367));
        assert_eq!(rows[1].population, Some(421878));
    }

    #[test]
    fn test_trailing_separator_column_dropped() {
        let csv = "BFS_NR;GEBIET_NAME;2019;2020;\n1;Aeugst a.A.;1977;1990;\n2;Affoltern a.A.;12229;;\n";
        let rows = unpivot(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].bfs_nr, 2);
        assert_eq!(rows[3].population, None);
        assert!(rows
            .iter()
            .all(|r| r.date.to_string().len() == 10 && r.date.to_string().ends_with("-12-31")));
    }

    #[test]
    fn test_latin1_names_decoded() {
        let mut data = b"BFS_NR;GEBIET_NAME;2020\n261;Z".to_vec();
        data.push(0xFC); // ü in ISO-8859-1
        data.extend_from_slice(b"rich;421878\n");
        let rows = unpivot(&data).unwrap();
        assert_eq!(rows[0].name, "Zürich");
    }

    #[test]
    fn test_trailing_named_column_dropped() {
        let csv = "BFS_NR;GEBIET_NAME;2019;2020;Bemerkung\n261;Zürich;1;2;x\n";
        let rows = unpivot(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.to_string(), "2019-12-31");
        assert_eq!(rows[1].date.to_string(), "2020-12-31");
        assert_eq!(rows[1].population, Some(2));
    }

    #[test]
    fn test_non_year_column_rejected() {
        let csv = "BFS_NR;GEBIET_NAME;Bemerkung;2020\n261;Zürich;x;421878\n";
        assert!(matches!(
            unpivot(csv.as_bytes()),
            Err(ProviderError::InvalidField { field: "year column", .. })
        ));
    }

    #[test]
    fn test_bad_code_rejected() {
        let csv = "BFS_NR;GEBIET_NAME;2020\nZH;Kanton;1553423\n";
        assert!(matches!(
            unpivot(csv.as_bytes()),
            Err(ProviderError::InvalidField { field: "BFS_NR", .. })
        ));
    }

    #[test]
    fn test_population_float_form() {
        assert_eq!(parse_population("1234.0").unwrap(), Some(1234));
        assert_eq!(parse_population(" ").unwrap(), None);
        assert!(parse_population("12.5").is_err());
        assert!(parse_population("n/a").is_err());
    }

    #[test]
    fn test_unpivot_from_zip_entry() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("dataKt.zip");
        write_zip(
            &path,
            &[("export.csv", "BFS_NR;GEBIET_NAME;2018;2019;2020;\n261;Zürich;1;2;3;\n")],
        );

        let (_, data) = zips::read_first_entry(&path).unwrap();
        let rows = unpivot(&data).unwrap();
        let dates: Vec<String> = rows.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, ["2018-12-31", "2019-12-31", "2020-12-31"]);
    }
}
