// src/model.rs

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProviderError;

/// Calendar date of a population count. Always renders as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObservationDate(NaiveDate);

impl ObservationDate {
    /// End-of-year reading for a bare year (`2020` → `2020-12-31`).
    pub fn end_of_year(year: i32) -> Result<Self, ProviderError> {
        if !(1000..=9999).contains(&year) {
            return Err(ProviderError::invalid("year", year.to_string()));
        }
        NaiveDate::from_ymd_opt(year, 12, 31)
            .map(Self)
            .ok_or_else(|| ProviderError::invalid("year", year.to_string()))
    }

    /// Parses `YYYY-MM-DD`, or the date part of an ISO datetime such as
    /// `2020-12-31T00:00:00Z`.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let raw = raw.trim();
        let day = raw
            .get(..10)
            .filter(|_| raw.len() == 10 || raw[10..].starts_with('T'))
            .ok_or_else(|| ProviderError::invalid("date", raw))?;
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|_| ProviderError::invalid("date", raw))?;
        if !(1000..=9999).contains(&date.year()) {
            return Err(ProviderError::invalid("date", raw));
        }
        Ok(Self(date))
    }

    /// Moves a January 1st date to December 31st of the same year.
    pub fn new_year_to_end_of_year(self) -> Self {
        if self.0.month() == 1 && self.0.day() == 1 {
            Self::end_of_year(self.0.year()).unwrap_or(self)
        } else {
            self
        }
    }

    pub fn year(&self) -> String {
        format!("{:04}", self.0.year())
    }
}

impl fmt::Display for ObservationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Statement rank of a Wikidata claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Preferred,
    Normal,
    Deprecated,
}

impl Rank {
    /// Accepts `http://wikiba.se/ontology#NormalRank` or `NormalRank`.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let label = raw.rsplit('#').next().unwrap_or(raw);
        match label {
            "PreferredRank" => Ok(Rank::Preferred),
            "NormalRank" => Ok(Rank::Normal),
            "DeprecatedRank" => Ok(Rank::Deprecated),
            _ => Err(ProviderError::invalid("rank", raw)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Preferred => "PreferredRank",
            Rank::Normal => "NormalRank",
            Rank::Deprecated => "DeprecatedRank",
        }
    }
}

/// One unpivoted cell of the canton export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CantonApiRow {
    pub bfs_nr: u32,
    pub name: String,
    pub date: ObservationDate,
    /// `None` where the export cell was blank.
    pub population: Option<u64>,
}

/// Canton export row that found its knowledge-base identifier in the crosswalk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedCantonRow {
    pub bfs_nr: u32,
    pub name: String,
    pub date: ObservationDate,
    pub population: u64,
    pub wikidata_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityApiRow {
    /// Quarter code as published by the city (`QuarSort`).
    pub quarter: String,
    pub name: String,
    pub date: ObservationDate,
    pub population: u64,
    pub wikidata_id: String,
}

/// Official code to knowledge-base identifier, from the geographic registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrosswalkRow {
    pub name: String,
    pub bfs: u32,
    pub wikidata_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikidataCantonRow {
    pub wikidata_id: String,
    pub bfs_id: u32,
    pub date: ObservationDate,
    pub population: u64,
    pub rank: Rank,
    pub ref_url: Option<String>,
    pub ref_publisher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikidataCityRow {
    pub wikidata_id: String,
    pub date: ObservationDate,
    pub population: u64,
    pub rank: Rank,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_year_is_canonical() {
        let d = ObservationDate::end_of_year(2020).unwrap();
        assert_eq!(d.to_string(), "2020-12-31");
        assert_eq!(d.year(), "2020");
    }

    #[test]
    fn test_parse_accepts_date_and_datetime() {
        assert_eq!(
            ObservationDate::parse("2019-12-31T00:00:00Z").unwrap().to_string(),
            "2019-12-31"
        );
        assert_eq!(
            ObservationDate::parse("2019-06-30").unwrap().to_string(),
            "2019-06-30"
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["2019", "2019-13-01", "31.12.2019", "2019-12-31garbage", ""] {
            assert!(ObservationDate::parse(raw).is_err(), "{raw} should fail");
        }
        assert!(ObservationDate::end_of_year(99).is_err());
    }

    #[test]
    fn test_new_year_shift() {
        let d = ObservationDate::parse("2015-01-01T00:00:00Z").unwrap();
        assert_eq!(d.new_year_to_end_of_year().to_string(), "2015-12-31");
        let d = ObservationDate::parse("2015-06-01").unwrap();
        assert_eq!(d.new_year_to_end_of_year().to_string(), "2015-06-01");
    }

    #[test]
    fn test_rank_parse() {
        assert_eq!(
            Rank::parse("http://wikiba.se/ontology#PreferredRank").unwrap(),
            Rank::Preferred
        );
        assert_eq!(Rank::parse("NormalRank").unwrap(), Rank::Normal);
        assert!(Rank::parse("BestRank").is_err());
    }
}
