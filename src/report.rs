// src/report.rs

use std::{collections::BTreeSet, fmt::Write as _};

use crate::model::{
    CantonApiRow, CityApiRow, CrosswalkRow, JoinedCantonRow, WikidataCantonRow, WikidataCityRow,
};

/// A row that can be printed as part of a text table.
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map_or_else(|| "NA".to_string(), T::to_string)
}

impl Tabular for CantonApiRow {
    fn headers() -> &'static [&'static str] {
        &["BFS_NR", "GEBIET_NAME", "date", "population"]
    }
    fn cells(&self) -> Vec<String> {
        vec![
            self.bfs_nr.to_string(),
            self.name.clone(),
            self.date.to_string(),
            opt(&self.population),
        ]
    }
}

impl Tabular for JoinedCantonRow {
    fn headers() -> &'static [&'static str] {
        &["BFS_NR", "GEBIET_NAME", "date", "population", "wikidata_id"]
    }
    fn cells(&self) -> Vec<String> {
        vec![
            self.bfs_nr.to_string(),
            self.name.clone(),
            self.date.to_string(),
            self.population.to_string(),
            self.wikidata_id.clone(),
        ]
    }
}

impl Tabular for CityApiRow {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "date", "population", "wikidata_id"]
    }
    fn cells(&self) -> Vec<String> {
        vec![
            self.quarter.clone(),
            self.name.clone(),
            self.date.to_string(),
            self.population.to_string(),
            self.wikidata_id.clone(),
        ]
    }
}

impl Tabular for CrosswalkRow {
    fn headers() -> &'static [&'static str] {
        &["Name", "bfs", "wikidata_id"]
    }
    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.bfs.to_string(), self.wikidata_id.clone()]
    }
}

impl Tabular for WikidataCantonRow {
    fn headers() -> &'static [&'static str] {
        &[
            "wikidata_id",
            "bfs_id",
            "date",
            "population",
            "qualifier",
            "refurl",
            "refpublisher",
        ]
    }
    fn cells(&self) -> Vec<String> {
        vec![
            self.wikidata_id.clone(),
            self.bfs_id.to_string(),
            self.date.to_string(),
            self.population.to_string(),
            self.rank.label().to_string(),
            opt(&self.ref_url),
            opt(&self.ref_publisher),
        ]
    }
}

impl Tabular for WikidataCityRow {
    fn headers() -> &'static [&'static str] {
        &["wikidata_id", "date", "population", "qualifier"]
    }
    fn cells(&self) -> Vec<String> {
        vec![
            self.wikidata_id.clone(),
            self.date.to_string(),
            self.population.to_string(),
            self.rank.label().to_string(),
        ]
    }
}

/// Render up to `limit` rows as an aligned table with a leading index column.
pub fn render_table<'a, T: Tabular + 'a>(rows: impl IntoIterator<Item = &'a T>, limit: usize) -> String {
    let body: Vec<Vec<String>> = rows
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, r)| {
            let mut cells = vec![i.to_string()];
            cells.extend(r.cells());
            cells
        })
        .collect();

    let mut header = vec![String::new()];
    header.extend(T::headers().iter().map(|h| h.to_string()));

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for line in std::iter::once(&header).chain(body.iter()) {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:>w$}", cell, w = *w))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    }
    out
}

/// Print a titled preview of the first `limit` rows, like a dataframe head.
pub fn preview<T: Tabular>(title: &str, rows: &[T], limit: usize) {
    println!("{}", title);
    print!("{}", render_table(rows, limit));
    println!("[{} rows total]", rows.len());
}

pub fn render_missing_years(years: &BTreeSet<String>) -> String {
    let listed: Vec<String> = years.iter().map(|y| format!("'{}'", y)).collect();
    format!("NOT IN THE DATASET\n[{}]\n", listed.join(" "))
}

pub fn print_missing_years(label: &str, years: &BTreeSet<String>) {
    println!("{}", label);
    print!("{}", render_missing_years(years));
}
