// src/reconcile.rs

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
};
use tracing::{debug, info};

use crate::{
    error::ReconcileError,
    model::{
        CantonApiRow, CityApiRow, CrosswalkRow, JoinedCantonRow, ObservationDate,
        WikidataCantonRow, WikidataCityRow,
    },
};

pub const KEY_SEPARATOR: &str = "---";

/// `"<YYYY-MM-DD>---<identifier>"`: one population fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Identifiers must be non-empty and free of the separator.
    pub fn new(date: &ObservationDate, id: &str) -> Result<Self, ReconcileError> {
        if id.is_empty() || id.contains(KEY_SEPARATOR) {
            return Err(ReconcileError::InvalidIdentifier(id.to_string()));
        }
        Ok(Self(format!("{}{}{}", date, KEY_SEPARATOR, id)))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rows that carry an observation date.
pub trait Dated {
    fn date(&self) -> &ObservationDate;
}

macro_rules! impl_dated {
    ($($ty:ty),* $(,)?) => {
        $(impl Dated for $ty {
            fn date(&self) -> &ObservationDate {
                &self.date
            }
        })*
    };
}

impl_dated!(
    CantonApiRow,
    JoinedCantonRow,
    CityApiRow,
    WikidataCantonRow,
    WikidataCityRow,
);

/// Outcome of comparing an authoritative table against a knowledge-base table.
#[derive(Debug)]
pub struct Reconciliation<'a, A> {
    pub authoritative: usize,
    pub knowledge_base: usize,
    /// Authoritative rows without a matching key, in input order.
    pub unmatched: Vec<&'a A>,
}

impl<A: Dated> Reconciliation<'_, A> {
    /// Distinct years with at least one unmatched row.
    pub fn missing_years(&self) -> BTreeSet<String> {
        self.unmatched.iter().map(|r| r.date().year()).collect()
    }

    fn log_summary(&self, scope: &str) {
        info!(
            scope,
            unmatched = self.unmatched.len(),
            "compare: {} stat entries with {} wikidata entries",
            self.authoritative,
            self.knowledge_base
        );
    }
}

/// Select authoritative rows whose `(date, id)` key is absent from the
/// knowledge base. `auth_id` and `kb_id` must yield ids in the same scheme;
/// matching is exact string equality.
pub fn reconcile<'a, A, K>(
    authoritative: &'a [A],
    knowledge_base: &[K],
    auth_id: impl Fn(&A) -> String,
    kb_id: impl Fn(&K) -> String,
) -> Result<Reconciliation<'a, A>, ReconcileError>
where
    A: Dated,
    K: Dated,
{
    let known: HashSet<CompositeKey> = knowledge_base
        .iter()
        .map(|r| CompositeKey::new(r.date(), &kb_id(r)))
        .collect::<Result<_, _>>()?;

    let mut unmatched = Vec::new();
    for row in authoritative {
        let key = CompositeKey::new(row.date(), &auth_id(row))?;
        if !known.contains(&key) {
            debug!(key = %key, "not in knowledge base");
            unmatched.push(row);
        }
    }

    Ok(Reconciliation {
        authoritative: authoritative.len(),
        knowledge_base: knowledge_base.len(),
        unmatched,
    })
}

/// Canton comparison keyed on BFS number on both sides.
pub fn compare_canton<'a>(
    knowledge_base: &[WikidataCantonRow],
    joined: &'a [JoinedCantonRow],
) -> Result<Reconciliation<'a, JoinedCantonRow>, ReconcileError> {
    let rec = reconcile(
        joined,
        knowledge_base,
        |r| r.bfs_nr.to_string(),
        |r| r.bfs_id.to_string(),
    )?;
    rec.log_summary("canton");
    Ok(rec)
}

/// City comparison keyed on the Wikidata id on both sides.
pub fn compare_city<'a>(
    knowledge_base: &[WikidataCityRow],
    api: &'a [CityApiRow],
) -> Result<Reconciliation<'a, CityApiRow>, ReconcileError> {
    let rec = reconcile(
        api,
        knowledge_base,
        |r| r.wikidata_id.clone(),
        |r| r.wikidata_id.clone(),
    )?;
    rec.log_summary("city");
    Ok(rec)
}

/// Left join on BFS number, then drop rows with no crosswalk match or no
/// population count. Duplicate crosswalk entries each produce a row.
pub fn join_crosswalk(rows: &[CantonApiRow], crosswalk: &[CrosswalkRow]) -> Vec<JoinedCantonRow> {
    let mut by_bfs: HashMap<u32, Vec<&CrosswalkRow>> = HashMap::new();
    for c in crosswalk {
        by_bfs.entry(c.bfs).or_default().push(c);
    }

    let joined: Vec<JoinedCantonRow> = rows
        .iter()
        .filter_map(|r| Some((r, r.population?, by_bfs.get(&r.bfs_nr)?)))
        .flat_map(|(r, population, matches)| {
            matches.iter().map(move |c| JoinedCantonRow {
                bfs_nr: r.bfs_nr,
                name: r.name.clone(),
                date: r.date,
                population,
                wikidata_id: c.wikidata_id.clone(),
            })
        })
        .collect();

    debug!(
        input = rows.len(),
        crosswalk = crosswalk.len(),
        joined = joined.len(),
        "crosswalk join"
    );
    joined
}
