//! Tabular containers for Google Trends results.
//!
//! Interest-over-time data is a table keyed by timestamp with one column per
//! keyword. Per-keyword tables are merged with an outer join on the time index.
//! Related-queries data is a pair of `top` / `rising` tables per keyword that are
//! concatenated row-wise with an `Original Keyword` provenance column.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Interest over time: rows keyed by timestamp, one value column per keyword.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesTable {
    columns: Vec<String>,
    rows: BTreeMap<DateTime<Utc>, Vec<Option<u32>>>,
}

impl TimeSeriesTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-keyword table from `(timestamp, value)` points.
    ///
    /// Later duplicates of the same timestamp overwrite earlier ones.
    pub fn from_points(
        keyword: &str,
        points: impl IntoIterator<Item = (DateTime<Utc>, u32)>,
    ) -> Self {
        let rows: BTreeMap<_, _> = points
            .into_iter()
            .map(|(time, value)| (time, vec![Some(value)]))
            .collect();

        if rows.is_empty() {
            return Self::default();
        }

        Self {
            columns: vec![keyword.to_string()],
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn contains_column(&self, keyword: &str) -> bool {
        self.columns.iter().any(|c| c == keyword)
    }

    /// Iterate rows in ascending time order.
    pub fn rows(&self) -> impl Iterator<Item = (&DateTime<Utc>, &[Option<u32>])> {
        self.rows.iter().map(|(t, v)| (t, v.as_slice()))
    }

    /// Values of one column in time order (`None` where the keyword has no data).
    pub fn column(&self, keyword: &str) -> Option<Vec<(DateTime<Utc>, Option<u32>)>> {
        let idx = self.columns.iter().position(|c| c == keyword)?;
        Some(self.rows.iter().map(|(t, v)| (*t, v[idx])).collect())
    }

    /// Outer join `other` into `self` on the time index.
    ///
    /// The result holds the union of both indices in ascending order. Cells a
    /// side has no row for stay empty. Columns already present are skipped.
    pub fn outer_join(&mut self, other: TimeSeriesTable) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }

        let kept: Vec<usize> = other
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !self.contains_column(c))
            .map(|(i, _)| i)
            .collect();
        if kept.is_empty() {
            return;
        }

        let left_width = self.columns.len();
        let right_width = kept.len();
        self.columns
            .extend(kept.iter().map(|&i| other.columns[i].clone()));

        for values in self.rows.values_mut() {
            values.resize(left_width + right_width, None);
        }

        for (time, values) in other.rows {
            let row = self
                .rows
                .entry(time)
                .or_insert_with(|| vec![None; left_width + right_width]);
            for (offset, &i) in kept.iter().enumerate() {
                row[left_width + offset] = values[i];
            }
        }
    }

    /// Whether every index entry falls on midnight (a date-only index).
    pub fn is_date_index(&self) -> bool {
        self.rows
            .keys()
            .all(|t| t.hour() == 0 && t.minute() == 0 && t.second() == 0)
    }

    /// Render an index entry the way exports print it.
    pub fn format_index(&self, time: &DateTime<Utc>) -> String {
        if self.is_date_index() {
            time.format("%Y-%m-%d").to_string()
        } else {
            time.format("%Y-%m-%d %H:%M:%S").to_string()
        }
    }
}

/// One row of a related-queries table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedQuery {
    pub query: String,
    pub value: i64,
}

/// Top and rising related queries for one keyword. Either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedQueries {
    pub top: Option<Vec<RelatedQuery>>,
    pub rising: Option<Vec<RelatedQuery>>,
}

/// Related queries for a list of keywords, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedQueriesSet {
    entries: Vec<(String, RelatedQueries)>,
}

/// A consolidated related-queries row carrying its source keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedQuery {
    pub query: String,
    pub value: i64,
    #[serde(rename = "Original Keyword")]
    pub original_keyword: String,
}

impl RelatedQueriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `keyword`, keeping first-insert order.
    pub fn insert(&mut self, keyword: &str, queries: RelatedQueries) {
        match self.entries.iter_mut().find(|(k, _)| k == keyword) {
            Some((_, existing)) => *existing = queries,
            None => self.entries.push((keyword.to_string(), queries)),
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&RelatedQueries> {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, q)| q)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelatedQueries)> {
        self.entries.iter().map(|(k, q)| (k.as_str(), q))
    }

    /// Concatenate every keyword's `top` rows with a provenance column.
    pub fn consolidated_top(&self) -> Vec<ConsolidatedQuery> {
        self.consolidate(|q| q.top.as_deref())
    }

    /// Concatenate every keyword's `rising` rows with a provenance column.
    pub fn consolidated_rising(&self) -> Vec<ConsolidatedQuery> {
        self.consolidate(|q| q.rising.as_deref())
    }

    fn consolidate<'a>(
        &'a self,
        pick: impl Fn(&'a RelatedQueries) -> Option<&'a [RelatedQuery]>,
    ) -> Vec<ConsolidatedQuery> {
        self.entries
            .iter()
            .filter_map(|(keyword, queries)| pick(queries).map(|rows| (keyword, rows)))
            .flat_map(|(keyword, rows)| {
                rows.iter().map(move |r| ConsolidatedQuery {
                    query: r.query.clone(),
                    value: r.value,
                    original_keyword: keyword.clone(),
                })
            })
            .collect()
    }
}
