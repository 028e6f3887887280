//! Rule usage counters and the coverage report.
//!
//! Counters are addressed by `(field index, rule index)` in table
//! declaration order. All counters are atomics so a table can be applied
//! from several threads through a shared reference.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::rule::MappingRule;

/// Header line of the coverage report.
pub const REPORT_HEADER: &str = "----- Statistics of coverage of mappings -----";

/// Per-run usage counts.
#[derive(Debug, Default)]
pub struct RunStatistics {
    documents: AtomicU64,
    hits: Vec<Vec<AtomicU64>>,
}

impl RunStatistics {
    /// Counters for a table whose fields have `rule_counts` rules each.
    pub fn with_shape<I>(rule_counts: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let hits = rule_counts
            .into_iter()
            .map(|n| (0..n).map(|_| AtomicU64::new(0)).collect())
            .collect();
        Self {
            documents: AtomicU64::new(0),
            hits,
        }
    }

    pub(crate) fn record_document(&self) {
        self.documents.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self, field: usize, rule: usize) {
        if let Some(counter) = self.hits.get(field).and_then(|rules| rules.get(rule)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of documents processed.
    #[must_use]
    pub fn documents(&self) -> u64 {
        self.documents.load(Ordering::Relaxed)
    }

    /// How many times rule `rule` of field `field` produced the value.
    #[must_use]
    pub fn hits(&self, field: usize, rule: usize) -> u64 {
        self.hits
            .get(field)
            .and_then(|rules| rules.get(rule))
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Documents for which no rule of `field` produced a value.
    #[must_use]
    pub fn unmapped(&self, field: usize) -> u64 {
        let mapped: u64 = self
            .hits
            .get(field)
            .map_or(0, |rules| rules.iter().map(|c| c.load(Ordering::Relaxed)).sum());
        self.documents().saturating_sub(mapped)
    }

    /// Write the coverage report for `fields`, which must be the table these
    /// counters were shaped for.
    ///
    /// # Errors
    ///
    /// Returns any error from `out`.
    pub fn write_report<W: Write>(
        &self,
        fields: &IndexMap<String, Vec<MappingRule>>,
        out: &mut W,
    ) -> io::Result<()> {
        let documents = self.documents();
        writeln!(out, "{REPORT_HEADER}")?;
        for (field_index, (name, rules)) in fields.iter().enumerate() {
            writeln!(out, "  --- Facet: {name} ---")?;
            for (rule_index, rule) in rules.iter().enumerate() {
                let n = self.hits(field_index, rule_index);
                writeln!(out, "\t{n} ({} %) \t{rule}", percent(n, documents))?;
            }
            let unmapped = self.unmapped(field_index);
            if unmapped > 0 {
                writeln!(out, "\t{unmapped} ({} %) \tunmapped", percent(unmapped, documents))?;
            }
        }
        Ok(())
    }
}

/// `part` as a percentage of `whole`, with at most one decimal and no
/// trailing `.0`. Zero documents give `0`.
#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0".to_string();
    }
    let value = 100.0 * part as f64 / whole as f64;
    let text = format!("{value:.1}");
    match text.strip_suffix(".0") {
        Some(integral) => integral.to_string(),
        None => text,
    }
}
