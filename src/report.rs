//! Tabular snapshots of the analyzer ledger
//!
//! A [`Report`] holds the ledger rows in completion order and renders them as
//! CSV (for spreadsheets and pandas-style tooling), JSON, a per-function
//! summary, or a human-readable table.

use crate::analyzer::CallRecord;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Column names, in export order
pub const COLUMNS: [&str; 5] = ["Func", "Time", "Exception", "Line", "Views"];

/// Point-in-time copy of the ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    rows: Vec<CallRecord>,
}

/// Aggregated figures for one function across the report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionSummary {
    pub func: String,
    pub calls: u64,
    pub failures: u64,
    /// Sum of elapsed seconds
    pub total_time: f64,
}

impl FunctionSummary {
    /// Mean elapsed seconds per call (0 when there were no calls)
    pub fn mean_time(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_time / self.calls as f64
        }
    }
}

impl Report {
    pub fn new(rows: Vec<CallRecord>) -> Self {
        Self { rows }
    }

    /// Rows in the order the calls completed
    pub fn rows(&self) -> &[CallRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<CallRecord> {
        self.rows
    }

    /// Header row; the leading empty column is the row index
    fn header() -> String {
        format!(",{}", COLUMNS.join(","))
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_row(index: usize, record: &CallRecord) -> String {
        [
            index.to_string(),
            Self::escape_field(&record.func),
            format!("{:.6}", record.time),
            Self::escape_field(&record.exception),
            record.line.to_string(),
            record.views.to_string(),
        ]
        .join(",")
    }

    /// Render as delimited text: header `,Func,Time,Exception,Line,Views`,
    /// then one indexed row per record
    pub fn to_csv(&self) -> String {
        let mut output = Self::header();
        output.push('\n');

        for (index, record) in self.rows.iter().enumerate() {
            output.push_str(&Self::format_row(index, record));
            output.push('\n');
        }

        output
    }

    /// Write [`Report::to_csv`] to `path`, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv())?;
        tracing::debug!(path = %path.display(), rows = self.rows.len(), "report saved");
        Ok(())
    }

    /// Render the rows as a pretty-printed JSON array
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    /// Per-function aggregation, sorted by total time (descending)
    pub fn summary(&self) -> Vec<FunctionSummary> {
        let mut by_func: HashMap<&str, FunctionSummary> = HashMap::new();
        for record in &self.rows {
            let entry = by_func
                .entry(record.func.as_str())
                .or_insert_with(|| FunctionSummary {
                    func: record.func.clone(),
                    ..Default::default()
                });
            entry.calls += 1;
            entry.total_time += record.time;
            if record.is_failure() {
                entry.failures += 1;
            }
        }

        let mut sorted: Vec<_> = by_func.into_values().collect();
        sorted.sort_by(|a, b| {
            b.total_time
                .total_cmp(&a.total_time)
                .then_with(|| a.func.cmp(&b.func))
        });
        sorted
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "No calls recorded.");
        }

        writeln!(
            f,
            "{:>5} {:<32} {:>12} {:<32} {:>6} {:>6}",
            "", COLUMNS[0], COLUMNS[1], COLUMNS[2], COLUMNS[3], COLUMNS[4]
        )?;
        writeln!(f, "{}", "─".repeat(98))?;
        for (index, record) in self.rows.iter().enumerate() {
            writeln!(
                f,
                "{:>5} {:<32} {:>11.6}s {:<32} {:>6} {:>6}",
                index, record.func, record.time, record.exception, record.line, record.views
            )?;
        }
        writeln!(f, "{}", "─".repeat(98))?;

        writeln!(f)?;
        writeln!(
            f,
            "{:<38} {:>10} {:>10} {:>12} {:>12}",
            "Function", "Calls", "Failures", "Total Time", "Avg Time"
        )?;
        writeln!(f, "{}", "─".repeat(86))?;
        for summary in self.summary() {
            writeln!(
                f,
                "{:<38} {:>10} {:>10} {:>11.6}s {:>11.6}s",
                summary.func,
                summary.calls,
                summary.failures,
                summary.total_time,
                summary.mean_time()
            )?;
        }
        write!(f, "{}", "─".repeat(86))
    }
}
