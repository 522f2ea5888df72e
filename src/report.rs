use std::collections::BTreeMap;

use serde_json::{json, Value};

/// Per-entity outcome counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tally {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub invalid: usize,
}

impl Tally {
    fn to_json(self) -> Value {
        json!({
            "inserted": self.inserted,
            "updated": self.updated,
            "skipped": self.skipped,
            "invalid": self.invalid,
        })
    }
}

/// One row-level problem, addressed by its spreadsheet row number.
#[derive(Clone, Debug)]
pub struct RowError {
    pub sheet: String,
    pub row: usize,
    pub field: Option<String>,
    pub message: String,
}

/// Accumulates counts, warnings and a capped sample of row errors over
/// one import request. Rows are recorded in input order, so the samples
/// always describe the first failures in the file.
pub struct Report {
    tallies: BTreeMap<&'static str, Tally>,
    warnings: Vec<String>,
    errors: Vec<RowError>,
    errors_total: usize,
    sample_cap: usize,
}

impl Report {
    pub fn new(sample_cap: usize) -> Self {
        Report {
            tallies: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            errors_total: 0,
            sample_cap,
        }
    }

    pub fn tally_mut(&mut self, entity: &'static str) -> &mut Tally {
        self.tallies.entry(entity).or_default()
    }

    pub fn tally(&self, entity: &'static str) -> Tally {
        self.tallies.get(entity).copied().unwrap_or_default()
    }

    /// Record a coarse systemic warning once; repeats are collapsed.
    pub fn warn_once(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn row_error(
        &mut self,
        sheet: &str,
        row: usize,
        field: Option<&str>,
        message: impl Into<String>,
    ) {
        self.errors_total += 1;
        if self.errors.len() < self.sample_cap {
            self.errors.push(RowError {
                sheet: sheet.to_string(),
                row,
                field: field.map(|f| f.to_string()),
                message: message.into(),
            });
        }
    }

    pub fn errors_total(&self) -> usize {
        self.errors_total
    }

    pub fn summary_json(&self) -> Value {
        let mut summary = serde_json::Map::new();
        for (entity, tally) in &self.tallies {
            summary.insert(entity.to_string(), tally.to_json());
        }
        Value::Object(summary)
    }

    pub fn warnings_json(&self) -> Value {
        json!(self.warnings)
    }

    pub fn errors_json(&self) -> Value {
        let samples = self
            .errors
            .iter()
            .map(|e| {
                json!({
                    "sheet": e.sheet,
                    "row": e.row,
                    "field": e.field,
                    "message": e.message,
                })
            })
            .collect::<Vec<_>>();
        json!({
            "count": self.errors_total,
            "samples": samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_samples_are_capped_but_the_count_is_not() {
        let mut report = Report::new(3);
        for row in 2..12 {
            report.row_error("Sheet1", row, Some("grade"), "grade is required");
        }
        assert_eq!(report.errors_total(), 10);
        let errors = report.errors_json();
        assert_eq!(errors["count"], 10);
        assert_eq!(errors["samples"].as_array().unwrap().len(), 3);
        // Samples keep input order, so the first failing rows survive.
        assert_eq!(errors["samples"][0]["row"], 2);
    }

    #[test]
    fn warn_once_collapses_repeats() {
        let mut report = Report::new(10);
        report.warn_once("import grades before schedules");
        report.warn_once("import grades before schedules");
        report.warn("row 2: section dropped");
        assert_eq!(report.warnings_json().as_array().unwrap().len(), 2);
    }

    #[test]
    fn tallies_serialize_per_entity() {
        let mut report = Report::new(10);
        report.tally_mut("grades").inserted += 2;
        report.tally_mut("sections").skipped += 1;
        let summary = report.summary_json();
        assert_eq!(summary["grades"]["inserted"], 2);
        assert_eq!(summary["sections"]["skipped"], 1);
        assert_eq!(summary["sections"]["inserted"], 0);
    }
}
