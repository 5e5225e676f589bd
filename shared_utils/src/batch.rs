//! Batch Processing Module
//!
//! Tallies per-file outcomes of a batch run for the summary report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Skip count per reason label, e.g. "same format" or "exists"
    pub skip_reasons: BTreeMap<String, usize>,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            skip_reasons: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    pub fn fail(&mut self, path: PathBuf, error: String) {
        self.total += 1;
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn skip(&mut self, reason: &str) {
        self.total += 1;
        self.skipped += 1;
        *self.skip_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_new() {
        let result = BatchResult::new();
        assert_eq!(result.total, 0);
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, 0);
        assert!(result.errors.is_empty());
        assert!(result.skip_reasons.is_empty());
    }

    #[test]
    fn test_batch_result_fail_keeps_message() {
        let mut result = BatchResult::new();
        result.fail(PathBuf::from("test.png"), "Error message".to_string());

        assert_eq!(result.total, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].0, PathBuf::from("test.png"));
        assert_eq!(result.errors[0].1, "Error message");
    }

    #[test]
    fn test_skip_reasons_are_counted() {
        let mut result = BatchResult::new();
        result.skip("same format");
        result.skip("exists");
        result.skip("same format");

        assert_eq!(result.skipped, 3);
        assert_eq!(result.skip_reasons["same format"], 2);
        assert_eq!(result.skip_reasons["exists"], 1);
    }

    #[test]
    fn test_success_rate() {
        assert!((BatchResult::new().success_rate() - 100.0).abs() < 0.01);

        let mut result = BatchResult::new();
        result.success();
        result.success();
        result.fail(PathBuf::from("a.png"), "E".to_string());
        result.skip("not found");

        assert!(
            (result.success_rate() - 50.0).abs() < 0.01,
            "2 of 4 succeeded, got {}",
            result.success_rate()
        );
    }

    #[test]
    fn test_total_equals_sum() {
        let mut result = BatchResult::new();
        result.success();
        result.fail(PathBuf::from("f1.png"), "E".to_string());
        result.skip("exists");

        assert_eq!(
            result.total,
            result.succeeded + result.failed + result.skipped,
            "total must equal succeeded + failed + skipped"
        );
    }
}
