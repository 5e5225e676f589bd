//! Shared Utilities for the img-convert tool
//!
//! Ambient concerns kept apart from the conversion engine:
//! - Logging (tracing, rolling file + stderr)
//! - Error taxonomy for per-file conversion failures
//! - Batch tallies and the summary report

pub mod batch;
pub mod img_errors;
pub mod logging;
pub mod report;

pub use batch::BatchResult;
pub use img_errors::{ConvertError, ErrorCategory, IoStage};
pub use report::{format_duration, print_summary_report};
