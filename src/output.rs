//! Result types returned by the processing entry points.

use crate::config::OutputFormat;
use crate::error::HarinaError;
use crate::pipeline::extract::ExtractStrategy;
use serde::{Deserialize, Serialize};

pub use crate::pipeline::validate::Canonical;

/// Everything produced for one model reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// The requested representation: canonical XML (or raw fallback text),
    /// or CSV.
    pub data: String,
    pub format: OutputFormat,
    /// Model identifier from the config that produced the reply.
    pub model: String,
    /// Validator result. `data` is derived from it.
    pub canonical: Canonical,
    /// How the markup was located inside the reply.
    pub strategy: ExtractStrategy,
    /// CSV data rows, when `format` is CSV.
    pub rows: Option<usize>,
    pub stats: ProcessStats,
}

impl ProcessOutput {
    /// True when `data` was built from unvalidated text.
    pub fn is_degraded(&self) -> bool {
        self.canonical.is_fallback()
    }
}

/// Size and timing figures for one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub reply_bytes: usize,
    pub extracted_bytes: usize,
    pub output_bytes: usize,
    pub duration_us: u64,
}

/// Result for one reply of a batch.
#[derive(Debug)]
pub struct BatchItem {
    /// 0-based position in the batch input.
    pub index: usize,
    pub result: Result<ProcessOutput, HarinaError>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Flat success/error record, one per reply, for JSON consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub data: Option<String>,
    pub format: OutputFormat,
    pub model: String,
    /// True when `data` is unvalidated fallback text.
    pub degraded: bool,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn from_result(
        result: &Result<ProcessOutput, HarinaError>,
        format: OutputFormat,
        model: &str,
    ) -> Self {
        match result {
            Ok(out) => Self {
                success: true,
                data: Some(out.data.clone()),
                format: out.format,
                model: out.model.clone(),
                degraded: out.is_degraded(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                format,
                model: model.to_string(),
                degraded: false,
                error: Some(e.to_string()),
            },
        }
    }
}
