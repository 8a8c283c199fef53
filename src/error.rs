//! Error types for the harina library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`HarinaError`] — **Fatal**: the reply cannot be turned into the
//!   requested output at all (no markup in the reply, a document without any
//!   receipt section, unreadable template files). Returned as
//!   `Err(HarinaError)` from the top-level `process*` functions.
//!
//! * [`ParseFailure`] — **Non-fatal**: a markup candidate did not parse.
//!   The validator records one per attempt and keeps them inside
//!   [`crate::output::Canonical::Fallback`] so callers can see *why* they
//!   received raw text instead of a canonical document.
//!
//! The separation lets callers decide their own tolerance: accept degraded
//! documents, log and continue, or reject them (`harina --strict`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the harina library.
#[derive(Debug, Error)]
pub enum HarinaError {
    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The model reply contains nothing that looks like markup.
    #[error("No markup found in response\nThe model reply has no '<' or '>' characters at all.")]
    Extraction,

    /// The document cannot be flattened into table rows.
    #[error("Schema error: {detail}")]
    Schema { detail: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// A template resource could not be read.
    #[error("Failed to load template '{path}': {source}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read a saved model reply.
    #[error("Failed to read input '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarinaError {
    pub(crate) fn schema(detail: impl Into<String>) -> Self {
        HarinaError::Schema {
            detail: detail.into(),
        }
    }
}

/// Which validator attempt produced a [`ParseFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseAttempt {
    /// The extractor output, parsed as-is.
    Extracted,
    /// The sanitised candidate.
    Sanitized,
}

/// A non-fatal parse failure for one markup candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{attempt:?} candidate did not parse: {message}")]
pub struct ParseFailure {
    pub attempt: ParseAttempt,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_display() {
        let e = HarinaError::Extraction;
        assert!(e.to_string().contains("No markup found"));
    }

    #[test]
    fn schema_display() {
        let e = HarinaError::schema("missing <store_info>");
        let msg = e.to_string();
        assert!(msg.starts_with("Schema error"), "got: {msg}");
        assert!(msg.contains("<store_info>"));
    }

    #[test]
    fn template_load_display() {
        let e = HarinaError::TemplateLoad {
            path: PathBuf::from("/tmp/receipt_template.xml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(e.to_string().contains("receipt_template.xml"));
    }

    #[test]
    fn parse_failure_display() {
        let f = ParseFailure {
            attempt: ParseAttempt::Sanitized,
            message: "unexpected end of input".into(),
        };
        let msg = f.to_string();
        assert!(msg.contains("Sanitized"), "got: {msg}");
        assert!(msg.contains("unexpected end of input"));
    }

    #[test]
    fn parse_failure_serializes_snake_case() {
        let f = ParseFailure {
            attempt: ParseAttempt::Extracted,
            message: "x".into(),
        };
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"extracted\""), "got: {json}");
    }
}
