//! # harina
//!
//! Turn the free-form reply of an image-understanding model into a validated
//! receipt document, and flatten that document into CSV rows.
//!
//! ## Why this crate?
//!
//! Vision models asked for "XML only" still answer with prose around the
//! markup, code fences, truncated documents, and bare `&` in store names.
//! This crate isolates the document from the reply, repairs what can be
//! repaired, pretty-prints the result deterministically, and says plainly
//! when it had to give up and hand back raw text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! model reply
//!  │
//!  ├─ 1. Extract    find <receipt>…</receipt> inside the prose
//!  ├─ 2. Validate   parse + canonical pretty-print
//!  │     └─ on failure: sanitize once and retry, else raw fallback
//!  └─ 3. Flatten    18-column CSV, one row per line item (optional)
//! ```
//!
//! Calling the model itself is out of scope: build the instruction with
//! [`build_prompt_from_store`], send it with your own client, and feed the
//! reply to [`process_reply`].
//!
//! ## Quick Start
//!
//! ```rust
//! use harina::{process_reply, OutputFormat, PipelineConfig};
//!
//! let reply = "Sure!\n<receipt>\
//!     <store_info><name>Cafe</name></store_info>\
//!     <transaction_info><date>2024-05-01</date></transaction_info>\
//!     <totals><total>450</total></totals>\
//!     </receipt>";
//! let config = PipelineConfig::builder()
//!     .format(OutputFormat::Csv)
//!     .build()
//!     .unwrap();
//! let output = process_reply(reply, &config).unwrap();
//! assert!(!output.is_degraded());
//! assert_eq!(output.data.lines().count(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `harina` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CsvQuoting, OutputFormat, PipelineConfig, PipelineConfigBuilder, DEFAULT_MODEL};
pub use document::{parse_document, ReceiptDocument};
pub use error::{HarinaError, ParseAttempt, ParseFailure};
pub use output::{BatchItem, Canonical, ProcessOutput, ProcessStats, ResponseEnvelope};
pub use pipeline::extract::{extract_markup, ExtractStrategy, Extraction};
pub use pipeline::flatten::{
    csv_header, document_to_csv, flatten_str, flatten_tree, rows_to_csv, tree_to_csv, FlatRow,
};
pub use pipeline::sanitize::sanitize_markup;
pub use pipeline::validate::canonicalize;
pub use process::{
    process_batch, process_batch_sync, process_file, process_reply, process_reply_to_file,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, build_prompt_from_store};
pub use templates::TemplateStore;
