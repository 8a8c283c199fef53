//! Pipeline stages that turn a model reply into a document and CSV rows.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ validate ──(parse fails)──▶ sanitize ──▶ validate ──▶ flatten
//! (locate)    (canonical)                 (repair)     (retry once)  (CSV rows)
//! ```
//!
//! 1. [`extract`]  — cut the markup candidate out of free-form prose
//! 2. [`validate`] — parse and pretty-print; on failure retry once after
//!    [`sanitize`], then fall back to the raw candidate
//! 3. [`sanitize`] — deterministic string repairs for common model quirks
//! 4. [`flatten`]  — one fixed-layout row per line item
//!
//! [`markup`] is the element tree and printer shared by the last two stages.

pub mod extract;
pub mod flatten;
pub mod markup;
pub mod sanitize;
pub mod validate;
