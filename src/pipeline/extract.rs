//! Locate the receipt document inside a free-form model reply.
//!
//! Models are told to answer with XML only, but replies routinely arrive
//! wrapped in prose or code fences, cut off before the closing tag, or with
//! the root element missing. Four strategies run in order and the first one
//! that applies wins:
//!
//! 1. **Root pair** — the shortest `<receipt>…</receipt>` span, across lines.
//! 2. **Line scan** — from the first line starting with `<` up to (and
//!    including) a line ending in `</receipt>`, or to the end of the reply.
//! 3. **Wrap** — any `<` and `>` at all: the trimmed reply inside a synthetic
//!    `<receipt>` pair.
//! 4. Otherwise [`HarinaError::Extraction`].
//!
//! A successful extraction is never empty or whitespace-only.

use crate::error::HarinaError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the document root element.
pub const ROOT_TAG: &str = "receipt";

const ROOT_CLOSE: &str = "</receipt>";

static RE_ROOT_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<receipt(?:\s[^>]*)?>.*?</receipt>").unwrap());

/// Which strategy located the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractStrategy {
    RootPair,
    LineScan,
    Wrapped,
}

/// A markup candidate cut out of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub strategy: ExtractStrategy,
}

/// Extract the receipt markup from `reply`.
pub fn extract_markup(reply: &str) -> Result<Extraction, HarinaError> {
    let found = root_pair(reply)
        .map(|text| (text, ExtractStrategy::RootPair))
        .or_else(|| line_scan(reply).map(|text| (text, ExtractStrategy::LineScan)))
        .or_else(|| wrap_reply(reply).map(|text| (text, ExtractStrategy::Wrapped)));

    match found {
        Some((text, strategy)) => {
            debug!("Extracted {} bytes via {:?}", text.len(), strategy);
            Ok(Extraction { text, strategy })
        }
        None => Err(HarinaError::Extraction),
    }
}

// ── Strategy 1: root element pair ────────────────────────────────────────────

fn root_pair(reply: &str) -> Option<String> {
    RE_ROOT_PAIR.find(reply).map(|m| m.as_str().to_string())
}

// ── Strategy 2: line scan ────────────────────────────────────────────────────

fn line_scan(reply: &str) -> Option<String> {
    let mut lines: Vec<&str> = Vec::new();
    for line in reply.lines() {
        let line = line.trim();
        if line.starts_with('<') || !lines.is_empty() {
            lines.push(line);
            if line.ends_with(ROOT_CLOSE) {
                break;
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

// ── Strategy 3: synthetic root ───────────────────────────────────────────────

fn wrap_reply(reply: &str) -> Option<String> {
    if reply.contains('<') && reply.contains('>') {
        Some(format!("<{ROOT_TAG}>\n{}\n{ROOT_CLOSE}", reply.trim()))
    } else {
        None
    }
}
