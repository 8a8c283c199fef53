//! Validate a markup candidate and re-serialize it canonically.
//!
//! ## Failure policy
//!
//! ```text
//! candidate ──parse──▶ ok ──▶ Canonical::Validated
//!     │
//!     └─ err ──sanitize──parse──▶ ok ──▶ Canonical::Validated
//!                                 │
//!                                 └─ err ──▶ Canonical::Fallback (original candidate)
//! ```
//!
//! The fallback returns the *unmodified* candidate rather than an error so a
//! degraded reply still reaches the caller. It is a separate variant so the
//! caller can tell raw text from a validated document; both parse failures
//! travel with it.

use crate::error::{ParseAttempt, ParseFailure};
use crate::pipeline::markup::{self, Element, RenderOptions};
use crate::pipeline::sanitize::sanitize_markup;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Validator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Canonical {
    /// The candidate (or its sanitised form) parsed; `document` is canonical.
    Validated { document: String, sanitized: bool },
    /// Neither attempt parsed; `raw` is the candidate exactly as received.
    Fallback {
        raw: String,
        failures: Vec<ParseFailure>,
    },
}

impl Canonical {
    /// The text handed to callers: canonical document or raw candidate.
    pub fn as_str(&self) -> &str {
        match self {
            Canonical::Validated { document, .. } => document,
            Canonical::Fallback { raw, .. } => raw,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Canonical::Validated { document, .. } => document,
            Canonical::Fallback { raw, .. } => raw,
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, Canonical::Validated { .. })
    }

    pub fn is_fallback(&self) -> bool {
        !self.is_validated()
    }
}

/// Parse `candidate`, retrying once on its sanitised form.
///
/// Returns the parsed tree with a flag telling whether sanitising was needed,
/// or both failures.
pub fn parse_with_repair(candidate: &str) -> Result<(Element, bool), Vec<ParseFailure>> {
    let first = match markup::parse_markup(candidate) {
        Ok(root) => return Ok((root, false)),
        Err(e) => ParseFailure {
            attempt: ParseAttempt::Extracted,
            message: e.to_string(),
        },
    };
    debug!("First parse failed ({}), sanitising", first.message);

    let repaired = sanitize_markup(candidate);
    match markup::parse_markup(&repaired) {
        Ok(root) => Ok((root, true)),
        Err(e) => Err(vec![
            first,
            ParseFailure {
                attempt: ParseAttempt::Sanitized,
                message: e.to_string(),
            },
        ]),
    }
}

/// Canonicalize `candidate`, falling back to it verbatim when it cannot be
/// parsed even after sanitising.
pub fn canonicalize(candidate: &str, opts: &RenderOptions) -> Canonical {
    match parse_with_repair(candidate) {
        Ok((root, sanitized)) => Canonical::Validated {
            document: markup::render_canonical(&root, opts),
            sanitized,
        },
        Err(failures) => {
            warn!(
                "Returning unvalidated markup ({} bytes): {}",
                candidate.len(),
                failures
                    .last()
                    .map(|f| f.message.as_str())
                    .unwrap_or("parse failed")
            );
            Canonical::Fallback {
                raw: candidate.to_string(),
                failures,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn well_formed_is_validated() {
        let c = canonicalize("<receipt><totals><total>500</total></totals></receipt>", &opts());
        assert_eq!(
            c,
            Canonical::Validated {
                document: "<?xml version=\"1.0\" ?>\n<receipt>\n  <totals>\n    <total>500</total>\n  </totals>\n</receipt>".into(),
                sanitized: false,
            }
        );
    }

    #[test]
    fn canonical_is_a_fixed_point() {
        let once = canonicalize("<receipt>\n\n<a>1</a>\n\n\n<b/></receipt>", &opts());
        let twice = canonicalize(once.as_str(), &opts());
        assert_eq!(once.as_str(), twice.as_str());
        assert!(twice.is_validated());
    }

    #[test]
    fn bare_ampersand_is_repaired() {
        let c = canonicalize("<receipt><store_info><name>M&S</name></store_info></receipt>", &opts());
        match c {
            Canonical::Validated { document, sanitized } => {
                assert!(sanitized);
                assert!(document.contains("<name>M&amp;S</name>"));
            }
            other => panic!("expected validated, got {other:?}"),
        }
    }

    #[test]
    fn stray_less_than_is_repaired() {
        let c = canonicalize("<receipt><totals><note>a < b</note></totals></receipt>", &opts());
        match c {
            Canonical::Validated { document, sanitized } => {
                assert!(sanitized);
                assert!(document.contains("<note>a &lt; b</note>"), "got: {document}");
            }
            other => panic!("expected validated, got {other:?}"),
        }
    }

    #[test]
    fn trailing_prose_is_repaired() {
        let c = canonicalize("<receipt><a>1</a></receipt> hope this helps", &opts());
        assert!(c.is_validated());
    }

    #[test]
    fn unrepairable_falls_back_to_original() {
        let candidate = "<receipt>\n<store_info>\n<name>Cafe</name>";
        let c = canonicalize(candidate, &opts());
        assert!(c.is_fallback());
        assert_eq!(c.as_str(), candidate);
        match c {
            Canonical::Fallback { failures, .. } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].attempt, ParseAttempt::Extracted);
                assert_eq!(failures[1].attempt, ParseAttempt::Sanitized);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn serializes_with_status_tag() {
        let c = Canonical::Validated {
            document: "<a/>".into(),
            sanitized: false,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"status\":\"validated\""), "got: {json}");
    }
}
