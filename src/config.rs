//! Configuration types for receipt reply processing.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across threads and to pass the model identity
//! explicitly into each call instead of keeping it in process-wide state.

use crate::error::HarinaError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model identifier used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini/gemini-2.5-flash";

/// Configuration for processing model replies.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use harina::{CsvQuoting, OutputFormat, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .format(OutputFormat::Csv)
///     .csv_quoting(CsvQuoting::Rfc4180)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.format, OutputFormat::Csv);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Model identifier, e.g. "gemini/gemini-2.5-flash". Recorded in every
    /// [`crate::output::ProcessOutput`]; the pipeline itself never calls it.
    pub model: String,

    /// API key for the caller's inference client. Never logged.
    pub api_key: Option<String>,

    /// Output representation. Default: [`OutputFormat::Xml`].
    pub format: OutputFormat,

    /// CSV field escaping. Default: [`CsvQuoting::None`].
    pub csv_quoting: CsvQuoting,

    /// Prefix canonical documents with `<?xml version="1.0" ?>`. Default: true.
    pub include_declaration: bool,

    /// Spaces per nesting level in canonical documents. Range: 1–8. Default: 2.
    pub indent: usize,

    /// Number of replies processed in parallel by the batch API. Default: 8.
    pub concurrency: usize,

    /// Optional per-item progress events for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            format: OutputFormat::default(),
            csv_quoting: CsvQuoting::default(),
            include_declaration: true,
            indent: 2,
            concurrency: 8,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("format", &self.format)
            .field("csv_quoting", &self.csv_quoting)
            .field("include_declaration", &self.include_declaration)
            .field("indent", &self.indent)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Render options for the canonical printer.
    pub fn render_options(&self) -> crate::pipeline::markup::RenderOptions {
        crate::pipeline::markup::RenderOptions {
            indent: self.indent,
            declaration: self.include_declaration,
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn csv_quoting(mut self, quoting: CsvQuoting) -> Self {
        self.config.csv_quoting = quoting;
        self
    }

    pub fn include_declaration(mut self, v: bool) -> Self {
        self.config.include_declaration = v;
        self
    }

    pub fn indent(mut self, n: usize) -> Self {
        self.config.indent = n.clamp(1, 8);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, HarinaError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(HarinaError::InvalidConfig("Model name must not be empty".into()));
        }
        if !(1..=8).contains(&c.indent) {
            return Err(HarinaError::InvalidConfig(format!(
                "Indent must be 1–8, got {}",
                c.indent
            )));
        }
        if c.concurrency == 0 {
            return Err(HarinaError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What [`crate::process::process_reply`] puts into `ProcessOutput::data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Canonical XML document (or the raw fallback text).
    #[default]
    Xml,
    /// Header line plus one row per line item.
    Csv,
}

impl OutputFormat {
    /// File extension used by the CLI when writing batch outputs.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How CSV field values are escaped.
///
/// Receipt values are joined with bare commas by default, so a store name
/// such as `Foo, Inc.` shifts every following column. `Rfc4180` quotes such
/// fields instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvQuoting {
    /// Values are written verbatim, never quoted.
    #[default]
    None,
    /// Fields containing `,`, `"`, CR or LF are wrapped in double quotes,
    /// with embedded quotes doubled.
    Rfc4180,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.format, OutputFormat::Xml);
        assert_eq!(c.csv_quoting, CsvQuoting::None);
        assert_eq!(c.indent, 2);
        assert!(c.include_declaration);
    }

    #[test]
    fn builder_clamps() {
        let c = PipelineConfig::builder()
            .indent(40)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.indent, 8);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn empty_model_rejected() {
        let err = PipelineConfig::builder().model("  ").build().unwrap_err();
        assert!(matches!(err, HarinaError::InvalidConfig(_)));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let c = PipelineConfig::builder()
            .api_key("secret-key-123")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key-123"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn format_serde_lowercase() {
        assert_eq!(serde_json::to_string(&OutputFormat::Csv).unwrap(), "\"csv\"");
        let f: OutputFormat = serde_json::from_str("\"xml\"").unwrap();
        assert_eq!(f, OutputFormat::Xml);
    }
}
