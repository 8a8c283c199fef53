//! Processing entry points: one reply, one reply to a file, or a batch.
//!
//! The pipeline itself is synchronous and keeps no state between calls:
//!
//! ```text
//! reply ──▶ extract ──▶ canonicalize ──▶ (csv) flatten ──▶ ProcessOutput
//! ```
//!
//! [`process_batch`] fans independent replies out over tokio's blocking
//! pool and returns results in input order.

use crate::config::{OutputFormat, PipelineConfig};
use crate::error::HarinaError;
use crate::output::{BatchItem, Canonical, ProcessOutput, ProcessStats};
use crate::pipeline::{extract, flatten, validate};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Run the full pipeline on one raw model reply.
///
/// # Errors
/// - [`HarinaError::Extraction`] when the reply holds no markup at all
/// - [`HarinaError::Schema`] when CSV output was requested and the document
///   cannot be flattened (including any document that fell back to raw text)
///
/// An XML request never fails after extraction: an unparseable candidate is
/// returned verbatim with `canonical` set to [`Canonical::Fallback`].
pub fn process_reply(
    reply: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<ProcessOutput, HarinaError> {
    let start = Instant::now();
    let reply = reply.as_ref();
    info!("Processing reply ({} bytes, model {})", reply.len(), config.model);

    // ── Step 1: Locate markup ────────────────────────────────────────────
    let extracted = extract::extract_markup(reply)?;

    // ── Step 2: Validate + canonicalize ──────────────────────────────────
    let canonical = validate::canonicalize(&extracted.text, &config.render_options());

    // ── Step 3: Shape the output ─────────────────────────────────────────
    let (data, rows) = match config.format {
        OutputFormat::Xml => (canonical.as_str().to_string(), None),
        OutputFormat::Csv => {
            if let Canonical::Fallback { failures, .. } = &canonical {
                return Err(HarinaError::schema(format!(
                    "document could not be validated: {}",
                    failures
                        .last()
                        .map(|f| f.message.as_str())
                        .unwrap_or("parse failed")
                )));
            }
            let rows = flatten::flatten_str(canonical.as_str())?;
            let count = rows.len();
            (flatten::rows_to_csv(&rows, config.csv_quoting)?, Some(count))
        }
    };

    let stats = ProcessStats {
        reply_bytes: reply.len(),
        extracted_bytes: extracted.text.len(),
        output_bytes: data.len(),
        duration_us: start.elapsed().as_micros() as u64,
    };

    if canonical.is_fallback() {
        warn!("Reply produced unvalidated {} output", config.format);
    }
    info!(
        "Reply done: {} → {} bytes via {:?} in {}µs",
        stats.reply_bytes, stats.output_bytes, extracted.strategy, stats.duration_us
    );

    Ok(ProcessOutput {
        data,
        format: config.format,
        model: config.model.clone(),
        canonical,
        strategy: extracted.strategy,
        rows,
        stats,
    })
}

/// Read a saved reply from `path` and process it.
pub fn process_file(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ProcessOutput, HarinaError> {
    let path = path.as_ref();
    let reply = std::fs::read_to_string(path).map_err(|source| HarinaError::InputReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    process_reply(reply, config)
}

/// Process a reply and write `data` to `output_path`.
///
/// Uses atomic write (temp file in the target directory + rename) so a
/// failed run never leaves a partial file behind.
pub fn process_reply_to_file(
    reply: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ProcessOutput, HarinaError> {
    let output = process_reply(reply, config)?;
    write_atomic(output_path.as_ref(), &output.data)?;
    Ok(output)
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), HarinaError> {
    let write_err = |source: std::io::Error| HarinaError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    if !contents.ends_with('\n') {
        tmp.write_all(b"\n").map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Process many replies concurrently.
///
/// Up to `config.concurrency` replies run at once on tokio's blocking pool.
/// Items come back in input order, each with its own result; one failing
/// reply never affects another.
pub async fn process_batch<I, S>(replies: I, config: &PipelineConfig) -> Vec<BatchItem>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let replies: Vec<String> = replies.into_iter().map(Into::into).collect();
    let total = replies.len();
    info!("Starting batch of {} replies (concurrency {})", total, config.concurrency);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let shared = Arc::new(config.clone());
    let mut items: Vec<BatchItem> = stream::iter(replies.into_iter().enumerate().map(|(index, reply)| {
        let config = Arc::clone(&shared);
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_start(index, total);
            }
            let worker_config = Arc::clone(&config);
            let result = tokio::task::spawn_blocking(move || process_reply(reply, &worker_config))
                .await
                .unwrap_or_else(|e| Err(HarinaError::Internal(format!("Worker panicked: {e}"))));

            if let Some(ref cb) = config.progress_callback {
                match &result {
                    Ok(out) => cb.on_item_complete(index, total, out.is_degraded(), out.data.len()),
                    Err(e) => cb.on_item_error(index, total, &e.to_string()),
                }
            }
            BatchItem { index, result }
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    items.sort_by_key(|item| item.index);

    let succeeded = items.iter().filter(|i| i.is_ok()).count();
    info!("Batch complete: {}/{} replies succeeded", succeeded, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }
    items
}

/// Synchronous wrapper around [`process_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_batch_sync<I, S>(
    replies: I,
    config: &PipelineConfig,
) -> Result<Vec<BatchItem>, HarinaError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| HarinaError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(process_batch(replies, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CsvQuoting;

    const REPLY: &str = "Here you go:\n<receipt><store_info><name>Cafe</name></store_info><transaction_info/><items><item><name>Coffee</name></item></items><totals/></receipt>\nDone.";

    #[test]
    fn xml_output_is_canonical() {
        let out = process_reply(REPLY, &PipelineConfig::default()).unwrap();
        assert!(!out.is_degraded());
        assert!(out.data.starts_with("<?xml version=\"1.0\" ?>\n<receipt>"));
        assert_eq!(out.rows, None);
        assert_eq!(out.stats.output_bytes, out.data.len());
    }

    #[test]
    fn csv_output_has_rows() {
        let config = PipelineConfig::builder()
            .format(OutputFormat::Csv)
            .build()
            .unwrap();
        let out = process_reply(REPLY, &config).unwrap();
        assert_eq!(out.rows, Some(1));
        assert_eq!(out.data.lines().count(), 2);
        assert!(out.data.lines().nth(1).unwrap().starts_with("Cafe,,,"));
    }

    #[test]
    fn degraded_xml_is_returned_not_raised() {
        let reply = "<receipt>\n<store_info>\n<name>Cafe";
        let out = process_reply(reply, &PipelineConfig::default()).unwrap();
        assert!(out.is_degraded());
        assert_eq!(out.data, "<receipt>\n<store_info>\n<name>Cafe");
    }

    #[test]
    fn degraded_csv_is_schema_error() {
        let config = PipelineConfig::builder()
            .format(OutputFormat::Csv)
            .csv_quoting(CsvQuoting::Rfc4180)
            .build()
            .unwrap();
        let err = process_reply("<receipt>\n<store_info>\n<name>Cafe", &config).unwrap_err();
        assert!(matches!(err, HarinaError::Schema { .. }));
    }

    #[test]
    fn no_markup_is_extraction_error() {
        let err = process_reply("Sorry, the image is blurry.", &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, HarinaError::Extraction));
    }

    #[test]
    fn writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.xml");
        let out = process_reply_to_file(REPLY, &path, &PipelineConfig::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{}\n", out.data));
    }

    #[test]
    fn missing_input_file() {
        let err = process_file("/definitely/not/here.txt", &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, HarinaError::InputReadFailed { .. }));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let replies = vec![
            "<receipt><store_info><name>A</name></store_info></receipt>".to_string(),
            "nothing".to_string(),
            "<receipt><store_info><name>C</name></store_info></receipt>".to_string(),
        ];
        let items = process_batch(replies, &PipelineConfig::default()).await;
        assert_eq!(items.len(), 3);
        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(items[0].result.as_ref().unwrap().data.contains("<name>A</name>"));
        assert!(items[1].result.is_err());
        assert!(items[2].result.as_ref().unwrap().data.contains("<name>C</name>"));
    }
}
