//! CLI binary for harina.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, reads saved model replies, and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use harina::pipeline::markup::XML_DECLARATION;
use harina::{
    build_prompt_from_store, process_batch, process_reply, process::write_atomic,
    BatchProgressCallback, CsvQuoting, HarinaError, OutputFormat, PipelineConfig, ProcessOutput,
    ProgressCallback, ResponseEnvelope, TemplateStore, DEFAULT_MODEL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for batch runs. Items may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    names: Vec<String>,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new(names: Vec<String>) -> Arc<Self> {
        let bar = ProgressBar::new(names.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} replies  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            names,
            degraded: AtomicUsize::new(0),
        })
    }

    fn name(&self, index: usize) -> &str {
        self.names.get(index).map(String::as_str).unwrap_or("<reply>")
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_item_complete(&self, index: usize, _total: usize, degraded: bool, data_len: usize) {
        if degraded {
            self.degraded.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} {}  {}",
                yellow("⚠"),
                self.name(index),
                yellow("unvalidated fallback")
            ));
        } else {
            self.bar.println(format!(
                "  {} {}  {data_len} bytes",
                green("✓"),
                self.name(index)
            ));
        }
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, _total: usize, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} {}  {}", red("✗"), self.name(index), red(first_line)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        let degraded = self.degraded.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} replies processed  ({} degraded, {} failed)",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&success_count.to_string()),
            total,
            degraded,
            failed
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Canonical XML from a saved model reply
  harina reply.txt

  # Pipe a reply through stdin, emit CSV
  cat reply.txt | harina --format csv

  # Batch: one CSV per reply into out/
  harina --format csv --output-dir out/ replies/*.txt

  # Print the instruction text to send with the receipt image
  harina --print-prompt

ENVIRONMENT VARIABLES:
  HARINA_MODEL       Model identifier recorded in outputs
  GEMINI_API_KEY     API key passed through to the caller's client
  RUST_LOG           Override log filtering (e.g. harina=debug)
"#;

/// Turn receipt replies from a vision model into canonical XML or CSV.
#[derive(Parser, Debug)]
#[command(
    name = "harina",
    version,
    about = "Turn receipt replies from a vision model into canonical XML or CSV",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files holding raw model replies. Reads stdin when empty or `-`.
    inputs: Vec<PathBuf>,

    /// Write the result to this file (single input only).
    #[arg(short, long, env = "HARINA_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write one result per input into this directory.
    #[arg(long, env = "HARINA_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, env = "HARINA_FORMAT", value_enum, default_value = "xml")]
    format: FormatArg,

    /// CSV escaping: `none` writes values verbatim, `rfc4180` quotes fields
    /// containing commas, quotes or line breaks.
    #[arg(long, env = "HARINA_CSV_QUOTING", value_enum, default_value = "none")]
    csv_quoting: QuotingArg,

    /// Omit the `<?xml version="1.0" ?>` line from canonical XML.
    #[arg(long)]
    no_declaration: bool,

    /// Spaces per nesting level in canonical XML (1–8).
    #[arg(long, default_value_t = 2,
          value_parser = clap::value_parser!(u8).range(1..=8))]
    indent: u8,

    /// Model identifier recorded in outputs.
    #[arg(long, env = "HARINA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API key for the inference client.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding receipt_template.xml and product_categories.xml.
    #[arg(long, env = "HARINA_TEMPLATES_DIR")]
    templates_dir: Option<PathBuf>,

    /// Print the extraction prompt built from the templates and exit.
    #[arg(long)]
    print_prompt: bool,

    /// Number of replies processed in parallel.
    #[arg(short, long, env = "HARINA_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Print one JSON record per reply ({success, data, format, model, degraded, error}).
    #[arg(long)]
    json: bool,

    /// Exit with an error when any reply fell back to unvalidated text.
    #[arg(long)]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "HARINA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HARINA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HARINA_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Xml,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Xml => OutputFormat::Xml,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QuotingArg {
    None,
    Rfc4180,
}

impl From<QuotingArg> for CsvQuoting {
    fn from(v: QuotingArg) -> Self {
        match v {
            QuotingArg::None => CsvQuoting::None,
            QuotingArg::Rfc4180 => CsvQuoting::Rfc4180,
        }
    }
}

/// One reply to process, with a display name.
struct Input {
    name: String,
    stem: String,
    reply: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Templates ────────────────────────────────────────────────────────
    let templates = match cli.templates_dir {
        Some(ref dir) => TemplateStore::init_from_dir(dir).context("Failed to load templates")?,
        None => TemplateStore::global(),
    };

    if cli.print_prompt {
        println!("{}", build_prompt_from_store(templates));
        return Ok(());
    }

    // ── Inputs + config ──────────────────────────────────────────────────
    let inputs = read_inputs(&cli.inputs)?;
    if cli.output.is_some() && inputs.len() > 1 {
        bail!("--output takes a single input; use --output-dir for {} inputs", inputs.len());
    }

    let show_progress = inputs.len() > 1 && !cli.quiet && !cli.no_progress && !cli.json;
    let progress: Option<ProgressCallback> = if show_progress {
        let names = inputs.iter().map(|i| i.name.clone()).collect();
        Some(CliProgressCallback::new(names) as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;

    // ── Run ──────────────────────────────────────────────────────────────
    if inputs.len() == 1 {
        let input = &inputs[0];
        let result = process_reply(&input.reply, &config);
        return finish(&cli, &config, &[(input, result)]);
    }

    let replies: Vec<String> = inputs.iter().map(|i| i.reply.clone()).collect();
    let items = process_batch(replies, &config).await;
    let results: Vec<_> = inputs
        .iter()
        .zip(items)
        .map(|(input, item)| (input, item.result))
        .collect();
    finish(&cli, &config, &results)
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .model(cli.model.clone())
        .format(cli.format.into())
        .csv_quoting(cli.csv_quoting.into())
        .include_declaration(!cli.no_declaration)
        .indent(cli.indent as usize)
        .concurrency(cli.concurrency);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read every input file, or stdin when none (or `-`) is given.
fn read_inputs(paths: &[PathBuf]) -> Result<Vec<Input>> {
    if paths.is_empty() || (paths.len() == 1 && paths[0] == Path::new("-")) {
        let mut reply = String::new();
        io::stdin()
            .read_to_string(&mut reply)
            .context("Failed to read reply from stdin")?;
        return Ok(vec![Input {
            name: "<stdin>".into(),
            stem: "stdin".into(),
            reply,
        }]);
    }

    paths
        .iter()
        .map(|path| {
            let reply = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read reply from {}", path.display()))?;
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "reply".into());
            Ok(Input {
                name: path.display().to_string(),
                stem,
                reply,
            })
        })
        .collect()
}

/// Emit results and compute the exit status.
fn finish(
    cli: &Cli,
    config: &PipelineConfig,
    results: &[(&Input, Result<ProcessOutput, HarinaError>)],
) -> Result<()> {
    if cli.json {
        let envelopes: Vec<ResponseEnvelope> = results
            .iter()
            .map(|(_, r)| ResponseEnvelope::from_result(r, config.format, &config.model))
            .collect();
        let json = if envelopes.len() == 1 {
            serde_json::to_string_pretty(&envelopes[0])
        } else {
            serde_json::to_string_pretty(&envelopes)
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref dir) = cli.output_dir {
        for (input, result) in results {
            if let Ok(out) = result {
                let path = dir.join(format!("{}.{}", input.stem, config.format.extension()));
                write_atomic(&path, &out.data)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }
    } else if let Some(ref path) = cli.output {
        if let Some((_, Ok(out))) = results.first() {
            write_atomic(path, &out.data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} {} output saved to: {}", green("✔"), config.format, path.display());
            }
        }
    } else {
        write_stdout(config.format, results)?;
    }

    // ── Exit status ──────────────────────────────────────────────────────
    let failed: Vec<_> = results
        .iter()
        .filter_map(|(input, r)| r.as_ref().err().map(|e| (input, e)))
        .collect();
    let degraded = results
        .iter()
        .filter(|(_, r)| r.as_ref().map(|o| o.is_degraded()).unwrap_or(false))
        .count();

    if degraded > 0 {
        warn!("{} of {} replies fell back to unvalidated text", degraded, results.len());
    }
    if let [(input, err)] = failed.as_slice() {
        if results.len() == 1 {
            bail!("{}: {}", input.name, err);
        }
    }
    if !failed.is_empty() {
        for (input, err) in &failed {
            eprintln!("{} {}: {}", red("✗"), input.name, err);
        }
        bail!("{} of {} replies failed", failed.len(), results.len());
    }
    if cli.strict && degraded > 0 {
        bail!("{} replies could not be validated (--strict)", degraded);
    }
    Ok(())
}

/// Print successful results to stdout. Several CSV results share one header.
fn write_stdout(
    format: OutputFormat,
    results: &[(&Input, Result<ProcessOutput, HarinaError>)],
) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let multi = results.len() > 1;
    let mut header_written = false;

    for (input, result) in results {
        let Ok(out) = result else { continue };
        let labelled;
        let text = match format {
            OutputFormat::Csv if header_written => {
                out.data.split_once('\n').map(|(_, rows)| rows).unwrap_or("")
            }
            OutputFormat::Xml if multi => {
                labelled = label_document(&input.name, &out.data);
                labelled.as_str()
            }
            _ => out.data.as_str(),
        };
        header_written = true;
        if text.is_empty() {
            continue;
        }
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Prefix a document with a `<!-- name -->` comment, after its declaration
/// when it has one, so each chunk of a multi-document stream stays well-formed.
fn label_document(name: &str, data: &str) -> String {
    let comment = format!("<!-- {} -->", name.replace("--", "- -"));
    match data.strip_prefix(XML_DECLARATION) {
        Some(body) => format!("{XML_DECLARATION}\n{comment}\n{}", body.trim_start_matches('\n')),
        None => format!("{comment}\n{data}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harina::pipeline::markup::parse_markup;

    #[test]
    fn label_follows_declaration() {
        let out = label_document("a.txt", "<?xml version=\"1.0\" ?>\n<receipt/>");
        assert_eq!(out, "<?xml version=\"1.0\" ?>\n<!-- a.txt -->\n<receipt/>");
        assert!(parse_markup(&out).is_ok());
    }

    #[test]
    fn label_leads_without_declaration() {
        let out = label_document("b.txt", "<receipt/>");
        assert_eq!(out, "<!-- b.txt -->\n<receipt/>");
        assert!(parse_markup(&out).is_ok());
    }

    #[test]
    fn label_cannot_close_the_comment_early() {
        let out = label_document("x--y.txt", "<receipt/>");
        assert_eq!(out, "<!-- x- -y.txt -->\n<receipt/>");
    }
}
