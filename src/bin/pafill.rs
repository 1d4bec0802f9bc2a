//! CLI binary for edgequake-pafill.
//!
//! A thin shim over the library crate that maps CLI flags to `FillConfig`
//! and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pafill::pipeline::input::read_pdf;
use edgequake_pafill::{
    fill_files, inspect, page_count, read_fields, FillConfig, FillProgressCallback, FormField, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner line per pipeline stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::FieldsRead => "Reading form fields",
        Stage::FieldsEnriched => "Describing fields",
        Stage::ValuesReconciled => "Reading the referral",
        Stage::DocumentFilled => "Filling the form",
    }
}

impl FillProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        self.bar.println(format!(
            "  {} {:<22} {:<20} {}",
            green("✓"),
            stage_label(stage),
            detail,
            self.elapsed()
        ));
        if stage == Stage::DocumentFilled {
            self.bar.finish_and_clear();
        }
    }

    fn on_stage_failed(&self, stage: Stage, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:<22} {}",
            red("✗"),
            stage_label(stage),
            red(first_line)
        ));
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fill a PA form from a referral
  pafill fill --form PA.pdf --referral referral.pdf -o filled_PA.pdf

  # List the form's fields (no API key needed)
  pafill fields PA.pdf
  pafill fields PA.pdf --json

  # Dump OCR text and fields of a PDF
  pafill ocr referral.pdf

  # Run the HTTP service
  pafill serve --port 8000

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         Mistral key, used for OCR and (by default) the chat model
  EDGEQUAKE_LLM_PROVIDER  Override chat provider (mistral, openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Override chat model ID
  RUST_LOG                Log filter, e.g. edgequake_pafill=debug

A .env file in the working directory is loaded on start.
"#;

/// Fill Prior Authorization PDF forms from referral documents.
#[derive(Parser, Debug)]
#[command(
    name = "pafill",
    version,
    about = "Fill Prior Authorization PDF forms from referral documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAFILL_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill a PA form with values taken from a referral.
    Fill(FillArgs),

    /// List the fillable fields of a PDF form.
    Fields {
        /// PDF form.
        input: PathBuf,

        /// Print the fields as JSON.
        #[arg(long)]
        json: bool,
    },

    /// OCR a PDF, summarise it with the model, and print the result as JSON.
    Ocr {
        /// PDF file.
        input: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Run the HTTP service.
    Serve {
        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,

        /// Address to bind.
        #[arg(long, env = "PAFILL_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Allowed CORS origins (comma separated, `*` for any).
        #[arg(long, env = "PAFILL_CORS_ORIGINS", value_delimiter = ',', default_value = "http://localhost:3000")]
        cors_origins: Vec<String>,

        /// Maximum upload size in MiB.
        #[arg(long, env = "PAFILL_BODY_LIMIT_MB", default_value_t = 25)]
        body_limit_mb: usize,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
struct FillArgs {
    /// The Prior Authorization form to fill.
    #[arg(long)]
    form: PathBuf,

    /// The referral document the values come from.
    #[arg(long)]
    referral: PathBuf,

    /// Where to write the filled form.
    #[arg(short, long, env = "PAFILL_OUTPUT", default_value = "filled_PA.pdf")]
    output: PathBuf,

    /// Disable the progress spinner.
    #[arg(long, env = "PAFILL_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    model: ModelArgs,
}

/// Model, OCR and batching settings shared by the subcommands that call
/// the services.
#[derive(Args, Debug)]
struct ModelArgs {
    /// Chat model ID (default: mistral-small-latest).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Chat provider: mistral, openai, anthropic, gemini, ollama, …
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Fields per description call.
    #[arg(long, env = "PAFILL_BATCH_SIZE", default_value_t = 20)]
    batch_size: usize,

    /// Description calls in flight at once.
    #[arg(short, long, env = "PAFILL_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Characters of form text sent with each description batch.
    #[arg(long, env = "PAFILL_CONTEXT_CHARS", default_value_t = 1000)]
    context_chars: usize,

    /// Characters of referral text sent to the reconciler.
    #[arg(long, env = "PAFILL_REFERRAL_CHARS", default_value_t = 2000)]
    referral_chars: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAFILL_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-LLM-call timeout in seconds.
    #[arg(long, env = "PAFILL_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-OCR-call timeout in seconds.
    #[arg(long, env = "PAFILL_OCR_TIMEOUT", default_value_t = 180)]
    ocr_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback during `fill`; library INFO logs
    // would only interleave with it.
    let spinner = matches!(&cli.command, Command::Fill(args) if !args.no_progress) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Fill(args) => run_fill(args, spinner && !cli.verbose, cli.quiet).await,
        Command::Fields { input, json } => run_fields(input, json).await,
        Command::Ocr { input, model } => {
            let config = build_config(&model, None)?;
            let pdf = read_pdf(&input).await.context("Failed to read input")?;
            let inspection = inspect(&pdf, &config).await.context("OCR failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&inspection).context("Failed to serialise output")?
            );
            Ok(())
        }
        Command::Serve {
            port,
            host,
            cors_origins,
            body_limit_mb,
            model,
        } => run_serve(&host, port, cors_origins, body_limit_mb, &model).await,
    }
}

async fn run_fill(args: FillArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress = show_progress.then(|| CliProgressCallback::new() as Arc<dyn FillProgressCallback>);
    let config = build_config(&args.model, progress)?;

    let stats = fill_files(&args.form, &args.referral, &args.output, &config)
        .await
        .with_context(|| format!("Failed to fill '{}'", args.form.display()))?;

    if !quiet {
        eprintln!(
            "{}  {}/{} fields written  ({} described, {} mapped)  {}ms  →  {}",
            green("✔"),
            stats.fields_written,
            stats.field_count,
            stats.described_count,
            stats.mapped_count,
            stats.total_ms,
            bold(&args.output.display().to_string()),
        );
    }
    Ok(())
}

async fn run_fields(input: PathBuf, json: bool) -> Result<()> {
    let pdf = read_pdf(&input).await.context("Failed to read input")?;
    let fields = read_fields(&pdf).context("Failed to read form fields")?;
    let pages = page_count(&pdf).context("Failed to count pages")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&fields).context("Failed to serialise fields")?
        );
        return Ok(());
    }

    println!(
        "{} fields on {} pages in {}",
        bold(&fields.len().to_string()),
        pages,
        input.display()
    );
    for field in &fields {
        println!("{}", describe_row(field));
    }
    Ok(())
}

fn describe_row(field: &FormField) -> String {
    let kind = serde_json::to_value(field.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let mut row = format!("  p{:<3} {:<9} {}", field.page, kind, field.name);
    if !field.label.is_empty() {
        row.push_str(&format!("  {}", dim(&field.label)));
    }
    if !field.choices.is_empty() {
        row.push_str(&format!("  {}", dim(&format!("[{}]", field.choices.join("|")))));
    }
    if let Some(ref value) = field.value {
        row.push_str(&format!("  = {value}"));
    }
    row
}

#[cfg(feature = "server")]
async fn run_serve(
    host: &str,
    port: u16,
    cors_origins: Vec<String>,
    body_limit_mb: usize,
    model: &ModelArgs,
) -> Result<()> {
    use edgequake_pafill::server::{serve, ServerConfig};

    let addr: std::net::SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address '{host}:{port}'"))?;
    let config = ServerConfig {
        fill: build_config(model, None)?,
        cors_origins,
        body_limit: body_limit_mb.max(1) * 1024 * 1024,
    };
    serve(addr, config).await.context("Server failed")
}

#[cfg(not(feature = "server"))]
async fn run_serve(
    _host: &str,
    _port: u16,
    _cors_origins: Vec<String>,
    _body_limit_mb: usize,
    _model: &ModelArgs,
) -> Result<()> {
    anyhow::bail!("pafill was built without the `server` feature")
}

/// Map CLI args to `FillConfig`.
fn build_config(
    args: &ModelArgs,
    progress: Option<Arc<dyn FillProgressCallback>>,
) -> Result<FillConfig> {
    let mut builder = FillConfig::builder()
        .batch_size(args.batch_size)
        .concurrency(args.concurrency)
        .context_chars(args.context_chars)
        .referral_chars(args.referral_chars)
        .temperature(args.temperature)
        .api_timeout_secs(args.api_timeout)
        .ocr_timeout_secs(args.ocr_timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use edgequake_pafill::config::{MODEL_ENV, PROVIDER_ENV};
    use std::ffi::OsStr;

    fn env_of(subcommand: &str, arg: &str) -> Option<String> {
        let command = Cli::command();
        let sub = command.find_subcommand(subcommand)?;
        let arg = sub.get_arguments().find(|a| a.get_id() == arg)?;
        arg.get_env().and_then(OsStr::to_str).map(str::to_string)
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn provider_flags_read_the_library_env_names() {
        for sub in ["fill", "ocr", "serve"] {
            assert_eq!(env_of(sub, "provider").as_deref(), Some(PROVIDER_ENV), "{sub}");
            assert_eq!(env_of(sub, "model").as_deref(), Some(MODEL_ENV), "{sub}");
        }
    }
}
