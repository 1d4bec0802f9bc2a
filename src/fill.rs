//! Pipeline orchestrator: `read → describe → reconcile → fill`.
//!
//! ```text
//!  FieldsRead ──▶ FieldsEnriched ──▶ ValuesReconciled ──▶ DocumentFilled ──▶ Done
//!      │                │                    │                   │
//!      └────────────────┴──────── Failed ◀───┴───────────────────┘
//! ```
//!
//! Stages run strictly in order. The first error stops the run and comes
//! back as a [`PipelineError`] naming the stage; nothing is retried and
//! nothing is rolled back (no stage has external side effects).
//!
//! The language model and the OCR engine are resolved per run from
//! [`FillConfig`]; nothing is shared between runs.

use crate::config::{FillConfig, DEFAULT_MODEL, DEFAULT_PROVIDER, MODEL_ENV, PROVIDER_ENV};
use crate::error::{PaFillError, PipelineError, Stage};
use crate::form::{self, FieldValueMap, FormField};
use crate::output::{FillStats, FilledDocument};
use crate::pipeline::enrich::describe_fields;
use crate::pipeline::input;
use crate::pipeline::llm::{LlmTextClient, TextCompletion};
use crate::pipeline::ocr::{join_pages, MistralOcr, OcrEngine, PageText};
use crate::progress::{FillProgressCallback, NoopProgressCallback};
use crate::prompts::referral_summary_prompt;
use crate::pipeline::reconcile::reconcile_values;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fill the PA form from the referral.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `pa_pdf`: the Prior Authorization form (must contain an AcroForm)
/// * `referral_pdf`: the document the values are taken from
/// * `config`: run configuration
///
/// # Errors
/// A [`PipelineError`] naming the stage that failed and the component error.
pub async fn fill(
    pa_pdf: &[u8],
    referral_pdf: &[u8],
    config: &FillConfig,
) -> Result<FilledDocument, PipelineError> {
    let total_start = Instant::now();
    let run = StageReporter::new(config);
    let mut stats = FillStats::default();

    // ── Stage 1: read fields ─────────────────────────────────────────────
    run.start(Stage::FieldsRead);
    let started = Instant::now();
    let fields = run.check(Stage::FieldsRead, read_fields_blocking(pa_pdf).await)?;
    stats.field_count = fields.len();
    stats.read_ms = started.elapsed().as_millis() as u64;
    info!("Read {} form fields in {}ms", fields.len(), stats.read_ms);
    run.complete(Stage::FieldsRead, &format!("{} fields", fields.len()));

    if fields.is_empty() {
        warn!("The PA form has no fillable fields; skipping the model stages");
    }

    // ── Stage 2: describe fields ─────────────────────────────────────────
    run.start(Stage::FieldsEnriched);
    let started = Instant::now();
    let (client, ocr) = if fields.is_empty() {
        (None, None)
    } else {
        let client = run.check(Stage::FieldsEnriched, resolve_text_client(config))?;
        let ocr = run.check(Stage::FieldsEnriched, resolve_ocr(config))?;
        (Some(client), Some(ocr))
    };
    let fields = match (&client, &ocr) {
        (Some(client), Some(ocr)) => {
            let result = enrich_stage(client.as_ref(), ocr.as_ref(), &fields, pa_pdf, config).await;
            run.check(Stage::FieldsEnriched, result)?
        }
        _ => fields,
    };
    stats.described_count = fields.iter().filter(|f| f.description.is_some()).count();
    stats.enrich_ms = started.elapsed().as_millis() as u64;
    info!(
        "Described {}/{} fields in {}ms",
        stats.described_count, stats.field_count, stats.enrich_ms
    );
    run.complete(
        Stage::FieldsEnriched,
        &format!("{} described", stats.described_count),
    );

    // ── Stage 3: reconcile values ────────────────────────────────────────
    run.start(Stage::ValuesReconciled);
    let started = Instant::now();
    let values = match (&client, &ocr) {
        (Some(client), Some(ocr)) => {
            let options = config.reconcile_options();
            let result =
                reconcile_values(client.as_ref(), ocr.as_ref(), &fields, referral_pdf, &options)
                    .await;
            run.check(Stage::ValuesReconciled, result)?
        }
        _ => FieldValueMap::new(),
    };
    stats.mapped_count = values.len();
    stats.reconcile_ms = started.elapsed().as_millis() as u64;
    info!(
        "Reconciled {} values in {}ms",
        stats.mapped_count, stats.reconcile_ms
    );
    run.complete(
        Stage::ValuesReconciled,
        &format!("{} values", stats.mapped_count),
    );

    // ── Stage 4: fill the form ───────────────────────────────────────────
    run.start(Stage::DocumentFilled);
    let started = Instant::now();
    let filled = run.check(
        Stage::DocumentFilled,
        fill_form_blocking(pa_pdf, values.clone()).await,
    )?;
    stats.fields_written = filled.fields_written;
    stats.fill_ms = started.elapsed().as_millis() as u64;
    run.complete(
        Stage::DocumentFilled,
        &format!("{} fields written", filled.fields_written),
    );

    stats.total_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Fill complete: {}/{} fields written, {}ms total",
        stats.fields_written, stats.field_count, stats.total_ms
    );

    Ok(FilledDocument {
        bytes: filled.bytes,
        filename: config.output_filename.clone(),
        values,
        stats,
    })
}

/// Synchronous wrapper around [`fill`].
///
/// Creates a temporary tokio runtime internally; must not be called from
/// inside an async runtime.
pub fn fill_sync(
    pa_pdf: &[u8],
    referral_pdf: &[u8],
    config: &FillConfig,
) -> Result<FilledDocument, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            PipelineError::new(
                Stage::FieldsRead,
                PaFillError::Internal(format!("Failed to create tokio runtime: {}", e)),
            )
        })?
        .block_on(fill(pa_pdf, referral_pdf, config))
}

/// Fill a PA form on disk and write the result to `output_path`.
///
/// Inputs are checked for the `%PDF` magic before any service is called.
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn fill_files(
    pa_path: impl AsRef<Path>,
    referral_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &FillConfig,
) -> Result<FillStats, PipelineError> {
    let pa = input::read_pdf(pa_path)
        .await
        .map_err(|e| PipelineError::new(Stage::FieldsRead, e))?;
    let referral = input::read_pdf(referral_path)
        .await
        .map_err(|e| PipelineError::new(Stage::FieldsRead, e))?;

    let output = fill(&pa, &referral, config).await?;
    write_atomic(output_path.as_ref(), &output.bytes)
        .await
        .map_err(|e| PipelineError::new(Stage::DocumentFilled, e))?;
    Ok(output.stats)
}

/// Diagnostic view of one PDF: raw OCR, the model's summary of it, and any
/// form fields it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub pages: Vec<PageText>,
    /// OCR pages joined with blank lines, as sent to the model.
    pub raw_text: String,
    /// The model's answer to the referral summary prompt, unparsed.
    pub model_output: String,
    pub fields: Vec<FormField>,
}

/// OCR a PDF, ask the model to summarise it, and list its form fields.
///
/// A PDF without an AcroForm yields an empty field list.
pub async fn inspect(pdf: &[u8], config: &FillConfig) -> Result<Inspection, PaFillError> {
    let fields = read_fields_blocking(pdf).await?;
    let ocr = resolve_ocr(config)?;
    let client = resolve_text_client(config)?;

    let pages = ocr.pages(pdf).await?;
    let raw_text = join_pages(&pages);
    debug!("Inspect: {} pages, {} chars of OCR text", pages.len(), raw_text.len());
    let model_output = client.complete(&referral_summary_prompt(&raw_text)).await?;

    Ok(Inspection {
        pages,
        raw_text,
        model_output,
        fields,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Forwards stage events to the configured callback and tags errors.
struct StageReporter<'a> {
    callback: &'a dyn FillProgressCallback,
}

impl<'a> StageReporter<'a> {
    fn new(config: &'a FillConfig) -> Self {
        Self {
            callback: config
                .progress_callback
                .as_deref()
                .unwrap_or(&NoopProgressCallback),
        }
    }

    fn start(&self, stage: Stage) {
        debug!("Stage {} started", stage);
        self.callback.on_stage_start(stage);
    }

    fn complete(&self, stage: Stage, detail: &str) {
        self.callback.on_stage_complete(stage, detail);
    }

    fn check<T>(&self, stage: Stage, result: Result<T, PaFillError>) -> Result<T, PipelineError> {
        result.map_err(|e| {
            warn!("Stage {} failed: {}", stage, e);
            self.callback.on_stage_failed(stage, &e.to_string());
            PipelineError::new(stage, e)
        })
    }
}

async fn enrich_stage(
    client: &dyn TextCompletion,
    ocr: &dyn OcrEngine,
    fields: &[FormField],
    pa_pdf: &[u8],
    config: &FillConfig,
) -> Result<Vec<FormField>, PaFillError> {
    let pages = ocr.pages(pa_pdf).await?;
    debug!("PA form OCR: {} pages", pages.len());
    let page_count = form::page_count(pa_pdf)?;
    let missing = uncovered_pages(&pages, page_count);
    if !missing.is_empty() {
        warn!(
            "OCR returned no text for form pages {:?}; their fields get no context",
            missing
        );
    }
    describe_fields(client, fields, &pages, &config.enrich_options()).await
}

/// Form pages (1-based) with no non-blank OCR text.
fn uncovered_pages(pages: &[PageText], page_count: usize) -> Vec<usize> {
    (1..=page_count)
        .filter(|n| {
            !pages
                .iter()
                .any(|p| p.page_number == *n && !p.markdown.trim().is_empty())
        })
        .collect()
}

/// lopdf parsing is CPU-bound; keep it off the async worker threads.
async fn read_fields_blocking(pdf: &[u8]) -> Result<Vec<FormField>, PaFillError> {
    let bytes = pdf.to_vec();
    tokio::task::spawn_blocking(move || form::read_fields(&bytes))
        .await
        .map_err(|e| PaFillError::Internal(format!("form reader task: {e}")))?
}

async fn fill_form_blocking(
    pdf: &[u8],
    values: FieldValueMap,
) -> Result<form::FilledForm, PaFillError> {
    let bytes = pdf.to_vec();
    tokio::task::spawn_blocking(move || form::fill_form(&bytes, &values))
        .await
        .map_err(|e| PaFillError::Internal(format!("form writer task: {e}")))?
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PaFillError> {
    let failed = |source: std::io::Error| PaFillError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PaFillError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PaFillError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`).
/// 2. **Named provider + model** (`config.provider_name`), model defaulting
///    to [`DEFAULT_MODEL`].
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 4. **`MISTRAL_API_KEY`** present → the Mistral provider.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &FillConfig) -> Result<Arc<dyn LLMProvider>, PaFillError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var(PROVIDER_ENV),
        std::env::var(MODEL_ENV),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("MISTRAL_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_provider(DEFAULT_PROVIDER, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PaFillError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set MISTRAL_API_KEY, or EDGEQUAKE_LLM_PROVIDER and EDGEQUAKE_MODEL.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// The injected text client, else one built over the resolved provider.
pub fn resolve_text_client(config: &FillConfig) -> Result<Arc<dyn TextCompletion>, PaFillError> {
    if let Some(ref client) = config.text_client {
        return Ok(Arc::clone(client));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(
        LlmTextClient::new(provider)
            .with_sampling(config.temperature, config.max_tokens)
            .with_timeout(Duration::from_secs(config.api_timeout_secs)),
    ))
}

/// The injected OCR engine, else Mistral OCR keyed from config or
/// `MISTRAL_API_KEY`.
pub fn resolve_ocr(config: &FillConfig) -> Result<Arc<dyn OcrEngine>, PaFillError> {
    if let Some(ref ocr) = config.ocr {
        return Ok(Arc::clone(ocr));
    }
    let key = config
        .ocr_api_key
        .clone()
        .or_else(|| std::env::var("MISTRAL_API_KEY").ok())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| PaFillError::ProviderNotConfigured {
            provider: "mistral-ocr".to_string(),
            hint: "Set MISTRAL_API_KEY or FillConfig::ocr_api_key.".to_string(),
        })?;

    let ocr = MistralOcr::new(key, Duration::from_secs(config.ocr_timeout_secs))?
        .with_endpoint(&config.ocr_endpoint)
        .with_model(&config.ocr_model);
    Ok(Arc::new(ocr))
}
