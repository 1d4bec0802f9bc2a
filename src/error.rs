//! Error types for the edgequake-pafill library.
//!
//! Two types reflect two levels of failure:
//!
//! * [`PaFillError`]: what a single component reports: the form could not be
//!   parsed, the OCR call failed, the model answered with something that is
//!   not JSON, and so on. Every component function returns it.
//!
//! * [`PipelineError`]: what the orchestrator reports: the component error
//!   plus the [`Stage`] in which it happened. The transport layer shows both
//!   so a failed run says *where* it stopped, not only *why*.
//!
//! Nothing is retried or recovered locally; any error aborts the run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure a pipeline component can report.
#[derive(Debug, Error)]
pub enum PaFillError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The bytes are not a readable PDF (or not a form the reader understands).
    #[error("Could not parse PDF: {detail}")]
    DocumentParse { detail: String },

    /// The filled document could not be produced.
    #[error("Could not write filled PDF: {detail}")]
    DocumentWrite { detail: String },

    // ── Remote service errors ─────────────────────────────────────────────
    /// The OCR request failed (transport, timeout, non-2xx, undecodable body).
    #[error("OCR service error: {detail}")]
    OcrService { detail: String },

    /// The chat-completion request failed.
    #[error("Language model error: {detail}")]
    LmService { detail: String },

    /// The model answered, but not with the JSON shape we asked for.
    ///
    /// `raw` holds the complete response text for diagnostics.
    #[error("Malformed model response: {detail}\n--- raw response ---\n{raw}")]
    MalformedModelResponse { detail: String, raw: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaFillError {
    /// Shorthand for a [`PaFillError::DocumentParse`].
    pub fn parse(detail: impl Into<String>) -> Self {
        PaFillError::DocumentParse {
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`PaFillError::DocumentWrite`].
    pub fn write(detail: impl Into<String>) -> Self {
        PaFillError::DocumentWrite {
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`PaFillError::MalformedModelResponse`].
    pub fn malformed(detail: impl Into<String>, raw: impl Into<String>) -> Self {
        PaFillError::MalformedModelResponse {
            detail: detail.into(),
            raw: raw.into(),
        }
    }

    /// The raw model output, when this error carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            PaFillError::MalformedModelResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// The pipeline stage a run was attempting when it failed.
///
/// Stages are named after the state the run moves *into* on success:
/// `FieldsRead → FieldsEnriched → ValuesReconciled → DocumentFilled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Enumerating the PA form's widgets.
    FieldsRead,
    /// OCR of the PA form plus the description batches.
    FieldsEnriched,
    /// Referral OCR plus the value-mapping call.
    ValuesReconciled,
    /// Writing values into the form and serialising it.
    DocumentFilled,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::FieldsRead,
        Stage::FieldsEnriched,
        Stage::ValuesReconciled,
        Stage::DocumentFilled,
    ];

    /// Short machine-friendly name (`fields_read`, …).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FieldsRead => "fields_read",
            Stage::FieldsEnriched => "fields_enriched",
            Stage::ValuesReconciled => "values_reconciled",
            Stage::DocumentFilled => "document_filled",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed pipeline run: which stage failed, and the component error.
#[derive(Debug, Error)]
#[error("pipeline failed at stage '{stage}': {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: PaFillError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: PaFillError) -> Self {
        Self { stage, source }
    }

    /// The raw model output if the failure was a malformed model response.
    pub fn raw_response(&self) -> Option<&str> {
        self.source.raw_response()
    }
}
