//! # edgequake-pafill
//!
//! Fill Prior Authorization (PA) PDF forms from a referral document using
//! OCR and a language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PA form ─┐
//!          ├─ 1. Read       enumerate AcroForm widgets (lopdf)
//!          ├─ 2. Describe   OCR the form, batch fields, ask the model what each one means
//! referral ┼─ 3. Reconcile  OCR the referral, ask the model for every field's value
//!          └─ 4. Fill       write values type-aware, prune + compress, save
//! ```
//!
//! Each step is usable on its own ([`read_fields`], [`describe_fields`],
//! [`reconcile_values`], [`fill_form`]); [`fill`] runs them in order and
//! reports the failing stage on error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pafill::{fill, FillConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Mistral chat + OCR, keyed from MISTRAL_API_KEY
//!     let config = FillConfig::default();
//!     let pa = std::fs::read("PA.pdf")?;
//!     let referral = std::fs::read("referral.pdf")?;
//!     let output = fill(&pa, &referral, &config).await?;
//!     std::fs::write(&output.filename, &output.bytes)?;
//!     eprintln!("{} fields written", output.stats.fields_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pafill` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables [`server`], the axum HTTP transport |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-pafill = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod fill;
pub mod form;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FillConfig, FillConfigBuilder};
pub use error::{PaFillError, PipelineError, Stage};
pub use fill::{fill, fill_files, fill_sync, inspect, Inspection};
pub use form::{fill_form, page_count, read_fields, FieldKind, FieldValueMap, FilledForm, FormField};
pub use output::{FillStats, FilledDocument};
pub use pipeline::enrich::{describe_fields, EnrichOptions};
pub use pipeline::llm::{LlmTextClient, TextCompletion};
pub use pipeline::ocr::{join_pages, MistralOcr, OcrEngine, PageText};
pub use pipeline::reconcile::{reconcile_values, ReconcileOptions};
pub use progress::{FillProgressCallback, NoopProgressCallback};
