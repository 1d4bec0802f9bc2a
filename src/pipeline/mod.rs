//! Pipeline stages between reading the form and writing it back.
//!
//! Each submodule implements one step and is testable on its own with the
//! [`TextCompletion`](llm::TextCompletion) and [`OcrEngine`](ocr::OcrEngine)
//! fakes the tests provide.
//!
//! ## Data Flow
//!
//! ```text
//! PA form ──▶ ocr ──▶ enrich ──▶ reconcile ◀── ocr ◀── referral
//!                       │            │
//!                      llm ◀────────llm
//!                       │            │
//!                     json         json
//! ```
//!
//! 1. [`ocr`]: per-page markdown from the remote OCR service
//! 2. [`llm`]: single prompt → completion text
//! 3. [`enrich`]: batched, bounded-concurrency field descriptions
//! 4. [`reconcile`]: one call mapping every field to a referral value
//! 5. [`json`]: lenient extraction of JSON from model output

pub mod enrich;
pub mod input;
pub mod json;
pub mod llm;
pub mod ocr;
pub mod reconcile;
