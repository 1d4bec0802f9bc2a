//! Value reconciler: referral document + described fields → [`FieldValueMap`].
//!
//! One OCR call for the referral, one model call for the mapping. The answer
//! is the least reliable text in the whole pipeline (models like to add
//! comments to "JSON only" output), so it goes through
//! [`parse_object`](super::json::parse_object) before anything trusts it.

use super::enrich::truncate_chars;
use super::json::{parse_object, value_to_field_text};
use super::llm::TextCompletion;
use super::ocr::{join_pages, OcrEngine};
use crate::error::PaFillError;
use crate::form::{FieldValueMap, FormField};
use crate::prompts::reconcile_prompt;
use tracing::debug;

/// Context limit for [`reconcile_values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Maximum characters of referral text sent to the model. Default: 2000.
    pub referral_chars: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            referral_chars: 2000,
        }
    }
}

/// OCR the referral and ask the model to fill every field from it.
///
/// JSON `null` values are dropped (the field stays untouched); other
/// non-string values are rendered as text.
///
/// # Errors
/// [`PaFillError::OcrService`], [`PaFillError::LmService`], or
/// [`PaFillError::MalformedModelResponse`] carrying the raw answer.
pub async fn reconcile_values(
    client: &dyn TextCompletion,
    ocr: &dyn OcrEngine,
    fields: &[FormField],
    referral_pdf: &[u8],
    options: &ReconcileOptions,
) -> Result<FieldValueMap, PaFillError> {
    let pages = ocr.pages(referral_pdf).await?;
    let referral_text = join_pages(&pages);
    let excerpt = truncate_chars(&referral_text, options.referral_chars);

    let fields_json = serde_json::to_string_pretty(fields)
        .map_err(|e| PaFillError::Internal(format!("serialise fields: {e}")))?;
    let prompt = reconcile_prompt(&fields_json, excerpt);
    debug!(
        "Reconciling {} fields against {} referral pages ({} prompt chars)",
        fields.len(),
        pages.len(),
        prompt.len()
    );

    let raw = client.complete(&prompt).await?;
    let object = parse_object(&raw)?;

    let values: FieldValueMap = object
        .iter()
        .filter_map(|(name, value)| Some((name.clone(), value_to_field_text(value)?)))
        .collect();
    debug!("Model mapped {} of {} fields", values.len(), fields.len());
    Ok(values)
}
