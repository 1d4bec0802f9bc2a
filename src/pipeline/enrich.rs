//! Field description enricher.
//!
//! Field names in real PA forms are things like `Text7` or `chk_3a`; the
//! reconciler does much better when every field carries a short human
//! description. This stage asks the model for one, a batch at a time, with
//! the OCR text of the pages the batch's fields sit on as context.
//!
//! ## Scheduling
//!
//! ```text
//! fields ─chunks(B)─▶ batch 0 ─┐
//!                     batch 1 ─┼─ buffered(concurrency) ─▶ results in batch order
//!                     batch N ─┘
//! ```
//!
//! `buffered` (not `buffer_unordered`) keeps results in batch order, and
//! `try_collect` stops at the first error: batches still in flight are
//! dropped, which cancels their requests.

use super::json::parse_array;
use super::llm::TextCompletion;
use super::ocr::PageText;
use crate::error::PaFillError;
use crate::form::{FieldKind, FormField};
use crate::prompts::describe_prompt;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Batching and context limits for [`describe_fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Fields per model call. Default: 20.
    pub batch_size: usize,
    /// Maximum characters of page text sent with each batch. Default: 1000.
    pub context_chars: usize,
    /// Maximum batches in flight at once. Default: 10.
    pub concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            context_chars: 1000,
            concurrency: 10,
        }
    }
}

/// What the model sees of a field while describing it.
#[derive(Serialize)]
struct PromptField<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: FieldKind,
    page: usize,
    bbox: [f32; 4],
    label: &'a str,
    description: &'a str,
}

impl<'a> From<&'a FormField> for PromptField<'a> {
    fn from(field: &'a FormField) -> Self {
        Self {
            name: &field.name,
            kind: field.kind,
            page: field.page,
            bbox: field.bbox,
            label: &field.label,
            description: field.description.as_deref().unwrap_or(""),
        }
    }
}

/// Give every field a description, using `pages` as context.
///
/// Returns exactly the input fields, in input order, with `description` set
/// where the model supplied one. Makes `ceil(K / batch_size)` model calls;
/// none for an empty slice.
///
/// # Errors
/// The first [`PaFillError::LmService`] or
/// [`PaFillError::MalformedModelResponse`] from any batch.
pub async fn describe_fields(
    client: &dyn TextCompletion,
    fields: &[FormField],
    pages: &[PageText],
    options: &EnrichOptions,
) -> Result<Vec<FormField>, PaFillError> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }
    let batch_size = options.batch_size.max(1);
    let batch_count = fields.len().div_ceil(batch_size);
    debug!(
        "Describing {} fields in {} batches (concurrency {})",
        fields.len(),
        batch_count,
        options.concurrency
    );

    // Futures are built up front: a mapping closure over borrowed batches
    // would make the returned future non-`Send`.
    let jobs: Vec<_> = fields
        .chunks(batch_size)
        .enumerate()
        .map(|(index, batch)| describe_batch(client, index, batch, pages, options.context_chars))
        .collect();
    let described: Vec<Vec<FormField>> = stream::iter(jobs)
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    Ok(described.into_iter().flatten().collect())
}

async fn describe_batch(
    client: &dyn TextCompletion,
    index: usize,
    batch: &[FormField],
    pages: &[PageText],
    context_chars: usize,
) -> Result<Vec<FormField>, PaFillError> {
    let view: Vec<PromptField<'_>> = batch.iter().map(PromptField::from).collect();
    let fields_json = serde_json::to_string_pretty(&view)
        .map_err(|e| PaFillError::Internal(format!("serialise batch {index}: {e}")))?;
    let context = batch_context(batch, pages, context_chars);
    let prompt = describe_prompt(index, &fields_json, &context);

    let raw = client.complete(&prompt).await?;
    let items = parse_array(&raw)?;
    let descriptions = descriptions_by_name(&items);
    debug!(
        "Batch {}: {} fields, {} descriptions",
        index + 1,
        batch.len(),
        descriptions.len()
    );

    Ok(batch
        .iter()
        .cloned()
        .map(|mut field| {
            match descriptions.get(field.name.as_str()) {
                Some(description) => field.description = Some(description.clone()),
                None => warn!("Batch {}: no description returned for '{}'", index + 1, field.name),
            }
            field
        })
        .collect())
}

/// Distinct page texts of the batch's pages, joined and truncated.
fn batch_context(batch: &[FormField], pages: &[PageText], max_chars: usize) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for field in batch {
        let Some(page) = field.page.checked_sub(1).and_then(|i| pages.get(i)) else {
            continue;
        };
        if !seen.contains(&page.markdown.as_str()) {
            seen.push(&page.markdown);
        }
    }
    truncate_chars(&seen.join("\n\n"), max_chars).to_string()
}

/// The first `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// `name → description` from the returned objects; other keys are ignored.
fn descriptions_by_name(items: &[serde_json::Value]) -> HashMap<&str, String> {
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let description = item.get("description")?.as_str()?.trim();
            (!description.is_empty()).then(|| (name, description.to_string()))
        })
        .collect()
}
