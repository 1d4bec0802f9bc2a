//! Document OCR adapter: PDF bytes to per-page markdown.
//!
//! The OCR model itself is out of scope; this module is the narrow interface
//! to it. [`OcrEngine`] is the seam the pipeline depends on and
//! [`MistralOcr`] the production implementation, which posts the whole PDF
//! as a base64 `data:` URL and receives one markdown string per page.
//!
//! Whatever order the service answers in, [`OcrEngine::pages`] returns one
//! [`PageText`] per page, ordered by page number, with gaps filled by empty
//! pages. No retry happens here.

use crate::error::PaFillError;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default Mistral OCR endpoint.
pub const MISTRAL_OCR_ENDPOINT: &str = "https://api.mistral.ai/v1/ocr";

/// Default Mistral OCR model.
pub const MISTRAL_OCR_MODEL: &str = "mistral-ocr-latest";

/// Markdown of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: usize,
    /// Page content; empty when the service returned nothing for the page.
    pub markdown: String,
}

/// Anything that can OCR a PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// One entry per page, ordered by page number.
    async fn pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, PaFillError>;
}

/// Concatenate page markdown separated by blank lines.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.markdown.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── Mistral OCR ──────────────────────────────────────────────────────────

/// [`OcrEngine`] backed by the Mistral OCR HTTP API.
#[derive(Clone)]
pub struct MistralOcr {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl MistralOcr {
    /// Client for the default endpoint and model with the given timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, PaFillError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaFillError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: MISTRAL_OCR_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: MISTRAL_OCR_MODEL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for MistralOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralOcr")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    /// 0-based.
    index: usize,
    #[serde(default)]
    markdown: String,
}

#[async_trait]
impl OcrEngine for MistralOcr {
    async fn pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, PaFillError> {
        let start = Instant::now();
        let encoded = base64::engine::general_purpose::STANDARD.encode(pdf);
        let request = serde_json::json!({
            "model": self.model,
            "document": {
                "type": "document_url",
                "document_url": format!("data:application/pdf;base64,{encoded}"),
            },
            "include_image_base64": false,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaFillError::OcrService {
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaFillError::OcrService {
                detail: format!("service returned {}: {}", status, snippet(&body)),
            });
        }

        let parsed: OcrResponse = response.json().await.map_err(|e| PaFillError::OcrService {
            detail: format!("undecodable response: {e}"),
        })?;

        let pages = normalise_pages(parsed.pages);
        debug!(
            "OCR: {} bytes → {} pages in {:?}",
            pdf.len(),
            pages.len(),
            start.elapsed()
        );
        Ok(pages)
    }
}

/// Sort by index and fill missing indices with empty pages.
fn normalise_pages(mut raw: Vec<OcrPage>) -> Vec<PageText> {
    raw.sort_by_key(|p| p.index);
    let count = raw.last().map(|p| p.index + 1).unwrap_or(0);
    let mut pages: Vec<PageText> = (1..=count)
        .map(|page_number| PageText {
            page_number,
            markdown: String::new(),
        })
        .collect();
    for page in raw {
        pages[page.index].markdown = page.markdown;
    }
    pages
}

fn snippet(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(index: usize, markdown: &str) -> OcrPage {
        OcrPage {
            index,
            markdown: markdown.to_string(),
        }
    }

    #[test]
    fn pages_are_sorted_and_one_based() {
        let pages = normalise_pages(vec![raw(1, "second"), raw(0, "first")]);
        assert_eq!(
            pages,
            vec![
                PageText {
                    page_number: 1,
                    markdown: "first".into()
                },
                PageText {
                    page_number: 2,
                    markdown: "second".into()
                },
            ]
        );
    }

    #[test]
    fn missing_pages_are_filled_with_empty_text() {
        let pages = normalise_pages(vec![raw(0, "a"), raw(2, "c")]);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[1].markdown, "");
    }

    #[test]
    fn empty_response_is_no_pages() {
        assert!(normalise_pages(Vec::new()).is_empty());
    }

    #[test]
    fn response_deserialises_without_markdown() {
        let parsed: OcrResponse =
            serde_json::from_str(r#"{"pages":[{"index":0},{"index":1,"markdown":"x"}],"model":"m"}"#)
                .unwrap();
        let pages = normalise_pages(parsed.pages);
        assert_eq!(pages[0].markdown, "");
        assert_eq!(pages[1].markdown, "x");
    }

    #[test]
    fn join_uses_blank_lines() {
        let pages = normalise_pages(vec![raw(0, "a"), raw(1, "b")]);
        assert_eq!(join_pages(&pages), "a\n\nb");
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = "x".repeat(1000);
        assert_eq!(snippet(&body).chars().count(), 301);
        assert_eq!(snippet("short"), "short");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_ocr_error() {
        let ocr = MistralOcr::new("key", Duration::from_secs(2))
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/v1/ocr");
        let err = ocr.pages(b"%PDF-1.7").await.unwrap_err();
        assert!(matches!(err, PaFillError::OcrService { .. }), "got: {err:?}");
    }
}
