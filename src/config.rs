//! Configuration types for a form-fill run.
//!
//! All pipeline behaviour is controlled through [`FillConfig`], built via
//! its [`FillConfigBuilder`]. There is no global client: the language model
//! and the OCR engine are either injected here or resolved from the
//! environment at the start of each run.

use crate::error::PaFillError;
use crate::pipeline::enrich::EnrichOptions;
use crate::pipeline::llm::TextCompletion;
use crate::pipeline::ocr::{OcrEngine, MISTRAL_OCR_ENDPOINT, MISTRAL_OCR_MODEL};
use crate::pipeline::reconcile::ReconcileOptions;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Provider used when only an API key is available.
pub const DEFAULT_PROVIDER: &str = "mistral";

/// Chat model used when none is configured.
pub const DEFAULT_MODEL: &str = "mistral-small-latest";

/// Filename given to the filled document.
pub const DEFAULT_OUTPUT_FILENAME: &str = "filled_PA.pdf";

/// Environment variable naming the chat provider.
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";

/// Environment variable naming the chat model.
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

/// Configuration for a form-fill run.
///
/// Built via [`FillConfig::builder()`] or using [`FillConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pafill::FillConfig;
///
/// let config = FillConfig::builder()
///     .batch_size(10)
///     .concurrency(4)
///     .model("mistral-large-latest")
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 10);
/// ```
#[derive(Clone)]
pub struct FillConfig {
    /// Fields per description call. Range: 1–200. Default: 20.
    pub batch_size: usize,

    /// Characters of PA-form page text sent with each description batch.
    /// Default: 1000.
    pub context_chars: usize,

    /// Characters of referral text sent to the reconciler. Default: 2000.
    pub referral_chars: usize,

    /// Description batches in flight at once. `1` processes them
    /// sequentially. Default: 10.
    pub concurrency: usize,

    /// Chat model identifier. If None, [`DEFAULT_MODEL`] for a named provider.
    pub model: Option<String>,

    /// Provider name (e.g. "mistral", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text client. Takes precedence over every provider
    /// setting; tests inject scripted clients here.
    pub text_client: Option<Arc<dyn TextCompletion>>,

    /// Pre-constructed OCR engine. Takes precedence over the Mistral settings.
    pub ocr: Option<Arc<dyn OcrEngine>>,

    /// Mistral OCR API key. If None, `MISTRAL_API_KEY` is read at run time.
    pub ocr_api_key: Option<String>,

    /// Mistral OCR endpoint. Default: [`MISTRAL_OCR_ENDPOINT`].
    pub ocr_endpoint: String,

    /// Mistral OCR model. Default: [`MISTRAL_OCR_MODEL`].
    pub ocr_model: String,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 4096.
    pub max_tokens: usize,

    /// Per-LM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Per-OCR-call timeout in seconds. Default: 180.
    pub ocr_timeout_secs: u64,

    /// Filename reported with the filled document. Default: `filled_PA.pdf`.
    pub output_filename: String,

    /// Optional stage-event receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            context_chars: 1000,
            referral_chars: 2000,
            concurrency: 10,
            model: None,
            provider_name: None,
            provider: None,
            text_client: None,
            ocr: None,
            ocr_api_key: None,
            ocr_endpoint: MISTRAL_OCR_ENDPOINT.to_string(),
            ocr_model: MISTRAL_OCR_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 60,
            ocr_timeout_secs: 180,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for FillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillConfig")
            .field("batch_size", &self.batch_size)
            .field("context_chars", &self.context_chars)
            .field("referral_chars", &self.referral_chars)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("text_client", &self.text_client.as_ref().map(|_| "<dyn TextCompletion>"))
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("ocr_api_key", &self.ocr_api_key.as_ref().map(|_| "<redacted>"))
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("ocr_model", &self.ocr_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("output_filename", &self.output_filename)
            .finish()
    }
}

impl FillConfig {
    /// Create a new builder for `FillConfig`.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder {
            config: Self::default(),
        }
    }

    /// Batching limits for the enricher.
    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            batch_size: self.batch_size,
            context_chars: self.context_chars,
            concurrency: self.concurrency,
        }
    }

    /// Context limit for the reconciler.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            referral_chars: self.referral_chars,
        }
    }
}

/// Builder for [`FillConfig`].
pub struct FillConfigBuilder {
    config: FillConfig,
}

impl fmt::Debug for FillConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl FillConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.clamp(1, 200);
        self
    }

    pub fn context_chars(mut self, n: usize) -> Self {
        self.config.context_chars = n;
        self
    }

    pub fn referral_chars(mut self, n: usize) -> Self {
        self.config.referral_chars = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn text_client(mut self, client: Arc<dyn TextCompletion>) -> Self {
        self.config.text_client = Some(client);
        self
    }

    pub fn ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr = Some(ocr);
        self
    }

    pub fn ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ocr_api_key = Some(key.into());
        self
    }

    pub fn ocr_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.ocr_endpoint = endpoint.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.config.output_filename = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FillConfig, PaFillError> {
        let c = &self.config;
        if c.batch_size == 0 || c.batch_size > 200 {
            return Err(PaFillError::InvalidConfig(format!(
                "Batch size must be 1–200, got {}",
                c.batch_size
            )));
        }
        if c.concurrency == 0 {
            return Err(PaFillError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.context_chars == 0 || c.referral_chars == 0 {
            return Err(PaFillError::InvalidConfig(
                "Context limits must be ≥ 1 character".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.ocr_timeout_secs == 0 {
            return Err(PaFillError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        if c.output_filename.trim().is_empty() {
            return Err(PaFillError::InvalidConfig(
                "Output filename must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
