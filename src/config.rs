//! Configuration types for PDF table extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The library never reads the environment
//! itself: the CLI maps flags and env vars onto the builder, and tests pass
//! a config with a fake model and a temp output directory.

use crate::error::PdfTablesError;
use crate::model::TableModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Page count above which a document is split before extraction.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 23;

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default directory for JSON artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "json_outputs";

/// Configuration for a table-extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdftables::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .output_dir("tables")
///     .model("gemini-2.0-flash")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.split_threshold, 23);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Directory receiving one JSON file per document or sub-document.
    pub output_dir: PathBuf,

    /// Documents with more pages than this are split along the detected
    /// table ranges. Default: 23.
    ///
    /// Long PDFs exceed what the model reliably reads in one request;
    /// shorter ones are sent whole and range detection is skipped.
    pub split_threshold: usize,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai"). If None, [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed table model. Takes precedence over every provider
    /// setting; used to plug in fixtures.
    pub table_model: Option<Arc<dyn TableModel>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// A dense table page easily needs a few thousand tokens of JSON; a
    /// truncated reply is unparseable and fails the whole unit.
    pub max_tokens: usize,

    /// Retries after the first attempt on a transient API failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Number of documents processed at once. Default: 1.
    pub concurrency: usize,

    /// Also write each split sub-document to `<output_dir>/splits/`.
    pub keep_splits: bool,

    /// Custom range-detection prompt. If None, uses the built-in one.
    pub detection_prompt: Option<String>,

    /// Custom extraction prompt. If None, uses the built-in one.
    pub extraction_prompt: Option<String>,

    /// Receives per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            model: None,
            provider_name: None,
            provider: None,
            table_model: None,
            temperature: 0.0,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            concurrency: 1,
            keep_splits: false,
            detection_prompt: None,
            extraction_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("output_dir", &self.output_dir)
            .field("split_threshold", &self.split_threshold)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("table_model", &self.table_model.as_ref().map(|_| "<dyn TableModel>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("keep_splits", &self.keep_splits)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model identifier actually used.
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Provider name actually used.
    pub fn provider_label(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Whether a document of `page_count` pages must be split.
    pub fn needs_split(&self, page_count: usize) -> bool {
        page_count > self.split_threshold
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn split_threshold(mut self, pages: usize) -> Self {
        self.config.split_threshold = pages;
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

    pub fn table_model(mut self, model: Arc<dyn TableModel>) -> Self {
        self.config.table_model = Some(model);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn keep_splits(mut self, v: bool) -> Self {
        self.config.keep_splits = v;
        self
    }

    pub fn detection_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.detection_prompt = Some(prompt.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PdfTablesError> {
        let c = &self.config;
        if c.split_threshold == 0 {
            return Err(PdfTablesError::InvalidConfig(
                "Split threshold must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PdfTablesError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PdfTablesError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(PdfTablesError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
