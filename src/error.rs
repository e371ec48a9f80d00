//! Error types for the edgequake-pdftables library.
//!
//! Every failure is a [`PdfTablesError`]. What matters to callers is the
//! *kind* of failure ([`ErrorKind`]), which decides how it is reported:
//!
//! * **InvalidFile**: the input is missing, unreadable or not a PDF. The
//!   model API is never contacted.
//! * **InvalidRange**: the detected page ranges are out of bounds,
//!   reversed or overlapping.
//! * **Api**: the provider failed (network, quota, content policy). Carries
//!   a classified [`ApiErrorKind`] so the retry loop knows what is transient.
//! * **ResponseFormat**: the model answered, but not with the JSON we asked
//!   for. The raw text is kept for debugging.
//!
//! Inside a batch these errors are fatal for one document only; the batch
//! runner records them in the document's report and moves on. Configuration
//! errors (`ProviderNotConfigured`, `InvalidConfig`) are the only ones that
//! stop the whole run.

use crate::output::PageRange;
use edgequake_llm::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of characters of a raw model response shown in messages.
const RAW_PREVIEW_CHARS: usize = 400;

// Status codes must stand alone: "got 9500 tokens" is not an HTTP 500.
static RE_STATUS_RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b429\b").unwrap());
static RE_STATUS_AUTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b40[13]\b").unwrap());
static RE_STATUS_NOT_FOUND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b404\b").unwrap());
static RE_STATUS_SERVER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b50[0234]\b").unwrap());

/// All errors returned by the edgequake-pdftables library.
#[derive(Debug, Error)]
pub enum PdfTablesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Encrypted PDFs cannot be split.
    #[error("PDF '{path}' is encrypted.\nDecrypt it first, e.g. qpdf --decrypt input.pdf output.pdf")]
    EncryptedPdf { path: PathBuf },

    // ── Range errors ──────────────────────────────────────────────────────
    /// A page range is reversed or falls outside the document.
    #[error("Invalid page range {range} for a document of {page_count} pages: {reason}")]
    InvalidRange {
        range: PageRange,
        page_count: usize,
        reason: String,
    },

    /// Two detected ranges share at least one page.
    #[error("Page ranges {first} and {second} overlap")]
    OverlappingRanges { first: PageRange, second: PageRange },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model API failed.
    #[error("LLM API error during {stage} ({kind}): {message}")]
    Api {
        stage: Stage,
        kind: ApiErrorKind,
        message: String,
    },

    /// The model answered with text that does not match the expected JSON.
    #[error("Model returned non-conforming output during {stage}: {detail}\nRaw response: {}", preview(.raw))]
    ResponseFormat {
        stage: Stage,
        detail: String,
        raw: String,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Two units of the same run would be written to the same file.
    #[error("Output file '{path}' is already produced by another document in this run")]
    OutputCollision { path: PathBuf },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfTablesError {
    /// The reporting class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::NotAPdf { .. }
            | Self::CorruptPdf { .. }
            | Self::EncryptedPdf { .. } => ErrorKind::InvalidFile,
            Self::InvalidRange { .. } | Self::OverlappingRanges { .. } => ErrorKind::InvalidRange,
            Self::Api { .. } => ErrorKind::Api,
            Self::ResponseFormat { .. } => ErrorKind::ResponseFormat,
            Self::OutputCollision { .. } => ErrorKind::OutputCollision,
            Self::OutputWriteFailed { .. } => ErrorKind::Output,
            Self::ProviderNotConfigured { .. } | Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Api { kind, .. } if kind.is_transient())
    }

    /// Troubleshooting guidance shown by the CLI next to the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Api { kind, .. } => kind.hint(),
            Self::ResponseFormat { .. } => Some(
                "The model ignored the JSON schema. Retry, or try a stronger model with --model.",
            ),
            Self::OutputCollision { .. } => {
                Some("Rename one of the inputs or process them into separate output directories.")
            }
            _ => None,
        }
    }
}

/// Coarse failure class used in reports and the `Failed` document state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFile,
    InvalidRange,
    Api,
    ResponseFormat,
    OutputCollision,
    Output,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidFile => "InvalidFileError",
            ErrorKind::InvalidRange => "InvalidRangeError",
            ErrorKind::Api => "ApiError",
            ErrorKind::ResponseFormat => "ResponseFormatError",
            ErrorKind::OutputCollision => "OutputCollisionError",
            ErrorKind::Output => "OutputError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(s)
    }
}

/// Classified provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// The call did not finish within `api_timeout_secs`.
    Timeout,
    /// HTTP 429 / quota exhausted.
    RateLimited,
    /// The provider refused the content (safety, recitation, blocked).
    ContentPolicy,
    /// 401/403 or a bad API key.
    Auth,
    /// The model identifier does not exist for this provider.
    ModelNotFound,
    /// 5xx / overloaded backend.
    Server,
    /// Connection-level failure.
    Network,
    /// The prompt exceeded the context window, or the reply was cut off at
    /// `max_tokens`.
    TokenLimit,
    Other,
}

impl ApiErrorKind {
    /// Timeouts, rate limits and backend/network hiccups are worth retrying.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ApiErrorKind::Timeout
                | ApiErrorKind::RateLimited
                | ApiErrorKind::Server
                | ApiErrorKind::Network
        )
    }

    /// Classify a typed provider error.
    ///
    /// Only the catch-all variants (`ApiError`, `ProviderError`, `Unknown`)
    /// fall back to [`classify`](Self::classify) on their message.
    pub fn from_llm_error(error: &LlmError) -> Self {
        match error {
            LlmError::Timeout => ApiErrorKind::Timeout,
            LlmError::RateLimited(_) => ApiErrorKind::RateLimited,
            LlmError::AuthError(_) => ApiErrorKind::Auth,
            LlmError::ModelNotFound(_) => ApiErrorKind::ModelNotFound,
            LlmError::NetworkError(_) => ApiErrorKind::Network,
            LlmError::TokenLimitExceeded { .. } => ApiErrorKind::TokenLimit,
            LlmError::ApiError(message)
            | LlmError::ProviderError(message)
            | LlmError::Unknown(message) => Self::classify(message),
            _ => ApiErrorKind::Other,
        }
    }

    /// Classify a provider error from its message.
    ///
    /// Some providers surface status codes and finish reasons only as text,
    /// so this is a keyword match. Content-policy checks run first: a blocked
    /// response must never be mistaken for a retryable one.
    pub fn classify(message: &str) -> Self {
        let m = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

        if has(&[
            "content_filter",
            "content filter",
            "content policy",
            "safety",
            "recitation",
            "prohibited",
            "blocked",
        ]) {
            ApiErrorKind::ContentPolicy
        } else if has(&["timed out", "timeout", "deadline"]) {
            ApiErrorKind::Timeout
        } else if RE_STATUS_RATE.is_match(&m)
            || has(&["rate limit", "rate_limit", "quota", "resource_exhausted"])
        {
            ApiErrorKind::RateLimited
        } else if RE_STATUS_AUTH.is_match(&m)
            || has(&[
                "unauthorized",
                "unauthenticated",
                "authentication",
                "forbidden",
                "api key",
                "api_key",
            ])
        {
            ApiErrorKind::Auth
        } else if RE_STATUS_NOT_FOUND.is_match(&m) || has(&["not found", "not_found"]) {
            ApiErrorKind::ModelNotFound
        } else if RE_STATUS_SERVER.is_match(&m)
            || has(&["unavailable", "overloaded", "internal server"])
        {
            ApiErrorKind::Server
        } else if has(&["connection", "network", "dns", "connect error"]) {
            ApiErrorKind::Network
        } else {
            ApiErrorKind::Other
        }
    }

    fn hint(self) -> Option<&'static str> {
        match self {
            ApiErrorKind::ContentPolicy => Some(
                "The document may contain copyrighted or sensitive material the provider refuses to reproduce.",
            ),
            ApiErrorKind::ModelNotFound => {
                Some("The model may not be available for this provider. Check --model.")
            }
            ApiErrorKind::Auth => Some("Check the provider API key, e.g. export GEMINI_API_KEY=..."),
            ApiErrorKind::RateLimited => {
                Some("Rate limit or quota exceeded. Lower --concurrency or wait before retrying.")
            }
            ApiErrorKind::Timeout => Some("Increase --api-timeout for large documents."),
            ApiErrorKind::TokenLimit => Some(
                "The request or reply hit the token limit. Raise --max-tokens, or split the document into smaller files.",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApiErrorKind::Timeout => "timeout",
            ApiErrorKind::RateLimited => "rate limited",
            ApiErrorKind::ContentPolicy => "content policy",
            ApiErrorKind::Auth => "authentication",
            ApiErrorKind::ModelNotFound => "model not found",
            ApiErrorKind::Server => "server error",
            ApiErrorKind::Network => "network",
            ApiErrorKind::TokenLimit => "token limit",
            ApiErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// The model call an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DetectRanges,
    ExtractTables,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::DetectRanges => f.write_str("range detection"),
            Stage::ExtractTables => f.write_str("table extraction"),
        }
    }
}

fn preview(raw: &str) -> String {
    if raw.chars().count() > RAW_PREVIEW_CHARS {
        let head: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
        format!("{head}\u{2026}")
    } else {
        raw.to_string()
    }
}
