//! [`TableModel`] over an `edgequake-llm` provider.
//!
//! ## Message Layout
//!
//! Each call sends (in order):
//! 1. **System message**: the detection or extraction prompt
//! 2. **User message**: a one-line description of the file plus the PDF
//!    itself as an inline `application/pdf` attachment
//!
//! Options ask for JSON mode (`response_format = "json_object"`, which Gemini
//! maps to `response_mime_type: application/json`). A reply whose
//! `finish_reason` says it was blocked or truncated is turned into an
//! [`PdfTablesError::Api`] error instead of being parsed.
//!
//! Retries and timeouts are not handled here; the pipeline wraps every call
//! in [`crate::pipeline::retry::call_with_retry`].

use crate::config::ExtractionConfig;
use crate::error::{ApiErrorKind, PdfTablesError, Stage};
use crate::model::{DocumentPayload, ModelReply, TableModel};
use crate::pipeline::encode::encode_document;
use crate::prompts::{document_message, DETECT_RANGES_PROMPT, EXTRACT_TABLES_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse, ProviderFactory};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Production table model backed by a chat-completion provider.
pub struct LlmTableModel {
    provider: Arc<dyn LLMProvider>,
    detection_prompt: String,
    extraction_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmTableModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            detection_prompt: config
                .detection_prompt
                .clone()
                .unwrap_or_else(|| DETECT_RANGES_PROMPT.to_string()),
            extraction_prompt: config
                .extraction_prompt
                .clone()
                .unwrap_or_else(|| EXTRACT_TABLES_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Instantiate `config`'s provider and model through [`ProviderFactory`].
    ///
    /// The factory reads the provider's API key from its usual environment
    /// variable (`GEMINI_API_KEY` for the default provider).
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, PdfTablesError> {
        let provider = match config.provider {
            Some(ref provider) => Arc::clone(provider),
            None => {
                let name = config.provider_label();
                ProviderFactory::create_llm_provider(name, config.model_name()).map_err(|e| {
                    PdfTablesError::ProviderNotConfigured {
                        provider: name.to_string(),
                        hint: format!(
                            "{e}\nSet the provider's API key (e.g. GEMINI_API_KEY) or choose another provider with --provider."
                        ),
                    }
                })?
            }
        };
        Ok(Self::new(provider, config))
    }

    async fn ask(
        &self,
        stage: Stage,
        prompt: &str,
        document: &DocumentPayload,
    ) -> Result<ModelReply, PdfTablesError> {
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images(
                &document_message(&document.label(), document.page_count),
                vec![encode_document(document)],
            ),
        ];
        let options = build_options(self.temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| PdfTablesError::Api {
                stage,
                kind: ApiErrorKind::from_llm_error(&e),
                message: e.to_string(),
            })?;
        check_finish_reason(stage, &response)?;

        debug!(
            "{}: {} → {} chars",
            document.label(),
            stage,
            response.content.len()
        );
        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        response_format: Some("json_object".to_string()),
        ..Default::default()
    }
}

/// Reject replies the provider stopped early.
///
/// Gemini reports `SAFETY`, `RECITATION` etc. as a successful response with
/// partial or empty content; OpenAI and Anthropic use `length`/`max_tokens`
/// for truncation. Other reasons (`STOP`, `end_turn`, ...) pass.
fn check_finish_reason(stage: Stage, response: &LLMResponse) -> Result<(), PdfTablesError> {
    let Some(reason) = response.finish_reason.as_deref() else {
        return Ok(());
    };
    match reason.to_ascii_uppercase().as_str() {
        "SAFETY" | "IMAGE_SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST"
        | "SPII" | "CONTENT_FILTER" => Err(PdfTablesError::Api {
            stage,
            kind: ApiErrorKind::ContentPolicy,
            message: format!("response blocked by the provider (finish_reason={reason})"),
        }),
        "MAX_TOKENS" | "LENGTH" => Err(PdfTablesError::Api {
            stage,
            kind: ApiErrorKind::TokenLimit,
            message: format!(
                "reply truncated after {} output tokens (finish_reason={reason})",
                response.completion_tokens
            ),
        }),
        _ => Ok(()),
    }
}

impl TableModel for LlmTableModel {
    fn detect_ranges<'a>(
        &'a self,
        document: &'a DocumentPayload,
    ) -> BoxFuture<'a, Result<ModelReply, PdfTablesError>> {
        self.ask(Stage::DetectRanges, &self.detection_prompt, document)
            .boxed()
    }

    fn extract_tables<'a>(
        &'a self,
        document: &'a DocumentPayload,
    ) -> BoxFuture<'a, Result<ModelReply, PdfTablesError>> {
        self.ask(Stage::ExtractTables, &self.extraction_prompt, document)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{ChatRole, LlmError};
    use std::path::Path;
    use std::sync::Mutex;

    type Reply = Box<dyn Fn() -> edgequake_llm::Result<LLMResponse> + Send + Sync>;

    /// Provider that records each chat call and answers from `reply`.
    struct StubProvider {
        reply: Reply,
        calls: Mutex<Vec<(Vec<ChatMessage>, Option<CompletionOptions>)>>,
    }

    impl StubProvider {
        fn new(
            reply: impl Fn() -> edgequake_llm::Result<LLMResponse> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                reply: Box::new(reply),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn answering(content: &'static str, finish_reason: &'static str) -> Arc<Self> {
            Self::new(move || {
                Ok(LLMResponse::new(content, "stub-model")
                    .with_usage(1200, 80)
                    .with_finish_reason(finish_reason))
            })
        }
    }

    #[async_trait::async_trait]
    impl LLMProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        fn max_context_length(&self) -> usize {
            1_000_000
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.cloned()));
            (self.reply)()
        }
    }

    fn model_over(provider: Arc<StubProvider>) -> LlmTableModel {
        LlmTableModel::new(provider, &ExtractionConfig::default())
    }

    fn payload() -> DocumentPayload {
        DocumentPayload::whole(Path::new("rates.pdf"), 3, Arc::from(&b"%PDF-1.7 stub"[..]))
    }

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(config.temperature, config.max_tokens);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(8192));
        assert_eq!(opts.response_format.as_deref(), Some("json_object"));
    }

    #[tokio::test]
    async fn successful_reply_carries_text_and_usage() {
        let provider = StubProvider::answering(r#"[{"page":1,"table":[]}]"#, "STOP");
        let model = model_over(Arc::clone(&provider));

        let reply = model.extract_tables(&payload()).await.unwrap();
        assert_eq!(reply.text, r#"[{"page":1,"table":[]}]"#);
        assert_eq!(reply.input_tokens, 1200);
        assert_eq!(reply.output_tokens, 80);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (messages, options) = &calls[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, EXTRACT_TABLES_PROMPT);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains("rates.pdf"), "got: {}", messages[1].content);

        let images = messages[1].images.as_ref().expect("PDF attachment");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "application/pdf");

        let options = options.as_ref().expect("options are always sent");
        assert_eq!(options.response_format.as_deref(), Some("json_object"));
    }

    #[tokio::test]
    async fn detection_uses_detection_prompt() {
        let provider = StubProvider::answering("[]", "STOP");
        let model = model_over(Arc::clone(&provider));

        model.detect_ranges(&payload()).await.unwrap();
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].0[0].content, DETECT_RANGES_PROMPT);
    }

    #[tokio::test]
    async fn provider_error_becomes_api_error() {
        let model = model_over(StubProvider::new(|| {
            Err(LlmError::RateLimited("quota exceeded".into()))
        }));

        let err = model.extract_tables(&payload()).await.unwrap_err();
        match &err {
            PdfTablesError::Api { stage, kind, message } => {
                assert_eq!(*stage, Stage::ExtractTables);
                assert_eq!(*kind, ApiErrorKind::RateLimited);
                assert!(message.contains("quota exceeded"), "got: {message}");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn auth_and_token_limit_errors_are_not_retried() {
        let model = model_over(StubProvider::new(|| {
            Err(LlmError::AuthError("invalid key".into()))
        }));
        let err = model.detect_ranges(&payload()).await.unwrap_err();
        assert!(matches!(err, PdfTablesError::Api { kind: ApiErrorKind::Auth, .. }));
        assert!(!err.is_transient());
        assert!(err.hint().unwrap().contains("API key"));

        let model = model_over(StubProvider::new(|| {
            Err(LlmError::TokenLimitExceeded { max: 8192, got: 9500 })
        }));
        let err = model.extract_tables(&payload()).await.unwrap_err();
        assert!(matches!(err, PdfTablesError::Api { kind: ApiErrorKind::TokenLimit, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn blocked_finish_reason_is_content_policy() {
        for reason in ["SAFETY", "RECITATION", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"] {
            let model = model_over(StubProvider::answering("", reason));
            let err = model.extract_tables(&payload()).await.unwrap_err();
            match &err {
                PdfTablesError::Api { kind, message, .. } => {
                    assert_eq!(*kind, ApiErrorKind::ContentPolicy, "reason {reason}");
                    assert!(message.contains(reason), "got: {message}");
                }
                other => panic!("expected Api error for {reason}, got {other:?}"),
            }
            assert!(!err.is_transient());
            assert!(err.hint().unwrap().contains("copyrighted"));
        }
    }

    #[tokio::test]
    async fn truncated_reply_is_token_limit() {
        for reason in ["MAX_TOKENS", "length"] {
            let model = model_over(StubProvider::answering(r#"[{"page":1,"table":[{"a""#, reason));
            let err = model.extract_tables(&payload()).await.unwrap_err();
            match &err {
                PdfTablesError::Api { kind, message, .. } => {
                    assert_eq!(*kind, ApiErrorKind::TokenLimit, "reason {reason}");
                    assert!(message.contains("truncated"), "got: {message}");
                }
                other => panic!("expected Api error for {reason}, got {other:?}"),
            }
            assert!(!err.is_transient());
            assert!(err.hint().unwrap().contains("--max-tokens"));
        }
    }

    #[tokio::test]
    async fn missing_finish_reason_passes() {
        let model = model_over(StubProvider::new(|| Ok(LLMResponse::new("[]", "stub-model"))));
        let reply = model.detect_ranges(&payload()).await.unwrap();
        assert_eq!(reply.text, "[]");
    }
}
