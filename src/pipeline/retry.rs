//! Timeout and retry policy for model calls.
//!
//! ## Retry Strategy
//!
//! Timeouts, HTTP 429 and 5xx responses are transient, so they are retried
//! up to `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^(attempt - 1)`): with the defaults the wait sequence is
//! 500 ms → 1 s, three attempts in total. Content-policy rejections,
//! authentication failures and unknown models are returned immediately;
//! sending the same request again cannot change their outcome.

use crate::config::ExtractionConfig;
use crate::error::{ApiErrorKind, PdfTablesError, Stage};
use crate::model::ModelReply;
use futures::future::BoxFuture;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Run `call` under the configured timeout, retrying transient failures.
pub async fn call_with_retry<'a, F>(
    stage: Stage,
    label: &str,
    config: &ExtractionConfig,
    mut call: F,
) -> Result<ModelReply, PdfTablesError>
where
    F: FnMut() -> BoxFuture<'a, Result<ModelReply, PdfTablesError>>,
{
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: {} retry {}/{} after {}ms",
                label, stage, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let start = Instant::now();
        let outcome = match timeout(limit, call()).await {
            Ok(result) => result,
            Err(_) => Err(PdfTablesError::Api {
                stage,
                kind: ApiErrorKind::Timeout,
                message: format!("no reply within {}s", config.api_timeout_secs),
            }),
        };

        match outcome {
            Ok(reply) => {
                debug!(
                    "{}: {} took {:?} ({} input / {} output tokens)",
                    label,
                    stage,
                    start.elapsed(),
                    reply.input_tokens,
                    reply.output_tokens
                );
                return Ok(reply);
            }
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                warn!("{}: {} attempt {} failed — {}", label, stage, attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}
