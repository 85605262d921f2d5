use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, warn};

use ai_client::{AiError, OpenAi, OpenAiHandle, ToolDefinition};
use citywatch_common::{Config, Entry, LabelSet, TaskOutcome, TaskResult};

use crate::limiter::Limiter;
use crate::prompt::{build_user_prompt, label_tool, LabelArgs, SYSTEM_PROMPT};
use crate::retry::RetryPolicy;
use crate::validate::post_validate;

/// Sampling temperature for every labeling call.
pub const LABEL_TEMPERATURE: f32 = 1.0;

// --- LabelExtractor trait ---

/// One forced-function call to the model.
///
/// Returns the raw JSON arguments the model passed to `tool`.
#[async_trait]
pub trait LabelExtractor: Send + Sync {
    async fn extract(
        &self,
        entry: &Entry,
        system: &str,
        user: &str,
        tool: &ToolDefinition,
    ) -> Result<String, AiError>;
}

// --- OpenAI extractor ---

pub struct OpenAiExtractor {
    handle: OpenAiHandle,
}

impl OpenAiExtractor {
    pub fn new(config: &Config) -> Result<Self, AiError> {
        let mut ai = OpenAi::new(&config.openai_api_key, &config.model)
            .with_temperature(LABEL_TEMPERATURE);
        if let Some(ref url) = config.openai_base_url {
            ai = ai.with_base_url(url);
        }
        Ok(Self {
            handle: ai.client()?,
        })
    }

    pub fn model(&self) -> &str {
        self.handle.model()
    }
}

#[async_trait]
impl LabelExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        _entry: &Entry,
        system: &str,
        user: &str,
        tool: &ToolDefinition,
    ) -> Result<String, AiError> {
        self.handle.call_function(system, user, tool).await
    }
}

// --- Errors ---

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Malformed function arguments: {0}")]
    MalformedArguments(#[from] serde_json::Error),

    #[error("Concurrency limiter closed")]
    LimiterClosed,
}

impl LabelError {
    /// Transient failures back off exponentially, the rest wait a flat delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, LabelError::Ai(e) if e.is_transient())
    }
}

// --- Labeler ---

/// Resolves entries into `TaskResult`s: one external call per attempt,
/// gated by the shared limiter, retried per `RetryPolicy`.
pub struct Labeler {
    extractor: Arc<dyn LabelExtractor>,
    limiter: Arc<Limiter>,
    policy: RetryPolicy,
    tool: ToolDefinition,
}

impl Labeler {
    pub fn new(
        extractor: Arc<dyn LabelExtractor>,
        limiter: Arc<Limiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            extractor,
            limiter,
            policy,
            tool: label_tool(),
        }
    }

    /// Label one entry. Never fails: exhaustion becomes a failed `TaskResult`.
    pub async fn label(&self, entry: Entry) -> TaskResult {
        let user_prompt = build_user_prompt(&entry);
        let max_attempts = self.policy.max_attempts;
        let mut backoff = self.policy.backoff();
        let mut slept = Duration::ZERO;
        let mut last_error: Option<LabelError> = None;

        for attempt in 1..=max_attempts {
            match self.attempt(&entry, &user_prompt).await {
                Ok(labels) => {
                    if labels.has_warnings() {
                        debug!(
                            url = entry.url.as_str(),
                            warnings = ?labels.warnings(),
                            "Labels accepted with warnings"
                        );
                    }
                    return TaskResult {
                        entry,
                        outcome: TaskOutcome::Labeled(labels),
                        attempts: attempt,
                        backoff: slept,
                    };
                }
                Err(e) => {
                    let transient = e.is_transient();
                    let wait = if transient {
                        backoff.after_transient()
                    } else {
                        backoff.after_structural()
                    };
                    warn!(
                        url = entry.url.as_str(),
                        attempt,
                        max_attempts,
                        transient,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Labeling attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    slept += wait;
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        error!(
            url = entry.url.as_str(),
            attempts = max_attempts,
            error = error.as_str(),
            "Labeling failed, giving up on entry"
        );

        TaskResult {
            entry,
            outcome: TaskOutcome::Failed(error),
            attempts: max_attempts,
            backoff: slept,
        }
    }

    async fn attempt(&self, entry: &Entry, user_prompt: &str) -> Result<LabelSet, LabelError> {
        // Permit covers the call only; backoff sleeps happen without it.
        let arguments = {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|_| LabelError::LimiterClosed)?;
            self.extractor
                .extract(entry, SYSTEM_PROMPT, user_prompt, &self.tool)
                .await?
        };

        let args: LabelArgs = serde_json::from_str(&arguments)?;
        Ok(post_validate(entry, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_follows_ai_error() {
        let rate_limited = LabelError::Ai(AiError::RateLimited {
            status: 429,
            message: "slow down".into(),
        });
        assert!(rate_limited.is_transient());
        assert!(LabelError::Ai(AiError::Connection("reset".into())).is_transient());
        assert!(LabelError::Ai(AiError::Timeout("late".into())).is_transient());

        assert!(!LabelError::Ai(AiError::MissingToolCall("set_labels".into())).is_transient());
        let malformed = serde_json::from_str::<LabelArgs>("{not json").unwrap_err();
        assert!(!LabelError::MalformedArguments(malformed).is_transient());
        assert!(!LabelError::LimiterClosed.is_transient());
    }

    #[test]
    fn ai_errors_display_transparently() {
        let err = LabelError::from(AiError::Connection("connection refused".into()));
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn openai_extractor_uses_configured_model() {
        let config = Config {
            openai_api_key: "sk-test".into(),
            openai_base_url: Some("http://127.0.0.1:1/v1".into()),
            model: "gpt-5-nano".into(),
            max_concurrency: 2,
            max_retries: 1,
            input_path: "in.json".into(),
            output_path: "out.json".into(),
        };
        let extractor = OpenAiExtractor::new(&config).unwrap();
        assert_eq!(extractor.model(), "gpt-5-nano");
    }
}
