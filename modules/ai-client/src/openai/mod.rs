mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use crate::error::AiError;
use crate::tool::ToolDefinition;

use client::{OpenAiClient, OPENAI_API_URL};
use tracing::debug;

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    temperature: Option<f32>,
    base_url: Option<String>,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build an HTTP client for this agent. Cheap to keep around and clone.
    pub fn client(&self) -> Result<OpenAiHandle, AiError> {
        let client = OpenAiClient::new(&self.api_key)?
            .with_base_url(self.base_url.as_deref().unwrap_or(OPENAI_API_URL));
        Ok(OpenAiHandle {
            agent: self.clone(),
            client,
        })
    }
}

/// An [`OpenAi`] agent bound to a live HTTP connection pool.
#[derive(Clone)]
pub struct OpenAiHandle {
    agent: OpenAi,
    client: OpenAiClient,
}

impl OpenAiHandle {
    pub fn model(&self) -> &str {
        &self.agent.model
    }

    /// Forced function calling: the model must answer by invoking `tool`.
    ///
    /// Returns the raw JSON `arguments` string of the call. A reply without the
    /// call (plain text, empty choices) is [`AiError::MissingToolCall`].
    pub async fn call_function(
        &self,
        system: &str,
        user: &str,
        tool: &ToolDefinition,
    ) -> Result<String, AiError> {
        let mut request = types::ChatRequest::new(&self.agent.model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user))
            .tool(types::ToolDefinitionWire::function(
                &tool.name,
                &tool.description,
                tool.parameters.clone(),
            ))
            .force_function(&tool.name);

        if let Some(temperature) = self.agent.temperature {
            request = request.temperature(temperature);
        }

        let response = self.client.chat(&request).await?;

        debug!(tool = %tool.name, "Forced function call completed");

        response
            .function_arguments(&tool.name)
            .map(str::to_string)
            .ok_or_else(|| AiError::MissingToolCall(tool.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-5-nano");
        assert_eq!(ai.model, "gpt-5-nano");
        assert_eq!(ai.api_key, "sk-test");
        assert_eq!(ai.temperature, None);
    }

    #[test]
    fn test_openai_with_base_url() {
        let ai =
            OpenAi::new("sk-test", "gpt-5-nano").with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }

    #[test]
    fn test_openai_with_temperature() {
        let ai = OpenAi::new("sk-test", "gpt-5-nano").with_temperature(1.0);
        assert_eq!(ai.temperature, Some(1.0));
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        // Nothing listens on port 1.
        let handle = OpenAi::new("sk-test", "gpt-5-nano")
            .with_base_url("http://127.0.0.1:1")
            .client()
            .unwrap();

        let tool = ToolDefinition {
            name: "set_labels".into(),
            description: "test".into(),
            parameters: serde_json::json!({"type": "object"}),
        };

        let err = handle
            .call_function("sys", "user", &tool)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Connection(_)), "got {err:?}");
        assert!(err.is_transient());
    }
}
