//! Candidate oracle - the code-generation capability
//!
//! The orchestrator only sees `generate(prompt) -> text`. [`LlmOracle`] is the
//! production implementation on top of an [`LlmClient`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, StopReason};

/// Failure of a single oracle call
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Prompt text in, raw text out
#[async_trait]
pub trait CandidateOracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Oracle backed by a stateless chat-completion client
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl LlmOracle {
    pub fn new(client: Arc<dyn LlmClient>, system_prompt: impl Into<String>, max_tokens: u32) -> Self {
        debug!(max_tokens, "LlmOracle::new: called");
        Self {
            client,
            system_prompt: system_prompt.into(),
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl CandidateOracle for LlmOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        debug!(prompt_len = prompt.len(), "LlmOracle::generate: called");
        let request = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) if e.is_rate_limit() => {
                // Not retried here: the call is spent and the attempt fails
                warn!(retry_after = ?e.retry_after(), "LlmOracle::generate: rate limited");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        if response.stop_reason == StopReason::MaxTokens {
            warn!("LlmOracle::generate: response truncated at max tokens");
        }
        debug!(
            tokens = response.usage.total(),
            has_content = response.content.is_some(),
            "LlmOracle::generate: complete"
        );

        // A reply with no text is still a reply; the extractor reports it as empty.
        Ok(response.content.unwrap_or_default())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, TokenUsage};

    fn response(content: Option<&str>) -> CompletionResponse {
        CompletionResponse {
            content: content.map(String::from),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    #[tokio::test]
    async fn test_generate_sends_system_and_user_prompt() {
        let client = Arc::new(MockLlmClient::new(vec![response(Some("def p(g):return g"))]));
        let oracle = LlmOracle::new(client.clone(), "golf expert", 8000).with_temperature(0.2);

        let text = oracle.generate("solve task 1").await.unwrap();
        assert_eq!(text, "def p(g):return g");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt, "golf expert");
        assert_eq!(requests[0].messages[0].content, "solve task 1");
        assert_eq!(requests[0].max_tokens, 8000);
        assert_eq!(requests[0].temperature, Some(0.2));
    }

    #[tokio::test]
    async fn test_generate_empty_content_is_empty_string() {
        let client = Arc::new(MockLlmClient::new(vec![response(None)]));
        let oracle = LlmOracle::new(client, "sys", 100);
        assert_eq!(oracle.generate("x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_generate_propagates_client_error() {
        let client = Arc::new(MockLlmClient::new(vec![]));
        let oracle = LlmOracle::new(client, "sys", 100);
        let err = oracle.generate("x").await.unwrap_err();
        assert!(matches!(err, OracleError::Llm(_)));
    }

    #[tokio::test]
    async fn test_scripted_oracle_replays_in_order() {
        let oracle = mock::ScriptedOracle::new(vec![Ok("a".to_string()), Err("down".to_string())]);
        assert_eq!(oracle.generate("one").await.unwrap(), "a");
        assert!(oracle.generate("two").await.is_err());
        assert!(oracle.generate("three").await.is_err());
        assert_eq!(oracle.prompts(), vec!["one", "two", "three"]);
        assert_eq!(oracle.call_count(), 3);
    }
}
