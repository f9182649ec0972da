use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::http::post_json;
use crate::prompt::Message;

/// Text-generation backend. Receives the fully rendered prompt as one user message.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Ollama `/api/chat` client, non-streaming.
#[derive(Clone, Debug)]
pub struct OllamaChat {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for OllamaChat {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!("{}/api/chat", self.base_url);
        let messages = [Message::user(prompt)];
        let req = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: false,
        };
        let res = post_json::<ChatResponse, _>(&self.client, &url, &req)
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;
        let content = res.message.and_then(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(RagError::Generation("model returned an empty message".to_string()));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat(server: &MockServer) -> OllamaChat {
        let client = crate::http::build_client(Duration::from_secs(5)).expect("client");
        OllamaChat::new(client, server.uri(), "llama3.1")
    }

    #[tokio::test]
    async fn sends_single_user_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.1",
                "stream": false,
                "messages": [{"role": "user", "content": "prompt text"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "Dividends are taxed at 15% for filers."},
                "done": true
            })))
            .mount(&server)
            .await;

        let answer = chat(&server).generate("prompt text").await.expect("answer");
        assert_eq!(answer, "Dividends are taxed at 15% for filers.");
    }

    #[tokio::test]
    async fn empty_or_failed_responses_are_generation_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;
        let err = chat(&server).generate("p").await.expect_err("empty");
        assert!(matches!(err, RagError::Generation(_)));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;
        let err = chat(&server).generate("p").await.expect_err("500");
        assert!(err.to_string().contains("model not loaded"));
    }
}
