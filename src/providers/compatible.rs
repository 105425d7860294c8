//! Generic OpenAI-compatible provider.
//! Ollama, OpenAI and most hosted LLM APIs accept the same
//! `/chat/completions` request, so one implementation covers all of them.

use crate::providers::traits::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Stop sequence that keeps the model from inventing its own observations.
pub const REACT_STOP: &str = "\nObservation:";

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    pub(crate) temperature: f64,
    /// Refuse to send requests without an API key
    requires_key: bool,
    stop: Vec<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        temperature: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            model: model.to_string(),
            temperature,
            requires_key: false,
            stop: vec![REACT_STOP.to_string()],
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Require an API key before any request is sent (hosted providers).
    pub fn requiring_key(mut self) -> Self {
        self.requires_key = true;
        self
    }

    /// Build the full URL for chat completions, detecting if base_url already includes the path.
    fn chat_completions_url(&self) -> String {
        let has_full_endpoint = reqwest::Url::parse(&self.base_url)
            .map(|url| {
                url.path()
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            })
            .unwrap_or_else(|_| {
                self.base_url
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            });

        if has_full_endpoint {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            stop: self.stop.clone(),
            stream: Some(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        if self.requires_key && self.api_key.is_none() {
            anyhow::bail!(
                "{} API key not set. Set api_key in config.toml or HELIOS_API_KEY.",
                self.name
            );
        }

        let request = self.build_request(prompt);
        let url = self.chat_completions_url();

        let mut req = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            return Err(super::api_error(&self.name, response).await);
        }

        let chat_response: ApiChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| anyhow::anyhow!("No response from {}", self.name))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider(name: &str, url: &str, key: Option<&str>) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(name, url, key, "llama3", 0.7)
    }

    #[test]
    fn creates_with_key() {
        let p = make_provider("openai", "https://api.openai.com/v1", Some("oa-key"));
        assert_eq!(p.name, "openai");
        assert_eq!(p.base_url, "https://api.openai.com/v1");
        assert_eq!(p.api_key.as_deref(), Some("oa-key"));
    }

    #[test]
    fn strips_trailing_slash() {
        let p = make_provider("ollama", "http://localhost:11434/v1/", None);
        assert_eq!(p.base_url, "http://localhost:11434/v1");
    }

    #[tokio::test]
    async fn keyed_provider_fails_without_key() {
        let p = make_provider("OpenAI", "https://api.openai.com/v1", None).requiring_key();
        let result = p.complete("hello").await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("OpenAI API key not set"));
    }

    #[test]
    fn request_carries_prompt_model_and_stop() {
        let p = make_provider("ollama", "http://localhost:11434/v1", None);
        let json = serde_json::to_string(&p.build_request("Question: hi")).unwrap();
        assert!(json.contains("llama3"));
        assert!(json.contains("Question: hi"));
        assert!(json.contains("\\nObservation:"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn response_deserializes() {
        let json = r#"{"choices":[{"message":{"content":"Final Answer: 3 customers"}}]}"#;
        let resp: ApiChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.choices[0].message.content.as_deref(),
            Some("Final Answer: 3 customers")
        );
    }

    #[test]
    fn response_empty_choices() {
        let json = r#"{"choices":[]}"#;
        let resp: ApiChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices.is_empty());
    }

    #[test]
    fn chat_completions_url_standard() {
        let p = make_provider("openai", "https://api.openai.com/v1", None);
        assert_eq!(
            p.chat_completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn chat_completions_url_custom_full_endpoint() {
        let p = make_provider(
            "custom",
            "https://llm.internal.example/api/chat/completions",
            None,
        );
        assert_eq!(
            p.chat_completions_url(),
            "https://llm.internal.example/api/chat/completions"
        );
    }
}
