use super::{LlmError, LlmOracle};
use crate::http::build_client;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub options: GenerationOptions,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".into()),
            model: std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3".into()),
            options: GenerationOptions::default(),
        }
    }
}

/// Sampling settings sent with every request. Kept low-temperature so that
/// repeated runs over the same file classify consistently.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub stop: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            num_ctx: 4096,
            top_k: 10,
            top_p: 0.1,
            repeat_penalty: 1.2,
            stop: vec!["\n\n".into(), "```".into()],
        }
    }
}

pub struct OllamaClient {
    http: Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::MissingBaseUrl);
        }
        Ok(Self {
            http: build_client().map_err(|err| LlmError::Http(err.to_string()))?,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim().trim_end_matches('/'))
    }
}

impl LlmOracle for OllamaClient {
    fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: &self.config.options,
        };

        let response = self
            .http
            .post(self.endpoint("api/generate"))
            .json(&body)
            .send()
            .map_err(|err| LlmError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!("HTTP {}", response.status())));
        }

        let payload: GenerateResponse = response
            .json()
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;

        debug!(
            target = "catalog.llm",
            model = %self.config.model,
            eval_count = payload.eval_count.unwrap_or_default(),
            "generate_completed"
        );
        Ok(payload.response)
    }

    fn probe(&self) -> Result<(), LlmError> {
        let response = self
            .http
            .get(self.endpoint("api/tags"))
            .send()
            .map_err(|err| LlmError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(LlmError::Http(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_base_url() {
        let config = LlmConfig {
            base_url: "   ".into(),
            model: "llama3".into(),
            options: GenerationOptions::default(),
        };
        assert!(matches!(
            OllamaClient::new(config),
            Err(LlmError::MissingBaseUrl)
        ));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = OllamaClient::new(LlmConfig {
            base_url: "http://localhost:11434/".into(),
            model: "llama3".into(),
            options: GenerationOptions::default(),
        })
        .expect("client");
        assert_eq!(
            client.endpoint("api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn request_body_carries_options() {
        let options = GenerationOptions::default();
        let body = GenerateRequest {
            model: "llama3",
            prompt: "hola",
            stream: false,
            options: &options,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["stream"], serde_json::json!(false));
        assert_eq!(value["options"]["num_ctx"], serde_json::json!(4096));
        assert_eq!(value["options"]["stop"][1], serde_json::json!("```"));
    }
}
