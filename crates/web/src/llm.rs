//! LLM-backed narrative generator
//!
//! Posts the rendered comparison context to an OpenAI-style
//! chat-completions endpoint and parses the reply into a
//! `NarrativeBundle`. One attempt, hard timeout, no retries; every
//! failure path degrades to the deterministic fallback narrator so the
//! service keeps working with no network dependency at all. The model's
//! output is untrusted free text and is sanitized before it reaches a
//! report.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use testscope_common::error::{Error, Result};
use testscope_common::narrative::{
    FallbackNarrator, NarrativeBundle, NarrativeContext, Narrator,
};

/// LLM narrator configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Narrator backed by a chat-completions API, with local fallback.
pub struct LlmNarrator {
    client: reqwest::Client,
    config: LlmConfig,
    fallback: FallbackNarrator,
}

impl LlmNarrator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            fallback: FallbackNarrator::new(),
        }
    }

    async fn request_narrative(&self, context: &NarrativeContext) -> Result<NarrativeBundle> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are an expert in visual regression testing. \
                                Reply with a JSON object with the fields: description (string), \
                                severity (one of none/low/medium/high/critical), impact (string), \
                                recommendations (array of strings), confidence (number in [0,1])."
                },
                { "role": "user", "content": context.render_prompt() }
            ],
            "temperature": 0.7,
            "max_tokens": 500,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::NarrativeUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::NarrativeUnavailable(format!(
                "narrative endpoint returned {}",
                response.status()
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| Error::NarrativeUnavailable(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::NarrativeUnavailable("empty completion".to_string()))?;

        let raw: RawBundle = serde_json::from_str(&content)
            .map_err(|e| Error::NarrativeUnavailable(format!("unparseable bundle: {}", e)))?;

        Ok(NarrativeBundle {
            description: raw.description,
            severity: raw.severity,
            impact: raw.impact,
            recommendations: raw.recommendations,
            confidence: raw.confidence,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, context: &NarrativeContext) -> Result<NarrativeBundle> {
        match self.request_narrative(context).await {
            Ok(bundle) => {
                debug!("narrative generated by {}", self.config.model);
                Ok(bundle.sanitize())
            }
            Err(e) => {
                warn!("LLM narrator unavailable, using deterministic fallback: {}", e);
                Ok(self.fallback.generate(context))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawBundle {
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(similarity: f64) -> NarrativeContext {
        NarrativeContext {
            before_format: "PNG".to_string(),
            before_size_bytes: 100,
            after_format: "PNG".to_string(),
            after_size_bytes: 100,
            similarity,
            change_descriptions: vec![],
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let narrator = LlmNarrator::new(LlmConfig {
            endpoint: "http://127.0.0.1:1/never".to_string(),
            api_key: "test".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_millis(200),
        });

        // The trait contract: narration always produces a bundle.
        let bundle = narrator.narrate(&context(0.99)).await.unwrap();
        assert!(!bundle.description.is_empty());
        assert!(["low", "none"].contains(&bundle.severity.as_str()));
    }

    #[test]
    fn test_raw_bundle_parses_partial_json() {
        let raw: RawBundle =
            serde_json::from_str(r#"{"description": "d", "confidence": 0.5}"#).unwrap();
        assert_eq!(raw.description, "d");
        assert_eq!(raw.confidence, 0.5);
        assert!(raw.recommendations.is_empty());
    }
}
