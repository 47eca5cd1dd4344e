//! OpenRouter chat-completion client (OpenAI-compatible wire format).

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Structured-output request (`{"type": "json_object"}`) so the model returns
/// a single JSON object instead of prose.
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Per-process upstream settings taken from [`helios_core::GatewayConfig`].
/// The API key is resolved per request by the adapter, not held here.
pub(crate) struct UpstreamClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl UpstreamClient {
    pub(crate) fn new(api_url: String, model: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            model,
            max_tokens,
            temperature,
        }
    }

    /// Request one completion for a system/user message pair. Returns the raw
    /// assistant text; non-success statuses and empty choice lists are errors.
    pub(crate) async fn complete(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat {
                format: "json_object".to_string(),
            }),
        };

        let res = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("HTTP-Referer", "https://helios-insight.local")
            .header("X-Title", "Helios-Insight-Gateway")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("OpenRouter request failed: {}", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("OpenRouter API error {}: {}", status, body).into());
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| format!("OpenRouter response parse failed: {}", e))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or("OpenRouter response contained no choices")?;

        Ok(text)
    }
}
