use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;

const FALLBACK_MESSAGE: &str = "Unable to generate explanation at this time.";
const UNCONFIGURED_MESSAGE: &str = "AI explanation service is currently unavailable.";

/// Client for the external text-completion worker that backs the "explain
/// this student" endpoints. The worker is an interchangeable collaborator:
/// it takes a messages array and returns prose in a provider-dependent shape.
pub struct InsightsClient {
    http: Client,
    worker_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct WorkerRequest<'a> {
    messages: Vec<WorkerMessage<'a>>,
}

#[derive(Serialize)]
struct WorkerMessage<'a> {
    role: &'a str,
    content: String,
}

impl InsightsClient {
    pub fn new(worker_url: Option<String>, api_key: Option<String>) -> Self {
        Self { http: Client::new(), worker_url, api_key }
    }

    /// Send a prompt to the worker and normalize whatever comes back. An
    /// unconfigured or failing worker yields a fixed message, never an error:
    /// explanations are decoration, not data.
    pub async fn complete(&self, system_prompt: &str, user_content: &str) -> String {
        let (Some(url), Some(key)) = (self.worker_url.as_deref(), self.api_key.as_deref()) else {
            return UNCONFIGURED_MESSAGE.to_string();
        };

        let body = WorkerRequest {
            messages: vec![WorkerMessage {
                role: "user",
                content: format!("{system_prompt}\n\n{user_content}"),
            }],
        };

        match self.post_worker(url, key, &body).await {
            Ok(value) => extract_text(&value)
                .map(|text| strip_markdown(&text))
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            Err(e) => {
                warn!("insights worker call failed: {}", e);
                FALLBACK_MESSAGE.to_string()
            }
        }
    }

    async fn post_worker(
        &self,
        url: &str,
        key: &str,
        body: &WorkerRequest<'_>,
    ) -> Result<Value, AppError> {
        let response = self
            .http
            .post(url)
            .header("x-api-key", key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "insights worker returned {}",
                response.status()
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}

// The response shape is provider-dependent, so extraction is an ordered list
// of strategies rather than a typed contract. First one that yields text
// wins.
fn extract_text(value: &Value) -> Option<String> {
    const TOP_LEVEL_KEYS: [&str; 5] = ["response", "answer", "insights", "output", "content"];

    for key in TOP_LEVEL_KEYS {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    if let Some(text) = value.pointer("/message/content").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    if let Some(text) = value.pointer("/choices/0/message/content").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    None
}

fn strip_markdown(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '#' | '*' | '`' | '_' | '~'))
        .collect::<String>()
        .trim()
        .to_string()
}
