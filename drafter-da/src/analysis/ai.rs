//! AI insight client
//!
//! **[DA-INT-020]** Boundary to the external AI completion service:
//! a structured prompt built from the normalized drawing (plus an optional
//! image attachment) is sent to an OpenAI-compatible chat completions
//! endpoint, and the reply is parsed as a structured JSON insight block.
//! This stage is optional end to end; the pipeline converts any error here
//! into an empty insight block.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::AiInsights;
use crate::parsers::NormalizedDrawing;
use drafter_common::config::AiConfig;

const AI_TIMEOUT: Duration = Duration::from_secs(45);

/// AI client errors
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("AI service returned status {0}: {1}")]
    Api(u16, String),

    #[error("AI reply was not valid JSON: {0}")]
    Parse(String),

    #[error("AI call cancelled")]
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

/// The JSON shape the model is instructed to return
#[derive(Debug, Deserialize)]
struct InsightPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    observations: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

/// Client for the AI completion collaborator
pub struct AiClient {
    endpoint: String,
    api_key: String,
    model: String,
    http_client: reqwest::Client,
}

impl AiClient {
    /// Build from configuration; `None` when endpoint or key is missing
    pub fn from_config(config: &AiConfig) -> Option<Self> {
        let endpoint = config.endpoint.clone()?;
        let api_key = config.api_key.clone()?;
        let http_client = reqwest::Client::builder()
            .timeout(AI_TIMEOUT)
            .build()
            .ok()?;
        Some(Self {
            endpoint,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            http_client,
        })
    }

    /// Request an insight block for a parsed drawing
    pub async fn analyze(
        &self,
        drawing: &NormalizedDrawing,
        image_base64: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AiInsights, AiError> {
        let prompt = build_prompt(drawing);

        let mut user_content = vec![serde_json::json!({"type": "text", "text": prompt})];
        if let Some(image) = image_base64 {
            user_content.push(serde_json::json!({
                "type": "image_url",
                "image_url": {"url": format!("data:image/svg+xml;base64,{}", image)}
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {
                    "role": "system",
                    "content": "You are a CAD drawing reviewer. Reply with a JSON object \
                                holding: summary (string), observations (string array), \
                                suggestions (string array), confidence (0.0-1.0)."
                },
                {"role": "user", "content": user_content},
            ],
        });

        let call = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            response = call => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), text));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();
        parse_insights(content)
    }
}

/// Structured prompt from the normalized drawing
fn build_prompt(drawing: &NormalizedDrawing) -> String {
    format!(
        "Analyze this CAD drawing summary.\n\
         Entity counts: {} lines, {} circles, {} arcs, {} polylines, {} text, \
         {} dimensions, {} block references, {} faces, {} solids.\n\
         Layers: {}.\n\
         Bounding box: {:.1} x {:.1} x {:.1} {}.\n\
         Sample text content: {}",
        drawing.entities.lines,
        drawing.entities.circles,
        drawing.entities.arcs,
        drawing.entities.polylines,
        drawing.entities.text,
        drawing.entities.dimensions,
        drawing.entities.blocks,
        drawing.entities.faces,
        drawing.entities.solids,
        if drawing.layers.is_empty() {
            "none".to_string()
        } else {
            drawing.layers.join(", ")
        },
        drawing.dimensions.width,
        drawing.dimensions.height,
        drawing.dimensions.depth,
        drawing.dimensions.unit,
        drawing
            .text_fragments
            .iter()
            .take(10)
            .cloned()
            .collect::<Vec<_>>()
            .join(" | "),
    )
}

/// Parse the model's JSON reply, tolerating a fenced code block
fn parse_insights(content: &str) -> Result<AiInsights, AiError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let payload: InsightPayload =
        serde_json::from_str(trimmed).map_err(|e| AiError::Parse(e.to_string()))?;
    Ok(AiInsights {
        summary: payload.summary,
        observations: payload.observations,
        suggestions: payload.suggestions,
        confidence: payload.confidence.clamp(0.0, 1.0),
    })
}
