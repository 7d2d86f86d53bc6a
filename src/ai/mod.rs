//! Client for the generative-AI provider.
//!
//! All inference happens upstream; this module shapes prompts, ships them
//! over HTTP, and parses the completions. Providers occasionally wrap JSON
//! answers in prose or code fences, so structured output is extracted from
//! the first balanced object in the completion.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use crate::config::AiConfig;

/// Free-text bounds for structuring and reframing input.
pub const MIN_INPUT_CHARS: usize = 50;
pub const MAX_INPUT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationType {
    Structure,
    PromotionPackage,
    QuickReframe,
    WeeklyUpdate,
}

impl GenerationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationType::Structure => "structure",
            GenerationType::PromotionPackage => "promotion_package",
            GenerationType::QuickReframe => "quick_reframe",
            GenerationType::WeeklyUpdate => "weekly_update",
        }
    }
}

/// Decision fields produced by the structuring prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct StructuredDecision {
    pub title: String,
    pub decision_made: String,
    pub context: String,
    pub trade_offs: String,
    pub biggest_risk: String,
    #[serde(default)]
    pub stakeholders: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider is not configured")]
    NotConfigured,
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI provider returned status {0}")]
    UpstreamStatus(u16),
    #[error("AI response was malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

const STRUCTURE_PROMPT: &str = "You turn a professional's raw notes about a decision into a \
structured record. Respond with a single JSON object with the keys: title (short, under 200 \
characters), decision_made, context, trade_offs, biggest_risk, stakeholders (string or null), \
confidence_level (integer 1-10 or null), tags (up to 5 short strings). Each of decision_made, \
context, trade_offs and biggest_risk must be a self-contained paragraph. Do not invent facts \
that are not in the notes.";

const REFRAME_PROMPT: &str = "Reframe the following professional setback or worry into a \
constructive, factual summary a person could share with their manager. Keep it under 120 words \
and do not add facts.";

const WEEKLY_UPDATE_PROMPT: &str = "Write a concise weekly update from the following decision \
log entries. Group related items, lead with outcomes, and keep it under 200 words.";

const PROMOTION_PACKAGE_PROMPT: &str = "Write a promotion packet draft from the following \
decision log entries: an impact summary, the strongest three decisions with their rationale and \
risk handling, and a closing growth narrative. Address the reader as the author's manager.";

#[derive(Clone)]
pub struct AiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn structure_decision(&self, raw_input: &str) -> Result<StructuredDecision, AiError> {
        let content = self.complete(STRUCTURE_PROMPT, raw_input).await?;
        parse_structured_decision(&content)
    }

    pub async fn quick_reframe(&self, text: &str) -> Result<String, AiError> {
        self.complete(REFRAME_PROMPT, text).await
    }

    pub async fn weekly_update(&self, entries: &[String]) -> Result<String, AiError> {
        self.complete(WEEKLY_UPDATE_PROMPT, &entries.join("\n\n")).await
    }

    pub async fn promotion_package(
        &self,
        current_role: Option<&str>,
        entries: &[String],
    ) -> Result<String, AiError> {
        let input = match current_role {
            Some(role) => format!("Current role: {}\n\n{}", role, entries.join("\n\n")),
            None => entries.join("\n\n"),
        };
        self.complete(PROMOTION_PACKAGE_PROMPT, &input).await
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_ref().ok_or(AiError::NotConfigured)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::UpstreamStatus(status.as_u16()));
        }

        let completion: ChatResponse = response.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AiError::Malformed("completion carried no choices".to_string()))?;

        debug!(model = %self.model, chars = content.len(), "AI completion received");
        Ok(content)
    }
}

/// Parses the structuring completion, tolerating prose or code fences
/// around the JSON object.
pub fn parse_structured_decision(content: &str) -> Result<StructuredDecision, AiError> {
    let json = extract_json_object(content)
        .ok_or_else(|| AiError::Malformed("no JSON object in completion".to_string()))?;

    serde_json::from_str(json).map_err(|e| AiError::Malformed(e.to_string()))
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETION: &str = r#"{
        "title": "Chose Postgres over DynamoDB",
        "decision_made": "We will run on managed Postgres.",
        "context": "The team knows SQL and the access patterns are relational.",
        "trade_offs": "We give up single-digit-ms key lookups at scale.",
        "biggest_risk": "Connection exhaustion under burst traffic.",
        "stakeholders": "Platform team",
        "confidence_level": 8,
        "tags": ["architecture", "storage"]
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let decision = parse_structured_decision(COMPLETION).unwrap();
        assert_eq!(decision.title, "Chose Postgres over DynamoDB");
        assert_eq!(decision.confidence_level, Some(8));
        assert_eq!(decision.tags, vec!["architecture", "storage"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("Here is the structured record:\n```json\n{}\n```", COMPLETION);
        let decision = parse_structured_decision(&fenced).unwrap();
        assert_eq!(decision.stakeholders.as_deref(), Some("Platform team"));
    }

    #[test]
    fn test_parse_defaults_optional_fields() {
        let minimal = r#"{
            "title": "t",
            "decision_made": "d",
            "context": "c",
            "trade_offs": "o",
            "biggest_risk": "r"
        }"#;
        let decision = parse_structured_decision(minimal).unwrap();
        assert!(decision.stakeholders.is_none());
        assert!(decision.confidence_level.is_none());
        assert!(decision.tags.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose_without_json() {
        assert!(parse_structured_decision("I could not structure that.").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_required_fields() {
        assert!(parse_structured_decision(r#"{"title": "only a title"}"#).is_err());
    }

    #[test]
    fn test_generation_type_labels() {
        assert_eq!(GenerationType::Structure.as_str(), "structure");
        assert_eq!(GenerationType::PromotionPackage.as_str(), "promotion_package");
        assert_eq!(GenerationType::QuickReframe.as_str(), "quick_reframe");
        assert_eq!(GenerationType::WeeklyUpdate.as_str(), "weekly_update");
    }

    #[test]
    fn test_unconfigured_client() {
        let config = crate::config::Config::default_for_testing().ai;
        let client = AiClient::new(&config);
        assert!(!client.is_configured());
    }
}
