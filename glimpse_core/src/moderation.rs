//! Content checks backed by an OpenAI-compatible chat completions endpoint.
//!
//! Every call degrades to an `Unavailable` outcome instead of failing: a
//! moderation outage must never block the request that triggered it.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{config::ModerationConfig, entity::prelude::SentimentLabel};

const MAX_TOKENS: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const CONTENT_SYSTEM_PROMPT: &str = "You are a content moderation assistant. \
Check the text for profanity, hate speech, racism, homophobia, sexual content or violence. \
Reply ONLY with a JSON object of the form {\"isFlagged\": true|false, \"category\": \"reason\"|null}. \
isFlagged is true when the text breaks any of these rules. \
category names the broken rule (for example \"Hate Speech\" or \"Violence\") and is null otherwise.";

const MESSAGE_SYSTEM_PROMPT: &str = "You are a content moderation assistant. \
Check the text for harassment, insults, hate speech or discriminatory language. \
Reply ONLY with {\"label\": \"safe\"} or {\"label\": \"unsafe\"} and nothing else. \
Use \"unsafe\" when the text is harassing, insulting or inappropriate and \"safe\" when it is respectful.";

const SENTIMENT_SYSTEM_PROMPT: &str = "You are a sentiment analysis assistant. \
Classify the text as exactly one of 'positive', 'neutral' or 'negative'. \
Reply ONLY with {\"label\": \"positive|neutral|negative\", \"confidence\": 0.0-1.0}.";

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new("<.*?>").ok());

/// Verdict on a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationOutcome {
    Clean,
    Flagged { category: String },
    Unavailable { reason: String },
}

/// Verdict on a group message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSafety {
    Safe,
    Unsafe,
    Unavailable,
}

impl MessageSafety {
    /// `None` when no verdict could be reached.
    pub fn as_flag(self) -> Option<bool> {
        match self {
            MessageSafety::Safe => Some(true),
            MessageSafety::Unsafe => Some(false),
            MessageSafety::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SentimentOutcome {
    Scored {
        label: SentimentLabel,
        confidence: f64,
    },
    Unavailable,
}

#[async_trait]
pub trait ContentModerator: Send + Sync {
    async fn check_content(&self, text: &str) -> ModerationOutcome;

    async fn classify_message(&self, text: &str) -> MessageSafety;

    async fn analyze_sentiment(&self, text: &str) -> SentimentOutcome;
}

pub type SharedModerator = Arc<dyn ContentModerator>;

/// Builds the moderator described by `config`. Without an API key every
/// check reports `Unavailable`.
pub fn from_config(config: &ModerationConfig) -> Result<SharedModerator, reqwest::Error> {
    match config.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            info!(base_url = %config.base_url, model = %config.model, "content moderation enabled");
            Ok(Arc::new(OpenAiModerator::new(config, key)?))
        }
        _ => {
            warn!("no moderation api key configured, content checks are disabled");
            Ok(Arc::new(DisabledModerator))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledModerator;

#[async_trait]
impl ContentModerator for DisabledModerator {
    async fn check_content(&self, _text: &str) -> ModerationOutcome {
        ModerationOutcome::Unavailable {
            reason: "moderation disabled".to_string(),
        }
    }

    async fn classify_message(&self, _text: &str) -> MessageSafety {
        MessageSafety::Unavailable
    }

    async fn analyze_sentiment(&self, _text: &str) -> SentimentOutcome {
        SentimentOutcome::Unavailable
    }
}

#[derive(Debug, Error)]
enum CompletionError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("api returned {0}")]
    Status(StatusCode),

    #[error("empty reply")]
    EmptyReply,

    #[error("unparseable reply: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentReply {
    #[serde(rename = "isFlagged")]
    is_flagged: bool,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelReply {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Clone)]
pub struct OpenAiModerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiModerator {
    pub fn new(config: &ModerationConfig, api_key: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        })
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: String,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": temperature,
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            warn!(%status, %details, "moderation api rejected request");
            return Err(CompletionError::Status(status));
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyReply)?;

        debug!(reply = %content, "moderation api replied");
        Ok(content)
    }
}

#[async_trait]
impl ContentModerator for OpenAiModerator {
    async fn check_content(&self, text: &str) -> ModerationOutcome {
        let prompt = format!("Analyze the content of this text: \"{text}\"");
        let result = match self.complete(CONTENT_SYSTEM_PROMPT, prompt, 0.1).await {
            Ok(reply) => parse_content_reply(&reply).map_err(CompletionError::from),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "content check unavailable");
            ModerationOutcome::Unavailable {
                reason: e.to_string(),
            }
        })
    }

    async fn classify_message(&self, text: &str) -> MessageSafety {
        let prompt = format!("Analyze this message: \"{}\"", strip_html(text));
        let result = match self.complete(MESSAGE_SYSTEM_PROMPT, prompt, 0.1).await {
            Ok(reply) => parse_safety_reply(&reply).map_err(CompletionError::from),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "message classification unavailable");
            MessageSafety::Unavailable
        })
    }

    async fn analyze_sentiment(&self, text: &str) -> SentimentOutcome {
        let result = match self
            .complete(SENTIMENT_SYSTEM_PROMPT, strip_html(text), 0.0)
            .await
        {
            Ok(reply) => parse_sentiment_reply(&reply).map_err(CompletionError::from),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "sentiment analysis unavailable");
            SentimentOutcome::Unavailable
        })
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Models like to wrap JSON in markdown fences.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

pub fn strip_html(input: &str) -> String {
    match HTML_TAG.as_ref() {
        Some(re) => re.replace_all(input, " ").trim().to_string(),
        None => input.trim().to_string(),
    }
}

fn parse_content_reply(reply: &str) -> Result<ModerationOutcome, serde_json::Error> {
    let parsed: ContentReply = serde_json::from_str(strip_fences(reply))?;
    if !parsed.is_flagged {
        return Ok(ModerationOutcome::Clean);
    }

    let category = parsed
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| "Inappropriate content".to_string());
    Ok(ModerationOutcome::Flagged { category })
}

// Anything other than an explicit "safe" counts as unsafe
fn parse_safety_reply(reply: &str) -> Result<MessageSafety, serde_json::Error> {
    let parsed: LabelReply = serde_json::from_str(strip_fences(reply))?;
    let safety = match parsed.label.as_deref().map(str::to_lowercase).as_deref() {
        Some("safe") => MessageSafety::Safe,
        _ => MessageSafety::Unsafe,
    };
    Ok(safety)
}

fn parse_sentiment_reply(reply: &str) -> Result<SentimentOutcome, serde_json::Error> {
    let parsed: LabelReply = serde_json::from_str(strip_fences(reply))?;
    let label = match parsed.label.as_deref().map(str::to_lowercase).as_deref() {
        Some("positive") => SentimentLabel::Positive,
        Some("negative") => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    };
    let confidence = parsed.confidence.unwrap_or(0.0).clamp(0.0, 1.0);
    Ok(SentimentOutcome::Scored { label, confidence })
}

/// Deterministic moderator for service tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Text containing this word is flagged, classified unsafe and scored negative.
    pub const BANNED_WORD: &str = "grumpkin";

    pub struct ScriptedModerator {
        pub online: bool,
    }

    impl ScriptedModerator {
        pub fn shared() -> SharedModerator {
            Arc::new(ScriptedModerator { online: true })
        }

        pub fn offline() -> SharedModerator {
            Arc::new(ScriptedModerator { online: false })
        }
    }

    #[async_trait]
    impl ContentModerator for ScriptedModerator {
        async fn check_content(&self, text: &str) -> ModerationOutcome {
            if !self.online {
                return ModerationOutcome::Unavailable {
                    reason: "offline".to_string(),
                };
            }
            if text.contains(BANNED_WORD) {
                ModerationOutcome::Flagged {
                    category: "Hate Speech".to_string(),
                }
            } else {
                ModerationOutcome::Clean
            }
        }

        async fn classify_message(&self, text: &str) -> MessageSafety {
            match (self.online, text.contains(BANNED_WORD)) {
                (false, _) => MessageSafety::Unavailable,
                (true, true) => MessageSafety::Unsafe,
                (true, false) => MessageSafety::Safe,
            }
        }

        async fn analyze_sentiment(&self, text: &str) -> SentimentOutcome {
            if !self.online {
                return SentimentOutcome::Unavailable;
            }
            let label = if text.contains(BANNED_WORD) {
                SentimentLabel::Negative
            } else {
                SentimentLabel::Positive
            };
            SentimentOutcome::Scored {
                label,
                confidence: 0.9,
            }
        }
    }
}
