use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TouchlineError;

/// Unique identifier for one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// A chat message sent to an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One bundle of retrieved information handed to the synthesis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub role: String,
    /// Serialized payload, opaque to the executor.
    pub content: String,
    pub correlation_id: String,
}

/// Role carried by items recorded in place of a failed retrieval.
pub const ERROR_MARKER_ROLE: &str = "error";

impl ContextItem {
    /// Wrap a tool result with a fresh correlation id.
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Marker item recorded when a provider failed.
    pub fn error_marker(source: &str, message: &str) -> Self {
        let payload = serde_json::json!({
            "error": {
                "source": source,
                "message": message,
            }
        });
        Self {
            role: ERROR_MARKER_ROLE.to_string(),
            content: payload.to_string(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_error_marker(&self) -> bool {
        self.role == ERROR_MARKER_ROLE
    }
}

/// The router's classification of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    ConversationOnly,
    WebSearch,
    DomainData,
    Both,
}

impl RouteDecision {
    pub const ALL: [RouteDecision; 4] = [
        RouteDecision::ConversationOnly,
        RouteDecision::WebSearch,
        RouteDecision::DomainData,
        RouteDecision::Both,
    ];

    /// Canonical token as emitted by the classifier prompt.
    pub fn token(&self) -> &'static str {
        match self {
            Self::ConversationOnly => "conversation",
            Self::WebSearch => "search",
            Self::DomainData => "stats",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for RouteDecision {
    type Err = TouchlineError;

    /// Decode a classifier token. Accepts the canonical tokens and the
    /// step-name aliases the routing prompt advertises; anything else is a
    /// routing fault.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '.')
            .to_lowercase();
        match token.as_str() {
            "conversation" | "conversational_agent" | "conversation_only" => {
                Ok(Self::ConversationOnly)
            }
            "search" | "search_agent" | "web_search" => Ok(Self::WebSearch),
            "stats" | "fotmob_agent" | "domain_data" => Ok(Self::DomainData),
            "both" => Ok(Self::Both),
            _ => Err(TouchlineError::Routing(format!(
                "unrecognized route token '{}'",
                s.trim()
            ))),
        }
    }
}

/// A football team as returned by the sports data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: String,
    pub team_name: String,
    #[serde(default)]
    pub alternate_name: Option<String>,
    #[serde(default)]
    pub formation_year: Option<String>,
    pub sport_type: String,
    #[serde(default)]
    pub league_name: Option<String>,
    #[serde(default)]
    pub stadium_name: Option<String>,
    #[serde(default)]
    pub stadium_location: Option<String>,
    #[serde(default)]
    pub team_description: Option<String>,
    #[serde(default)]
    pub badge_image_url: Option<String>,
    #[serde(default)]
    pub jersey_image_url: Option<String>,
    #[serde(default)]
    pub official_website: Option<String>,
    #[serde(default)]
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
}

impl TeamRecord {
    /// Minimal record, mostly useful for fixtures.
    pub fn new(team_id: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            team_name: team_name.into(),
            alternate_name: None,
            formation_year: None,
            sport_type: "Soccer".to_string(),
            league_name: None,
            stadium_name: None,
            stadium_location: None,
            team_description: None,
            badge_image_url: None,
            jersey_image_url: None,
            official_website: None,
            facebook_url: None,
            twitter_url: None,
            youtube_url: None,
        }
    }
}

/// Which domain data lookup to perform for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainQuery {
    ByName { name: String },
    ById { id: String },
}

/// Workflow event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Run started.
    RunStarted { run_id: RunId },
    /// A step began executing.
    StepStarted { run_id: RunId, step: String },
    /// A step returned its result.
    StepCompleted {
        run_id: RunId,
        step: String,
        elapsed_ms: u64,
    },
    /// The router classified the question.
    RouteDecided {
        run_id: RunId,
        decision: RouteDecision,
    },
    /// Branches launched concurrently.
    FanOutStarted {
        run_id: RunId,
        branches: Vec<String>,
        barrier: String,
    },
    /// All branches of a fan-out completed.
    BarrierReached { run_id: RunId, barrier: String },
    /// Run halted with a final answer.
    RunCompleted { run_id: RunId, elapsed_ms: u64 },
    /// Run failed.
    RunFailed { run_id: RunId, error: String },
    /// Run abandoned on cancellation.
    RunCancelled { run_id: RunId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_tokens_decode() {
        assert_eq!(
            "conversational_agent".parse::<RouteDecision>().unwrap(),
            RouteDecision::ConversationOnly
        );
        assert_eq!(
            "  Search_Agent\n".parse::<RouteDecision>().unwrap(),
            RouteDecision::WebSearch
        );
        assert_eq!(
            "`fotmob_agent`".parse::<RouteDecision>().unwrap(),
            RouteDecision::DomainData
        );
        assert_eq!("both".parse::<RouteDecision>().unwrap(), RouteDecision::Both);
    }

    #[test]
    fn canonical_tokens_roundtrip() {
        for decision in RouteDecision::ALL {
            assert_eq!(decision.token().parse::<RouteDecision>().unwrap(), decision);
        }
    }

    #[test]
    fn unknown_token_is_routing_fault() {
        let err = "weather_agent".parse::<RouteDecision>().unwrap_err();
        assert!(matches!(err, TouchlineError::Routing(_)));
    }

    #[test]
    fn context_items_get_unique_ids() {
        let a = ContextItem::tool("{}");
        let b = ContextItem::tool("{}");
        assert_eq!(a.role, "tool");
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn error_marker_detection() {
        let marker = ContextItem::error_marker("sportsdb", "timeout");
        assert!(marker.is_error_marker());
        assert!(marker.content.contains("timeout"));

        let plain = ContextItem::tool(r#"{"results": []}"#);
        assert!(!plain.is_error_marker());
        assert!(!ContextItem::tool("not json").is_error_marker());

        // A provider payload that happens to carry an error object is still data.
        let upstream = ContextItem::tool(r#"{"error": {"code": 429, "message": "slow down"}}"#);
        assert!(!upstream.is_error_marker());
        assert_eq!(marker.role, ERROR_MARKER_ROLE);
    }

    #[test]
    fn chat_message_text() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "hello");
    }
}
