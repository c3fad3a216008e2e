use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

/// One piece of a turn. Exactly one payload kind per part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
        /// Opaque reasoning state the service attaches to a part and
        /// expects back unchanged when the history is resent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionCall {
        name: String,
        args: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionResponse {
        name: String,
        payload: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            thought_signature: None,
        }
    }

    pub fn function_call(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
            id: None,
            thought_signature: None,
        }
    }

    pub fn function_response(name: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::FunctionResponse {
            name: name.into(),
            payload,
            id: None,
        }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Self::FunctionCall { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::FunctionCall { .. } => "functionCall",
            Self::FunctionResponse { .. } => "functionResponse",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Tool,
}

impl Role {
    /// Whether a part of this kind may appear in a turn with this role.
    pub fn accepts(self, part: &ContentPart) -> bool {
        match (self, part) {
            (Self::User, ContentPart::Text { .. })
            | (Self::Model, ContentPart::Text { .. } | ContentPart::FunctionCall { .. })
            | (Self::Tool, ContentPart::FunctionResponse { .. }) => true,
            (Self::User | Self::Model | Self::Tool, _) => false,
        }
    }
}

/// One role-attributed contribution to the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn model(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    pub fn tool(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Tool,
            parts,
        }
    }

    pub fn has_function_calls(&self) -> bool {
        self.parts.iter().any(ContentPart::is_function_call)
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &ContentPart> {
        self.parts.iter().filter(|part| part.is_function_call())
    }

    /// Text parts joined by newlines; empty when the turn has none.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { text, .. } = part {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// Why the model stopped producing this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other(String),
    Unspecified,
}

impl FinishReason {
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("STOP") => Self::Stop,
            Some("MAX_TOKENS") => Self::MaxTokens,
            Some("SAFETY") => Self::Safety,
            Some("RECITATION") => Self::Recitation,
            Some("FINISH_REASON_UNSPECIFIED") | None => Self::Unspecified,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::Stop => "STOP",
            Self::MaxTokens => "MAX_TOKENS",
            Self::Safety => "SAFETY",
            Self::Recitation => "RECITATION",
            Self::Other(raw) => raw.as_str(),
            Self::Unspecified => "FINISH_REASON_UNSPECIFIED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub candidates_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.candidates_tokens
    }
}

/// What the remote model produced for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub parts: Vec<ContentPart>,
    pub finish_reason: FinishReason,
    pub turn_index: usize,
    pub usage: Option<TokenUsage>,
    pub model_version: Option<String>,
}

impl ModelResponse {
    pub fn new(parts: Vec<ContentPart>, finish_reason: FinishReason, turn_index: usize) -> Self {
        Self {
            parts,
            finish_reason,
            turn_index,
            usage: None,
            model_version: None,
        }
    }

    pub fn has_function_calls(&self) -> bool {
        self.parts.iter().any(ContentPart::is_function_call)
    }
}

/// Sampling knobs forwarded verbatim as `generationConfig`.
pub type GenerationConfig = Map<String, Value>;

/// Per-request extras that travel alongside the transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub system_instruction: Option<String>,
    pub generation_config: Option<GenerationConfig>,
}
