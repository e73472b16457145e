//! Session transcript: append-only conversation history.
//!
//! Each session owns one transcript. Turns are only ever appended; nothing
//! edits or removes history, so the gateway always sees the full exchange
//! in order.

use serde_json::Value;
use uuid::Uuid;

use crate::inference::types::{ChatMessage, FunctionCallResponse, Role, ToolCallResponse};

// ─── Turns ───────────────────────────────────────────────────────────────────

/// A tool invocation recorded on an assistant turn.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument payload exactly as the model produced it.
    pub arguments: String,
}

/// One conversation turn.
///
/// `content` is empty on assistant turns that carry a tool invocation
/// instead of text.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Set on assistant turns that invoke a tool.
    pub tool_call: Option<ToolInvocation>,
    /// Set on tool turns: which tool produced this result.
    pub tool_name: Option<String>,
    /// Set on tool turns: correlates the result with the assistant's call.
    pub tool_call_id: Option<String>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_name: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn carrying a tool invocation instead of text.
    pub fn tool_call(invocation: ToolInvocation) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call: Some(invocation),
            tool_name: None,
            tool_call_id: None,
        }
    }

    /// Tool turn with the result payload.
    ///
    /// A string payload is stored as-is; anything else is JSON-encoded.
    /// This avoids wrapping plain text in quotes, which some models read
    /// back as a malformed result.
    pub fn tool_result(tool_call_id: &str, tool_name: &str, result: &Value) -> Self {
        let content = match result.as_str() {
            Some(text) => text.to_string(),
            None => result.to_string(),
        };
        Self {
            role: Role::Tool,
            content,
            tool_call: None,
            tool_name: Some(tool_name.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Wire form of this turn.
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            Role::Assistant => ChatMessage {
                role: Role::Assistant,
                content: if self.content.is_empty() {
                    None
                } else {
                    Some(self.content.clone())
                },
                tool_call_id: None,
                tool_calls: self.tool_call.as_ref().map(|tc| {
                    vec![ToolCallResponse {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: FunctionCallResponse {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    }]
                }),
            },
            Role::Tool => ChatMessage {
                role: Role::Tool,
                content: Some(self.content.clone()),
                tool_call_id: self.tool_call_id.clone(),
                tool_calls: None,
            },
            role => ChatMessage {
                role,
                content: Some(self.content.clone()),
                tool_call_id: None,
                tool_calls: None,
            },
        }
    }
}

// ─── Transcript ──────────────────────────────────────────────────────────────

/// Append-only record of one session's turns.
pub struct Transcript {
    session_id: String,
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start an empty transcript with a fresh session id.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
        }
    }

    /// Start a transcript whose first turn is the system prompt.
    pub fn with_system_prompt(prompt: &str) -> Self {
        let mut transcript = Self::new();
        transcript.append(Turn::system(prompt));
        transcript
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append one turn. Amortized O(1); never fails.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Read-only view of the turns in append order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Wire form of the whole transcript for the gateway.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(Turn::to_chat_message).collect()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
