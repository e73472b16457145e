//! Wire types for the model endpoint.
//!
//! Mirrors the OpenAI Chat Completions API: requests carry the transcript
//! plus an optional tool schema, responses carry either answer text or tool
//! calls. The gateway folds responses into [`ModelReply`] so callers never
//! touch the envelope.

use serde::{Deserialize, Serialize, Serializer};

// ─── Message types ───────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single chat message on the wire.
///
/// Also used to decode response messages, which reuse the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Message text. Serialized as `""` rather than `null` when absent —
    /// some endpoints reject null content on assistant tool-call turns.
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Present on tool-role messages: which call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Present on assistant messages that invoke tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

/// Serialize `None` content as an empty string.
fn serialize_content<S: Serializer>(
    content: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match content {
        Some(text) => serializer.serialize_str(text),
        None => serializer.serialize_str(""),
    }
}

/// A tool call as it appears inside a message, request or response side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

/// The function half of a wire tool call. `arguments` is a JSON-encoded
/// string per the API contract, not a nested object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    pub arguments: String,
}

// ─── Tool schema ─────────────────────────────────────────────────────────────

/// A tool advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function metadata inside a tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: serde_json::Value,
}

// ─── Request / response envelopes ────────────────────────────────────────────

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Completion envelope returned by the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
}

/// One completion choice; only the first is consulted.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// ─── Interpreted replies ─────────────────────────────────────────────────────

/// A tool invocation requested by the model, arguments left raw.
///
/// Parsing the argument payload is the dispatcher's job: a malformed payload
/// is a recoverable tool failure, not a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object exactly as the model produced it.
    pub arguments: String,
}

/// The two ways a model turn can end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// Final natural-language answer text.
    Answer(String),
    /// The model wants a tool run before it can answer.
    ToolRequest(ToolCallRequest),
}

// ─── Tests ───────────────────────────────────────────────────────────────────
