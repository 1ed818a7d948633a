//! Wire types for the render/patch event stream.
//!
//! Every frame payload is a JSON object with a `type` discriminator and an
//! optional `data` object whose shape depends on the type. Unknown types are
//! preserved as [`StreamEvent::Unknown`] so callers can ignore them.

pub mod frame;

pub use frame::{DATA_PREFIX, FrameDecoder, FrameStream, decode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Category assigned to items that omit `kind`.
pub const DEFAULT_KIND: &str = "meta";

/// Kind used for chat messages (user and assistant bubbles).
pub const MESSAGE_KIND: &str = "message";

/// Fallback text for `error` events without a message.
pub const UNKNOWN_ERROR: &str = "unknown";

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn kind_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let kind = Option::<String>::deserialize(deserializer)?;
    Ok(match kind {
        Some(kind) if !kind.is_empty() => kind,
        _ => DEFAULT_KIND.to_string(),
    })
}

/// Accepts string or scalar ids; numbers are keyed by their JSON text.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_as_text))
}

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

/// A unit of chat content to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderItem {
    /// Stable identifier; items without one cannot be patched later.
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default = "default_kind", deserialize_with = "kind_or_default")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text direction hint (`ltr` / `rtl` / `auto`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Item to remove before this one is inserted.
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub replace_id: Option<String>,
}

impl Default for RenderItem {
    fn default() -> Self {
        Self {
            id: None,
            kind: default_kind(),
            role: None,
            dir: None,
            text: String::new(),
            status: None,
            replace_id: None,
        }
    }
}

impl RenderItem {
    /// Creates an unaddressable meta line (status, errors).
    pub fn meta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Creates a chat message bubble for the given role.
    pub fn message(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: MESSAGE_KIND.to_string(),
            role: Some(role.into()),
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn replacing(mut self, replace_id: impl Into<String>) -> Self {
        self.replace_id = Some(replace_id.into());
        self
    }

    /// Whether this item is an assistant chat message.
    pub fn is_assistant_message(&self) -> bool {
        self.kind == MESSAGE_KIND && self.role.as_deref() == Some("assistant")
    }
}

/// Text mutation carried by a `patch` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatchKind {
    AppendText,
    ReplaceText,
    /// Any op this client does not understand; applied as a no-op.
    Unsupported(String),
}

impl Default for PatchKind {
    fn default() -> Self {
        Self::Unsupported(String::new())
    }
}

impl From<String> for PatchKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "append_text" => Self::AppendText,
            "replace_text" => Self::ReplaceText,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<PatchKind> for String {
    fn from(kind: PatchKind) -> Self {
        match kind {
            PatchKind::AppendText => "append_text".to_string(),
            PatchKind::ReplaceText => "replace_text".to_string(),
            PatchKind::Unsupported(op) => op,
        }
    }
}

/// Incremental mutation of a previously rendered item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchOp {
    /// Target item. A patch whose target cannot be resolved is dropped.
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub op: PatchKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub replace_id: Option<String>,
}

impl PatchOp {
    pub fn append(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            op: PatchKind::AppendText,
            text: text.into(),
            replace_id: None,
        }
    }

    pub fn replace(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            op: PatchKind::ReplaceText,
            text: text.into(),
            replace_id: None,
        }
    }
}

/// Tool activity reported by the backend, shown in a side log only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolActivity {
    pub phase: ToolPhase,
    pub name: String,
    /// Arguments (for calls) or result (for outputs), rendered as text.
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Call,
    Output,
}

impl ToolActivity {
    fn from_data(phase: ToolPhase, data: &Value) -> Self {
        let detail_key = match phase {
            ToolPhase::Call => "args",
            ToolPhase::Output => "result",
        };
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or("(unknown tool)")
            .to_string();
        let detail = match data.get(detail_key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
            }
        };
        Self {
            phase,
            name,
            detail,
        }
    }
}

/// A decoded record from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Render(RenderItem),
    Placeholder(RenderItem),
    Patch(PatchOp),
    /// Explicit end-of-stream marker.
    Done,
    /// Backend-signaled failure; `message` already defaults to `unknown`.
    Error {
        message: String,
        code: Option<String>,
    },
    Tool(ToolActivity),
    /// A well-formed record with a type this client does not handle.
    Unknown(String),
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

impl StreamEvent {
    /// Decodes one frame payload.
    ///
    /// # Errors
    /// Returns an error if the payload is not JSON, has no `type`, or its
    /// `data` does not match the shape required by the type.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let raw: RawEvent = serde_json::from_str(payload)?;
        Ok(match raw.event_type.as_str() {
            "render" => Self::Render(serde_json::from_value(raw.data)?),
            "placeholder" => Self::Placeholder(serde_json::from_value(raw.data)?),
            "patch" => Self::Patch(serde_json::from_value(raw.data)?),
            "done" => Self::Done,
            "error" => Self::Error {
                message: error_message(&raw.data),
                code: raw.data.get("code").and_then(value_as_text),
            },
            "tool_call_generated" => {
                Self::Tool(ToolActivity::from_data(ToolPhase::Call, &raw.data))
            }
            "tool_output_generated" => {
                Self::Tool(ToolActivity::from_data(ToolPhase::Output, &raw.data))
            }
            _ => Self::Unknown(raw.event_type),
        })
    }

    /// Wire name of this event's type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Render(_) => "render",
            Self::Placeholder(_) => "placeholder",
            Self::Patch(_) => "patch",
            Self::Done => "done",
            Self::Error { .. } => "error",
            Self::Tool(activity) => match activity.phase {
                ToolPhase::Call => "tool_call_generated",
                ToolPhase::Output => "tool_output_generated",
            },
            Self::Unknown(name) => name,
        }
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn error_message(data: &Value) -> String {
    data.get("message")
        .and_then(value_as_text)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}
