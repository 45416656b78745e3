//! Wire messages and the line classifier.
//!
//! Every frame is one JSON object. The shape of the object decides what it is:
//! an `error` key marks a device fault, `heap_total` + `heap_free` a memory
//! sample and `tasks` a task snapshot. Anything else is noise.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Error(ErrorMessage),
    Telemetry(TelemetrySample),
}

/// Device-reported fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub text: String,
    pub code: Option<ErrorCode>,
}

/// Firmware sends either a numeric code or an `esp_err_t` name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Int(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetrySample {
    Memory(MemorySample),
    Tasks(TaskSnapshot),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    #[serde(default)]
    pub heap_total: u64,
    #[serde(default)]
    pub heap_free: u64,
    #[serde(default)]
    pub internal_total: u64,
    #[serde(default)]
    pub internal_free: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_name: String,
    #[serde(default)]
    pub run_time: u64,
    #[serde(default)]
    pub percentage: f64,
    /// Pinned core, `None` for tasks without affinity information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<i64>,
    /// Set for tasks created or deleted during the measuring window.
    #[serde(
        default,
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Created,
    Deleted,
}

impl TaskRecord {
    pub fn new<S: Into<String>>(task_name: S, percentage: f64, core: Option<i64>) -> Self {
        Self {
            task_name: task_name.into(),
            run_time: 0,
            percentage,
            core,
            status: None,
        }
    }

    /// FreeRTOS idle tasks are named `IDLE`, `IDLE0`, `IDLE1`...
    pub fn is_idle(&self) -> bool {
        self.task_name
            .get(..IDLE_TASK_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IDLE_TASK_PREFIX))
    }
}

pub const IDLE_TASK_PREFIX: &str = "IDLE";

impl ErrorMessage {
    pub fn new<S: Into<String>>(text: S, code: Option<ErrorCode>) -> Self {
        Self {
            text: text.into(),
            code,
        }
    }

    fn from_fields(error: &Value, code: Option<&Value>) -> Self {
        let text = match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let code = match code {
            Some(value) if !is_blank_code(value) => Some(match value {
                Value::Number(n) => match n.as_i64() {
                    Some(n) => ErrorCode::Int(n),
                    None => ErrorCode::Name(n.to_string()),
                },
                Value::String(name) => ErrorCode::Name(name.clone()),
                other => ErrorCode::Name(other.to_string()),
            }),
            _ => None,
        };
        Self { text, code }
    }
}

/// Codes the device uses to mean "no code": null, zero, false or empty.
fn is_blank_code(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// User-facing text: `"<text> (code: <code>)"`, or the bare text without a code.
impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code: {})", self.text, code),
            None => f.write_str(&self.text),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Int(code) => write!(f, "{}", code),
            ErrorCode::Name(name) => f.write_str(name),
        }
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<TaskStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

enum FrameKind {
    Error,
    Memory,
    Tasks,
}

impl FrameKind {
    fn of(object: &Map<String, Value>) -> Option<Self> {
        if object.contains_key("error") {
            Some(FrameKind::Error)
        } else if object.contains_key("heap_total") && object.contains_key("heap_free") {
            Some(FrameKind::Memory)
        } else if object.contains_key("tasks") {
            Some(FrameKind::Tasks)
        } else {
            None
        }
    }
}

/// Classify one candidate line.
///
/// Returns `None` for anything that is not a recognised frame: invalid JSON,
/// non-object values, unknown shapes and fields of the wrong type.
pub fn classify(line: &str) -> Option<Message> {
    let value: Value = serde_json::from_str(line).ok()?;
    let kind = FrameKind::of(value.as_object()?)?;

    match kind {
        FrameKind::Error => {
            let object = value.as_object()?;
            let error = object.get("error")?;
            Some(Message::Error(ErrorMessage::from_fields(
                error,
                object.get("code"),
            )))
        }
        FrameKind::Memory => serde_json::from_value(value)
            .ok()
            .map(|sample| Message::Telemetry(TelemetrySample::Memory(sample))),
        FrameKind::Tasks => serde_json::from_value(value)
            .ok()
            .map(|snapshot| Message::Telemetry(TelemetrySample::Tasks(snapshot))),
    }
}
