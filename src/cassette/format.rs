//! Cassette file format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::GenerationParams;

/// A recorded session of generation service calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Human-readable session name.
    pub name: String,
    /// When the session was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Git commit the recording was made from.
    pub commit: String,
    /// Calls in the order they were made.
    pub interactions: Vec<Interaction>,
}

/// One call and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in the session, starting at zero.
    pub seq: u64,
    /// What was called.
    pub call: Call,
    /// What came back.
    pub outcome: Outcome,
}

/// A generation service method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Call {
    /// `load_adapter(adapter)`.
    LoadAdapter {
        /// Adapter identifier.
        adapter: String,
    },
    /// `unload_adapter()`.
    UnloadAdapter,
    /// `generate(params)`.
    Generate {
        /// Parameters passed to the service.
        #[serde(default)]
        params: GenerationParams,
    },
}

impl Call {
    /// The method name as written in cassettes.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::LoadAdapter { .. } => "load_adapter",
            Self::UnloadAdapter => "unload_adapter",
            Self::Generate { .. } => "generate",
        }
    }
}

/// Success value or error message. Exactly one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outcome {
    /// Serialized success value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<serde_json::Value>,
    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl Outcome {
    /// Capture a result.
    pub fn from_result<T: Serialize, E: std::fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(v) => match serde_json::to_value(v) {
                Ok(value) => Self { ok: Some(value), err: None },
                Err(e) => Self { ok: None, err: Some(format!("unserializable outcome: {e}")) },
            },
            Err(e) => Self { ok: None, err: Some(e.to_string()) },
        }
    }
}
