//! Control messages sent from the orchestrator to the runtime child.
//!
//! One JSON object per line on the child's stdin. File contents travel as
//! standard base64.

use crate::error::RuntimeError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A mutation of the runtime's files or routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Apply in order, notify clients once
    Bulk { messages: Vec<Message> },
    CreateFile {
        filename: String,
        #[serde(with = "base64_bytes")]
        contents: Bytes,
    },
    UpdateFile {
        filename: String,
        #[serde(with = "base64_bytes")]
        contents: Bytes,
    },
    DeleteFile { filename: String },
    /// Register `pattern`, served by the route module in `module`
    CreateRoute { pattern: String, module: String },
    /// Handler or templates behind `pattern` changed
    UpdateRoute { pattern: String },
    DeleteRoute { pattern: String },
}

impl Message {
    pub fn create_file(filename: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Message::CreateFile {
            filename: filename.into(),
            contents: contents.into(),
        }
    }

    pub fn update_file(filename: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Message::UpdateFile {
            filename: filename.into(),
            contents: contents.into(),
        }
    }

    pub fn delete_file(filename: impl Into<String>) -> Self {
        Message::DeleteFile {
            filename: filename.into(),
        }
    }

    pub fn create_route(pattern: impl Into<String>, module: impl Into<String>) -> Self {
        Message::CreateRoute {
            pattern: pattern.into(),
            module: module.into(),
        }
    }

    pub fn update_route(pattern: impl Into<String>) -> Self {
        Message::UpdateRoute {
            pattern: pattern.into(),
        }
    }

    pub fn delete_route(pattern: impl Into<String>) -> Self {
        Message::DeleteRoute {
            pattern: pattern.into(),
        }
    }

    /// Wrap several messages; `None` when there is nothing to send.
    pub fn bulk(messages: Vec<Message>) -> Option<Self> {
        (!messages.is_empty()).then_some(Message::Bulk { messages })
    }

    /// Number of leaf operations, counting through nested bulks.
    pub fn len(&self) -> usize {
        match self {
            Message::Bulk { messages } => messages.iter().map(Message::len).sum(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode as one newline-terminated line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one line, with or without its terminator.
    pub fn from_line(line: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(line.trim_end()).map_err(|e| RuntimeError::Framing(e.to_string()))
    }
}

/// Aggregated change event delivered to browser clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl Change {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
