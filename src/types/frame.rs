//! Stream frames in the `event: ...\ndata: ...\n\n` wire format

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::QuestionType;

/// Event tag carried by every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The aggregate assessment, always the first frame
    Assessment,
    /// One increment of remediation dialogue
    Remediation,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Assessment => "assessment",
            EventType::Remediation => "remediation",
        }
    }
}

/// One unit of the outgoing event stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub event: EventType,
    /// JSON payload, single line
    pub data: String,
}

impl StreamFrame {
    /// Serialize a payload into a frame
    pub fn encode<T: Serialize>(event: EventType, payload: &T) -> crate::Result<Self> {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?,
        })
    }

    /// Render in wire form
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event.as_str(), self.data)
    }
}

/// Payload of a remediation frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationDelta {
    pub request_id: String,
    pub text_increment: String,
    pub target_chunk: String,
    pub question_type: QuestionType,
}

/// A wire frame parsed back into structured form
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    pub event: String,
    pub data: Value,
}
