// Attendance stream protocol
//
// Every text frame on the stream is a JSON document of the form
// `{"type": "...", "data": {...}, "timestamp": "<date> <time>"}`. Only
// `biometric_event` frames carry attendance; other kinds are passed through
// as `StreamEvent::Other` so new gateway features never break the client.

use crate::error::SyncError;
use crate::store::string_or_number;
use serde::{Deserialize, Serialize};

/// Frame kind carrying a fingerprint match
pub const BIOMETRIC_EVENT: &str = "biometric_event";

/// Untyped frame envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of a `biometric_event` frame.
///
/// `finger_id` is the entity id. The remaining fields are what the sensor
/// reported to the gateway at ingest and are informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub finger_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiometricEvent {
    pub entity_id: String,
    /// Full `"<date> <time>"` timestamp as sent by the gateway
    pub timestamp: String,
    pub year: Option<i64>,
    pub section_id: Option<String>,
    pub confidence: Option<i64>,
}

impl BiometricEvent {
    pub fn new(entity_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp: timestamp.into(),
            year: None,
            section_id: None,
            confidence: None,
        }
    }

    pub fn time_of_day(&self) -> &str {
        time_of_day(&self.timestamp)
    }
}

/// A decoded stream frame
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Biometric(BiometricEvent),
    /// Any frame kind this client does not act on
    Other { kind: String },
}

impl StreamEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Biometric(_) => BIOMETRIC_EVENT,
            Self::Other { kind } => kind,
        }
    }
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Result<StreamEvent, SyncError> {
    let frame: RawFrame = serde_json::from_str(text)?;

    if frame.kind != BIOMETRIC_EVENT {
        return Ok(StreamEvent::Other { kind: frame.kind });
    }

    let payload: BiometricPayload = serde_json::from_value(frame.data)
        .map_err(|e| SyncError::Decode(format!("bad {} payload: {}", BIOMETRIC_EVENT, e)))?;
    let timestamp = frame
        .timestamp
        .ok_or_else(|| SyncError::Decode(format!("{} without timestamp", BIOMETRIC_EVENT)))?;

    Ok(StreamEvent::Biometric(BiometricEvent {
        entity_id: payload.finger_id,
        timestamp,
        year: payload.year,
        section_id: payload.section_id,
        confidence: payload.confidence,
    }))
}

/// Time-of-day part of a `"<date> <time>"` timestamp.
///
/// Takes the field after the first space. A timestamp without a space is
/// returned whole.
pub fn time_of_day(timestamp: &str) -> &str {
    timestamp.split(' ').nth(1).unwrap_or(timestamp)
}
