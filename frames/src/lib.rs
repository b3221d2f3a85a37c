//! Wire frames for the process log stream.
//!
//! Every message on the socket is a JSON object discriminated by `type`.
//! The server sends `log`, `connected`, `error` and `pong` frames; the client
//! only ever sends `ping`. Decoding is strict about the envelope and lenient
//! about the `message` payload of log frames, which is coerced to text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Discriminants accepted by [`decode_frame`].
pub const INBOUND_TYPES: [&str; 4] = ["log", "connected", "error", "pong"];

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not JSON at all.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// The object has no string `type` field.
    #[error("frame has no `type` discriminant")]
    MissingType,
    /// The `type` field names a frame this client does not understand.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    /// The discriminant is known but the body does not match it.
    #[error("malformed {kind} frame: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Which output stream of the remote process a log line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    /// Standard output.
    Out,
    /// Standard error.
    Error,
}

impl LogStream {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log line emitted by the remote process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFrame {
    /// Name of the process that produced the line.
    #[serde(default)]
    pub process: String,
    #[serde(rename = "logType")]
    pub log_type: LogStream,
    /// Line text. Non-string payloads are rendered as compact JSON.
    #[serde(default, deserialize_with = "coerce_text")]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Greeting sent by the server once the stream is attached.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedFrame {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub process: String,
    /// Echo of the requested filter (`both`, `out` or `error`).
    #[serde(rename = "logType", default)]
    pub log_type: String,
}

/// Non-fatal error reported by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    #[serde(default)]
    pub message: String,
}

/// Frames received from the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    Log(LogFrame),
    Connected(ConnectedFrame),
    Error(ErrorFrame),
    Pong,
}

impl Inbound {
    /// Wire discriminant of this frame.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Connected(_) => "connected",
            Self::Error(_) => "error",
            Self::Pong => "pong",
        }
    }
}

/// Frames sent to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// Keep-alive request; the server answers with [`Inbound::Pong`].
    Ping,
}

/// Encode an outbound frame as JSON text.
#[must_use]
pub fn encode_frame(frame: &Outbound) -> String {
    // Serializing a fieldless tagged enum into a String cannot fail.
    serde_json::to_string(frame).unwrap_or_default()
}

/// Decode one text payload into an inbound frame.
///
/// # Errors
///
/// Returns a [`CodecError`] describing why the payload is not a recognized
/// frame. Callers streaming logs treat every error as an ignorable frame.
pub fn decode_frame(text: &str) -> Result<Inbound, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = &value else {
        return Err(CodecError::NotAnObject);
    };
    let Some(Value::String(kind)) = map.get("type") else {
        return Err(CodecError::MissingType);
    };
    if !INBOUND_TYPES.contains(&kind.as_str()) {
        return Err(CodecError::UnknownType(kind.clone()));
    }
    let kind = kind.clone();

    serde_json::from_value(value).map_err(|source| CodecError::Malformed { kind, source })
}

fn coerce_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
