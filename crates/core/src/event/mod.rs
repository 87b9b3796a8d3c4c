use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A single log-like message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub text: String,
    pub is_error: bool,
    /// Engine time at which the event was ingested. Filled in by the engine
    /// when left at zero.
    #[serde(default)]
    pub timestamp: Duration,
}

impl Event {
    pub fn new(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            text: text.into(),
            is_error,
            timestamp: Duration::ZERO,
        }
    }

    /// Builds an event from a raw log line, flagging it as an error when the
    /// line looks like one.
    pub fn from_log_line(line: &str) -> Self {
        let text = line.trim();
        Self::new(text, looks_like_error(text))
    }
}

/// Error heuristic used by the log streamer.
pub fn looks_like_error(line: &str) -> bool {
    line.contains("ERROR") || line.contains("Exception")
}

/// JSON envelope broadcast by the log streamer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl LogMessage {
    pub const LOG_KIND: &'static str = "log";

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Converts a `log` message into an [`Event`]; other kinds yield `None`.
    pub fn into_event(self) -> Option<Event> {
        (self.kind == Self::LOG_KIND).then(|| Event::new(self.content, self.is_error))
    }
}

/// Interprets one line from the transport. JSON envelopes are decoded,
/// anything else is treated as a raw log line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Option<Event> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        if let Ok(message) = LogMessage::parse(trimmed) {
            return message.into_event();
        }
    }

    Some(Event::from_log_line(trimmed))
}
