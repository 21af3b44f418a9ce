//! Immutable clock events as recorded in the per-user log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::ClockEventType;

/// Where a clock event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Web,
    Mobile,
    #[default]
    Kiosk,
}

impl EventSource {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
            Self::Kiosk => "kiosk",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = UnknownEventSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "mobile" => Ok(Self::Mobile),
            "kiosk" => Ok(Self::Kiosk),
            _ => Err(UnknownEventSource(s.to_string())),
        }
    }
}

/// Error type for unknown event source strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event source: {0}")]
pub struct UnknownEventSource(String);

/// One recorded worker action. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEvent {
    /// Insertion id; breaks ties between equal timestamps.
    pub id: i64,
    pub user_id: i64,
    pub event_type: ClockEventType,
    /// When the event happened (UTC).
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Free-form JSON supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl TimeEvent {
    /// Sort key for the event log: timestamp, then insertion id.
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.timestamp, self.id)
    }
}

/// Caller-supplied context stored alongside a new event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEventMetadata {
    pub source: EventSource,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub meta: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_uses_ts_and_omits_empty_fields() {
        let event = TimeEvent {
            id: 7,
            user_id: 3,
            event_type: ClockEventType::In,
            timestamp: "2024-01-01T09:00:00Z".parse().unwrap(),
            source: EventSource::Web,
            ip: None,
            user_agent: None,
            meta: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"id":7,"user_id":3,"event_type":"in","ts":"2024-01-01T09:00:00Z","source":"web"}"#
        );
    }

    #[test]
    fn source_parses_known_values_only() {
        assert_eq!("mobile".parse::<EventSource>().unwrap(), EventSource::Mobile);
        assert_eq!(
            "desktop".parse::<EventSource>().unwrap_err().to_string(),
            "unknown event source: desktop"
        );
    }
}
