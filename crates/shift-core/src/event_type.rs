//! Clock event types as the single source of truth for event type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four actions a worker can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEventType {
    In,
    Out,
    PauseStart,
    PauseEnd,
}

impl ClockEventType {
    /// All variants, in table order.
    pub const ALL: [Self; 4] = [Self::In, Self::Out, Self::PauseStart, Self::PauseEnd];

    /// String representation for storage and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::PauseStart => "pause_start",
            Self::PauseEnd => "pause_end",
        }
    }
}

impl fmt::Display for ClockEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClockEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "pause_start" => Ok(Self::PauseStart),
            "pause_end" => Ok(Self::PauseEnd),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for ClockEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClockEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0} (expected one of: in, out, pause_start, pause_end)")]
pub struct UnknownEventType(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_storage_string() {
        for variant in ClockEventType::ALL {
            let parsed: ClockEventType = variant.as_str().parse().expect("should parse");
            assert_eq!(parsed, variant);
        }
    }

    #[test]
    fn serializes_as_snake_case_string() {
        let json = serde_json::to_string(&ClockEventType::PauseStart).unwrap();
        assert_eq!(json, r#""pause_start""#);

        let parsed: ClockEventType = serde_json::from_str(r#""pause_end""#).unwrap();
        assert_eq!(parsed, ClockEventType::PauseEnd);
    }

    #[test]
    fn unknown_type_errors() {
        let err = "break".parse::<ClockEventType>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown event type: break (expected one of: in, out, pause_start, pause_end)"
        );
    }

    #[test]
    fn legacy_camel_case_is_rejected() {
        assert!("pauseStart".parse::<ClockEventType>().is_err());
        assert!(serde_json::from_str::<ClockEventType>(r#""IN""#).is_err());
    }
}
