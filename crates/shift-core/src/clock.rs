//! Clock state machine.
//!
//! A worker's state is derived from their latest event alone; no replay of
//! the full log is needed to decide whether a new event is allowed.
//!
//! | State     | `in`    | `out`  | `pause_start` | `pause_end` |
//! |-----------|---------|--------|---------------|-------------|
//! | `Out`     | → `In`  | reject | reject        | reject      |
//! | `In`      | reject  | → `Out`| → `OnBreak`   | reject      |
//! | `OnBreak` | reject  | reject | reject        | → `In`      |

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::event::TimeEvent;
use crate::event_type::ClockEventType;

/// Where a worker currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClockState {
    #[serde(rename = "clocked_out")]
    Out,
    #[serde(rename = "clocked_in")]
    In,
    #[serde(rename = "on_pause")]
    OnBreak,
}

impl ClockState {
    /// Derives the state from the type of the latest recorded event.
    pub const fn from_latest(latest: Option<ClockEventType>) -> Self {
        match latest {
            None | Some(ClockEventType::Out) => Self::Out,
            Some(ClockEventType::In | ClockEventType::PauseEnd) => Self::In,
            Some(ClockEventType::PauseStart) => Self::OnBreak,
        }
    }

    /// Event types that are legal from this state.
    pub const fn allowed_events(self) -> &'static [ClockEventType] {
        match self {
            Self::Out => &[ClockEventType::In],
            Self::In => &[ClockEventType::Out, ClockEventType::PauseStart],
            Self::OnBreak => &[ClockEventType::PauseEnd],
        }
    }

    /// Applies `requested` to this state.
    pub const fn transition(self, requested: ClockEventType) -> Result<Self, ValidationError> {
        match (self, requested) {
            (Self::Out, ClockEventType::In) | (Self::OnBreak, ClockEventType::PauseEnd) => {
                Ok(Self::In)
            }
            (Self::In, ClockEventType::Out) => Ok(Self::Out),
            (Self::In, ClockEventType::PauseStart) => Ok(Self::OnBreak),
            (Self::In, ClockEventType::In) => Err(ValidationError::AlreadyClockedIn),
            (Self::OnBreak, ClockEventType::In) => Err(ValidationError::ClockInWhileOnBreak),
            (Self::Out, ClockEventType::Out | ClockEventType::PauseStart) => {
                Err(ValidationError::NotClockedIn { requested })
            }
            (Self::OnBreak, ClockEventType::Out) => Err(ValidationError::ClockOutWhileOnBreak),
            (Self::OnBreak, ClockEventType::PauseStart) => Err(ValidationError::AlreadyOnBreak),
            (Self::In | Self::Out, ClockEventType::PauseEnd) => Err(ValidationError::NotOnBreak),
        }
    }

    /// Storage-style name (`clocked_out`, `clocked_in`, `on_pause`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Out => "clocked_out",
            Self::In => "clocked_in",
            Self::OnBreak => "on_pause",
        }
    }
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected clock transition. Always a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cannot clock in: already clocked in")]
    AlreadyClockedIn,

    #[error("cannot clock in: currently on a break, end the break first")]
    ClockInWhileOnBreak,

    #[error("cannot record {requested}: not clocked in")]
    NotClockedIn { requested: ClockEventType },

    #[error("cannot clock out: currently on a break, end the break first")]
    ClockOutWhileOnBreak,

    #[error("cannot start a break: already on a break")]
    AlreadyOnBreak,

    #[error("cannot end a break: no break in progress")]
    NotOnBreak,
}

/// Decides whether `requested` may follow `last` and returns the resulting state.
pub fn validate_transition(
    last: Option<&TimeEvent>,
    requested: ClockEventType,
) -> Result<ClockState, ValidationError> {
    ClockState::from_latest(last.map(|event| event.event_type)).transition(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;

    fn event(event_type: ClockEventType) -> TimeEvent {
        TimeEvent {
            id: 1,
            user_id: 1,
            event_type,
            timestamp: "2024-01-01T09:00:00Z".parse().unwrap(),
            source: EventSource::Web,
            ip: None,
            user_agent: None,
            meta: None,
        }
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use ClockEventType::{In, Out, PauseEnd, PauseStart};

        let cases: [(Option<ClockEventType>, ClockEventType, Option<ClockState>); 20] = [
            (None, In, Some(ClockState::In)),
            (None, Out, None),
            (None, PauseStart, None),
            (None, PauseEnd, None),
            (Some(Out), In, Some(ClockState::In)),
            (Some(Out), Out, None),
            (Some(Out), PauseStart, None),
            (Some(Out), PauseEnd, None),
            (Some(In), In, None),
            (Some(In), Out, Some(ClockState::Out)),
            (Some(In), PauseStart, Some(ClockState::OnBreak)),
            (Some(In), PauseEnd, None),
            (Some(PauseEnd), In, None),
            (Some(PauseEnd), Out, Some(ClockState::Out)),
            (Some(PauseEnd), PauseStart, Some(ClockState::OnBreak)),
            (Some(PauseEnd), PauseEnd, None),
            (Some(PauseStart), In, None),
            (Some(PauseStart), Out, None),
            (Some(PauseStart), PauseStart, None),
            (Some(PauseStart), PauseEnd, Some(ClockState::In)),
        ];

        for (last, requested, expected) in cases {
            let last = last.map(event);
            let result = validate_transition(last.as_ref(), requested);
            assert_eq!(
                result.ok(),
                expected,
                "last={:?} requested={requested}",
                last.map(|e| e.event_type)
            );
        }
    }

    #[test]
    fn double_clock_in_is_rejected() {
        let last = event(ClockEventType::In);
        let err = validate_transition(Some(&last), ClockEventType::In).unwrap_err();
        assert_eq!(err, ValidationError::AlreadyClockedIn);
        assert_eq!(err.to_string(), "cannot clock in: already clocked in");
    }

    #[test]
    fn clock_out_from_break_is_rejected() {
        let last = event(ClockEventType::PauseStart);
        let err = validate_transition(Some(&last), ClockEventType::Out).unwrap_err();
        assert_eq!(err, ValidationError::ClockOutWhileOnBreak);
    }

    #[test]
    fn reason_names_the_requested_event() {
        let err = validate_transition(None, ClockEventType::PauseStart).unwrap_err();
        assert_eq!(err.to_string(), "cannot record pause_start: not clocked in");
    }

    #[test]
    fn allowed_events_agree_with_transitions() {
        for state in [ClockState::Out, ClockState::In, ClockState::OnBreak] {
            for requested in ClockEventType::ALL {
                let allowed = state.allowed_events().contains(&requested);
                assert_eq!(
                    state.transition(requested).is_ok(),
                    allowed,
                    "{state} / {requested}"
                );
            }
        }
    }

    #[test]
    fn state_serializes_with_status_names() {
        let json = serde_json::to_string(&ClockState::OnBreak).unwrap();
        assert_eq!(json, r#""on_pause""#);
    }
}
