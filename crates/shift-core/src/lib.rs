//! Core domain logic for Shift.
//!
//! This crate contains the fundamental types and logic for:
//! - Clock state: which clock event a worker may record next
//! - Weekly summaries: worked hours per ISO week, net of breaks
//! - Claims: decoding verified token payloads into an identity

pub mod claims;
pub mod clock;
pub mod event;
pub mod event_type;
pub mod store;
pub mod summary;

pub use claims::{ClaimsError, Identity, PlacenetConfig, Role, TokenClaims};
pub use clock::{ClockState, ValidationError, validate_transition};
pub use event::{EventSource, NewEventMetadata, TimeEvent, UnknownEventSource};
pub use event_type::{ClockEventType, UnknownEventType};
pub use store::{ClockError, EventStore, record_clock_event};
pub use summary::{
    MalformedLogWarning, SkipReason, WeeklyReport, WeeklySummary, compute_weekly_summaries,
    summarize_weeks,
};
