//! The storage seam and the one mutation the core performs through it.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clock::{ValidationError, validate_transition};
use crate::event::{NewEventMetadata, TimeEvent};
use crate::event_type::ClockEventType;

/// Append-only access to per-user clock events.
///
/// This trait lets the clock logic work against the SQLite store or an
/// in-memory fixture. Implementations are responsible for making
/// [`record_clock_event`] atomic, e.g. by running it inside a transaction.
pub trait EventStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the chronologically last event for the user (ties by id).
    fn latest_event_for_user(&self, user_id: i64) -> Result<Option<TimeEvent>, Self::Error>;

    /// Lists the user's events in ascending order, bounds inclusive.
    fn list_events_for_user(
        &self,
        user_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEvent>, Self::Error>;

    /// Appends one immutable event and returns it with its assigned id.
    fn append_event(
        &mut self,
        user_id: i64,
        event_type: ClockEventType,
        timestamp: DateTime<Utc>,
        metadata: &NewEventMetadata,
    ) -> Result<TimeEvent, Self::Error>;
}

/// Failure to record a clock event.
#[derive(Debug, Error)]
pub enum ClockError<E: std::error::Error + 'static> {
    /// The transition is not allowed from the current state.
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    /// The store failed.
    #[error("event store error: {0}")]
    Store(#[source] E),
}

/// Validates `requested` against the user's latest event and appends it at `now`.
pub fn record_clock_event<S: EventStore>(
    store: &mut S,
    user_id: i64,
    requested: ClockEventType,
    metadata: &NewEventMetadata,
    now: DateTime<Utc>,
) -> Result<TimeEvent, ClockError<S::Error>> {
    let latest = store
        .latest_event_for_user(user_id)
        .map_err(ClockError::Store)?;

    if let Err(err) = validate_transition(latest.as_ref(), requested) {
        tracing::warn!(user_id, %requested, reason = %err, "rejected clock event");
        return Err(err.into());
    }

    let event = store
        .append_event(user_id, requested, now, metadata)
        .map_err(ClockError::Store)?;
    tracing::debug!(user_id, event_id = event.id, %requested, "recorded clock event");
    Ok(event)
}
