//! Weekly worked-hours aggregation.
//!
//! Replays a user's event log in chronological order and attributes each
//! closed span, net of breaks, to the ISO week containing its `out` event.
//!
//! # Algorithm Summary
//!
//! 1. Sort events by timestamp, ties by insertion id
//! 2. Track the open span start, the break time accumulated in it, and any active break
//! 3. On `out`, close an active break, subtract breaks, and add positive time to the week
//!
//! Spans are never split at week boundaries. Events that do not fit the
//! current state are skipped and reported as [`MalformedLogWarning`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::event::TimeEvent;
use crate::event_type::ClockEventType;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Worked hours attributed to one week. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    /// Monday 00:00:00 local time.
    pub week_start: DateTime<Utc>,
    /// Sunday 23:59:59.999 local time.
    pub week_end: DateTime<Utc>,
    pub total_hours: f64,
}

/// Why an event contributed nothing to the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `pause_start` with no open span.
    PauseWithoutOpenSpan,
    /// `pause_start` while a break was already running.
    BreakAlreadyActive,
    /// `pause_end` with no running break.
    PauseEndWithoutBreak,
    /// `out` with no open span.
    OutWithoutOpenSpan,
    /// `in` while a span was open; the earlier span is abandoned.
    SpanReopened,
    /// Breaks or clock skew left nothing positive to count.
    NonPositiveDuration,
    /// `in` never followed by `out`.
    OpenSpanAtEnd,
}

/// A non-fatal anomaly found while replaying the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedLogWarning {
    pub event_id: i64,
    pub event_type: ClockEventType,
    pub timestamp: DateTime<Utc>,
    pub reason: SkipReason,
}

/// Weekly totals plus everything that was skipped on the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyReport {
    /// Newest week first.
    pub summaries: Vec<WeeklySummary>,
    pub warnings: Vec<MalformedLogWarning>,
}

#[derive(Default)]
struct SpanState<'a> {
    opened_by: Option<&'a TimeEvent>,
    accumulated_break: Duration,
    active_break_start: Option<DateTime<Utc>>,
}

impl SpanState<'_> {
    fn reset(&mut self) {
        self.opened_by = None;
        self.accumulated_break = Duration::zero();
        self.active_break_start = None;
    }
}

/// Computes per-week worked hours, newest week first.
///
/// Weeks are Monday to Sunday in `tz`.
pub fn compute_weekly_summaries<Tz: TimeZone>(events: &[TimeEvent], tz: &Tz) -> Vec<WeeklySummary> {
    summarize_weeks(events, tz).summaries
}

/// Like [`compute_weekly_summaries`], but also returns the skipped events.
pub fn summarize_weeks<Tz: TimeZone>(events: &[TimeEvent], tz: &Tz) -> WeeklyReport {
    let mut ordered: Vec<&TimeEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.order_key());

    let mut weekly_ms: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut span = SpanState::default();

    let mut skip = |event: &TimeEvent, reason: SkipReason| {
        if reason == SkipReason::NonPositiveDuration {
            tracing::debug!(event_id = event.id, ?reason, "dropping non-positive span");
        } else {
            tracing::warn!(
                event_id = event.id,
                event_type = %event.event_type,
                timestamp = %event.timestamp,
                ?reason,
                "skipping clock event that does not fit the log"
            );
        }
        warnings.push(MalformedLogWarning {
            event_id: event.id,
            event_type: event.event_type,
            timestamp: event.timestamp,
            reason,
        });
    };

    for event in ordered {
        let ts = event.timestamp;
        match event.event_type {
            ClockEventType::In => {
                if let Some(previous) = span.opened_by {
                    skip(previous, SkipReason::SpanReopened);
                }
                span.reset();
                span.opened_by = Some(event);
            }
            ClockEventType::PauseStart => {
                if span.opened_by.is_none() {
                    skip(event, SkipReason::PauseWithoutOpenSpan);
                } else if span.active_break_start.is_some() {
                    skip(event, SkipReason::BreakAlreadyActive);
                } else {
                    span.active_break_start = Some(ts);
                }
            }
            ClockEventType::PauseEnd => match span.active_break_start.take() {
                Some(start) => span.accumulated_break += ts - start,
                None => skip(event, SkipReason::PauseEndWithoutBreak),
            },
            ClockEventType::Out => {
                let Some(opened_by) = span.opened_by else {
                    skip(event, SkipReason::OutWithoutOpenSpan);
                    continue;
                };
                if let Some(start) = span.active_break_start.take() {
                    span.accumulated_break += ts - start;
                }
                let worked = ts - opened_by.timestamp - span.accumulated_break;
                if worked > Duration::zero() {
                    *weekly_ms.entry(week_of(ts, tz)).or_default() += worked.num_milliseconds();
                } else {
                    skip(event, SkipReason::NonPositiveDuration);
                }
                span.reset();
            }
        }
    }

    if let Some(open) = span.opened_by {
        skip(open, SkipReason::OpenSpanAtEnd);
    }

    let summaries = weekly_ms
        .into_iter()
        .rev()
        .map(|(monday, total_ms)| weekly_summary(monday, total_ms, tz))
        .collect();

    WeeklyReport {
        summaries,
        warnings,
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "weekly totals are far below 2^52 milliseconds"
)]
fn weekly_summary<Tz: TimeZone>(monday: NaiveDate, total_ms: i64, tz: &Tz) -> WeeklySummary {
    let next_monday = monday.checked_add_days(Days::new(7)).unwrap_or(monday);
    WeeklySummary {
        week_start: local_midnight_to_utc(monday, tz),
        week_end: local_midnight_to_utc(next_monday, tz) - Duration::milliseconds(1),
        total_hours: total_ms as f64 / MS_PER_HOUR,
    }
}

/// Returns the local Monday of the week containing `instant`.
fn week_of<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    let local_date = instant.with_timezone(tz).date_naive();
    let days_since_monday = local_date.weekday().num_days_from_monday();
    local_date
        .checked_sub_days(Days::new(u64::from(days_since_monday)))
        .unwrap_or(local_date)
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc<Tz: TimeZone>(local_date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = local_date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Spring-forward gap at midnight: 1am local always exists
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map_or_else(
            || Utc.from_utc_datetime(&midnight),
            |dt| dt.with_timezone(&Utc),
        )
}
