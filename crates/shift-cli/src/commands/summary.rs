//! Summary command: worked hours per week, net of breaks.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use shift_core::{EventStore, WeeklySummary, summarize_weeks};
use shift_db::{Database, User};

use super::util::format_duration;

#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    timezone: &'a str,
    weeks: &'a [WeeklySummary],
    skipped_events: usize,
}

/// Prints weekly totals, with weeks running Monday to Sunday in `tz`.
pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &Database,
    user: &User,
    range: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    json: bool,
    tz: &Tz,
    tz_name: &str,
) -> Result<()> {
    // Spans can open before `from`, so replay the whole log and filter weeks
    let events = db.list_events_for_user(user.id, None, None)?;
    let mut report = summarize_weeks(&events, tz);
    report.summaries.retain(|week| overlaps(range, week.week_start, week.week_end));
    report
        .warnings
        .retain(|warning| overlaps(range, warning.timestamp, warning.timestamp));
    if !report.warnings.is_empty() {
        tracing::info!(
            skipped = report.warnings.len(),
            "some events did not fit the clock sequence and were skipped"
        );
    }

    if json {
        let output = SummaryOutput {
            timezone: tz_name,
            weeks: &report.summaries,
            skipped_events: report.warnings.len(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    writeln!(writer, "Weekly hours ({tz_name})")?;
    if report.summaries.is_empty() {
        writeln!(writer, "No completed work spans.")?;
        return Ok(());
    }
    for week in &report.summaries {
        let monday = week.week_start.with_timezone(tz).date_naive();
        writeln!(
            writer,
            "Week of {monday}  {:>8}  ({:.2} h)",
            format_duration(hours_to_ms(week.total_hours)),
            week.total_hours
        )?;
    }
    if !report.warnings.is_empty() {
        writeln!(
            writer,
            "{} event(s) skipped; run with --verbose for details",
            report.warnings.len()
        )?;
    }
    Ok(())
}

/// Whether `[start, end]` intersects the inclusive `range`.
fn overlaps(
    (from, to): (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    from.is_none_or(|from| end >= from) && to.is_none_or(|to| start <= to)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "weekly hours are small enough to fit in i64 milliseconds"
)]
fn hours_to_ms(hours: f64) -> i64 {
    (hours * 3_600_000.0).round() as i64
}
