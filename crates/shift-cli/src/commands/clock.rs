//! Clock command: records in/out/break events for the calling user.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use shift_core::{ClockEventType, EventSource, NewEventMetadata};
use shift_db::{Database, User};

/// Builds event metadata from command-line options.
pub fn metadata(
    source: EventSource,
    ip: Option<String>,
    user_agent: Option<String>,
    meta: Option<&str>,
) -> Result<NewEventMetadata> {
    let meta = meta
        .map(serde_json::from_str)
        .transpose()
        .context("invalid --meta JSON")?;
    Ok(NewEventMetadata {
        source,
        ip,
        user_agent,
        meta,
    })
}

/// Records `action` at `now`; rejected transitions surface as errors.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &User,
    action: ClockEventType,
    metadata: &NewEventMetadata,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let event = db.record_clock_event(user.id, action, metadata, now)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string(&event)?)?;
    } else {
        writeln!(
            writer,
            "{} at {}",
            done_message(action),
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
    }
    Ok(())
}

const fn done_message(action: ClockEventType) -> &'static str {
    match action {
        ClockEventType::In => "Clocked in",
        ClockEventType::Out => "Clocked out",
        ClockEventType::PauseStart => "Break started",
        ClockEventType::PauseEnd => "Break ended",
    }
}
