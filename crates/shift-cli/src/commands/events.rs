//! Events command: the caller's clock events as JSONL, newest first.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use shift_core::EventStore;
use shift_db::{Database, User};

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let events = db.list_events_for_user(user.id, from, to)?;

    for event in events.iter().rev() {
        writeln!(writer, "{}", serde_json::to_string(event)?)?;
    }

    Ok(())
}
