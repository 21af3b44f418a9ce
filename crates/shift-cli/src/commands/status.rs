//! Status command for showing the caller's current clock state.

use std::io::Write;

use anyhow::Result;
use chrono::SecondsFormat;
use serde::Serialize;
use shift_core::{ClockEventType, ClockState, EventStore, TimeEvent};
use shift_db::{Database, User};

use crate::Locale;

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    status: ClockState,
    next_actions: &'a [ClockEventType],
    latest_event: Option<&'a TimeEvent>,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    locale: Locale,
    json: bool,
) -> Result<()> {
    let latest = db.latest_event_for_user(user.id)?;
    let state = ClockState::from_latest(latest.as_ref().map(|e| e.event_type));

    if json {
        let output = StatusOutput {
            status: state,
            next_actions: state.allowed_events(),
            latest_event: latest.as_ref(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    writeln!(writer, "Status: {}", locale.status_label(state))?;
    let next: Vec<&str> = state
        .allowed_events()
        .iter()
        .map(ClockEventType::as_str)
        .collect();
    writeln!(writer, "Next:   {}", next.join(", "))?;
    match latest {
        Some(event) => writeln!(
            writer,
            "Last:   {} at {}",
            locale.event_label(event.event_type),
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?,
        None => writeln!(writer, "Last:   -")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use shift_core::{Identity, NewEventMetadata, Role};

    use insta::assert_snapshot;

    fn setup() -> (Database, User) {
        let mut db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(&Identity {
                email: "ana@example.com".to_string(),
                name: "Ana".to_string(),
                role: Role::Worker,
                domain_id: None,
                domain_name: None,
            })
            .unwrap();
        (db, user)
    }

    #[test]
    fn fresh_user_is_clocked_out() {
        let (db, user) = setup();
        let mut output = Vec::new();

        run(&mut output, &db, &user, Locale::En, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Status: Clocked Out
        Next:   in
        Last:   -
        ");
    }

    #[test]
    fn on_break_in_spanish() {
        let (mut db, user) = setup();
        let meta = NewEventMetadata::default();
        for (event_type, ts) in [
            (ClockEventType::In, "2024-01-01T09:00:00Z"),
            (ClockEventType::PauseStart, "2024-01-01T12:00:00Z"),
        ] {
            db.record_clock_event(user.id, event_type, &meta, ts.parse().unwrap())
                .unwrap();
        }
        let mut output = Vec::new();

        run(&mut output, &db, &user, Locale::Es, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Status: En Pausa
        Next:   pause_end
        Last:   Inicio Pausa at 2024-01-01T12:00:00Z
        ");
    }

    #[test]
    fn json_lists_next_actions() {
        let (mut db, user) = setup();
        db.record_clock_event(
            user.id,
            ClockEventType::In,
            &NewEventMetadata::default(),
            "2024-01-01T09:00:00Z".parse().unwrap(),
        )
        .unwrap();
        let mut output = Vec::new();

        run(&mut output, &db, &user, Locale::En, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["status"], "clocked_in");
        assert_eq!(value["next_actions"], serde_json::json!(["out", "pause_start"]));
        assert_eq!(value["latest_event"]["event_type"], "in");
    }
}
