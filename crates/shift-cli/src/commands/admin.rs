//! Admin commands: users, all events, statuses, audit log and activation.
//!
//! Callers are expected to have checked the admin role with
//! [`crate::identity::require_admin`] before dispatching here.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use serde_json::json;
use shift_db::{AuditAction, Database, EventFilter, User};

use crate::Locale;

/// Lists all users.
pub fn users<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let users = db.list_users()?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&users)?)?;
        return Ok(());
    }

    if users.is_empty() {
        writeln!(writer, "No users.")?;
        return Ok(());
    }
    for user in users {
        writeln!(
            writer,
            "{:<4}  {:<6}  {:<8}  {} <{}>",
            user.id,
            user.role.as_str(),
            if user.active { "active" } else { "inactive" },
            user.name,
            user.email
        )?;
    }
    Ok(())
}

/// Lists events across users as JSONL and records the access.
pub fn events<W: Write>(
    writer: &mut W,
    db: &mut Database,
    admin: &User,
    filter: &EventFilter,
) -> Result<()> {
    db.record_audit(
        admin.id,
        AuditAction::ViewAllEvents,
        filter.user_id,
        Some(&json!({ "from": filter.from, "to": filter.to })),
        None,
    )
    .context("failed to write audit log")?;

    let events = db.list_all_events(filter)?;
    for event in &events {
        writeln!(writer, "{}", serde_json::to_string(event)?)?;
    }
    tracing::debug!(count = events.len(), "listed events");
    Ok(())
}

/// Shows every user's current clock state.
pub fn status<W: Write>(writer: &mut W, db: &Database, locale: Locale, json: bool) -> Result<()> {
    let statuses = db.user_statuses()?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&statuses)?)?;
        return Ok(());
    }

    for status in statuses {
        let last = status.latest_event.as_ref().map_or_else(
            || "-".to_string(),
            |event| event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        writeln!(
            writer,
            "{:<4}  {:<12}  {:<20}  {}",
            status.user_id,
            locale.status_label(status.status),
            last,
            status.name
        )?;
    }
    Ok(())
}

/// Shows the most recent audit entries.
pub fn audit<W: Write>(writer: &mut W, db: &Database, limit: usize, json: bool) -> Result<()> {
    let entries = db.list_audit_log(limit)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    for entry in entries {
        let target = entry
            .target_user_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        writeln!(
            writer,
            "{}  admin={}  {}  target={}",
            entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            entry.admin_user_id,
            entry.action,
            target
        )?;
    }
    Ok(())
}

/// Enables or disables a user and records the change.
pub fn set_active<W: Write>(
    writer: &mut W,
    db: &mut Database,
    admin: &User,
    user_id: i64,
    active: bool,
) -> Result<()> {
    db.set_user_active(user_id, active)?;
    db.record_audit(
        admin.id,
        AuditAction::SetUserActive,
        Some(user_id),
        Some(&json!({ "active": active })),
        None,
    )
    .context("failed to write audit log")?;

    let state = if active { "enabled" } else { "disabled" };
    writeln!(writer, "User {user_id} {state}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use shift_core::{ClockEventType, Identity, NewEventMetadata, Role};

    use insta::assert_snapshot;

    fn setup() -> (Database, User, User) {
        let mut db = Database::open_in_memory().unwrap();
        let admin = db
            .create_user(&Identity {
                email: "root@example.com".to_string(),
                name: "Root".to_string(),
                role: Role::Admin,
                domain_id: None,
                domain_name: None,
            })
            .unwrap();
        let worker = db
            .create_user(&Identity {
                email: "ana@example.com".to_string(),
                name: "Ana".to_string(),
                role: Role::Worker,
                domain_id: None,
                domain_name: None,
            })
            .unwrap();
        db.record_clock_event(
            worker.id,
            ClockEventType::In,
            &NewEventMetadata::default(),
            "2024-01-01T09:00:00Z".parse().unwrap(),
        )
        .unwrap();
        (db, admin, worker)
    }

    #[test]
    fn users_table() {
        let (mut db, _admin, worker) = setup();
        db.set_user_active(worker.id, false).unwrap();
        let mut output = Vec::new();

        users(&mut output, &db, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        1     admin   active    Root <root@example.com>
        2     worker  inactive  Ana <ana@example.com>
        ");
    }

    #[test]
    fn status_table() {
        let (db, _admin, _worker) = setup();
        let mut output = Vec::new();

        status(&mut output, &db, Locale::En, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        1     Clocked Out   -                     Root
        2     Clocked In    2024-01-01T09:00:00Z  Ana
        ");
    }

    #[test]
    fn viewing_events_is_audited() {
        let (mut db, admin, worker) = setup();
        let filter = EventFilter {
            user_id: Some(worker.id),
            ..EventFilter::default()
        };
        let mut output = Vec::new();

        events(&mut output, &mut db, &admin, &filter).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r#"{"id":1,"user_id":2,"event_type":"in","ts":"2024-01-01T09:00:00Z","source":"kiosk","user_name":"Ana","user_email":"ana@example.com"}"#);

        let audit = db.list_audit_log(10).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "view_all_events");
        assert_eq!(audit[0].target_user_id, Some(worker.id));
    }

    #[test]
    fn set_active_is_audited() {
        let (mut db, admin, worker) = setup();
        let mut output = Vec::new();

        set_active(&mut output, &mut db, &admin, worker.id, false).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "User 2 disabled\n");
        assert!(!db.get_user(worker.id).unwrap().unwrap().active);
        assert_eq!(db.list_audit_log(1).unwrap()[0].action, "set_user_active");
    }
}
