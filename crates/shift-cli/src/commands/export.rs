//! Export command: every worker's clock events as CSV or JSON.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::json;
use shift_core::{ClockEventType, EventSource};
use shift_db::{AdminEvent, AuditAction, Database, EventFilter, User};

use crate::{ExportFormat, Locale};

/// Byte order mark so spreadsheet tools pick UTF-8 for accented names.
const UTF8_BOM: &str = "\u{feff}";

/// One exported event, flattened with its worker.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    worker_name: &'a str,
    worker_email: &'a str,
    event_type: ClockEventType,
    ts: String,
    source: EventSource,
    ip: Option<&'a str>,
    user_agent: Option<&'a str>,
}

impl<'a> From<&'a AdminEvent> for ExportRow<'a> {
    fn from(row: &'a AdminEvent) -> Self {
        Self {
            worker_name: &row.user_name,
            worker_email: &row.user_email,
            event_type: row.event.event_type,
            ts: row
                .event
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            source: row.event.source,
            ip: row.event.ip.as_deref(),
            user_agent: row.event.user_agent.as_deref(),
        }
    }
}

/// Writes the events matching `filter` and returns how many were exported.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    admin: &User,
    filter: &EventFilter,
    format: ExportFormat,
    locale: Locale,
) -> Result<usize> {
    db.record_audit(
        admin.id,
        AuditAction::ExportRecords,
        filter.user_id,
        Some(&json!({
            "from": filter.from,
            "to": filter.to,
            "format": format.as_str(),
        })),
        None,
    )
    .context("failed to write audit log")?;

    let events = db.list_all_events(filter)?;
    let rows: Vec<ExportRow<'_>> = events.iter().map(ExportRow::from).collect();

    match format {
        ExportFormat::Csv => write_csv(writer, &rows, locale)?,
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, &rows)?;
            writeln!(writer)?;
        }
    }

    tracing::info!(count = rows.len(), format = format.as_str(), "exported events");
    Ok(rows.len())
}

fn write_csv<W: Write>(writer: &mut W, rows: &[ExportRow<'_>], locale: Locale) -> Result<()> {
    if rows.is_empty() {
        writeln!(writer, "{}", locale.no_data())?;
        return Ok(());
    }

    write!(writer, "{UTF8_BOM}")?;
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(&mut *writer);
    wtr.write_record(locale.export_headers())?;
    for row in rows {
        wtr.write_record([
            row.worker_name,
            row.worker_email,
            locale.event_label(row.event_type),
            row.ts.as_str(),
            row.source.as_str(),
            row.ip.unwrap_or(""),
            row.user_agent.unwrap_or(""),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
