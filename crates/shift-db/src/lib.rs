//! Storage layer for Shift.
//!
//! Provides persistence for users, clock events and the admin audit log
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering. Values are truncated to milliseconds before they
//! are written, so an event read back compares equal to the one returned on
//! insert.
//!
//! ## Append-only Events
//!
//! `time_events` rows are never updated or deleted. Recording a clock event
//! reads the latest row and inserts the next one inside a single
//! `BEGIN IMMEDIATE` transaction, so two concurrent writers for the same
//! user cannot both pass validation against the same latest event.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use serde::Serialize;
use serde_json::Value;
use shift_core::{
    ClockError, ClockEventType, ClockState, EventStore, Identity, NewEventMetadata, Role,
    TimeEvent,
};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp in {table} row {id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored enum column holds an unknown value.
    #[error("invalid {column} in {table} row {id}: {value}")]
    InvalidValue {
        table: &'static str,
        column: &'static str,
        id: i64,
        value: String,
    },
    /// A JSON column could not be encoded or decoded.
    #[error("invalid JSON in {table}.{column}: {source}")]
    Json {
        table: &'static str,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// No user with the given id.
    #[error("user {0} not found")]
    UserNotFound(i64),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A clock event joined with the user who recorded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminEvent {
    #[serde(flatten)]
    pub event: TimeEvent,
    pub user_name: String,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

/// Current clock state of one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStatus {
    pub user_id: i64,
    pub name: String,
    pub status: ClockState,
    pub latest_event: Option<TimeEvent>,
}

/// Filter for admin event queries. Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub user_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Admin actions that leave an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    ViewAllEvents,
    ExportRecords,
    SetUserActive,
}

impl AuditAction {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ViewAllEvents => "view_all_events",
            Self::ExportRecords => "export_records",
            Self::SetUserActive => "set_user_active",
        }
    }
}

/// One audit log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub admin_user_id: i64,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'worker' CHECK (role IN ('worker', 'admin')),
                domain_id TEXT,
                domain_name TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            -- Append-only clock log
            -- ts: RFC 3339 UTC with milliseconds (e.g., '2024-01-15T10:30:00.000Z')
            -- meta: optional JSON supplied by the caller
            CREATE TABLE IF NOT EXISTS time_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                event_type TEXT NOT NULL
                    CHECK (event_type IN ('in', 'out', 'pause_start', 'pause_end')),
                ts TEXT NOT NULL,
                source TEXT NOT NULL,
                ip TEXT,
                user_agent TEXT,
                meta TEXT,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_time_events_user_ts ON time_events(user_id, ts);
            CREATE INDEX IF NOT EXISTS idx_time_events_ts ON time_events(ts);

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_user_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                target_user_id INTEGER,
                details TEXT,
                ip TEXT,
                ts TEXT NOT NULL,
                FOREIGN KEY (admin_user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_ts ON audit_log(ts);
            ",
        )?;
        Ok(())
    }

    // ========== Users ==========

    /// Creates a user from a resolved identity.
    pub fn create_user(&mut self, identity: &Identity) -> Result<User, DbError> {
        let created_at = format_timestamp(Utc::now());
        self.conn.execute(
            "
            INSERT INTO users (email, name, role, domain_id, domain_name, active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            ",
            params![
                identity.email,
                identity.name,
                identity.role.as_str(),
                identity.domain_id,
                identity.domain_name,
                created_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(user_id = id, email = %identity.email, "created user");
        self.get_user(id)?.ok_or(DbError::UserNotFound(id))
    }

    /// Looks up a user by id.
    pub fn get_user(&self, id: i64) -> Result<Option<User>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [id],
                UserRow::from_row,
            )
            .optional()?;
        row.map(UserRow::into_user).transpose()
    }

    /// Looks up a user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
                [email],
                UserRow::from_row,
            )
            .optional()?;
        row.map(UserRow::into_user).transpose()
    }

    /// Finds the user for an identity, creating it on first sight.
    pub fn get_or_create_user(&mut self, identity: &Identity) -> Result<User, DbError> {
        match self.get_user_by_email(&identity.email)? {
            Some(user) => Ok(user),
            None => self.create_user(identity),
        }
    }

    /// Lists users ordered by ID.
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))?;
        let rows = stmt.query_map([], UserRow::from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?.into_user()?);
        }
        Ok(users)
    }

    /// Enables or disables a user.
    pub fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), DbError> {
        let updated = self
            .conn
            .execute("UPDATE users SET active = ? WHERE id = ?", params![active, id])?;
        if updated == 0 {
            return Err(DbError::UserNotFound(id));
        }
        Ok(())
    }

    // ========== Clock events ==========

    /// Validates and appends a clock event in one immediate transaction.
    pub fn record_clock_event(
        &mut self,
        user_id: i64,
        requested: ClockEventType,
        metadata: &NewEventMetadata,
        now: DateTime<Utc>,
    ) -> Result<TimeEvent, ClockError<DbError>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ClockError::Store(e.into()))?;
        let event = {
            let mut store = ConnectionStore { conn: &tx };
            shift_core::record_clock_event(&mut store, user_id, requested, metadata, now)?
        };
        tx.commit().map_err(|e| ClockError::Store(e.into()))?;
        Ok(event)
    }

    /// Lists events across users, newest first.
    pub fn list_all_events(&self, filter: &EventFilter) -> Result<Vec<AdminEvent>, DbError> {
        let mut sql = format!(
            "
            SELECT {EVENT_COLUMNS_QUALIFIED}, u.name, u.email, u.domain_id, u.domain_name
            FROM time_events te
            JOIN users u ON te.user_id = u.id
            WHERE 1 = 1
            "
        );
        let mut values: Vec<SqlValue> = Vec::new();
        if let Some(user_id) = filter.user_id {
            sql.push_str(" AND te.user_id = ?");
            values.push(SqlValue::Integer(user_id));
        }
        if let Some(from) = filter.from {
            sql.push_str(" AND te.ts >= ?");
            values.push(SqlValue::Text(format_timestamp(from)));
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND te.ts <= ?");
            values.push(SqlValue::Text(format_timestamp(to)));
        }
        sql.push_str(" ORDER BY te.ts DESC, te.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                EventRow::from_row(row)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<String>>(11)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (event, user_name, user_email, domain_id, domain_name) = row?;
            events.push(AdminEvent {
                event: event.into_event()?,
                user_name,
                user_email,
                domain_id,
                domain_name,
            });
        }
        Ok(events)
    }

    /// Current clock state of every user, ordered by user ID.
    pub fn user_statuses(&self) -> Result<Vec<UserStatus>, DbError> {
        let users = self.list_users()?;
        let mut statuses = Vec::with_capacity(users.len());
        for user in users {
            let latest_event = latest_event(&self.conn, user.id)?;
            statuses.push(UserStatus {
                user_id: user.id,
                name: user.name,
                status: ClockState::from_latest(latest_event.as_ref().map(|e| e.event_type)),
                latest_event,
            });
        }
        Ok(statuses)
    }

    // ========== Audit log ==========

    /// Records an admin action.
    pub fn record_audit(
        &mut self,
        admin_user_id: i64,
        action: AuditAction,
        target_user_id: Option<i64>,
        details: Option<&Value>,
        ip: Option<&str>,
    ) -> Result<i64, DbError> {
        let details = details
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| DbError::Json {
                table: "audit_log",
                column: "details",
                source,
            })?;
        self.conn.execute(
            "
            INSERT INTO audit_log (admin_user_id, action, target_user_id, details, ip, ts)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                admin_user_id,
                action.as_str(),
                target_user_id,
                details,
                ip,
                format_timestamp(Utc::now()),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(
            audit_id = id,
            admin_user_id,
            action = action.as_str(),
            "recorded audit entry"
        );
        Ok(id)
    }

    /// Lists the most recent audit entries, newest first.
    pub fn list_audit_log(&self, limit: usize) -> Result<Vec<AuditLogEntry>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, admin_user_id, action, target_user_id, details, ip, ts
            FROM audit_log
            ORDER BY ts DESC, id DESC
            LIMIT ?
            ",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (id, admin_user_id, action, target_user_id, details, ip, ts) = row?;
            entries.push(AuditLogEntry {
                id,
                admin_user_id,
                action,
                target_user_id,
                details: parse_json(details.as_deref(), "audit_log", "details")?,
                ip,
                timestamp: parse_timestamp(&ts, "audit_log", id)?,
            });
        }
        Ok(entries)
    }
}

impl EventStore for Database {
    type Error = DbError;

    fn latest_event_for_user(&self, user_id: i64) -> Result<Option<TimeEvent>, DbError> {
        latest_event(&self.conn, user_id)
    }

    fn list_events_for_user(
        &self,
        user_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEvent>, DbError> {
        events_for_user(&self.conn, user_id, from, to)
    }

    fn append_event(
        &mut self,
        user_id: i64,
        event_type: ClockEventType,
        timestamp: DateTime<Utc>,
        metadata: &NewEventMetadata,
    ) -> Result<TimeEvent, DbError> {
        insert_event(&self.conn, user_id, event_type, timestamp, metadata)
    }
}

/// [`EventStore`] over a borrowed connection, used inside transactions.
struct ConnectionStore<'a> {
    conn: &'a Connection,
}

impl EventStore for ConnectionStore<'_> {
    type Error = DbError;

    fn latest_event_for_user(&self, user_id: i64) -> Result<Option<TimeEvent>, DbError> {
        latest_event(self.conn, user_id)
    }

    fn list_events_for_user(
        &self,
        user_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEvent>, DbError> {
        events_for_user(self.conn, user_id, from, to)
    }

    fn append_event(
        &mut self,
        user_id: i64,
        event_type: ClockEventType,
        timestamp: DateTime<Utc>,
        metadata: &NewEventMetadata,
    ) -> Result<TimeEvent, DbError> {
        insert_event(self.conn, user_id, event_type, timestamp, metadata)
    }
}

const USER_COLUMNS: &str = "id, email, name, role, domain_id, domain_name, active, created_at";
const EVENT_COLUMNS: &str = "id, user_id, event_type, ts, source, ip, user_agent, meta";
const EVENT_COLUMNS_QUALIFIED: &str =
    "te.id, te.user_id, te.event_type, te.ts, te.source, te.ip, te.user_agent, te.meta";

fn latest_event(conn: &Connection, user_id: i64) -> Result<Option<TimeEvent>, DbError> {
    let row = conn
        .query_row(
            &format!(
                "
                SELECT {EVENT_COLUMNS} FROM time_events
                WHERE user_id = ?
                ORDER BY ts DESC, id DESC
                LIMIT 1
                "
            ),
            [user_id],
            EventRow::from_row,
        )
        .optional()?;
    row.map(EventRow::into_event).transpose()
}

fn events_for_user(
    conn: &Connection,
    user_id: i64,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<TimeEvent>, DbError> {
    let mut sql = format!("SELECT {EVENT_COLUMNS} FROM time_events WHERE user_id = ?");
    let mut values = vec![SqlValue::Integer(user_id)];
    if let Some(from) = from {
        sql.push_str(" AND ts >= ?");
        values.push(SqlValue::Text(format_timestamp(from)));
    }
    if let Some(to) = to {
        sql.push_str(" AND ts <= ?");
        values.push(SqlValue::Text(format_timestamp(to)));
    }
    sql.push_str(" ORDER BY ts ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), EventRow::from_row)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }
    Ok(events)
}

fn insert_event(
    conn: &Connection,
    user_id: i64,
    event_type: ClockEventType,
    timestamp: DateTime<Utc>,
    metadata: &NewEventMetadata,
) -> Result<TimeEvent, DbError> {
    let timestamp = timestamp.trunc_subsecs(3);
    let meta = metadata
        .meta
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|source| DbError::Json {
            table: "time_events",
            column: "meta",
            source,
        })?;
    conn.execute(
        "
        INSERT INTO time_events (user_id, event_type, ts, source, ip, user_agent, meta)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            user_id,
            event_type.as_str(),
            format_timestamp(timestamp),
            metadata.source.as_str(),
            metadata.ip,
            metadata.user_agent,
            meta,
        ],
    )?;
    Ok(TimeEvent {
        id: conn.last_insert_rowid(),
        user_id,
        event_type,
        timestamp,
        source: metadata.source,
        ip: metadata.ip.clone(),
        user_agent: metadata.user_agent.clone(),
        meta: metadata.meta.clone(),
    })
}

/// Raw `time_events` columns before enum and timestamp parsing.
struct EventRow {
    id: i64,
    user_id: i64,
    event_type: String,
    ts: String,
    source: String,
    ip: Option<String>,
    user_agent: Option<String>,
    meta: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            event_type: row.get(2)?,
            ts: row.get(3)?,
            source: row.get(4)?,
            ip: row.get(5)?,
            user_agent: row.get(6)?,
            meta: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<TimeEvent, DbError> {
        let invalid = |column: &'static str, value: String| DbError::InvalidValue {
            table: "time_events",
            column,
            id: self.id,
            value,
        };
        Ok(TimeEvent {
            id: self.id,
            user_id: self.user_id,
            event_type: self
                .event_type
                .parse()
                .map_err(|_| invalid("event_type", self.event_type.clone()))?,
            timestamp: parse_timestamp(&self.ts, "time_events", self.id)?,
            source: self
                .source
                .parse()
                .map_err(|_| invalid("source", self.source.clone()))?,
            meta: parse_json(self.meta.as_deref(), "time_events", "meta")?,
            ip: self.ip,
            user_agent: self.user_agent,
        })
    }
}

/// Raw `users` columns.
struct UserRow {
    id: i64,
    email: String,
    name: String,
    role: String,
    domain_id: Option<String>,
    domain_name: Option<String>,
    active: bool,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: row.get(3)?,
            domain_id: row.get(4)?,
            domain_name: row.get(5)?,
            active: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_user(self) -> Result<User, DbError> {
        let role = self.role.parse().map_err(|_| DbError::InvalidValue {
            table: "users",
            column: "role",
            id: self.id,
            value: self.role.clone(),
        })?;
        Ok(User {
            created_at: parse_timestamp(&self.created_at, "users", self.id)?,
            id: self.id,
            email: self.email,
            name: self.name,
            role,
            domain_id: self.domain_id,
            domain_name: self.domain_name,
            active: self.active,
        })
    }
}

fn parse_timestamp(
    timestamp: &str,
    table: &'static str,
    id: i64,
) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_json(
    raw: Option<&str>,
    table: &'static str,
    column: &'static str,
) -> Result<Option<Value>, DbError> {
    raw.map(serde_json::from_str)
        .transpose()
        .map_err(|source| DbError::Json {
            table,
            column,
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
