//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Name of the unique constraint on `(event_stream, event_version)`.
pub const UQ_STREAM_VERSION: &str = "uq_event_stream_version";
/// Name of the unique constraint on `event_id`.
pub const UQ_EVENT_ID: &str = "uq_event_id";

/// Event store table schema.
#[derive(Iden, Clone, Copy)]
pub enum SysEventStore {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "event_stream"]
    EventStream,
    #[iden = "event_categories"]
    EventCategories,
    #[iden = "event_id"]
    EventId,
    #[iden = "event_name"]
    EventName,
    #[iden = "event_date"]
    EventDate,
    #[iden = "aggregate_id"]
    AggregateId,
    #[iden = "data"]
    Data,
    #[iden = "metadata"]
    Metadata,
    #[iden = "event_version"]
    EventVersion,
}

/// Columns selected when reading events back.
pub const RECORD_COLUMNS: [SysEventStore; 9] = [
    SysEventStore::EventStream,
    SysEventStore::EventCategories,
    SysEventStore::EventId,
    SysEventStore::EventName,
    SysEventStore::EventDate,
    SysEventStore::AggregateId,
    SysEventStore::Data,
    SysEventStore::Metadata,
    SysEventStore::EventVersion,
];

/// SQLite DDL, one statement per entry.
pub const CREATE_SQLITE_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS sys_event_store (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_stream TEXT NOT NULL,
    event_categories TEXT,
    event_id TEXT NOT NULL,
    event_name TEXT NOT NULL,
    event_date TEXT NOT NULL,
    aggregate_id TEXT,
    data TEXT,
    metadata TEXT,
    event_version INTEGER NOT NULL,
    CONSTRAINT uq_event_stream_version UNIQUE (event_stream, event_version),
    CONSTRAINT uq_event_id UNIQUE (event_id)
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_sys_event_store_categories ON sys_event_store(event_categories)",
];

/// PostgreSQL DDL, one statement per entry.
pub const CREATE_POSTGRES_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS sys_event_store (
    id BIGSERIAL PRIMARY KEY,
    event_stream TEXT NOT NULL,
    event_categories TEXT,
    event_id TEXT NOT NULL,
    event_name TEXT NOT NULL,
    event_date TEXT NOT NULL,
    aggregate_id TEXT,
    data TEXT,
    metadata TEXT,
    event_version BIGINT NOT NULL,
    CONSTRAINT uq_event_stream_version UNIQUE (event_stream, event_version),
    CONSTRAINT uq_event_id UNIQUE (event_id)
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_sys_event_store_categories ON sys_event_store(event_categories)",
];
