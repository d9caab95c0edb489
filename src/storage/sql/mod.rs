//! Unified SQL storage implementation.
//!
//! One event driver shared by the SQL backends (PostgreSQL, SQLite),
//! parameterized by database type through the `SqlDatabase` trait.

mod event_driver;
pub mod predicates;
mod query;

pub use event_driver::SqlDriver;
pub use query::SqlDatabase;

use crate::storage::schema::UQ_STREAM_VERSION;
use crate::storage::{RawEvent, StorageError};

/// Map an insert failure onto the uniqueness conflict it represents.
///
/// A clash on `(event_stream, event_version)` means a concurrent appender
/// took the version; a clash on `event_id` means the event was stored before.
pub(crate) fn classify_error(err: sqlx::Error, record: &RawEvent) -> StorageError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let detail = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());
            if detail.contains(UQ_STREAM_VERSION) || detail.contains("event_version") {
                return StorageError::VersionConflict {
                    stream: record.event_stream.clone(),
                    version: record.event_version,
                };
            }
            return StorageError::DuplicateEvent {
                event_id: record.event_id.clone(),
            };
        }
    }
    StorageError::Database(err)
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;

    use crate::storage::schema::CREATE_POSTGRES_SCHEMA;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        const NAME: &'static str = "postgres";
        const BEGIN: &'static str = "BEGIN";
        const SCHEMA: &'static [&'static str] = CREATE_POSTGRES_SCHEMA;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL event driver.
    pub type PostgresDriver = super::SqlDriver<Postgres>;

    /// Open a connection pool.
    pub async fn connect(uri: &str, max_connections: u32) -> crate::storage::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(uri)
            .await?;
        Ok(pool)
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use std::str::FromStr;

    use sea_query::SqliteQueryBuilder;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;

    use crate::storage::schema::CREATE_SQLITE_SCHEMA;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        const NAME: &'static str = "sqlite";
        // Takes the write lock upfront so concurrent appenders queue on the
        // busy timeout instead of deadlocking on a shared-to-exclusive upgrade.
        const BEGIN: &'static str = "BEGIN IMMEDIATE";
        const SCHEMA: &'static [&'static str] = CREATE_SQLITE_SCHEMA;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }
    }

    /// SQLite event driver.
    pub type SqliteDriver = super::SqlDriver<Sqlite>;

    /// Open a connection pool, creating the database file if needed.
    ///
    /// LIKE is made case-sensitive on every connection so prefix reads
    /// agree with equality reads.
    pub async fn connect(url: &str, max_connections: u32) -> crate::storage::Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA case_sensitive_like = ON")
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;
        Ok(pool)
    }
}
