//! SQL database abstraction trait.

use sea_query::{InsertStatement, SelectStatement};

/// Trait for SQL database backends.
///
/// Abstracts over PostgreSQL and SQLite by providing the pool type, the
/// dialect-specific statements and query building.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync + 'static;

    /// Backend name used in logs.
    const NAME: &'static str;

    /// Statement opening an append transaction.
    const BEGIN: &'static str;

    /// Schema DDL, one statement per entry.
    const SCHEMA: &'static [&'static str];

    /// Build a SQL query string from a sea-query SELECT statement.
    fn build_select(stmt: SelectStatement) -> String;

    /// Build a SQL query string from a sea-query INSERT statement.
    fn build_insert(stmt: InsertStatement) -> String;
}
