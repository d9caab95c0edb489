//! Unified SQL EventDriver implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::events::EventTypes;

use super::SqlDatabase;

/// SQL-based implementation of EventDriver.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlDriver<DB: SqlDatabase> {
    pool: DB::Pool,
    types: Arc<EventTypes>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlDriver<DB> {
    /// Create a new SQL driver over the given pool.
    pub fn new(pool: DB::Pool, types: Arc<EventTypes>) -> Self {
        Self {
            pool,
            types,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }

    /// Event types records are resolved against on read.
    pub fn types(&self) -> &Arc<EventTypes> {
        &self.types
    }
}

/// Macro to implement EventDriver for a specific SQL backend.
///
/// `$conn` and `$row` are the backend's connection and row types.
macro_rules! impl_sql_driver {
    ($db_type:ty, $conn:ty, $row:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlDriver<$db_type> {
            /// Create the event table and its indexes if missing.
            pub async fn init(&self) -> crate::storage::Result<()> {
                for statement in <$db_type as SqlDatabase>::SCHEMA {
                    sqlx::query(*statement).execute(&self.pool).await?;
                }
                tracing::info!(
                    backend = <$db_type as SqlDatabase>::NAME,
                    "Event store schema initialized"
                );
                Ok(())
            }

            /// Next version of `stream_name`: highest stored version + 1, or 0.
            async fn next_version(
                conn: &mut $conn,
                stream_name: &str,
            ) -> crate::storage::Result<u64> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::storage::schema::SysEventStore;

                // sea-query values are not Send; render before awaiting.
                let sql = {
                    let stmt = Query::select()
                        .column(SysEventStore::EventVersion)
                        .from(SysEventStore::Table)
                        .and_where(Expr::col(SysEventStore::EventStream).eq(stream_name))
                        .order_by(SysEventStore::EventVersion, Order::Desc)
                        .limit(1)
                        .to_owned();
                    <$db_type>::build_select(stmt)
                };
                let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;

                match row {
                    Some(row) => {
                        let version: i64 = row.try_get(0)?;
                        Ok(version as u64 + 1)
                    }
                    None => Ok(0),
                }
            }

            /// Insert `record`, omitting absent optional columns.
            async fn insert(
                conn: &mut $conn,
                record: &crate::storage::RawEvent,
            ) -> crate::storage::Result<()> {
                use sea_query::{Query, SimpleExpr};

                use crate::storage::schema::SysEventStore;

                let sql = {
                    let mut columns = vec![
                        SysEventStore::EventStream,
                        SysEventStore::EventId,
                        SysEventStore::EventName,
                        SysEventStore::EventDate,
                        SysEventStore::EventVersion,
                    ];
                    let mut values: Vec<SimpleExpr> = vec![
                        record.event_stream.as_str().into(),
                        record.event_id.as_str().into(),
                        record.event_name.as_str().into(),
                        record.event_date.as_str().into(),
                        (record.event_version as i64).into(),
                    ];
                    let optional = [
                        (SysEventStore::EventCategories, &record.event_categories),
                        (SysEventStore::AggregateId, &record.aggregate_id),
                        (SysEventStore::Data, &record.data),
                        (SysEventStore::Metadata, &record.metadata),
                    ];
                    for (column, value) in optional {
                        if let Some(value) = value {
                            columns.push(column);
                            values.push(value.as_str().into());
                        }
                    }

                    let stmt = Query::insert()
                        .into_table(SysEventStore::Table)
                        .columns(columns)
                        .values_panic(values)
                        .to_owned();

                    <$db_type>::build_insert(stmt)
                };
                sqlx::query(&sql)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| super::classify_error(e, record))?;
                Ok(())
            }

            /// Assign the version and insert, inside an open transaction.
            async fn append(
                conn: &mut $conn,
                record: &mut crate::storage::RawEvent,
            ) -> crate::storage::Result<u64> {
                record.event_version = Self::next_version(conn, &record.event_stream).await?;
                Self::insert(conn, record).await?;
                Ok(record.event_version)
            }

            fn decode_row(row: &$row) -> crate::storage::Result<crate::storage::RawEvent> {
                use sqlx::Row;

                let event_version: i64 = row.try_get("event_version")?;
                Ok(crate::storage::RawEvent {
                    event_stream: row.try_get("event_stream")?,
                    event_categories: row.try_get("event_categories")?,
                    event_id: row.try_get("event_id")?,
                    event_name: row.try_get("event_name")?,
                    event_date: row.try_get("event_date")?,
                    aggregate_id: row.try_get("aggregate_id")?,
                    data: row.try_get("data")?,
                    metadata: row.try_get("metadata")?,
                    event_version: event_version as u64,
                })
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::EventDriver for SqlDriver<$db_type> {
            async fn attach(
                &self,
                stream_name: &str,
                event: &dyn crate::events::StorableEvent,
                categories: &[String],
            ) -> crate::storage::Result<Option<u64>> {
                let mut record = crate::storage::RawEvent::prepare(stream_name, event, categories)?;

                let mut conn = self.pool.acquire().await?;
                sqlx::query(<$db_type as SqlDatabase>::BEGIN)
                    .execute(&mut *conn)
                    .await?;

                let result = match Self::append(&mut conn, &mut record).await {
                    Ok(version) => sqlx::query("COMMIT")
                        .execute(&mut *conn)
                        .await
                        .map(|_| version)
                        .map_err(|e| super::classify_error(e, &record)),
                    Err(e) => Err(e),
                };

                match result {
                    Ok(version) => {
                        tracing::debug!(
                            stream = %stream_name,
                            event_id = %record.event_id,
                            version,
                            "Event attached"
                        );
                        Ok(Some(version))
                    }
                    Err(e) => {
                        tracing::error!(
                            stream = %stream_name,
                            event_id = %record.event_id,
                            error = %e,
                            "Append failed, rolling back"
                        );
                        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                        Err(e)
                    }
                }
            }

            async fn stream(
                &self,
                selector: &crate::selector::Selector,
            ) -> crate::storage::Result<crate::storage::EventStream> {
                use futures::StreamExt;
                use tokio::sync::mpsc;
                use tokio_stream::wrappers::ReceiverStream;

                use crate::storage::stream::STREAM_BUFFER;
                use crate::storage::{check_selection, EventStream, StorageError};

                check_selection(selector)?;

                let sql = <$db_type>::build_select(super::predicates::build_stream_query(
                    selector,
                    &self.types,
                ));
                tracing::debug!(selector = %selector, "Reading events");

                // The task owns the row cursor; it stops as soon as the
                // receiving EventStream is dropped.
                let (tx, rx) = mpsc::channel(STREAM_BUFFER);
                let pool = self.pool.clone();
                tokio::spawn(async move {
                    let mut rows = sqlx::query(&sql).fetch(&pool);
                    while let Some(row) = rows.next().await {
                        let item = row
                            .map_err(StorageError::from)
                            .and_then(|row| Self::decode_row(&row));
                        let failed = item.is_err();
                        if tx.send(item).await.is_err() || failed {
                            break;
                        }
                    }
                });

                let cursor = ReceiverStream::new(rx).boxed();
                EventStream::open(selector.to_string(), cursor, self.types.clone()).await
            }

            async fn is_available(&self) -> bool {
                sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_sql_driver!(
    super::postgres::Postgres,
    sqlx::PgConnection,
    sqlx::postgres::PgRow,
    "postgres"
);
impl_sql_driver!(
    super::sqlite::Sqlite,
    sqlx::SqliteConnection,
    sqlx::sqlite::SqliteRow,
    "sqlite"
);
