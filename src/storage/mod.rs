//! Storage drivers.
//!
//! A driver appends events under per-stream versioning and reads them back
//! through a lazily reconstituting [`EventStream`]. Implementations:
//! - `SqlDriver`: SQLite / PostgreSQL via sqlx and sea-query
//! - `MemoryDriver`: in-process storage with the same semantics
//! - `NullDriver`: accepts everything, stores nothing

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::events::{EventTypes, StorableEvent};
use crate::selector::{Selector, SelectorError};

pub mod memory;
pub mod null;
pub mod record;
pub mod schema;
pub mod sql;
pub mod stream;

pub use memory::MemoryDriver;
pub use null::NullDriver;
pub use record::RawEvent;
pub use sql::SqlDriver;
pub use stream::{EventStream, RecordCursor};

#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresDriver;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteDriver;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Event \"{event_type}\" cannot be stored")]
    Unstorable { event_type: String },

    #[error("Invalid literal: {0}")]
    InvalidLiteral(#[from] SelectorError),

    #[error("Version conflict: stream={stream}, version={version}")]
    VersionConflict { stream: String, version: u64 },

    #[error("Duplicate event id: {event_id}")]
    DuplicateEvent { event_id: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage type not enabled: {0}")]
    NotEnabled(String),
}

/// Backend-specific append / read / availability contract.
#[async_trait]
pub trait EventDriver: Send + Sync {
    /// Append an event to `stream_name`.
    ///
    /// Returns the version assigned within the stream: 0 for the first event,
    /// then strictly increasing without gaps. Drivers that do not persist
    /// return `None`.
    async fn attach(
        &self,
        stream_name: &str,
        event: &dyn StorableEvent,
        categories: &[String],
    ) -> Result<Option<u64>>;

    /// Read every stored event admitted by `selector`.
    async fn stream(&self, selector: &Selector) -> Result<EventStream>;

    /// Lightweight connectivity probe for health checks.
    async fn is_available(&self) -> bool;
}

/// Reject selectors that give the read path nothing to filter on.
///
/// `*` reads everything; otherwise a stream name or at least one category
/// is required. Relative selectors must be resolved with
/// [`Selector::to_absolute`] first.
pub fn check_selection(selector: &Selector) -> Result<()> {
    if selector.is_all() {
        return Ok(());
    }
    if selector.is_relative() {
        return Err(StorageError::InvalidSelection(format!(
            "relative selector {} must be made absolute before reading",
            selector
        )));
    }
    if selector.stream_name().is_empty() && selector.categories().is_empty() {
        return Err(StorageError::InvalidSelection(format!(
            "selector {} names neither a stream nor a category",
            selector
        )));
    }
    Ok(())
}

/// Initialize the configured driver.
pub async fn init_driver(
    config: &StorageConfig,
    types: Arc<EventTypes>,
) -> Result<Arc<dyn EventDriver>> {
    info!(storage_type = ?config.storage_type, "Initializing storage driver");

    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!(
                        "cannot create directory for {}: {}",
                        config.sqlite.path, e
                    ))
                })?;
            }
            let pool = sql::sqlite::connect(
                &format!("sqlite:{}", config.sqlite.path),
                config.max_connections,
            )
            .await?;
            let driver = SqliteDriver::new(pool, types);
            driver.init().await?;
            Ok(Arc::new(driver))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            let pool = sql::postgres::connect(&config.postgres.uri, config.max_connections).await?;
            let driver = PostgresDriver::new(pool, types);
            driver.init().await?;
            Ok(Arc::new(driver))
        }
        StorageType::Memory => Ok(Arc::new(MemoryDriver::new(types))),
        StorageType::Null => Ok(Arc::new(NullDriver::new())),
        #[allow(unreachable_patterns)]
        other => {
            error!(storage_type = ?other, "Storage type requested but its feature is not enabled");
            Err(StorageError::NotEnabled(format!("{:?}", other)))
        }
    }
}
