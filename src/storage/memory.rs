//! In-memory EventDriver.
//!
//! Same versioning, uniqueness and selection rules as the SQL drivers,
//! evaluated in Rust over a vector of records. Failure toggles let tests
//! exercise error paths of the layers above.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::events::{EventTypes, StorableEvent};
use crate::selector::{comparable_part, has_wildcard, Selector};

use super::{check_selection, EventDriver, EventStream, RawEvent, Result, StorageError};

/// Driver keeping every record in process memory.
pub struct MemoryDriver {
    records: RwLock<Vec<RawEvent>>,
    types: Arc<EventTypes>,
    fail_on_attach: RwLock<bool>,
    fail_on_stream: RwLock<bool>,
}

impl MemoryDriver {
    pub fn new(types: Arc<EventTypes>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            types,
            fail_on_attach: RwLock::new(false),
            fail_on_stream: RwLock::new(false),
        }
    }

    pub async fn set_fail_on_attach(&self, fail: bool) {
        *self.fail_on_attach.write().await = fail;
    }

    pub async fn set_fail_on_stream(&self, fail: bool) {
        *self.fail_on_stream.write().await = fail;
    }

    /// Snapshot of every stored record in insertion order.
    pub async fn records(&self) -> Vec<RawEvent> {
        self.records.read().await.clone()
    }

    fn matches(&self, selector: &Selector, record: &RawEvent) -> bool {
        if selector.is_all() {
            return true;
        }

        let stream_name = selector.stream_name();
        if !stream_name.is_empty() {
            let comparable = comparable_part(stream_name);
            let admitted = if has_wildcard(stream_name) {
                record.event_stream.starts_with(comparable)
            } else {
                record.event_stream == comparable
            };
            if !admitted {
                return false;
            }
        }

        if !selector.categories().is_empty() {
            let stored = record.categories();
            if !selector
                .categories()
                .iter()
                .any(|category| stored.contains(&category.as_str()))
            {
                return false;
            }
        }

        selector.events().is_empty()
            || selector
                .events()
                .iter()
                .any(|event| self.types.is_a(&record.event_name, event))
    }
}

#[async_trait]
impl EventDriver for MemoryDriver {
    async fn attach(
        &self,
        stream_name: &str,
        event: &dyn StorableEvent,
        categories: &[String],
    ) -> Result<Option<u64>> {
        if *self.fail_on_attach.read().await {
            return Err(StorageError::Unavailable(
                "memory driver configured to fail on attach".to_string(),
            ));
        }

        let mut record = RawEvent::prepare(stream_name, event, categories)?;

        let mut records = self.records.write().await;
        if records.iter().any(|r| r.event_id == record.event_id) {
            return Err(StorageError::DuplicateEvent {
                event_id: record.event_id,
            });
        }

        record.event_version = records
            .iter()
            .filter(|r| r.event_stream == record.event_stream)
            .map(|r| r.event_version)
            .max()
            .map_or(0, |max| max + 1);

        let version = record.event_version;
        debug!(stream = %stream_name, event_id = %record.event_id, version, "Event attached");
        records.push(record);
        Ok(Some(version))
    }

    async fn stream(&self, selector: &Selector) -> Result<EventStream> {
        check_selection(selector)?;
        if *self.fail_on_stream.read().await {
            return Err(StorageError::Unavailable(
                "memory driver configured to fail on stream".to_string(),
            ));
        }

        let selected: Vec<RawEvent> = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| self.matches(selector, record))
            .cloned()
            .collect();

        debug!(selector = %selector, count = selected.len(), "Reading events");
        EventStream::from_records(selector.to_string(), selected, self.types.clone()).await
    }

    async fn is_available(&self) -> bool {
        true
    }
}
