//! Store layer.
//!
//! - `EventStore`: a named handle over one driver
//! - `EventStoreBundle`: ordered fan-out of an append to several stores
//! - `EventStorePool`: explicit registry of stores and the scope each serves

mod pool;

pub use pool::{EventStorePool, RegistryError};

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::events::{Event, StorableEvent};
use crate::selector::Selector;
use crate::storage::{EventDriver, EventStream, Result, StorageError};

/// A named store delegating to one driver.
pub struct EventStore {
    name: String,
    driver: Arc<dyn EventDriver>,
}

impl EventStore {
    pub fn new(name: impl Into<String>, driver: Arc<dyn EventDriver>) -> Self {
        Self {
            name: name.into(),
            driver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &Arc<dyn EventDriver> {
        &self.driver
    }

    /// Whether both stores write to the same driver instance.
    pub fn shares_driver(&self, other: &EventStore) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.driver), Arc::as_ptr(&other.driver))
    }

    /// Append `event` to `stream_name`, returning the assigned version.
    pub async fn attach(
        &self,
        stream_name: &str,
        event: &dyn StorableEvent,
        categories: &[String],
    ) -> Result<Option<u64>> {
        debug!(store = %self.name, stream = %stream_name, event_type = %event.event_type(), "Attaching event");
        self.driver.attach(stream_name, event, categories).await
    }

    pub async fn stream(&self, selector: &Selector) -> Result<EventStream> {
        self.driver.stream(selector).await
    }

    pub async fn is_available(&self) -> bool {
        self.driver.is_available().await
    }
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore").field("name", &self.name).finish()
    }
}

/// Ordered set of stores an append is fanned out to.
///
/// A store sharing its driver with an earlier member is left out, so each
/// backend receives an event once.
#[derive(Debug, Clone, Default)]
pub struct EventStoreBundle {
    stores: Vec<Arc<EventStore>>,
}

impl EventStoreBundle {
    pub fn new(stores: Vec<Arc<EventStore>>) -> Self {
        let mut distinct: Vec<Arc<EventStore>> = Vec::with_capacity(stores.len());
        for store in stores {
            match distinct.iter().find(|kept| kept.shares_driver(&store)) {
                Some(kept) => {
                    debug!(
                        store = %store.name(),
                        shared_with = %kept.name(),
                        "Store shares a driver with an earlier bundle member, skipping"
                    );
                }
                None => distinct.push(store),
            }
        }
        Self { stores: distinct }
    }

    pub fn stores(&self) -> &[Arc<EventStore>] {
        &self.stores
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Append `event` to every store in order.
    ///
    /// Fails with `Unstorable` before touching any store if the event has no
    /// persistence view. The first store failure is returned as-is; stores
    /// earlier in the bundle keep what they already wrote.
    pub async fn attach(
        &self,
        stream_name: &str,
        event: &dyn Event,
        categories: &[String],
    ) -> Result<Vec<Option<u64>>> {
        let storable = event.as_storable().ok_or_else(|| StorageError::Unstorable {
            event_type: event.event_type().to_string(),
        })?;

        let mut versions = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            versions.push(store.attach(stream_name, storable, categories).await?);
        }
        Ok(versions)
    }
}

impl FromIterator<Arc<EventStore>> for EventStoreBundle {
    fn from_iter<I: IntoIterator<Item = Arc<EventStore>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
