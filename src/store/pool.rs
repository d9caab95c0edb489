//! Store registry.
//!
//! Each store is enrolled with the selector scope it is concerned with.
//! Appends and reads are routed to every store whose scope fulfills the
//! requested selector.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Config, StorageConfig};
use crate::events::EventTypes;
use crate::selector::{validate_stream_name, Selector, SelectorError};
use crate::storage::{init_driver, EventDriver, StorageError};

use super::{EventStore, EventStoreBundle};

/// Error types for store registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Store already enrolled: {0}")]
    DuplicateStore(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

struct Enrolment {
    concerning: Selector,
    store: Arc<EventStore>,
}

/// Registry of enrolled stores, in enrolment order.
pub struct EventStorePool {
    types: Arc<EventTypes>,
    entries: Vec<Enrolment>,
}

impl EventStorePool {
    pub fn new(types: Arc<EventTypes>) -> Self {
        Self {
            types,
            entries: Vec::new(),
        }
    }

    /// Build the pool described by `config`.
    ///
    /// Stores configured with equal storage share one driver; every distinct
    /// backend is opened once.
    pub async fn from_config(
        config: &Config,
        types: Arc<EventTypes>,
    ) -> Result<Self, RegistryError> {
        let mut drivers: Vec<(&StorageConfig, Arc<dyn EventDriver>)> = Vec::new();

        let mut pool = Self::new(types.clone());
        for entry in &config.stores {
            let storage = config.storage_for(entry);
            let driver = match drivers.iter().find(|(opened, _)| *opened == storage) {
                Some((_, driver)) => driver.clone(),
                None => {
                    let driver = init_driver(storage, types.clone()).await?;
                    drivers.push((storage, driver.clone()));
                    driver
                }
            };
            pool.enrol(
                entry.concerning.clone(),
                EventStore::new(entry.name.clone(), driver),
            )?;
        }
        Ok(pool)
    }

    pub fn types(&self) -> &Arc<EventTypes> {
        &self.types
    }

    /// Enrol `store` for the scope `concerning`. Store names are unique.
    pub fn enrol(
        &mut self,
        concerning: Selector,
        store: EventStore,
    ) -> Result<Arc<EventStore>, RegistryError> {
        if self.get(store.name()).is_some() {
            return Err(RegistryError::DuplicateStore(store.name().to_string()));
        }

        info!(store = %store.name(), concerning = %concerning, "Enrolling event store");
        let store = Arc::new(store);
        self.entries.push(Enrolment {
            concerning,
            store: store.clone(),
        });
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<Arc<EventStore>> {
        self.entries
            .iter()
            .find(|entry| entry.store.name() == name)
            .map(|entry| entry.store.clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.store.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every enrolment as `(concerning, store)`.
    pub fn enrolments(&self) -> impl Iterator<Item = (&Selector, &Arc<EventStore>)> {
        self.entries
            .iter()
            .map(|entry| (&entry.concerning, &entry.store))
    }

    /// Stores whose scope fulfills `selector`, in enrolment order.
    pub fn bundle_for(&self, selector: &Selector) -> EventStoreBundle {
        let bundle: EventStoreBundle = self
            .entries
            .iter()
            .filter(|entry| entry.concerning.fulfills(selector, &self.types))
            .map(|entry| entry.store.clone())
            .collect();
        debug!(selector = %selector, stores = bundle.len(), "Resolved store bundle");
        bundle
    }

    /// Stores concerned with an append of `event_type` to `stream_name`.
    pub fn bundle_for_attach(
        &self,
        stream_name: &str,
        categories: &[String],
        event_type: &str,
    ) -> Result<EventStoreBundle, RegistryError> {
        validate_stream_name(stream_name)?;
        let selector = Selector::of_stream(stream_name)?
            .with_categories(categories.iter().cloned())?
            .with_events([event_type])?;
        Ok(self.bundle_for(&selector))
    }
}
