//! Event model consumed by the store.
//!
//! The store does not own domain events. It needs identity, a logical type
//! name, a creation timestamp, an optional aggregate identity and, for
//! persistence, exportable payload and metadata.

mod types;

pub use types::{EventTypes, TypeRegistryError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A domain event as seen by the store.
pub trait Event: Send + Sync {
    /// Logical type name, resolvable through [`EventTypes`].
    fn event_type(&self) -> &str;

    /// Globally unique event identifier.
    fn event_id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    fn aggregate_id(&self) -> Option<Uuid>;

    /// Persistence view of this event, `None` for events that cannot be stored.
    fn as_storable(&self) -> Option<&dyn StorableEvent> {
        None
    }
}

/// An event carrying serializable payload and metadata.
pub trait StorableEvent: Event {
    fn export_data(&self) -> Option<&Value>;

    fn metadata(&self) -> Option<&Value>;
}

/// Immutable envelope of one event, either freshly created or reconstituted
/// from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    event_type: String,
    event_id: String,
    version: Option<u64>,
    created_at: DateTime<Utc>,
    aggregate_id: Option<Uuid>,
    data: Option<Value>,
    metadata: Option<Value>,
}

impl EventEnvelope {
    /// Create a new event with a fresh id and the current time.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            event_id: Uuid::new_v4().to_string(),
            version: None,
            created_at: Utc::now(),
            aggregate_id: None,
            data: None,
            metadata: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_aggregate_id(mut self, aggregate_id: Uuid) -> Self {
        self.aggregate_id = Some(aggregate_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Rebuild an event read back from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        event_type: String,
        event_id: String,
        version: u64,
        created_at: DateTime<Utc>,
        aggregate_id: Option<Uuid>,
        data: Option<Value>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            event_type,
            event_id,
            version: Some(version),
            created_at,
            aggregate_id,
            data,
            metadata,
        }
    }

    /// Version assigned by the driver; `None` until persisted.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl Event for EventEnvelope {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn event_id(&self) -> &str {
        &self.event_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn aggregate_id(&self) -> Option<Uuid> {
        self.aggregate_id
    }

    fn as_storable(&self) -> Option<&dyn StorableEvent> {
        Some(self)
    }
}

impl StorableEvent for EventEnvelope {
    fn export_data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }
}
