//! Persisted event record.
//!
//! One row per append. Payload and metadata are stored as JSON text,
//! categories as a comma-joined list, the timestamp with microseconds.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::events::{Event, EventEnvelope, StorableEvent};
use crate::selector::{validate_category, validate_stream_name};

use super::{Result, StorageError};

/// Format of the `event_date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Accepts any number of fractional digits when reading back.
const DATE_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
/// Separator of the packed `event_categories` column.
pub const CATEGORY_SEPARATOR: char = ',';

/// Raw record as stored by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event_stream: String,
    pub event_categories: Option<String>,
    pub event_id: String,
    pub event_name: String,
    pub event_date: String,
    pub aggregate_id: Option<String>,
    pub data: Option<String>,
    pub metadata: Option<String>,
    pub event_version: u64,
}

impl RawEvent {
    /// Build the record for an append.
    ///
    /// Null-valued optional fields stay `None` so they are omitted from the
    /// insert. `event_version` is left at 0 for the driver to assign.
    pub fn prepare(
        stream_name: &str,
        event: &dyn StorableEvent,
        categories: &[String],
    ) -> Result<Self> {
        validate_stream_name(stream_name)?;
        for category in categories {
            validate_category(category)?;
        }

        Ok(Self {
            event_stream: stream_name.to_string(),
            event_categories: pack_categories(categories),
            event_id: event.event_id().to_string(),
            event_name: event.event_type().to_string(),
            event_date: format_date(event.created_at()),
            aggregate_id: event.aggregate_id().map(|id| id.to_string()),
            data: encode_json(event.export_data())?,
            metadata: encode_json(event.metadata())?,
            event_version: 0,
        })
    }

    /// Category literals unpacked from the stored column.
    pub fn categories(&self) -> Vec<&str> {
        self.event_categories
            .as_deref()
            .map(|packed| packed.split(CATEGORY_SEPARATOR).collect())
            .unwrap_or_default()
    }

    /// Decode the record into an event envelope.
    ///
    /// Stored nulls decode to absent payload or metadata.
    pub fn reconstitute(self) -> Result<EventEnvelope> {
        let created_at = parse_date(&self.event_date)?;
        let aggregate_id = match self.aggregate_id.as_deref() {
            Some(id) if !id.is_empty() => Some(Uuid::parse_str(id)?),
            _ => None,
        };
        let data = decode_json(self.data.as_deref())?;
        let metadata = decode_json(self.metadata.as_deref())?;

        Ok(EventEnvelope::reconstitute(
            self.event_name,
            self.event_id,
            self.event_version,
            created_at,
            aggregate_id,
            data,
            metadata,
        ))
    }
}

/// Join category literals for the packed column, `None` when there are none.
pub fn pack_categories(categories: &[String]) -> Option<String> {
    if categories.is_empty() {
        return None;
    }
    Some(categories.join(&CATEGORY_SEPARATOR.to_string()))
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, DATE_PARSE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| StorageError::InvalidTimestamp(format!("{}: {}", value, e)))
}

fn encode_json(value: Option<&Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::to_string(value)?)),
    }
}

fn decode_json(value: Option<&str>) -> Result<Option<Value>> {
    match value {
        None => Ok(None),
        Some(text) => match serde_json::from_str(text)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        },
    }
}
