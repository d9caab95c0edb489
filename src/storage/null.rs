//! No-op EventDriver.

use async_trait::async_trait;

use crate::events::StorableEvent;
use crate::selector::Selector;

use super::{EventDriver, EventStream, Result};

/// Accepts every append without storing it and reads back nothing.
///
/// Usable as a placeholder wherever a driver is required.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

impl NullDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventDriver for NullDriver {
    async fn attach(
        &self,
        _stream_name: &str,
        _event: &dyn StorableEvent,
        _categories: &[String],
    ) -> Result<Option<u64>> {
        Ok(None)
    }

    async fn stream(&self, selector: &Selector) -> Result<EventStream> {
        Ok(EventStream::empty(selector.to_string()))
    }

    async fn is_available(&self) -> bool {
        true
    }
}
