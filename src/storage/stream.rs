//! Lazily reconstituting event stream.
//!
//! Wraps a driver cursor of raw records behind a forward-only, single-pass
//! reader. Each record is decoded only when the stream advances onto it.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::warn;

use crate::events::{Event, EventEnvelope, EventTypes};

use super::{RawEvent, Result, StorageError};

/// Capacity of the channel between a SQL read task and its stream.
pub const STREAM_BUFFER: usize = 32;

/// Driver-side cursor of raw records.
pub type RecordCursor = BoxStream<'static, Result<RawEvent>>;

enum State {
    Active {
        cursor: RecordCursor,
        current: EventEnvelope,
    },
    Exhausted,
}

/// A named, one-shot sequence of reconstituted events.
///
/// The stream ends when the cursor runs out or when a record names an event
/// type that is not registered. Dropping the stream drops the cursor, which
/// releases whatever the driver holds for it.
pub struct EventStream {
    name: String,
    types: Arc<EventTypes>,
    state: State,
}

impl EventStream {
    /// Open a stream and pull its first record.
    pub async fn open(
        name: impl Into<String>,
        cursor: RecordCursor,
        types: Arc<EventTypes>,
    ) -> Result<Self> {
        let mut stream = Self {
            name: name.into(),
            types,
            state: State::Exhausted,
        };
        stream.pull(cursor).await?;
        Ok(stream)
    }

    /// Open a stream over records already in memory.
    pub async fn from_records(
        name: impl Into<String>,
        records: Vec<RawEvent>,
        types: Arc<EventTypes>,
    ) -> Result<Self> {
        let cursor = stream::iter(records.into_iter().map(Ok)).boxed();
        Self::open(name, cursor, types).await
    }

    /// A stream with nothing in it.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Arc::new(EventTypes::new()),
            state: State::Exhausted,
        }
    }

    /// Name the stream was opened under, usually the selector text.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_current(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    pub fn current(&self) -> Option<&EventEnvelope> {
        match &self.state {
            State::Active { current, .. } => Some(current),
            State::Exhausted => None,
        }
    }

    /// Event id of the current position.
    pub fn key(&self) -> Option<&str> {
        self.current().map(|event| event.event_id())
    }

    /// Move to the next record.
    ///
    /// A decode failure is returned and leaves the stream exhausted.
    pub async fn advance(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Exhausted) {
            State::Active { cursor, .. } => self.pull(cursor).await,
            State::Exhausted => Ok(()),
        }
    }

    /// Streams are read once; rewinding does nothing.
    pub fn rewind(&mut self) {}

    /// Adapt into a `futures` stream of events.
    ///
    /// A failure while pulling the next record is yielded after the current
    /// event and ends the stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<EventEnvelope>> {
        stream::unfold(
            (self, None::<StorageError>),
            |(mut events, pending)| async move {
                if let Some(err) = pending {
                    return Some((Err(err), (events, None)));
                }
                let State::Active { cursor, current } =
                    std::mem::replace(&mut events.state, State::Exhausted)
                else {
                    return None;
                };
                let pending = events.pull(cursor).await.err();
                Some((Ok(current), (events, pending)))
            },
        )
        .boxed()
    }

    /// Drain every remaining event.
    pub async fn try_collect_all(self) -> Result<Vec<EventEnvelope>> {
        self.into_stream().try_collect().await
    }

    async fn pull(&mut self, mut cursor: RecordCursor) -> Result<()> {
        self.state = State::Exhausted;

        let Some(record) = cursor.next().await else {
            return Ok(());
        };
        let record = record?;

        if !self.types.is_known(&record.event_name) {
            warn!(
                stream = %self.name,
                event_type = %record.event_name,
                event_id = %record.event_id,
                "Unknown event type, ending stream"
            );
            return Ok(());
        }

        let current = record.reconstitute()?;
        self.state = State::Active { cursor, current };
        Ok(())
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("name", &self.name)
            .field("current", &self.key())
            .finish()
    }
}
