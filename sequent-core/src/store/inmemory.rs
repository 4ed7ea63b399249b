//! In-memory event store implementation for testing.
//!
//! This module provides [`Store`], a thread-safe in-memory implementation of
//! [`EventStore`](super::EventStore) suitable for unit tests and demos.
//!
//! # Example
//!
//! ```
//! use sequent_core::store::inmemory;
//!
//! let store = inmemory::Store::new();
//! assert!(store.all_events().is_empty());
//! ```

use std::{
    collections::{BTreeMap, HashMap, btree_map::Entry},
    future::Future,
    sync::{Arc, RwLock},
};

use crate::{
    concurrency::AggregateLockError,
    event::EventEnvelope,
    store::{AppendError, EventStore},
};

/// In-memory event store keeping one sequence-ordered stream per aggregate.
///
/// Clones share the same underlying data. Besides the per-aggregate streams
/// the store keeps every event in commit order, which tests and demos use as
/// a stand-in for an external delivery channel.
#[derive(Clone, Debug, Default)]
pub struct Store {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<String, BTreeMap<u64, EventEnvelope>>,
    log: Vec<EventEnvelope>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed event across all aggregates, in commit order.
    #[must_use]
    pub fn all_events(&self) -> Vec<EventEnvelope> {
        self.inner
            .read()
            .expect("in-memory store lock poisoned")
            .log
            .clone()
    }

    /// Committed events from position `from` (zero-based) onwards.
    #[must_use]
    pub fn events_since(&self, from: usize) -> Vec<EventEnvelope> {
        let inner = self.inner.read().expect("in-memory store lock poisoned");
        inner.log.get(from..).map(<[_]>::to_vec).unwrap_or_default()
    }
}

/// Error type for in-memory store.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    /// The event would leave a hole in the aggregate's stream.
    #[error("aggregate `{aggregate_id}` expects sequence {expected}, got {found}")]
    SequenceGap {
        aggregate_id: String,
        expected: u64,
        found: u64,
    },
}

impl EventStore for Store {
    type Error = InMemoryError;

    #[tracing::instrument(
        skip(self, event),
        fields(
            aggregate_id = %event.aggregate_id,
            aggregate_sequence = event.aggregate_sequence,
            event_type = %event.event_type,
        )
    )]
    fn append<'a>(
        &'a self,
        event: &'a EventEnvelope,
    ) -> impl Future<Output = Result<(), AppendError<Self::Error>>> + Send + 'a {
        let result = (|| {
            let mut inner = self.inner.write().expect("in-memory store lock poisoned");
            let stream = inner
                .streams
                .entry(event.aggregate_id.clone())
                .or_default();

            let expected = stream.last_key_value().map_or(1, |(seq, _)| seq + 1);
            match stream.entry(event.aggregate_sequence) {
                Entry::Occupied(_) => {
                    tracing::debug!("append rejected: sequence already taken");
                    return Err(AppendError::Conflict(AggregateLockError::new(
                        event.aggregate_id.clone(),
                        event.aggregate_sequence,
                    )));
                }
                Entry::Vacant(slot) => {
                    if event.aggregate_sequence != expected {
                        return Err(AppendError::Store(InMemoryError::SequenceGap {
                            aggregate_id: event.aggregate_id.clone(),
                            expected,
                            found: event.aggregate_sequence,
                        }));
                    }
                    slot.insert(event.clone());
                }
            }
            inner.log.push(event.clone());
            drop(inner);
            tracing::debug!("event appended to stream");
            Ok(())
        })();

        std::future::ready(result)
    }

    #[tracing::instrument(skip(self))]
    fn events_for<'a>(
        &'a self,
        aggregate_id: &'a str,
    ) -> impl Future<Output = Result<Vec<EventEnvelope>, Self::Error>> + Send + 'a {
        let events: Vec<_> = {
            let inner = self.inner.read().expect("in-memory store lock poisoned");
            inner
                .streams
                .get(aggregate_id)
                .map(|stream| stream.values().cloned().collect())
                .unwrap_or_default()
        };
        tracing::debug!(events_loaded = events.len(), "loaded events from store");
        std::future::ready(Ok(events))
    }
}
