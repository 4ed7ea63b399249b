//! Persistence layer abstractions.
//!
//! This module describes the event store contract (`EventStore`) and the
//! errors an append can produce. Stores work on [`EventEnvelope`]s, so they
//! never need to know the payload types; decoding happens in the
//! [`codec`](crate::codec).
use std::future::Future;

use thiserror::Error;

use crate::{concurrency::AggregateLockError, event::EventEnvelope};

pub mod inmemory;

/// Error from a conditioned append.
#[derive(Debug, Error)]
pub enum AppendError<StoreError>
where
    StoreError: std::error::Error,
{
    /// An event already exists at this `(aggregateId, aggregateSequence)`.
    #[error(transparent)]
    Conflict(#[from] AggregateLockError),
    /// Underlying store error.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl<StoreError: std::error::Error> AppendError<StoreError> {
    /// Create a store error variant.
    pub const fn store(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Abstraction over the persistence layer for event streams.
///
/// Implementations must make [`append`](Self::append) atomic per key: of two
/// concurrent appends for the same `(aggregate_id, aggregate_sequence)`,
/// exactly one succeeds and the other fails with
/// [`AppendError::Conflict`]. Nothing else in the runtime serializes writers.
// ANCHOR: event_store_trait
pub trait EventStore: Send + Sync {
    /// Store-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist one event, conditioned on its key not existing yet.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::Conflict`] if the key is taken, or
    /// [`AppendError::Store`] if persistence fails.
    fn append<'a>(
        &'a self,
        event: &'a EventEnvelope,
    ) -> impl Future<Output = Result<(), AppendError<Self::Error>>> + Send + 'a;

    /// Every event of one aggregate, ascending by sequence.
    ///
    /// An unknown aggregate yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns a store-specific error when the read fails.
    fn events_for<'a>(
        &'a self,
        aggregate_id: &'a str,
    ) -> impl Future<Output = Result<Vec<EventEnvelope>, Self::Error>> + Send + 'a;
}
// ANCHOR_END: event_store_trait
