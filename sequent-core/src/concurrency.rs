//! Write conflicts on an aggregate's stream.
//!
//! The only concurrency control in the runtime is the store's conditioned
//! append: an event whose `(aggregateId, aggregateSequence)` already exists is
//! rejected. Two writers racing for the same sequence therefore produce
//! exactly one success and one [`AggregateLockError`].
//!
//! Conflicts are never retried implicitly. Callers that want
//! reload-and-resubmit opt in through
//! [`Repository::process_command_with_retry`](crate::repository::Repository::process_command_with_retry).

use thiserror::Error;

/// Another writer already committed an event at this sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "aggregate `{aggregate_id}` has already processed sequence {sequence} (hint: another writer \
     committed first; reload and retry)"
)]
pub struct AggregateLockError {
    pub aggregate_id: String,
    pub sequence: u64,
}

impl AggregateLockError {
    #[must_use]
    pub fn new(aggregate_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            sequence,
        }
    }
}
