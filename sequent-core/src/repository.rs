//! Application service orchestration.
//!
//! `Repository` coordinates loading aggregates, invoking command handlers, and
//! appending the resulting events to the store one conditioned append at a
//! time.

use std::sync::Arc;

use nonempty::NonEmpty;
use thiserror::Error;

use crate::{
    aggregate::{Aggregate, AggregateRoot, ApplyError, Command},
    codec::{DecodeError, EncodeError, EventCodec},
    concurrency::AggregateLockError,
    event::{Event, EventSet},
    registry::Registry,
    store::{AppendError, EventStore},
};

/// Error raised while rebuilding an aggregate from its stream.
#[derive(Debug, Error)]
pub enum LoadError<StoreError>
where
    StoreError: std::error::Error + 'static,
{
    #[error("failed to load events: {0}")]
    Store(#[source] StoreError),
    #[error("failed to decode stored event: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to apply stored event: {0}")]
    Apply(#[from] ApplyError),
}

/// Error type for command processing.
#[derive(Debug, Error)]
pub enum CommandError<AggregateError, StoreError>
where
    StoreError: std::error::Error + 'static,
{
    #[error("aggregate rejected command: {0}")]
    Rejected(AggregateError),
    /// Another writer took the sequence. Facts of the same command that were
    /// appended before this one stay committed.
    #[error(transparent)]
    Concurrency(AggregateLockError),
    #[error("failed to rebuild aggregate state: {0}")]
    Load(#[source] LoadError<StoreError>),
    #[error("failed to encode event: {0}")]
    Encode(#[source] EncodeError),
    #[error("failed to apply committed event: {0}")]
    Apply(#[source] ApplyError),
    #[error("failed to persist event: {0}")]
    Store(#[source] StoreError),
}

/// Events committed by one command, decoded and in sequence order.
pub type Committed<E> = Vec<Event<E>>;

/// Result type alias for command processing.
pub type CommandResult<A, S> = Result<
    Committed<<A as Aggregate>::Event>,
    CommandError<<A as Aggregate>::Error, <S as EventStore>::Error>,
>;

/// Result type alias for retried command processing; the `usize` is the
/// number of attempts made.
pub type RetryResult<A, S> = Result<
    (Committed<<A as Aggregate>::Event>, usize),
    CommandError<<A as Aggregate>::Error, <S as EventStore>::Error>,
>;

/// Repository for aggregates whose events belong to the set `E`.
///
/// Aggregates with different event sets use separate repositories; they can
/// share one store.
pub struct Repository<S, E> {
    store: S,
    codec: EventCodec<E>,
}

impl<S, E> Repository<S, E>
where
    S: EventStore,
    E: EventSet,
{
    #[must_use]
    pub const fn new(store: S, registry: Arc<Registry<E>>) -> Self {
        Self {
            store,
            codec: EventCodec::new(registry),
        }
    }

    #[must_use]
    pub const fn event_store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn codec(&self) -> &EventCodec<E> {
        &self.codec
    }

    /// Load an aggregate by replaying its whole stream.
    ///
    /// An aggregate with no events loads as a fresh instance at sequence `0`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the store fails, an event cannot be decoded,
    /// or the aggregate rejects an event.
    #[tracing::instrument(skip(self), fields(aggregate_kind = A::KIND))]
    pub async fn load<A>(&self, id: &str) -> Result<AggregateRoot<A>, LoadError<S::Error>>
    where
        A: Aggregate<Event = E>,
    {
        let envelopes = self.store.events_for(id).await.map_err(LoadError::Store)?;

        let mut root = AggregateRoot::<A>::init(id);
        for envelope in envelopes {
            let event = self.codec.decode_envelope(envelope)?;
            root.apply_event(&event)?;
        }
        tracing::debug!(sequence = root.sequence(), "aggregate loaded");
        Ok(root)
    }

    /// Load the addressed aggregate, run the command handler, and commit the
    /// resulting facts in order.
    ///
    /// Each fact is appended on its own, keyed by the next sequence, and
    /// applied once the append succeeds. The first rejected append stops the
    /// batch; earlier facts are not rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Rejected`] with the domain error if the
    /// handler refuses the command (nothing is persisted), and
    /// [`CommandError::Concurrency`] for the sequence another writer took.
    /// Other variants cover load, encoding, apply, and store failures.
    #[tracing::instrument(
        skip(self, command),
        fields(aggregate_kind = A::KIND, aggregate_id = %command.aggregate_id())
    )]
    pub async fn process_command<A>(&self, command: &A::Command) -> CommandResult<A, S>
    where
        A: Aggregate<Event = E>,
    {
        let mut root = self
            .load::<A>(command.aggregate_id())
            .await
            .map_err(CommandError::Load)?;

        let facts = root.handle(command).map_err(CommandError::Rejected)?;
        let Some(facts) = NonEmpty::from_vec(facts) else {
            tracing::debug!("command produced no events");
            return Ok(Vec::new());
        };

        self.commit(&mut root, facts).await
    }

    /// Append `facts` after the current sequence of `root`, applying each
    /// one once its append succeeds.
    pub(crate) async fn commit<A>(
        &self,
        root: &mut AggregateRoot<A>,
        facts: NonEmpty<E>,
    ) -> CommandResult<A, S>
    where
        A: Aggregate<Event = E>,
    {
        let mut committed = Vec::with_capacity(facts.len());
        for fact in facts {
            let event = root.next_event(fact);
            let envelope = self.codec.encode(&event).map_err(CommandError::Encode)?;

            match self.store.append(&envelope).await {
                Ok(()) => {}
                Err(AppendError::Conflict(conflict)) => {
                    tracing::debug!(
                        sequence = conflict.sequence,
                        committed = committed.len(),
                        "conflicting append, stopping batch"
                    );
                    return Err(CommandError::Concurrency(conflict));
                }
                Err(AppendError::Store(err)) => return Err(CommandError::Store(err)),
            }

            root.apply_event(&event).map_err(CommandError::Apply)?;
            tracing::trace!(
                sequence = event.aggregate_sequence,
                event_type = %event.event_type,
                "event committed"
            );
            committed.push(event);
        }

        tracing::debug!(
            events = committed.len(),
            sequence = root.sequence(),
            "events committed"
        );
        Ok(committed)
    }

    /// Process a command, reloading and resubmitting it after each
    /// [`AggregateLockError`].
    ///
    /// Every retry re-runs the handler against freshly loaded state,
    /// including any facts an earlier attempt already committed.
    ///
    /// # Errors
    ///
    /// Returns the last error if all retries are exhausted, or a
    /// non-concurrency error immediately.
    pub async fn process_command_with_retry<A>(
        &self,
        command: &A::Command,
        max_retries: usize,
    ) -> RetryResult<A, S>
    where
        A: Aggregate<Event = E>,
    {
        for attempt in 1..=max_retries {
            match self.process_command::<A>(command).await {
                Ok(committed) => return Ok((committed, attempt)),
                Err(CommandError::Concurrency(conflict)) => {
                    tracing::debug!(attempt, %conflict, "retrying command after conflict");
                }
                Err(e) => return Err(e),
            }
        }

        self.process_command::<A>(command)
            .await
            .map(|committed| (committed, max_retries + 1))
    }
}

impl<S: std::fmt::Debug, E> std::fmt::Debug for Repository<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .field("codec", &self.codec)
            .finish()
    }
}
