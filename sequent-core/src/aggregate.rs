//! Command-side domain primitives.
//!
//! Aggregates are plain state types: they validate commands ([`Aggregate::handle`])
//! and fold facts into state ([`Aggregate::apply`]). Identity and sequence
//! bookkeeping belong to the runtime and live in [`AggregateRoot`], which the
//! [`Repository`](crate::repository::Repository) creates fresh for every
//! command and discards afterwards.

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{Event, EventSet};

/// An intent to change exactly one aggregate.
pub trait Command: Send + Sync {
    /// Identifier of the aggregate the command is addressed to.
    fn aggregate_id(&self) -> &str;
}

/// Error raised while folding a committed event into aggregate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The aggregate has no handling for this event type.
    #[error("aggregate `{aggregate_type}` cannot apply event `{event_type}`")]
    UnsupportedEvent {
        aggregate_type: String,
        event_type: String,
    },
    /// The event does not directly follow the aggregate's current sequence.
    #[error(
        "event for aggregate `{aggregate_id}` is out of sequence: expected {expected}, found \
         {found}"
    )]
    OutOfSequence {
        aggregate_id: String,
        expected: u64,
        found: u64,
    },
}

impl ApplyError {
    /// Shorthand for [`ApplyError::UnsupportedEvent`].
    pub fn unsupported<A: Aggregate>(event: &Event<A::Event>) -> Self {
        Self::UnsupportedEvent {
            aggregate_type: A::KIND.to_string(),
            event_type: event.event_type.clone(),
        }
    }
}

/// Read-only view of the runtime-owned identity passed to command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateContext<'a> {
    pub aggregate_id: &'a str,
    /// Sequence of the last applied event; `0` for a new aggregate.
    pub sequence: u64,
}

/// Command-side entities that produce domain events.
///
/// ```ignore
/// impl Aggregate for Order {
///     const KIND: &'static str = "Order";
///     type Event = OrderEvent;
///     type Command = OrderCommand;
///     type Error = OrderError;
///
///     fn handle(&self, _: &AggregateContext<'_>, command: &OrderCommand)
///         -> Result<Vec<OrderEvent>, OrderError> { .. }
///
///     fn apply(&mut self, event: &Event<OrderEvent>) -> Result<(), ApplyError> {
///         match &event.data {
///             OrderEvent::Created(e) => self.customer = e.customer_id.clone(),
///             ..
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Aggregate: Default + Send + Sync + Sized {
    /// Aggregate type identifier, persisted as `aggregateType`.
    const KIND: &'static str;

    type Event: EventSet;
    type Command: Command;
    type Error;

    /// Validate `command` against current state and decide which facts it
    /// produces.
    ///
    /// Must not mutate anything; an error aborts the command with nothing
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the command is invalid for the current state.
    fn handle(
        &self,
        context: &AggregateContext<'_>,
        command: &Self::Command,
    ) -> Result<Vec<Self::Event>, Self::Error>;

    /// Fold one committed event into state.
    ///
    /// # Errors
    ///
    /// Implementations whose event set carries types they do not handle
    /// return [`ApplyError::UnsupportedEvent`] rather than ignoring them.
    fn apply(&mut self, event: &Event<Self::Event>) -> Result<(), ApplyError>;
}

/// An aggregate's state together with the identity and sequence the runtime
/// tracks for it.
#[derive(Debug, Clone)]
pub struct AggregateRoot<A> {
    id: String,
    sequence: u64,
    state: A,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// A new, empty aggregate at sequence `0`.
    #[must_use]
    pub fn init(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: 0,
            state: A::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sequence of the last applied event.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub const fn state(&self) -> &A {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> A {
        self.state
    }

    #[must_use]
    pub fn context(&self) -> AggregateContext<'_> {
        AggregateContext {
            aggregate_id: &self.id,
            sequence: self.sequence,
        }
    }

    /// Run the command handler against current state.
    ///
    /// # Errors
    ///
    /// Passes the aggregate's domain error through unchanged.
    pub fn handle(&self, command: &A::Command) -> Result<Vec<A::Event>, A::Error> {
        self.state.handle(&self.context(), command)
    }

    /// Apply `event`, which must carry the next sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::OutOfSequence`] if `event` does not follow the
    /// current sequence, or whatever [`Aggregate::apply`] rejects. The sequence
    /// is left unchanged on error; state may already hold whatever `apply`
    /// changed before failing, so callers should discard the root.
    pub fn apply_event(&mut self, event: &Event<A::Event>) -> Result<(), ApplyError> {
        let expected = self.sequence + 1;
        if event.aggregate_sequence != expected {
            return Err(ApplyError::OutOfSequence {
                aggregate_id: self.id.clone(),
                expected,
                found: event.aggregate_sequence,
            });
        }
        self.state.apply(event)?;
        self.sequence = event.aggregate_sequence;
        Ok(())
    }

    /// Apply a stored history in order.
    ///
    /// # Errors
    ///
    /// Stops at the first event [`apply_event`](Self::apply_event) rejects.
    pub fn replay<'a, I>(&mut self, events: I) -> Result<(), ApplyError>
    where
        I: IntoIterator<Item = &'a Event<A::Event>>,
        A::Event: 'a,
    {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(())
    }

    /// Wrap `fact` in an envelope for the next sequence number.
    ///
    /// Does not apply it; the runtime applies only once the append succeeds.
    #[must_use]
    pub fn next_event(&self, fact: A::Event) -> Event<A::Event> {
        Event {
            event_id: Uuid::new_v4().to_string(),
            aggregate_id: self.id.clone(),
            aggregate_type: A::KIND.to_string(),
            aggregate_sequence: self.sequence + 1,
            event_type: fact.event_type().to_string(),
            event_version: fact.version(),
            timestamp: Utc::now(),
            data: fact,
        }
    }
}
