//! Read-side consumers of committed events.
//!
//! Events reach projections from outside the runtime, at least once and
//! ordered only within one aggregate's stream. [`Deduplicate`] turns any
//! [`Projection`] into one that tolerates redelivery.
use std::{collections::HashMap, future::Future};

use crate::event::Event;

/// A read model fed with decoded events of the set `E`.
// ANCHOR: projection_trait
pub trait Projection<E>: Send {
    /// Stable identifier for this projection type.
    const KIND: &'static str;

    type Error;

    /// Fold one event into the read model.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the event cannot be applied.
    fn handle_event<'a>(
        &'a mut self,
        event: &'a Event<E>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
// ANCHOR_END: projection_trait

/// Skips events whose sequence is not newer than the last one applied for
/// the same aggregate.
///
/// Positions only advance when the wrapped projection succeeds, so a failed
/// event is applied again on redelivery.
#[derive(Debug, Default)]
pub struct Deduplicate<P> {
    inner: P,
    positions: HashMap<String, u64>,
}

impl<P> Deduplicate<P> {
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            positions: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> P {
        self.inner
    }

    /// Sequence of the last event applied for `aggregate_id`.
    #[must_use]
    pub fn position(&self, aggregate_id: &str) -> Option<u64> {
        self.positions.get(aggregate_id).copied()
    }
}

impl<E, P> Projection<E> for Deduplicate<P>
where
    E: Send + Sync,
    P: Projection<E>,
{
    type Error = P::Error;

    const KIND: &'static str = P::KIND;

    fn handle_event<'a>(
        &'a mut self,
        event: &'a Event<E>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a {
        async move {
            if let Some(&applied) = self.positions.get(&event.aggregate_id)
                && event.aggregate_sequence <= applied
            {
                tracing::trace!(
                    projection = P::KIND,
                    aggregate_id = %event.aggregate_id,
                    aggregate_sequence = event.aggregate_sequence,
                    applied,
                    "skipping already applied event"
                );
                return Ok(());
            }

            self.inner.handle_event(event).await?;
            self.positions
                .insert(event.aggregate_id.clone(), event.aggregate_sequence);
            Ok(())
        }
    }
}
