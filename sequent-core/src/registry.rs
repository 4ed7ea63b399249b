//! Event type registry.
//!
//! Maps the discriminator persisted with each event to a factory for the
//! matching payload. A registry is an ordinary value: build one at start-up,
//! wrap it in an `Arc`, and hand it to the [`Repository`](crate::repository::Repository)
//! and codec. Tests build their own, so registrations never leak between
//! them.

use std::{collections::HashMap, fmt};

use serde_json::value::RawValue;
use thiserror::Error;

use crate::event::{EventData, EventSet, PayloadError};

/// No factory is registered under the requested discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event type `{type_name}` is not registered")]
pub struct UnregisteredEventError {
    pub type_name: String,
}

fn zero<P, E>() -> E
where
    P: EventData + Into<E>,
{
    P::default().into()
}

fn load<P, E>(data: &RawValue, version: u32) -> Result<E, PayloadError>
where
    P: EventData + Into<E>,
{
    P::load(data, version).map(Into::into)
}

/// Constructors for one registered payload type, lifted into the sum `E`.
pub struct EventFactory<E> {
    event_type: &'static str,
    zero: fn() -> E,
    load: fn(&RawValue, u32) -> Result<E, PayloadError>,
}

impl<E> EventFactory<E> {
    fn of<P>() -> Self
    where
        P: EventData + Into<E>,
    {
        Self {
            event_type: P::EVENT_TYPE,
            zero: zero::<P, E>,
            load: load::<P, E>,
        }
    }

    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.event_type
    }

    /// A fresh zero-value payload.
    #[must_use]
    pub fn instantiate(&self) -> E {
        (self.zero)()
    }

    /// Decode `data` persisted under `version` with the payload's own
    /// versioned decoder.
    ///
    /// # Errors
    ///
    /// Propagates the payload's [`PayloadError`].
    pub fn load(&self, data: &RawValue, version: u32) -> Result<E, PayloadError> {
        (self.load)(data, version)
    }
}

impl<E> Clone for EventFactory<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EventFactory<E> {}

impl<E> fmt::Debug for EventFactory<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFactory")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// Discriminator → factory map for the payloads of sum type `E`.
pub struct Registry<E> {
    factories: HashMap<&'static str, EventFactory<E>>,
}

impl<E> Registry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register payload type `P` under [`EventData::EVENT_TYPE`].
    ///
    /// Registering a second type under the same name replaces the first.
    pub fn register<P>(&mut self) -> &mut Self
    where
        P: EventData + Into<E>,
    {
        if self
            .factories
            .insert(P::EVENT_TYPE, EventFactory::of::<P>())
            .is_some()
        {
            tracing::debug!(event_type = P::EVENT_TYPE, "replaced registered event type");
        } else {
            tracing::trace!(event_type = P::EVENT_TYPE, "registered event type");
        }
        self
    }

    /// Look up the factory for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`UnregisteredEventError`] if nothing is registered under
    /// `name`.
    pub fn resolve(&self, name: &str) -> Result<EventFactory<E>, UnregisteredEventError> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| UnregisteredEventError {
                type_name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered discriminators, in no particular order.
    pub fn event_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

impl<E: EventSet> Registry<E> {
    /// A registry holding every payload of the event set `E`.
    #[must_use]
    pub fn for_set() -> Self {
        let mut registry = Self::new();
        E::register_all(&mut registry);
        registry
    }
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("event_types", &names).finish()
    }
}
