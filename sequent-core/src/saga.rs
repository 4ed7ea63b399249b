//! Long-running processes driven by committed events.
//!
//! A [`Saga`] reacts to events from many aggregates. Each event is routed to
//! one saga instance through a correlation key ([`SagaAssociation`]); the
//! [`SagaManager`] resolves the key, loads (or starts) the instance, runs the
//! handler, and persists the new state together with any correlation keys
//! the handler asked for.
//!
//! Delivery is at-least-once and only ordered within one aggregate's stream,
//! so handlers should tolerate redelivery. Saving a saga is last-writer-wins:
//! two events for the same instance processed concurrently can overwrite
//! each other's state.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::value::RawValue;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    codec::{DecodeError, EventCodec},
    event::{Event, EventSet, PayloadError, decode_json},
};

pub mod inmemory;

/// Correlation key routing events to a saga instance.
///
/// `kind` namespaces `id` so that, for example, an order id and a delivery
/// id with the same value never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SagaAssociation {
    pub id: String,
    pub kind: String,
}

impl SagaAssociation {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for SagaAssociation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// No instance of the saga type is associated with the key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no `{saga_type}` saga found for association `{association}`")]
pub struct SagaAssociationNotFoundError {
    pub association: SagaAssociation,
    pub saga_type: String,
}

/// The key resolved to an instance id that has no saved state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no saga found for saga id `{saga_id}`")]
pub struct SagaNotFoundError {
    pub saga_id: String,
}

/// Persisted saga instance with its state still encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSaga {
    pub id: String,
    /// Schema version `data` was written with.
    pub version: u32,
    pub saga_type: String,
    pub data: Box<RawValue>,
}

/// Error from [`SagaStore::load`].
#[derive(Debug, Error)]
pub enum SagaLoadError<StoreError>
where
    StoreError: std::error::Error + 'static,
{
    #[error(transparent)]
    AssociationNotFound(#[from] SagaAssociationNotFoundError),
    #[error(transparent)]
    SagaNotFound(#[from] SagaNotFoundError),
    #[error("saga store error: {0}")]
    Store(#[source] StoreError),
}

/// Durable storage for saga state and correlation keys.
// ANCHOR: saga_store_trait
pub trait SagaStore: Send + Sync {
    /// Store-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve `association` for `saga_type` and load that instance.
    ///
    /// # Errors
    ///
    /// Returns [`SagaLoadError::AssociationNotFound`] for an unknown key,
    /// [`SagaLoadError::SagaNotFound`] if the key points at an instance that
    /// was never saved, and [`SagaLoadError::Store`] on storage failure.
    fn load<'a>(
        &'a self,
        association: &'a SagaAssociation,
        saga_type: &'a str,
    ) -> impl Future<Output = Result<RawSaga, SagaLoadError<Self::Error>>> + Send + 'a;

    /// Route `association` to `saga_id` for `saga_type`.
    ///
    /// # Errors
    ///
    /// Returns a store-specific error when the write fails.
    fn add_association<'a>(
        &'a self,
        association: &'a SagaAssociation,
        saga_type: &'a str,
        saga_id: &'a str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

    /// Insert or overwrite an instance's state.
    ///
    /// # Errors
    ///
    /// Returns a store-specific error when the write fails.
    fn save<'a>(&'a self, saga: &'a RawSaga)
    -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
// ANCHOR_END: saga_store_trait

/// A process manager reacting to events of the set `Self::Event`.
///
/// The implementing type carries the saga's collaborators (for example the
/// repositories it submits commands through); per-instance data lives in
/// [`Saga::State`].
pub trait Saga: Send + Sync {
    /// Saga type name, persisted with every instance.
    const TYPE: &'static str;

    /// Schema version the state is serialized with.
    const VERSION: u32;

    /// Event type that creates a new instance.
    const START_EVENT: &'static str;

    type Event: EventSet;
    type State: Default + Serialize + DeserializeOwned + Send + Sync;
    type Error;

    /// Decode state persisted under `version`.
    ///
    /// The default implementation only understands [`Self::VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] for unknown versions or malformed data.
    fn load_state(data: &RawValue, version: u32) -> Result<Self::State, PayloadError> {
        if version == Self::VERSION {
            decode_json(Self::TYPE, version, data)
        } else {
            Err(PayloadError::unsupported(Self::TYPE, version))
        }
    }

    /// Correlation key for `event`, or `None` if this saga cannot route it.
    fn association_id(&self, event: &Event<Self::Event>) -> Option<SagaAssociation>;

    /// React to `event`, mutating `state` and possibly issuing commands.
    ///
    /// Returns correlation keys that should route to this instance from now
    /// on.
    ///
    /// # Errors
    ///
    /// On error the state is not saved and returned keys are not added.
    fn handle_event<'a>(
        &'a self,
        state: &'a mut Self::State,
        event: &'a Event<Self::Event>,
    ) -> impl Future<Output = Result<Vec<SagaAssociation>, Self::Error>> + Send + 'a;
}

/// Error type for saga event processing.
#[derive(Debug, Error)]
pub enum SagaError<HandlerError, StoreError>
where
    StoreError: std::error::Error + 'static,
{
    #[error("saga `{saga_type}` has no association for event `{event_type}`")]
    Unrouted {
        saga_type: &'static str,
        event_type: String,
    },
    #[error("failed to decode event: {0}")]
    Decode(#[source] DecodeError),
    #[error("failed to load saga: {0}")]
    Load(#[source] SagaLoadError<StoreError>),
    #[error("failed to decode saga state: {0}")]
    State(#[source] PayloadError),
    #[error("failed to encode saga state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("saga handler failed: {0}")]
    Handler(HandlerError),
    #[error("saga store error: {0}")]
    Store(#[source] StoreError),
}

/// Result type alias for saga event processing.
pub type SagaResult<G, S> =
    Result<ProcessedEvent, SagaError<<G as Saga>::Error, <S as SagaStore>::Error>>;

/// Outcome of routing one event to a saga instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEvent {
    pub saga_id: String,
    /// Whether this event created the instance.
    pub started: bool,
    /// Correlation keys added for the instance after handling.
    pub associations: Vec<SagaAssociation>,
}

/// Routes events to saga instances held in a [`SagaStore`].
#[derive(Debug, Clone)]
pub struct SagaManager<S> {
    store: S,
}

impl<S: SagaStore> SagaManager<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn saga_store(&self) -> &S {
        &self.store
    }

    /// Route `event` to its instance of saga `G` and run the handler.
    ///
    /// A start event creates a new instance and registers its key before the
    /// handler runs. Any other event must resolve to an existing instance.
    /// State is saved and new keys are added only if the handler succeeds.
    ///
    /// # Errors
    ///
    /// See [`SagaError`]. A start event whose handler fails leaves the key
    /// registered with no saved state; later events for that key fail with
    /// [`SagaLoadError::SagaNotFound`].
    #[tracing::instrument(
        skip(self, saga, event),
        fields(
            saga_type = G::TYPE,
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            aggregate_sequence = event.aggregate_sequence,
        )
    )]
    pub async fn process_event<G>(&self, saga: &G, event: &Event<G::Event>) -> SagaResult<G, S>
    where
        G: Saga,
    {
        let association = saga
            .association_id(event)
            .ok_or_else(|| SagaError::Unrouted {
                saga_type: G::TYPE,
                event_type: event.event_type.clone(),
            })?;

        let started = event.event_type == G::START_EVENT;
        let (saga_id, mut state) = if started {
            let saga_id = Uuid::new_v4().to_string();
            self.store
                .add_association(&association, G::TYPE, &saga_id)
                .await
                .map_err(SagaError::Store)?;
            tracing::debug!(%saga_id, %association, "saga started");
            (saga_id, G::State::default())
        } else {
            let raw = self
                .store
                .load(&association, G::TYPE)
                .await
                .map_err(SagaError::Load)?;
            let state = G::load_state(&raw.data, raw.version).map_err(SagaError::State)?;
            (raw.id, state)
        };

        let associations = saga
            .handle_event(&mut state, event)
            .await
            .map_err(SagaError::Handler)?;

        let data = serde_json::value::to_raw_value(&state).map_err(SagaError::Encode)?;
        let raw = RawSaga {
            id: saga_id,
            version: G::VERSION,
            saga_type: G::TYPE.to_string(),
            data,
        };
        self.store.save(&raw).await.map_err(SagaError::Store)?;

        for added in &associations {
            self.store
                .add_association(added, G::TYPE, &raw.id)
                .await
                .map_err(SagaError::Store)?;
        }

        tracing::debug!(
            saga_id = %raw.id,
            associations_added = associations.len(),
            "saga event processed"
        );
        Ok(ProcessedEvent {
            saga_id: raw.id,
            started,
            associations,
        })
    }

    /// Process events one after another, continuing past failures.
    ///
    /// Each failure is logged; results are returned in input order.
    pub async fn process_batch<G>(
        &self,
        saga: &G,
        events: &[Event<G::Event>],
    ) -> Vec<SagaResult<G, S>>
    where
        G: Saga,
        G::Error: fmt::Display,
    {
        let mut results = Vec::with_capacity(events.len());
        for event in events {
            let result = self.process_event(saga, event).await;
            if let Err(error) = &result {
                tracing::warn!(
                    saga_type = G::TYPE,
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    %error,
                    "failed to process saga event"
                );
            }
            results.push(result);
        }
        results
    }

    /// Decode wire bytes with `codec` and process the resulting event.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::Decode`] if the bytes cannot be decoded,
    /// otherwise as [`process_event`](Self::process_event).
    pub async fn process_envelope<G>(
        &self,
        saga: &G,
        codec: &EventCodec<G::Event>,
        bytes: &[u8],
    ) -> SagaResult<G, S>
    where
        G: Saga,
    {
        let event = codec.decode(bytes).map_err(SagaError::Decode)?;
        self.process_event(saga, &event).await
    }
}
