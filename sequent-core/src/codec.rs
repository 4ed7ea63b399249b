//! Envelope decoding and encoding.
//!
//! [`EventCodec`] turns wire bytes into typed [`Event`]s and back. The
//! envelope is parsed once; `eventData` stays as raw JSON and is handed, with
//! the persisted version, to the decoder that the registry resolves for the
//! envelope's type.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    event::{Event, EventEnvelope, EventSet, PayloadError},
    registry::{Registry, UnregisteredEventError},
};

/// Error returned when an envelope cannot be turned into a typed event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error(transparent)]
    Unregistered(#[from] UnregisteredEventError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// The type or version declared out of band disagrees with the envelope.
    #[error(
        "declared `{declared_type}` v{declared_version} but envelope carries `{envelope_type}` \
         v{envelope_version}"
    )]
    DeclarationMismatch {
        declared_type: String,
        declared_version: u32,
        envelope_type: String,
        envelope_version: u32,
    },
    /// Sequences and versions start at 1.
    #[error("envelope field `{field}` must be at least 1")]
    ZeroField { field: &'static str },
}

/// Error returned when an event cannot be encoded for storage.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize `{event_type}` payload: {source}")]
    Payload {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize event envelope: {0}")]
    Envelope(#[source] serde_json::Error),
}

/// Versioned codec for the event set `E`.
pub struct EventCodec<E> {
    registry: Arc<Registry<E>>,
}

impl<E> fmt::Debug for EventCodec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCodec")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<E> Clone for EventCodec<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: EventSet> EventCodec<E> {
    #[must_use]
    pub const fn new(registry: Arc<Registry<E>>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    /// Decode wire bytes using the type and version the envelope carries.
    ///
    /// # Errors
    ///
    /// See [`DecodeError`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Event<E>, DecodeError> {
        let envelope: EventEnvelope =
            serde_json::from_slice(bytes).map_err(DecodeError::Envelope)?;
        self.decode_envelope(envelope)
    }

    /// Decode wire bytes whose type and version were also delivered out of
    /// band (for example as message attributes).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::DeclarationMismatch`] if the declaration and
    /// the envelope disagree, otherwise as [`decode`](Self::decode).
    pub fn decode_declared(
        &self,
        bytes: &[u8],
        declared_type: &str,
        declared_version: u32,
    ) -> Result<Event<E>, DecodeError> {
        let envelope: EventEnvelope =
            serde_json::from_slice(bytes).map_err(DecodeError::Envelope)?;
        if envelope.event_type != declared_type || envelope.event_version != declared_version {
            return Err(DecodeError::DeclarationMismatch {
                declared_type: declared_type.to_string(),
                declared_version,
                envelope_type: envelope.event_type,
                envelope_version: envelope.event_version,
            });
        }
        self.decode_envelope(envelope)
    }

    /// Decode an already parsed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ZeroField`] for a zero sequence or version,
    /// [`DecodeError::Unregistered`] for unknown types and
    /// [`DecodeError::Payload`] if the payload rejects the bytes or version.
    pub fn decode_envelope(&self, envelope: EventEnvelope) -> Result<Event<E>, DecodeError> {
        if envelope.aggregate_sequence == 0 {
            return Err(DecodeError::ZeroField {
                field: "aggregateSequence",
            });
        }
        if envelope.event_version == 0 {
            return Err(DecodeError::ZeroField {
                field: "eventVersion",
            });
        }
        let factory = self.registry.resolve(&envelope.event_type)?;
        let data = factory.load(&envelope.data, envelope.event_version)?;
        tracing::trace!(
            event_type = %envelope.event_type,
            event_version = envelope.event_version,
            aggregate_id = %envelope.aggregate_id,
            aggregate_sequence = envelope.aggregate_sequence,
            "decoded event"
        );
        Ok(Event {
            event_id: envelope.event_id,
            aggregate_id: envelope.aggregate_id,
            aggregate_type: envelope.aggregate_type,
            aggregate_sequence: envelope.aggregate_sequence,
            event_type: envelope.event_type,
            event_version: envelope.event_version,
            timestamp: envelope.timestamp,
            data,
        })
    }

    /// Build the persisted shape of `event`, serializing the payload at its
    /// current version.
    ///
    /// The envelope's type and version describe the payload as written, so an
    /// event decoded from an older version is re-emitted at the current one.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Payload`] if the payload cannot be serialized.
    pub fn encode(&self, event: &Event<E>) -> Result<EventEnvelope, EncodeError> {
        encode_event(event)
    }

    /// Encode `event` straight to wire bytes.
    ///
    /// # Errors
    ///
    /// See [`EncodeError`].
    pub fn to_bytes(&self, event: &Event<E>) -> Result<Vec<u8>, EncodeError> {
        let envelope = self.encode(event)?;
        serde_json::to_vec(&envelope).map_err(EncodeError::Envelope)
    }
}

fn encode_event<E: EventSet>(event: &Event<E>) -> Result<EventEnvelope, EncodeError> {
    let data = event.data.encode().map_err(|source| EncodeError::Payload {
        event_type: event.data.event_type(),
        source,
    })?;
    Ok(EventEnvelope {
        event_id: event.event_id.clone(),
        aggregate_id: event.aggregate_id.clone(),
        aggregate_type: event.aggregate_type.clone(),
        aggregate_sequence: event.aggregate_sequence,
        event_type: event.data.event_type().to_string(),
        event_version: event.data.version(),
        timestamp: event.timestamp,
        data,
    })
}
