//! Event payloads, event sums, and envelopes.
//!
//! Three layers describe a fact:
//!
//! - [`EventData`] is implemented by each concrete payload struct. It carries
//!   the stable type discriminator, the current schema version, and a decoder
//!   that understands every version the payload has ever shipped.
//! - [`EventSet`] is implemented by the sum type (usually an enum with one
//!   variant per payload) that aggregates, sagas and projections match on.
//!   `#[derive(EventSet)]` generates it.
//! - [`Event`] and [`EventEnvelope`] wrap a payload with its stream
//!   metadata, decoded and raw respectively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::registry::Registry;

/// Error returned when a payload cannot be decoded from its stored bytes.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload has no decoder for the requested schema version.
    #[error("version {version} of `{event_type}` is not supported")]
    UnsupportedVersion {
        event_type: &'static str,
        version: u32,
    },
    /// The bytes do not match the shape of the requested version.
    #[error("malformed `{event_type}` payload (version {version}): {source}")]
    Malformed {
        event_type: &'static str,
        version: u32,
        #[source]
        source: serde_json::Error,
    },
}

impl PayloadError {
    /// Shorthand for [`PayloadError::UnsupportedVersion`].
    #[must_use]
    pub const fn unsupported(event_type: &'static str, version: u32) -> Self {
        Self::UnsupportedVersion {
            event_type,
            version,
        }
    }
}

/// Deserialize one version's wire shape, tagging failures with the type and
/// version being decoded.
///
/// Payload implementations call this from each branch of their
/// [`EventData::load`] match.
///
/// # Errors
///
/// Returns [`PayloadError::Malformed`] if `data` does not match `T`.
pub fn decode_json<T: DeserializeOwned>(
    event_type: &'static str,
    version: u32,
    data: &RawValue,
) -> Result<T, PayloadError> {
    serde_json::from_str(data.get()).map_err(|source| PayloadError::Malformed {
        event_type,
        version,
        source,
    })
}

/// A strongly typed, versioned event payload.
///
/// `Serialize` writes, and `Deserialize` reads, the current version.
/// [`load`](Self::load) must accept the current version and every older
/// version that was ever persisted, mapping old shapes onto the current
/// in-memory representation (upcasting). Stored events are never rewritten.
///
/// ```ignore
/// impl EventData for ServiceTypeSet {
///     const EVENT_TYPE: &'static str = "OrderServiceTypeSet";
///     const VERSION: u32 = 2;
///
///     fn load(data: &RawValue, version: u32) -> Result<Self, PayloadError> {
///         match version {
///             1 => decode_json::<v1::ServiceTypeSet>(Self::EVENT_TYPE, 1, data).map(Into::into),
///             2 => decode_json(Self::EVENT_TYPE, 2, data),
///             other => Err(PayloadError::unsupported(Self::EVENT_TYPE, other)),
///         }
///     }
/// }
/// ```
pub trait EventData: Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable registry discriminator, conventionally the type's name.
    ///
    /// This string is persisted with every event and must never change once
    /// events have been written under it.
    const EVENT_TYPE: &'static str;

    /// Schema version that [`Serialize`] produces.
    const VERSION: u32;

    /// Decode a payload persisted under `version`.
    ///
    /// The default implementation only understands [`Self::VERSION`]; types
    /// with history override it.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnsupportedVersion`] for unknown versions and
    /// [`PayloadError::Malformed`] for bytes that do not fit the version's
    /// shape.
    fn load(data: &RawValue, version: u32) -> Result<Self, PayloadError> {
        if version == Self::VERSION {
            decode_json(Self::EVENT_TYPE, version, data)
        } else {
            Err(PayloadError::unsupported(Self::EVENT_TYPE, version))
        }
    }
}

/// The closed set of payloads an aggregate (or an application) works with.
///
/// In-process code dispatches on the implementing enum with an ordinary
/// `match`; the registry only uses the discriminator strings to pick a
/// decoder when reading stored bytes.
pub trait EventSet: Send + Sync + Sized + 'static {
    /// Every discriminator this set can hold.
    const EVENT_TYPES: &'static [&'static str];

    /// Discriminator of the contained payload.
    fn event_type(&self) -> &'static str;

    /// Current schema version of the contained payload.
    fn version(&self) -> u32;

    /// Serialize the contained payload at its current version.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the payload cannot be encoded.
    fn encode(&self) -> Result<Box<RawValue>, serde_json::Error>;

    /// Register a decoder for every payload in the set.
    fn register_all(registry: &mut Registry<Self>);
}

/// A committed fact with its payload decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<E> {
    pub event_id: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub aggregate_sequence: u64,
    pub event_type: String,
    pub event_version: u32,
    pub timestamp: DateTime<Utc>,
    pub data: E,
}

impl<E> Event<E> {
    /// Replace the payload, keeping the envelope metadata.
    pub fn map<F, T>(self, f: F) -> Event<T>
    where
        F: FnOnce(E) -> T,
    {
        Event {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            aggregate_sequence: self.aggregate_sequence,
            event_type: self.event_type,
            event_version: self.event_version,
            timestamp: self.timestamp,
            data: f(self.data),
        }
    }
}

/// The persisted and transmitted shape of an event.
///
/// `eventData` is kept as raw JSON so the codec can hand the exact bytes to
/// the payload's versioned decoder without a re-serialization round trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub aggregate_sequence: u64,
    pub event_type: String,
    pub event_version: u32,
    #[serde(rename = "eventTimestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "eventData")]
    pub data: Box<RawValue>,
}
