#![doc = include_str!("../README.md")]

#[cfg(feature = "test-util")]
pub use sequent_core::test;
pub use sequent_core::{
    aggregate,
    aggregate::{Aggregate, AggregateContext, AggregateRoot, ApplyError, Command},
    codec,
    codec::{DecodeError, EncodeError, EventCodec},
    concurrency,
    concurrency::AggregateLockError,
    event,
    event::{Event, EventData, EventEnvelope, EventSet, PayloadError},
    projection,
    projection::{Deduplicate, Projection},
    registry,
    registry::{Registry, UnregisteredEventError},
    repository,
    repository::{CommandError, LoadError, Repository},
    saga,
    saga::{Saga, SagaAssociation, SagaError, SagaManager, SagaStore},
};
// Re-export proc macro derives so consumers only depend on `sequent`. The
// derive shares its name with the trait, as with serde.
pub use sequent_macros::EventSet;

pub mod store {
    pub use sequent_core::store::{AppendError, EventStore, inmemory};
}

// Paths used by `#[derive(EventSet)]` expansions.
#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
