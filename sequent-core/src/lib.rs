//! Core traits and types for the Sequent event-sourcing runtime.
//!
//! This crate provides the foundational abstractions:
//!
//! - [`event`] - Payloads (`EventData`), event sets (`EventSet`), envelopes
//! - [`registry`] - Type discriminator to payload factory (`Registry`)
//! - [`codec`] - Versioned envelope decoding and encoding (`EventCodec`)
//! - [`aggregate`] - Command-side primitives (`Aggregate`, `AggregateRoot`)
//! - [`repository`] - Command processing and aggregate loading (`Repository`)
//! - [`store`] - Event persistence abstraction (`EventStore`)
//! - [`concurrency`] - Write conflicts (`AggregateLockError`)
//! - [`saga`] - Process managers (`Saga`, `SagaManager`, `SagaStore`)
//! - [`projection`] - Read-side consumers (`Projection`, `Deduplicate`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sequent_core::{
//!     event::EventSet, registry::Registry, repository::Repository, store::inmemory,
//! };
//!
//! fn repository<E: EventSet>() -> Repository<inmemory::Store, E> {
//!     Repository::new(inmemory::Store::new(), Arc::new(Registry::for_set()))
//! }
//! ```
//!
//! Most users should depend on the `sequent` crate, which re-exports these
//! types together with `#[derive(EventSet)]`.

pub mod aggregate;
pub mod codec;
pub mod concurrency;
pub mod event;
pub mod projection;
pub mod registry;
pub mod repository;
pub mod saga;
pub mod store;



#[cfg(test)]
pub(crate) mod fixtures;
