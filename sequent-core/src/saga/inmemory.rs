//! In-memory saga store for tests and demos.

use std::{
    collections::{HashMap, hash_map::Entry},
    future::Future,
    sync::{Arc, RwLock},
};

use crate::saga::{
    RawSaga, SagaAssociation, SagaAssociationNotFoundError, SagaLoadError, SagaNotFoundError,
    SagaStore,
};

/// Thread-safe in-memory [`SagaStore`]. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct Store {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    /// `(saga type, key)` to saga id.
    associations: HashMap<(String, SagaAssociation), String>,
    sagas: HashMap<String, RawSaga>,
}

/// Error type for the in-memory saga store.
#[derive(Debug, thiserror::Error)]
pub enum InMemorySagaError {
    /// The key already routes to a different instance of the saga type.
    #[error("association `{association}` of `{saga_type}` already routes to saga `{saga_id}`")]
    AssociationTaken {
        association: SagaAssociation,
        saga_type: String,
        saga_id: String,
    },
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved state of one instance, if any.
    #[must_use]
    pub fn saga(&self, saga_id: &str) -> Option<RawSaga> {
        self.inner
            .read()
            .expect("in-memory saga store lock poisoned")
            .sagas
            .get(saga_id)
            .cloned()
    }

    /// Every key routing to `saga_id`, sorted.
    #[must_use]
    pub fn associations_for(&self, saga_id: &str) -> Vec<SagaAssociation> {
        let inner = self.inner.read().expect("in-memory saga store lock poisoned");
        let mut keys: Vec<_> = inner
            .associations
            .iter()
            .filter(|(_, id)| id.as_str() == saga_id)
            .map(|((_, association), _)| association.clone())
            .collect();
        drop(inner);
        keys.sort();
        keys
    }

    /// Number of saved instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("in-memory saga store lock poisoned")
            .sagas
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SagaStore for Store {
    type Error = InMemorySagaError;

    #[tracing::instrument(skip(self))]
    fn load<'a>(
        &'a self,
        association: &'a SagaAssociation,
        saga_type: &'a str,
    ) -> impl Future<Output = Result<RawSaga, SagaLoadError<Self::Error>>> + Send + 'a {
        let result = (|| -> Result<RawSaga, SagaLoadError<InMemorySagaError>> {
            let inner = self.inner.read().expect("in-memory saga store lock poisoned");
            let saga_id = inner
                .associations
                .get(&(saga_type.to_string(), association.clone()))
                .ok_or_else(|| SagaAssociationNotFoundError {
                    association: association.clone(),
                    saga_type: saga_type.to_string(),
                })?;
            let saga = inner
                .sagas
                .get(saga_id)
                .cloned()
                .ok_or_else(|| SagaNotFoundError {
                    saga_id: saga_id.clone(),
                })?;
            Ok(saga)
        })();
        std::future::ready(result)
    }

    #[tracing::instrument(skip(self))]
    fn add_association<'a>(
        &'a self,
        association: &'a SagaAssociation,
        saga_type: &'a str,
        saga_id: &'a str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a {
        let result = {
            let mut inner = self
                .inner
                .write()
                .expect("in-memory saga store lock poisoned");
            let key = (saga_type.to_string(), association.clone());
            match inner.associations.entry(key) {
                Entry::Occupied(existing) if existing.get() != saga_id => {
                    Err(InMemorySagaError::AssociationTaken {
                        association: association.clone(),
                        saga_type: saga_type.to_string(),
                        saga_id: existing.get().clone(),
                    })
                }
                Entry::Occupied(_) => Ok(()),
                Entry::Vacant(slot) => {
                    slot.insert(saga_id.to_string());
                    tracing::trace!("association added");
                    Ok(())
                }
            }
        };
        std::future::ready(result)
    }

    #[tracing::instrument(skip(self, saga), fields(saga_id = %saga.id, saga_type = %saga.saga_type))]
    fn save<'a>(
        &'a self,
        saga: &'a RawSaga,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a {
        self.inner
            .write()
            .expect("in-memory saga store lock poisoned")
            .sagas
            .insert(saga.id.clone(), saga.clone());
        tracing::trace!("saga saved");
        std::future::ready(Ok(()))
    }
}
