//! In-memory metadata store with an identity map.
//!
//! Useful for tests and for embedders that keep entities in process. Entities
//! become "existing" once [`InMemoryStore::persist`] has been called for them.

use crate::entity::EntityRef;
use crate::metadata::{EntityDescriptor, MetadataStore};
use crate::rules::identifier_text;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type IdentityKey = (String, String);

#[derive(Default)]
pub struct InMemoryStore {
    descriptors: HashMap<String, Arc<EntityDescriptor>>,
    managed: RwLock<HashMap<IdentityKey, EntityRef>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_descriptor(mut self, descriptor: EntityDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Add or replace the descriptor of an entity type.
    pub fn register(&mut self, descriptor: EntityDescriptor) {
        self.descriptors
            .insert(descriptor.name().to_owned(), Arc::new(descriptor));
    }

    /// Track `entity` as persisted under `id`. Returns the entity previously
    /// tracked under the same identity, if any.
    pub fn persist(&self, entity: &EntityRef, id: &Value) -> Option<EntityRef> {
        let key = identity_key(entity.entity_type(), id);
        tracing::debug!(entity = %entity, id = %key.1, "Persisting entity");
        self.managed.write().insert(key, entity.clone())
    }

    /// Stop tracking the entity stored under `id`.
    pub fn detach(&self, entity_type: &str, id: &Value) -> Option<EntityRef> {
        self.managed.write().remove(&identity_key(entity_type, id))
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.managed.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managed.read().is_empty()
    }
}

// Identifiers arrive as strings from paths and as numbers from JSON bodies;
// both spellings address the same entity.
fn identity_key(entity_type: &str, id: &Value) -> IdentityKey {
    (entity_type.to_owned(), identifier_text(id).into_owned())
}

impl MetadataStore for InMemoryStore {
    fn descriptor(&self, entity_type: &str) -> Option<Arc<EntityDescriptor>> {
        self.descriptors.get(entity_type).cloned()
    }

    fn find(&self, entity_type: &str, id: &Value) -> anyhow::Result<Option<EntityRef>> {
        Ok(self
            .managed
            .read()
            .get(&identity_key(entity_type, id))
            .cloned())
    }

    fn is_existing(&self, entity: &EntityRef) -> bool {
        self.managed.read().values().any(|e| e.ptr_eq(entity))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("InMemoryStore")
            .field("descriptors", &types)
            .field("managed", &self.len())
            .finish()
    }
}
