//! Creation of fresh entity instances.

use crate::entity::EntityRef;
use anyhow::anyhow;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates a new, unmanaged instance of an entity type.
///
/// Closures of the shape `Fn(&str) -> anyhow::Result<EntityRef>` implement it.
pub trait EntityFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the entity type cannot be instantiated.
    fn create(&self, entity_type: &str) -> anyhow::Result<EntityRef>;
}

impl<F> EntityFactory for F
where
    F: Fn(&str) -> anyhow::Result<EntityRef> + Send + Sync,
{
    fn create(&self, entity_type: &str) -> anyhow::Result<EntityRef> {
        self(entity_type)
    }
}

type Constructor = Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Factory backed by one constructor per entity type.
#[derive(Default, Clone)]
pub struct TypeFactory {
    constructors: HashMap<String, Constructor>,
}

impl TypeFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `entity_type`.
    #[must_use]
    pub fn with<T, F>(mut self, entity_type: impl Into<String>, construct: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructors.insert(
            entity_type.into(),
            Arc::new(move || Box::new(construct()) as Box<dyn Any + Send + Sync>),
        );
        self
    }

    /// Register `T::default` as the constructor for `entity_type`.
    #[must_use]
    pub fn with_default<T>(self, entity_type: impl Into<String>) -> Self
    where
        T: Any + Send + Sync + Default,
    {
        self.with(entity_type, T::default)
    }

    #[must_use]
    pub fn knows(&self, entity_type: &str) -> bool {
        self.constructors.contains_key(entity_type)
    }
}

impl EntityFactory for TypeFactory {
    fn create(&self, entity_type: &str) -> anyhow::Result<EntityRef> {
        let construct = self
            .constructors
            .get(entity_type)
            .ok_or_else(|| anyhow!("no constructor registered for entity type '{entity_type}'"))?;
        Ok(EntityRef::from_boxed(entity_type, construct()))
    }
}

impl std::fmt::Debug for TypeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("TypeFactory").field("types", &types).finish()
    }
}
