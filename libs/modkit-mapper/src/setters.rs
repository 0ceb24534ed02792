//! Explicit setter registry.
//!
//! Every entity type registers an [`EntityBinding`] once at startup. A setter is looked up
//! by name (`prefix` + upper camel case field name, e.g. `setFirstName`) and
//! runs in two steps: it first converts the [`FieldValue`] into the concrete
//! field type, producing a staged assignment, and only later applies it to
//! the entity. This lets the mapper reject a bad value before touching the
//! entity at all.

use crate::config::MapperConfig;
use crate::entity::{EntityRef, FieldValue};
use heck::ToUpperCamelCase;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// A setter could not convert the value it was given.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SetterError(String);

impl SetterError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Assignment ready to be applied to an entity slot.
pub(crate) type Staged = Box<dyn FnOnce(&mut (dyn Any + Send + Sync)) + Send>;

type StageFn = Arc<dyn Fn(FieldValue) -> Result<Staged, SetterError> + Send + Sync>;

struct Setter {
    /// Field the setter was bound to; `None` for explicitly named setters.
    field: Option<String>,
    stage: StageFn,
}

struct Binding {
    type_id: TypeId,
    type_name: &'static str,
    setters: HashMap<String, Setter>,
}

/// Setters of every bound entity type, keyed by setter name.
pub struct SetterRegistry {
    prefix: String,
    bindings: HashMap<String, Binding>,
}

impl Default for SetterRegistry {
    fn default() -> Self {
        Self::new("set")
    }
}

impl SetterRegistry {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            bindings: HashMap::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &MapperConfig) -> Self {
        Self::new(config.setter_prefix.clone())
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Setter name for a field: prefix followed by the field name in upper camel case.
    #[must_use]
    pub fn setter_name(&self, field: &str) -> String {
        setter_name(&self.prefix, field)
    }

    /// Switch to another prefix. Field-bound setters are renamed;
    /// explicitly named ones keep their name.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
        let prefix = &self.prefix;
        for binding in self.bindings.values_mut() {
            binding.setters = std::mem::take(&mut binding.setters)
                .into_iter()
                .map(|(name, setter)| {
                    let name = setter
                        .field
                        .as_deref()
                        .map_or(name, |field| setter_name(prefix, field));
                    (name, setter)
                })
                .collect();
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.set_prefix(prefix);
        self
    }

    /// Add the setters of `binding`.
    ///
    /// Setters of an entity type already bound to the same Rust type are
    /// merged; binding it to a different Rust type discards the old ones.
    pub fn register<T: Any + Send + Sync>(&mut self, binding: EntityBinding<T>) {
        let type_id = TypeId::of::<T>();
        let entry = self
            .bindings
            .entry(binding.entity_type)
            .or_insert_with(|| Binding {
                type_id,
                type_name: std::any::type_name::<T>(),
                setters: HashMap::new(),
            });
        if entry.type_id != type_id {
            *entry = Binding {
                type_id,
                type_name: std::any::type_name::<T>(),
                setters: HashMap::new(),
            };
        }

        for (key, stage) in binding.setters {
            let (name, field) = match key {
                SetterKey::Field(field) => (setter_name(&self.prefix, &field), Some(field)),
                SetterKey::Name(name) => (name, None),
            };
            entry.setters.insert(name, Setter { field, stage });
        }
    }

    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, binding: EntityBinding<T>) -> Self {
        self.register(binding);
        self
    }

    #[must_use]
    pub fn contains(&self, entity_type: &str, setter_name: &str) -> bool {
        self.bindings
            .get(entity_type)
            .is_some_and(|b| b.setters.contains_key(setter_name))
    }

    /// Whether `entity` holds the Rust type bound to `entity_type`.
    /// Unbound types are accepted since they have no setters to run.
    pub(crate) fn accepts(&self, entity_type: &str, entity: &EntityRef) -> Result<(), &'static str> {
        match self.bindings.get(entity_type) {
            Some(b) if !entity.holds(b.type_id) => Err(b.type_name),
            _ => Ok(()),
        }
    }

    /// Convert `value` with the named setter. `None` when no such setter is
    /// bound.
    pub(crate) fn stage(
        &self,
        entity_type: &str,
        setter_name: &str,
        value: FieldValue,
    ) -> Option<Result<Staged, SetterError>> {
        let setter = self.bindings.get(entity_type)?.setters.get(setter_name)?;
        Some((setter.stage)(value))
    }
}

enum SetterKey {
    Field(String),
    Name(String),
}

/// Setters of one entity type backed by the Rust type `T`.
///
/// ```rust,ignore
/// let binding = EntityBinding::<User>::new("User")
///     .scalar("email", |u, v: String| u.email = v)
///     .to_one("team", |u, team| u.team = team);
/// registry.register(binding);
/// ```
pub struct EntityBinding<T> {
    entity_type: String,
    setters: Vec<(SetterKey, StageFn)>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Any + Send + Sync> EntityBinding<T> {
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            setters: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Bind a scalar field; the JSON value is deserialized into `V`.
    #[must_use]
    pub fn scalar<V, F>(self, field: &str, set: F) -> Self
    where
        V: DeserializeOwned + Send + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let set = Arc::new(set);
        self.field(field, move |value| match value {
            FieldValue::Scalar(raw) => {
                let value: V =
                    serde_json::from_value(raw).map_err(|e| SetterError::new(e.to_string()))?;
                let set = Arc::clone(&set);
                Ok(apply::<T>(move |entity| (*set)(entity, value)))
            }
            other => Err(mismatch("scalar", &other)),
        })
    }

    /// Bind a to-one relation.
    #[must_use]
    pub fn to_one<F>(self, field: &str, set: F) -> Self
    where
        F: Fn(&mut T, Option<EntityRef>) + Send + Sync + 'static,
    {
        let set = Arc::new(set);
        self.field(field, move |value| match value {
            FieldValue::Entity(related) => {
                let set = Arc::clone(&set);
                Ok(apply::<T>(move |entity| (*set)(entity, related)))
            }
            other => Err(mismatch("entity", &other)),
        })
    }

    /// Bind a to-many relation.
    #[must_use]
    pub fn to_many<F>(self, field: &str, set: F) -> Self
    where
        F: Fn(&mut T, Vec<EntityRef>) + Send + Sync + 'static,
    {
        let set = Arc::new(set);
        self.field(field, move |value| match value {
            FieldValue::Collection(related) => {
                let set = Arc::clone(&set);
                Ok(apply::<T>(move |entity| (*set)(entity, related)))
            }
            other => Err(mismatch("collection", &other)),
        })
    }

    /// Bind a setter under an explicit name, receiving the raw
    /// [`FieldValue`]. `stage` validates and converts; the closure it
    /// returns performs the assignment.
    #[must_use]
    pub fn setter<S, A>(mut self, setter_name: &str, stage: S) -> Self
    where
        S: Fn(FieldValue) -> Result<A, SetterError> + Send + Sync + 'static,
        A: FnOnce(&mut T) + Send + 'static,
    {
        let stage: StageFn = Arc::new(move |value| stage(value).map(|assign| apply::<T>(assign)));
        self.setters
            .push((SetterKey::Name(setter_name.to_owned()), stage));
        self
    }

    fn field<S>(mut self, field: &str, stage: S) -> Self
    where
        S: Fn(FieldValue) -> Result<Staged, SetterError> + Send + Sync + 'static,
    {
        self.setters
            .push((SetterKey::Field(field.to_owned()), Arc::new(stage)));
        self
    }
}

fn apply<T: Any>(assign: impl FnOnce(&mut T) + Send + 'static) -> Staged {
    Box::new(move |slot: &mut (dyn Any + Send + Sync)| {
        if let Some(entity) = slot.downcast_mut::<T>() {
            assign(entity);
        }
    })
}

fn setter_name(prefix: &str, field: &str) -> String {
    format!("{prefix}{}", field.to_upper_camel_case())
}

fn mismatch(expected: &str, got: &FieldValue) -> SetterError {
    SetterError::new(format!("expected {expected} value, got {}", got.kind()))
}
