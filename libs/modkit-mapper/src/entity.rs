//! Opaque entity handles and the values handed to setters.

use parking_lot::RwLock;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

type Slot = Box<dyn Any + Send + Sync>;

struct EntityCell {
    entity_type: String,
    slot: RwLock<Slot>,
}

/// Shared handle to a domain object owned by the store.
///
/// The mapper never looks inside the object: it only passes the handle to
/// collaborators and applies staged setters through it. Clones point at the
/// same object, and equality is identity.
#[derive(Clone)]
pub struct EntityRef {
    inner: Arc<EntityCell>,
}

impl EntityRef {
    /// Wrap a domain object under the given entity type name.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(entity_type: impl Into<String>, value: T) -> Self {
        Self {
            inner: Arc::new(EntityCell {
                entity_type: entity_type.into(),
                slot: RwLock::new(Box::new(value)),
            }),
        }
    }

    pub(crate) fn from_boxed(entity_type: impl Into<String>, value: Slot) -> Self {
        Self {
            inner: Arc::new(EntityCell {
                entity_type: entity_type.into(),
                slot: RwLock::new(value),
            }),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.inner.entity_type
    }

    /// Whether the wrapped object is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.holds(TypeId::of::<T>())
    }

    pub(crate) fn holds(&self, type_id: TypeId) -> bool {
        (**self.inner.slot.read()).type_id() == type_id
    }

    /// Run `f` against the wrapped object if it is a `T`.
    pub fn read<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.inner.slot.read();
        guard.downcast_ref::<T>().map(f)
    }

    /// Run `f` against the wrapped object mutably if it is a `T`.
    pub fn write<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.slot.write();
        guard.downcast_mut::<T>().map(f)
    }

    /// Hold the write lock for the duration of `f`.
    pub(crate) fn with_slot_mut<R>(&self, f: impl FnOnce(&mut (dyn Any + Send + Sync)) -> R) -> R {
        let mut guard = self.inner.slot.write();
        f(&mut **guard)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EntityRef {}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("entity_type", &self.inner.entity_type)
            .field("addr", &Arc::as_ptr(&self.inner))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.entity_type)
    }
}

/// Value passed to a setter once a field has been mapped.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Raw JSON for a scalar field.
    Scalar(Value),
    /// Mapped target of a to-one relation; `None` detaches it.
    Entity(Option<EntityRef>),
    /// Mapped targets of a to-many relation, in input order.
    Collection(Vec<EntityRef>),
}

impl FieldValue {
    /// Short label used in setter error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "scalar",
            FieldValue::Entity(_) => "entity",
            FieldValue::Collection(_) => "collection",
        }
    }
}
