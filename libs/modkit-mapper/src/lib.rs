#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Recursive object mapper for ModKit entities.
//!
//! The mapper takes loosely-typed JSON payloads and populates entities held by
//! an external store, enforcing per-field gates and declarative validation
//! rules along the way:
//!
//! ```text
//! map(type, data, id?)
//!   -> reconcile identifier
//!   -> resolve entity (store lookup or factory)
//!   -> [gate fields]            (when a PermissionCheck is configured)
//!   -> split scalar / relation fields
//!   -> [validate scalars + relations] (when a RuleChecker is configured)
//!   -> map relations recursively
//!   -> assign through the setter registry
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Arc::new(InMemoryStore::new().with_descriptor(
//!     EntityDescriptor::builder("User")
//!         .field("email")
//!         .rule("email", FieldRule::new("required|email"))
//!         .build()?,
//! ));
//!
//! let setters = SetterRegistry::default().with(
//!     EntityBinding::<User>::new("User").scalar("email", |u, v: String| u.email = v),
//! );
//!
//! let factory = TypeFactory::new().with_default::<User>("User");
//! let mapper = Mapper::builder(store, Arc::new(factory), setters).build();
//! let user = mapper.map_json("User", r#"{"email":"a@b.c"}"#)?;
//! ```
pub mod config;
pub mod entity;
pub mod error;
pub mod factory;
pub mod mapper;
pub mod memory;
pub mod metadata;
pub mod ports;
pub mod rules;
pub mod setters;

pub use config::MapperConfig;
pub use entity::{EntityRef, FieldValue};
pub use error::MapperError;
pub use factory::{EntityFactory, TypeFactory};
pub use mapper::{Mapper, MapperBuilder};
pub use memory::InMemoryStore;
pub use metadata::{
    Cardinality, EntityDescriptor, EntityDescriptorBuilder, FieldRule, GateRule, GateStrategy,
    MetadataStore, RelationDescriptor,
};
pub use ports::{PermissionCheck, RuleChecker, RuleSet, ValidationFailures};
pub use setters::{EntityBinding, SetterError, SetterRegistry};

/// Raw input of one mapping call: field name to arbitrary JSON value.
pub type Payload = serde_json::Map<String, serde_json::Value>;
