//! The mapping engine.
//!
//! One [`Mapper`] is built at startup from its collaborators and can then
//! serve any number of calls. Each call is synchronous and depth-first:
//! children are resolved, validated and assigned before their parent's
//! setters run, and the first failure anywhere in the tree aborts the whole
//! call.

mod assign;
mod gate;
mod relations;
mod validate;


use crate::Payload;
use crate::config::MapperConfig;
use crate::entity::{EntityRef, FieldValue};
use crate::error::MapperError;
use crate::factory::EntityFactory;
use crate::metadata::{EntityDescriptor, MetadataStore};
use crate::ports::{PermissionCheck, RuleChecker};
use crate::rules::identifier_text;
use crate::setters::SetterRegistry;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maps JSON payloads onto store-managed entities.
pub struct Mapper {
    store: Arc<dyn MetadataStore>,
    factory: Arc<dyn EntityFactory>,
    setters: SetterRegistry,
    keeper: Option<Arc<dyn PermissionCheck>>,
    validator: Option<Arc<dyn RuleChecker>>,
    config: MapperConfig,
}

pub struct MapperBuilder {
    store: Arc<dyn MetadataStore>,
    factory: Arc<dyn EntityFactory>,
    setters: SetterRegistry,
    keeper: Option<Arc<dyn PermissionCheck>>,
    validator: Option<Arc<dyn RuleChecker>>,
    config: MapperConfig,
}

impl MapperBuilder {
    /// Gate fields through `keeper`. Without one, no field is gated.
    #[must_use]
    pub fn keeper(mut self, keeper: Arc<dyn PermissionCheck>) -> Self {
        self.keeper = Some(keeper);
        self
    }

    /// Validate fields with `validator`. Without one, rules are ignored.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn RuleChecker>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the mapper. Setters are keyed by `config.setter_prefix`,
    /// whatever prefix the registry was created with.
    #[must_use]
    pub fn build(self) -> Mapper {
        let mut setters = self.setters;
        if setters.prefix() != self.config.setter_prefix {
            setters.set_prefix(self.config.setter_prefix.clone());
        }
        Mapper {
            store: self.store,
            factory: self.factory,
            setters,
            keeper: self.keeper,
            validator: self.validator,
            config: self.config,
        }
    }
}

impl Mapper {
    /// Start a mapper. Until [`MapperBuilder::config`] is called the
    /// configuration takes its setter prefix from `setters`.
    #[must_use]
    pub fn builder(
        store: Arc<dyn MetadataStore>,
        factory: Arc<dyn EntityFactory>,
        setters: SetterRegistry,
    ) -> MapperBuilder {
        let config = MapperConfig::default().with_setter_prefix(setters.prefix());
        MapperBuilder {
            store,
            factory,
            setters,
            keeper: None,
            validator: None,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    #[must_use]
    pub fn setters(&self) -> &SetterRegistry {
        &self.setters
    }

    /// Decode `json` and map it onto an entity of `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if `json` is not a JSON object, and any error
    /// of [`Mapper::map`] otherwise.
    #[instrument(skip_all, fields(entity = entity_type, len = json.len()))]
    pub fn map_json(&self, entity_type: &str, json: &str) -> Result<EntityRef, MapperError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| MapperError::invalid_payload(e.to_string()))?;
        self.map_value(entity_type, value, None)
    }

    /// Map an already decoded value, which must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` for non-object values, and any error of
    /// [`Mapper::map`] otherwise.
    pub fn map_value(
        &self,
        entity_type: &str,
        value: Value,
        id: Option<Value>,
    ) -> Result<EntityRef, MapperError> {
        match value {
            Value::Object(data) => self.map(entity_type, data, id),
            other => Err(MapperError::invalid_payload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Map `data` onto an entity of `entity_type`.
    ///
    /// With an identifier (explicit or embedded in `data`) the entity is
    /// looked up in the store; without one a new entity is created. The
    /// returned handle is the entity that was filled.
    ///
    /// # Errors
    ///
    /// - `IdentifierConflict` if `id` and the embedded identifier differ
    /// - `EntityNotFound` if the identified entity does not exist
    /// - `PermissionDenied` if a restricting gate refuses a submitted field
    /// - `ValidationFailed` if the rule checker reports failures
    /// - `InvalidRelation` / `InvalidValue` for values of the wrong shape
    /// - `UnknownEntity`, `DepthLimitExceeded`, `Internal` otherwise
    #[instrument(skip_all, fields(entity = entity_type))]
    pub fn map(
        &self,
        entity_type: &str,
        data: Payload,
        id: Option<Value>,
    ) -> Result<EntityRef, MapperError> {
        self.map_nested(entity_type, data, id, 0)
    }

    fn map_nested(
        &self,
        entity_type: &str,
        mut data: Payload,
        id: Option<Value>,
        depth: usize,
    ) -> Result<EntityRef, MapperError> {
        if depth > self.config.max_depth {
            return Err(MapperError::DepthLimitExceeded {
                limit: self.config.max_depth,
            });
        }

        let descriptor = self
            .store
            .descriptor(entity_type)
            .ok_or_else(|| MapperError::unknown_entity(entity_type))?;

        let id = reconcile_identifier(&descriptor, &mut data, id)?;
        self.build_entity(&descriptor, data, id.as_ref(), depth)
    }

    fn build_entity(
        &self,
        descriptor: &EntityDescriptor,
        mut data: Payload,
        id: Option<&Value>,
        depth: usize,
    ) -> Result<EntityRef, MapperError> {
        let entity = self.resolve(descriptor.name(), id)?;

        let dropped = match &self.keeper {
            Some(keeper) => self.pass_through_gates(keeper.as_ref(), descriptor, &entity, &data)?,
            None => BTreeSet::new(),
        };

        let scalar_fields: Vec<&str> = descriptor
            .fields()
            .filter(|f| !dropped.contains(*f))
            .collect();
        let relation_fields: Vec<&str> = descriptor
            .relation_names()
            .filter(|f| !dropped.contains(*f))
            .collect();

        let mut scalar_data = take_fields(&mut data, &scalar_fields);
        let relation_data = take_fields(&mut data, &relation_fields);
        if !data.is_empty() {
            debug!(
                entity = descriptor.name(),
                ignored = ?data.keys().collect::<Vec<_>>(),
                "Ignoring undeclared or gated fields"
            );
        }

        if let Some(validator) = &self.validator {
            self.validate(
                validator.as_ref(),
                descriptor,
                &entity,
                id,
                [
                    (scalar_fields.as_slice(), &scalar_data),
                    (relation_fields.as_slice(), &relation_data),
                ],
            )?;
        }

        let relations = self.map_relations(descriptor, relation_data, depth)?;

        let mut plan: Vec<(String, FieldValue)> = scalar_fields
            .iter()
            .filter_map(|field| {
                scalar_data
                    .remove(*field)
                    .map(|value| ((*field).to_owned(), FieldValue::Scalar(value)))
            })
            .collect();
        plan.extend(relations);

        self.fill(descriptor, entity, plan)
    }

    fn resolve(&self, entity_type: &str, id: Option<&Value>) -> Result<EntityRef, MapperError> {
        if let Some(id) = id {
            let entity = self
                .store
                .find(entity_type, id)?
                .ok_or_else(|| MapperError::entity_not_found(entity_type, id))?;
            debug!(entity = entity_type, id = %identifier_text(id), "Resolved managed entity");
            return Ok(entity);
        }

        let entity = self.factory.create(entity_type)?;
        debug!(entity = entity_type, "Created new entity");
        Ok(entity)
    }
}

/// Settle on one identifier for the call and write it back into `data`.
///
/// A `null` identifier counts as absent on both sides.
fn reconcile_identifier(
    descriptor: &EntityDescriptor,
    data: &mut Payload,
    explicit: Option<Value>,
) -> Result<Option<Value>, MapperError> {
    let explicit = explicit.filter(|v| !v.is_null());
    let embedded = data
        .get(descriptor.identifier())
        .filter(|v| !v.is_null())
        .cloned();

    match (explicit, embedded) {
        (Some(explicit), Some(embedded)) if explicit != embedded => Err(
            MapperError::identifier_conflict(descriptor.name(), explicit, embedded),
        ),
        (Some(explicit), _) => {
            data.insert(descriptor.identifier().to_owned(), explicit.clone());
            Ok(Some(explicit))
        }
        (None, embedded) => Ok(embedded),
    }
}

fn take_fields(data: &mut Payload, fields: &[&str]) -> Payload {
    let mut taken = Payload::new();
    for field in fields {
        if let Some(value) = data.remove(*field) {
            taken.insert((*field).to_owned(), value);
        }
    }
    taken
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
