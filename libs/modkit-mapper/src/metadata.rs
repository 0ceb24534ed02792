//! Entity descriptors and the metadata store contract.
//!
//! Descriptors are built explicitly at startup (or generated from a schema)
//! and carry everything the mapper needs to know about an entity type: its
//! identifier, its scalar fields and relations in declaration order, and the
//! per-field validation and gate rules.

use crate::entity::EntityRef;
use anyhow::bail;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Cardinality of a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub name: String,
    pub cardinality: Cardinality,
    /// Entity type name of the related entity.
    pub target: String,
}

/// Validation rule template attached to one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRule {
    pub rule: String,
    /// Appended to the field name to form the rule key, so one field can
    /// carry an extra independent rule (e.g. a `_confirmation` companion).
    pub sub: Option<String>,
}

impl FieldRule {
    #[must_use]
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            sub: None,
        }
    }

    #[must_use]
    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Key under which this rule is checked for `field`.
    #[must_use]
    pub fn key(&self, field: &str) -> String {
        match &self.sub {
            Some(sub) => format!("{field}{sub}"),
            None => field.to_owned(),
        }
    }
}

/// What happens when a gate refuses a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateStrategy {
    /// Drop the field and keep mapping.
    Ignore,
    /// Abort the whole mapping call.
    #[default]
    Restrict,
}

/// Ability a caller needs to set a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateRule {
    pub ability: String,
    pub strategy: GateStrategy,
}

impl GateRule {
    #[must_use]
    pub fn new(ability: impl Into<String>, strategy: GateStrategy) -> Self {
        Self {
            ability: ability.into(),
            strategy,
        }
    }

    #[must_use]
    pub fn ignore(ability: impl Into<String>) -> Self {
        Self::new(ability, GateStrategy::Ignore)
    }

    #[must_use]
    pub fn restrict(ability: impl Into<String>) -> Self {
        Self::new(ability, GateStrategy::Restrict)
    }
}

/// Read-only description of one entity type.
#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    name: String,
    identifier: String,
    fields: Vec<String>,
    relations: Vec<RelationDescriptor>,
    field_rules: HashMap<String, FieldRule>,
    gate_rules: HashMap<String, GateRule>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the identifier field.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Scalar field names in declaration order, identifier included.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    #[must_use]
    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Relation names in declaration order.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(|r| r.name.as_str())
    }

    /// Scalar fields followed by relations.
    pub fn all_fields(&self) -> impl Iterator<Item = &str> {
        self.fields().chain(self.relation_names())
    }

    #[must_use]
    pub fn is_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    #[must_use]
    pub fn is_relation(&self, name: &str) -> bool {
        self.relation(name).is_some()
    }

    #[must_use]
    pub fn field_rule(&self, field: &str) -> Option<&FieldRule> {
        self.field_rules.get(field)
    }

    #[must_use]
    pub fn gate_rule(&self, field: &str) -> Option<&GateRule> {
        self.gate_rules.get(field)
    }
}

pub struct EntityDescriptorBuilder {
    name: String,
    identifier: String,
    fields: Vec<String>,
    relations: Vec<RelationDescriptor>,
    field_rules: Vec<(String, FieldRule)>,
    gate_rules: Vec<(String, GateRule)>,
}

impl EntityDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: "id".to_owned(),
            fields: Vec::new(),
            relations: Vec::new(),
            field_rules: Vec::new(),
            gate_rules: Vec::new(),
        }
    }

    /// Set the identifier field name (default: `id`).
    #[must_use]
    pub fn identifier(mut self, name: impl Into<String>) -> Self {
        self.identifier = name.into();
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn to_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relation(name, Cardinality::ToOne, target)
    }

    #[must_use]
    pub fn to_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relation(name, Cardinality::ToMany, target)
    }

    #[must_use]
    pub fn relation(
        mut self,
        name: impl Into<String>,
        cardinality: Cardinality,
        target: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDescriptor {
            name: name.into(),
            cardinality,
            target: target.into(),
        });
        self
    }

    /// Attach a validation rule to a field or relation.
    #[must_use]
    pub fn rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.field_rules.push((field.into(), rule));
        self
    }

    /// Attach a gate to a field or relation.
    #[must_use]
    pub fn gate(mut self, field: impl Into<String>, gate: GateRule) -> Self {
        self.gate_rules.push((field.into(), gate));
        self
    }

    /// Build the descriptor.
    ///
    /// The identifier field is prepended to the scalar fields when it was not
    /// declared explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a name is declared twice (across fields and relations)
    /// - a rule or gate targets an undeclared name
    pub fn build(mut self) -> anyhow::Result<EntityDescriptor> {
        if !self.fields.contains(&self.identifier) {
            self.fields.insert(0, self.identifier.clone());
        }

        let mut seen = HashSet::new();
        for name in self
            .fields
            .iter()
            .chain(self.relations.iter().map(|r| &r.name))
        {
            if !seen.insert(name.as_str()) {
                bail!("{}: '{name}' is declared more than once", self.name);
            }
        }

        for field in self
            .field_rules
            .iter()
            .map(|(f, _)| f)
            .chain(self.gate_rules.iter().map(|(f, _)| f))
        {
            if !seen.contains(field.as_str()) {
                bail!("{}: rule targets undeclared field '{field}'", self.name);
            }
        }

        Ok(EntityDescriptor {
            name: self.name,
            identifier: self.identifier,
            fields: self.fields,
            relations: self.relations,
            field_rules: self.field_rules.into_iter().collect(),
            gate_rules: self.gate_rules.into_iter().collect(),
        })
    }
}

/// Metadata and identity-map access the mapper needs from the ORM layer.
///
/// Implementations must be safe for concurrent reads when one mapper serves
/// several calls at once.
pub trait MetadataStore: Send + Sync {
    /// Descriptor for `entity_type`, if the type is known.
    fn descriptor(&self, entity_type: &str) -> Option<Arc<EntityDescriptor>>;

    /// Look up a managed entity by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails; a missing entity is
    /// `Ok(None)`.
    fn find(&self, entity_type: &str, id: &Value) -> anyhow::Result<Option<EntityRef>>;

    /// Whether the store already tracks `entity` as persisted.
    fn is_existing(&self, entity: &EntityRef) -> bool;

    fn field_rule(&self, entity_type: &str, field: &str) -> Option<FieldRule> {
        self.descriptor(entity_type)?.field_rule(field).cloned()
    }

    fn gate_rule(&self, entity_type: &str, field: &str) -> Option<GateRule> {
        self.descriptor(entity_type)?.gate_rule(field).cloned()
    }
}
