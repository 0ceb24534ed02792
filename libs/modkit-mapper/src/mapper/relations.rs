use super::Mapper;
use crate::Payload;
use crate::entity::FieldValue;
use crate::error::MapperError;
use crate::metadata::{Cardinality, EntityDescriptor, RelationDescriptor};
use serde_json::Value;
use tracing::trace;

const EXPECTED_ONE: &str = "an object or null";
const EXPECTED_MANY: &str = "an array of objects";

impl Mapper {
    /// Map every submitted relation that has a setter on the parent, in
    /// declaration order. Relations without one are never mapped.
    pub(super) fn map_relations(
        &self,
        descriptor: &EntityDescriptor,
        mut data: Payload,
        depth: usize,
    ) -> Result<Vec<(String, FieldValue)>, MapperError> {
        let mut values = Vec::with_capacity(data.len());

        for relation in descriptor.relations() {
            let Some(value) = data.remove(&relation.name) else {
                continue;
            };
            let setter = self.setters.setter_name(&relation.name);
            if !self.setters.contains(descriptor.name(), &setter) {
                trace!(entity = descriptor.name(), %setter, "No setter bound, skipping relation");
                continue;
            }
            let mapped = self.map_relation(descriptor, relation, value, depth)?;
            values.push((relation.name.clone(), mapped));
        }

        Ok(values)
    }

    fn map_relation(
        &self,
        descriptor: &EntityDescriptor,
        relation: &RelationDescriptor,
        value: Value,
        depth: usize,
    ) -> Result<FieldValue, MapperError> {
        let shape_error =
            |expected| MapperError::invalid_relation(descriptor.name(), &relation.name, expected);

        match (relation.cardinality, value) {
            (Cardinality::ToMany, Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(data) => self.map_nested(&relation.target, data, None, depth + 1),
                    _ => Err(shape_error(EXPECTED_MANY)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Collection),
            (Cardinality::ToMany, _) => Err(shape_error(EXPECTED_MANY)),
            (Cardinality::ToOne, Value::Object(data)) => self
                .map_nested(&relation.target, data, None, depth + 1)
                .map(|entity| FieldValue::Entity(Some(entity))),
            (Cardinality::ToOne, Value::Null) => Ok(FieldValue::Entity(None)),
            (Cardinality::ToOne, _) => Err(shape_error(EXPECTED_ONE)),
        }
    }
}
