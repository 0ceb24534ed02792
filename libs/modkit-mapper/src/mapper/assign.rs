use super::Mapper;
use crate::entity::{EntityRef, FieldValue};
use crate::error::MapperError;
use crate::metadata::EntityDescriptor;
use anyhow::anyhow;
use tracing::{debug, trace};

impl Mapper {
    /// Apply `plan` to `entity` through the setter registry.
    ///
    /// All values are converted first; the entity is only touched once every
    /// conversion succeeded. The identifier and fields without a bound setter
    /// are skipped.
    pub(super) fn fill(
        &self,
        descriptor: &EntityDescriptor,
        entity: EntityRef,
        plan: Vec<(String, FieldValue)>,
    ) -> Result<EntityRef, MapperError> {
        self.setters
            .accepts(descriptor.name(), &entity)
            .map_err(|expected| {
                anyhow!(
                    "{} instance is not a `{expected}`",
                    descriptor.name()
                )
            })?;

        let mut staged = Vec::with_capacity(plan.len());
        for (field, value) in plan {
            if field == descriptor.identifier() {
                continue;
            }

            let setter = self.setters.setter_name(&field);
            match self.setters.stage(descriptor.name(), &setter, value) {
                Some(Ok(assignment)) => staged.push(assignment),
                Some(Err(e)) => {
                    return Err(MapperError::invalid_value(
                        descriptor.name(),
                        field,
                        e.to_string(),
                    ));
                }
                None => trace!(entity = descriptor.name(), %setter, "No setter bound, skipping"),
            }
        }

        let assigned = staged.len();
        entity.with_slot_mut(|slot| {
            for assignment in staged {
                assignment(&mut *slot);
            }
        });
        debug!(entity = descriptor.name(), assigned, "Entity filled");

        Ok(entity)
    }
}
