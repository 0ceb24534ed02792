use super::Mapper;
use crate::Payload;
use crate::entity::EntityRef;
use crate::error::MapperError;
use crate::metadata::{EntityDescriptor, GateStrategy};
use crate::ports::PermissionCheck;
use std::collections::BTreeSet;
use tracing::{debug, warn};

impl Mapper {
    /// Check the gate of every submitted field, in declaration order.
    ///
    /// Returns the fields dropped by `Ignore` gates; a closed `Restrict` gate
    /// fails the call.
    pub(super) fn pass_through_gates(
        &self,
        keeper: &dyn PermissionCheck,
        descriptor: &EntityDescriptor,
        entity: &EntityRef,
        data: &Payload,
    ) -> Result<BTreeSet<String>, MapperError> {
        let mut dropped = BTreeSet::new();

        for field in descriptor.all_fields().filter(|f| data.contains_key(*f)) {
            let Some(gate) = self.store.gate_rule(descriptor.name(), field) else {
                continue;
            };

            if keeper.allows(&gate.ability, entity) {
                continue;
            }

            match gate.strategy {
                GateStrategy::Ignore => {
                    debug!(
                        entity = descriptor.name(),
                        field,
                        ability = %gate.ability,
                        "Gate closed, dropping field"
                    );
                    dropped.insert(field.to_owned());
                }
                GateStrategy::Restrict => {
                    warn!(
                        entity = descriptor.name(),
                        field,
                        ability = %gate.ability,
                        "Gate closed, rejecting mapping"
                    );
                    return Err(MapperError::permission_denied(
                        descriptor.name(),
                        field,
                        gate.ability,
                    ));
                }
            }
        }

        Ok(dropped)
    }
}
