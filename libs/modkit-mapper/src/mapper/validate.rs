use super::Mapper;
use crate::Payload;
use crate::entity::EntityRef;
use crate::error::MapperError;
use crate::metadata::EntityDescriptor;
use crate::ports::{RuleChecker, RuleSet, ValidationFailures};
use crate::rules::{RuleContext, prepare_rule};
use serde_json::Value;
use tracing::debug;

impl Mapper {
    /// Run the checker once per pass (scalars, then relations) and fail with
    /// every collected failure.
    pub(super) fn validate(
        &self,
        checker: &dyn RuleChecker,
        descriptor: &EntityDescriptor,
        entity: &EntityRef,
        id: Option<&Value>,
        passes: [(&[&str], &Payload); 2],
    ) -> Result<(), MapperError> {
        let ctx = RuleContext {
            entity: descriptor.name(),
            identifier: descriptor.identifier(),
            identifier_value: id,
            existing: self.store.is_existing(entity),
        };

        let mut failures = ValidationFailures::new();
        for (fields, data) in passes {
            let rules = self.build_rules(descriptor.name(), fields, &ctx);
            if rules.is_empty() {
                continue;
            }
            failures.merge(checker.check(data, &rules)?);
        }

        if failures.is_empty() {
            return Ok(());
        }

        debug!(
            entity = descriptor.name(),
            failed = failures.len(),
            "Validation failed"
        );
        Err(MapperError::validation_failed(descriptor.name(), failures))
    }

    /// Concrete rules for `fields`. Fields without a rule are left out.
    pub(super) fn build_rules(
        &self,
        entity_type: &str,
        fields: &[&str],
        ctx: &RuleContext<'_>,
    ) -> RuleSet {
        fields
            .iter()
            .filter_map(|field| {
                let rule = self.store.field_rule(entity_type, field)?;
                let built = prepare_rule(&rule.rule, ctx);
                (!built.is_empty()).then(|| (rule.key(field), built))
            })
            .collect()
    }
}
