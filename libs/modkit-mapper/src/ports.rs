//! Contracts the mapper consumes from its environment.

use crate::Payload;
use crate::entity::EntityRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Concrete rules handed to a [`RuleChecker`]: field key to rule string.
pub type RuleSet = BTreeMap<String, String>;

/// Decides whether the caller holds an ability on an entity.
///
/// Closures of the shape `Fn(&str, &EntityRef) -> bool` implement it.
pub trait PermissionCheck: Send + Sync {
    fn allows(&self, ability: &str, entity: &EntityRef) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(&str, &EntityRef) -> bool + Send + Sync,
{
    fn allows(&self, ability: &str, entity: &EntityRef) -> bool {
        self(ability, entity)
    }
}

/// Evaluates concrete rule strings against a payload.
///
/// The rule grammar belongs to the implementation; the mapper only builds the
/// strings and reports what comes back.
pub trait RuleChecker: Send + Sync {
    /// Check `data` against `rules` and return every failure found.
    ///
    /// # Errors
    ///
    /// Returns an error if the checker itself cannot run, e.g. a rule that
    /// names an unknown constraint.
    fn check(&self, data: &Payload, rules: &RuleSet) -> anyhow::Result<ValidationFailures>;
}

/// Failure messages grouped by field key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationFailures(BTreeMap<String, Vec<String>>);

impl ValidationFailures {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure message under `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Append all failures from `other`.
    pub fn merge(&mut self, other: ValidationFailures) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failing field keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl From<BTreeMap<String, Vec<String>>> for ValidationFailures {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}
