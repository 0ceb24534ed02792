//! Rule template substitution.
//!
//! Field rules are declared as templates that may reference the entity being
//! mapped. Substitution is purely textual and always runs in this order:
//!
//! 1. `{static.entity}` becomes the entity type name
//! 2. `{this.identifier}` becomes the identifier value, or `NULL`
//! 3. `{static.identifier}` becomes the identifier field name
//! 4. for an entity the store already holds, `required` becomes
//!    `sometimes|required`

use serde_json::Value;
use std::borrow::Cow;

pub const ENTITY_TOKEN: &str = "{static.entity}";
pub const IDENTIFIER_VALUE_TOKEN: &str = "{this.identifier}";
pub const IDENTIFIER_NAME_TOKEN: &str = "{static.identifier}";

/// Stand-in for a missing identifier value.
pub const NULL_MARKER: &str = "NULL";

const REQUIRED: &str = "required";
const RELAXED_REQUIRED: &str = "sometimes|required";

/// What a rule template may refer to.
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    pub entity: &'a str,
    pub identifier: &'a str,
    pub identifier_value: Option<&'a Value>,
    pub existing: bool,
}

/// Build a concrete rule string from `template`.
#[must_use]
pub fn prepare_rule(template: &str, ctx: &RuleContext<'_>) -> String {
    let rule = template.replace(ENTITY_TOKEN, ctx.entity);
    let rule = rule.replace(
        IDENTIFIER_VALUE_TOKEN,
        &identifier_value_text(ctx.identifier_value),
    );
    let rule = rule.replace(IDENTIFIER_NAME_TOKEN, ctx.identifier);

    if ctx.existing {
        relax_required(&rule)
    } else {
        rule
    }
}

/// Rewrite every `required` so it only applies when the field is present.
#[must_use]
pub fn relax_required(rule: &str) -> String {
    rule.replace(REQUIRED, RELAXED_REQUIRED)
}

fn identifier_value_text(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(NULL_MARKER),
        Some(value) => identifier_text(value),
    }
}

/// Render an identifier for rules and messages: strings verbatim, anything
/// else as JSON text.
#[must_use]
pub fn identifier_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
