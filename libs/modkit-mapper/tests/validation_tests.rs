#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{Fixture, User, payload, post_descriptor, team_descriptor, user};
use modkit_mapper::{
    EntityDescriptor, EntityRef, FieldRule, MapperError, Payload, RuleChecker, RuleSet,
    ValidationFailures,
};
use serde_json::json;
use std::sync::Arc;

fn templated_user() -> EntityDescriptor {
    EntityDescriptor::builder("User")
        .fields(["email", "name"])
        .to_one("team", "Team")
        .rule(
            "email",
            FieldRule::new("required|unique:{static.entity},email,{this.identifier},{static.identifier}"),
        )
        .rule("name", FieldRule::new("max:64"))
        .rule("team", FieldRule::new("required"))
        .build()
        .unwrap()
}

fn templated() -> Fixture {
    Fixture::with_descriptors(vec![templated_user(), team_descriptor(), post_descriptor()])
}

#[test]
fn test_new_entity_gets_rules_verbatim() {
    let fx = Fixture::new();

    let err = fx
        .mapper()
        .map("User", payload(json!({"name": "Ada"})), None)
        .unwrap_err();

    assert!(err.is_validation_failed());
    let failures = err.failures().unwrap();
    assert_eq!(failures.get("email").unwrap(), ["The email field is required."]);
    assert_eq!(fx.checker.calls()[0]["email"], "required|email");
}

#[test]
fn test_existing_entity_relaxes_required() {
    let fx = Fixture::new();
    fx.persisted_user(1, "ada@example.com");

    fx.mapper()
        .map("User", payload(json!({"name": "Renamed"})), Some(json!(1)))
        .unwrap();

    let calls = fx.checker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["email"], "sometimes|required|email");
}

#[test]
fn test_templates_for_new_entity() {
    let fx = templated();

    fx.mapper()
        .map(
            "User",
            payload(json!({"email": "ada@example.com", "team": {"name": "Core"}})),
            None,
        )
        .unwrap();

    let calls = fx.checker.calls();
    assert_eq!(calls.len(), 2);
    let scalars: RuleSet = [
        ("email".to_owned(), "required|unique:User,email,NULL,id".to_owned()),
        ("name".to_owned(), "max:64".to_owned()),
    ]
    .into_iter()
    .collect();
    assert_eq!(calls[0], scalars);
    assert_eq!(calls[1]["team"], "required");
}

#[test]
fn test_templates_for_existing_entity() {
    let fx = templated();
    let stored = EntityRef::new("User", User::default());
    fx.store.persist(&stored, &json!("u-1"));

    fx.mapper()
        .map("User", payload(json!({"name": "Ada"})), Some(json!("u-1")))
        .unwrap();

    let calls = fx.checker.calls();
    assert_eq!(
        calls[0]["email"],
        "sometimes|required|unique:User,email,u-1,id"
    );
    assert_eq!(calls[0]["name"], "max:64");
    assert_eq!(calls[1]["team"], "sometimes|required");
    assert_eq!(user(&stored, |u| u.name.clone()), "Ada");
}

#[test]
fn test_sub_rule_uses_suffixed_key() {
    let fx = Fixture::with_descriptors(vec![
        EntityDescriptor::builder("User")
            .fields(["email", "name"])
            .rule("email", FieldRule::new("same:email").with_sub("_confirmation"))
            .build()
            .unwrap(),
    ]);

    fx.mapper()
        .map("User", payload(json!({"email": "ada@example.com"})), None)
        .unwrap();

    assert_eq!(fx.checker.keys(), ["email_confirmation"]);
}

#[test]
fn test_failures_of_both_passes_are_merged() {
    let fx = templated();

    let err = fx
        .mapper()
        .map("User", payload(json!({"name": "Ada"})), None)
        .unwrap_err();

    match &err {
        MapperError::ValidationFailed { entity, failures } => {
            assert_eq!(entity, "User");
            assert_eq!(failures.fields().collect::<Vec<_>>(), ["email", "team"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.checker.calls().len(), 2);
    assert_eq!(
        serde_json::to_value(err.failures().unwrap()).unwrap(),
        json!({
            "email": ["The email field is required."],
            "team": ["The team field is required."]
        })
    );
}

#[test]
fn test_validation_failure_assigns_nothing() {
    let fx = Fixture::new();
    let stored = fx.persisted_user(1, "ada@example.com");

    let err = fx
        .mapper()
        .map(
            "User",
            payload(json!({"email": "not-an-email", "name": "Changed"})),
            Some(json!(1)),
        )
        .unwrap_err();

    assert!(err.to_string().contains("The email must be a valid email address."));
    user(&stored, |u| {
        assert_eq!(u.email, "ada@example.com");
        assert_eq!(u.name, "Stored");
    });
}

#[test]
fn test_without_validator_rules_are_ignored() {
    let fx = Fixture::new();

    let entity = fx
        .builder()
        .build()
        .map("User", payload(json!({"name": "Ada"})), None)
        .unwrap();

    assert_eq!(user(&entity, |u| u.name.clone()), "Ada");
    assert!(fx.checker.calls().is_empty());
}

struct BrokenChecker;

impl RuleChecker for BrokenChecker {
    fn check(&self, _data: &Payload, _rules: &RuleSet) -> anyhow::Result<ValidationFailures> {
        anyhow::bail!("unknown constraint 'email'")
    }
}

#[test]
fn test_checker_failure_is_internal() {
    let fx = Fixture::new();
    let mapper = fx.builder().validator(Arc::new(BrokenChecker)).build();

    let err = mapper
        .map("User", payload(json!({"email": "ada@example.com"})), None)
        .unwrap_err();

    assert!(matches!(err, MapperError::Internal(_)));
    assert_eq!(err.to_string(), "Internal error: unknown constraint 'email'");
}

#[test]
fn test_relation_pass_renders_reconciled_identifier() {
    let fx = Fixture::with_descriptors(vec![
        EntityDescriptor::builder("User")
            .field("email")
            .to_one("team", "Team")
            .rule("team", FieldRule::new("exists:{static.entity},{this.identifier}"))
            .build()
            .unwrap(),
        team_descriptor(),
    ]);
    let stored = EntityRef::new("User", User::default());
    fx.store.persist(&stored, &json!("u-1"));

    fx.mapper()
        .map("User", payload(json!({"team": {"name": "Core"}})), Some(json!("u-1")))
        .unwrap();

    let calls = fx.checker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["team"], "exists:User,u-1");
}
