#![allow(dead_code)]

//! Shared fixtures: a small User / Team / Post domain, an in-memory store,
//! a counting factory and a recording rule checker.

use modkit_mapper::{
    EntityBinding, EntityDescriptor, EntityFactory, EntityRef, FieldRule, InMemoryStore, Mapper,
    MapperBuilder, Payload, RuleChecker, RuleSet, SetterRegistry, TypeFactory,
    ValidationFailures,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct User {
    pub id: Option<u64>,
    pub email: String,
    pub name: String,
    pub role: String,
    pub team: Option<EntityRef>,
    pub posts: Vec<EntityRef>,
}

#[derive(Debug, Default)]
pub struct Team {
    pub name: String,
    pub lead: Option<EntityRef>,
}

#[derive(Debug, Default)]
pub struct Post {
    pub title: String,
}

pub fn user_descriptor() -> EntityDescriptor {
    EntityDescriptor::builder("User")
        .fields(["email", "name", "role", "nickname"])
        .to_one("team", "Team")
        .to_many("posts", "Post")
        .rule("email", FieldRule::new("required|email"))
        .build()
        .unwrap()
}

pub fn team_descriptor() -> EntityDescriptor {
    EntityDescriptor::builder("Team")
        .field("name")
        .to_one("lead", "User")
        .build()
        .unwrap()
}

pub fn post_descriptor() -> EntityDescriptor {
    EntityDescriptor::builder("Post")
        .field("title")
        .rule("title", FieldRule::new("required"))
        .build()
        .unwrap()
}

pub fn setters() -> SetterRegistry {
    SetterRegistry::default()
        .with(
            EntityBinding::<User>::new("User")
                .scalar("id", |u, v: u64| u.id = Some(v))
                .scalar("email", |u, v: String| u.email = v)
                .scalar("name", |u, v: String| u.name = v)
                .scalar("role", |u, v: String| u.role = v)
                .to_one("team", |u, v| u.team = v)
                .to_many("posts", |u, v| u.posts = v),
        )
        .with(
            EntityBinding::<Team>::new("Team")
                .scalar("name", |t, v: String| t.name = v)
                .to_one("lead", |t, v| t.lead = v),
        )
        .with(EntityBinding::<Post>::new("Post").scalar("title", |p, v: String| p.title = v))
}

/// Factory that counts how many entities it created.
pub struct CountingFactory {
    inner: TypeFactory,
    created: AtomicUsize,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self {
            inner: TypeFactory::new()
                .with_default::<User>("User")
                .with_default::<Team>("Team")
                .with_default::<Post>("Post"),
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EntityFactory for CountingFactory {
    fn create(&self, entity_type: &str) -> anyhow::Result<EntityRef> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create(entity_type)
    }
}

/// Rule checker understanding `required`, `sometimes` and `email`. Every
/// rule set it receives is recorded.
#[derive(Default)]
pub struct RecordingChecker {
    calls: Mutex<Vec<RuleSet>>,
}

impl RecordingChecker {
    pub fn calls(&self) -> Vec<RuleSet> {
        self.calls.lock().clone()
    }

    /// Every rule key seen across all calls.
    pub fn keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .flat_map(|rules| rules.keys().cloned())
            .collect()
    }
}

impl RuleChecker for RecordingChecker {
    fn check(&self, data: &Payload, rules: &RuleSet) -> anyhow::Result<ValidationFailures> {
        self.calls.lock().push(rules.clone());

        let mut failures = ValidationFailures::new();
        for (key, rule) in rules {
            let value = data.get(key);
            for constraint in rule.split('|') {
                match constraint {
                    "sometimes" if value.is_none() => break,
                    "required" if is_blank(value) => {
                        failures.add(key, format!("The {key} field is required."));
                    }
                    "email" if value.is_some_and(|v| !is_email(v)) => {
                        failures.add(key, format!("The {key} must be a valid email address."));
                    }
                    _ => {}
                }
            }
        }
        Ok(failures)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn is_email(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.split_once('@').is_some_and(|(l, d)| !l.is_empty() && d.contains('.')))
}

/// Store, factory and checker wired together.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub factory: Arc<CountingFactory>,
    pub checker: Arc<RecordingChecker>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_descriptors(vec![user_descriptor(), team_descriptor(), post_descriptor()])
    }

    pub fn with_descriptors(descriptors: Vec<EntityDescriptor>) -> Self {
        let store = descriptors
            .into_iter()
            .fold(InMemoryStore::new(), InMemoryStore::with_descriptor);
        Self {
            store: Arc::new(store),
            factory: Arc::new(CountingFactory::new()),
            checker: Arc::new(RecordingChecker::default()),
        }
    }

    /// Builder without keeper or validator.
    pub fn builder(&self) -> MapperBuilder {
        Mapper::builder(self.store.clone(), self.factory.clone(), setters())
    }

    /// Mapper validating through the recording checker.
    pub fn mapper(&self) -> Mapper {
        self.builder().validator(self.checker.clone()).build()
    }

    /// Create a user through the mapper and persist it under `id`.
    pub fn persisted_user(&self, id: u64, email: &str) -> EntityRef {
        let user = self
            .builder()
            .build()
            .map(
                "User",
                payload(serde_json::json!({"email": email, "name": "Stored"})),
                None,
            )
            .unwrap();
        user.write(|u: &mut User| u.id = Some(id)).unwrap();
        self.store.persist(&user, &Value::from(id));
        user
    }
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn user<R>(entity: &EntityRef, f: impl FnOnce(&User) -> R) -> R {
    entity.read(f).unwrap()
}

pub fn team<R>(entity: &EntityRef, f: impl FnOnce(&Team) -> R) -> R {
    entity.read(f).unwrap()
}

pub fn post<R>(entity: &EntityRef, f: impl FnOnce(&Post) -> R) -> R {
    entity.read(f).unwrap()
}
