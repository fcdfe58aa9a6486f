//! Runtime Tests
//!
//! Hooks, custom validation, services and auto-validators, exercised
//! through schemas built in code.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use familiar_validation::{
    AsyncHook, AutoValidators, CustomValidation, DependencyKey, DiagnosticCode, Engine, ExecutionMode,
    FieldDescriptor, HookDescriptor, HookHandler, HookInput, HookMessage, HookOutcome, HookShape, MergeMode, Message,
    Result, RuleArgs, SchemaCatalog, SchemaDescriptor, Service, ServiceMap, ServiceResolver, ValidationError,
    ValidationSettings, ValidatorDescriptor, ValidatorRegistry,
};
use futures_util::future::BoxFuture;
use serde_json::json;

fn engine(schemas: Vec<SchemaDescriptor>) -> Engine {
    let catalog = schemas.into_iter().fold(SchemaCatalog::new(), SchemaCatalog::with);
    Engine::with_defaults(catalog).unwrap()
}

/// Registry with an extra `counted` validator that records every call
fn counting_registry() -> (ValidatorRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = ValidatorRegistry::with_builtins();
    registry.register(ValidatorDescriptor::from_fn("counted", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }));
    (registry, calls)
}

/// Resolver that counts how often each lookup reaches it
struct CountingResolver {
    inner: ServiceMap,
    calls: AtomicUsize,
}

impl ServiceResolver for CountingResolver {
    fn resolve(&self, key: &DependencyKey) -> Result<Service> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(key)
    }
}

struct SlowAudit;

impl AsyncHook for SlowAudit {
    fn call<'a>(&'a self, input: HookInput<'a>) -> BoxFuture<'a, Result<HookOutcome>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let mut messages = Vec::new();
            if input.instance().get("name").and_then(|v| v.as_str()) == Some("root") {
                messages.push(HookMessage::at("name", Message::new("reserved", "'{value}' is reserved").with_value(input.instance().get("name"))));
            }
            Ok(HookOutcome::Messages(messages))
        })
    }
}

// =============================================================================
// Auto-validators
// =============================================================================

#[test]
fn test_required_injected_once_for_absent_values() {
    let engine = engine(vec![SchemaDescriptor::builder("Profile")
        .field(FieldDescriptor::scalar("nickname"))
        .build()]);

    for instance in [json!({}), json!({"nickname": null})] {
        let result = engine.validate("Profile", &instance).into_ready().unwrap();
        let codes: Vec<_> = result.messages_for("nickname").iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["required"]);
        assert_eq!(result.message_count(), 1);
    }
}

#[test]
fn test_force_off_disables_injection() {
    let engine = engine(vec![SchemaDescriptor::builder("Draft")
        .auto_validators(AutoValidators::ForceOff)
        .field(FieldDescriptor::scalar("title"))
        .field(FieldDescriptor::enumeration("state", ["open", "closed"]))
        .build()]);

    let result = engine
        .validate("Draft", &json!({"state": "archived"}))
        .into_ready()
        .unwrap();
    assert!(result.success());
}

#[test]
fn test_settings_defaults_apply_to_inherit() {
    let mut settings = ValidationSettings::default();
    settings.auto.required = false;
    let catalog = SchemaCatalog::new()
        .with(SchemaDescriptor::builder("Loose").field(FieldDescriptor::scalar("title")).build())
        .with(
            SchemaDescriptor::builder("Strict")
                .auto_validators(AutoValidators::ForceOn)
                .field(FieldDescriptor::scalar("title"))
                .build(),
        );
    let engine = Engine::build(catalog, ValidatorRegistry::with_builtins(), &settings).unwrap();

    assert!(engine.validate("Loose", &json!({})).into_ready().unwrap().success());
    assert!(!engine.validate("Strict", &json!({})).into_ready().unwrap().success());
}

#[test]
fn test_unknown_rule_is_dropped_and_reported() {
    let engine = engine(vec![SchemaDescriptor::builder("Payment")
        .field(FieldDescriptor::scalar("card").rule("credit_card"))
        .build()]);

    let warnings: Vec<_> = engine.diagnostics().with_code(DiagnosticCode::UnknownRule).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].schema_id, "Payment");

    let result = engine
        .validate("Payment", &json!({"card": "not-a-card"}))
        .into_ready()
        .unwrap();
    assert!(result.success());
}

// =============================================================================
// Before-hook
// =============================================================================

#[test]
fn test_early_result_skips_every_rule() {
    let (registry, calls) = counting_registry();
    let schema = SchemaDescriptor::builder("Command")
        .field(FieldDescriptor::scalar("name").rule("counted"))
        .field(FieldDescriptor::scalar("target").rule("counted"))
        .before(HookDescriptor::before(
            HookShape::EarlyResult,
            HookHandler::from_fn(|input| {
                if input.instance().get("blocked").is_none() {
                    return Ok(HookOutcome::Early(None));
                }
                let mut result = input.new_result();
                result.add_global(Message::new("blocked", "Command is blocked"));
                Ok(HookOutcome::Early(Some(result)))
            }),
        ))
        .build();
    let engine = Engine::build(
        SchemaCatalog::new().with(schema),
        registry,
        &ValidationSettings::default(),
    )
    .unwrap();

    let result = engine
        .validate("Command", &json!({"blocked": true}))
        .into_ready()
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.global_messages()[0].code, "blocked");
    assert_eq!(result.properties().count(), 0);

    let result = engine
        .validate("Command", &json!({"name": "deploy", "target": "prod"}))
        .into_ready()
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(result.success());
}

#[test]
fn test_before_hook_messages_are_global() {
    let engine = engine(vec![SchemaDescriptor::builder("Upload")
        .before(HookDescriptor::before(
            HookShape::Messages(MergeMode::Append),
            HookHandler::from_fn(|_| {
                Ok(HookOutcome::Messages(vec![HookMessage::at(
                    "file",
                    Message::new("quota", "Quota exceeded"),
                )]))
            }),
        ))
        .build()]);

    let result = engine.validate("Upload", &json!({})).into_ready().unwrap();
    assert_eq!(result.global_messages().len(), 1);
    assert!(result.messages_for("file").is_empty());
}

#[test]
fn test_hook_returning_wrong_shape_fails_the_call() {
    let engine = engine(vec![SchemaDescriptor::builder("Audit")
        .before(HookDescriptor::before(
            HookShape::NoResult,
            HookHandler::from_fn(|_| Ok(HookOutcome::global(vec![Message::new("x", "x")]))),
        ))
        .build()]);

    let err = engine.validate("Audit", &json!({})).into_ready().unwrap_err();
    assert!(matches!(
        err,
        ValidationError::HookShapeMismatch { declared: "no-result", actual: "messages", .. }
    ));
    assert_eq!(engine.pool().outstanding(), 0);
}

// =============================================================================
// After-hook
// =============================================================================

fn after_hook_schema(mode: MergeMode) -> SchemaDescriptor {
    SchemaDescriptor::builder("Account")
        .field(FieldDescriptor::scalar("name").rule_with("min_length", RuleArgs::new().with("min", 5)))
        .after(HookDescriptor::after(
            HookShape::Messages(mode),
            HookHandler::from_fn(|_| {
                Ok(HookOutcome::Messages(vec![
                    HookMessage::at("name", Message::new("taken", "Name is taken")),
                    HookMessage::global(Message::new("review", "Needs review")),
                ]))
            }),
        ))
        .build()
}

#[test]
fn test_after_hook_append() {
    let engine = engine(vec![after_hook_schema(MergeMode::Append)]);
    let result = engine.validate("Account", &json!({"name": "abc"})).into_ready().unwrap();

    let codes: Vec<_> = result.messages_for("name").iter().map(|m| m.code.as_str()).collect();
    assert_eq!(codes, vec!["min_length", "taken"]);
    assert_eq!(result.global_messages().len(), 1);
}

#[test]
fn test_after_hook_replace() {
    let engine = engine(vec![after_hook_schema(MergeMode::Replace)]);
    let result = engine.validate("Account", &json!({"name": "abc"})).into_ready().unwrap();

    let codes: Vec<_> = result.messages_for("name").iter().map(|m| m.code.as_str()).collect();
    assert_eq!(codes, vec!["taken"]);
    assert_eq!(result.global_messages().len(), 1);
}

#[test]
fn test_early_result_after_hook_fails_build() {
    let catalog = SchemaCatalog::new().with(
        SchemaDescriptor::builder("Broken")
            .after(HookDescriptor::after(
                HookShape::EarlyResult,
                HookHandler::from_fn(|_| Ok(HookOutcome::Nothing)),
            ))
            .build(),
    );
    let diagnostics = Engine::with_defaults(catalog).err().unwrap();
    assert_eq!(diagnostics.with_code(DiagnosticCode::InvalidHookShape).count(), 1);
}

#[tokio::test]
async fn test_awaitable_after_hook_suspends() {
    let engine = engine(vec![SchemaDescriptor::builder("Login")
        .field(FieldDescriptor::scalar("name"))
        .after(HookDescriptor::after(
            HookShape::Messages(MergeMode::Append),
            HookHandler::awaitable(SlowAudit),
        ))
        .build()]);

    let instance = json!({"name": "root"});
    let validation = engine.validate("Login", &instance);
    assert_eq!(validation.mode(), ExecutionMode::Suspending);
    assert!(!validation.is_ready());

    let result = validation.await.unwrap();
    assert_eq!(result.messages_for("name")[0].render(), "'root' is reserved");
}

#[test]
fn test_no_result_after_hook_leaves_result_untouched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let schema = |after: Option<HookDescriptor>| {
        let builder = SchemaDescriptor::builder("Ticket").field(FieldDescriptor::scalar("title"));
        match after {
            Some(hook) => builder.after(hook).build(),
            None => builder.build(),
        }
    };
    let hooked = engine(vec![schema(Some(HookDescriptor::after(
        HookShape::NoResult,
        HookHandler::from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HookOutcome::Nothing)
        }),
    )))]);
    let plain = engine(vec![schema(None)]);

    let with_hook = hooked.validate("Ticket", &json!({})).into_ready().unwrap().report();
    let without_hook = plain.validate("Ticket", &json!({})).into_ready().unwrap().report();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!with_hook.success);
    assert_eq!(with_hook, without_hook);
}

#[test]
fn test_replacing_before_hook_fails_build() {
    let catalog = SchemaCatalog::new().with(
        SchemaDescriptor::builder("Upload")
            .before(HookDescriptor::before(
                HookShape::Messages(MergeMode::Replace),
                HookHandler::from_fn(|_| Ok(HookOutcome::Nothing)),
            ))
            .build(),
    );
    let diagnostics = Engine::with_defaults(catalog).err().unwrap();
    assert_eq!(diagnostics.with_code(DiagnosticCode::InvalidHookShape).count(), 1);
}

// =============================================================================
// Custom Validation and Services
// =============================================================================

/// Awaitable custom validation rejecting short handles
struct SlowHandleCheck;

impl AsyncHook for SlowHandleCheck {
    fn call<'a>(&'a self, input: HookInput<'a>) -> BoxFuture<'a, Result<HookOutcome>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let short = input.value.and_then(|v| v.as_str()).is_some_and(|s| s.len() < 4);
            if short {
                return Ok(HookOutcome::global(vec![Message::new("short_handle", "Handle is too short")]));
            }
            Ok(HookOutcome::Nothing)
        })
    }
}

#[tokio::test]
async fn test_awaitable_custom_validation_suspends() {
    let engine = engine(vec![SchemaDescriptor::builder("Member")
        .field(FieldDescriptor::scalar("handle").custom(CustomValidation::new(HookHandler::awaitable(SlowHandleCheck))))
        .build()]);

    let instance = json!({"handle": "al"});
    let validation = engine.validate("Member", &instance);
    assert_eq!(validation.mode(), ExecutionMode::Suspending);

    let result = validation.await.unwrap();
    let codes: Vec<_> = result.messages_for("handle").iter().map(|m| m.code.as_str()).collect();
    assert_eq!(codes, vec!["short_handle"]);
    assert!(result.global_messages().is_empty());
}

fn blocklist_schema() -> SchemaDescriptor {
    SchemaDescriptor::builder("Signup")
        .field(
            FieldDescriptor::scalar("email").rule("email").custom(
                CustomValidation::new(HookHandler::from_fn(|input| {
                    let blocked = input.services.get::<Vec<String>>(&DependencyKey::new("blocklist"))?;
                    let domain = input
                        .value
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.split('@').nth(1))
                        .unwrap_or_default();
                    if blocked.iter().any(|b| b == domain) {
                        return Ok(HookOutcome::global(vec![Message::new("blocked_domain", "Domain is blocked")]));
                    }
                    Ok(HookOutcome::Nothing)
                }))
                .depends_on("blocklist"),
            ),
        )
        .build()
}

#[test]
fn test_custom_validation_lands_on_field_path() {
    let engine = engine(vec![blocklist_schema()]);
    let mut services = ServiceMap::new();
    services.insert("blocklist", vec!["spam.io".to_string()]);

    let instance = json!({"email": "bob@spam.io"});
    let result = engine.validate_with("Signup", &instance, &services).into_ready().unwrap();

    let codes: Vec<_> = result.messages_for("email").iter().map(|m| m.code.as_str()).collect();
    assert_eq!(codes, vec!["blocked_domain"]);
    assert!(result.global_messages().is_empty());
}

#[test]
fn test_missing_dependency_is_fatal() {
    let engine = engine(vec![blocklist_schema()]);
    let instance = json!({"email": "bob@spam.io"});

    let err = engine.validate("Signup", &instance).into_ready().unwrap_err();
    assert!(matches!(err, ValidationError::MissingDependency(key) if key.as_str() == "blocklist"));
    assert_eq!(engine.pool().outstanding(), 0);
}

#[tokio::test]
async fn test_dependency_resolved_once_per_call() {
    let clock_hook = || {
        HookDescriptor::before(HookShape::NoResult, HookHandler::from_fn(|_| Ok(HookOutcome::Nothing)))
            .depends_on("clock")
    };
    let engine = engine(vec![
        SchemaDescriptor::builder("Line")
            .field(FieldDescriptor::scalar("sku").nullable())
            .before(clock_hook())
            .build(),
        SchemaDescriptor::builder("Order")
            .field(FieldDescriptor::nested("first", "Line"))
            .field(FieldDescriptor::nested("second", "Line"))
            .before(clock_hook())
            .build(),
    ]);

    let mut inner = ServiceMap::new();
    inner.insert("clock", 0u64);
    let resolver = CountingResolver {
        inner,
        calls: AtomicUsize::new(0),
    };

    let instance = json!({"first": {}, "second": {}});
    let result = engine.validate_with("Order", &instance, &resolver).await.unwrap();
    assert!(result.success());
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

    engine.validate_with("Order", &instance, &resolver).await.unwrap();
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_evaluator_failure_propagates() {
    let engine = engine(vec![SchemaDescriptor::builder("Code")
        .field(FieldDescriptor::scalar("value").rule_with("pattern", RuleArgs::new().with("pattern", "(")))
        .build()]);

    let err = engine
        .validate("Code", &json!({"value": "x"}))
        .into_ready()
        .unwrap_err();
    assert!(matches!(err, ValidationError::Evaluator { validator, .. } if validator == "pattern"));
}
