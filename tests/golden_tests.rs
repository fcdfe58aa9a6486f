//! Golden Tests for Catalog Validation
//!
//! Loads catalogs and instances from `tests/fixtures` and checks the
//! reports they produce.

use std::path::Path;

use familiar_validation::{
    DiagnosticCode, Engine, ExecutionMode, SchemaCatalog, ValidationError, ValidationReport, ValidationSettings,
    ValidatorRegistry,
};
use futures_util::FutureExt;
use serde_json::Value;

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn catalog(name: &str) -> SchemaCatalog {
    SchemaCatalog::from_json_file(fixtures_path().join(name)).unwrap()
}

fn instance(name: &str) -> Value {
    let content = std::fs::read_to_string(fixtures_path().join(name)).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn paths(report: &ValidationReport) -> Vec<&str> {
    report.properties.keys().map(String::as_str).collect()
}

// =============================================================================
// CreateUserRequest
// =============================================================================

#[test]
fn test_empty_username_yields_single_message() {
    let engine = Engine::with_defaults(catalog("create_user_catalog.json")).unwrap();
    let instance = instance("create_user_empty_username.json");

    let result = engine.validate("CreateUserRequest", &instance).into_ready().unwrap();
    let report = result.report();

    assert!(!report.success);
    assert_eq!(paths(&report), vec!["Username"]);
    assert_eq!(report.properties["Username"].len(), 1);
    assert_eq!(report.properties["Username"][0].code, "required");
    assert!(report.global.is_empty());
}

#[test]
fn test_many_violations_reported_per_field() {
    let engine = Engine::with_defaults(catalog("create_user_catalog.json")).unwrap();
    let instance = instance("create_user_many_violations.json");

    let result = engine.validate("CreateUserRequest", &instance).into_ready().unwrap();
    assert!(!result.success());

    for path in ["Password", "Email", "Age", "FirstName", "LastName"] {
        assert!(!result.messages_for(path).is_empty(), "expected a message under {}", path);
    }
    assert!(result.messages_for("Username").is_empty());
    assert_eq!(
        result.messages_for("Password")[0].render(),
        "Password must be at least 8 characters"
    );
    assert_eq!(result.messages_for("Age")[0].render(), "Must be between 18 and 120");
}

#[test]
fn test_create_user_plan_is_blocking() {
    let engine = Engine::with_defaults(catalog("create_user_catalog.json")).unwrap();
    let plan = engine.plan("CreateUserRequest").unwrap();

    assert_eq!(plan.mode, ExecutionMode::Blocking);
    assert!(plan.dependencies.is_empty());
    assert_eq!(plan.fields().count(), 6);
    assert!(plan.describe().contains("validate 'Username' [min_length, required]"));
}

#[test]
fn test_results_are_deterministic() {
    let engine = Engine::with_defaults(catalog("create_user_catalog.json")).unwrap();
    let first = instance("create_user_many_violations.json");
    let second = instance("create_user_many_violations.json");

    let a = engine.validate("CreateUserRequest", &first).into_ready().unwrap().report();
    let b = engine.validate("CreateUserRequest", &second).into_ready().unwrap().report();
    assert_eq!(a, b);
}

// =============================================================================
// Nesting and Inheritance
// =============================================================================

#[tokio::test]
async fn test_nested_and_inherited_paths() {
    let engine = Engine::with_defaults(catalog("customer_catalog.json")).unwrap();
    let instance = instance("customer_invalid.json");

    let validation = engine.validate("Customer", &instance);
    assert_eq!(validation.mode(), ExecutionMode::Suspending);
    let result = validation.await.unwrap();

    // Nested failures are prefixed with the field name
    assert_eq!(result.messages_for("address.zip").len(), 1);
    assert!(result.messages_for("zip").is_empty());
    assert!(result.messages_for("address").is_empty());

    // Inherited failures stay flat
    assert_eq!(result.messages_for("id").len(), 1);
    assert_eq!(result.messages_for("id")[0].code, "min_length");

    // Auto-injected enum membership
    assert_eq!(result.messages_for("tier")[0].code, "enum");
    assert_eq!(result.message_count(), 3);
}

#[tokio::test]
async fn test_valid_customer_is_success() {
    let engine = Engine::with_defaults(catalog("customer_catalog.json")).unwrap();
    let instance = instance("customer_valid.json");

    let result = engine.validate("Customer", &instance).await.unwrap();
    assert!(result.success());
    assert!(result.global_messages().is_empty());
    assert_eq!(result.properties().count(), 0);
}

#[test]
fn test_suspending_plan_cannot_be_forced_ready() {
    let engine = Engine::with_defaults(catalog("customer_catalog.json")).unwrap();
    let instance = instance("customer_valid.json");

    let err = engine.validate("Customer", &instance).into_ready().unwrap_err();
    assert!(matches!(err, ValidationError::WouldSuspend(schema) if schema == "Customer"));
}

#[tokio::test]
async fn test_missing_nested_object_is_not_descended() {
    let engine = Engine::with_defaults(catalog("customer_catalog.json")).unwrap();
    let instance = serde_json::json!({"id": "cust-0001", "name": "Ann", "tier": "basic"});

    let result = engine.validate("Customer", &instance).await.unwrap();
    let codes: Vec<_> = result.messages_for("address").iter().map(|m| m.code.as_str()).collect();
    assert_eq!(codes, vec!["required"]);
    assert_eq!(result.message_count(), 1);
}

// =============================================================================
// Recursion
// =============================================================================

#[tokio::test]
async fn test_recursive_nesting_is_bounded_by_depth() {
    let mut settings = ValidationSettings::default();
    settings.execution.max_depth = 2;
    let engine = Engine::build(catalog("linked_list_catalog.json"), ValidatorRegistry::with_builtins(), &settings).unwrap();

    assert_eq!(engine.diagnostics().with_code(DiagnosticCode::RecursiveNesting).count(), 1);

    let short = serde_json::json!({"value": 1, "next": {"value": 2}});
    assert!(engine.validate("Node", &short).await.unwrap().success());

    let long = serde_json::json!({"next": {"next": {"next": {"next": {}}}}});
    let err = engine.validate("Node", &long).await.unwrap_err();
    assert!(matches!(err, ValidationError::DepthExceeded { depth: 3, .. }));
}

// =============================================================================
// Pool Accounting
// =============================================================================

#[tokio::test]
async fn test_every_buffer_returns_to_the_pool() {
    let engine = Engine::with_defaults(catalog("customer_catalog.json")).unwrap();
    let instance = instance("customer_invalid.json");

    let result = engine.validate("Customer", &instance).await.unwrap();
    assert!(engine.pool().outstanding() > 0);
    result.dispose();

    assert_eq!(engine.pool().outstanding(), 0);
    assert_eq!(engine.pool().acquired(), engine.pool().released());
}

#[test]
fn test_plans_shared_across_concurrent_calls() {
    let engine = Engine::with_defaults(catalog("customer_catalog.json")).unwrap();
    let instance = instance("customer_invalid.json");

    let reports: Vec<ValidationReport> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    // No awaitable hooks in the catalog, so one poll finishes the call
                    let result = engine.validate("Customer", &instance).now_or_never().unwrap().unwrap();
                    result.report()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(reports.len(), 8);
    assert!(!reports[0].success);
    assert!(reports.iter().all(|r| *r == reports[0]));
    assert_eq!(engine.pool().outstanding(), 0);
    assert_eq!(engine.pool().acquired(), engine.pool().released());
}
