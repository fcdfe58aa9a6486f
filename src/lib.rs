//! Familiar Validation
//!
//! Compiles declarative object schemas into cached validation plans and
//! runs them against JSON instances.
//!
//! ## Features
//!
//! - **Plan Synthesis**: each schema becomes an immutable step sequence, built once
//! - **Static Execution Mode**: blocking or suspending, decided from schema shape
//! - **Path-Addressed Results**: nested fields report under `field.nested`, inherited fields flat
//! - **Pooled Storage**: results draw buffers from a shared pool and return them exactly once
//! - **Diagnostics**: dropped rules, unknown schemas and inheritance cycles are reported
//!
//! ## Architecture
//!
//! ```text
//! SchemaCatalog ──► graph::analyze ──► Synthesizer ──► PlanSet
//!                                          ▲              │
//!              ValidatorRegistry ──────────┤              ▼
//!              AutoValidatorPolicy ────────┘     exec (instance, resolver)
//!                                                         │
//!                                                         ▼
//!                                                 ValidationResult
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use familiar_validation::{Engine, FieldDescriptor, RuleArgs, SchemaCatalog, SchemaDescriptor};
//!
//! let schema = SchemaDescriptor::builder("User")
//!     .field(FieldDescriptor::scalar("name").rule_with("min_length", RuleArgs::new().with("min", 3)))
//!     .build();
//! let engine = Engine::with_defaults(SchemaCatalog::new().with(schema)).unwrap();
//!
//! let instance = serde_json::json!({ "name": "Al" });
//! let result = engine.validate("User", &instance).into_ready().unwrap();
//! assert!(!result.success());
//! ```

pub mod checksum;
pub mod config;
pub mod dependency;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod plan;
pub mod policy;
pub mod result;
pub mod schema;
pub mod validators;

pub use checksum::Checksum;
pub use config::ValidationSettings;
pub use dependency::{DependencyKey, DependencyTracker, NoServices, ResolvedServices, Service, ServiceMap, ServiceResolver};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use engine::Engine;
pub use error::{Result, ValidationError};
pub use hooks::{
    AsyncHook, CustomValidation, Hook, HookDescriptor, HookHandler, HookInput, HookKind, HookMessage, HookOutcome,
    HookShape, MergeMode,
};
pub use plan::exec::{Validation, ValidationContext};
pub use plan::{ExecutionMode, PlanStep, ValidationPlan};
pub use policy::AutoValidatorPolicy;
pub use result::{Message, MessagePool, ValidationReport, ValidationResult};
pub use schema::{AutoValidators, FieldDescriptor, RuleBinding, SchemaCatalog, SchemaDescriptor, SchemaId, TypeClass};
pub use validators::{RuleArgs, Validator, ValidatorDescriptor, ValidatorRegistry, ValidatorRole};
