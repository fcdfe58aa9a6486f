//! Plan Synthesis
//!
//! Turns one [`SchemaDescriptor`] into a [`ValidationPlan`]. The step order
//! is fixed:
//!
//! 1. resolve the schema's own dependencies
//! 2. validate nested fields, in declaration order
//! 3. validate the parent schema
//! 4. allocate the result
//! 5. merge nested results under their field names
//! 6. merge the parent result flat
//! 7. before-hook
//! 8. field rules and custom validations, in declaration order
//! 9. after-hook
//! 10. return
//!
//! The execution mode is decided here from schema shape alone.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{ExecutionMode, FieldStep, PlanStep, ResolvedRule, ValidationPlan};
use crate::dependency::DependencyTracker;
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::hooks::{HookDescriptor, HookKind, HookShape, MergeMode};
use crate::policy::AutoValidatorPolicy;
use crate::schema::{FieldDescriptor, SchemaDescriptor};
use crate::validators::ValidatorRegistry;

pub struct Synthesizer<'a> {
    registry: &'a ValidatorRegistry,
    policy: &'a AutoValidatorPolicy,
}

impl<'a> Synthesizer<'a> {
    pub fn new(registry: &'a ValidatorRegistry, policy: &'a AutoValidatorPolicy) -> Self {
        Self { registry, policy }
    }

    /// Synthesize a plan. Shape problems are recorded in `diagnostics`; the
    /// returned plan is only meaningful when none of them are errors.
    pub fn synthesize(&self, schema: &SchemaDescriptor, diagnostics: &mut Diagnostics) -> ValidationPlan {
        self.check_fields(schema, diagnostics);
        self.check_hook(schema, schema.before.as_ref(), HookKind::Before, diagnostics);
        self.check_hook(schema, schema.after.as_ref(), HookKind::After, diagnostics);

        let dependencies = Self::track_dependencies(schema).into_ordered();
        let mode = Self::infer_mode(schema);

        let mut steps = Vec::with_capacity(schema.fields.len() + 8);

        if !dependencies.is_empty() {
            steps.push(PlanStep::ResolveDependencies(dependencies.clone()));
        }

        let mut has_nested = false;
        for (field, target) in schema.nested_schemas() {
            has_nested = true;
            steps.push(PlanStep::ValidateNested {
                field: field.to_string(),
                schema: target.to_string(),
            });
        }

        if let Some(parent) = &schema.parent {
            steps.push(PlanStep::ValidateBase { schema: parent.clone() });
        }

        steps.push(PlanStep::Allocate {
            field_count: schema.fields.len(),
        });

        if has_nested {
            steps.push(PlanStep::MergeNested);
        }
        if schema.parent.is_some() {
            steps.push(PlanStep::MergeBase);
        }

        if let Some(hook) = &schema.before {
            steps.push(PlanStep::BeforeHook(hook.clone()));
        }

        for field in &schema.fields {
            steps.push(PlanStep::ValidateField(self.field_step(schema, field, diagnostics)));
        }

        if let Some(hook) = &schema.after {
            steps.push(PlanStep::AfterHook(hook.clone()));
        }

        steps.push(PlanStep::Return);

        debug!(
            "Synthesized plan for {}: {} steps, {} dependencies, {}",
            schema.id,
            steps.len(),
            dependencies.len(),
            mode
        );

        ValidationPlan {
            schema: schema.id.clone(),
            mode,
            steps,
            dependencies,
            checksum: schema.checksum(),
        }
    }

    /// Suspending if any hook or custom validation is awaitable, the schema
    /// inherits, or any field is nested.
    pub fn infer_mode(schema: &SchemaDescriptor) -> ExecutionMode {
        let awaitable_hook = [&schema.before, &schema.after]
            .into_iter()
            .flatten()
            .any(HookDescriptor::is_awaitable);
        let awaitable_custom = schema
            .fields
            .iter()
            .filter_map(|f| f.custom.as_ref())
            .any(|c| c.is_awaitable());
        let nested = schema.nested_schemas().next().is_some();

        if awaitable_hook || awaitable_custom || schema.parent.is_some() || nested {
            ExecutionMode::Suspending
        } else {
            ExecutionMode::Blocking
        }
    }

    /// Own dependencies in first-seen order: before-hook, custom
    /// validations by field, after-hook. Nested and base schemas resolve
    /// their own.
    pub fn track_dependencies(schema: &SchemaDescriptor) -> DependencyTracker {
        let mut tracker = DependencyTracker::new();
        if let Some(hook) = &schema.before {
            tracker.extend(&hook.dependencies);
        }
        for custom in schema.fields.iter().filter_map(|f| f.custom.as_ref()) {
            tracker.extend(&custom.dependencies);
        }
        if let Some(hook) = &schema.after {
            tracker.extend(&hook.dependencies);
        }
        tracker
    }

    fn field_step(&self, schema: &SchemaDescriptor, field: &FieldDescriptor, diagnostics: &mut Diagnostics) -> FieldStep {
        let bindings = self.policy.bindings(field, schema.auto_validators, self.registry);
        let mut rules = Vec::with_capacity(bindings.len());

        for binding in bindings {
            match self.registry.lookup(&binding.validator) {
                Some(validator) => rules.push(ResolvedRule {
                    validator,
                    args: binding.args,
                }),
                None => {
                    warn!(
                        "Dropping rule '{}' on {}.{}: no such validator",
                        binding.validator, schema.id, field.name
                    );
                    diagnostics.unknown_rule(&schema.id, &field.name, &binding.validator);
                }
            }
        }

        FieldStep {
            name: field.name.clone(),
            rules,
            custom: field.custom.clone(),
        }
    }

    fn check_fields(&self, schema: &SchemaDescriptor, diagnostics: &mut Diagnostics) {
        let mut seen = HashSet::with_capacity(schema.fields.len());
        for field in &schema.fields {
            if !seen.insert(field.name.as_str()) {
                diagnostics.push(
                    DiagnosticItem::new(
                        &schema.id,
                        DiagnosticCode::DuplicateField,
                        format!("Field '{}' is declared more than once", field.name),
                    )
                    .with_context(format!("Field: {}", field.name)),
                );
            }
        }
    }

    fn check_hook(
        &self,
        schema: &SchemaDescriptor,
        hook: Option<&HookDescriptor>,
        slot: HookKind,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(hook) = hook else {
            return;
        };

        let problem = if hook.kind != slot {
            Some(format!("{:?} hook attached as the {:?} hook", hook.kind, slot))
        } else if slot == HookKind::After && hook.shape == HookShape::EarlyResult {
            Some("after-hook cannot return an early result".to_string())
        } else if slot == HookKind::Before && hook.shape == HookShape::Messages(MergeMode::Replace) {
            Some("before-hook messages are always appended to the global list".to_string())
        } else {
            None
        };

        if let Some(problem) = problem {
            diagnostics.push(
                DiagnosticItem::new(&schema.id, DiagnosticCode::InvalidHookShape, problem)
                    .with_context(format!("Shape: {}", hook.shape.label())),
            );
        }
    }
}
