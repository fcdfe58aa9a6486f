//! Validation Plans
//!
//! A [`ValidationPlan`] is the synthesized, immutable step sequence for one
//! schema plus its execution mode. Plans are built once by the
//! [`Synthesizer`](synth::Synthesizer), shared behind `Arc`, and interpreted
//! by [`exec`] for every call.

pub mod exec;
pub mod synth;

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde::Serialize;

use crate::checksum::Checksum;
use crate::dependency::DependencyKey;
use crate::hooks::{CustomValidation, HookDescriptor};
use crate::schema::SchemaId;
use crate::validators::{RuleArgs, ValidatorDescriptor};

/// Whether a plan completes on the caller's stack or may suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Blocking,
    Suspending,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Suspending => write!(f, "suspending"),
        }
    }
}

/// A rule binding whose validator has been looked up
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub validator: Arc<ValidatorDescriptor>,
    pub args: RuleArgs,
}

/// Everything evaluated for one field in the field pass
#[derive(Debug, Clone)]
pub struct FieldStep {
    pub name: String,
    pub rules: Vec<ResolvedRule>,
    pub custom: Option<CustomValidation>,
}

/// One step of a plan, in execution order
#[derive(Debug, Clone)]
pub enum PlanStep {
    ResolveDependencies(Vec<DependencyKey>),
    ValidateNested { field: String, schema: SchemaId },
    ValidateBase { schema: SchemaId },
    Allocate { field_count: usize },
    MergeNested,
    MergeBase,
    BeforeHook(HookDescriptor),
    ValidateField(FieldStep),
    AfterHook(HookDescriptor),
    Return,
}

impl PlanStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResolveDependencies(_) => "resolve-dependencies",
            Self::ValidateNested { .. } => "validate-nested",
            Self::ValidateBase { .. } => "validate-base",
            Self::Allocate { .. } => "allocate",
            Self::MergeNested => "merge-nested",
            Self::MergeBase => "merge-base",
            Self::BeforeHook(_) => "before-hook",
            Self::ValidateField(_) => "validate-field",
            Self::AfterHook(_) => "after-hook",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveDependencies(keys) => {
                let keys: Vec<_> = keys.iter().map(DependencyKey::as_str).collect();
                write!(f, "resolve dependencies [{}]", keys.join(", "))
            }
            Self::ValidateNested { field, schema } => write!(f, "validate nested '{}' as {}", field, schema),
            Self::ValidateBase { schema } => write!(f, "validate base {}", schema),
            Self::Allocate { field_count } => write!(f, "allocate result ({} fields)", field_count),
            Self::MergeNested => write!(f, "merge nested results"),
            Self::MergeBase => write!(f, "merge base result"),
            Self::BeforeHook(hook) => write!(
                f,
                "before hook ({}{})",
                hook.shape.label(),
                if hook.is_awaitable() { ", awaitable" } else { "" }
            ),
            Self::ValidateField(field) => {
                let rules: Vec<_> = field.rules.iter().map(|r| r.validator.id.as_str()).collect();
                write!(f, "validate '{}' [{}]", field.name, rules.join(", "))?;
                if field.custom.is_some() {
                    write!(f, " + custom")?;
                }
                Ok(())
            }
            Self::AfterHook(hook) => write!(
                f,
                "after hook ({}{})",
                hook.shape.label(),
                if hook.is_awaitable() { ", awaitable" } else { "" }
            ),
            Self::Return => write!(f, "return"),
        }
    }
}

/// Synthesized step sequence for one schema
#[derive(Debug, Clone)]
pub struct ValidationPlan {
    pub schema: SchemaId,
    pub mode: ExecutionMode,
    pub steps: Vec<PlanStep>,
    /// Services this schema resolves itself, first-seen order
    pub dependencies: Vec<DependencyKey>,
    /// Checksum of the schema the plan was synthesized from
    pub checksum: Checksum,
}

impl ValidationPlan {
    pub fn is_suspending(&self) -> bool {
        self.mode == ExecutionMode::Suspending
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldStep> {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::ValidateField(field) => Some(field),
            _ => None,
        })
    }

    /// Human-readable listing of the plan
    pub fn describe(&self) -> String {
        let mut out = format!("{} ({}, checksum {})\n", self.schema, self.mode, self.checksum.short());
        for (i, step) in self.steps.iter().enumerate() {
            let _ = writeln!(out, "  {:>2}. {}", i + 1, step);
        }
        out
    }
}

/// Plans keyed by schema id
#[derive(Debug, Clone, Default)]
pub struct PlanSet {
    plans: HashMap<SchemaId, Arc<ValidationPlan>>,
}

impl PlanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a plan, returning the one it replaced
    pub fn insert(&mut self, plan: ValidationPlan) -> Option<Arc<ValidationPlan>> {
        self.plans.insert(plan.schema.clone(), Arc::new(plan))
    }

    pub fn get(&self, schema: &str) -> Option<&Arc<ValidationPlan>> {
        self.plans.get(schema)
    }

    /// Plans ordered by schema id
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ValidationPlan>> {
        let mut plans: Vec<_> = self.plans.values().collect();
        plans.sort_by(|a, b| a.schema.cmp(&b.schema));
        plans.into_iter()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
