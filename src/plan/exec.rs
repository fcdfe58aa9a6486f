//! Plan Execution
//!
//! One async interpreter runs every plan. Suspending plans hand the caller
//! a boxed future; blocking plans are polled once on the caller's stack and
//! must complete in that poll, since nothing they call can yield.
//!
//! Nested and base invocations go through [`ValidationContext::validate`],
//! which shares the caller's [`CallState`] (pool, depth limit, resolved
//! services) with the whole call tree.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::task::noop_waker_ref;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use super::{ExecutionMode, FieldStep, PlanSet, PlanStep, ValidationPlan};
use crate::dependency::{DependencyKey, ResolvedServices, Service, ServiceResolver};
use crate::error::{Result, ValidationError};
use crate::hooks::{HookDescriptor, HookInput, HookMessage, HookOutcome, HookShape, MergeMode};
use crate::result::{MessagePool, ValidationResult};
use crate::schema::SchemaId;

// =============================================================================
// Call State
// =============================================================================

/// State shared by every invocation inside one top-level call
pub(crate) struct CallState<'a> {
    plans: &'a PlanSet,
    pool: Arc<MessagePool>,
    max_depth: usize,
    services: Mutex<HashMap<DependencyKey, Service>>,
    rule_invocations: AtomicUsize,
}

impl<'a> CallState<'a> {
    pub(crate) fn new(plans: &'a PlanSet, pool: Arc<MessagePool>, max_depth: usize) -> Self {
        Self {
            plans,
            pool,
            max_depth,
            services: Mutex::new(HashMap::new()),
            rule_invocations: AtomicUsize::new(0),
        }
    }

    /// Resolve a service at most once per call
    fn resolve(&self, key: &DependencyKey, resolver: &dyn ServiceResolver) -> Result<Service> {
        if let Some(service) = self.services.lock().get(key) {
            return Ok(Arc::clone(service));
        }
        trace!("Resolving dependency {}", key);
        let service = resolver.resolve(key)?;
        self.services.lock().insert(key.clone(), Arc::clone(&service));
        Ok(service)
    }
}

// =============================================================================
// Context
// =============================================================================

/// Position of one plan invocation inside a call: the instance being
/// validated and the state shared with the rest of the call tree.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    instance: &'a Value,
    depth: usize,
    state: &'a CallState<'a>,
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn root(instance: &'a Value, state: &'a CallState<'a>) -> Self {
        Self {
            instance,
            depth: 0,
            state,
        }
    }

    pub fn instance(&self) -> &'a Value {
        self.instance
    }

    /// Nesting depth; zero for the top-level schema
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// A field of the current instance; `None` when missing or `null`
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.instance.get(name).filter(|v| !v.is_null())
    }

    /// Same call, one level deeper, looking at another instance
    pub fn redirect(&self, instance: &'a Value) -> Self {
        Self {
            instance,
            depth: self.depth + 1,
            state: self.state,
        }
    }

    /// Fresh result backed by the call's pool
    pub fn new_result(&self, hint: usize) -> ValidationResult {
        ValidationResult::with_capacity(&self.state.pool, hint)
    }

    /// Rule evaluations performed so far in this call
    pub fn rule_invocations(&self) -> usize {
        self.state.rule_invocations.load(Ordering::Relaxed)
    }

    /// Run another schema's plan inside this call
    pub fn validate(self, schema: &str, resolver: &'a dyn ServiceResolver) -> BoxFuture<'a, Result<ValidationResult>> {
        match self.state.plans.get(schema) {
            Some(plan) => execute(plan, self, resolver),
            None => future::err(ValidationError::UnknownSchema(schema.to_string())).boxed(),
        }
    }
}

impl fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("depth", &self.depth)
            .field("rule_invocations", &self.rule_invocations())
            .finish()
    }
}

// =============================================================================
// Interpreter
// =============================================================================

/// Per-invocation scratch space
struct Frame<'a> {
    nested: Vec<(&'a str, ValidationResult)>,
    base: Option<ValidationResult>,
    hint: usize,
    result: Option<ValidationResult>,
}

impl Frame<'_> {
    fn result(&mut self, ctx: &ValidationContext<'_>) -> &mut ValidationResult {
        self.result.get_or_insert_with(|| ctx.new_result(0))
    }
}

/// Execute one plan against the context's instance
pub fn execute<'a>(
    plan: &'a ValidationPlan,
    ctx: ValidationContext<'a>,
    resolver: &'a dyn ServiceResolver,
) -> BoxFuture<'a, Result<ValidationResult>> {
    Box::pin(async move {
        if ctx.depth > ctx.state.max_depth {
            return Err(ValidationError::DepthExceeded {
                schema: plan.schema.clone(),
                depth: ctx.depth,
            });
        }

        let mut services = ResolvedServices::default();
        let mut frame = Frame {
            nested: Vec::new(),
            base: None,
            hint: 0,
            result: None,
        };

        for step in &plan.steps {
            trace!("{} step: {}", plan.schema, step.label());
            match step {
                PlanStep::ResolveDependencies(keys) => {
                    for key in keys {
                        let service = ctx.state.resolve(key, resolver)?;
                        services.push(key.clone(), service);
                    }
                }
                PlanStep::ValidateNested { field, schema } => {
                    // Only objects are descended into
                    if let Some(nested @ Value::Object(_)) = ctx.field(field) {
                        let child = ctx.redirect(nested).validate(schema, resolver).await?;
                        frame.hint += child.message_count();
                        frame.nested.push((field.as_str(), child));
                    }
                }
                PlanStep::ValidateBase { schema } => {
                    let child = ctx.redirect(ctx.instance).validate(schema, resolver).await?;
                    frame.hint += child.message_count();
                    frame.base = Some(child);
                }
                PlanStep::Allocate { field_count } => {
                    frame.result = Some(ctx.new_result(field_count + frame.hint));
                }
                PlanStep::MergeNested => {
                    let nested = std::mem::take(&mut frame.nested);
                    let result = frame.result(&ctx);
                    for (field, child) in nested {
                        result.merge(child, Some(field));
                    }
                }
                PlanStep::MergeBase => {
                    if let Some(base) = frame.base.take() {
                        frame.result(&ctx).merge(base, None);
                    }
                }
                PlanStep::BeforeHook(hook) => {
                    let input = HookInput {
                        context: ctx,
                        field: None,
                        value: None,
                        services: &services,
                    };
                    let outcome = hook.handler.invoke(input).await?;
                    match (hook.shape, outcome) {
                        (HookShape::EarlyResult, HookOutcome::Early(Some(early))) => {
                            debug!("{} short-circuited by before-hook", plan.schema);
                            return Ok(early);
                        }
                        (HookShape::EarlyResult, HookOutcome::Early(None)) | (_, HookOutcome::Nothing) => {}
                        (HookShape::Messages(_), HookOutcome::Messages(items)) => {
                            let result = frame.result(&ctx);
                            for item in items {
                                result.add_global(item.message);
                            }
                        }
                        (shape, outcome) => return Err(mismatch(plan, shape, &outcome)),
                    }
                }
                PlanStep::ValidateField(field) => {
                    validate_field(plan, ctx, field, &services, frame.result(&ctx)).await?;
                }
                PlanStep::AfterHook(hook) => {
                    run_after_hook(plan, ctx, hook, &services, frame.result(&ctx)).await?;
                }
                PlanStep::Return => break,
            }
        }

        Ok(frame.result.unwrap_or_else(|| ctx.new_result(0)))
    })
}

async fn validate_field(
    plan: &ValidationPlan,
    ctx: ValidationContext<'_>,
    field: &FieldStep,
    services: &ResolvedServices,
    result: &mut ValidationResult,
) -> Result<()> {
    let value = ctx.field(&field.name);
    let mut messages = Vec::new();

    for rule in &field.rules {
        ctx.state.rule_invocations.fetch_add(1, Ordering::Relaxed);
        messages.extend(rule.validator.evaluate(value, &rule.args)?);
    }

    if let Some(custom) = &field.custom {
        let input = HookInput {
            context: ctx,
            field: Some(&field.name),
            value,
            services,
        };
        match custom.handler.invoke(input).await? {
            HookOutcome::Nothing => {}
            HookOutcome::Messages(items) => messages.extend(items.into_iter().map(|m| m.message)),
            outcome => {
                return Err(ValidationError::HookShapeMismatch {
                    schema: plan.schema.clone(),
                    declared: "messages",
                    actual: outcome.label(),
                })
            }
        }
    }

    result.extend_property(&field.name, messages);
    Ok(())
}

async fn run_after_hook(
    plan: &ValidationPlan,
    ctx: ValidationContext<'_>,
    hook: &HookDescriptor,
    services: &ResolvedServices,
    result: &mut ValidationResult,
) -> Result<()> {
    let input = HookInput {
        context: ctx,
        field: None,
        value: None,
        services,
    };
    match (hook.shape, hook.handler.invoke(input).await?) {
        (HookShape::NoResult | HookShape::Messages(_), HookOutcome::Nothing) => Ok(()),
        (HookShape::Messages(mode), HookOutcome::Messages(items)) => {
            apply_messages(result, mode, items);
            Ok(())
        }
        (shape, outcome) => Err(mismatch(plan, shape, &outcome)),
    }
}

/// Route after-hook messages to their paths. `Replace` clears each
/// targeted path once, before its first new message.
fn apply_messages(result: &mut ValidationResult, mode: MergeMode, items: Vec<HookMessage>) {
    let mut cleared: HashSet<Option<String>> = HashSet::new();
    for HookMessage { path, message } in items {
        if mode == MergeMode::Replace && cleared.insert(path.clone()) {
            match &path {
                Some(path) => result.clear_property(path),
                None => result.clear_global(),
            }
        }
        match &path {
            Some(path) => result.add_property(path, message),
            None => result.add_global(message),
        }
    }
}

fn mismatch(plan: &ValidationPlan, shape: HookShape, outcome: &HookOutcome) -> ValidationError {
    ValidationError::HookShapeMismatch {
        schema: plan.schema.clone(),
        declared: shape.label(),
        actual: outcome.label(),
    }
}

// =============================================================================
// Top-level Calls
// =============================================================================

/// Run a top-level call with fresh call state
pub(crate) fn run<'a>(
    plans: &'a PlanSet,
    plan: &'a ValidationPlan,
    instance: &'a Value,
    resolver: &'a dyn ServiceResolver,
    pool: Arc<MessagePool>,
    max_depth: usize,
) -> BoxFuture<'a, Result<ValidationResult>> {
    Box::pin(async move {
        let state = CallState::new(plans, pool, max_depth);
        let ctx = ValidationContext::root(instance, &state);
        let result = execute(plan, ctx, resolver).await;
        debug!(
            "Validated {}: {} rule evaluations, {}",
            plan.schema,
            ctx.rule_invocations(),
            match &result {
                Ok(r) if r.success() => "valid".to_string(),
                Ok(r) => format!("{} messages", r.message_count()),
                Err(e) => format!("failed: {}", e),
            }
        );
        result
    })
}

enum ValidationState<'a> {
    Ready(Option<Result<ValidationResult>>),
    Pending(BoxFuture<'a, Result<ValidationResult>>),
}

/// Outcome of starting a validation.
///
/// Blocking plans are already complete; suspending plans complete when
/// awaited. Either way the value can be awaited, and blocking callers use
/// [`Validation::into_ready`].
pub struct Validation<'a> {
    schema: SchemaId,
    mode: ExecutionMode,
    state: ValidationState<'a>,
}

impl<'a> Validation<'a> {
    /// Start a call in the plan's mode
    pub(crate) fn start(schema: SchemaId, mode: ExecutionMode, mut future: BoxFuture<'a, Result<ValidationResult>>) -> Self {
        let state = match mode {
            ExecutionMode::Suspending => ValidationState::Pending(future),
            ExecutionMode::Blocking => {
                let mut cx = Context::from_waker(noop_waker_ref());
                match future.as_mut().poll(&mut cx) {
                    Poll::Ready(result) => ValidationState::Ready(Some(result)),
                    Poll::Pending => ValidationState::Ready(Some(Err(ValidationError::WouldSuspend(schema.clone())))),
                }
            }
        };
        Self { schema, mode, state }
    }

    /// A call that failed before it started
    pub(crate) fn failed(schema: SchemaId, error: ValidationError) -> Self {
        Self {
            schema,
            mode: ExecutionMode::Blocking,
            state: ValidationState::Ready(Some(Err(error))),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ValidationState::Ready(_))
    }

    /// The finished result of a blocking call.
    ///
    /// Fails with [`ValidationError::WouldSuspend`] for suspending plans;
    /// await those instead.
    pub fn into_ready(self) -> Result<ValidationResult> {
        match self.state {
            ValidationState::Ready(Some(result)) => result,
            ValidationState::Ready(None) | ValidationState::Pending(_) => {
                Err(ValidationError::WouldSuspend(self.schema))
            }
        }
    }
}

impl Future for Validation<'_> {
    type Output = Result<ValidationResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            ValidationState::Ready(slot) => match slot.take() {
                Some(result) => Poll::Ready(result),
                None => panic!("Validation polled after completion"),
            },
            ValidationState::Pending(future) => {
                let output = futures_util::ready!(future.as_mut().poll(cx));
                this.state = ValidationState::Ready(None);
                Poll::Ready(output)
            }
        }
    }
}

impl fmt::Debug for Validation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("schema", &self.schema)
            .field("mode", &self.mode)
            .field("ready", &self.is_ready())
            .finish()
    }
}
