//! Lifecycle hooks and custom field validation
//!
//! Hooks run before and after field validation. Each carries a declared
//! [`HookShape`] (what it may return) and a [`HookHandler`] (how it runs).
//! Whether a hook is awaitable follows from the handler variant, so it is
//! known when the schema is built and never inspected per call.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dependency::{DependencyKey, ResolvedServices};
use crate::error::Result;
use crate::plan::exec::ValidationContext;
use crate::result::{Message, ValidationResult};

/// Position of a hook in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Before,
    After,
}

/// How after-hook messages meet the messages already recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Append to the targeted path (or the global list)
    #[default]
    Append,
    /// Clear each targeted path once, then insert
    Replace,
}

/// Declared return shape of a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", content = "merge", rename_all = "snake_case")]
pub enum HookShape {
    /// Invoked for effect only
    NoResult,
    /// May return a finished result that ends the call (before-hook only)
    EarlyResult,
    /// Yields messages; `Replace` is only valid on the after-hook
    Messages(MergeMode),
}

impl HookShape {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoResult => "no-result",
            Self::EarlyResult => "early-result",
            Self::Messages(MergeMode::Append) => "messages",
            Self::Messages(MergeMode::Replace) => "messages-replace",
        }
    }
}

/// A message yielded by a hook, optionally addressed to a property path
#[derive(Debug, Clone, PartialEq)]
pub struct HookMessage {
    pub path: Option<String>,
    pub message: Message,
}

impl HookMessage {
    pub fn global(message: Message) -> Self {
        Self { path: None, message }
    }

    pub fn at(path: impl Into<String>, message: Message) -> Self {
        Self {
            path: Some(path.into()),
            message,
        }
    }
}

/// What a hook handler returned
#[derive(Debug)]
pub enum HookOutcome {
    Nothing,
    Early(Option<ValidationResult>),
    Messages(Vec<HookMessage>),
}

impl HookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nothing => "nothing",
            Self::Early(_) => "early-result",
            Self::Messages(_) => "messages",
        }
    }

    /// Messages with no path
    pub fn global(messages: impl IntoIterator<Item = Message>) -> Self {
        Self::Messages(messages.into_iter().map(HookMessage::global).collect())
    }
}

/// Everything a hook or custom validation sees when invoked
#[derive(Clone, Copy)]
pub struct HookInput<'a> {
    /// Call context, redirected to the instance being validated
    pub context: ValidationContext<'a>,
    /// Field under custom validation, if any
    pub field: Option<&'a str>,
    /// That field's value (`None` when absent)
    pub value: Option<&'a Value>,
    /// Services the schema declared
    pub services: &'a ResolvedServices,
}

impl<'a> HookInput<'a> {
    pub fn instance(&self) -> &'a Value {
        self.context.instance()
    }

    /// Fresh result backed by the call's pool, for early returns
    pub fn new_result(&self) -> ValidationResult {
        self.context.new_result(0)
    }
}

/// Hook that completes on the caller's stack
pub trait Hook: Send + Sync {
    fn call(&self, input: &HookInput<'_>) -> Result<HookOutcome>;
}

impl<F> Hook for F
where
    F: Fn(&HookInput<'_>) -> Result<HookOutcome> + Send + Sync,
{
    fn call(&self, input: &HookInput<'_>) -> Result<HookOutcome> {
        self(input)
    }
}

/// Hook that may suspend
pub trait AsyncHook: Send + Sync {
    fn call<'a>(&'a self, input: HookInput<'a>) -> BoxFuture<'a, Result<HookOutcome>>;
}

/// Executable part of a hook or custom validation
#[derive(Clone)]
pub enum HookHandler {
    Blocking(Arc<dyn Hook>),
    Awaitable(Arc<dyn AsyncHook>),
}

impl HookHandler {
    pub fn blocking(hook: impl Hook + 'static) -> Self {
        Self::Blocking(Arc::new(hook))
    }

    /// Blocking handler from a closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&HookInput<'_>) -> Result<HookOutcome> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    pub fn awaitable(hook: impl AsyncHook + 'static) -> Self {
        Self::Awaitable(Arc::new(hook))
    }

    pub fn is_awaitable(&self) -> bool {
        matches!(self, Self::Awaitable(_))
    }

    /// Address of the handler, stable for the handler's lifetime
    pub(crate) fn identity(&self) -> usize {
        match self {
            Self::Blocking(h) => Arc::as_ptr(h) as *const () as usize,
            Self::Awaitable(h) => Arc::as_ptr(h) as *const () as usize,
        }
    }

    pub(crate) async fn invoke(&self, input: HookInput<'_>) -> Result<HookOutcome> {
        match self {
            Self::Blocking(hook) => hook.call(&input),
            Self::Awaitable(hook) => hook.call(input).await,
        }
    }
}

impl fmt::Debug for HookHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => write!(f, "Blocking"),
            Self::Awaitable(_) => write!(f, "Awaitable"),
        }
    }
}

/// A before or after hook attached to a schema
#[derive(Debug, Clone)]
pub struct HookDescriptor {
    pub kind: HookKind,
    pub shape: HookShape,
    pub dependencies: Vec<DependencyKey>,
    pub handler: HookHandler,
}

impl HookDescriptor {
    pub fn before(shape: HookShape, handler: HookHandler) -> Self {
        Self {
            kind: HookKind::Before,
            shape,
            dependencies: Vec::new(),
            handler,
        }
    }

    pub fn after(shape: HookShape, handler: HookHandler) -> Self {
        Self {
            kind: HookKind::After,
            shape,
            dependencies: Vec::new(),
            handler,
        }
    }

    pub fn depends_on(mut self, key: impl Into<DependencyKey>) -> Self {
        self.dependencies.push(key.into());
        self
    }

    pub fn is_awaitable(&self) -> bool {
        self.handler.is_awaitable()
    }

    /// Shape-level description used in schema checksums
    pub(crate) fn fingerprint(&self) -> Value {
        serde_json::json!({
            "kind": self.kind,
            "shape": self.shape,
            "awaitable": self.is_awaitable(),
            "dependencies": self.dependencies,
            "handler": self.handler.identity(),
        })
    }
}

/// Field-level validation written in code.
///
/// Runs after the field's rule bindings and must yield
/// [`HookOutcome::Messages`] or [`HookOutcome::Nothing`]; message paths are
/// ignored because everything lands on the field's own path.
#[derive(Debug, Clone)]
pub struct CustomValidation {
    pub dependencies: Vec<DependencyKey>,
    pub handler: HookHandler,
}

impl CustomValidation {
    pub fn new(handler: HookHandler) -> Self {
        Self {
            dependencies: Vec::new(),
            handler,
        }
    }

    pub fn depends_on(mut self, key: impl Into<DependencyKey>) -> Self {
        self.dependencies.push(key.into());
        self
    }

    pub fn is_awaitable(&self) -> bool {
        self.handler.is_awaitable()
    }

    pub(crate) fn fingerprint(&self) -> Value {
        serde_json::json!({
            "awaitable": self.is_awaitable(),
            "dependencies": self.dependencies,
            "handler": self.handler.identity(),
        })
    }
}
