//! Validator descriptors
//!
//! A validator is a stateless predicate over one field value. The plan
//! synthesizer only ever sees validators through [`ValidatorDescriptor`],
//! looked up by id in the [`ValidatorRegistry`].
//!
//! ```text
//! RuleBinding { validator: "min_length", args: { min: 3 } }
//!        │
//!        ▼  registry.lookup("min_length")
//! ValidatorDescriptor { id, role, evaluator }
//!        │
//!        ▼  evaluate(value, args)
//! Vec<Message>
//! ```

pub mod builtin;
pub mod registry;

pub use registry::ValidatorRegistry;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::result::Message;

/// Literal arguments supplied where a rule is bound to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleArgs(Map<String, Value>);

impl RuleArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the auto-validator policy needs to know about a validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorRole {
    /// Rejects absent values
    Required,
    /// Restricts a value to a fixed set
    EnumMembership,
    General,
}

/// Evaluation contract of a validator. Synchronous and side-effect free.
pub trait Validator: Send + Sync {
    /// `value` is `None` when the field is missing or `null`
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>>;
}

impl<F> Validator for F
where
    F: Fn(Option<&Value>, &RuleArgs) -> Result<Vec<Message>> + Send + Sync,
{
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        self(value, args)
    }
}

/// A registered validator
#[derive(Clone)]
pub struct ValidatorDescriptor {
    pub id: String,
    pub role: ValidatorRole,
    evaluator: Arc<dyn Validator>,
}

impl ValidatorDescriptor {
    pub fn new(id: impl Into<String>, role: ValidatorRole, evaluator: impl Validator + 'static) -> Self {
        Self {
            id: id.into(),
            role,
            evaluator: Arc::new(evaluator),
        }
    }

    /// General-purpose validator from a closure
    pub fn from_fn<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<&Value>, &RuleArgs) -> Result<Vec<Message>> + Send + Sync + 'static,
    {
        Self::new(id, ValidatorRole::General, f)
    }

    pub fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        self.evaluator.evaluate(value, args)
    }
}

impl fmt::Debug for ValidatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorDescriptor")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}
