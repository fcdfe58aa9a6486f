//! Built-in validators
//!
//! Every built-in except `required` treats an absent value as valid, and the
//! string-shaped ones also pass empty or whitespace-only strings, leaving
//! emptiness to `required`. One empty required field therefore yields one message.

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;

use super::{RuleArgs, Validator, ValidatorDescriptor, ValidatorRole};
use crate::error::{Result, ValidationError};
use crate::result::Message;

pub const REQUIRED: &str = "required";
pub const ENUM: &str = "enum";
pub const MIN_LENGTH: &str = "min_length";
pub const MAX_LENGTH: &str = "max_length";
pub const RANGE: &str = "range";
pub const PATTERN: &str = "pattern";
pub const EMAIL: &str = "email";

/// All built-in descriptors
pub fn descriptors() -> Vec<ValidatorDescriptor> {
    vec![
        ValidatorDescriptor::new(REQUIRED, ValidatorRole::Required, Required),
        ValidatorDescriptor::new(ENUM, ValidatorRole::EnumMembership, EnumMembership),
        ValidatorDescriptor::new(MIN_LENGTH, ValidatorRole::General, MinLength),
        ValidatorDescriptor::new(MAX_LENGTH, ValidatorRole::General, MaxLength),
        ValidatorDescriptor::new(RANGE, ValidatorRole::General, Range),
        ValidatorDescriptor::new(PATTERN, ValidatorRole::General, Pattern::default()),
        ValidatorDescriptor::new(EMAIL, ValidatorRole::General, Email),
    ]
}

/// Absent, or a string with nothing but whitespace
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn required_arg<'a>(validator: &str, args: &'a RuleArgs, name: &str) -> Result<&'a Value> {
    args.get(name)
        .ok_or_else(|| ValidationError::evaluator(validator, format!("missing argument '{}'", name)))
}

// =============================================================================
// Presence
// =============================================================================

pub struct Required;

impl Validator for Required {
    fn evaluate(&self, value: Option<&Value>, _args: &RuleArgs) -> Result<Vec<Message>> {
        if is_blank(value) {
            Ok(vec![Message::new(REQUIRED, "A value is required").with_value(value)])
        } else {
            Ok(Vec::new())
        }
    }
}

pub struct EnumMembership;

impl Validator for EnumMembership {
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let allowed = required_arg(ENUM, args, "values")?
            .as_array()
            .ok_or_else(|| ValidationError::evaluator(ENUM, "'values' must be an array"))?;

        if allowed.contains(value) {
            return Ok(Vec::new());
        }
        Ok(vec![Message::new(ENUM, "'{value}' is not one of {values}")
            .with_value(Some(value))
            .with_param("values", Value::Array(allowed.clone()))])
    }
}

// =============================================================================
// Length
// =============================================================================

pub struct MinLength;

impl Validator for MinLength {
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        let min = required_arg(MIN_LENGTH, args, "min")?
            .as_u64()
            .ok_or_else(|| ValidationError::evaluator(MIN_LENGTH, "'min' must be a non-negative integer"))?;
        if is_blank(value) {
            return Ok(Vec::new());
        }
        match value.and_then(length) {
            Some(len) if (len as u64) < min => Ok(vec![
                Message::new(MIN_LENGTH, "Must be at least {min} characters long")
                    .with_value(value)
                    .with_param("min", min),
            ]),
            _ => Ok(Vec::new()),
        }
    }
}

pub struct MaxLength;

impl Validator for MaxLength {
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        let max = required_arg(MAX_LENGTH, args, "max")?
            .as_u64()
            .ok_or_else(|| ValidationError::evaluator(MAX_LENGTH, "'max' must be a non-negative integer"))?;
        if is_blank(value) {
            return Ok(Vec::new());
        }
        match value.and_then(length) {
            Some(len) if (len as u64) > max => Ok(vec![
                Message::new(MAX_LENGTH, "Must be at most {max} characters long")
                    .with_value(value)
                    .with_param("max", max),
            ]),
            _ => Ok(Vec::new()),
        }
    }
}

// =============================================================================
// Numeric
// =============================================================================

pub struct Range;

impl Validator for Range {
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        let min = args.get_f64("min");
        let max = args.get_f64("max");
        if min.is_none() && max.is_none() {
            return Err(ValidationError::evaluator(RANGE, "needs 'min' or 'max'"));
        }
        let Some(number) = value.and_then(Value::as_f64) else {
            return Ok(Vec::new());
        };

        let below = min.is_some_and(|min| number < min);
        let above = max.is_some_and(|max| number > max);
        if !below && !above {
            return Ok(Vec::new());
        }

        let template = match (min, max) {
            (Some(_), Some(_)) => "Must be between {min} and {max}",
            (Some(_), None) => "Must be at least {min}",
            _ => "Must be at most {max}",
        };
        let mut message = Message::new(RANGE, template).with_value(value);
        for name in ["min", "max"] {
            if let Some(bound) = args.get(name) {
                message = message.with_param(name, bound.clone());
            }
        }
        Ok(vec![message])
    }
}

// =============================================================================
// Text
// =============================================================================

/// Matches a string against the `pattern` argument. Compiled patterns are cached.
#[derive(Default)]
pub struct Pattern {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl Pattern {
    fn is_match(&self, pattern: &str, text: &str) -> Result<bool> {
        if let Some(regex) = self.compiled.read().get(pattern) {
            return Ok(regex.is_match(text));
        }
        let regex = Regex::new(pattern).map_err(|e| ValidationError::evaluator(PATTERN, e))?;
        let matched = regex.is_match(text);
        self.compiled.write().insert(pattern.to_string(), regex);
        Ok(matched)
    }
}

impl Validator for Pattern {
    fn evaluate(&self, value: Option<&Value>, args: &RuleArgs) -> Result<Vec<Message>> {
        let pattern = required_arg(PATTERN, args, "pattern")?
            .as_str()
            .ok_or_else(|| ValidationError::evaluator(PATTERN, "'pattern' must be a string"))?;
        if is_blank(value) {
            return Ok(Vec::new());
        }
        let Some(text) = value.and_then(Value::as_str) else {
            return Ok(Vec::new());
        };

        if self.is_match(pattern, text)? {
            return Ok(Vec::new());
        }
        let template = args.get_str("message").unwrap_or("Does not match the required format");
        Ok(vec![Message::new(PATTERN, template)
            .with_value(value)
            .with_param("pattern", pattern)])
    }
}

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid"));

pub struct Email;

impl Validator for Email {
    fn evaluate(&self, value: Option<&Value>, _args: &RuleArgs) -> Result<Vec<Message>> {
        if is_blank(value) {
            return Ok(Vec::new());
        }
        match value.and_then(Value::as_str) {
            Some(text) if !EMAIL_REGEX.is_match(text) => Ok(vec![
                Message::new(EMAIL, "Must be a valid email address").with_value(value),
            ]),
            _ => Ok(Vec::new()),
        }
    }
}
