//! Auto-Validator Policy
//!
//! Injects implicit rule bindings from field shape before synthesis. An
//! injected binding is an ordinary [`RuleBinding`] appended after the
//! field's declared ones.

use serde_json::Value;

use crate::config::AutoConfig;
use crate::schema::{AutoValidators, FieldDescriptor, RuleBinding, TypeClass};
use crate::validators::builtin::{ENUM, REQUIRED};
use crate::validators::{RuleArgs, ValidatorRegistry, ValidatorRole};

/// Auto-validator flags after applying a schema override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveAuto {
    pub required: bool,
    pub enum_membership: bool,
}

#[derive(Debug, Clone)]
pub struct AutoValidatorPolicy {
    defaults: AutoConfig,
}

impl AutoValidatorPolicy {
    pub fn new(defaults: AutoConfig) -> Self {
        Self { defaults }
    }

    /// Schema override if set, otherwise the configured defaults
    pub fn effective(&self, mode: AutoValidators) -> EffectiveAuto {
        match mode {
            AutoValidators::ForceOn => EffectiveAuto {
                required: true,
                enum_membership: true,
            },
            AutoValidators::ForceOff => EffectiveAuto {
                required: false,
                enum_membership: false,
            },
            AutoValidators::Inherit => EffectiveAuto {
                required: self.defaults.required,
                enum_membership: self.defaults.enum_membership,
            },
        }
    }

    /// Field bindings with implicit ones appended
    pub fn bindings(
        &self,
        field: &FieldDescriptor,
        mode: AutoValidators,
        registry: &ValidatorRegistry,
    ) -> Vec<RuleBinding> {
        let auto = self.effective(mode);
        let mut rules = field.rules.clone();
        let has_role = |role| {
            field
                .rules
                .iter()
                .any(|r| registry.role(&r.validator) == Some(role))
        };

        if auto.required
            && !field.nullable
            && !field.type_class.has_default()
            && !has_role(ValidatorRole::Required)
        {
            rules.push(RuleBinding::new(REQUIRED));
        }

        if let TypeClass::Enum { variants } = &field.type_class {
            if auto.enum_membership && !has_role(ValidatorRole::EnumMembership) {
                let values = variants.iter().cloned().map(Value::String).collect::<Vec<_>>();
                rules.push(RuleBinding::with_args(ENUM, RuleArgs::new().with("values", values)));
            }
        }

        rules
    }
}

impl Default for AutoValidatorPolicy {
    fn default() -> Self {
        Self::new(AutoConfig::default())
    }
}
