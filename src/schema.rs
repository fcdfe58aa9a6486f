//! Schema Model
//!
//! Immutable descriptions of validatable object types. The declarative part
//! (fields, rules, nullability, inheritance, auto-validator override) is
//! serde-loadable; hooks and custom validations are code and are attached
//! through [`SchemaBuilder`].
//!
//! ## Example catalog file:
//! ```json
//! {
//!   "schemas": [
//!     {
//!       "id": "Address",
//!       "fields": [
//!         { "name": "zip", "type": { "kind": "scalar" },
//!           "rules": [ { "validator": "pattern", "args": { "pattern": "^[0-9]{5}$" } } ] }
//!       ]
//!     },
//!     {
//!       "id": "Customer",
//!       "parent": "Entity",
//!       "fields": [
//!         { "name": "address", "type": { "kind": "nested", "schema": "Address" } }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::Result;
use crate::hooks::{CustomValidation, HookDescriptor};
use crate::validators::RuleArgs;

/// Name/namespace identity of a schema
pub type SchemaId = String;

/// Type classification of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeClass {
    /// Plain value (string, number, bool, list)
    Scalar,
    /// One of a fixed set of values; always has a default
    Enum { variants: Vec<String> },
    /// Value type with a well-defined default
    Struct,
    /// Object validated by its own schema's plan
    Nested { schema: SchemaId },
}

impl TypeClass {
    pub fn nested_schema(&self) -> Option<&str> {
        match self {
            Self::Nested { schema } => Some(schema),
            _ => None,
        }
    }

    /// Enums and structs can never be "missing"
    pub fn has_default(&self) -> bool {
        matches!(self, Self::Enum { .. } | Self::Struct)
    }
}

/// A field's association with one validator and its literal arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBinding {
    pub validator: String,
    #[serde(default, skip_serializing_if = "RuleArgs::is_empty")]
    pub args: RuleArgs,
}

impl RuleBinding {
    pub fn new(validator: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            args: RuleArgs::new(),
        }
    }

    pub fn with_args(validator: impl Into<String>, args: RuleArgs) -> Self {
        Self {
            validator: validator.into(),
            args,
        }
    }
}

/// One named, typed member of a schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(rename = "type")]
    pub type_class: TypeClass,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleBinding>,
    #[serde(skip)]
    pub custom: Option<CustomValidation>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, type_class: TypeClass) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            type_class,
            rules: Vec::new(),
            custom: None,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, TypeClass::Scalar)
    }

    pub fn nested(name: impl Into<String>, schema: impl Into<SchemaId>) -> Self {
        Self::new(name, TypeClass::Nested { schema: schema.into() })
    }

    pub fn enumeration<S: Into<String>>(name: impl Into<String>, variants: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            TypeClass::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Bind a rule with no arguments
    pub fn rule(mut self, validator: impl Into<String>) -> Self {
        self.rules.push(RuleBinding::new(validator));
        self
    }

    /// Bind a rule with literal arguments
    pub fn rule_with(mut self, validator: impl Into<String>, args: RuleArgs) -> Self {
        self.rules.push(RuleBinding::with_args(validator, args));
        self
    }

    pub fn custom(mut self, custom: CustomValidation) -> Self {
        self.custom = Some(custom);
        self
    }

    pub fn has_custom_validation(&self) -> bool {
        self.custom.is_some()
    }
}

/// Per-schema override of the global auto-validator defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoValidators {
    ForceOn,
    ForceOff,
    #[default]
    Inherit,
}

/// Immutable description of one object type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub id: SchemaId,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SchemaId>,
    #[serde(default)]
    pub auto_validators: AutoValidators,
    #[serde(skip)]
    pub before: Option<HookDescriptor>,
    #[serde(skip)]
    pub after: Option<HookDescriptor>,
}

impl SchemaDescriptor {
    pub fn builder(id: impl Into<SchemaId>) -> SchemaBuilder {
        SchemaBuilder::new(id)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Nested schemas referenced by fields, in declaration order
    pub fn nested_schemas(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.type_class.nested_schema().map(|s| (f.name.as_str(), s)))
    }

    /// Checksum over everything that shapes the synthesized plan.
    ///
    /// Hooks and custom validations contribute their shape, dependencies
    /// and handler identity, so replacing a handler changes the checksum
    /// within the running process.
    pub fn checksum(&self) -> Checksum {
        let mut fingerprint = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut fingerprint {
            let custom: BTreeMap<&str, Value> = self
                .fields
                .iter()
                .filter_map(|f| f.custom.as_ref().map(|c| (f.name.as_str(), c.fingerprint())))
                .collect();
            map.insert(
                "hooks".to_string(),
                serde_json::json!({
                    "before": self.before.as_ref().map(HookDescriptor::fingerprint),
                    "after": self.after.as_ref().map(HookDescriptor::fingerprint),
                    "custom": custom,
                }),
            );
        }
        Checksum::from_json(&fingerprint)
    }
}

/// Builder for [`SchemaDescriptor`]
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: SchemaDescriptor,
}

impl SchemaBuilder {
    pub fn new(id: impl Into<SchemaId>) -> Self {
        Self {
            schema: SchemaDescriptor {
                id: id.into(),
                fields: Vec::new(),
                parent: None,
                auto_validators: AutoValidators::Inherit,
                before: None,
                after: None,
            },
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn parent(mut self, parent: impl Into<SchemaId>) -> Self {
        self.schema.parent = Some(parent.into());
        self
    }

    pub fn auto_validators(mut self, mode: AutoValidators) -> Self {
        self.schema.auto_validators = mode;
        self
    }

    pub fn before(mut self, hook: HookDescriptor) -> Self {
        self.schema.before = Some(hook);
        self
    }

    pub fn after(mut self, hook: HookDescriptor) -> Self {
        self.schema.after = Some(hook);
        self
    }

    pub fn build(self) -> SchemaDescriptor {
        self.schema
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    schemas: Vec<SchemaDescriptor>,
}

/// The set of schemas an engine is built from
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<SchemaId, SchemaDescriptor>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema, returning the one it replaced
    pub fn insert(&mut self, schema: SchemaDescriptor) -> Option<SchemaDescriptor> {
        self.schemas.insert(schema.id.clone(), schema)
    }

    pub fn with(mut self, schema: SchemaDescriptor) -> Self {
        self.insert(schema);
        self
    }

    pub fn get(&self, id: &str) -> Option<&SchemaDescriptor> {
        self.schemas.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// Schemas ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Parse a `{"schemas": [...]}` document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Ok(file.schemas.into_iter().fold(Self::new(), Self::with))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
