//! Diagnostics
//!
//! Collects findings from graph analysis and plan synthesis.
//! Errors stop [`Engine::build`](crate::Engine::build); warnings and infos
//! stay available on the built engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::SchemaId;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Rule Resolution ===
    /// Rule binding names a validator the registry does not know; the binding is dropped
    UnknownRule,

    // === Schema Graph ===
    /// Parent or nested schema is not in the catalog
    UnknownSchema,
    /// A schema inherits from itself, directly or through its ancestors
    InheritanceCycle,
    /// A schema reaches itself through nested fields (legal, validated lazily)
    RecursiveNesting,

    // === Shape ===
    /// Two fields share a name inside one schema
    DuplicateField,
    /// Hook declared with a shape its position cannot honor
    InvalidHookShape,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownRule => "W001",
            Self::UnknownSchema => "E001",
            Self::InheritanceCycle => "E002",
            Self::RecursiveNesting => "I001",
            Self::DuplicateField => "E003",
            Self::InvalidHookShape => "E004",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownSchema
            | Self::InheritanceCycle
            | Self::DuplicateField
            | Self::InvalidHookShape => Severity::Error,

            Self::UnknownRule => Severity::Warning,

            Self::RecursiveNesting => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Schema that caused this diagnostic
    pub schema_id: SchemaId,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (e.g., field names, cycle members)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(schema_id: impl Into<SchemaId>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            schema_id: schema_id.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.schema_id
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from analysis and synthesis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record a rule binding dropped because its validator is unknown
    pub fn unknown_rule(&mut self, schema_id: impl Into<SchemaId>, field: &str, validator: &str) {
        self.push(
            DiagnosticItem::new(
                schema_id,
                DiagnosticCode::UnknownRule,
                format!("Rule '{}' on field '{}' has no registered validator; binding dropped", validator, field),
            )
            .with_context(format!("Field: {}", field)),
        );
    }

    /// Record a parent or nested reference to a schema missing from the catalog
    pub fn unknown_schema(&mut self, schema_id: impl Into<SchemaId>, target: &str, via: &str) {
        self.push(
            DiagnosticItem::new(
                schema_id,
                DiagnosticCode::UnknownSchema,
                format!("Schema '{}' referenced by {} is not in the catalog", target, via),
            ),
        );
    }

    /// Record a cycle in the inheritance chain
    pub fn inheritance_cycle(&mut self, members: &[SchemaId]) {
        let first = members.first().cloned().unwrap_or_default();
        self.push(
            DiagnosticItem::new(
                first,
                DiagnosticCode::InheritanceCycle,
                "Inheritance chain loops back on itself",
            )
            .with_context(format!("Cycle: {}", members.join(" -> "))),
        );
    }

    /// Record a group of schemas that nest each other
    pub fn recursive_nesting(&mut self, members: &[SchemaId]) {
        let first = members.first().cloned().unwrap_or_default();
        self.push(
            DiagnosticItem::new(
                first,
                DiagnosticCode::RecursiveNesting,
                "Schemas nest each other recursively",
            )
            .with_context(format!("Members: {}", members.join(", "))),
        );
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    /// Get all errors
    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items carrying the given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    /// Get all items
    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    /// Get total count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count errors
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Drop every item raised for one schema
    pub(crate) fn forget_schema(&mut self, schema_id: &str) {
        self.items.retain(|i| i.schema_id != schema_id);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl std::error::Error for Diagnostics {}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::InheritanceCycle.severity(), Severity::Error);
        assert_eq!(DiagnosticCode::UnknownRule.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::RecursiveNesting.severity(), Severity::Info);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.unknown_schema("Order", "Address", "field 'shipping'");
        diags.unknown_rule("Order", "total", "positive");
        diags.recursive_nesting(&["Node".to_string()]);

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.len(), 3);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_forget_schema() {
        let mut diags = Diagnostics::new();
        diags.unknown_rule("Order", "total", "positive");
        diags.unknown_rule("User", "name", "shouty");
        diags.forget_schema("Order");

        assert_eq!(diags.len(), 1);
        assert_eq!(diags.all()[0].schema_id, "User");
    }
}
