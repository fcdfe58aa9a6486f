//! Validation Engine
//!
//! Owns a catalog, the synthesized plan for every schema in it, and the
//! message pool results draw from. Plans are frozen after [`Engine::build`]
//! and only change through [`Engine::refresh`].

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ValidationSettings;
use crate::dependency::{NoServices, ServiceResolver};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, ValidationError};
use crate::graph::{self, SchemaGraph};
use crate::plan::exec::{self, Validation};
use crate::plan::synth::Synthesizer;
use crate::plan::{PlanSet, ValidationPlan};
use crate::policy::AutoValidatorPolicy;
use crate::result::MessagePool;
use crate::schema::{SchemaCatalog, SchemaDescriptor};
use crate::validators::ValidatorRegistry;

// =============================================================================
// Engine
// =============================================================================

pub struct Engine {
    catalog: SchemaCatalog,
    registry: ValidatorRegistry,
    policy: AutoValidatorPolicy,
    graph: SchemaGraph,
    plans: PlanSet,

    /// Graph findings for the current catalog
    analysis: Diagnostics,
    /// Synthesis findings, per schema
    synthesis: Diagnostics,
    /// Both of the above
    diagnostics: Diagnostics,

    pool: Arc<MessagePool>,
    max_depth: usize,
}

impl Engine {
    /// Analyze the catalog and synthesize a plan for every schema.
    ///
    /// Returns Err(Diagnostics) if any finding is an error.
    pub fn build(
        catalog: SchemaCatalog,
        registry: ValidatorRegistry,
        settings: &ValidationSettings,
    ) -> std::result::Result<Self, Diagnostics> {
        let policy = AutoValidatorPolicy::new(settings.auto.clone());
        let analysis = graph::analyze(&catalog);
        if analysis.diagnostics.has_errors() {
            return Err(analysis.diagnostics);
        }

        let mut synthesis = Diagnostics::new();
        let mut plans = PlanSet::new();
        {
            let synthesizer = Synthesizer::new(&registry, &policy);
            for id in &analysis.order {
                if let Some(schema) = catalog.get(id) {
                    plans.insert(synthesizer.synthesize(schema, &mut synthesis));
                }
            }
        }

        let mut diagnostics = analysis.diagnostics.clone();
        diagnostics.merge(synthesis.clone());
        if diagnostics.has_errors() {
            return Err(diagnostics);
        }

        info!(
            "Built validation engine: {} plans, {} warnings",
            plans.len(),
            diagnostics.warning_count()
        );

        Ok(Self {
            catalog,
            registry,
            policy,
            graph: analysis.graph,
            plans,
            analysis: analysis.diagnostics,
            synthesis,
            diagnostics,
            pool: MessagePool::shared(settings.pool.max_idle),
            max_depth: settings.execution.max_depth,
        })
    }

    /// Engine with the built-in validators and default settings
    pub fn with_defaults(catalog: SchemaCatalog) -> std::result::Result<Self, Diagnostics> {
        Self::build(catalog, ValidatorRegistry::with_builtins(), &ValidationSettings::default())
    }

    /// Replace a schema, re-synthesizing its plan only if its checksum changed.
    ///
    /// Returns `Ok(false)` when the plan was already current. On error the
    /// engine is left untouched.
    pub fn refresh(&mut self, schema: SchemaDescriptor) -> std::result::Result<bool, Diagnostics> {
        if let Some(plan) = self.plans.get(&schema.id) {
            if plan.checksum == schema.checksum() {
                debug!("Plan for {} is current ({})", schema.id, plan.checksum.short());
                return Ok(false);
            }
        }

        let mut catalog = self.catalog.clone();
        catalog.insert(schema.clone());
        let analysis = graph::analyze(&catalog);
        if analysis.diagnostics.has_errors() {
            return Err(analysis.diagnostics);
        }

        let mut found = Diagnostics::new();
        let plan = Synthesizer::new(&self.registry, &self.policy).synthesize(&schema, &mut found);
        if found.has_errors() {
            return Err(found);
        }

        info!("Re-synthesized plan for {} ({})", schema.id, plan.checksum.short());
        self.synthesis.forget_schema(&schema.id);
        self.synthesis.merge(found);
        self.analysis = analysis.diagnostics;
        self.diagnostics = self.analysis.clone();
        self.diagnostics.merge(self.synthesis.clone());
        self.graph = analysis.graph;
        self.catalog = catalog;
        self.plans.insert(plan);
        Ok(true)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate an instance with no services available
    pub fn validate<'a>(&'a self, schema: &str, instance: &'a Value) -> Validation<'a> {
        self.validate_with(schema, instance, &NoServices)
    }

    /// Validate an instance, resolving services through `resolver`
    pub fn validate_with<'a>(
        &'a self,
        schema: &str,
        instance: &'a Value,
        resolver: &'a dyn ServiceResolver,
    ) -> Validation<'a> {
        let Some(plan) = self.plans.get(schema) else {
            return Validation::failed(schema.to_string(), ValidationError::UnknownSchema(schema.to_string()));
        };
        let future = exec::run(&self.plans, plan, instance, resolver, Arc::clone(&self.pool), self.max_depth);
        Validation::start(plan.schema.clone(), plan.mode, future)
    }

    /// Validate an instance the call takes ownership of
    pub fn validate_owned<'a>(
        &'a self,
        schema: &str,
        instance: Value,
        resolver: &'a dyn ServiceResolver,
    ) -> Validation<'a> {
        let Some(plan) = self.plans.get(schema) else {
            return Validation::failed(schema.to_string(), ValidationError::UnknownSchema(schema.to_string()));
        };
        let plans = &self.plans;
        let pool = Arc::clone(&self.pool);
        let max_depth = self.max_depth;
        let future = Box::pin(async move {
            let instance = instance;
            exec::run(plans, plan, &instance, resolver, pool, max_depth).await
        });
        Validation::start(plan.schema.clone(), plan.mode, future)
    }

    /// Validate a typed value through its JSON form
    pub fn validate_serialize<T: Serialize>(&self, schema: &str, value: &T) -> Result<Validation<'_>> {
        let instance = serde_json::to_value(value)?;
        Ok(self.validate_owned(schema, instance, &NoServices))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn plan(&self, schema: &str) -> Option<&Arc<ValidationPlan>> {
        self.plans.get(schema)
    }

    pub fn plans(&self) -> &PlanSet {
        &self.plans
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Warnings and infos kept from the last build or refresh
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn pool(&self) -> &Arc<MessagePool> {
        &self.pool
    }
}
