//! Schema Validate CLI
//!
//! Prints synthesized plans and validates JSON instances against a catalog.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use familiar_validation::{Engine, SchemaCatalog, ValidationSettings, ValidatorRegistry};
use futures_util::FutureExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-validate")]
#[command(about = "Compile schema catalogs into validation plans and check instances")]
struct Cli {
    /// Config file (defaults to validation.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the synthesized plan for one schema or all of them
    Plan {
        /// Catalog file (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Only this schema
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Validate an instance and print the report
    Check {
        /// Catalog file (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Schema to validate against
        #[arg(short, long)]
        schema: String,
        /// Instance file (JSON)
        #[arg(short, long)]
        instance: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when an instance had violations
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let settings = ValidationSettings::load_from(config_path.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Plan { catalog, schema } => {
            let engine = load_engine(&catalog, &settings)?;

            match schema {
                Some(id) => {
                    let Some(plan) = engine.plan(&id) else {
                        bail!("schema '{}' is not in the catalog", id);
                    };
                    print!("{}", plan.describe());
                }
                None => {
                    for plan in engine.plans().iter() {
                        println!("{}", plan.describe());
                    }
                }
            }

            if !engine.diagnostics().is_empty() {
                eprint!("{}", engine.diagnostics());
            }
            Ok(true)
        }

        Commands::Check {
            catalog,
            schema,
            instance,
        } => {
            let engine = load_engine(&catalog, &settings)?;
            let content = std::fs::read_to_string(&instance)
                .with_context(|| format!("reading {}", instance.display()))?;
            let instance: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", instance.display()))?;

            // Catalog-loaded schemas carry no awaitable hooks, so every plan
            // finishes on its first poll.
            let Some(result) = engine.validate(&schema, &instance).now_or_never() else {
                bail!("validation of '{}' suspended; it needs an async host", schema);
            };
            let result = result?;

            let report = result.report();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.success)
        }
    }
}

fn load_engine(catalog: &Path, settings: &ValidationSettings) -> anyhow::Result<Engine> {
    let catalog = SchemaCatalog::from_json_file(catalog)
        .with_context(|| format!("loading catalog {}", catalog.display()))?;

    Engine::build(catalog, ValidatorRegistry::with_builtins(), settings).map_err(|diagnostics| {
        anyhow::anyhow!("catalog has errors:\n{}", diagnostics.format_all())
    })
}
