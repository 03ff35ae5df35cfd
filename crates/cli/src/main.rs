//! `catalog` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    : start the API server, over workflow sources or snapshots.
//! - `migrate`  : run pending database migrations.
//! - `validate` : validate a single workflow source file.
//! - `serialize`: write snapshots for every loadable workflow.
//! - `tasks`    : print formatted tasks of one workflow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::source::{load_directory, load_file, LoadReport};
use engine::{
    CatalogConfig, CatalogMode, DbSnapshotStore, OperatorDefaults, QueryService, SerializationCache,
    WorkflowCatalog,
};
use operators::OperatorRegistry;

#[derive(Parser)]
#[command(name = "catalog", about = "Workflow task catalog service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Directory of workflow JSON sources. Ignored in serialized mode.
        #[arg(long, env = "CATALOG_WORKFLOWS_DIR")]
        workflows_dir: Option<PathBuf>,
        /// Prefer serialized snapshots over in-memory definitions.
        #[arg(long)]
        store_serialized: bool,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow source file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Write a snapshot of every workflow found in a directory.
    Serialize {
        #[arg(long, env = "CATALOG_WORKFLOWS_DIR")]
        workflows_dir: PathBuf,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Print the formatted tasks of a workflow.
    Tasks {
        #[arg(long, env = "CATALOG_WORKFLOWS_DIR")]
        workflows_dir: PathBuf,
        workflow_id: String,
        /// Print only this task.
        task_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let registry = Arc::new(OperatorRegistry::with_builtins());
    let defaults = OperatorDefaults::from_env().context("invalid operator defaults")?;

    match cli.command {
        Command::Serve {
            bind,
            workflows_dir,
            store_serialized,
            database_url,
        } => {
            let mut config = CatalogConfig::from_env().context("invalid catalog configuration")?;
            if store_serialized {
                config.mode = CatalogMode::SerializedPreferred;
            }

            let pool = match database_url {
                Some(url) => Some(connect(&url).await?),
                None => None,
            };

            let catalog = build_catalog(
                config,
                pool.clone(),
                workflows_dir.as_deref(),
                &registry,
                &defaults,
            )
            .await?;

            info!("Starting API server on {bind} ({:?} mode)", catalog.mode());
            let state = api::AppState::new(Arc::new(catalog));
            api::serve(&bind, state).await.context("server failed")?;

            if let Some(pool) = pool {
                pool.close().await;
            }
        }
        Command::Migrate { database_url } => {
            info!("Running migrations against {database_url}");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            pool.close().await;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => match load_file(&path, &registry, &defaults) {
            Ok(definition) => {
                println!(
                    "✅ Workflow '{}' is valid. Topological order: {:?}",
                    definition.workflow_id(),
                    definition.topological_order()
                );
            }
            Err(e) => {
                eprintln!("❌ Validation failed: {e}");
                std::process::exit(1);
            }
        },
        Command::Serialize {
            workflows_dir,
            database_url,
        } => {
            let pool = connect(&database_url).await?;
            let cache = SerializationCache::new(
                Arc::new(DbSnapshotStore::new(pool.clone())),
                Arc::clone(&registry),
            );

            let report = load_sources(&workflows_dir, &registry, &defaults)?;
            let as_of = Utc::now();
            for definition in &report.workflows {
                let outcome = cache
                    .put(definition, as_of)
                    .await
                    .with_context(|| format!("cannot snapshot '{}'", definition.workflow_id()))?;
                println!("{}: {:?}", definition.workflow_id(), outcome);
            }
            pool.close().await;
        }
        Command::Tasks {
            workflows_dir,
            workflow_id,
            task_id,
        } => {
            let catalog = WorkflowCatalog::new(CatalogConfig::default());
            for definition in load_sources(&workflows_dir, &registry, &defaults)?.workflows {
                catalog.register(definition).await;
            }
            let query = QueryService::new(Arc::new(catalog));

            let output = match task_id {
                Some(task_id) => serde_json::to_string_pretty(&query.get_task(&workflow_id, &task_id).await?)?,
                None => serde_json::to_string_pretty(&query.list_tasks(&workflow_id).await?)?,
            };
            println!("{output}");
        }
    }

    Ok(())
}

/// Assemble the catalog `serve` answers from.
///
/// Direct mode registers every source under `workflows_dir`. Serialized mode
/// starts empty and resolves workflows from the snapshot store on demand.
async fn build_catalog(
    config: CatalogConfig,
    pool: Option<db::DbPool>,
    workflows_dir: Option<&Path>,
    registry: &Arc<OperatorRegistry>,
    defaults: &OperatorDefaults,
) -> anyhow::Result<WorkflowCatalog> {
    let serialized = config.mode == CatalogMode::SerializedPreferred;
    if serialized && pool.is_none() {
        bail!("serialized mode needs --database-url (or DATABASE_URL)");
    }

    let mut catalog = WorkflowCatalog::new(config);
    if let Some(pool) = pool {
        let store = Arc::new(DbSnapshotStore::new(pool));
        catalog = catalog.with_cache(SerializationCache::new(store, Arc::clone(registry)));
    }

    if serialized {
        if let Some(dir) = workflows_dir {
            info!("serialized mode: not loading sources from {}", dir.display());
        }
        return Ok(catalog);
    }

    let Some(dir) = workflows_dir else {
        bail!("direct mode needs --workflows-dir (or CATALOG_WORKFLOWS_DIR)");
    };
    for definition in load_sources(dir, registry, defaults)?.workflows {
        catalog.register(definition).await;
    }
    Ok(catalog)
}

/// Open the snapshot database and bring its schema up to date.
async fn connect(database_url: &str) -> anyhow::Result<db::DbPool> {
    let pool = db::pool::create_pool(database_url, 10)
        .await
        .with_context(|| format!("failed to connect to {database_url}"))?;
    db::pool::run_migrations(&pool).await.context("migration failed")?;
    Ok(pool)
}

fn load_sources(
    dir: &Path,
    registry: &OperatorRegistry,
    defaults: &OperatorDefaults,
) -> anyhow::Result<LoadReport> {
    let report = load_directory(dir, registry, defaults)
        .with_context(|| format!("cannot load workflows from {}", dir.display()))?;
    for (path, reason) in &report.import_errors {
        warn!("import error in {}: {}", path.display(), reason);
    }
    Ok(report)
}
