//! Core application

use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::cli::{self, CompileArgs, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::data::MirrorService;
use crate::domain::hooks::{MetaSqlRequest, QueryClauses, QueryHooks};
use crate::domain::meta_query::{CompiledClauses, MetaSql, OrderSpec, parse_filter_tree};

pub struct CoreApp {
    pub config: AppConfig,
}

/// Output of the `compile` command
#[derive(Debug, Serialize)]
pub struct CompileOutput {
    pub accelerated: bool,
    pub join: String,
    #[serde(rename = "where")]
    pub where_clause: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    pub clauses: CompiledClauses,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self {
            config: AppConfig::load(&cli_config)?,
        };

        match command {
            Commands::Compile(args) => {
                let output = app.compile(&args)?;
                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(())
            }
            command => app.manage_mirror(command).await,
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // stdout carries command output
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn manage_mirror(&self, command: Commands) -> Result<()> {
        let service = MirrorService::init(&self.config)
            .await
            .context("Failed to connect to mirror database")?;
        let mirror = service.tables().mirror_table();

        let result = match command {
            Commands::Install => match service.install().await {
                Ok(true) => {
                    tracing::info!(mirror = %mirror, backend = %service.backend(), "Mirror installed");
                    Ok(())
                }
                Ok(false) => Err(anyhow::anyhow!(
                    "Failed to create mirror triggers for {}",
                    mirror
                )),
                Err(e) => Err(e.into()),
            },
            Commands::Repair => service
                .repair()
                .await
                .map(|_| tracing::info!(mirror = %mirror, "Mirror repaired"))
                .map_err(anyhow::Error::from),
            Commands::Deactivate => service
                .deactivate()
                .await
                .map(|_| tracing::info!(mirror = %mirror, "Mirror triggers dropped"))
                .map_err(anyhow::Error::from),
            Commands::Uninstall => service
                .uninstall()
                .await
                .map(|_| tracing::info!(mirror = %mirror, "Mirror removed"))
                .map_err(anyhow::Error::from),
            Commands::Compile(_) => Ok(()),
        };

        service.close().await;
        result
    }

    /// Compile a filter tree and optionally rewrite an ORDER BY clause
    pub fn compile(&self, args: &CompileArgs) -> Result<CompileOutput> {
        let filter_json = read_filter(&args.filter)?;
        let tree = parse_filter_tree(&filter_json).context("Invalid filter tree")?;

        let hooks = QueryHooks::from_config(&self.config);
        let primary_table = self.config.tables.primary_table_name();
        let request = MetaSqlRequest {
            object_type: &args.object_type,
            tree: &tree,
            primary_table: &primary_table,
            primary_id_column: &self.config.tables.primary_id_column,
            suppress_filters: args.suppress_filters,
        };
        let outcome = hooks.filter_meta_sql(MetaSql::default(), &request);
        let clauses = outcome.clauses().cloned().unwrap_or_default();

        let orderby = args.orderby.as_ref().map(|orderby| {
            let query = QueryClauses {
                join: format!("{}{}", args.join, outcome.sql().join),
                where_clause: outcome.sql().where_clause.clone(),
                orderby: orderby.clone(),
            };
            hooks
                .rewrite_query_clauses(query, &OrderSpec::new(args.sort.clone()), &clauses)
                .orderby
        });

        Ok(CompileOutput {
            accelerated: outcome.is_accelerated(),
            join: outcome.sql().join.clone(),
            where_clause: outcome.sql().where_clause.clone(),
            orderby,
            clauses,
        })
    }
}

/// Inline filter JSON, or the contents of the file named after `@`
fn read_filter(filter: &str) -> Result<String> {
    match filter.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file: {}", path)),
        None => Ok(filter.to_string()),
    }
}
