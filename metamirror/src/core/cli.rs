use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{ENV_BACKEND, ENV_CONFIG, ENV_DATABASE_URL, ENV_PREFIX, SUPPORTED_OBJECT_TYPE};
use crate::data::sql::Backend;
use crate::domain::meta_query::OrderKey;

#[derive(Parser)]
#[command(name = "metamirror")]
#[command(version, about = "JSON metadata mirror and meta query compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Mirror database backend (mysql or sqlite)
    #[arg(long, global = true, env = ENV_BACKEND, value_parser = parse_backend)]
    pub backend: Option<Backend>,

    /// Database connection URL
    #[arg(long, global = true, env = ENV_DATABASE_URL)]
    pub database_url: Option<String>,

    /// Table name prefix
    #[arg(long, global = true, env = ENV_PREFIX)]
    pub prefix: Option<String>,
}

/// Parse backend from CLI/env string
fn parse_backend(s: &str) -> Result<Backend, String> {
    s.parse()
}

/// Parse a `KEY[:DIR]` sort key
fn parse_order_key(s: &str) -> Result<OrderKey, String> {
    s.parse()
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create the mirror table and triggers, then backfill it
    Install,
    /// Rebuild mirror documents and purge orphaned rows
    Repair,
    /// Drop the triggers, leaving the mirror table in place
    Deactivate,
    /// Drop the triggers and the mirror table
    Uninstall,
    /// Compile a filter tree and print the generated SQL as JSON
    Compile(CompileArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CompileArgs {
    /// Filter tree as JSON, or @path to read it from a file
    #[arg(long, short)]
    pub filter: String,

    /// Object type the filter applies to
    #[arg(long, default_value = SUPPORTED_OBJECT_TYPE)]
    pub object_type: String,

    /// Host ORDER BY clause to rewrite
    #[arg(long)]
    pub orderby: Option<String>,

    /// Additional host JOIN text preceding the compiled JOIN
    #[arg(long, default_value = "")]
    pub join: String,

    /// Sort key with optional direction (e.g. meta_value_num:desc), repeatable
    #[arg(long = "sort", value_parser = parse_order_key)]
    pub sort: Vec<OrderKey>,

    /// Skip acceleration, as a host query with suppressed filters would
    #[arg(long)]
    pub suppress_filters: bool,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub database_url: Option<String>,
    pub prefix: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        backend: cli.backend,
        database_url: cli.database_url,
        prefix: cli.prefix,
    };
    (config, cli.command)
}
