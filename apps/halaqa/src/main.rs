//! Halaqa command-line entry point.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use halaqa::cli::{
    self, CliResult, ListArgs, cmd_badge, cmd_import, cmd_init, cmd_list, cmd_metric, cmd_toggle,
};
use halaqa::halaqa_core::{EntityId, RequestContext};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "halaqa")]
#[command(about = "Filtered listings and derived metrics for the Halaqa admin panel", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file
    #[arg(long, global = true, default_value = "halaqa.redb")]
    db: PathBuf,

    /// Resource profiles (JSON array)
    #[arg(long, global = true, value_name = "FILE")]
    profiles: Option<PathBuf>,

    /// Evaluate as of this RFC 3339 instant instead of the current time
    #[arg(long, global = true, value_name = "INSTANT")]
    now: Option<DateTime<Utc>>,

    /// Acting user id
    #[arg(long, global = true)]
    user: Option<u64>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Import a JSON dataset ({"entities": [...]})
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List one page of an entity kind
    List {
        kind: String,

        /// Filter as key=value (repeatable)
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Sort key: field or -field (descending); may name a metric
        #[arg(short, long)]
        sort: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(long)]
        per_page: Option<usize>,

        /// Derived metric to compute per row (repeatable)
        #[arg(short, long = "metric")]
        metrics: Vec<String>,

        /// Stored field shown in text output (repeatable)
        #[arg(short, long = "column")]
        columns: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Evaluate one derived metric for one entity
    Metric {
        kind: String,
        id: u64,
        name: String,

        #[arg(long)]
        json: bool,
    },

    /// Count entities for a navigation badge
    Badge {
        kind: String,

        /// Filter as key=value (repeatable); defaults to the profile's badge filter
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Flip a boolean field
    Toggle {
        id: u64,
        field: String,

        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> CliResult<Option<String>> {
    let mut ctx = cli
        .now
        .map(RequestContext::at)
        .unwrap_or_else(RequestContext::current);
    if let Some(user) = cli.user {
        ctx = ctx.with_user(EntityId(user));
    }

    match cli.command {
        Commands::Init { force } => {
            cmd_init(&cli.db, force)?;
            Ok(None)
        }
        Commands::Import { file } => {
            let count = cmd_import(&cli.db, &file)?;
            Ok(Some(format!("imported {count} entities")))
        }
        Commands::List {
            kind,
            filters,
            sort,
            page,
            per_page,
            metrics,
            columns,
            json,
        } => {
            let profiles = cli::load_profiles(cli.profiles.as_deref())?;
            let args = ListArgs {
                kind,
                filters,
                sort,
                page,
                per_page,
                metrics,
                columns,
                json,
            };
            cmd_list(&cli.db, &profiles, &args, &ctx).map(Some)
        }
        Commands::Metric {
            kind,
            id,
            name,
            json,
        } => {
            let profiles = cli::load_profiles(cli.profiles.as_deref())?;
            cmd_metric(&cli.db, &profiles, &kind, id, &name, json, &ctx).map(Some)
        }
        Commands::Badge {
            kind,
            filters,
            json,
        } => {
            let profiles = cli::load_profiles(cli.profiles.as_deref())?;
            cmd_badge(&cli.db, &profiles, &kind, &filters, json, &ctx).map(Some)
        }
        Commands::Toggle { id, field, json } => {
            cmd_toggle(&cli.db, id, &field, json, &ctx).map(Some)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(Some(output)) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
