use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use taiga_bridge_core::{
    BridgeConfig, EntityKind, Facade, HttpTransport, ListFilter, LookupKind, ProjectSelector,
    SprintFilter,
};

mod serve;
mod tools;

/// Taiga Bridge - address a Taiga project by refs, usernames and names
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// API root, e.g. https://api.taiga.io/api/v1
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Bearer token
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Project id or slug
    #[arg(short, long, value_name = "PROJECT")]
    project: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List epics, stories, tasks, issues or sprints
    List {
        /// epics | stories | tasks | issues | sprints
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,

        /// Filter as JSON, e.g. '{"status": "New", "assigned_to": "alice"}'
        #[arg(short, long, value_name = "JSON")]
        filter: Option<String>,
    },

    /// Show one item by ref
    Get {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        reference: i64,
    },

    /// Show the comments of an item
    Comments {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        reference: i64,
    },

    /// Add a comment to an item
    Comment {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        reference: i64,
        text: String,
    },

    /// Valid values of a lookup collection (story_status, severity, role, ...)
    Lookups {
        #[arg(value_parser = parse_lookup)]
        kind: LookupKind,
    },

    /// Show the active project
    Project,

    /// Serve the tool surface over stdin/stdout
    Serve,
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    tools::kind_from_name(s).ok_or_else(|| format!("unknown entity kind {:?}", s))
}

fn parse_lookup(s: &str) -> Result<LookupKind, String> {
    tools::lookup_from_name(s).ok_or_else(|| format!("unknown lookup kind {:?}", s))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries command output and tool responses
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `.env` is loaded by the caller; file, then environment, then flags
fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    config = config.from_env()?;
    if let Some(url) = &cli.url {
        config = config.with_base_url(url.as_str());
    }
    if let Some(token) = &cli.token {
        config = config.with_auth_token(token.as_str());
    }
    if let Some(project) = &cli.project {
        config = config.with_project(project.as_str());
    }
    config.validate()?;
    Ok(config)
}

async fn connect(config: &BridgeConfig) -> anyhow::Result<Facade> {
    let selector: &ProjectSelector = config.project.as_ref().context(
        "no project selected; pass --project or set TAIGA_BRIDGE_PROJECT",
    )?;
    let transport = Arc::new(HttpTransport::new(config)?);
    Ok(Facade::connect(transport, selector).await?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("loading .env");
        }
    }
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let facade = connect(&config).await?;

    match cli.command {
        Commands::List { kind, filter } => {
            if kind == EntityKind::Sprint {
                let filter: SprintFilter = match filter {
                    Some(json) => serde_json::from_str(&json).context("parsing --filter")?,
                    None => SprintFilter::default(),
                };
                print_json(&facade.list_sprints(&filter).await?)?;
            } else {
                let filter: ListFilter = match filter {
                    Some(json) => serde_json::from_str(&json).context("parsing --filter")?,
                    None => ListFilter::default(),
                };
                print_json(&facade.list(kind, &filter).await?)?;
            }
        }
        Commands::Get { kind, reference } => {
            if kind == EntityKind::Sprint {
                print_json(&facade.get_sprint(&reference.into()).await?)?;
            } else {
                print_json(&facade.get(kind, reference).await?)?;
            }
        }
        Commands::Comments { kind, reference } => {
            print_json(&facade.list_comments(kind, reference).await?)?;
        }
        Commands::Comment {
            kind,
            reference,
            text,
        } => {
            print_json(&facade.add_comment(kind, reference, &text).await?)?;
        }
        Commands::Lookups { kind } => {
            print_json(&facade.list_lookup(kind).await?)?;
        }
        Commands::Project => {
            print_json(facade.project())?;
        }
        Commands::Serve => {
            serve::run_server(tools::ToolBox::new(facade)).await?;
        }
    }

    Ok(())
}
