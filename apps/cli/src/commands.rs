//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use codestep_core::PageSettings;
use codestep_shared::{
    AppConfig, BackendVariant, FrontendVariant, init_config, load_config, resolve_environment,
};
use codestep_storage::Storage;
use codestep_web::AppState;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Codestep: serve step-by-step coding tutorials.
#[derive(Parser)]
#[command(
    name = "codestep",
    version,
    about = "Serve multi-step coding tutorials and their instruction endpoints.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (overrides `[database] path`).
    #[arg(long, global = true, env = "CODESTEP_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP server.
    Serve {
        /// Socket address to bind (overrides `[server] bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Project provisioning.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Purchase records.
    Purchase {
        #[command(subcommand)]
        action: PurchaseAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ProjectAction {
    /// Create a project.
    Add {
        /// Project title.
        title: String,
    },
    /// Add a technology variant to a project.
    AddVariant {
        /// Project id.
        #[arg(long)]
        project: String,

        #[arg(long, default_value = "NextJS")]
        frontend: FrontendVariant,

        #[arg(long, default_value = "Supabase")]
        backend: BackendVariant,

        /// User id of the variant's author.
        #[arg(long)]
        author: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum PurchaseAction {
    /// Record that a user purchased a project.
    Grant {
        #[arg(long)]
        user: String,

        #[arg(long)]
        project: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "codestep=info",
        1 => "codestep=debug",
        _ => "codestep=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Serve { bind } => cmd_serve(bind, db).await,
        Command::Project { action } => match action {
            ProjectAction::Add { title } => cmd_project_add(db, &title).await,
            ProjectAction::AddVariant {
                project,
                frontend,
                backend,
                author,
            } => cmd_project_add_variant(db, &project, frontend, backend, &author).await,
        },
        Command::Purchase { action } => match action {
            PurchaseAction::Grant { user, project } => {
                cmd_purchase_grant(db, &user, &project).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn database_path(config: &AppConfig, db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| PathBuf::from(&config.database.path))
}

async fn open_storage(config: &AppConfig, db: Option<PathBuf>) -> Result<Storage> {
    let path = database_path(config, db);
    info!(path = %path.display(), "opening database");
    Ok(Storage::open(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let page = PageSettings::from(&config);
    info!(
        environment = ?resolve_environment(&config),
        frontend = %page.frontend_variant,
        backend = %page.backend_variant,
        "serving tutorial variant"
    );

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = codestep_web::bind(&bind).await?;
    codestep_web::serve(listener, AppState::new(storage, page)).await?;
    Ok(())
}

async fn cmd_project_add(db: Option<PathBuf>, title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(eyre!("project title must not be empty"));
    }
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let project = storage.insert_project(title).await?;
    println!("{}", serde_json::to_string_pretty(&project)?);
    Ok(())
}

async fn cmd_project_add_variant(
    db: Option<PathBuf>,
    project: &str,
    frontend: FrontendVariant,
    backend: BackendVariant,
    author: &str,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    if storage.get_project(project).await?.is_none() {
        return Err(eyre!("project '{project}' does not exist"));
    }
    let variant = storage
        .insert_project_variant(project, frontend, backend, author)
        .await?;
    println!("{}", serde_json::to_string_pretty(&variant)?);
    Ok(())
}

async fn cmd_purchase_grant(db: Option<PathBuf>, user: &str, project: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    if storage.get_project(project).await?.is_none() {
        return Err(eyre!("project '{project}' does not exist"));
    }
    let purchase = storage.insert_purchased_project(user, project).await?;
    println!("{}", serde_json::to_string_pretty(&purchase)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
