//! sqlshare CLI - load SQLite databases from anywhere, inspect them and share them

use clap::{Parser, Subcommand};
use sqlshare::config::{self, CredentialSource};
use sqlshare::fetch::Fetcher;
use sqlshare::ui::{self, Icons, Spinner};
use sqlshare::{ProviderRouter, SaveOutcome, Session, SessionManager, SourceDescriptor, SourceKind};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";

#[derive(Parser)]
#[command(name = "sqlshare")]
#[command(version)]
#[command(about = "Load SQLite databases from files, URLs, scripts or saved ids and share them")]
#[command(long_about = r#"
A SOURCE is any of:
  • a local path          ./data/users.db, seed.sql
  • a URL                 https://example.org/chinook.db
  • a saved id            gist:4f1c2a..., kv:12
  • "-"                   database image or SQL script on stdin

Example usage:
  sqlshare tables ./users.db
  sqlshare query ./users.db --sql "select count(*) from users"
  sqlshare save seed.sql --sql "select * from users"
  sqlshare dump gist:4f1c2a -o copy.sql
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables and their row counts
    Tables {
        /// Where to load the database from
        source: String,
    },

    /// Run SQL against a loaded database
    Query {
        /// Where to load the database from
        source: String,

        /// Statements to run; the last result set is printed
        #[arg(short, long)]
        sql: String,
    },

    /// Print the database as a portable SQL script
    Dump {
        /// Where to load the database from
        source: String,

        /// Write the script to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Save the database and a query to the active storage provider
    Save {
        /// Where to load the database from
        source: String,

        /// Query stored next to the database
        #[arg(short, long)]
        sql: Option<String>,

        /// Name of the saved copy
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Write a config template
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    let result = match cli.command {
        Commands::Init { force } => run_init(&config_path, force),
        command => run_command(command, config_path).await,
    };

    if let Err(e) = result {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(command: Commands, config_path: PathBuf) -> anyhow::Result<()> {
    let router = ProviderRouter::with_default_providers(CredentialSource::File(config_path.clone()))?;
    let manager = SessionManager::new(Fetcher::new(), router);

    match command {
        Commands::Tables { source } => run_tables(&manager, &source).await,
        Commands::Query { source, sql } => run_query(&manager, &source, &sql).await,
        Commands::Dump { source, output } => run_dump(&manager, &source, output.as_deref()).await,
        Commands::Save { source, sql, name } => {
            run_save(&manager, &source, sql.as_deref(), name.as_deref()).await
        }
        Commands::Init { force } => run_init(&config_path, force),
    }
}

/// Classify a command line source; `-` reads stdin
fn source_from_arg(arg: &str) -> anyhow::Result<SourceDescriptor> {
    if arg != "-" {
        return Ok(SourceDescriptor::text(arg));
    }

    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input)?;
    let is_image = input.starts_with(SQLITE_HEADER);
    let source = SourceDescriptor::bytes(input);
    Ok(if is_image { source } else { source.with_kind(SourceKind::Sql) })
}

async fn open(manager: &SessionManager, arg: &str, name: &str) -> anyhow::Result<Session> {
    let source = source_from_arg(arg)?;
    let spinner = Spinner::new(&format!("Loading {}", source));
    let session = manager.open_source(name, source).await;
    spinner.finish();
    Ok(session?)
}

async fn run_tables(manager: &SessionManager, arg: &str) -> anyhow::Result<()> {
    let mut session = open(manager, arg, "").await?;
    ui::header(Icons::DATABASE, session.name());

    let names = session.tables()?.to_vec();
    if names.is_empty() {
        ui::empty("No tables");
        return Ok(());
    }

    let mut counts = Vec::with_capacity(names.len());
    for name in names {
        let rows = session.database().count_rows(&name)?;
        counts.push((name, rows));
    }
    println!("{}", ui::tables_table(&counts));
    Ok(())
}

async fn run_query(manager: &SessionManager, arg: &str, sql: &str) -> anyhow::Result<()> {
    let mut session = open(manager, arg, "").await?;
    match session.execute(sql)? {
        Some(result) if !result.columns.is_empty() => {
            println!("{}", ui::result_table(&result));
            ui::summary_row("rows", &result.rows.len().to_string());
        }
        _ => ui::success("Statements executed"),
    }
    Ok(())
}

async fn run_dump(manager: &SessionManager, arg: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let session = open(manager, arg, "").await?;
    let script = session.dump()?;

    match output {
        Some(path) => {
            std::fs::write(path, &script)?;
            ui::status(Icons::SCRIPT, "Dump written to", &path.display().to_string());
        }
        None if script.is_empty() => ui::empty("Database has no tables"),
        None => println!("{}", script),
    }
    Ok(())
}

async fn run_save(
    manager: &SessionManager,
    arg: &str,
    sql: Option<&str>,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let mut session = open(manager, arg, name.unwrap_or_default()).await?;
    let query = sql.map(str::to_string).unwrap_or_else(|| session.query().to_string());

    let spinner = Spinner::new(&format!("Saving {}", session.name()));
    let outcome = manager.save(&mut session, &query).await;
    spinner.finish();

    match outcome? {
        SaveOutcome::Nothing => {
            ui::warn("Nothing to save: no tables and no query");
            return Ok(());
        }
        SaveOutcome::Skipped => ui::status(Icons::SKIP, "Unchanged", session.name()),
        SaveOutcome::Created => ui::success(&format!("Saved {}", session.name())),
        SaveOutcome::Updated => ui::success(&format!("Updated {}", session.name())),
    }

    ui::status(Icons::SAVE, "Reference", &session.source().to_shareable_reference());
    if let Some(owner) = session.owner() {
        ui::status(Icons::PERSON, "Owner", owner);
    }
    if let Some(url) = session.share_url(manager.router())? {
        ui::status(Icons::LINK, "URL", &url);
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    config::write_config(path, &config::template_config(), force)?;
    ui::success(&format!("Config written to {}", path.display()));
    ui::info(
        "Credentials",
        &format!(
            "fill in [github] or set {} and {}",
            config::GITHUB_USER_ENV,
            config::GITHUB_TOKEN_ENV
        ),
    );
    println!("{}", ui::dim("Without GitHub credentials, saves go to the [kv] store."));
    Ok(())
}
