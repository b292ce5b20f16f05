//! Clinotes CLI - offline-first notes about clients.

mod backend;

use anyhow::{bail, Context, Result};
use backend::Remote;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use clinotes_core::{
    Advisory, ConnectivityMonitor, Engine, LoadSource, LocalMirror, LocalReason, Outcome,
    Workspace, WritePath,
};
use clinotes_files::FileStore;
use clinotes_rest::{RestConfig, RestRemote};
use clinotes_sqlite::SqliteRemote;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CLINOTES_DIR: &str = ".clinotes";

#[derive(Parser)]
#[command(name = "clinotes", about = "Offline-first notes about clients", version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

/// Where data lives and how to reach the remote store.
#[derive(Args)]
struct Config {
    /// Local data directory (defaults to the nearest .clinotes directory)
    #[arg(long, env = "CLINOTES_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Remote REST endpoint, e.g. https://abc.supabase.co
    #[arg(long, env = "CLINOTES_REMOTE_URL", global = true)]
    remote_url: Option<String>,

    /// API key for the remote REST endpoint
    #[arg(long, env = "CLINOTES_REMOTE_KEY", global = true, hide_env_values = true)]
    remote_key: Option<String>,

    /// Use a SQLite database as the remote store instead of a REST endpoint
    #[arg(long, env = "CLINOTES_REMOTE_DB", global = true, conflicts_with = "remote_url")]
    remote_db: Option<PathBuf>,

    /// Treat the remote store as unreachable
    #[arg(long, env = "CLINOTES_OFFLINE", global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new clinotes data directory in the current directory
    Init {
        /// Delete existing data and reinitialize
        #[arg(long)]
        reinitialize: bool,
    },
    /// List clients
    Clients {
        /// Only show clients whose name contains this text
        search: Option<String>,
    },
    /// Add a new client
    AddClient {
        /// Client name
        name: String,
    },
    /// Show a client's notes, newest first
    Notes {
        /// Client ID
        client: i64,
        /// Print full note contents instead of one-line previews
        #[arg(long)]
        full: bool,
    },
    /// Add a note to a client
    AddNote {
        /// Client ID
        client: i64,
        /// Note content (reads from stdin if not provided)
        #[arg(long)]
        content: Option<String>,
    },
    /// Replace the content of a note
    EditNote {
        /// Client ID
        client: i64,
        /// Note ID
        note: i64,
        /// New content (reads from stdin if not provided and stdin is not a tty)
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete one or more notes
    RmNote {
        /// Client ID
        client: i64,
        /// Comma-separated note IDs
        notes: String,
    },
    /// Reload everything from the remote store, replacing local data
    Sync,
    /// Write notes to a text file
    Export {
        /// Only export this client
        #[arg(long)]
        client: Option<i64>,
        /// Directory to write the file into
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
    },
    /// Show remote, connectivity and data status
    Status,
}

type App = Workspace<Remote, FileStore>;

/// Find the .clinotes directory by searching up from current directory
fn find_clinotes_dir() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        let candidate = current.join(CLINOTES_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Get the data directory path, or error if not initialized
fn get_data_dir(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }
    match find_clinotes_dir() {
        Some(dir) => Ok(dir),
        None => bail!("No .clinotes directory found. Run 'clinotes init' to initialize."),
    }
}

/// Build the remote store from configuration. `None` means local-only.
fn connect_remote(config: &Config) -> Result<Option<Remote>> {
    if let Some(path) = &config.remote_db {
        let db = SqliteRemote::open(path)
            .with_context(|| format!("Failed to open remote database {}", path.display()))?;
        return Ok(Some(Remote::Sqlite(db)));
    }

    match (&config.remote_url, &config.remote_key) {
        (Some(url), Some(key)) => {
            let remote = RestRemote::new(RestConfig::new(url, key))
                .context("Failed to configure remote store")?;
            Ok(Some(Remote::Rest(remote)))
        }
        (None, None) => Ok(None),
        _ => {
            tracing::warn!("remote url and key must both be set; working locally");
            Ok(None)
        }
    }
}

async fn open_app(config: &Config) -> Result<App> {
    let data_dir = get_data_dir(config)?;
    let store = FileStore::open(&data_dir).context("Failed to open local data")?;
    let remote = connect_remote(config)?;
    let connectivity = ConnectivityMonitor::new(!config.offline);

    let engine = Engine::new(remote, LocalMirror::new(store), connectivity);
    Ok(Workspace::open(engine).await)
}

fn print_advisory(advisory: Option<&Advisory>) {
    if let Some(advisory) = advisory {
        let label = if advisory.is_error() { "warning" } else { "note" };
        eprintln!("{}: {}", label, advisory);
    }
}

fn parse_ids(ids: &str) -> Result<Vec<i64>> {
    ids.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().context(format!("Invalid note ID: {}", s)))
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Suffix marking records that were not confirmed by the remote store.
fn local_marker<T>(outcome: &Outcome<T>) -> &'static str {
    match outcome {
        Outcome::LocalOnly { .. } => " (local only)",
        _ => "",
    }
}

/// Client names are free text; keep them from turning into paths.
fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

fn describe_path(path: WritePath) -> &'static str {
    match path {
        WritePath::Remote => "remote",
        WritePath::LocalOnly(LocalReason::Offline) => "local only (offline)",
        WritePath::LocalOnly(LocalReason::Unconfigured) => "local only (no remote configured)",
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn init(reinitialize: bool, data_dir: Option<&Path>) -> Result<()> {
    let dir = data_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CLINOTES_DIR));

    if dir.exists() {
        if reinitialize {
            std::fs::remove_dir_all(&dir).context("Failed to remove existing data directory")?;
        } else if dir.join("store").exists() {
            bail!("clinotes is already initialized here. Use --reinitialize to delete and recreate.");
        }
    }

    FileStore::open(&dir).context("Failed to create data directory")?;

    if reinitialize {
        println!("Reinitialized clinotes in {}", dir.display());
    } else {
        println!("Initialized clinotes in {}", dir.display());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if let Commands::Init { reinitialize } = cli.command {
        return init(reinitialize, cli.config.data_dir.as_deref());
    }

    let mut app = open_app(&cli.config).await?;
    print_advisory(app.advisory());
    app.dismiss_advisory();

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Clients { search } => {
            let clients = app.clients(search.as_deref().unwrap_or(""));
            if clients.is_empty() {
                if search.is_some() {
                    println!("No matches found");
                } else {
                    println!("No clients yet");
                }
            }
            for client in clients {
                let noun = if client.notes.len() == 1 { "note" } else { "notes" };
                println!(
                    "{}: {} ({} {}, since {})",
                    client.id,
                    client.name,
                    client.notes.len(),
                    noun,
                    client.created_at
                );
            }
        }

        Commands::AddClient { name } => {
            let outcome = app.add_client(&name).await?;
            match outcome.record() {
                Some(client) => println!(
                    "Added client {}: {}{}",
                    client.id,
                    client.name,
                    local_marker(&outcome)
                ),
                None => {
                    eprintln!("Nothing to add: client name is empty");
                    std::process::exit(1);
                }
            }
        }

        Commands::Notes { client: client_id, full } => {
            let Some(client) = app.client(client_id) else {
                bail!("Client {} not found", client_id);
            };
            println!("# {} ({} notes)\n", client.name, client.notes.len());
            for (i, note) in client.notes.iter().enumerate() {
                if full {
                    if i > 0 {
                        println!("\n{}\n", "-".repeat(30));
                    }
                    println!("Note {} - created {}", note.id, note.created_at);
                    if let Some(modified) = &note.last_modified {
                        println!("Last modified: {}", modified);
                    }
                    println!("\n{}", note.content);
                } else {
                    println!("{}: {} ({})", note.id, note.preview(100), note.created_at);
                }
            }
        }

        Commands::AddNote { client, content } => {
            let content = match content {
                Some(c) => c,
                None => read_stdin()?,
            };
            let outcome = app.add_note(client, &content).await?;
            match outcome.record() {
                Some(note) => println!(
                    "Added note {} to client {}{}",
                    note.id,
                    client,
                    local_marker(&outcome)
                ),
                None => {
                    eprintln!("Nothing to add: note is empty");
                    std::process::exit(1);
                }
            }
        }

        Commands::EditNote {
            client,
            note,
            content,
        } => {
            let content = match content {
                Some(c) => c,
                None if !is_stdin_tty() => read_stdin()?,
                None => bail!("No content given. Pass --content or pipe it on stdin."),
            };
            let outcome = app.edit_note(client, note, &content).await?;
            if outcome.record().is_some() {
                println!("Edited note {}{}", note, local_marker(&outcome));
            } else {
                eprintln!("Nothing to update: note content is empty");
                std::process::exit(1);
            }
        }

        Commands::RmNote { client, notes } => {
            let ids = parse_ids(&notes)?;
            if ids.is_empty() {
                eprintln!("No note IDs provided");
                std::process::exit(1);
            }

            let mut failed = false;
            for id in ids {
                let outcome = app.remove_note(client, id).await?;
                match &outcome {
                    Outcome::Rejected(advisory) => {
                        eprintln!("Note {} not deleted: {}", id, advisory);
                        failed = true;
                    }
                    _ => println!("Deleted note {}{}", id, local_marker(&outcome)),
                }
            }
            if failed {
                std::process::exit(1);
            }
        }

        Commands::Sync => {
            let report = app.sync().await?;
            if report.replaced {
                println!(
                    "Synced {} clients and {} notes from remote",
                    app.store().clients().len(),
                    app.store().total_notes()
                );
                for id in &report.discarded_clients {
                    eprintln!("Dropped local-only client {}", id);
                }
                for id in &report.discarded_notes {
                    eprintln!("Dropped local-only note {}", id);
                }
            }
        }

        Commands::Export { client, output } => {
            let now = Local::now();
            let export = match client {
                Some(id) => app.export_client(id, &now)?,
                None => app.export_all(&now),
            };
            let path = output.join(safe_file_name(&export.file_name));
            std::fs::write(&path, &export.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }

        Commands::Status => {
            let status = app.status();
            let remote = if status.configured { "configured" } else { "not configured" };
            let loaded = match app.loaded_from() {
                LoadSource::Remote => "remote",
                LoadSource::Mirror => "local backup",
                LoadSource::Empty => "nothing (empty)",
            };
            println!("Remote: {}", remote);
            println!("Connectivity: {}", if status.online { "online" } else { "offline" });
            println!("Writes go to: {}", describe_path(status.path));
            println!("Loaded from: {}", loaded);
            println!(
                "Clients: {}, notes: {}",
                app.store().clients().len(),
                app.store().total_notes()
            );
        }
    }

    print_advisory(app.advisory());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("3, 5,,8").unwrap(), vec![3, 5, 8]);
        assert!(parse_ids("3,x").is_err());
        assert!(parse_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Acme_notes.txt"), "Acme_notes.txt");
        assert_eq!(safe_file_name("A/B\\C_notes.txt"), "A_B_C_notes.txt");
    }

    #[test]
    fn test_remote_db_conflicts_with_url() {
        let parsed = Cli::try_parse_from([
            "clinotes",
            "--remote-db",
            "r.sqlite",
            "--remote-url",
            "https://x",
            "status",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_partial_rest_config_is_local_only() {
        let cli = Cli::try_parse_from(["clinotes", "--remote-url", "https://x", "status"]).unwrap();
        assert!(connect_remote(&cli.config).unwrap().is_none());
    }
}
