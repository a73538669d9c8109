use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rubber_duck::config::EnvConfig;
use rubber_duck::orchestrator::{Orchestrator, OrchestratorOptions, SessionEvent};
use rubber_duck::registry::SessionRegistry;
use rubber_duck::render::render_event;
use rubber_duck::source::{resolve_path, SourceFile};
use rubber_duck::{console, logging, providers};
use session_store::SessionStore;
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(name = "rubber_duck", version, about = "Walk a source file line by line with a rubber duck")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start or resume a session on FILE.
    Review {
        file: PathBuf,
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// List logs of sessions that have not been archived.
    List {
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Archive the session log for FILE.
    Archive {
        file: PathBuf,
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Delete archived logs older than RUBBER_DUCK_ARCHIVE_RETENTION_DAYS.
    Prune {
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let config = EnvConfig::from_env().map_err(io::Error::other)?;
    logging::init(&config.log_filter);

    match cli.command {
        Command::Review { file, workspace } => review(&config, &file, workspace),
        Command::List { workspace } => list(workspace),
        Command::Archive { file, workspace } => archive(&file, workspace),
        Command::Prune { workspace } => prune(&config, workspace),
    }
}

fn review(config: &EnvConfig, file: &Path, workspace: Option<PathBuf>) -> io::Result<()> {
    let store = open_store(workspace)?;
    let file = resolve_path(&std::env::current_dir()?, file);
    let source = SourceFile::load(&file)
        .map_err(|error| io::Error::new(error.kind(), format!("{}: {error}", file.display())))?;
    let provider = providers::provider_from_config(config).map_err(io::Error::other)?;
    let registry = SessionRegistry::new();
    let options = OrchestratorOptions {
        query_timeout: config.query_timeout,
        context_lines: config.context_lines,
    };

    let stdout = io::stdout();
    let mut emit = |event: SessionEvent| {
        let _ = writeln!(stdout.lock(), "{}", render_event(&event));
    };
    let mut orchestrator = Orchestrator::start(store, provider, &registry, source, options, &mut emit)
        .map_err(io::Error::other)?;

    console::run(
        &mut orchestrator,
        io::stdin().lock(),
        &mut stdout.lock(),
        &mut io::stderr(),
    )
}

fn list(workspace: Option<PathBuf>) -> io::Result<()> {
    let store = open_store(workspace)?;
    let sessions = store.list_active_sessions().map_err(io::Error::other)?;
    if sessions.is_empty() {
        println!("No active sessions in {}.", store.root().display());
        return Ok(());
    }

    for session in sessions {
        let modified = OffsetDateTime::from(session.modified);
        println!(
            "{}\t{} entries\tmodified {}",
            session.file_name,
            session.entry_count,
            modified.date()
        );
    }
    Ok(())
}

fn archive(file: &Path, workspace: Option<PathBuf>) -> io::Result<()> {
    let store = open_store(workspace)?;
    let file = resolve_path(&std::env::current_dir()?, file);
    match store.archive_session(&file).map_err(io::Error::other)? {
        Some(path) => println!("Archived to {}.", path.display()),
        None => println!("No active session for {}.", file.display()),
    }
    Ok(())
}

fn prune(config: &EnvConfig, workspace: Option<PathBuf>) -> io::Result<()> {
    let Some(max_age) = config.archive_retention else {
        println!("RUBBER_DUCK_ARCHIVE_RETENTION_DAYS is not set; archived sessions are kept.");
        return Ok(());
    };

    let store = open_store(workspace)?;
    let removed = store.prune_archives(max_age).map_err(io::Error::other)?;
    for path in &removed {
        println!("Removed {}", path.display());
    }
    println!("Pruned {} archived sessions.", removed.len());
    Ok(())
}

/// Both the workspace and reviewed files are resolved against the current
/// directory, so log names do not depend on where the command is run.
fn open_store(workspace: Option<PathBuf>) -> io::Result<SessionStore> {
    let cwd = std::env::current_dir()?;
    let root = match workspace {
        Some(root) => resolve_path(&cwd, &root),
        None => cwd,
    };
    Ok(SessionStore::new(root))
}
