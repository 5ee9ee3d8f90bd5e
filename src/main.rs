use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use raidtail::replay::replay_file;
use raidtail::{list_sessions, Config, FaultSink, GameState, LogSetSupervisor};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raidtail")]
#[command(about = "Follow the game client's logs and report matchmaking, raid and map state")]
struct Cli {
    /// Config file (default: ~/.config/raidtail/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the newest session and print the state on every change (default)
    Watch {
        /// Directory containing the log_* session folders
        #[arg(long)]
        logs_root: Option<PathBuf>,
        /// Poll interval in seconds
        #[arg(long)]
        poll_secs: Option<u64>,
        /// Ignore lines already in the files at startup
        #[arg(long)]
        tail: bool,
        /// Print states as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay a single log file and print what was recognised
    Parse {
        file: PathBuf,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// List session folders, newest last
    Sessions {
        #[arg(long)]
        logs_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = load_config(cli.config.as_deref());

    match cli.command {
        None => watch(config, false).await,
        Some(Commands::Watch {
            logs_root,
            poll_secs,
            tail,
            json,
        }) => {
            let mut config = config;
            if logs_root.is_some() {
                config.logs_root = logs_root;
            }
            if poll_secs.is_some() {
                config.poll_interval_secs = poll_secs;
            }
            if tail {
                config.replay_on_start = Some(false);
            }
            watch(config, json).await
        }
        Some(Commands::Parse { file, json }) => parse(&file, json),
        Some(Commands::Sessions { logs_root }) => {
            let root = logs_root.or_else(|| config.logs_root()).context(NO_ROOT)?;
            sessions(&root)
        }
    }
}

const NO_ROOT: &str = "No logs root configured: pass --logs-root or set logs_root in the config file";

/// An unreadable config file is reported and replaced by defaults.
fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: {e:#} (using defaults)");
        Config::default()
    })
}

async fn watch(config: Config, json: bool) -> Result<()> {
    let Some(tail_config) = config.tail_config() else {
        bail!(NO_ROOT);
    };

    println!("Watching {}", tail_config.logs_root.display());
    println!("Press Ctrl+C to stop.");

    let (faults, mut fault_rx) = FaultSink::channel();
    let handle = LogSetSupervisor::start(tail_config, faults);
    let mut changes = handle.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = changes.changed() => {
                if !changed {
                    break;
                }
                print_state(&handle.state().snapshot(), json)?;
            }
            Some(fault) = fault_rx.recv() => {
                eprintln!("[{}] {}", fault.context, fault.error);
            }
        }
    }

    println!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

fn parse(file: &Path, json: bool) -> Result<()> {
    let report =
        replay_file(file).with_context(|| format!("Failed to replay {}", file.display()))?;

    if json {
        return print_state(&report.state, true);
    }

    for (rule, event) in &report.events {
        println!("{rule:<22} {event:?}");
    }
    println!(
        "\n{} lines, {} events",
        report.lines_read,
        report.events.len()
    );
    print_state(&report.state, false)
}

fn sessions(root: &Path) -> Result<()> {
    let sessions = list_sessions(root)?;
    if sessions.is_empty() {
        println!("No sessions under {}", root.display());
        return Ok(());
    }

    let newest = sessions.len() - 1;
    for (i, session) in sessions.iter().enumerate() {
        let marker = if i == newest { "*" } else { " " };
        let kinds = session
            .log_files()
            .map(|files| {
                files
                    .iter()
                    .map(|(kind, _)| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|e| format!("unreadable: {e}"));
        println!(
            "{marker} {}  {}  [{kinds}]",
            session.created.format("%Y-%m-%d %H:%M:%S"),
            session.name()
        );
    }
    Ok(())
}

fn print_state(state: &GameState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
    } else {
        println!("{state}");
    }
    Ok(())
}
