//! Noteboard CLI
//!
//! Command-line client for a shared noteboard backend: list and mutate
//! notes and connections over REST, or tail live board events from the
//! event channel.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use noteboard_core::{
    BoardApi, BoardStore, ChannelConfig, ChannelSignal, Config, ConnectionDraft, EventChannel,
    EventKind, NoteDraft, NotePatch, SyncController,
};

mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "noteboard")]
#[command(about = "Noteboard - shared canvas notes from the command line")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage connections between notes
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// Tail live board events from the event channel
    Watch,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show configuration and backend reachability
    Status,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (api_url, socket_url)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// List all notes
    #[command(alias = "ls")]
    List,
    /// Create a new note
    #[command(alias = "add")]
    Create {
        /// Note title
        title: String,
        /// Note content
        #[arg(short, long)]
        content: Option<String>,
        /// Canvas x coordinate
        #[arg(short, long)]
        x: Option<f64>,
        /// Canvas y coordinate
        #[arg(short, long)]
        y: Option<f64>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Edit a note
    Edit {
        /// Note ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New content
        #[arg(long)]
        content: Option<String>,
    },
    /// Toggle a note's pinned flag
    Pin {
        /// Note ID
        id: String,
    },
    /// Delete a note (and every connection that references it)
    #[command(alias = "rm")]
    Delete {
        /// Note ID
        id: String,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Connect two notes
    #[command(alias = "add")]
    Create {
        /// Source note ID
        source: String,
        /// Target note ID
        target: String,
        /// Arrow label
        #[arg(short, long)]
        label: Option<String>,
    },
    /// List all connections
    #[command(alias = "ls")]
    List,
    /// Delete a connection
    #[command(alias = "rm")]
    Delete {
        /// Connection ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Note { command } => handle_note_command(command, &config, &output).await,
        Commands::Link { command } => handle_link_command(command, &config, &output).await,
        Commands::Watch => watch(&config, &output).await,
        Commands::Config { command } => handle_config_command(command, config, &output),
        Commands::Status => status(&config, &output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config: Config,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => {
            output.print_config(&config);
            Ok(())
        }
        Some(ConfigCommands::Set { key, value }) => {
            let mut config = config;
            set_config_value(&mut config, &key, &value)?;
            config.save().context("Failed to save configuration")?;
            output.success(&format!("Set {} = {}", key, value));
            Ok(())
        }
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "api_url" => config.api_url = value.to_string(),
        "socket_url" => config.socket_url = value.to_string(),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: api_url, socket_url",
                key
            );
        }
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<BoardStore> {
    let api = Arc::new(BoardApi::new(&config.api_url).context("Failed to build API client")?);
    Ok(BoardStore::new(api))
}

async fn handle_note_command(command: NoteCommands, config: &Config, output: &Output) -> Result<()> {
    let mut store = open_store(config)?;

    match command {
        NoteCommands::List => {
            store.fetch_notes().await?;
            output.print_notes(store.notes());
        }
        NoteCommands::Create {
            title,
            content,
            x,
            y,
            tag,
        } => {
            let mut draft = NoteDraft::new(title);
            if let Some(content) = content {
                draft.content = content;
            }
            if let (Some(x), Some(y)) = (x, y) {
                draft = draft.at(x, y);
            }
            draft.tags = tag;

            let note = store.add_note(&draft).await?;
            output.print_note(&note);
        }
        NoteCommands::Edit { id, title, content } => {
            store.fetch_notes().await?;
            let Some(existing) = store.notes().iter().find(|n| n.id == id) else {
                bail!("No note with id '{}'", id);
            };

            // Start from the existing note so the normalized body keeps
            // every unchanged field
            let mut patch = NotePatch::from_note(existing);
            if title.is_some() {
                patch.title = title;
            }
            if content.is_some() {
                patch.content = content;
            }

            let note = store.update_note(&id, patch).await?;
            output.print_note(&note);
        }
        NoteCommands::Pin { id } => {
            let note = store.toggle_pin(&id).await?;
            output.print_note(&note);
        }
        NoteCommands::Delete { id } => {
            store.delete_note(&id).await?;
            output.message(&format!("Deleted note {}", id));
        }
    }

    Ok(())
}

async fn handle_link_command(command: LinkCommands, config: &Config, output: &Output) -> Result<()> {
    let mut store = open_store(config)?;

    match command {
        LinkCommands::Create {
            source,
            target,
            label,
        } => {
            let mut draft = ConnectionDraft::new(source, target);
            if let Some(label) = label {
                draft.label = label;
            }
            let conn = store.add_connection(&draft).await?;
            output.print_connection(&conn);
        }
        LinkCommands::List => {
            store.fetch_connections().await?;
            output.print_connections(store.connections());
        }
        LinkCommands::Delete { id } => {
            store.delete_connection(&id).await?;
            output.message(&format!("Deleted connection {}", id));
        }
    }

    Ok(())
}

/// Load the board, then stream every remote change until interrupted
async fn watch(config: &Config, output: &Output) -> Result<()> {
    let store = Arc::new(Mutex::new(open_store(config)?));
    let channel = Arc::new(EventChannel::spawn(ChannelConfig::new(&config.socket_url)));

    // Print events as they arrive, alongside the controller's apply path
    let format = output.format;
    for kind in EventKind::ALL {
        channel.subscribe(kind, move |event| {
            Output::new(format).print_event(event);
        });
    }

    let mut signals = channel
        .take_signals()
        .context("Channel signals already taken")?;

    let controller = SyncController::start(Arc::clone(&store), Arc::clone(&channel))
        .await
        .context("Initial board load failed")?;

    {
        let guard = store.lock().await;
        output.message(&format!(
            "Watching board ({} notes, {} connections). Ctrl-C to stop.",
            guard.notes().len(),
            guard.connections().len()
        ));
    }

    channel.connect().await;

    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    Some(ChannelSignal::Connected) => output.message("Channel connected."),
                    Some(ChannelSignal::Reconnected { attempt }) => {
                        output.message(&format!("Channel reconnected after {} attempts.", attempt));
                    }
                    Some(ChannelSignal::Disconnected(reason)) => {
                        output.message(&format!("Channel disconnected: {}", reason));
                    }
                    Some(ChannelSignal::ReconnectFailed) => {
                        eprintln!("Could not reach the event channel; run again to retry.");
                        break;
                    }
                    Some(ChannelSignal::Error(e)) => {
                        output.message(&format!("Channel error: {}", e));
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                output.message("Stopping.");
                break;
            }
        }
    }

    controller.stop();
    channel.shutdown().await;
    Ok(())
}

/// Show the configured endpoints and whether the backend answers
async fn status(config: &Config, output: &Output) -> Result<()> {
    output.message(&format!("API endpoint:    {}", config.api_url));
    output.message(&format!("Socket endpoint: {}", config.socket_url));

    let api = BoardApi::new(&config.api_url)?;
    match api.fetch_notes().await {
        Ok(notes) => {
            output.message(&format!("Backend reachable ({} notes).", notes.len()));
            Ok(())
        }
        Err(e) => {
            if !output.is_quiet() {
                eprintln!("Backend unreachable: {}", e);
            }
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_set_parses() {
        let cli =
            Cli::try_parse_from(["noteboard", "config", "set", "api_url", "http://x/api"]).unwrap();
        match cli.command {
            Commands::Config {
                command: Some(ConfigCommands::Set { key, value }),
            } => {
                assert_eq!(key, "api_url");
                assert_eq!(value, "http://x/api");
            }
            _ => panic!("expected config set"),
        }
    }

    #[test]
    fn test_bare_config_defaults_to_show() {
        let cli = Cli::try_parse_from(["noteboard", "config"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { command: None }
        ));
    }

    #[test]
    fn test_set_config_value() {
        let mut config = Config::default();
        set_config_value(&mut config, "api_url", "http://board/api").unwrap();
        assert_eq!(config.api_url, "http://board/api");
        set_config_value(&mut config, "socket_url", "ws://board/events").unwrap();
        assert_eq!(config.socket_url, "ws://board/events");
    }

    #[test]
    fn test_set_config_value_rejects_unknown_key() {
        let mut config = Config::default();
        let err = set_config_value(&mut config, "sync_url", "ws://x").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }
}
