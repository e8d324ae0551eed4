//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use retro_core::store::{FileBlobStore, RoomStore};
use retro_core::{config, interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "retro")]
#[command(version)]
#[command(about = "Retro chat rooms in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Identifies whose rooms a command works on.
#[derive(clap::Args, Debug, Clone)]
struct UserArgs {
    /// User name (rooms are kept per user)
    #[arg(short, long, env = "RETRO_USER")]
    user: String,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Render Markdown to HTML
    Render {
        /// File to read (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Wrap the output in a standalone HTML page
        #[arg(long)]
        document: bool,

        /// Page title used with --document
        #[arg(long, default_value = "Retro Chat")]
        title: String,
    },

    /// Chat with an agent in a room
    Chat {
        #[command(flatten)]
        user: UserArgs,

        /// Room to open (created if missing; default: the last room)
        #[arg(short, long)]
        room: Option<String>,

        /// Agent to talk to
        #[arg(short, long)]
        agent: Option<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,

        /// Backend bucket to also save each exchange to
        #[arg(long, value_name = "BUCKET")]
        save_to: Option<String>,

        /// Keep rooms in memory only; nothing is written to disk
        #[arg(long)]
        ephemeral: bool,
    },

    /// Manage chat rooms
    Rooms {
        #[command(subcommand)]
        command: RoomCommands,
    },

    /// List agents offered by the backend
    Agents,

    /// Check that the backend is up
    Health,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum RoomCommands {
    /// Lists rooms, marking the current one
    List {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Creates a room and makes it current
    Create {
        #[command(flatten)]
        user: UserArgs,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Makes an existing room current
    Enter {
        #[command(flatten)]
        user: UserArgs,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Deletes a room here and on the backend
    Delete {
        #[command(flatten)]
        user: UserArgs,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Renames a room
    Rename {
        #[command(flatten)]
        user: UserArgs,
        #[arg(value_name = "FROM")]
        from: String,
        #[arg(value_name = "TO")]
        to: String,
    },
    /// Prints a room's history
    Show {
        #[command(flatten)]
        user: UserArgs,
        /// Room to show (default: the current room)
        #[arg(value_name = "NAME")]
        name: Option<String>,
        /// Print messages as JSON
        #[arg(long)]
        json: bool,
    },
    /// Exports a room's history as an HTML page
    Export {
        #[command(flatten)]
        user: UserArgs,
        /// Room to export (default: the current room)
        #[arg(value_name = "NAME")]
        name: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the default model
    SetModel {
        #[arg(value_name = "MODEL")]
        model: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logging is best effort; a read-only home must not stop the client.
    let _log_guard = logging::init(&config::paths::logs_dir()).ok();

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

fn open_store(config: &config::Config) -> RoomStore {
    RoomStore::new(FileBlobStore::new(config.effective_data_dir()))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    match cli.command {
        Commands::Render {
            file,
            document,
            title,
        } => commands::render::run(file.as_deref(), document.then_some(title.as_str())),

        Commands::Chat {
            user,
            room,
            agent,
            model,
            save_to,
            ephemeral,
        } => {
            let store = if ephemeral {
                RoomStore::in_memory()
            } else {
                open_store(&config)
            };
            commands::chat::run(
                commands::chat::ChatRunOptions {
                    user: &user.user,
                    room: room.as_deref(),
                    agent: agent.as_deref(),
                    model: model.as_deref(),
                    save_to: save_to.as_deref(),
                },
                store,
                &config,
            )
            .await
        }

        Commands::Rooms { command } => {
            let store = open_store(&config);
            match command {
                RoomCommands::List { user } => commands::rooms::list(&store, &user.user),
                RoomCommands::Create { user, name } => {
                    commands::rooms::create(&store, &user.user, &name)
                }
                RoomCommands::Enter { user, name } => {
                    commands::rooms::enter(&store, &user.user, &name)
                }
                RoomCommands::Delete { user, name } => {
                    commands::rooms::delete(store, &config, &user.user, &name).await
                }
                RoomCommands::Rename { user, from, to } => {
                    commands::rooms::rename(store, &config, &user.user, &from, &to).await
                }
                RoomCommands::Show { user, name, json } => {
                    commands::rooms::show(&store, &user.user, name.as_deref(), json)
                }
                RoomCommands::Export { user, name, output } => commands::rooms::export(
                    &store,
                    &user.user,
                    name.as_deref(),
                    output.as_deref(),
                ),
            }
        }

        Commands::Agents => commands::backend::agents(&config).await,
        Commands::Health => commands::backend::health(&config).await,

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetModel { model } => commands::config::set_model(&model),
        },
    }
}
