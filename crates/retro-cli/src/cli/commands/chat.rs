//! Interactive chat loop.
//!
//! Reads one line at a time from stdin. Plain lines are sent to the active
//! agent; lines starting with `/` are room and agent commands.

use std::io::Write;

use anyhow::{Context, Result};
use retro_core::api::{AgentClient, SAVE_BUCKETS};
use retro_core::chat::{ChatError, ChatSession, SessionOptions};
use retro_core::config::Config;
use retro_core::interrupt;
use retro_core::store::{Message, Role, RoomStore, StoreError};
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct ChatRunOptions<'a> {
    pub user: &'a str,
    pub room: Option<&'a str>,
    pub agent: Option<&'a str>,
    pub model: Option<&'a str>,
    pub save_to: Option<&'a str>,
}

/// Session options from config with command-line overrides applied.
pub fn session_options(
    config: &Config,
    model: Option<&str>,
    save_to: Option<&str>,
) -> SessionOptions {
    SessionOptions {
        default_agent: config.default_agent.clone(),
        model: model.map_or_else(|| config.model.clone(), str::to_string),
        save_to: save_to
            .or(config.effective_save_to())
            .map(str::to_string),
    }
}

/// A parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    Quit,
    Help,
    Rooms,
    Create(&'a str),
    Enter(&'a str),
    Delete(Option<&'a str>),
    Rename(&'a str),
    Agent(Option<&'a str>),
    Model(Option<&'a str>),
    Unknown(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line == ":q" {
        return Input::Quit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let optional = (!arg.is_empty()).then_some(arg);

    match name {
        "quit" | "q" => Input::Quit,
        "help" => Input::Help,
        "rooms" => Input::Rooms,
        "create" => Input::Create(arg),
        "enter" => Input::Enter(arg),
        "delete" => Input::Delete(optional),
        "rename" => Input::Rename(arg),
        "agent" => Input::Agent(optional),
        "model" => Input::Model(optional),
        _ => Input::Unknown(name),
    }
}

const HELP: &str = "\
Commands:
  /rooms            list rooms
  /create NAME      create a room and switch to it
  /enter NAME       switch to a room
  /delete [NAME]    delete a room (default: current)
  /rename NAME      rename the current room
  /agent [NAME]     list agents or pick one
  /model [NAME]     show or change the model
  /quit, :q         leave";

pub async fn run(options: ChatRunOptions<'_>, store: RoomStore, config: &Config) -> Result<()> {
    let session_opts = session_options(config, options.model, options.save_to);
    if let Some(bucket) = session_opts.save_to.as_deref()
        && !SAVE_BUCKETS.contains(&bucket)
    {
        anyhow::bail!(
            "Unknown save bucket {bucket}; expected one of: {}",
            SAVE_BUCKETS.join(", ")
        );
    }

    let client = AgentClient::from_config(config)?;
    let mut session = ChatSession::login(store, client, options.user, session_opts)?;

    if let Some(room) = options.room {
        open_room(&mut session, room)?;
    }

    if let Err(e) = session.refresh_agents().await {
        eprintln!("Could not load agents ({e}); using {}", session.active_agent());
    }
    if let Some(agent) = options.agent
        && !session.set_agent(agent)
    {
        eprintln!(
            "Unknown agent {agent}; available: {}",
            session.agents().join(", ")
        );
    }

    print_banner(&session);
    print_history(&session)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            () = interrupt::wait_for_interrupt() => {
                println!();
                return Err(interrupt::InterruptedError.into());
            }
        };
        let Some(line) = line else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Message(text) => send(&mut session, text).await,
            Input::Rooms => list_rooms(&session)?,
            Input::Create(name) => match session.create_room(name) {
                Ok(Some(_)) => switched(&session)?,
                Ok(None) => eprintln!("Room name must not be empty."),
                Err(ChatError::Store(e @ StoreError::RoomExists(_))) => {
                    eprintln!("{e}");
                    switched(&session)?;
                }
                Err(e) => report(&e),
            },
            Input::Enter(name) => match session.enter_room(name) {
                Ok(Some(_)) => switched(&session)?,
                Ok(None) => eprintln!("Room name must not be empty."),
                Err(e) => report(&e),
            },
            Input::Delete(name) => {
                let name = name.map_or_else(|| session.room().to_string(), str::to_string);
                match session.delete_room(&name).await {
                    Ok(_) => {
                        println!("Deleted room {name}.");
                        switched(&session)?;
                    }
                    Err(ChatError::Api(e)) => {
                        eprintln!("Room {name} was kept: {e}");
                    }
                    Err(e) => report(&e),
                }
            }
            Input::Rename(to) => {
                let from = session.room().to_string();
                match session.rename_room(&from, to).await {
                    Ok(Some(room)) => println!("Renamed {from} to {room}."),
                    Ok(None) => eprintln!("Room name must not be empty."),
                    Err(e) => report(&e),
                }
            }
            Input::Agent(None) => {
                for agent in session.agents() {
                    let marker = if agent == session.active_agent() { "*" } else { " " };
                    println!("{marker} {agent}");
                }
            }
            Input::Agent(Some(agent)) => {
                if session.set_agent(agent) {
                    println!("Talking to {agent}.");
                } else {
                    eprintln!(
                        "Unknown agent {agent}; available: {}",
                        session.agents().join(", ")
                    );
                }
            }
            Input::Model(None) => println!("{}", session.model()),
            Input::Model(Some(model)) => {
                session.set_model(model);
                println!("Model set to {}.", session.model());
            }
            Input::Unknown(name) => eprintln!("Unknown command /{name}. Type /help."),
        }
    }

    Ok(())
}

/// Opens `room`, creating it if it doesn't exist yet.
fn open_room(session: &mut ChatSession, room: &str) -> Result<()> {
    match session.enter_room(room) {
        Ok(_) => Ok(()),
        Err(ChatError::Store(StoreError::RoomNotFound(_))) => {
            session.create_room(room).context("create room")?;
            Ok(())
        }
        Err(e) => Err(e).context("open room"),
    }
}

async fn send(session: &mut ChatSession, text: &str) {
    interrupt::reset();
    let token = interrupt::cancellation_token();
    let result = session.send(text, Some(&token)).await;
    token.cancel();
    interrupt::reset();

    match result {
        Ok(replies) => {
            for reply in &replies {
                print_message(reply);
            }
        }
        Err(e) if e.is_cancelled() => eprintln!("Interrupted."),
        Err(e) => report(&e),
    }
}

fn report(e: &ChatError) {
    tracing::warn!(error = %e, "chat command failed");
    eprintln!("Error: {e}");
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("flush stdout")
}

fn print_banner(session: &ChatSession) {
    println!(
        "Room: {} · agent: {} · model: {}  (/help for commands)",
        session.room(),
        session.active_agent(),
        session.model()
    );
}

fn switched(session: &ChatSession) -> Result<()> {
    print_banner(session);
    print_history(session)
}

fn print_history(session: &ChatSession) -> Result<()> {
    for message in session.display_history()? {
        print_message(&message);
    }
    Ok(())
}

fn list_rooms(session: &ChatSession) -> Result<()> {
    for room in session.rooms()? {
        let marker = if room == session.room() { "*" } else { " " };
        println!("{marker} {room}");
    }
    Ok(())
}

fn print_message(message: &Message) {
    match message.role {
        Role::System => println!("-- {} --", message.text),
        Role::User | Role::Assistant => println!("{}", message.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_message() {
        assert_eq!(parse_input("  hello there "), Input::Message("hello there"));
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(parse_input(":q"), Input::Quit);
        assert_eq!(parse_input("/quit"), Input::Quit);
    }

    #[test]
    fn test_parse_commands_with_args() {
        assert_eq!(parse_input("/create  Study Group "), Input::Create("Study Group"));
        assert_eq!(parse_input("/enter Lab"), Input::Enter("Lab"));
        assert_eq!(parse_input("/delete"), Input::Delete(None));
        assert_eq!(parse_input("/delete Lab"), Input::Delete(Some("Lab")));
        assert_eq!(parse_input("/agent"), Input::Agent(None));
        assert_eq!(parse_input("/agent definer"), Input::Agent(Some("definer")));
        assert_eq!(parse_input("/create"), Input::Create(""));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(parse_input("/dance now"), Input::Unknown("dance"));
    }

    #[test]
    fn test_session_options_overrides() {
        let config = Config {
            save_to: Some("journal".to_string()),
            ..Config::default()
        };
        let options = session_options(&config, Some("gpt-4o"), None);
        assert_eq!(options.model, "gpt-4o");
        assert_eq!(options.save_to.as_deref(), Some("journal"));
        assert_eq!(options.default_agent, "yapper");

        let options = session_options(&config, None, Some("drafts"));
        assert_eq!(options.model, "gpt-4o-mini");
        assert_eq!(options.save_to.as_deref(), Some("drafts"));
    }
}
