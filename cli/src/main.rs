//! chatline terminal client.
//!
//! Drives the `client` crate controller against a live server: an
//! interactive `chat` mode plus one-shot subcommands for scripting.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use client::net::socket::{self, SocketClient};
use client::view::{FeedEntry, clock_hhmm};
use client::{ChatApi, ChatController, ClientError, ServerEvent, SessionStore};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatline", about = "chatline terminal chat client")]
struct Cli {
    /// WebSocket endpoint of the chat server.
    #[arg(long, env = "CHAT_URL", default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// File holding the current user's identifier between runs.
    #[arg(long, env = "CHAT_SESSION_FILE", default_value = ".chat_user")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session: lines are chat messages, `/` lines are commands.
    Chat,
    /// Send one message and exit.
    Send { text: String },
    /// Print recent messages, oldest first.
    History {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Print the online user list.
    Users,
}

// =============================================================================
// SESSION FILE
// =============================================================================

/// File-backed session identity — the cookie analog for a terminal host.
struct FileSession {
    path: PathBuf,
}

impl SessionStore for FileSession {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn store(&mut self, user_id: &str) {
        // Best-effort, like a cookie write: losing it only costs a fresh guest.
        if let Err(e) = std::fs::write(&self.path, user_id) {
            eprintln!("warning: could not persist session file: {e}");
        }
    }
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (api, events) = socket::connect(&cli.url).await?;
    let store = FileSession { path: cli.session_file };

    match cli.command {
        Command::Chat => chat(api, events, store).await,
        Command::Send { text } => send(api, store, &text).await,
        Command::History { limit } => history(&api, limit).await,
        Command::Users => users(&api).await,
    }
}

// =============================================================================
// SUBCOMMANDS
// =============================================================================

async fn chat(
    api: SocketClient,
    mut events: tokio::sync::mpsc::Receiver<ServerEvent>,
    store: FileSession,
) -> Result<(), CliError> {
    let mut controller = ChatController::new(api, store);
    controller.start().await?;

    println!("{}", controller.view.title);
    let mut printed = 0;
    flush_feed(&controller, &mut printed);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        controller.submit(&line).await;
                        flush_feed(&controller, &mut printed);
                    }
                    // EOF: the user is done.
                    None => break,
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    println!("* connection closed");
                    break;
                };
                controller.apply_event(event);
                flush_feed(&controller, &mut printed);
            }
        }
    }

    controller.leave().await;
    Ok(())
}

async fn send(api: SocketClient, store: FileSession, text: &str) -> Result<(), CliError> {
    let mut controller = ChatController::new(api, store);
    controller.resolve_user().await?;
    controller.submit(text).await;

    // Successful sends render nothing locally (the feed fills from events);
    // anything in the feed here is an error announcement.
    let mut printed = 0;
    flush_feed(&controller, &mut printed);
    if printed == 0 {
        println!("sent");
    }

    controller.leave().await;
    Ok(())
}

async fn history(api: &SocketClient, limit: i64) -> Result<(), CliError> {
    let mut messages = api.find_messages(limit).await?;
    messages.reverse();
    for msg in &messages {
        println!("[{}] {}: {}", clock_hhmm(msg.created_at), msg.user_name, msg.text);
    }
    Ok(())
}

async fn users(api: &SocketClient) -> Result<(), CliError> {
    let online = api.find_users(Some(true), 200).await?;
    for user in &online {
        println!("{} (#{})", user.name, user.color);
    }
    Ok(())
}

// =============================================================================
// RENDERING
// =============================================================================

/// Print feed entries added since the last flush.
fn flush_feed<A: ChatApi, S: SessionStore>(controller: &ChatController<A, S>, printed: &mut usize) {
    let feed = &controller.view.feed;
    // `/clear-system` can shrink the feed; scrollback stays as it was.
    if feed.len() < *printed {
        *printed = feed.len();
        return;
    }
    for entry in &feed[*printed..] {
        match entry {
            FeedEntry::Message(msg) => {
                let marker = if msg.own { " (you)" } else { "" };
                println!("[{}] {}{}: {}", clock_hhmm(msg.created_at), msg.user_name, marker, msg.text);
            }
            FeedEntry::System(text) => println!("* {text}"),
        }
    }
    *printed = feed.len();
}
