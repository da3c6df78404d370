//! Operator control channel (line commands on stdin).
//!
//! | command | effect |
//! |---|---|
//! | `shutdown`, `stop`, `quit`, `exit` | start draining |
//! | `who`, `users` | log online identities |
//! | `rooms` | log rooms and member counts |
//! | `help` | log the command list |
//!
//! EOF closes the channel without shutting the server down, so the server can
//! run detached from a terminal.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::server::ServerHandle;

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Shutdown,
    Who,
    Rooms,
    Help,
    Unknown(String),
}

impl OperatorCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim();
        if word.is_empty() {
            return None;
        }
        let command = match word.to_ascii_lowercase().as_str() {
            "shutdown" | "stop" | "quit" | "exit" => OperatorCommand::Shutdown,
            "who" | "users" => OperatorCommand::Who,
            "rooms" => OperatorCommand::Rooms,
            "help" | "?" => OperatorCommand::Help,
            _ => OperatorCommand::Unknown(word.to_string()),
        };
        Some(command)
    }
}

const HELP: &str = "commands: shutdown|stop|quit|exit, who|users, rooms, help";

/// Read commands until a shutdown command (returns `true`) or EOF (returns `false`).
pub async fn operator_loop<R>(reader: R, handle: ServerHandle) -> bool
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("Operator input closed; use Ctrl+C or SIGTERM to stop");
                return false;
            }
            Err(e) => {
                tracing::warn!("Operator input error: {}", e);
                return false;
            }
        };

        match OperatorCommand::parse(&line) {
            None => {}
            Some(OperatorCommand::Shutdown) => {
                tracing::info!("Shutdown requested by operator");
                return true;
            }
            Some(OperatorCommand::Who) => {
                let participants = handle.participants().await;
                let names: Vec<&str> = participants.iter().map(|p| p.identity.as_str()).collect();
                tracing::info!("{} online: {}", names.len(), names.join(", "));
            }
            Some(OperatorCommand::Rooms) => {
                let rooms = handle.rooms().await;
                if rooms.is_empty() {
                    tracing::info!("No rooms");
                }
                for room in rooms {
                    tracing::info!("room '{}': {} member(s)", room.name, room.members.len());
                }
            }
            Some(OperatorCommand::Help) => tracing::info!("{}", HELP),
            Some(OperatorCommand::Unknown(word)) => {
                tracing::warn!("Unknown command '{}' ({})", word, HELP);
            }
        }
    }
}

/// Operator loop on stdin; never resolves unless a shutdown command is read.
pub async fn stdin_shutdown(handle: ServerHandle) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    if !operator_loop(stdin, handle).await {
        std::future::pending::<()>().await;
    }
}
