//! Input line parsing.
//!
//! | input | effect |
//! |---|---|
//! | `text` | Chat to the focused room, or globally |
//! | `/join R` | join room R and focus it |
//! | `/leave R` | leave room R |
//! | `/room R` | focus room R without joining |
//! | `/global` | clear the focus |
//! | `/quit` | leave the chat and exit |
//! | `/help` | list commands |
//!
//! A leading `//` sends the rest of the line literally, starting with `/`.

use kchat_server::domain::{Envelope, Identity, NameError, RoomName, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Say(String),
    Join(RoomName),
    Leave(RoomName),
    Focus(RoomName),
    Global,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("usage: /{0} <room>")]
    MissingRoom(&'static str),

    #[error("invalid room name: {0}")]
    InvalidRoom(NameError),

    #[error("unknown command '/{0}' (try /help)")]
    Unknown(String),
}

pub const HELP: &str = "\
/join <room>   join a room and send to it
/leave <room>  leave a room
/room <room>   send to a room you have joined
/global        send to everyone
/quit          leave and exit
/help          show this list";

impl ClientCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if let Some(literal) = line.strip_prefix("//") {
            return Ok(Some(ClientCommand::Say(format!("/{literal}"))));
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(ClientCommand::Say(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "join" => ClientCommand::Join(room_arg("join", arg)?),
            "leave" => ClientCommand::Leave(room_arg("leave", arg)?),
            "room" => ClientCommand::Focus(room_arg("room", arg)?),
            "global" => ClientCommand::Global,
            "quit" | "exit" => ClientCommand::Quit,
            "help" => ClientCommand::Help,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    /// The envelope to send for this command, if any.
    ///
    /// `focus` is the room plain text goes to (`None` = global).
    pub fn to_envelope(
        &self,
        identity: &Identity,
        focus: Option<&RoomName>,
        timestamp: Timestamp,
    ) -> Option<Envelope> {
        match self {
            ClientCommand::Say(body) => Some(Envelope::chat(
                identity.clone(),
                focus.cloned(),
                body.as_str(),
                timestamp,
            )),
            ClientCommand::Join(room) => {
                Some(Envelope::join(identity.clone(), Some(room.clone()), timestamp))
            }
            ClientCommand::Leave(room) => {
                Some(Envelope::leave(identity.clone(), Some(room.clone()), timestamp))
            }
            ClientCommand::Quit => Some(Envelope::leave(identity.clone(), None, timestamp)),
            ClientCommand::Focus(_) | ClientCommand::Global | ClientCommand::Help => None,
        }
    }
}

fn room_arg(command: &'static str, arg: &str) -> Result<RoomName, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingRoom(command));
    }
    RoomName::try_from(arg).map_err(CommandError::InvalidRoom)
}
