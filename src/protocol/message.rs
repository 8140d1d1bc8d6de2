//! Wire messages of the agent pipe protocol.
//!
//! | Wire form           | Message                  |
//! |---------------------|--------------------------|
//! | `<id>W#`            | [`Message::Wait`]        |
//! | `<id>S#`            | [`Message::Step`]        |
//! | `<id>T#`            | [`Message::Terminate`]   |
//! | `<id>#<payload>`    | [`Message::Data`]        |
//!
//! Payloads are not escaped. Everything after the first `#` of a data line is
//! the payload, further `#` characters included.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::{AppError, Result};

/// Delimiter between the agent prefix and the payload.
pub const DELIMITER: char = '#';

/// Message kind, independent of addressee and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Agent announces it is waiting for work.
    Wait,
    /// Continue signal.
    Step,
    /// Agent session ends.
    Terminate,
    /// Application payload.
    Data,
}

impl Tag {
    /// Tag character written between the agent id and the delimiter.
    #[must_use]
    pub fn wire_char(self) -> Option<char> {
        match self {
            Self::Wait => Some('W'),
            Self::Step => Some('S'),
            Self::Terminate => Some('T'),
            Self::Data => None,
        }
    }
}

/// One line of the agent pipe protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Message {
    /// `<id>W#`
    Wait {
        /// Addressed agent.
        agent_id: u32,
    },
    /// `<id>S#`
    Step {
        /// Addressed agent.
        agent_id: u32,
    },
    /// `<id>T#`
    Terminate {
        /// Addressed agent.
        agent_id: u32,
    },
    /// `<id>#<payload>`
    Data {
        /// Addressed agent.
        agent_id: u32,
        /// Payload, never containing a line terminator.
        payload: String,
    },
}

impl Message {
    /// Build a data message.
    #[must_use]
    pub fn data(agent_id: u32, payload: impl Into<String>) -> Self {
        Self::Data {
            agent_id,
            payload: payload.into(),
        }
    }

    /// Agent this message is addressed to.
    #[must_use]
    pub fn agent_id(&self) -> u32 {
        match self {
            Self::Wait { agent_id }
            | Self::Step { agent_id }
            | Self::Terminate { agent_id }
            | Self::Data { agent_id, .. } => *agent_id,
        }
    }

    /// Message kind.
    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            Self::Wait { .. } => Tag::Wait,
            Self::Step { .. } => Tag::Step,
            Self::Terminate { .. } => Tag::Terminate,
            Self::Data { .. } => Tag::Data,
        }
    }

    /// Payload text; empty for control messages.
    #[must_use]
    pub fn payload(&self) -> &str {
        match self {
            Self::Data { payload, .. } => payload,
            _ => "",
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.agent_id())?;
        if let Some(tag) = self.tag().wire_char() {
            write!(f, "{tag}")?;
        }
        write!(f, "{DELIMITER}{}", self.payload())
    }
}

impl FromStr for Message {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self> {
        decode(line)
    }
}

/// Encode `msg` as a wire line, without the trailing newline.
#[must_use]
pub fn encode(msg: &Message) -> String {
    msg.to_string()
}

/// Decode a wire line (without its newline) into a [`Message`].
///
/// # Errors
///
/// Returns [`AppError::MalformedLine`] when the line has no numeric agent
/// prefix, the prefix does not fit an agent id, or the remainder is neither a
/// control suffix (`W#`, `S#`, `T#`) nor a `#`-delimited payload.
pub fn decode(line: &str) -> Result<Message> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Err(AppError::MalformedLine(format!(
            "missing agent id prefix: {line:?}"
        )));
    }

    let (prefix, rest) = line.split_at(digits);
    let agent_id: u32 = prefix
        .parse()
        .map_err(|err| AppError::MalformedLine(format!("agent id {prefix:?}: {err}")))?;

    match rest {
        "W#" => Ok(Message::Wait { agent_id }),
        "S#" => Ok(Message::Step { agent_id }),
        "T#" => Ok(Message::Terminate { agent_id }),
        _ => match rest.strip_prefix(DELIMITER) {
            Some(payload) => Ok(Message::data(agent_id, payload)),
            None => Err(AppError::MalformedLine(format!(
                "missing delimiter after agent id: {line:?}"
            ))),
        },
    }
}
