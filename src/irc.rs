//! IRC line parsing for the Twitch chat subset.
//!
//! Twitch frames are IRC lines extended with an optional IRCv3 tag region:
//! `@tags :prefix COMMAND params :trailing`. [`next_line`] pulls complete
//! CRLF-terminated lines out of the receive buffer (partial lines stay put,
//! so it does not matter how the transport splits its deliveries), and
//! [`Message::parse`] unpacks one line.

use crate::tags::Tags;

/// The required line terminator for Twitch chat traffic.
pub const CRLF: &str = "\r\n";

/// A parsed line from the Twitch server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// IRCv3 tag information, decoded from the `@…` region if present.
    pub tags: Tags,

    /// The message prefix, without the leading `:`, or empty if there was
    /// no prefix.
    pub prefix: String,

    /// The command, either an IRC verb or a three-digit numeric. Empty if
    /// the line was not a valid message.
    pub command: String,

    /// The command parameters. The last parameter may contain spaces if it
    /// was introduced with `:` on the wire.
    pub params: Vec<String>,
}

/// Remove and return the next complete line from the receive buffer.
///
/// Returns `None` (leaving the buffer untouched) until a full
/// CRLF-terminated line has accumulated.
pub fn next_line(buffer: &mut String) -> Option<String> {
    let end = buffer.find(CRLF)?;
    let line = buffer[..end].to_string();
    buffer.drain(..end + CRLF.len());
    Some(line)
}

/// Parser positions within a line.
enum State {
    LineStart,
    RawTags,
    PrefixOrCommandStart,
    Prefix,
    CommandStart,
    Command,
    ParamStart,
    Param,
    Trailer,
}

impl Message {
    /// Parse one line (without its CRLF terminator).
    ///
    /// Never fails: a line that ends before a command was fully accumulated
    /// comes back with an empty `command`, which callers discard.
    pub fn parse(line: &str) -> Self {
        let mut message = Self::default();
        let mut raw_tags = String::new();
        let mut state = State::LineStart;
        for c in line.chars() {
            match state {
                State::LineStart => {
                    if c == '@' {
                        state = State::RawTags;
                    } else if c == ':' {
                        state = State::Prefix;
                    } else {
                        state = State::Command;
                        message.command.push(c);
                    }
                }
                State::RawTags => {
                    if c == ' ' {
                        state = State::PrefixOrCommandStart;
                    } else {
                        raw_tags.push(c);
                    }
                }
                State::PrefixOrCommandStart => {
                    if c == ':' {
                        state = State::Prefix;
                    } else {
                        state = State::Command;
                        message.command.push(c);
                    }
                }
                State::Prefix => {
                    if c == ' ' {
                        state = State::CommandStart;
                    } else {
                        message.prefix.push(c);
                    }
                }
                State::CommandStart => {
                    if c != ' ' {
                        state = State::Command;
                        message.command.push(c);
                    }
                }
                State::Command => {
                    if c == ' ' {
                        state = State::ParamStart;
                    } else {
                        message.command.push(c);
                    }
                }
                State::ParamStart => {
                    if c == ':' {
                        state = State::Trailer;
                        message.params.push(String::new());
                    } else if c != ' ' {
                        state = State::Param;
                        message.params.push(c.to_string());
                    }
                }
                State::Param => {
                    if c == ' ' {
                        state = State::ParamStart;
                    } else if let Some(param) = message.params.last_mut() {
                        param.push(c);
                    }
                }
                State::Trailer => {
                    if let Some(param) = message.params.last_mut() {
                        param.push(c);
                    }
                }
            }
        }
        match state {
            State::LineStart
            | State::RawTags
            | State::PrefixOrCommandStart
            | State::Prefix
            | State::CommandStart => message.command.clear(),
            _ => {}
        }
        message.tags = Tags::parse(&raw_tags);
        message
    }
}
