//! Translates a line of client stdin into a [`Command`].
//!
//! One tagged enum, parsed with plain string splitting rather than a
//! regex crate: nothing else in this workspace needs `regex`, and the five
//! grammars below are simple enough that `split_once` reads as clearly as
//! a pattern would.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { port: u16, name: String },
    Disconnect,
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, data: String },
}

#[derive(Debug, Error)]
#[error("unrecognized command: {0:?}")]
pub struct ParseError(String);

/// Parses one line of stdin. Trailing `\r`/`\n` is stripped; everything
/// else about the line must match one of the five command grammars below
/// or this returns a [`ParseError`] naming the offending line.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let err = || ParseError(line.to_string());
    let (keyword, rest) = match line.split_once(' ') {
        Some((k, r)) => (k, Some(r)),
        None => (line, None),
    };

    match keyword {
        "CONNECT" => {
            let rest = rest.ok_or_else(err)?;
            let (port_str, name) = rest.split_once(' ').ok_or_else(err)?;
            let port: u16 = port_str.parse().map_err(|_| err())?;
            if name.is_empty() {
                return Err(err());
            }
            Ok(Command::Connect { port, name: name.to_string() })
        }
        "DISCONNECT" => {
            if rest.is_some() {
                return Err(err());
            }
            Ok(Command::Disconnect)
        }
        "SUBSCRIBE" => {
            let topic = rest.ok_or_else(err)?;
            if topic.is_empty() || topic.contains(' ') {
                return Err(err());
            }
            Ok(Command::Subscribe { topic: topic.to_string() })
        }
        "UNSUBSCRIBE" => {
            let topic = rest.ok_or_else(err)?;
            if topic.is_empty() || topic.contains(' ') {
                return Err(err());
            }
            Ok(Command::Unsubscribe { topic: topic.to_string() })
        }
        "PUBLISH" => {
            let rest = rest.ok_or_else(err)?;
            let (topic, data) = rest.split_once(' ').ok_or_else(err)?;
            if topic.is_empty() || topic.contains(' ') {
                return Err(err());
            }
            Ok(Command::Publish { topic: topic.to_string(), data: data.to_string() })
        }
        _ => Err(err()),
    }
}
