use crate::frame::{self, FrameError, MAX_BODY_LEN};

const TAG_SUBSCRIBE: u8 = b's';
const TAG_UNSUBSCRIBE: u8 = b'u';
const TAG_PUBLISH: u8 = b'p';

/// A message decoded from a client->server frame body.
///
/// Tag-dispatched: one variant per kind, no runtime type inspection.
/// `Unknown` is a value, not an error; the session is expected to match on
/// it and silently drop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, data: Vec<u8> },
    Unknown,
}

/// A server->client delivery: `topic SP data`, untagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDeliver {
    pub topic: String,
    pub data: Vec<u8>,
}

/// A delivery frame with no separator byte. Per DESIGN.md Open Question 2,
/// this is malformed rather than `(body, "")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("server deliver frame has no topic/data separator")]
pub struct MissingSeparator;

pub fn encode_subscribe(topic: &str) -> Result<Vec<u8>, FrameError> {
    encode_tagged(TAG_SUBSCRIBE, topic.as_bytes(), None)
}

pub fn encode_unsubscribe(topic: &str) -> Result<Vec<u8>, FrameError> {
    encode_tagged(TAG_UNSUBSCRIBE, topic.as_bytes(), None)
}

pub fn encode_publish(topic: &str, data: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode_tagged(TAG_PUBLISH, topic.as_bytes(), Some(data))
}

pub fn encode_server_deliver(topic: &str, data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = topic.len() + 1 + data.len();
    if len > MAX_BODY_LEN {
        return Err(FrameError::OversizedBody(len));
    }
    let mut body = Vec::with_capacity(len);
    body.extend_from_slice(topic.as_bytes());
    body.push(b' ');
    body.extend_from_slice(data);
    frame::encode(&body)
}

/// `tag ∥ topic` for Subscribe/Unsubscribe (`data = None`), or
/// `tag ∥ topic ∥ ' ' ∥ data` for Publish (`data = Some(..)`, always
/// carries the separator even when `data` is empty).
fn encode_tagged(tag: u8, topic: &[u8], data: Option<&[u8]>) -> Result<Vec<u8>, FrameError> {
    let len = 1 + topic.len() + data.map_or(0, |d| 1 + d.len());
    if len > MAX_BODY_LEN {
        return Err(FrameError::OversizedBody(len));
    }
    let mut body = Vec::with_capacity(len);
    body.push(tag);
    body.extend_from_slice(topic);
    if let Some(data) = data {
        body.push(b' ');
        body.extend_from_slice(data);
    }
    frame::encode(&body)
}

/// Decodes a client->server frame body. Byte 0 is the kind tag; an empty
/// body or an unrecognized tag decodes to `Unknown` rather than erroring,
/// since the caller is expected to drop it silently rather than treat it
/// as exceptional.
pub fn decode_client(body: &[u8]) -> ClientMessage {
    let Some((&tag, rest)) = body.split_first() else {
        return ClientMessage::Unknown;
    };
    match tag {
        TAG_SUBSCRIBE => ClientMessage::Subscribe { topic: lossy_string(rest) },
        TAG_UNSUBSCRIBE => ClientMessage::Unsubscribe { topic: lossy_string(rest) },
        TAG_PUBLISH => match split_at_first_space(rest) {
            Some((topic, data)) => {
                ClientMessage::Publish { topic: lossy_string(topic), data: data.to_vec() }
            }
            None => ClientMessage::Publish { topic: lossy_string(rest), data: Vec::new() },
        },
        _ => ClientMessage::Unknown,
    }
}

/// Decodes a server->client frame body (`topic SP data`, untagged).
pub fn decode_server_deliver(body: &[u8]) -> Result<ServerDeliver, MissingSeparator> {
    let (topic, data) = split_at_first_space(body).ok_or(MissingSeparator)?;
    Ok(ServerDeliver { topic: lossy_string(topic), data: data.to_vec() })
}

fn split_at_first_space(b: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = b.iter().position(|&c| c == b' ')?;
    Some((&b[..pos], &b[pos + 1..]))
}

fn lossy_string(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}
