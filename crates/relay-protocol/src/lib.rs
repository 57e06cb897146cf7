//! Wire framing and message codec shared by the relay broker and client.
//!
//! A frame on the wire is a 4-byte ASCII length header followed by a body
//! of at most 512 bytes (`frame`). The body is interpreted as one of four
//! message shapes depending on direction (`message`).

pub mod frame;
pub mod message;

pub use frame::{decode_header, encode as encode_frame, encode_header, FrameError, HEADER_LEN, MAX_BODY_LEN};
pub use message::{
    decode_client, decode_server_deliver, encode_publish, encode_server_deliver,
    encode_subscribe, encode_unsubscribe, ClientMessage, MissingSeparator, ServerDeliver,
};
