use crate::{constants::LINE_TERMINATOR, error::ProtoError, message::Message};

/// Encode a message into a single datagram payload: the line plus `\n`.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut out = msg.to_string().into_bytes();
    out.push(LINE_TERMINATOR);
    out
}

/// Decode one datagram payload or relay line.
///
/// Callers on the receive path treat every error as "drop this line".
pub fn decode(payload: &[u8]) -> Result<Message, ProtoError> {
    let line = std::str::from_utf8(payload).map_err(|_| ProtoError::NotUtf8)?;
    line.parse()
}
