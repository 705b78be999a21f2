//! Wire protocol shared by playsync coordinators and followers.
//!
//! Every datagram carries one ASCII line, `command` or `command|argument`,
//! terminated by `\n`. See [`message::Message`] for the command set.

pub mod codec;
pub mod command;
pub mod constants;
pub mod error;
pub mod message;

pub use codec::{decode, encode};
pub use error::ProtoError;
pub use message::Message;
