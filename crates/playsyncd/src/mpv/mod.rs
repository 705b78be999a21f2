//! mpv host adapter over the JSON IPC socket.
//!
//! - [`ipc`]: property cache and IPC line interpretation
//! - [`player`]: the [`Player`](playsync_engine::Player) implementation and connection setup

pub mod ipc;
pub mod player;

pub use ipc::{OFFSET_DOWN_MESSAGE, OFFSET_UP_MESSAGE, PropertyCache};
pub use player::{MpvPlayer, connect};
