/// Separates a command token from its argument.
pub const ARG_SEPARATOR: char = '|';

/// Terminates every encoded line on the wire.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest line a decoder will look at (terminator excluded).
/// Anything longer is garbage from a noisy relay and gets dropped.
pub const MAX_LINE_LEN: usize = 256;

/// Receive buffer size for a single datagram.
pub const MAX_DATAGRAM: usize = 2048;
