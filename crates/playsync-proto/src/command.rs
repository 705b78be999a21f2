use strum::{Display, EnumString, IntoStaticStr};

/// Command tokens as they appear before the separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    Play,
    Pause,
    Seek,
    Position,
    Speed,
}

impl Command {
    /// Whether the command carries a numeric argument.
    pub const fn takes_argument(self) -> bool {
        matches!(self, Command::Seek | Command::Position | Command::Speed)
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
