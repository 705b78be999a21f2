use std::fmt;
use std::str::FromStr;

use crate::{
    command::Command,
    constants::{ARG_SEPARATOR, MAX_LINE_LEN},
    error::ProtoError,
};

/// A single protocol message.
///
/// Times are playback positions in seconds. `Speed` is the coordinator's
/// nominal playback rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Play,
    Pause,
    Seek(f64),
    Position(f64),
    Speed(f64),
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Message::Play => Command::Play,
            Message::Pause => Command::Pause,
            Message::Seek(_) => Command::Seek,
            Message::Position(_) => Command::Position,
            Message::Speed(_) => Command::Speed,
        }
    }

    pub fn argument(&self) -> Option<f64> {
        match *self {
            Message::Play | Message::Pause => None,
            Message::Seek(t) | Message::Position(t) | Message::Speed(t) => Some(t),
        }
    }

    fn from_parts(command: Command, value: Option<f64>) -> Result<Self, ProtoError> {
        let Some(value) = value else {
            return match command {
                Command::Play => Ok(Message::Play),
                Command::Pause => Ok(Message::Pause),
                _ => Err(ProtoError::MissingArgument(command)),
            };
        };

        let in_range = match command {
            Command::Seek | Command::Position => value.is_finite() && value >= 0.0,
            Command::Speed => value.is_finite() && value > 0.0,
            Command::Play | Command::Pause => return Err(ProtoError::UnexpectedArgument(command)),
        };
        if !in_range {
            return Err(ProtoError::OutOfRange { command, value });
        }

        Ok(match command {
            Command::Seek => Message::Seek(value),
            Command::Position => Message::Position(value),
            _ => Message::Speed(value),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            // Shortest round-trip form; large and tiny values use an exponent.
            Some(value) => write!(f, "{}{ARG_SEPARATOR}{value:?}", self.command()),
            None => write!(f, "{}", self.command()),
        }
    }
}

impl FromStr for Message {
    type Err = ProtoError;

    /// Parse one line, surrounding whitespace (including the terminator) ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtoError::Empty);
        }
        if line.len() > MAX_LINE_LEN {
            return Err(ProtoError::TooLong(line.len()));
        }

        let (token, arg) = match line.split_once(ARG_SEPARATOR) {
            Some((token, arg)) => (token, Some(arg.trim())),
            None => (line, None),
        };
        let command = Command::from_str(token.trim())
            .map_err(|_| ProtoError::UnknownCommand(token.to_string()))?;

        let value = match arg {
            None => None,
            // `seek|` carries a separator but nothing after it.
            Some("") => return Err(ProtoError::MissingArgument(command)),
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| ProtoError::BadArgument {
                command,
                value: raw.to_string(),
            })?),
        };

        Message::from_parts(command, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_commands() {
        assert_eq!("play".parse::<Message>(), Ok(Message::Play));
        assert_eq!("pause".parse::<Message>(), Ok(Message::Pause));
        assert_eq!("seek|12.5".parse::<Message>(), Ok(Message::Seek(12.5)));
        assert_eq!("position|0".parse::<Message>(), Ok(Message::Position(0.0)));
        assert_eq!("speed|1.25".parse::<Message>(), Ok(Message::Speed(1.25)));
    }

    #[test]
    fn tolerates_terminator_and_padding() {
        assert_eq!("position|3.5\n".parse::<Message>(), Ok(Message::Position(3.5)));
        assert_eq!("  pause\r\n".parse::<Message>(), Ok(Message::Pause));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<Message>(), Err(ProtoError::Empty));
        assert_eq!("\n".parse::<Message>(), Err(ProtoError::Empty));
        assert!(matches!(
            "rewind|3".parse::<Message>(),
            Err(ProtoError::UnknownCommand(_))
        ));
        assert_eq!(
            "seek".parse::<Message>(),
            Err(ProtoError::MissingArgument(Command::Seek))
        );
        assert_eq!(
            "seek|".parse::<Message>(),
            Err(ProtoError::MissingArgument(Command::Seek))
        );
        assert!(matches!(
            "position|abc".parse::<Message>(),
            Err(ProtoError::BadArgument { .. })
        ));
        assert_eq!(
            "play|1".parse::<Message>(),
            Err(ProtoError::UnexpectedArgument(Command::Play))
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            "speed|0".parse::<Message>(),
            Err(ProtoError::OutOfRange { .. })
        ));
        assert!(matches!(
            "speed|-1".parse::<Message>(),
            Err(ProtoError::OutOfRange { .. })
        ));
        assert!(matches!(
            "position|-0.5".parse::<Message>(),
            Err(ProtoError::OutOfRange { .. })
        ));
        assert!(matches!(
            "seek|NaN".parse::<Message>(),
            Err(ProtoError::OutOfRange { .. })
        ));
        assert!(matches!(
            "position|inf".parse::<Message>(),
            Err(ProtoError::OutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_overlong_lines() {
        let line = format!("position|{}", "1".repeat(MAX_LINE_LEN));
        assert!(matches!(
            line.parse::<Message>(),
            Err(ProtoError::TooLong(_))
        ));
    }

    #[test]
    fn displays_wire_form() {
        assert_eq!(Message::Play.to_string(), "play");
        assert_eq!(Message::Seek(100.0).to_string(), "seek|100.0");
        assert_eq!(Message::Position(1e300).to_string(), "position|1e300");
        assert_eq!(Message::Position(100.02).to_string(), "position|100.02");
        assert_eq!(Message::Speed(0.5).to_string(), "speed|0.5");
    }
}
