use thiserror::Error;

use crate::command::Command;

#[derive(Debug, Error, PartialEq)]
pub enum ProtoError {
    #[error("empty line")]
    Empty,
    #[error("line too long: {0} bytes")]
    TooLong(usize),
    #[error("line is not valid utf-8")]
    NotUtf8,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0} requires an argument")]
    MissingArgument(Command),
    #[error("{0} takes no argument")]
    UnexpectedArgument(Command),
    #[error("{command}: unparsable argument {value:?}")]
    BadArgument { command: Command, value: String },
    #[error("{command}: argument {value} out of range")]
    OutOfRange { command: Command, value: f64 },
}
