use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("invalid XADD command")]
    InvalidAddCommand,
    #[error("invalid XREAD command")]
    InvalidReadCommand,
    #[error("invalid XREAD command option")]
    InvalidReadOption,
    #[error("invalid XREAD block duration")]
    InvalidBlockDuration,
    #[error("invalid XREAD count")]
    InvalidCount,
    #[error("{0}")]
    InvalidEntryId(String),
}

impl CommandError {
    /// Renders the error as a RESP error reply for the wire.
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}
