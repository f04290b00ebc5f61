//! Reading and parsing RESP data from network streams.
//!
//! Bridges raw TCP bytes and parsed [`RespValue`]s for both sides of the
//! harness: the loopback server reads client commands through it, and the
//! remote endpoint reads command replies through it.

use tokio::io::AsyncReadExt;

use crate::resp::{RespError, RespValue};

/// Errors that can occur while reading and parsing RESP data from a stream.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
}

impl CommandReadError {
    /// Renders the error as a RESP error reply.
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}

/// Splits raw input bytes into string lines for RESP parsing.
pub fn parse_input(input: &[u8]) -> Result<Vec<&str>, CommandReadError> {
    let text = std::str::from_utf8(input)?;

    Ok(text
        .split_terminator("\r\n")
        .filter(|line| !line.contains('\0'))
        .collect::<Vec<&str>>())
}

/// Reads one chunk from a stream and parses it into RESP values.
///
/// # Returns
///
/// * `Ok(Vec<RespValue>)` - Successfully parsed RESP values
/// * `Err(CommandReadError::IoError)` - If reading from the stream fails
/// * `Err(CommandReadError::ConnectionClosed)` - If the connection is closed (0 bytes read)
/// * `Err(CommandReadError::InvalidUtf8)` - If the data contains invalid UTF-8
/// * `Err(CommandReadError::RespParseError)` - If RESP parsing fails
pub async fn read_and_parse_resp<R>(
    stream: &mut R,
    buffer: &mut [u8],
) -> Result<Vec<RespValue>, CommandReadError>
where
    R: AsyncReadExt + Unpin,
{
    let number_of_bytes = match stream.read(buffer).await {
        Ok(n) => n,
        Err(e) => return Err(CommandReadError::IoError(e.to_string())),
    };

    if number_of_bytes == 0 {
        return Err(CommandReadError::ConnectionClosed);
    }

    let input = parse_input(&buffer[..number_of_bytes])?;
    let parsed_input = RespValue::parse(input)?;

    Ok(parsed_input)
}
