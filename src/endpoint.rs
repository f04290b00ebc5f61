//! The command surface shared by both endpoints under comparison.
//!
//! [`StreamEndpoint::execute`] is the generic verb interface; `add` and
//! `read` are typed wrappers over it, so the reference and the candidate go
//! through exactly the same argument grammar and reply decoding.

use async_trait::async_trait;
use thiserror::Error;

use crate::commands::{read_result_from_resp, CommandError};
use crate::resp::RespValue;
use crate::store::{EntryId, ReadResult};

/// Position marker a read starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cursor {
    /// `0` - read from the start of the stream.
    Start,
    /// `$` - read only entries added after the call starts.
    Latest,
    /// A literal entry ID; only entries strictly greater qualify.
    At(EntryId),
}

impl Cursor {
    pub fn render(&self) -> String {
        match self {
            Cursor::Start => "0".to_string(),
            Cursor::Latest => "$".to_string(),
            Cursor::At(id) => id.to_string(),
        }
    }
}

/// Options for a read, rendered into XREAD's argument grammar.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub count: Option<usize>,
    pub block_ms: Option<u64>,
    pub streams: Vec<(String, Cursor)>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn block(mut self, block_ms: u64) -> Self {
        self.block_ms = Some(block_ms);
        self
    }

    pub fn stream(mut self, key: &str, cursor: Cursor) -> Self {
        self.streams.push((key.to_string(), cursor));
        self
    }

    /// Renders the options as raw XREAD arguments:
    /// `[COUNT n] [BLOCK ms] STREAMS key [key ...] cursor [cursor ...]`.
    pub fn to_arguments(&self) -> Vec<String> {
        let mut arguments = Vec::new();

        if let Some(count) = self.count {
            arguments.push("COUNT".to_string());
            arguments.push(count.to_string());
        }

        if let Some(block_ms) = self.block_ms {
            arguments.push("BLOCK".to_string());
            arguments.push(block_ms.to_string());
        }

        arguments.push("STREAMS".to_string());

        for (key, _) in &self.streams {
            arguments.push(key.clone());
        }

        for (_, cursor) in &self.streams {
            arguments.push(cursor.render());
        }

        arguments
    }
}

/// Errors surfaced by an endpoint. Protocol-shape deviations are hard
/// failures; nothing here is retried.
#[derive(Error, Debug, PartialEq)]
pub enum EndpointError {
    #[error("command error: {0}")]
    Command(#[from] CommandError),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("error reply from endpoint: {0}")]
    ErrorReply(String),
}

/// A command-accepting stream store.
///
/// Implementations provide `execute`; the typed operations are layered on
/// top, so adding a new verb never changes the core contract.
#[async_trait]
pub trait StreamEndpoint: Send + Sync {
    /// A short label used in comparison reports.
    fn name(&self) -> &str;

    /// Issues a single command and returns the raw reply value.
    async fn execute(
        &self,
        command: &str,
        arguments: Vec<String>,
    ) -> Result<RespValue, EndpointError>;

    /// Appends an entry and returns its ID in string form.
    async fn add(
        &self,
        key: &str,
        id_spec: &str,
        fields: &[(&str, &str)],
    ) -> Result<String, EndpointError> {
        let mut arguments = vec![key.to_string(), id_spec.to_string()];

        for (field, value) in fields {
            arguments.push(field.to_string());
            arguments.push(value.to_string());
        }

        match self.execute("XADD", arguments).await? {
            RespValue::BulkString(id) => Ok(id),
            RespValue::Error(message) => Err(EndpointError::ErrorReply(message)),
            other => Err(EndpointError::Protocol(format!(
                "XADD reply is not a bulk string: {:?}",
                other
            ))),
        }
    }

    /// Reads entries according to the given options.
    async fn read(&self, options: &ReadOptions) -> Result<ReadResult, EndpointError> {
        match self.execute("XREAD", options.to_arguments()).await? {
            RespValue::Error(message) => Err(EndpointError::ErrorReply(message)),
            value => read_result_from_resp(&value).map_err(EndpointError::Protocol),
        }
    }
}
