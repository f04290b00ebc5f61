//! The reference endpoint: a minimal RESP client over TCP.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::endpoint::{EndpointError, StreamEndpoint};
use crate::input::parse_input;
use crate::resp::{RespError, RespValue};

/// A stream endpoint reachable over a network connection.
///
/// Every command runs on its own connection: a blocking read parks its
/// connection until the server unblocks it, and must not wedge commands
/// issued concurrently behind it.
pub struct RemoteEndpoint {
    name: String,
    address: String,
}

impl RemoteEndpoint {
    /// Probes the address once so a misconfigured reference fails fast.
    pub async fn connect(name: &str, address: &str) -> Result<Self, EndpointError> {
        TcpStream::connect(address)
            .await
            .map_err(|e| EndpointError::Io(e.to_string()))?;

        Ok(RemoteEndpoint {
            name: name.to_string(),
            address: address.to_string(),
        })
    }

    /// Reads one complete reply, accumulating across socket reads until the
    /// RESP parser stops reporting incomplete input.
    async fn read_reply(stream: &mut TcpStream) -> Result<RespValue, EndpointError> {
        let mut buffer = BytesMut::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        loop {
            let number_of_bytes = stream
                .read(&mut chunk)
                .await
                .map_err(|e| EndpointError::Io(e.to_string()))?;

            if number_of_bytes == 0 {
                return Err(EndpointError::ConnectionClosed);
            }

            buffer.extend_from_slice(&chunk[..number_of_bytes]);

            // Only lines ending in \r\n are parseable; keep the tail for the
            // next read.
            let Some(position) = buffer.windows(2).rposition(|window| window == b"\r\n") else {
                continue;
            };

            let lines = parse_input(&buffer[..position + 2])
                .map_err(|e| EndpointError::Protocol(e.to_string()))?;

            match RespValue::parse(lines) {
                Ok(values) => match values.into_iter().next() {
                    Some(value) => return Ok(value),
                    None => continue,
                },
                Err(RespError::Incomplete) => continue,
                Err(e) => return Err(EndpointError::Protocol(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl StreamEndpoint for RemoteEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        command: &str,
        arguments: Vec<String>,
    ) -> Result<RespValue, EndpointError> {
        let mut elements = Vec::with_capacity(arguments.len() + 1);
        elements.push(RespValue::BulkString(command.to_uppercase()));

        for argument in arguments {
            elements.push(RespValue::BulkString(argument));
        }

        let request = RespValue::Array(elements).encode();

        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| EndpointError::Io(e.to_string()))?;

        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| EndpointError::Io(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| EndpointError::Io(e.to_string()))?;

        Self::read_reply(&mut stream).await
    }
}
