//! Serves a [`MemoryEndpoint`] over TCP in RESP, making the candidate
//! engine independently addressable.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::endpoint::{EndpointError, StreamEndpoint};
use crate::input::{read_and_parse_resp, CommandReadError};
use crate::memory::MemoryEndpoint;
use crate::resp::RespValue;

pub struct CompatServer {
    endpoint: Arc<MemoryEndpoint>,
}

impl CompatServer {
    pub fn new(endpoint: Arc<MemoryEndpoint>) -> Self {
        CompatServer { endpoint }
    }

    /// Accept loop; one task per connection. Commands on a connection run
    /// sequentially, so a blocking read parks only its own connection.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_address)) => {
                    tracing::debug!("client connected from {}", peer_address);

                    let endpoint = Arc::clone(&self.endpoint);

                    tokio::spawn(async move {
                        handle_connection(endpoint, stream).await;
                    });
                }
                Err(e) => {
                    tracing::warn!("failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(endpoint: Arc<MemoryEndpoint>, mut stream: TcpStream) {
    let mut buffer = [0u8; 1024];

    loop {
        let parsed_input = match read_and_parse_resp(&mut stream, &mut buffer).await {
            Ok(values) => values,
            Err(CommandReadError::ConnectionClosed) => break,
            Err(e) => {
                if let Err(e) = stream.write_all(e.as_resp().encode().as_bytes()).await {
                    tracing::warn!("error writing to stream: {}", e);
                    break;
                }
                continue;
            }
        };

        for input in parsed_input {
            let reply = dispatch(&endpoint, input).await;

            if let Err(e) = stream.write_all(reply.encode().as_bytes()).await {
                tracing::warn!("error writing to stream: {}", e);
                return;
            }

            if let Err(e) = stream.flush().await {
                tracing::warn!("error flushing stream: {}", e);
                return;
            }
        }
    }
}

async fn dispatch(endpoint: &MemoryEndpoint, input: RespValue) -> RespValue {
    let RespValue::Array(elements) = input else {
        return RespValue::Error("ERR invalid command".to_string());
    };

    let mut tokens = Vec::with_capacity(elements.len());

    for element in elements {
        match element {
            RespValue::BulkString(token) => tokens.push(token),
            _ => return RespValue::Error("ERR invalid command".to_string()),
        }
    }

    let Some((verb, arguments)) = tokens.split_first() else {
        return RespValue::Error("ERR invalid command".to_string());
    };

    match endpoint.execute(verb, arguments.to_vec()).await {
        Ok(value) => value,
        Err(EndpointError::Command(e)) => e.as_resp(),
        Err(e) => RespValue::Error(format!("ERR {}", e)),
    }
}
