//! The in-memory candidate endpoint.
//!
//! Commands are dispatched through an explicit [`CommandRegistry`] so new
//! verbs can be installed per instance without touching the endpoint
//! contract itself.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::commands::{self, read_result_to_resp, CommandError};
use crate::endpoint::{EndpointError, StreamEndpoint};
use crate::resp::RespValue;
use crate::state::State;
use crate::store::StreamStore;

/// Shared engine handles passed to every command handler.
pub struct CommandContext {
    pub store: Arc<Mutex<StreamStore>>,
    pub state: Arc<Mutex<State>>,
    /// Unique per command invocation; blocking reads use it to register and
    /// deregister themselves as subscribers.
    pub reader_id: String,
}

pub type CommandFuture = Pin<Box<dyn Future<Output = Result<RespValue, CommandError>> + Send>>;
pub type CommandHandler = Box<dyn Fn(CommandContext, Vec<String>) -> CommandFuture + Send + Sync>;

/// Maps uppercase verbs to their handlers.
pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    /// An empty registry, no verbs installed.
    pub fn new() -> Self {
        CommandRegistry {
            handlers: HashMap::new(),
        }
    }

    /// A registry with the built-in stream verbs installed.
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self::new();

        registry.register(
            "XADD",
            Box::new(|context, arguments| {
                Box::pin(async move {
                    let id = commands::add(&context.store, &context.state, arguments).await?;
                    Ok(RespValue::BulkString(id.to_string()))
                })
            }),
        );

        registry.register(
            "XREAD",
            Box::new(|context, arguments| {
                Box::pin(async move {
                    let CommandContext {
                        store,
                        state,
                        reader_id,
                    } = context;

                    let result = commands::read(&reader_id, store, state, arguments).await?;

                    Ok(read_result_to_resp(&result))
                })
            }),
        );

        registry
    }

    pub fn register(&mut self, verb: &str, handler: CommandHandler) {
        self.handlers.insert(verb.to_uppercase(), handler);
    }

    pub fn get(&self, verb: &str) -> Option<&CommandHandler> {
        self.handlers.get(verb)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_builtin_commands()
    }
}

/// An in-process stream engine exposing the endpoint command surface.
pub struct MemoryEndpoint {
    name: String,
    store: Arc<Mutex<StreamStore>>,
    state: Arc<Mutex<State>>,
    registry: CommandRegistry,
    next_reader_id: AtomicU64,
}

impl MemoryEndpoint {
    pub fn new(name: &str) -> Self {
        MemoryEndpoint {
            name: name.to_string(),
            store: Arc::new(Mutex::new(StreamStore::new())),
            state: Arc::new(Mutex::new(State::new())),
            registry: CommandRegistry::with_builtin_commands(),
            next_reader_id: AtomicU64::new(0),
        }
    }

    /// Installs a new verb on this instance.
    pub fn register_command(&mut self, verb: &str, handler: CommandHandler) {
        self.registry.register(verb, handler);
    }

    /// Handle to the underlying store, for inspection.
    pub fn store(&self) -> Arc<Mutex<StreamStore>> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl StreamEndpoint for MemoryEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        command: &str,
        arguments: Vec<String>,
    ) -> Result<RespValue, EndpointError> {
        let verb = command.to_uppercase();

        let Some(handler) = self.registry.get(&verb) else {
            return Err(CommandError::UnknownCommand(verb).into());
        };

        let context = CommandContext {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            reader_id: format!(
                "{}-{}",
                self.name,
                self.next_reader_id.fetch_add(1, Ordering::Relaxed)
            ),
        };

        let reply = handler(context, arguments).await?;

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::CommandError;
    use crate::endpoint::{Cursor, EndpointError, ReadOptions, StreamEndpoint};
    use crate::resp::RespValue;

    use super::MemoryEndpoint;

    #[tokio::test]
    async fn test_add_then_read() {
        let endpoint = MemoryEndpoint::new("candidate");

        let id = endpoint
            .add(
                "mystream",
                "*",
                &[("sensor-id", "1234"), ("temperature", "19.8")],
            )
            .await
            .unwrap();

        assert_eq!(id.split('-').count(), 2);

        let result = endpoint
            .read(
                &ReadOptions::new()
                    .count(1)
                    .stream("mystream", Cursor::Start),
            )
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        let (key, entries) = &result[0];
        assert_eq!(key, "mystream");
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].fields.get("sensor-id"),
            Some(&"1234".to_string())
        );
    }

    #[tokio::test]
    async fn test_read_of_empty_stream_is_null_array() {
        let endpoint = MemoryEndpoint::new("candidate");

        let reply = endpoint
            .execute(
                "XREAD",
                vec![
                    "STREAMS".to_string(),
                    "mystream".to_string(),
                    "0".to_string(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(reply, RespValue::NullArray);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let endpoint = MemoryEndpoint::new("candidate");

        let result = endpoint.execute("XYZZY", Vec::new()).await;

        assert_eq!(
            result,
            Err(EndpointError::Command(CommandError::UnknownCommand(
                "XYZZY".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_registering_a_new_verb() {
        let mut endpoint = MemoryEndpoint::new("candidate");

        endpoint.register_command(
            "XLEN",
            Box::new(|context, arguments| {
                Box::pin(async move {
                    let Some(key) = arguments.first() else {
                        return Err(CommandError::InvalidReadCommand);
                    };

                    let store_guard = context.store.lock().await;
                    Ok(RespValue::Integer(store_guard.len(key) as i64))
                })
            }),
        );

        endpoint
            .add("mystream", "*", &[("sensor-id", "1234")])
            .await
            .unwrap();
        endpoint
            .add("mystream", "*", &[("sensor-id", "4321")])
            .await
            .unwrap();

        let reply = endpoint
            .execute("xlen", vec!["mystream".to_string()])
            .await
            .unwrap();

        assert_eq!(reply, RespValue::Integer(2));
    }
}
