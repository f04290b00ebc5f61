use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, Mutex};

use crate::{
    commands::command_error::CommandError,
    state::{State, Subscriber},
    store::{EntryId, ReadResult, StreamStore},
};

/// Parsed arguments for the XREAD command.
///
/// Format: `XREAD [COUNT n] [BLOCK milliseconds] STREAMS key [key ...] cursor [cursor ...]`
#[derive(Debug, PartialEq)]
pub struct ReadArguments {
    /// Per-stream cap on returned entries.
    pub count: Option<usize>,
    /// Blocking duration in milliseconds. `None` means non-blocking;
    /// `Some(0)` means block until data arrives.
    pub block_ms: Option<u64>,
    /// `(key, cursor)` pairs, where the cursor is `0`, `$`, or a literal ID.
    pub key_cursor_pairs: Vec<(String, String)>,
}

impl ReadArguments {
    /// Parses raw command arguments into structured [`ReadArguments`].
    ///
    /// Options may appear in any order before `STREAMS`. The tokens after
    /// `STREAMS` must split evenly into keys followed by one cursor per key.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        let mut count = None;
        let mut block_ms = None;
        let mut index = 0;

        loop {
            let Some(option) = arguments.get(index) else {
                return Err(CommandError::InvalidReadCommand);
            };

            match option.to_lowercase().as_str() {
                "count" => {
                    let value = arguments
                        .get(index + 1)
                        .ok_or(CommandError::InvalidCount)?
                        .parse::<usize>()
                        .map_err(|_| CommandError::InvalidCount)?;

                    count = Some(value);
                    index += 2;
                }
                "block" => {
                    let value = arguments
                        .get(index + 1)
                        .ok_or(CommandError::InvalidBlockDuration)?
                        .parse::<u64>()
                        .map_err(|_| CommandError::InvalidBlockDuration)?;

                    block_ms = Some(value);
                    index += 2;
                }
                "streams" => {
                    index += 1;
                    break;
                }
                _ => return Err(CommandError::InvalidReadOption),
            }
        }

        let data = &arguments[index..];

        if data.is_empty() || data.len() % 2 != 0 {
            return Err(CommandError::InvalidReadCommand);
        }

        let split_index = data.len() / 2;
        let mut key_cursor_pairs = Vec::with_capacity(split_index);

        for i in 0..split_index {
            key_cursor_pairs.push((data[i].clone(), data[split_index + i].clone()));
        }

        Ok(Self {
            count,
            block_ms,
            key_cursor_pairs,
        })
    }
}

/// Handles the XREAD command against the in-memory store.
///
/// Non-blocking calls return whatever qualifies right away. Blocking calls
/// that find nothing register as subscribers on every requested key, wait
/// for a notification or the timeout, then re-read. The `$` cursor is
/// resolved once, at call start, so only entries added after the call
/// qualify.
///
/// # Arguments
///
/// * `reader_id` - Identifier for this read call, used for subscriber bookkeeping
/// * `store` - Thread-safe reference to the stream store
/// * `state` - Thread-safe reference to the blocked-reader registry
/// * `arguments` - Command arguments in the format: [COUNT n] [BLOCK ms] STREAMS key ... cursor ...
///
/// # Returns
///
/// * `Ok(ReadResult)` - One `(key, entries)` pair per stream with qualifying
///   entries; empty when nothing qualified (or the block timed out)
/// * `Err(CommandError)` - If arguments or cursors are malformed
pub async fn read(
    reader_id: &str,
    store: Arc<Mutex<StreamStore>>,
    state: Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<ReadResult, CommandError> {
    let read_arguments = ReadArguments::parse(arguments)?;

    let cursors = resolve_cursors(&store, &read_arguments.key_cursor_pairs).await?;

    let direct_result = read_streams(&store, &cursors, read_arguments.count).await;

    let Some(block_ms) = read_arguments.block_ms else {
        return Ok(direct_result);
    };

    if !direct_result.is_empty() {
        return Ok(direct_result);
    }

    // Subscribe before the re-check so an add between the first read and the
    // subscription cannot be missed.
    let (sender, mut receiver) = mpsc::channel(8);
    add_subscribers(&state, &cursors, reader_id, sender).await;

    let rechecked = read_streams(&store, &cursors, read_arguments.count).await;

    if !rechecked.is_empty() {
        remove_subscribers(&state, &cursors, reader_id).await;
        return Ok(rechecked);
    }

    let woken = wait_for_data(&mut receiver, block_ms).await;
    remove_subscribers(&state, &cursors, reader_id).await;

    match woken {
        Some(()) => Ok(read_streams(&store, &cursors, read_arguments.count).await),
        None => Ok(Vec::new()),
    }
}

/// Resolves cursor tokens into concrete entry IDs.
///
/// `0` reads from the start, `$` resolves to the stream's current last ID
/// (or the start for a stream with no entries yet), and anything else must
/// be a literal two-part ID.
async fn resolve_cursors(
    store: &Arc<Mutex<StreamStore>>,
    key_cursor_pairs: &[(String, String)],
) -> Result<Vec<(String, EntryId)>, CommandError> {
    let store_guard = store.lock().await;
    let mut resolved = Vec::with_capacity(key_cursor_pairs.len());

    for (key, cursor) in key_cursor_pairs {
        let id = match cursor.as_str() {
            "0" => EntryId::ZERO,
            "$" => store_guard.last_id(key).unwrap_or(EntryId::ZERO),
            literal => EntryId::parse(literal).map_err(CommandError::InvalidEntryId)?,
        };

        resolved.push((key.clone(), id));
    }

    Ok(resolved)
}

async fn read_streams(
    store: &Arc<Mutex<StreamStore>>,
    cursors: &[(String, EntryId)],
    count: Option<usize>,
) -> ReadResult {
    let store_guard = store.lock().await;
    let mut result = Vec::new();

    for (key, cursor) in cursors {
        let entries = store_guard.entries_after(key, *cursor, count);

        if !entries.is_empty() {
            result.push((key.clone(), entries));
        }
    }

    result
}

async fn add_subscribers(
    state: &Arc<Mutex<State>>,
    cursors: &[(String, EntryId)],
    reader_id: &str,
    sender: mpsc::Sender<()>,
) {
    let mut state_guard = state.lock().await;

    for (key, _) in cursors {
        state_guard.add_subscriber(
            key.clone(),
            Subscriber {
                reader_id: reader_id.to_string(),
                sender: sender.clone(),
            },
        );
    }
}

async fn remove_subscribers(
    state: &Arc<Mutex<State>>,
    cursors: &[(String, EntryId)],
    reader_id: &str,
) {
    let mut state_guard = state.lock().await;

    for (key, _) in cursors {
        state_guard.remove_subscriber(key, reader_id);
    }
}

/// Waits for a wake-up notification or the blocking timeout.
///
/// A duration of `0` waits indefinitely. Returns `None` on timeout or if
/// every notifier went away.
async fn wait_for_data(receiver: &mut mpsc::Receiver<()>, block_ms: u64) -> Option<()> {
    match block_ms {
        0 => receiver.recv().await,
        duration => {
            match tokio::time::timeout(Duration::from_millis(duration), receiver.recv()).await {
                Ok(result) => result,
                Err(_) => None,
            }
        }
    }
}
