use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    state::State,
    store::{EntryId, Fields, IdSpec, StreamStore},
};

pub async fn add(
    store: &Arc<Mutex<StreamStore>>,
    state: &Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<EntryId, CommandError> {
    if arguments.len() < 4 || arguments.len() % 2 != 0 {
        return Err(CommandError::InvalidAddCommand);
    }

    let key = arguments[0].clone();
    let spec = IdSpec::parse(&arguments[1]).map_err(CommandError::InvalidEntryId)?;

    let mut fields = Fields::new();

    for pair in arguments[2..].chunks(2) {
        fields.insert(pair[0].clone(), pair[1].clone());
    }

    let id = {
        let mut store_guard = store.lock().await;
        store_guard
            .append(&key, spec, fields)
            .map_err(CommandError::InvalidEntryId)?
    };

    let mut state_guard = state.lock().await;
    state_guard.notify(&key);

    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::{mpsc, Mutex};

    use crate::{
        commands::command_error::CommandError,
        state::{State, Subscriber},
        store::{EntryId, StreamStore},
    };

    use super::add;

    fn arguments(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_appends_and_returns_id() {
        let store = Arc::new(Mutex::new(StreamStore::new()));
        let state = Arc::new(Mutex::new(State::new()));

        let id = add(
            &store,
            &state,
            arguments(&["mystream", "1-1", "sensor-id", "1234", "temperature", "19.8"]),
        )
        .await;

        assert_eq!(id, Ok(EntryId::new(1, 1)));

        let store_guard = store.lock().await;
        let entries = store_guard.entries_after("mystream", EntryId::ZERO, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].fields.get("sensor-id"),
            Some(&"1234".to_string())
        );
        assert_eq!(
            entries[0].fields.get("temperature"),
            Some(&"19.8".to_string())
        );
    }

    #[tokio::test]
    async fn test_add_validates_arguments() {
        let store = Arc::new(Mutex::new(StreamStore::new()));
        let state = Arc::new(Mutex::new(State::new()));

        let test_cases = vec![
            (arguments(&[]), CommandError::InvalidAddCommand),
            (arguments(&["mystream", "*"]), CommandError::InvalidAddCommand),
            (
                arguments(&["mystream", "*", "sensor-id"]),
                CommandError::InvalidAddCommand,
            ),
            (
                arguments(&["mystream", "*", "sensor-id", "1234", "temperature"]),
                CommandError::InvalidAddCommand,
            ),
            (
                arguments(&["mystream", "bogus", "sensor-id", "1234"]),
                CommandError::InvalidEntryId("Invalid stream ID format".to_string()),
            ),
            (
                arguments(&["mystream", "0-0", "sensor-id", "1234"]),
                CommandError::InvalidEntryId(
                    "The ID specified in XADD must be greater than 0-0".to_string(),
                ),
            ),
        ];

        for (input, expected_error) in test_cases {
            assert_eq!(
                add(&store, &state, input.clone()).await,
                Err(expected_error),
                "adding with arguments {:?}",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_add_notifies_blocked_readers() {
        let store = Arc::new(Mutex::new(StreamStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, mut receiver) = mpsc::channel(8);

        {
            let mut state_guard = state.lock().await;
            state_guard.add_subscriber(
                "mystream".to_string(),
                Subscriber {
                    reader_id: "candidate-1".to_string(),
                    sender,
                },
            );
        }

        add(
            &store,
            &state,
            arguments(&["mystream", "*", "sensor-id", "1234"]),
        )
        .await
        .unwrap();

        assert_eq!(receiver.try_recv(), Ok(()));
    }
}
