use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;

/// A reader blocked on a stream key, waiting for new entries.
#[derive(Debug)]
pub struct Subscriber {
    pub reader_id: String,
    pub sender: mpsc::Sender<()>,
}

/// Registry of blocked readers, keyed by stream name.
#[derive(Debug, Default)]
pub struct State {
    pub subscribers: HashMap<String, VecDeque<Subscriber>>,
}

impl State {
    pub fn new() -> Self {
        State {
            subscribers: HashMap::new(),
        }
    }

    pub fn add_subscriber(&mut self, key: String, subscriber: Subscriber) {
        self.subscribers.entry(key).or_default().push_back(subscriber);
    }

    pub fn remove_subscriber(&mut self, key: &str, reader_id: &str) {
        if let Some(subscriber_vec) = self.subscribers.get_mut(key) {
            subscriber_vec.retain(|subscriber| subscriber.reader_id != reader_id);
        }
    }

    /// Wakes every reader blocked on `key`. Stream reads are non-consuming,
    /// so all of them get to observe the new entry.
    pub fn notify(&mut self, key: &str) {
        if let Some(subscriber_vec) = self.subscribers.get_mut(key) {
            for subscriber in subscriber_vec.iter() {
                let _ = subscriber.sender.try_send(());
            }
        }
    }
}
