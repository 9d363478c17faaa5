//! Shared test doubles for engine unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tx2tx_core::protocol::message::Message;

use crate::network::ClientRouter;

/// Recording [`ClientRouter`]: keeps every sent message and lets tests flip
/// connectivity and failure behaviour mid-run.
#[derive(Default)]
pub(crate) struct RecordingRouter {
    sent: Mutex<Vec<(String, Message)>>,
    connected: Mutex<HashSet<String>>,
    fail_sends: AtomicBool,
}

impl RecordingRouter {
    pub fn with_clients(names: &[&str]) -> Self {
        let router = Self::default();
        let mut connected = router.connected.lock().unwrap();
        for name in names {
            connected.insert((*name).to_string());
        }
        drop(connected);
        router
    }

    /// Snapshot of all `(client, message)` pairs sent so far.
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, client: &str) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == client)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn disconnect(&self, client: &str) {
        self.connected.lock().unwrap().remove(client);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl ClientRouter for RecordingRouter {
    fn send(&self, client: &str, message: &Message) -> bool {
        if self.fail_sends.load(Ordering::SeqCst) {
            return false;
        }
        if !self.connected.lock().unwrap().contains(client) {
            return false;
        }
        self.sent.lock().unwrap().push((client.to_string(), message.clone()));
        true
    }

    fn broadcast(&self, message: &Message) {
        let connected: Vec<String> = self.connected.lock().unwrap().iter().cloned().collect();
        for client in connected {
            self.send(&client, message);
        }
    }

    fn is_connected(&self, client: &str) -> bool {
        self.connected.lock().unwrap().contains(client)
    }
}
