//! Mock transport for testing.
//!
//! Behaves like a scripted receiver: an optional greeting is delivered to the
//! first consumer installed after it was set, and each write pops the next
//! queued reply and delivers it to the active consumer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{Consumer, NullConsumer, Transport, TransportError, WriteFuture};

enum Reply {
    Data(Vec<u8>),
    Hangup,
}

struct MockState {
    consumer: Box<dyn Consumer>,
    greeting: Option<Vec<u8>>,
    replies: VecDeque<Reply>,
    writes: Vec<Vec<u8>>,
    swaps: usize,
    connected: bool,
}

impl MockState {
    fn hang_up(&mut self) {
        if self.connected {
            self.connected = false;
            self.consumer.connection_lost();
        }
    }
}

/// Mock transport for unit testing protocol logic.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                consumer: Box::new(NullConsumer),
                greeting: None,
                replies: VecDeque::new(),
                writes: Vec::new(),
                swaps: 0,
                connected: true,
            })),
        }
    }

    /// Bytes sent to the next consumer installed (e.g. the `C` handshake).
    pub fn set_greeting(&self, bytes: &[u8]) {
        self.state.lock().unwrap().greeting = Some(bytes.to_vec());
    }

    /// Queue a reply delivered after the next unanswered write.
    pub fn queue_reply(&self, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Reply::Data(bytes.to_vec()));
    }

    /// Queue one single-byte reply per element of `bytes`.
    pub fn queue_replies(&self, bytes: &[u8]) {
        for &b in bytes {
            self.queue_reply(&[b]);
        }
    }

    /// Queue a hangup in place of a reply.
    pub fn queue_hangup(&self) {
        self.state.lock().unwrap().replies.push_back(Reply::Hangup);
    }

    /// Deliver bytes to the active consumer right now.
    pub fn feed(&self, bytes: &[u8]) {
        self.state.lock().unwrap().consumer.data_received(bytes);
    }

    /// Simulate the link dropping.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().hang_up();
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Number of `replace_consumer` calls so far.
    pub fn swap_count(&self) -> usize {
        self.state.lock().unwrap().swaps
    }

    /// Replies still queued.
    pub fn pending_replies(&self) -> usize {
        self.state.lock().unwrap().replies.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn write<'a>(&'a self, data: &'a [u8]) -> WriteFuture<'a> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(TransportError::Disconnected);
            }
            state.writes.push(data.to_vec());

            match state.replies.pop_front() {
                Some(Reply::Data(bytes)) => state.consumer.data_received(&bytes),
                Some(Reply::Hangup) => state.hang_up(),
                None => {}
            }
            Ok(())
        })
    }

    fn replace_consumer(&self, consumer: Box<dyn Consumer>) -> Box<dyn Consumer> {
        let mut state = self.state.lock().unwrap();
        state.swaps += 1;
        let previous = std::mem::replace(&mut state.consumer, consumer);
        if let Some(greeting) = state.greeting.take() {
            state.consumer.data_received(&greeting);
        }
        previous
    }
}

/// Consumer that records everything it receives, for asserting hand-off.
#[derive(Clone, Default)]
pub struct RecordingConsumer {
    received: Arc<Mutex<Vec<u8>>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

impl Consumer for RecordingConsumer {
    fn data_received(&mut self, data: &[u8]) {
        self.received.lock().unwrap().extend_from_slice(data);
    }
}
