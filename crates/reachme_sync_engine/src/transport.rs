//! Transport layer abstraction for API requests.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use reachme_protocol::{ApiRequest, Command, ResponseBody};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Sends API requests and returns validated response bodies.
///
/// Implementations map "no response" to `NetworkFailure` and leave status
/// validation to [`ResponseBody`], so a rejected command surfaces as
/// `ServerRejected`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the response.
    async fn send(&self, request: &ApiRequest) -> SyncResult<ResponseBody>;
}

#[derive(Debug, Clone)]
enum Scripted {
    Body(Vec<u8>),
    Network(String),
}

/// A transport that replays scripted responses per command.
///
/// Responses for a command are consumed in order; the last one keeps
/// answering once the queue is down to it. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<Command, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    /// Creates a transport with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a JSON response for `command`.
    pub fn respond(&self, command: Command, body: Value) {
        self.push(command, Scripted::Body(body.to_string().into_bytes()));
    }

    /// Scripts a raw response body for `command`.
    pub fn respond_raw(&self, command: Command, body: impl Into<Vec<u8>>) {
        self.push(command, Scripted::Body(body.into()));
    }

    /// Scripts a network failure for `command`.
    pub fn fail(&self, command: Command, message: impl Into<String>) {
        self.push(command, Scripted::Network(message.into()));
    }

    /// Drops everything scripted for `command`.
    pub fn clear(&self, command: Command) {
        self.scripts.lock().remove(&command);
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Returns the requests sent for `command`.
    pub fn requests_for(&self, command: Command) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.command() == command)
            .cloned()
            .collect()
    }

    /// Returns how many requests were sent for `command`.
    pub fn request_count(&self, command: Command) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.command() == command)
            .count()
    }

    fn push(&self, command: Command, scripted: Scripted) {
        self.scripts
            .lock()
            .entry(command)
            .or_default()
            .push_back(scripted);
    }

    fn next(&self, command: Command) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(&command)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> SyncResult<ResponseBody> {
        self.requests.lock().push(request.clone());
        match self.next(request.command()) {
            Some(Scripted::Body(bytes)) => Ok(ResponseBody::from_slice(&bytes)?),
            Some(Scripted::Network(message)) => Err(SyncError::NetworkFailure(message)),
            None => Err(SyncError::network(format!(
                "no scripted response for {}",
                request.command()
            ))),
        }
    }
}
