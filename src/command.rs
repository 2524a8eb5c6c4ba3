/// A single in-flight request: pre-encoded request bytes plus a
/// single-assignment response slot.
///
/// A `Command` is created by the caller, handed to a [`crate::channel::Channel`]
/// for submission, and consumed by the caller exactly once via `wait`. The
/// reader task assigns the response (or the channel shuts it down early via
/// `close`); either way the slot can only be filled once.
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::resp::RespValue;

/// What a channel's reader task does with each wire-level reply it pops off
/// the in-flight FIFO. A plain `Command` expects exactly one reply; a
/// composite `AskingCommand` expects two (the `ASKING` ack, then the real
/// reply) and is pushed onto the FIFO twice by the channel.
pub trait WireCommand: Send + Sync {
    /// The bytes to write to the socket, already RESP-encoded.
    fn request_bytes(&self) -> &Bytes;

    /// How many FIFO slots / wire replies this command consumes.
    fn expected_replies(&self) -> usize {
        1
    }

    /// Whether the server is expected to reply to this command at all.
    fn has_response(&self) -> bool {
        true
    }

    /// Deliver one parsed reply. Called by the channel's reader task, once
    /// per `expected_replies()`.
    fn receive(&self, value: RespValue);

    /// Called when the channel shuts down with this command still pending.
    fn close(&self);
}

enum Outcome {
    Value(RespValue),
    Closed,
}

/// A plain command: one request, one reply.
pub struct Command {
    request_bytes: Bytes,
    has_response: bool,
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
    rx: Mutex<Option<oneshot::Receiver<Outcome>>>,
}

impl Command {
    pub fn new(request_bytes: Bytes) -> Self {
        Self::with_response_flag(request_bytes, true)
    }

    /// Construct a command that is never expected to receive a reply (the
    /// only case the spec calls for: fire-and-forget administrative pub/sub
    /// frames).
    pub fn fire_and_forget(request_bytes: Bytes) -> Self {
        Self::with_response_flag(request_bytes, false)
    }

    fn with_response_flag(request_bytes: Bytes, has_response: bool) -> Self {
        let (tx, rx) = oneshot::channel();
        Command {
            request_bytes,
            has_response,
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Wait up to `timeout` for the response. Returns `Error::Timeout` on
    /// expiry and `Error::IllegalState` if the channel closed the command
    /// first.
    pub async fn wait(&self, timeout: Duration) -> Result<RespValue> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("Command::wait called more than once");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Outcome::Value(v))) => Ok(v),
            Ok(Ok(Outcome::Closed)) => {
                Err(Error::illegal_state("channel closed before response arrived"))
            }
            Ok(Err(_recv_error)) => {
                Err(Error::illegal_state("response sender dropped without a reply"))
            }
            Err(_elapsed) => Err(Error::timeout("command wait")),
        }
    }
}

impl WireCommand for Command {
    fn request_bytes(&self) -> &Bytes {
        &self.request_bytes
    }

    fn has_response(&self) -> bool {
        self.has_response
    }

    fn receive(&self, value: RespValue) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(Outcome::Value(value));
        }
    }

    fn close(&self) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(Outcome::Closed);
        }
    }
}

/// `ASKING` + wrapped command, sent as two back-to-back writes on the same
/// connection. The first reply (the `ASKING` acknowledgement) is swallowed;
/// an error there is fatal and is forwarded to the caller in place of the
/// real response since the wrapped command could not have been honored.
/// Subsequent replies are forwarded to the wrapped command unchanged.
pub struct AskingCommand {
    combined_bytes: Bytes,
    ack_received: AtomicBool,
    ack_failed: AtomicBool,
    inner: std::sync::Arc<Command>,
}

impl AskingCommand {
    pub fn new(asking_bytes: Bytes, inner: std::sync::Arc<Command>) -> Self {
        let mut combined = Vec::with_capacity(asking_bytes.len() + inner.request_bytes().len());
        combined.extend_from_slice(&asking_bytes);
        combined.extend_from_slice(inner.request_bytes());
        AskingCommand {
            combined_bytes: Bytes::from(combined),
            ack_received: AtomicBool::new(false),
            ack_failed: AtomicBool::new(false),
            inner,
        }
    }

    pub fn into_inner(self) -> std::sync::Arc<Command> {
        self.inner
    }
}

impl WireCommand for AskingCommand {
    fn request_bytes(&self) -> &Bytes {
        &self.combined_bytes
    }

    fn expected_replies(&self) -> usize {
        2
    }

    fn receive(&self, value: RespValue) {
        if !self.ack_received.swap(true, Ordering::SeqCst) {
            if value.is_error() {
                self.ack_failed.store(true, Ordering::SeqCst);
                self.inner.receive(value);
            }
            return;
        }
        if self.ack_failed.load(Ordering::SeqCst) {
            // Inner command already resolved with the ASKING failure; the
            // real reply (if any) is discarded.
            return;
        }
        self.inner.receive(value);
    }

    fn close(&self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn wait_returns_delivered_value() {
        let cmd = Arc::new(Command::new(Bytes::from_static(b"*1\r\n$4\r\nPING\r\n")));
        let cmd2 = cmd.clone();
        tokio::spawn(async move {
            cmd2.receive(RespValue::SimpleString("PONG".to_string()));
        });
        let result = cmd.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(result, RespValue::SimpleString("PONG".to_string()));
    }

    #[tokio::test]
    async fn wait_times_out() {
        let cmd = Command::new(Bytes::from_static(b"*1\r\n$4\r\nPING\r\n"));
        let result = cmd.wait(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn close_unblocks_waiter_with_illegal_state() {
        let cmd = Command::new(Bytes::from_static(b"*1\r\n$4\r\nPING\r\n"));
        cmd.close();
        let result = cmd.wait(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::IllegalState { .. })));
    }

    #[tokio::test]
    async fn asking_command_swallows_ack_then_forwards() {
        let inner = Arc::new(Command::new(Bytes::from_static(b"*1\r\n$3\r\nGET\r\n")));
        let asking = AskingCommand::new(Bytes::from_static(b"*1\r\n$6\r\nASKING\r\n"), inner.clone());
        assert_eq!(asking.expected_replies(), 2);

        asking.receive(RespValue::SimpleString("OK".to_string()));
        asking.receive(RespValue::BulkString(Some(Bytes::from("value"))));

        let result = inner.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(result, RespValue::BulkString(Some(Bytes::from("value"))));
    }

    #[tokio::test]
    async fn asking_command_ack_error_is_fatal() {
        let inner = Arc::new(Command::new(Bytes::from_static(b"*1\r\n$3\r\nGET\r\n")));
        let asking = AskingCommand::new(Bytes::from_static(b"*1\r\n$6\r\nASKING\r\n"), inner.clone());

        asking.receive(RespValue::Error("ERR could not ask".to_string()));
        let result = inner.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(result, RespValue::Error("ERR could not ask".to_string()));
    }
}
