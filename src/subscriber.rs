/// Dedicated pub/sub session: once a connection issues `SUBSCRIBE`/
/// `PSUBSCRIBE` it can carry no other command, so this does not reuse
/// [`crate::channel::Channel`]'s request/reply FIFO — frames arrive
/// unprompted and are dispatched to registered handlers instead (§4.8).
///
/// Reconnect-and-resubscribe loop grounded on `client_pool.rs`'s
/// `run_rebuild_loop` periodic-retry idiom (itself carried from the
/// teacher's now-deleted `health/mod.rs` health-checker).
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observer::Observer;
use crate::resp::{RespParser, RespValue};

pub type ChannelHandler = Arc<dyn Fn(Bytes) + Send + Sync>;
pub type PatternHandler = Arc<dyn Fn(String, Bytes) + Send + Sync>;

/// How pub/sub frames are dispatched to handlers once parsed off the wire.
#[derive(Clone)]
pub enum DispatchMode {
    /// Handlers run synchronously on the reader task; they must not block.
    Inline,
    /// Each frame is handed to a bounded pool of `n` worker tasks, isolating
    /// handler latency from the reader.
    WorkerPool(usize),
}

enum DispatchJob {
    Channel(ChannelHandler, Bytes),
    Pattern(PatternHandler, String, Bytes),
}

impl DispatchJob {
    fn run(self) {
        match self {
            DispatchJob::Channel(handler, payload) => handler(payload),
            DispatchJob::Pattern(handler, channel, payload) => handler(channel, payload),
        }
    }
}

const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);
const READ_BUF_INITIAL_CAPACITY: usize = 8 * 1024;

pub struct Subscriber {
    host: String,
    config: ClientConfig,
    observer: Arc<dyn Observer>,
    channels: Arc<RwLock<HashMap<String, ChannelHandler>>>,
    patterns: Arc<RwLock<HashMap<String, PatternHandler>>>,
    write_half: Arc<Mutex<Option<OwnedWriteHalf>>>,
    job_tx: Option<mpsc::Sender<DispatchJob>>,
    closing: Arc<AtomicBool>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Subscriber {
    /// Connect and start the background receive loop. Channels/patterns are
    /// registered afterwards via `subscribe`/`psubscribe`.
    pub async fn connect(
        host: String,
        config: ClientConfig,
        observer: Arc<dyn Observer>,
        dispatch_mode: DispatchMode,
    ) -> Result<Arc<Self>> {
        let (job_tx, workers) = match dispatch_mode {
            DispatchMode::Inline => (None, Vec::new()),
            DispatchMode::WorkerPool(n) => {
                let n = n.max(1);
                let (tx, rx) = mpsc::channel::<DispatchJob>(1024);
                let rx = Arc::new(Mutex::new(rx));
                let mut handles = Vec::with_capacity(n);
                for _ in 0..n {
                    let rx = rx.clone();
                    handles.push(tokio::spawn(async move {
                        loop {
                            let job = rx.lock().await.recv().await;
                            match job {
                                Some(job) => job.run(),
                                None => return,
                            }
                        }
                    }));
                }
                (Some(tx), handles)
            }
        };

        let subscriber = Arc::new(Subscriber {
            host,
            config,
            observer,
            channels: Arc::new(RwLock::new(HashMap::new())),
            patterns: Arc::new(RwLock::new(HashMap::new())),
            write_half: Arc::new(Mutex::new(None)),
            job_tx,
            closing: Arc::new(AtomicBool::new(false)),
            reader_handle: Mutex::new(None),
            worker_handles: Mutex::new(workers),
        });

        let read_half = subscriber.reconnect().await?;

        let loop_subscriber = subscriber.clone();
        let handle = tokio::spawn(async move { loop_subscriber.run_loop(read_half).await });
        *subscriber.reader_handle.lock().await = Some(handle);

        Ok(subscriber)
    }

    /// Register a channel handler and, if connected, subscribe immediately;
    /// otherwise it is picked up on the next (re)connect.
    pub async fn subscribe(&self, channel: &str, handler: ChannelHandler) -> Result<()> {
        self.channels.write().await.insert(channel.to_string(), handler);
        self.send_if_connected("SUBSCRIBE", channel).await
    }

    pub async fn psubscribe(&self, pattern: &str, handler: PatternHandler) -> Result<()> {
        self.patterns.write().await.insert(pattern.to_string(), handler);
        self.send_if_connected("PSUBSCRIBE", pattern).await
    }

    async fn send_if_connected(&self, command: &str, name: &str) -> Result<()> {
        let mut guard = self.write_half.lock().await;
        if let Some(write_half) = guard.as_mut() {
            let bytes = crate::resp::RespEncoder::create_command(command, &[name]);
            if write_half.write_all(&bytes).await.is_err() {
                *guard = None;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle.abort();
        }
        for handle in self.worker_handles.lock().await.drain(..) {
            handle.abort();
        }
        *self.write_half.lock().await = None;
    }

    /// Drive one connection to exhaustion, then reconnect-and-resubscribe
    /// with a fixed backoff, repeating until `close` is called.
    async fn run_loop(self: Arc<Self>, mut read_half: OwnedReadHalf) {
        loop {
            if self.closing.load(Ordering::SeqCst) {
                return;
            }

            if let Err(e) = self.read_until_error(&mut read_half).await {
                tracing::warn!(host = %self.host, error = %e, "subscriber connection lost");
            }

            if self.closing.load(Ordering::SeqCst) {
                return;
            }

            *self.write_half.lock().await = None;
            tokio::time::sleep(RECONNECT_BACKOFF).await;

            match self.reconnect().await {
                Ok(new_read_half) => read_half = new_read_half,
                Err(e) => {
                    tracing::warn!(host = %self.host, error = %e, "subscriber reconnect failed");
                }
            }
        }
    }

    /// Open a fresh connection and re-issue `SUBSCRIBE`/`PSUBSCRIBE` for
    /// everything currently registered. Duplicate delivery across a
    /// reconnect is possible and accepted (§4.8, at-least-once).
    async fn reconnect(&self) -> Result<OwnedReadHalf> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&self.host))
            .await
            .map_err(|_| Error::timeout(format!("connect to {}", self.host)))??;
        let (read_half, mut write_half) = stream.into_split();

        let channel_names: Vec<String> = self.channels.read().await.keys().cloned().collect();
        let pattern_names: Vec<String> = self.patterns.read().await.keys().cloned().collect();

        if !channel_names.is_empty() {
            let mut parts: Vec<&[u8]> = vec![b"SUBSCRIBE"];
            parts.extend(channel_names.iter().map(|c| c.as_bytes()));
            write_half.write_all(&crate::commands::encode(parts)).await?;
        }
        if !pattern_names.is_empty() {
            let mut parts: Vec<&[u8]> = vec![b"PSUBSCRIBE"];
            parts.extend(pattern_names.iter().map(|p| p.as_bytes()));
            write_half.write_all(&crate::commands::encode(parts)).await?;
        }

        *self.write_half.lock().await = Some(write_half);
        self.observer.on_created(&self.host);
        Ok(read_half)
    }

    async fn read_until_error(&self, read_half: &mut OwnedReadHalf) -> Result<()> {
        use tokio::io::AsyncReadExt;

        let mut buf = BytesMut::with_capacity(READ_BUF_INITIAL_CAPACITY);
        loop {
            let read = read_half.read_buf(&mut buf).await?;
            if read == 0 {
                return Err(Error::unexpected("subscriber connection closed by peer"));
            }
            loop {
                match RespParser::parse(&mut buf)? {
                    Some(value) => self.dispatch_frame(value).await?,
                    None => break,
                }
            }
        }
    }

    async fn dispatch_frame(&self, value: RespValue) -> Result<()> {
        let elements = match value {
            RespValue::Array(Some(elements)) => elements,
            other => return Err(Error::unexpected(format!("expected pub/sub frame array, got {:?}", other))),
        };
        if elements.is_empty() {
            return Ok(());
        }
        let kind = match &elements[0] {
            RespValue::BulkString(Some(b)) => String::from_utf8_lossy(b).to_string(),
            other => return Err(Error::unexpected(format!("malformed pub/sub frame kind: {:?}", other))),
        };

        match kind.as_str() {
            "message" if elements.len() == 3 => {
                let channel = bulk_string(&elements[1])?;
                let payload = bulk_bytes(&elements[2])?;
                if let Some(handler) = self.channels.read().await.get(&channel).cloned() {
                    self.run_job(DispatchJob::Channel(handler, payload)).await;
                }
            }
            "pmessage" if elements.len() == 4 => {
                let pattern = bulk_string(&elements[1])?;
                let channel = bulk_string(&elements[2])?;
                let payload = bulk_bytes(&elements[3])?;
                if let Some(handler) = self.patterns.read().await.get(&pattern).cloned() {
                    self.run_job(DispatchJob::Pattern(handler, channel, payload)).await;
                }
            }
            "subscribe" | "unsubscribe" | "psubscribe" | "punsubscribe" => {
                tracing::debug!(kind = %kind, "pub/sub session state update");
            }
            other => {
                tracing::warn!(kind = %other, "unrecognized pub/sub frame kind");
            }
        }
        Ok(())
    }

    async fn run_job(&self, job: DispatchJob) {
        match &self.job_tx {
            Some(tx) => {
                if tx.send(job).await.is_err() {
                    tracing::warn!(host = %self.host, "subscriber worker pool channel closed");
                }
            }
            None => job.run(),
        }
    }
}

fn bulk_string(value: &RespValue) -> Result<String> {
    match value {
        RespValue::BulkString(Some(b)) => Ok(String::from_utf8_lossy(b).to_string()),
        other => Err(Error::unexpected(format!("expected bulk string, got {:?}", other))),
    }
}

fn bulk_bytes(value: &RespValue) -> Result<Bytes> {
    match value {
        RespValue::BulkString(Some(b)) => Ok(b.clone()),
        other => Err(Error::unexpected(format!("expected bulk string, got {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn test_subscriber(job_tx: Option<mpsc::Sender<DispatchJob>>) -> Subscriber {
        Subscriber {
            host: "test".to_string(),
            config: ClientConfig::default(),
            observer: Arc::new(crate::observer::NoopObserver),
            channels: Arc::new(RwLock::new(HashMap::new())),
            patterns: Arc::new(RwLock::new(HashMap::new())),
            write_half: Arc::new(Mutex::new(None)),
            job_tx,
            closing: Arc::new(AtomicBool::new(false)),
            reader_handle: Mutex::new(None),
            worker_handles: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn dispatch_frame_invokes_channel_handler() {
        let subscriber = test_subscriber(None);

        let received = Arc::new(AtomicU32::new(0));
        let received_clone = received.clone();
        let handler: ChannelHandler = Arc::new(move |_payload| {
            received_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscriber.channels.write().await.insert("news".to_string(), handler);

        let frame = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("message"))),
            RespValue::BulkString(Some(Bytes::from("news"))),
            RespValue::BulkString(Some(Bytes::from("hello"))),
        ]));
        subscriber.dispatch_frame(frame).await.unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_frame_ignores_unregistered_channel() {
        let subscriber = test_subscriber(None);
        let frame = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("message"))),
            RespValue::BulkString(Some(Bytes::from("unregistered"))),
            RespValue::BulkString(Some(Bytes::from("hello"))),
        ]));
        subscriber.dispatch_frame(frame).await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_frame_invokes_pattern_handler_with_channel_name() {
        let subscriber = test_subscriber(None);

        let received_channel = Arc::new(std::sync::Mutex::new(String::new()));
        let received_channel_clone = received_channel.clone();
        let handler: PatternHandler = Arc::new(move |channel, _payload| {
            *received_channel_clone.lock().unwrap() = channel;
        });
        subscriber.patterns.write().await.insert("news.*".to_string(), handler);

        let frame = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("pmessage"))),
            RespValue::BulkString(Some(Bytes::from("news.*"))),
            RespValue::BulkString(Some(Bytes::from("news.sports"))),
            RespValue::BulkString(Some(Bytes::from("payload"))),
        ]));
        subscriber.dispatch_frame(frame).await.unwrap();
        assert_eq!(*received_channel.lock().unwrap(), "news.sports");
    }

    #[tokio::test]
    async fn subscribe_acks_are_ignored_not_errored() {
        let subscriber = test_subscriber(None);
        let frame = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("subscribe"))),
            RespValue::BulkString(Some(Bytes::from("news"))),
            RespValue::Integer(1),
        ]));
        subscriber.dispatch_frame(frame).await.unwrap();
    }
}
