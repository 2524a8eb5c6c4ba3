/// A single TCP session: pipelined in-flight requests, a background reader,
/// heartbeat, and timeout/fault-driven self-closure (§4.3).
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::command::{AskingCommand, Command, WireCommand};
use crate::error::{Error, Result};
use crate::observer::Observer;
use crate::resp::{RespParser, RespValue};

/// A channel observes more than 50 timeouts where every consecutive pair is
/// within this window of each other before it self-closes (§4.3, §8).
const TIMEOUT_STORM_WINDOW: Duration = Duration::from_secs(1);
const TIMEOUT_STORM_THRESHOLD: u32 = 50;
const READ_BUF_INITIAL_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Running,
    Closed,
}

#[derive(Clone)]
pub struct ChannelConfig {
    pub connect_timeout: Duration,
    pub ping_period: Duration,
    pub ping_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            connect_timeout: Duration::from_secs(1),
            ping_period: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct TimeoutStormState {
    consecutive: u32,
    last_timeout: Option<Instant>,
}

type InFlight = Mutex<VecDeque<Arc<dyn WireCommand>>>;

/// One TCP session to one Redis host.
pub struct Channel {
    host: String,
    state: Mutex<ChannelState>,
    closing: AtomicBool,
    write_half: tokio::sync::Mutex<OwnedWriteHalf>,
    in_flight: InFlight,
    last_used: Mutex<Instant>,
    timeout_storm: Mutex<TimeoutStormState>,
    observer: Arc<dyn Observer>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// Open a TCP connection to `host`, verify it with a `PING`/`PONG`
    /// handshake, and spawn the background reader and heartbeat tasks.
    pub async fn connect(
        host: &str,
        config: ChannelConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Arc<Channel>> {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(host))
            .await
            .map_err(|_| Error::timeout(format!("connect to {}", host)))??;

        configure_stream(&stream)?;

        let mut stream = stream;
        handshake(&mut stream, config.ping_timeout).await?;

        let (read_half, write_half) = stream.into_split();

        let channel = Arc::new(Channel {
            host: host.to_string(),
            state: Mutex::new(ChannelState::Running),
            closing: AtomicBool::new(false),
            write_half: tokio::sync::Mutex::new(write_half),
            in_flight: Mutex::new(VecDeque::new()),
            last_used: Mutex::new(Instant::now()),
            timeout_storm: Mutex::new(TimeoutStormState::default()),
            observer,
            reader_handle: Mutex::new(None),
            heartbeat_handle: Mutex::new(None),
        });

        let reader_channel = channel.clone();
        let reader_handle = tokio::spawn(async move { reader_channel.run_reader(read_half).await });
        *channel.reader_handle.lock().unwrap() = Some(reader_handle);

        let heartbeat_channel = channel.clone();
        let ping_period = config.ping_period;
        let ping_timeout = config.ping_timeout;
        let heartbeat_handle =
            tokio::spawn(async move { heartbeat_channel.run_heartbeat(ping_period, ping_timeout).await });
        *channel.heartbeat_handle.lock().unwrap() = Some(heartbeat_handle);

        Ok(channel)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    pub fn is_available(&self) -> bool {
        self.state() == ChannelState::Running
    }

    /// Encode-free submission: write already-encoded `request_bytes` and
    /// wait up to `timeout` for the single reply.
    pub async fn call(&self, request_bytes: Bytes, timeout: Duration) -> Result<RespValue> {
        let command = Arc::new(Command::new(request_bytes));
        self.submit(command.clone()).await?;
        self.await_tracking_timeouts(&command, timeout).await
    }

    /// Fire-and-forget submission: no reply is expected, so there is
    /// nothing to wait for.
    pub async fn call_fire_and_forget(&self, request_bytes: Bytes) -> Result<()> {
        let command = Arc::new(Command::fire_and_forget(request_bytes));
        self.submit(command).await
    }

    /// Submit `ASKING` followed by `request_bytes` as a composite command on
    /// this connection, and wait for the wrapped command's reply (the
    /// `ASKING` acknowledgement is swallowed; see [`AskingCommand`]).
    pub async fn call_asking(
        &self,
        asking_bytes: Bytes,
        request_bytes: Bytes,
        timeout: Duration,
    ) -> Result<RespValue> {
        let inner = Arc::new(Command::new(request_bytes));
        let composite = Arc::new(AskingCommand::new(asking_bytes, inner.clone()));
        self.submit(composite).await?;
        self.await_tracking_timeouts(&inner, timeout).await
    }

    async fn await_tracking_timeouts(&self, command: &Command, timeout: Duration) -> Result<RespValue> {
        match command.wait(timeout).await {
            Ok(value) => Ok(value),
            Err(Error::Timeout { operation }) => {
                self.record_timeout();
                Err(Error::Timeout { operation })
            }
            Err(other) => Err(other),
        }
    }

    /// Push `command` onto the in-flight FIFO once per expected reply, then
    /// write its bytes, all under the single write-serialization lock so the
    /// FIFO order always matches the on-wire write order.
    async fn submit(&self, command: Arc<dyn WireCommand>) -> Result<()> {
        if !self.is_available() {
            return Err(Error::illegal_state(format!(
                "channel to {} is not running",
                self.host
            )));
        }

        let mut write_half = self.write_half.lock().await;

        if command.has_response() {
            let mut in_flight = self.in_flight.lock().unwrap();
            for _ in 0..command.expected_replies() {
                in_flight.push_back(command.clone());
            }
        }

        write_half
            .write_all(command.request_bytes())
            .await
            .map_err(|e| {
                self.shutdown("write error");
                Error::Network(e)
            })?;
        *self.last_used.lock().unwrap() = Instant::now();
        Ok(())
    }

    fn record_timeout(&self) {
        let mut storm = self.timeout_storm.lock().unwrap();
        let now = Instant::now();
        let within_window = storm
            .last_timeout
            .map(|last| now.duration_since(last) < TIMEOUT_STORM_WINDOW)
            .unwrap_or(false);

        if within_window || storm.last_timeout.is_none() {
            storm.consecutive += 1;
        } else {
            storm.consecutive = 1;
        }
        storm.last_timeout = Some(now);

        let should_close = storm.consecutive > TIMEOUT_STORM_THRESHOLD;
        drop(storm);

        if should_close {
            tracing::warn!(host = %self.host, "timeout storm detected, closing channel");
            self.shutdown("timeout storm");
        }
    }

    async fn run_reader(self: Arc<Self>, mut read_half: OwnedReadHalf) {
        let mut buf = BytesMut::with_capacity(READ_BUF_INITIAL_CAPACITY);
        loop {
            match read_half.read_buf(&mut buf).await {
                Ok(0) => {
                    tracing::info!(host = %self.host, "connection closed by peer");
                    self.shutdown("eof");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(host = %self.host, error = %e, "read error");
                    self.shutdown("read error");
                    return;
                }
            }

            loop {
                match RespParser::parse(&mut buf) {
                    Ok(Some(value)) => {
                        *self.last_used.lock().unwrap() = Instant::now();
                        let front = self.in_flight.lock().unwrap().pop_front();
                        match front {
                            Some(command) => command.receive(value),
                            None => {
                                tracing::warn!(host = %self.host, "reply with no matching in-flight command");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(host = %self.host, error = %e, "RESP parse error");
                        self.shutdown("parse error");
                        return;
                    }
                }
            }
        }
    }

    async fn run_heartbeat(self: Arc<Self>, ping_period: Duration, ping_timeout: Duration) {
        let mut ticker = tokio::time::interval(ping_period);
        loop {
            ticker.tick().await;
            if !self.is_available() {
                return;
            }
            let idle_for = self.last_used.lock().unwrap().elapsed();
            if idle_for < ping_period {
                continue;
            }
            let ping = crate::resp::RespEncoder::create_command("PING", &[]);
            match self.call(ping, ping_timeout).await {
                Ok(_) => {}
                Err(Error::IllegalState { .. }) => return,
                Err(e) => {
                    tracing::warn!(host = %self.host, error = %e, "heartbeat ping failed");
                }
            }
        }
    }

    fn shutdown(&self, reason: &str) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(host = %self.host, reason, "closing channel");
        *self.state.lock().unwrap() = ChannelState::Closed;
        self.observer.on_closed(&self.host);

        let mut in_flight = self.in_flight.lock().unwrap();
        while let Some(command) = in_flight.pop_front() {
            command.close();
        }
    }

    pub async fn close(&self) {
        self.shutdown("explicit close");
        if let Some(handle) = self.reader_handle.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.heartbeat_handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

fn configure_stream(stream: &TcpStream) -> Result<()> {
    let sock = SockRef::from(stream);
    sock.set_tcp_nodelay(true)?;
    Ok(())
}

async fn handshake(stream: &mut TcpStream, timeout: Duration) -> Result<()> {
    let ping = crate::resp::RespEncoder::create_command("PING", &[]);
    tokio::time::timeout(timeout, stream.write_all(&ping))
        .await
        .map_err(|_| Error::timeout("handshake write"))??;

    let mut buf = BytesMut::with_capacity(64);
    loop {
        let read = tokio::time::timeout(timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|_| Error::timeout("handshake read"))??;
        if read == 0 {
            return Err(Error::unexpected("connection closed during handshake"));
        }
        if let Some(value) = RespParser::parse(&mut buf)? {
            return match value {
                RespValue::SimpleString(s) if s == "PONG" => Ok(()),
                other => Err(Error::unexpected(format!(
                    "unexpected handshake reply: {:?}",
                    other
                ))),
            };
        }
    }
}
