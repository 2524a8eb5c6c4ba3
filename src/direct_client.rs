/// A typed command surface bound to a single [`Channel`] (§4.4).
///
/// `DirectClient` is the `Dispatcher` that every other routing layer
/// (`ClusterRouter`, `ReplicationRouter`) ultimately bottoms out on — it owns
/// no routing logic of its own, it just validates arguments, writes the
/// encoded command, classifies the reply, and records observer events.
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

use crate::channel::{Channel, ChannelConfig};
use crate::config::ClientConfig;
use crate::dispatch::{classify_reply, DispatchContext, Dispatcher};
use crate::error::{Error, Result};
use crate::observer::{NoopObserver, Observer};
use crate::resp::RespValue;
use crate::value_codec::{CompressingCodec, ValueCodec};

pub struct DirectClient {
    channel: Arc<Channel>,
    codec: Arc<dyn ValueCodec>,
    compression_threshold: usize,
    operation_timeout: Duration,
    slow_execution_threshold: Duration,
    observer: Arc<dyn Observer>,
}

impl DirectClient {
    pub async fn connect(host: &str, config: &ClientConfig, observer: Arc<dyn Observer>) -> Result<Self> {
        let channel_config = ChannelConfig {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            ping_period: Duration::from_millis(config.ping_period_ms),
            ping_timeout: Duration::from_millis(config.operation_timeout_ms),
        };
        let channel = Channel::connect(host, channel_config, observer.clone()).await?;
        observer.on_created(host);
        Ok(DirectClient {
            channel,
            codec: Arc::new(CompressingCodec::new(config.compression_threshold_bytes)),
            compression_threshold: config.compression_threshold_bytes,
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
            slow_execution_threshold: Duration::from_millis(config.slow_execution_threshold_ms),
            observer,
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn host(&self) -> &str {
        self.channel.host()
    }

    pub fn is_available(&self) -> bool {
        self.channel.is_available()
    }

    pub fn codec(&self) -> &Arc<dyn ValueCodec> {
        &self.codec
    }

    /// Payload size, in bytes, above which this client's codec compresses
    /// (§3 data model). Exposed for callers that need to decide whether a
    /// value is worth pre-compressing before handing it to the codec.
    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }

    pub async fn close(&self) {
        self.channel.close().await;
    }

    /// Raw dispatch with no error classification: used internally by
    /// [`Dispatcher::dispatch`] and directly by `ClusterRouter`, which must
    /// inspect the raw reply for MOVED/ASK before classification happens.
    pub async fn execute_raw(&self, op: &'static str, request: Bytes) -> Result<RespValue> {
        if !self.channel.is_available() {
            let err = Error::illegal_state(format!("no available channel to {}", self.host()));
            self.observer.record_error(err.class());
            return Err(err);
        }

        let start = Instant::now();
        let result = self.channel.call(request, self.operation_timeout).await;
        let elapsed = start.elapsed();

        if elapsed >= self.slow_execution_threshold {
            self.observer.record_slow_call(op, elapsed.as_millis() as u64);
        }
        if let Err(e) = &result {
            self.observer.record_error(e.class());
        }
        result
    }

    /// `ASKING` + the wrapped command as one composite, for cluster ASK
    /// redirection (§4.6).
    pub async fn execute_asking(&self, request: Bytes) -> Result<RespValue> {
        let asking = crate::resp::RespEncoder::create_command("ASKING", &[]);
        self.channel
            .call_asking(asking, request, self.operation_timeout)
            .await
    }
}

#[async_trait]
impl Dispatcher for DirectClient {
    async fn dispatch(&self, op: &'static str, _ctx: DispatchContext<'_>, request: Bytes) -> Result<RespValue> {
        let raw = self.execute_raw(op, request).await?;
        let classified = classify_reply(raw);
        if let Err(e) = &classified {
            self.observer.record_error(e.class());
        }
        classified
    }

    fn value_codec(&self) -> Arc<dyn ValueCodec> {
        self.codec.clone()
    }
}

pub fn noop_observer() -> Arc<dyn Observer> {
    Arc::new(NoopObserver)
}

#[cfg(test)]
mod tests {
    use super::*;

    // DirectClient::connect requires a live TCP peer; the behavior covered
    // here (argument-free construction paths) is exercised indirectly by the
    // command trait tests against a mock Dispatcher instead. See
    // `commands::tests` for the typed-method coverage.
    #[test]
    fn noop_observer_is_constructible() {
        let _observer = noop_observer();
    }
}
