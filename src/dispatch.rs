/// The seam between the typed command surface (`commands/*`) and whichever
/// routing strategy is in play: a single `DirectClient`, the cluster router,
/// or the replication router (§2, §4.4-4.7).
///
/// Every typed command method in `commands/*` is written once, generically
/// over `D: Dispatcher`, instead of being duplicated per routing strategy —
/// grounded on the blanket-trait pattern rustis uses to spread its command
/// surface across a single `MultiplexedClient` type
/// (`other_examples/.../multiplexed_client.rs`).
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::resp::RespValue;
use crate::value_codec::{RawCodec, ValueCodec};

/// Routing hint threaded from a typed command method down to whichever
/// `Dispatcher` handles it. Only `ClusterRouter` and `ReplicationRouter`
/// look at this; a plain `DirectClient` ignores it.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    /// The key the command operates on, when it has exactly one. Cluster
    /// routing hashes this to a slot; replication routing ignores it.
    pub key: Option<&'a str>,
    /// True for commands that must land on a master (§4.7). Read-only
    /// commands may be served by a replica.
    pub is_write: bool,
}

impl<'a> DispatchContext<'a> {
    pub fn new(key: Option<&'a str>, is_write: bool) -> Self {
        DispatchContext { key, is_write }
    }

    pub fn keyless(is_write: bool) -> Self {
        DispatchContext { key: None, is_write }
    }
}

/// Anything that can take an already-encoded command and return its reply,
/// already classified (§4.4 step 6): a non-MOVED/ASK `-`-prefixed reply has
/// already become `Err(Error::RedisError)` by the time it reaches a typed
/// command method.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, op: &'static str, ctx: DispatchContext<'_>, request: Bytes) -> Result<RespValue>;

    /// The codec the opaque-object command surface (§4.4 step 3, §6) should
    /// use to encode/decode values dispatched through this object. A plain
    /// `DirectClient` returns whatever codec it was built with; routers that
    /// fan out over several `DirectClient`s return the codec their pool
    /// shares. Defaults to a no-op passthrough for dispatchers that don't
    /// override it (e.g. test mocks).
    fn value_codec(&self) -> Arc<dyn ValueCodec> {
        Arc::new(RawCodec)
    }
}

/// Classify a raw reply per §4.4 step 6: a server `-`-prefixed error becomes
/// `Err(Error::RedisError)`. Callers that need to intercept MOVED/ASK before
/// this point (only `ClusterRouter` does) must do so against the raw
/// `RespValue` *before* calling this function.
pub fn classify_reply(value: RespValue) -> Result<RespValue> {
    match value {
        RespValue::Error(message) => Err(crate::error::Error::redis_error(message)),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reply_turns_error_into_redis_error() {
        let err = classify_reply(RespValue::Error("ERR bad".to_string())).unwrap_err();
        assert!(matches!(err, crate::error::Error::RedisError { .. }));
    }

    #[test]
    fn classify_reply_passes_through_non_error() {
        let value = classify_reply(RespValue::Integer(1)).unwrap();
        assert!(matches!(value, RespValue::Integer(1)));
    }
}
