/// Opaque-object GET/SET (§4.4 step 3, §6): the same wire commands as
/// [`crate::commands::StringCommands`], but the value passes through
/// whichever [`crate::value_codec::ValueCodec`] the dispatcher returns from
/// `value_codec()` before being sent and after being read back. Callers that
/// need the stored bytes to be readable by another client verbatim should
/// use `StringCommands` instead, which never touches the codec.
use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::strings::SetOptions;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::reply::decode_bulk_opt;

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

#[async_trait]
pub trait ObjectCommands: Dispatcher {
    async fn object_get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode(["GET".as_bytes(), key.as_bytes()]);
        let value = self.dispatch("GET", ctx("GET", key), request).await?;
        match decode_bulk_opt(value)? {
            Some(stored) => Ok(Some(self.value_codec().decode(&stored)?)),
            None => Ok(None),
        }
    }

    async fn object_mget(&self, keys: &[&str]) -> Result<Vec<Option<Bytes>>> {
        for key in keys {
            validate_key(key)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"MGET"];
        parts.extend(keys.iter().map(|k| k.as_bytes()));
        let request = encode(parts);
        let routing_key = keys.first().copied();
        let value = self
            .dispatch("MGET", DispatchContext::new(routing_key, false), request)
            .await?;
        let raw = crate::reply::decode_bulk_array(value)?;
        let codec = self.value_codec();
        raw.into_iter()
            .map(|entry| entry.map(|b| codec.decode(&b)).transpose())
            .collect()
    }

    /// Set an opaque object, honoring the same expiry/condition flags as
    /// [`crate::commands::StringCommands::set`]. Returns `false` when a
    /// conditional `SET` (`only_if_absent`/`only_if_present`) was not
    /// applied.
    async fn object_set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<bool> {
        validate_key(key)?;
        let encoded = self.value_codec().encode(value)?;
        let mut parts: Vec<&[u8]> = vec![b"SET", key.as_bytes(), &encoded];
        let ex_str;
        let px_str;
        if let Some(secs) = options.expire_seconds {
            ex_str = secs.to_string();
            parts.push(b"EX");
            parts.push(ex_str.as_bytes());
        }
        if let Some(millis) = options.expire_millis {
            px_str = millis.to_string();
            parts.push(b"PX");
            parts.push(px_str.as_bytes());
        }
        if options.only_if_absent {
            parts.push(b"NX");
        }
        if options.only_if_present {
            parts.push(b"XX");
        }
        let request = encode(parts);
        let value = self.dispatch("SET", ctx("SET", key), request).await?;
        match decode_bulk_opt(value.clone()) {
            Ok(None) => Ok(false),
            _ => {
                crate::reply::decode_ok(value)?;
                Ok(true)
            }
        }
    }
}

impl<T: Dispatcher + ?Sized> ObjectCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::RespValue;
    use crate::value_codec::{CompressingCodec, ValueCodec};
    use std::sync::{Arc, Mutex};

    /// A mock that applies a real `CompressingCodec` instead of the default
    /// passthrough, so these tests exercise the codec wiring rather than
    /// just the request/reply shape.
    struct CompressingMock {
        replies: Mutex<Vec<RespValue>>,
        seen_requests: Mutex<Vec<Bytes>>,
        codec: Arc<dyn ValueCodec>,
    }

    impl CompressingMock {
        fn new(replies: Vec<RespValue>) -> Self {
            CompressingMock {
                replies: Mutex::new(replies),
                seen_requests: Mutex::new(Vec::new()),
                codec: Arc::new(CompressingCodec::new(8)),
            }
        }
    }

    #[async_trait]
    impl Dispatcher for CompressingMock {
        async fn dispatch(&self, _op: &'static str, _ctx: DispatchContext<'_>, request: Bytes) -> Result<RespValue> {
            self.seen_requests.lock().unwrap().push(request);
            Ok(self.replies.lock().unwrap().remove(0))
        }

        fn value_codec(&self) -> Arc<dyn ValueCodec> {
            self.codec.clone()
        }
    }

    #[tokio::test]
    async fn object_set_then_get_round_trips_through_compression() {
        let value = vec![b'z'; 256];
        let encoded = CompressingCodec::new(8).encode(&value).unwrap();
        assert_eq!(encoded[0], 1, "256 identical bytes should compress past an 8-byte threshold");

        let mock = CompressingMock::new(vec![
            RespValue::SimpleString("OK".to_string()),
            RespValue::BulkString(Some(encoded)),
        ]);
        let applied = mock.object_set("k", &value, &SetOptions::default()).await.unwrap();
        assert!(applied);

        let sent = mock.seen_requests.lock().unwrap().remove(0);
        // The wire request must carry the compressed bytes, not the raw value.
        assert!(!sent.windows(value.len()).any(|w| w == value.as_slice()));

        let round_tripped = mock.object_get("k").await.unwrap();
        assert_eq!(round_tripped, Some(Bytes::from(value)));
    }

    #[tokio::test]
    async fn object_get_passes_through_missing_key() {
        let mock = CompressingMock::new(vec![RespValue::BulkString(None)]);
        assert_eq!(mock.object_get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn object_mget_decodes_each_present_entry() {
        let small = CompressingCodec::new(8).encode(b"hi").unwrap();
        let mock = CompressingMock::new(vec![RespValue::Array(Some(vec![
            RespValue::BulkString(Some(small)),
            RespValue::BulkString(None),
        ]))]);
        let result = mock.object_mget(&["a", "missing"]).await.unwrap();
        assert_eq!(result, vec![Some(Bytes::from_static(b"hi")), None]);
    }
}
