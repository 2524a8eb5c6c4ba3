use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::reply::{decode_bulk_opt, decode_bytes_vec, decode_integer, decode_ok};

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

#[async_trait]
pub trait ListCommands: Dispatcher {
    async fn lpush(&self, key: &str, values: &[&[u8]]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"LPUSH", key.as_bytes()];
        parts.extend(values.iter().copied());
        let request = encode(parts);
        decode_integer(self.dispatch("LPUSH", ctx("LPUSH", key), request).await?)
    }

    async fn rpush(&self, key: &str, values: &[&[u8]]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"RPUSH", key.as_bytes()];
        parts.extend(values.iter().copied());
        let request = encode(parts);
        decode_integer(self.dispatch("RPUSH", ctx("RPUSH", key), request).await?)
    }

    async fn lpop(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode(["LPOP".as_bytes(), key.as_bytes()]);
        decode_bulk_opt(self.dispatch("LPOP", ctx("LPOP", key), request).await?)
    }

    async fn rpop(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode(["RPOP".as_bytes(), key.as_bytes()]);
        decode_bulk_opt(self.dispatch("RPOP", ctx("RPOP", key), request).await?)
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["LLEN".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("LLEN", ctx("LLEN", key), request).await?)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        validate_key(key)?;
        let start_s = start.to_string();
        let stop_s = stop.to_string();
        let request = encode([b"LRANGE".as_slice(), key.as_bytes(), start_s.as_bytes(), stop_s.as_bytes()]);
        decode_bytes_vec(self.dispatch("LRANGE", ctx("LRANGE", key), request).await?)
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let index_s = index.to_string();
        let request = encode([b"LINDEX".as_slice(), key.as_bytes(), index_s.as_bytes()]);
        decode_bulk_opt(self.dispatch("LINDEX", ctx("LINDEX", key), request).await?)
    }

    async fn lset(&self, key: &str, index: i64, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        let index_s = index.to_string();
        let request = encode([b"LSET".as_slice(), key.as_bytes(), index_s.as_bytes(), value]);
        decode_ok(self.dispatch("LSET", ctx("LSET", key), request).await?)
    }

    async fn lrem(&self, key: &str, count: i64, value: &[u8]) -> Result<i64> {
        validate_key(key)?;
        let count_s = count.to_string();
        let request = encode([b"LREM".as_slice(), key.as_bytes(), count_s.as_bytes(), value]);
        decode_integer(self.dispatch("LREM", ctx("LREM", key), request).await?)
    }
}

impl<T: Dispatcher + ?Sized> ListCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::RespValue;
    use std::sync::Mutex;

    struct MockDispatcher(Mutex<Vec<RespValue>>);

    #[async_trait]
    impl Dispatcher for MockDispatcher {
        async fn dispatch(&self, _op: &'static str, _ctx: DispatchContext<'_>, _request: Bytes) -> Result<RespValue> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn lpush_decodes_integer() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Integer(2)]));
        assert_eq!(mock.lpush("l", &[b"a", b"b"]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lrange_decodes_array() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![RespValue::BulkString(Some(Bytes::from("x")))]))]));
        assert_eq!(mock.lrange("l", 0, -1).await.unwrap(), vec![Bytes::from("x")]);
    }

    #[tokio::test]
    async fn lpop_decodes_nil() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::BulkString(None)]));
        assert_eq!(mock.lpop("l").await.unwrap(), None);
    }
}
