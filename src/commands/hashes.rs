use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::{Error, Result};
use crate::reply::{decode_bool, decode_bulk_opt, decode_bytes_vec, decode_integer};
use crate::resp::RespValue;

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

#[async_trait]
pub trait HashCommands: Dispatcher {
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<bool> {
        validate_key(key)?;
        let request = encode([b"HSET".as_slice(), key.as_bytes(), field.as_bytes(), value]);
        decode_bool(self.dispatch("HSET", ctx("HSET", key), request).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode([b"HGET".as_slice(), key.as_bytes(), field.as_bytes()]);
        decode_bulk_opt(self.dispatch("HGET", ctx("HGET", key), request).await?)
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"HDEL", key.as_bytes()];
        parts.extend(fields.iter().map(|f| f.as_bytes()));
        let request = encode(parts);
        decode_integer(self.dispatch("HDEL", ctx("HDEL", key), request).await?)
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        validate_key(key)?;
        let request = encode([b"HEXISTS".as_slice(), key.as_bytes(), field.as_bytes()]);
        decode_bool(self.dispatch("HEXISTS", ctx("HEXISTS", key), request).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(Bytes, Bytes)>> {
        validate_key(key)?;
        let request = encode(["HGETALL".as_bytes(), key.as_bytes()]);
        let flat = decode_bytes_vec(self.dispatch("HGETALL", ctx("HGETALL", key), request).await?)?;
        if flat.len() % 2 != 0 {
            return Err(Error::unexpected("HGETALL reply had an odd element count"));
        }
        Ok(flat.chunks(2).map(|pair| (pair[0].clone(), pair[1].clone())).collect())
    }

    async fn hkeys(&self, key: &str) -> Result<Vec<Bytes>> {
        validate_key(key)?;
        let request = encode(["HKEYS".as_bytes(), key.as_bytes()]);
        decode_bytes_vec(self.dispatch("HKEYS", ctx("HKEYS", key), request).await?)
    }

    async fn hvals(&self, key: &str) -> Result<Vec<Bytes>> {
        validate_key(key)?;
        let request = encode(["HVALS".as_bytes(), key.as_bytes()]);
        decode_bytes_vec(self.dispatch("HVALS", ctx("HVALS", key), request).await?)
    }

    async fn hlen(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["HLEN".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("HLEN", ctx("HLEN", key), request).await?)
    }

    async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<Bytes>>> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"HMGET", key.as_bytes()];
        parts.extend(fields.iter().map(|f| f.as_bytes()));
        let request = encode(parts);
        let value = self.dispatch("HMGET", ctx("HMGET", key), request).await?;
        match value {
            RespValue::Array(Some(items)) => items.into_iter().map(decode_bulk_opt).collect(),
            RespValue::Array(None) => Ok(Vec::new()),
            other => Err(Error::unexpected(format!("expected array, got {:?}", other))),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        validate_key(key)?;
        let delta_s = delta.to_string();
        let request = encode([b"HINCRBY".as_slice(), key.as_bytes(), field.as_bytes(), delta_s.as_bytes()]);
        decode_integer(self.dispatch("HINCRBY", ctx("HINCRBY", key), request).await?)
    }

    async fn hincrbyfloat(&self, key: &str, field: &str, delta: f64) -> Result<f64> {
        validate_key(key)?;
        let delta_s = delta.to_string();
        let request = encode([b"HINCRBYFLOAT".as_slice(), key.as_bytes(), field.as_bytes(), delta_s.as_bytes()]);
        crate::reply::decode_float(self.dispatch("HINCRBYFLOAT", ctx("HINCRBYFLOAT", key), request).await?)
    }
}

impl<T: Dispatcher + ?Sized> HashCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockDispatcher(Mutex<Vec<RespValue>>);

    #[async_trait]
    impl Dispatcher for MockDispatcher {
        async fn dispatch(&self, _op: &'static str, _ctx: DispatchContext<'_>, _request: Bytes) -> Result<RespValue> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn hset_decodes_bool() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Integer(1)]));
        assert!(mock.hset("h", "f", b"v").await.unwrap());
    }

    #[tokio::test]
    async fn hgetall_regroups_pairs() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("f1"))),
            RespValue::BulkString(Some(Bytes::from("v1"))),
        ]))]));
        let pairs = mock.hgetall("h").await.unwrap();
        assert_eq!(pairs, vec![(Bytes::from("f1"), Bytes::from("v1"))]);
    }

    #[tokio::test]
    async fn hmget_preserves_nils() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("v"))),
            RespValue::BulkString(None),
        ]))]));
        let result = mock.hmget("h", &["a", "b"]).await.unwrap();
        assert_eq!(result, vec![Some(Bytes::from("v")), None]);
    }
}
