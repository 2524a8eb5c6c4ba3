use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::reply::{decode_bool, decode_bulk_opt, decode_bytes_vec, decode_integer};

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

#[async_trait]
pub trait SetCommands: Dispatcher {
    async fn sadd(&self, key: &str, members: &[&[u8]]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"SADD", key.as_bytes()];
        parts.extend(members.iter().copied());
        let request = encode(parts);
        decode_integer(self.dispatch("SADD", ctx("SADD", key), request).await?)
    }

    async fn srem(&self, key: &str, members: &[&[u8]]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"SREM", key.as_bytes()];
        parts.extend(members.iter().copied());
        let request = encode(parts);
        decode_integer(self.dispatch("SREM", ctx("SREM", key), request).await?)
    }

    async fn scard(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["SCARD".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("SCARD", ctx("SCARD", key), request).await?)
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool> {
        validate_key(key)?;
        let request = encode([b"SISMEMBER".as_slice(), key.as_bytes(), member]);
        decode_bool(self.dispatch("SISMEMBER", ctx("SISMEMBER", key), request).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Bytes>> {
        validate_key(key)?;
        let request = encode(["SMEMBERS".as_bytes(), key.as_bytes()]);
        decode_bytes_vec(self.dispatch("SMEMBERS", ctx("SMEMBERS", key), request).await?)
    }

    async fn spop(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode(["SPOP".as_bytes(), key.as_bytes()]);
        decode_bulk_opt(self.dispatch("SPOP", ctx("SPOP", key), request).await?)
    }

    async fn srandmember(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode(["SRANDMEMBER".as_bytes(), key.as_bytes()]);
        decode_bulk_opt(self.dispatch("SRANDMEMBER", ctx("SRANDMEMBER", key), request).await?)
    }

    async fn sunion(&self, keys: &[&str]) -> Result<Vec<Bytes>> {
        for key in keys {
            validate_key(key)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"SUNION"];
        parts.extend(keys.iter().map(|k| k.as_bytes()));
        let request = encode(parts);
        let routing_key = keys.first().copied();
        decode_bytes_vec(self.dispatch("SUNION", DispatchContext::new(routing_key, false), request).await?)
    }

    async fn sinter(&self, keys: &[&str]) -> Result<Vec<Bytes>> {
        for key in keys {
            validate_key(key)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"SINTER"];
        parts.extend(keys.iter().map(|k| k.as_bytes()));
        let request = encode(parts);
        let routing_key = keys.first().copied();
        decode_bytes_vec(self.dispatch("SINTER", DispatchContext::new(routing_key, false), request).await?)
    }

    async fn sdiff(&self, keys: &[&str]) -> Result<Vec<Bytes>> {
        for key in keys {
            validate_key(key)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"SDIFF"];
        parts.extend(keys.iter().map(|k| k.as_bytes()));
        let request = encode(parts);
        let routing_key = keys.first().copied();
        decode_bytes_vec(self.dispatch("SDIFF", DispatchContext::new(routing_key, false), request).await?)
    }
}

impl<T: Dispatcher + ?Sized> SetCommands for T {}

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
    async fn sadd_decodes_integer() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Integer(3)]));
        assert_eq!(mock.sadd("s", &[b"a", b"b", b"c"]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn smembers_decodes_array() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("a"))),
            RespValue::BulkString(Some(Bytes::from("b"))),
        ]))]));
        let members = mock.smembers("s").await.unwrap();
        assert_eq!(members, vec![Bytes::from("a"), Bytes::from("b")]);
    }

    #[tokio::test]
    async fn sismember_decodes_bool() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Integer(0)]));
        assert!(!mock.sismember("s", b"a").await.unwrap());
    }
}
