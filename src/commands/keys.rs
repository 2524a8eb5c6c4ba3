use async_trait::async_trait;

use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::reply::{decode_bool, decode_integer, decode_ok};

fn ctx(key: &str, is_write: bool) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write)
}

#[async_trait]
pub trait KeyCommands: Dispatcher {
    async fn del(&self, keys: &[&str]) -> Result<i64> {
        for key in keys {
            validate_key(key)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"DEL"];
        parts.extend(keys.iter().map(|k| k.as_bytes()));
        let request = encode(parts);
        let routing_key = keys.first().copied().unwrap_or("");
        decode_integer(self.dispatch("DEL", ctx(routing_key, true), request).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let request = encode(["EXISTS".as_bytes(), key.as_bytes()]);
        decode_bool(self.dispatch("EXISTS", ctx(key, false), request).await?)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        validate_key(key)?;
        let seconds_s = seconds.to_string();
        let request = encode(["EXPIRE".as_bytes(), key.as_bytes(), seconds_s.as_bytes()]);
        decode_bool(self.dispatch("EXPIRE", ctx(key, true), request).await?)
    }

    async fn pexpire(&self, key: &str, millis: u64) -> Result<bool> {
        validate_key(key)?;
        let millis_s = millis.to_string();
        let request = encode(["PEXPIRE".as_bytes(), key.as_bytes(), millis_s.as_bytes()]);
        decode_bool(self.dispatch("PEXPIRE", ctx(key, true), request).await?)
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["TTL".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("TTL", ctx(key, false), request).await?)
    }

    async fn pttl(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["PTTL".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("PTTL", ctx(key, false), request).await?)
    }

    async fn persist(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let request = encode(["PERSIST".as_bytes(), key.as_bytes()]);
        decode_bool(self.dispatch("PERSIST", ctx(key, true), request).await?)
    }

    async fn key_type(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        let request = encode(["TYPE".as_bytes(), key.as_bytes()]);
        match self.dispatch("TYPE", ctx(key, false), request).await? {
            crate::resp::RespValue::SimpleString(s) => Ok(s),
            other => Err(crate::error::Error::unexpected(format!("expected simple string TYPE reply, got {:?}", other))),
        }
    }

    async fn rename(&self, key: &str, new_key: &str) -> Result<()> {
        validate_key(key)?;
        validate_key(new_key)?;
        let request = encode(["RENAME".as_bytes(), key.as_bytes(), new_key.as_bytes()]);
        decode_ok(self.dispatch("RENAME", ctx(key, true), request).await?)
    }
}

impl<T: Dispatcher + ?Sized> KeyCommands for T {}
