use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::reply::{decode_bulk_array, decode_bulk_opt, decode_integer, decode_ok};

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

/// Options accepted by [`StringCommands::set`], mirroring Redis's `SET`
/// condition/expiry flags.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub expire_seconds: Option<u64>,
    pub expire_millis: Option<u64>,
    pub only_if_absent: bool,
    pub only_if_present: bool,
}

#[async_trait]
pub trait StringCommands: Dispatcher {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode(["GET".as_bytes(), key.as_bytes()]);
        let value = self.dispatch("GET", ctx("GET", key), request).await?;
        decode_bulk_opt(value)
    }

    async fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<bool> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"SET", key.as_bytes(), value];
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
        // A conditional SET that was not applied replies with a nil bulk
        // rather than +OK; an unconditional SET always replies +OK.
        match decode_bulk_opt(value.clone()) {
            Ok(None) => Ok(false),
            _ => {
                decode_ok(value)?;
                Ok(true)
            }
        }
    }

    async fn setnx(&self, key: &str, value: &[u8]) -> Result<bool> {
        validate_key(key)?;
        let request = encode([b"SETNX".as_slice(), key.as_bytes(), value]);
        let value = self.dispatch("SETNX", ctx("SETNX", key), request).await?;
        crate::reply::decode_bool(value)
    }

    async fn getset(&self, key: &str, value: &[u8]) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let request = encode([b"GETSET".as_slice(), key.as_bytes(), value]);
        let value = self.dispatch("GETSET", ctx("GETSET", key), request).await?;
        decode_bulk_opt(value)
    }

    async fn append(&self, key: &str, value: &[u8]) -> Result<i64> {
        validate_key(key)?;
        let request = encode([b"APPEND".as_slice(), key.as_bytes(), value]);
        let value = self.dispatch("APPEND", ctx("APPEND", key), request).await?;
        decode_integer(value)
    }

    async fn strlen(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["STRLEN".as_bytes(), key.as_bytes()]);
        let value = self.dispatch("STRLEN", ctx("STRLEN", key), request).await?;
        decode_integer(value)
    }

    async fn getrange(&self, key: &str, start: i64, end: i64) -> Result<Bytes> {
        validate_key(key)?;
        let start_s = start.to_string();
        let end_s = end.to_string();
        let request = encode([b"GETRANGE".as_slice(), key.as_bytes(), start_s.as_bytes(), end_s.as_bytes()]);
        let value = self.dispatch("GETRANGE", ctx("GETRANGE", key), request).await?;
        Ok(decode_bulk_opt(value)?.unwrap_or_default())
    }

    async fn setrange(&self, key: &str, offset: i64, value: &[u8]) -> Result<i64> {
        validate_key(key)?;
        let offset_s = offset.to_string();
        let request = encode([b"SETRANGE".as_slice(), key.as_bytes(), offset_s.as_bytes(), value]);
        let value = self.dispatch("SETRANGE", ctx("SETRANGE", key), request).await?;
        decode_integer(value)
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Bytes>>> {
        for key in keys {
            validate_key(key)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"MGET"];
        parts.extend(keys.iter().map(|k| k.as_bytes()));
        let request = encode(parts);
        // In cluster mode all keys must share a slot (e.g. via a hash tag);
        // routing keys off the first key makes that the caller's
        // responsibility rather than silently refusing every multi-key call.
        let routing_key = keys.first().copied();
        let value = self
            .dispatch("MGET", DispatchContext::new(routing_key, false), request)
            .await?;
        decode_bulk_array(value)
    }

    async fn mset(&self, pairs: &[(&str, &[u8])]) -> Result<()> {
        let mut parts: Vec<&[u8]> = vec![b"MSET"];
        for (key, value) in pairs {
            validate_key(key)?;
            parts.push(key.as_bytes());
            parts.push(value);
        }
        let request = encode(parts);
        let routing_key = pairs.first().map(|(k, _)| *k);
        let value = self
            .dispatch("MSET", DispatchContext::new(routing_key, true), request)
            .await?;
        decode_ok(value)
    }
}

impl<T: Dispatcher + ?Sized> StringCommands for T {}

#[async_trait]
pub trait CounterCommands: Dispatcher {
    async fn incr(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["INCR".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("INCR", ctx("INCR", key), request).await?)
    }

    async fn decr(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["DECR".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("DECR", ctx("DECR", key), request).await?)
    }

    async fn incrby(&self, key: &str, delta: i64) -> Result<i64> {
        validate_key(key)?;
        let delta_s = delta.to_string();
        let request = encode(["INCRBY".as_bytes(), key.as_bytes(), delta_s.as_bytes()]);
        decode_integer(self.dispatch("INCRBY", ctx("INCRBY", key), request).await?)
    }

    async fn decrby(&self, key: &str, delta: i64) -> Result<i64> {
        validate_key(key)?;
        let delta_s = delta.to_string();
        let request = encode(["DECRBY".as_bytes(), key.as_bytes(), delta_s.as_bytes()]);
        decode_integer(self.dispatch("DECRBY", ctx("DECRBY", key), request).await?)
    }

    async fn incrbyfloat(&self, key: &str, delta: f64) -> Result<f64> {
        validate_key(key)?;
        let delta_s = delta.to_string();
        let request = encode(["INCRBYFLOAT".as_bytes(), key.as_bytes(), delta_s.as_bytes()]);
        let value = self.dispatch("INCRBYFLOAT", ctx("INCRBYFLOAT", key), request).await?;
        crate::reply::decode_float(value)
    }
}

impl<T: Dispatcher + ?Sized> CounterCommands for T {}
