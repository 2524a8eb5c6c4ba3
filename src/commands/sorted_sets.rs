use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::reply::{decode_bulk_opt, decode_float, decode_integer, decode_member_score_pairs};

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

/// Options accepted by [`SortedSetCommands::zadd`], mirroring Redis's `ZADD`
/// condition/comparison flags.
#[derive(Debug, Clone, Default)]
pub struct ZAddOptions {
    pub only_if_absent: bool,
    pub only_if_present: bool,
    pub only_if_greater: bool,
    pub only_if_less: bool,
    pub changed: bool,
}

#[async_trait]
pub trait SortedSetCommands: Dispatcher {
    async fn zadd(&self, key: &str, members: &[(f64, &[u8])], options: &ZAddOptions) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"ZADD", key.as_bytes()];
        if options.only_if_absent {
            parts.push(b"NX");
        }
        if options.only_if_present {
            parts.push(b"XX");
        }
        if options.only_if_greater {
            parts.push(b"GT");
        }
        if options.only_if_less {
            parts.push(b"LT");
        }
        if options.changed {
            parts.push(b"CH");
        }
        let score_strs: Vec<String> = members.iter().map(|(score, _)| score.to_string()).collect();
        for (score_str, (_, member)) in score_strs.iter().zip(members.iter()) {
            parts.push(score_str.as_bytes());
            parts.push(member);
        }
        let request = encode(parts);
        decode_integer(self.dispatch("ZADD", ctx("ZADD", key), request).await?)
    }

    async fn zrem(&self, key: &str, members: &[&[u8]]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"ZREM", key.as_bytes()];
        parts.extend(members.iter().copied());
        let request = encode(parts);
        decode_integer(self.dispatch("ZREM", ctx("ZREM", key), request).await?)
    }

    async fn zscore(&self, key: &str, member: &[u8]) -> Result<Option<f64>> {
        validate_key(key)?;
        let request = encode([b"ZSCORE".as_slice(), key.as_bytes(), member]);
        let value = self.dispatch("ZSCORE", ctx("ZSCORE", key), request).await?;
        match decode_bulk_opt(value.clone()) {
            Ok(None) => Ok(None),
            _ => Ok(Some(decode_float(value)?)),
        }
    }

    async fn zrank(&self, key: &str, member: &[u8]) -> Result<Option<i64>> {
        validate_key(key)?;
        let request = encode([b"ZRANK".as_slice(), key.as_bytes(), member]);
        match self.dispatch("ZRANK", ctx("ZRANK", key), request).await? {
            crate::resp::RespValue::Integer(n) => Ok(Some(n)),
            crate::resp::RespValue::BulkString(None) => Ok(None),
            other => Err(crate::error::Error::unexpected(format!("expected integer or nil, got {:?}", other))),
        }
    }

    async fn zrevrank(&self, key: &str, member: &[u8]) -> Result<Option<i64>> {
        validate_key(key)?;
        let request = encode([b"ZREVRANK".as_slice(), key.as_bytes(), member]);
        match self.dispatch("ZREVRANK", ctx("ZREVRANK", key), request).await? {
            crate::resp::RespValue::Integer(n) => Ok(Some(n)),
            crate::resp::RespValue::BulkString(None) => Ok(None),
            other => Err(crate::error::Error::unexpected(format!("expected integer or nil, got {:?}", other))),
        }
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64, with_scores: bool) -> Result<Vec<(Bytes, f64)>> {
        validate_key(key)?;
        let start_s = start.to_string();
        let stop_s = stop.to_string();
        let mut parts: Vec<&[u8]> = vec![b"ZRANGE", key.as_bytes(), start_s.as_bytes(), stop_s.as_bytes()];
        if with_scores {
            parts.push(b"WITHSCORES");
        }
        let request = encode(parts);
        let value = self.dispatch("ZRANGE", ctx("ZRANGE", key), request).await?;
        if with_scores {
            decode_member_score_pairs(value)
        } else {
            let members = crate::reply::decode_bytes_vec(value)?;
            Ok(members.into_iter().map(|m| (m, 0.0)).collect())
        }
    }

    async fn zrevrange(&self, key: &str, start: i64, stop: i64, with_scores: bool) -> Result<Vec<(Bytes, f64)>> {
        validate_key(key)?;
        let start_s = start.to_string();
        let stop_s = stop.to_string();
        let mut parts: Vec<&[u8]> = vec![b"ZREVRANGE", key.as_bytes(), start_s.as_bytes(), stop_s.as_bytes()];
        if with_scores {
            parts.push(b"WITHSCORES");
        }
        let request = encode(parts);
        let value = self.dispatch("ZREVRANGE", ctx("ZREVRANGE", key), request).await?;
        if with_scores {
            decode_member_score_pairs(value)
        } else {
            let members = crate::reply::decode_bytes_vec(value)?;
            Ok(members.into_iter().map(|m| (m, 0.0)).collect())
        }
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<Bytes>> {
        validate_key(key)?;
        let min_s = min.to_string();
        let max_s = max.to_string();
        let request = encode([b"ZRANGEBYSCORE".as_slice(), key.as_bytes(), min_s.as_bytes(), max_s.as_bytes()]);
        crate::reply::decode_bytes_vec(self.dispatch("ZRANGEBYSCORE", ctx("ZRANGEBYSCORE", key), request).await?)
    }

    async fn zcard(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        let request = encode(["ZCARD".as_bytes(), key.as_bytes()]);
        decode_integer(self.dispatch("ZCARD", ctx("ZCARD", key), request).await?)
    }

    async fn zcount(&self, key: &str, min: f64, max: f64) -> Result<i64> {
        validate_key(key)?;
        let min_s = min.to_string();
        let max_s = max.to_string();
        let request = encode([b"ZCOUNT".as_slice(), key.as_bytes(), min_s.as_bytes(), max_s.as_bytes()]);
        decode_integer(self.dispatch("ZCOUNT", ctx("ZCOUNT", key), request).await?)
    }

    async fn zincrby(&self, key: &str, delta: f64, member: &[u8]) -> Result<f64> {
        validate_key(key)?;
        let delta_s = delta.to_string();
        let request = encode([b"ZINCRBY".as_slice(), key.as_bytes(), delta_s.as_bytes(), member]);
        decode_float(self.dispatch("ZINCRBY", ctx("ZINCRBY", key), request).await?)
    }
}

impl<T: Dispatcher + ?Sized> SortedSetCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::RespValue;
    use std::sync::Mutex;

    struct MockDispatcher {
        replies: Mutex<Vec<RespValue>>,
        seen_requests: Mutex<Vec<Bytes>>,
    }

    impl MockDispatcher {
        fn new(replies: Vec<RespValue>) -> Self {
            MockDispatcher { replies: Mutex::new(replies), seen_requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Dispatcher for MockDispatcher {
        async fn dispatch(&self, _op: &'static str, _ctx: DispatchContext<'_>, request: Bytes) -> Result<RespValue> {
            self.seen_requests.lock().unwrap().push(request);
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn zadd_encodes_flags_and_score() {
        let mock = MockDispatcher::new(vec![RespValue::Integer(1)]);
        let options = ZAddOptions { only_if_absent: true, ..Default::default() };
        mock.zadd("z", &[(1.5, b"m")], &options).await.unwrap();
        let sent = mock.seen_requests.lock().unwrap().remove(0);
        let text = String::from_utf8_lossy(&sent);
        assert!(text.contains("NX"));
        assert!(text.contains("1.5"));
    }

    #[tokio::test]
    async fn zscore_returns_none_on_nil() {
        let mock = MockDispatcher::new(vec![RespValue::BulkString(None)]);
        assert_eq!(mock.zscore("z", b"m").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zrange_withscores_pairs_members_and_scores() {
        let mock = MockDispatcher::new(vec![RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("a"))),
            RespValue::BulkString(Some(Bytes::from("1"))),
        ]))]);
        let pairs = mock.zrange("z", 0, -1, true).await.unwrap();
        assert_eq!(pairs, vec![(Bytes::from("a"), 1.0)]);
    }
}
