/// `SET ... NX PX` distributed mutual exclusion with atomic, token-checked
/// unlock (§4.9). Built directly on `Dispatcher` rather than a teacher
/// equivalent — the teacher proxied connections and never implemented
/// application-level locking.
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::LockConfig;
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::Result;
use crate::observer::Observer;
use crate::resp::RespValue;
use std::sync::Arc;

/// A held lock: the name, the token that must match on unlock, and when it
/// was acquired (for holding-time metrics).
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub name: String,
    pub token: String,
    pub validity: Duration,
    acquired_at: Instant,
}

impl LockInfo {
    /// Whether the lease is still within its validity window by this
    /// process's wall clock (§3 data model). This is a local estimate, not a
    /// guarantee — the server's own PX expiry is the actual source of truth,
    /// and clock drift or a paused process can make this return `true` after
    /// the key has already expired.
    pub fn is_valid(&self) -> bool {
        self.acquired_at.elapsed() < self.validity
    }
}

/// The atomic compare-and-delete unlock script (§4.9): deletes the key only
/// if it still holds the token this caller set.
const UNLOCK_SCRIPT: &str = "if redis.call(\"get\", KEYS[1]) == ARGV[1] then return redis.call(\"del\", KEYS[1]) else return 0 end";

fn key_for(name: &str) -> String {
    format!("lock:{}", name)
}

fn fresh_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

pub struct DistributedLock<D: Dispatcher> {
    dispatcher: D,
    observer: Arc<dyn Observer>,
}

impl<D: Dispatcher> DistributedLock<D> {
    pub fn new(dispatcher: D, observer: Arc<dyn Observer>) -> Self {
        DistributedLock { dispatcher, observer }
    }

    /// Attempt to acquire `name`, retrying with a bounded random backoff
    /// until `wait_ms` elapses. Returns `None` on timeout rather than an
    /// error, matching §4.9's "return none on timeout" contract.
    pub async fn try_lock(&self, name: &str, config: &LockConfig, wait_ms: u64) -> Result<Option<LockInfo>> {
        let key = key_for(name);
        let validity = Duration::from_secs(config.validity_sec);
        let deadline = Instant::now() + Duration::from_millis(wait_ms);

        loop {
            let token = fresh_token();
            let request = crate::commands::encode([
                b"SET".as_slice(),
                key.as_bytes(),
                token.as_bytes(),
                b"PX",
                validity.as_millis().to_string().as_bytes(),
                b"NX",
            ]);

            let result = self
                .dispatcher
                .dispatch("SET", DispatchContext::new(Some(&key), true), request)
                .await;

            match result {
                Ok(RespValue::SimpleString(ref s)) if s == "OK" => {
                    self.observer.record_lock_success();
                    return Ok(Some(LockInfo {
                        name: name.to_string(),
                        token,
                        validity,
                        acquired_at: Instant::now(),
                    }));
                }
                Ok(_) => {
                    // Conditional SET not applied: another holder has it.
                }
                Err(e) => {
                    self.observer.record_lock_error();
                    return Err(e);
                }
            }

            if Instant::now() >= deadline {
                self.observer.record_lock_fail();
                return Ok(None);
            }

            let delay_ms = rand::thread_rng().gen_range(config.min_delay_ms..=config.max_delay_ms.max(config.min_delay_ms));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// Release `lock` iff it still holds the token we set, via a
    /// server-evaluated compare-and-delete so expiry races never release
    /// someone else's lock. Returns `true` if this caller actually held it.
    pub async fn unlock(&self, lock: &LockInfo) -> Result<bool> {
        let key = key_for(&lock.name);
        let request = crate::commands::encode([
            b"EVAL".as_slice(),
            UNLOCK_SCRIPT.as_bytes(),
            b"1",
            key.as_bytes(),
            lock.token.as_bytes(),
        ]);

        let result = self
            .dispatcher
            .dispatch("EVAL", DispatchContext::new(Some(&key), true), request)
            .await;

        match result {
            Ok(RespValue::Integer(1)) => {
                let held_ms = lock.acquired_at.elapsed().as_millis() as u64;
                self.observer.record_unlock_success(held_ms);
                Ok(true)
            }
            Ok(_) => {
                // Already expired and possibly reacquired by another holder
                // (§4.9's documented known weakness); non-fatal but recorded.
                self.observer.record_unlock_lost();
                Ok(false)
            }
            Err(e) => {
                self.observer.record_lock_error();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::CountingObserver;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    struct MockDispatcher(Mutex<Vec<RespValue>>);

    #[async_trait]
    impl Dispatcher for MockDispatcher {
        async fn dispatch(&self, _op: &'static str, _ctx: DispatchContext<'_>, _request: Bytes) -> Result<RespValue> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn try_lock_succeeds_on_ok_reply() {
        let dispatcher = MockDispatcher(Mutex::new(vec![RespValue::SimpleString("OK".to_string())]));
        let observer = Arc::new(CountingObserver::new());
        let lock = DistributedLock::new(dispatcher, observer.clone());
        let info = lock.try_lock("res", &LockConfig::default(), 100).await.unwrap();
        assert!(info.is_some());
        assert_eq!(observer.lock_success.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn try_lock_times_out_on_repeated_nil() {
        let dispatcher = MockDispatcher(Mutex::new(vec![RespValue::BulkString(None); 50]));
        let observer = Arc::new(CountingObserver::new());
        let config = LockConfig { min_delay_ms: 1, max_delay_ms: 2, ..LockConfig::default() };
        let lock = DistributedLock::new(dispatcher, observer.clone());
        let info = lock.try_lock("res", &config, 20).await.unwrap();
        assert!(info.is_none());
        assert_eq!(observer.lock_fail.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn unlock_succeeds_when_token_matches() {
        let dispatcher = MockDispatcher(Mutex::new(vec![RespValue::Integer(1)]));
        let observer = Arc::new(CountingObserver::new());
        let lock = DistributedLock::new(dispatcher, observer.clone());
        let info = LockInfo {
            name: "res".to_string(),
            token: "abc".to_string(),
            validity: Duration::from_secs(5),
            acquired_at: Instant::now(),
        };
        let released = lock.unlock(&info).await.unwrap();
        assert!(released);
        assert_eq!(observer.unlock_success.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn is_valid_reflects_elapsed_time_against_validity() {
        let fresh = LockInfo {
            name: "res".to_string(),
            token: "abc".to_string(),
            validity: Duration::from_secs(5),
            acquired_at: Instant::now(),
        };
        assert!(fresh.is_valid());

        let expired = LockInfo {
            name: "res".to_string(),
            token: "abc".to_string(),
            validity: Duration::from_millis(1),
            acquired_at: Instant::now() - Duration::from_millis(50),
        };
        assert!(!expired.is_valid());
    }

    #[tokio::test]
    async fn unlock_reports_lost_when_token_mismatches() {
        let dispatcher = MockDispatcher(Mutex::new(vec![RespValue::Integer(0)]));
        let observer = Arc::new(CountingObserver::new());
        let lock = DistributedLock::new(dispatcher, observer.clone());
        let info = LockInfo {
            name: "res".to_string(),
            token: "abc".to_string(),
            validity: Duration::from_secs(5),
            acquired_at: Instant::now(),
        };
        let released = lock.unlock(&info).await.unwrap();
        assert!(!released);
        assert_eq!(observer.unlock_lost.load(Ordering::Relaxed), 1);
    }
}
