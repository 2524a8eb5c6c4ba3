/// Master-for-writes, round-robin-over-replicas-for-reads routing (§4.7).
///
/// Grounded on `BackendMetadata::Redis { is_master, .. }` in the teacher's
/// `core/mod.rs`, which already modeled the master/replica distinction —
/// generalized here into an active routing component instead of a passive
/// metadata field.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::client_pool::ClientList;
use crate::config::ClientConfig;
use crate::dispatch::{classify_reply, DispatchContext, Dispatcher};
use crate::error::{Error, Result};
use crate::observer::Observer;

pub struct ReplicationRouter {
    master: Arc<ClientList>,
    slaves: Vec<Arc<ClientList>>,
    cursor: AtomicUsize,
    config: ClientConfig,
}

impl ReplicationRouter {
    pub async fn connect(
        master_host: String,
        slave_hosts: Vec<String>,
        clients_per_host: usize,
        config: ClientConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Self> {
        let master = ClientList::new(master_host, clients_per_host, config.clone(), observer.clone()).await;

        let mut slaves = Vec::with_capacity(slave_hosts.len());
        for host in slave_hosts {
            slaves.push(ClientList::new(host, clients_per_host, config.clone(), observer.clone()).await);
        }

        Ok(ReplicationRouter { master, slaves, cursor: AtomicUsize::new(0), config })
    }

    /// Round-robin over slaves; per spec there is no fallback to the master
    /// when every slave is unavailable — the caller sees `IllegalState`.
    async fn pick_slave(&self) -> Result<Arc<crate::direct_client::DirectClient>> {
        if self.slaves.is_empty() {
            return Err(Error::illegal_state("replication router has no configured slaves"));
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for attempt in 0..self.slaves.len() {
            let list = &self.slaves[(start + attempt) % self.slaves.len()];
            if let Ok(client) = list.next_available().await {
                return Ok(client);
            }
        }
        Err(Error::illegal_state("no available slave in replication router"))
    }

    pub async fn close(&self) {
        self.master.close().await;
        for slave in &self.slaves {
            slave.close().await;
        }
    }
}

#[async_trait]
impl Dispatcher for ReplicationRouter {
    async fn dispatch(&self, op: &'static str, ctx: DispatchContext<'_>, request: Bytes) -> Result<crate::resp::RespValue> {
        let client = if ctx.is_write {
            self.master.next_available().await?
        } else {
            self.pick_slave().await?
        };
        let raw = client.execute_raw(op, request).await?;
        classify_reply(raw)
    }

    fn value_codec(&self) -> Arc<dyn crate::value_codec::ValueCodec> {
        Arc::new(crate::value_codec::CompressingCodec::new(self.config.compression_threshold_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;

    #[tokio::test]
    async fn pick_slave_errors_when_no_slaves_configured() {
        let master = ClientList::new("127.0.0.1:1".to_string(), 0, ClientConfig::default(), Arc::new(NoopObserver)).await;
        let router = ReplicationRouter {
            master,
            slaves: Vec::new(),
            cursor: AtomicUsize::new(0),
            config: ClientConfig::default(),
        };
        let err = router.pick_slave().await.unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));
    }
}
