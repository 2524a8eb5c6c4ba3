/// Slot-aware routing across a Redis Cluster deployment (§4.6).
///
/// Bootstraps its slot map from `CLUSTER SLOTS` against the configured seed
/// hosts, lazily creates a [`ClientList`] per master host it discovers
/// (eager creation on MOVED rather than waiting for a second redirect — see
/// DESIGN.md, Open Question 2), and retries a bounded number of hops on
/// MOVED/ASK before giving up.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::client_pool::ClientList;
use crate::cluster::redirect::{redirect_in_reply, Redirect};
use crate::cluster::slots::{parse_cluster_slots, slot_for_key, SlotMap};
use crate::config::ClientConfig;
use crate::dispatch::{classify_reply, DispatchContext, Dispatcher};
use crate::error::{Error, Result};
use crate::observer::Observer;
use crate::resp::RespEncoder;

pub struct ClusterRouter {
    seed_hosts: Vec<String>,
    config: ClientConfig,
    observer: Arc<dyn Observer>,
    clients_per_host: usize,
    max_redirects: u8,
    slots: RwLock<SlotMap>,
    clients: RwLock<HashMap<String, Arc<ClientList>>>,
}

impl ClusterRouter {
    pub async fn bootstrap(
        seed_hosts: Vec<String>,
        clients_per_host: usize,
        max_redirects: u8,
        config: ClientConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Arc<Self>> {
        if seed_hosts.is_empty() {
            return Err(Error::invalid_argument("cluster bootstrap requires at least one seed host"));
        }

        let router = Arc::new(ClusterRouter {
            seed_hosts,
            config,
            observer,
            clients_per_host,
            max_redirects,
            slots: RwLock::new(SlotMap::new()),
            clients: RwLock::new(HashMap::new()),
        });
        router.refresh_topology().await?;
        Ok(router)
    }

    /// Re-fetch `CLUSTER SLOTS` from any reachable seed host and rebuild the
    /// slot map. Called at bootstrap and whenever dispatch hits a transport
    /// failure or `CLUSTERDOWN`.
    pub async fn refresh_topology(&self) -> Result<()> {
        let mut last_err = None;
        for host in &self.seed_hosts {
            match self.client_for(host).await {
                Ok(client) => {
                    let request = RespEncoder::create_command("CLUSTER", &["SLOTS"]);
                    match client.execute_raw("CLUSTER SLOTS", request).await {
                        Ok(value) => {
                            let ranges = parse_cluster_slots(&value)?;
                            self.slots.write().await.rebuild(ranges);
                            return Ok(());
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::illegal_state("no seed host reachable")))
    }

    async fn client_for(&self, host: &str) -> Result<Arc<DirectClientHandle>> {
        if let Some(list) = self.clients.read().await.get(host) {
            return list.next_available().await.map(DirectClientHandle::new);
        }
        let list = ClientList::new(host.to_string(), self.clients_per_host, self.config.clone(), self.observer.clone()).await;
        self.clients.write().await.insert(host.to_string(), list.clone());
        list.next_available().await.map(DirectClientHandle::new)
    }

    async fn master_host_for(&self, key: &str) -> Option<String> {
        self.slots.read().await.master_for_key(key).map(|s| s.to_string())
    }

    async fn dispatch_with_redirects(
        &self,
        op: &'static str,
        ctx: DispatchContext<'_>,
        request: Bytes,
    ) -> Result<crate::resp::RespValue> {
        let key = ctx.key.ok_or_else(|| Error::invalid_argument(format!("{} requires a routable key in cluster mode", op)))?;
        let mut target = self
            .master_host_for(key)
            .await
            .ok_or_else(|| Error::illegal_state("no known master for key's slot"))?;
        let mut requires_asking = false;

        for hop in 0..=self.max_redirects {
            let client = self.client_for(&target).await?;
            let raw = if requires_asking {
                client.execute_asking(request.clone()).await
            } else {
                client.execute_raw(op, request.clone()).await
            };

            let raw = match raw {
                Ok(v) => v,
                Err(e) if e.is_recoverable() && hop < self.max_redirects => {
                    // Transport-level failure against the presumed master;
                    // the topology may be stale (e.g. failover happened).
                    self.refresh_topology().await?;
                    target = self
                        .master_host_for(key)
                        .await
                        .ok_or_else(|| Error::illegal_state("no known master for key's slot after refresh"))?;
                    requires_asking = false;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match redirect_in_reply(&raw) {
                Some(Redirect::Moved { slot, target: new_target }) => {
                    // Persist the new ownership immediately rather than
                    // waiting for the next full topology refresh.
                    self.client_for(&new_target).await.ok();
                    self.slots.write().await.update_slot(slot, new_target.clone());
                    target = new_target;
                    requires_asking = false;
                    continue;
                }
                Some(Redirect::Ask { target: new_target, .. }) => {
                    target = new_target;
                    requires_asking = true;
                    continue;
                }
                None => return classify_reply(raw),
            }
        }

        Err(Error::illegal_state(format!(
            "exceeded {} redirects for {}",
            self.max_redirects, op
        )))
    }
}

/// Thin wrapper so `ClusterRouter` can treat "a client I just borrowed from
/// a `ClientList`" uniformly whether it came from the cache or was just
/// built, without exposing `ClientList`'s rotation internals further up.
struct DirectClientHandle(Arc<crate::direct_client::DirectClient>);

impl DirectClientHandle {
    fn new(client: Arc<crate::direct_client::DirectClient>) -> Arc<Self> {
        Arc::new(DirectClientHandle(client))
    }

    async fn execute_raw(&self, op: &'static str, request: Bytes) -> Result<crate::resp::RespValue> {
        self.0.execute_raw(op, request).await
    }

    async fn execute_asking(&self, request: Bytes) -> Result<crate::resp::RespValue> {
        self.0.execute_asking(request).await
    }
}

#[async_trait]
impl Dispatcher for ClusterRouter {
    async fn dispatch(&self, op: &'static str, ctx: DispatchContext<'_>, request: Bytes) -> Result<crate::resp::RespValue> {
        self.dispatch_with_redirects(op, ctx, request).await
    }

    fn value_codec(&self) -> Arc<dyn crate::value_codec::ValueCodec> {
        Arc::new(crate::value_codec::CompressingCodec::new(self.config.compression_threshold_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_rejects_empty_seed_list() {
        // Exercised via the async constructor in integration-style tests;
        // here we just check the slot helper used by routing.
        assert_eq!(slot_for_key("{tag}x"), slot_for_key("{tag}y"));
    }
}
