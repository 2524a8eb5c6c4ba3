/// A fleet of parallel `DirectClient`s to a single host, rebuilt in the
/// background as members fail (§4.5).
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::direct_client::DirectClient;
use crate::error::{Error, Result};
use crate::observer::Observer;

/// One member of the fleet: either a live client or a gap awaiting rebuild.
enum Slot {
    Live(Arc<DirectClient>),
    Down,
}

pub struct ClientList {
    host: String,
    config: ClientConfig,
    observer: Arc<dyn Observer>,
    slots: RwLock<Vec<Slot>>,
    cursor: AtomicUsize,
    rebuild_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ClientList {
    /// Build `size` parallel clients to `host`. Any that fail to connect at
    /// construction time start out `Down` and are picked up by the
    /// background rebuild loop.
    pub async fn new(
        host: String,
        size: usize,
        config: ClientConfig,
        observer: Arc<dyn Observer>,
    ) -> Arc<Self> {
        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            slots.push(Self::build_one(&host, &config, &observer).await);
        }

        let list = Arc::new(ClientList {
            host,
            config,
            observer,
            slots: RwLock::new(slots),
            cursor: AtomicUsize::new(0),
            rebuild_handle: std::sync::Mutex::new(None),
        });

        let rebuild_list = list.clone();
        let interval = Duration::from_millis(list.config.rebuild_interval_ms);
        let handle = tokio::spawn(async move { rebuild_list.run_rebuild_loop(interval).await });
        *list.rebuild_handle.lock().unwrap() = Some(handle);

        list
    }

    async fn build_one(host: &str, config: &ClientConfig, observer: &Arc<dyn Observer>) -> Slot {
        match DirectClient::connect(host, config, observer.clone()).await {
            Ok(client) => Slot::Live(Arc::new(client)),
            Err(e) => {
                tracing::warn!(host, error = %e, "failed to build client list member");
                Slot::Down
            }
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn size(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Number of members currently usable.
    pub async fn available_count(&self) -> usize {
        self.slots
            .read()
            .await
            .iter()
            .filter(|s| matches!(s, Slot::Live(c) if c.is_available()))
            .count()
    }

    /// The member at `index`, if it exists and is live.
    pub async fn get(&self, index: usize) -> Option<Arc<DirectClient>> {
        let slots = self.slots.read().await;
        match slots.get(index) {
            Some(Slot::Live(client)) if client.is_available() => Some(client.clone()),
            _ => None,
        }
    }

    /// Round-robin pick, starting at `preferred_index` and scanning forward
    /// by `offset` positions at a time until an available member is found
    /// or the whole fleet has been checked.
    pub async fn or_available_client(&self, preferred_index: usize, offset: usize) -> Result<Arc<DirectClient>> {
        let slots = self.slots.read().await;
        let size = slots.len();
        if size == 0 {
            return Err(Error::illegal_state(format!("client list for {} is empty", self.host)));
        }
        let step = offset.max(1);
        for attempt in 0..size {
            let index = (preferred_index + attempt * step) % size;
            if let Slot::Live(client) = &slots[index] {
                if client.is_available() {
                    return Ok(client.clone());
                }
            }
        }
        Err(Error::illegal_state(format!("no available client in list for {}", self.host)))
    }

    /// Round-robin over the whole fleet using an internal cursor, used for
    /// load-spreading rather than affinity-preserving access.
    pub async fn next_available(&self) -> Result<Arc<DirectClient>> {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.or_available_client(start, 1).await
    }

    async fn run_rebuild_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let needs_rebuild: Vec<usize> = {
                let slots = self.slots.read().await;
                slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| match s {
                        Slot::Down => Some(i),
                        Slot::Live(c) if !c.is_available() => Some(i),
                        _ => None,
                    })
                    .collect()
            };

            for index in needs_rebuild {
                let was_down = matches!(self.slots.read().await[index], Slot::Down);
                match DirectClient::connect(&self.host, &self.config, self.observer.clone()).await {
                    Ok(client) => {
                        let mut slots = self.slots.write().await;
                        slots[index] = Slot::Live(Arc::new(client));
                        drop(slots);
                        if was_down {
                            self.observer.on_recovered(&self.host);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(host = %self.host, error = %e, "rebuild attempt failed");
                        let mut slots = self.slots.write().await;
                        slots[index] = Slot::Down;
                    }
                }
            }
        }
    }

    pub async fn close(&self) {
        if let Some(handle) = self.rebuild_handle.lock().unwrap().take() {
            handle.abort();
        }
        let slots = self.slots.read().await;
        for slot in slots.iter() {
            if let Slot::Live(client) = slot {
                client.close().await;
            }
        }
    }
}
