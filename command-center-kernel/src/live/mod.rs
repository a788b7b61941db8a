/**
 * LIVE DATA - Caches mémoire alimentés par le refresher
 *
 * RÔLE : Trois tranches de cache (serveurs, métriques réseau, métrique système),
 * chacune remplacée d'un bloc par son adaptateur. Les lectures HTTP servent
 * le cache s'il est peuplé, sinon retombent sur le stockage.
 *
 * INVARIANT : une tranche est vide (jamais rafraîchie) ou contient intégralement
 * le résultat du dernier succès de sa source. Pas de fusion partielle.
 */

pub mod fetch;
pub mod refresher;
pub mod sources;

pub use refresher::LiveRefresher;

use crate::health::CacheSizes;
use crate::models::{NetworkMetric, Server, SystemMetric};
use crate::state::{new_state, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Contexte partagé entre le refresher et les handlers HTTP
#[derive(Clone)]
pub struct LiveCache {
    servers: Shared<Vec<Server>>,
    network: Shared<Vec<NetworkMetric>>,
    system: Shared<Option<SystemMetric>>,
    // ids des échantillons réseau, monotones sur toute la vie du process
    next_network_id: Arc<AtomicU64>,
}

impl LiveCache {
    pub fn new() -> Self {
        Self {
            servers: new_state(Vec::new()),
            network: new_state(Vec::new()),
            system: new_state(None),
            next_network_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn servers(&self) -> Vec<Server> {
        self.servers.lock().clone()
    }

    pub fn replace_servers(&self, servers: Vec<Server>) {
        *self.servers.lock() = servers;
    }

    /// Remplit la tranche uniquement si elle est encore vide (repli à froid)
    pub fn fill_servers_if_empty(&self, servers: Vec<Server>) -> bool {
        let mut slot = self.servers.lock();
        if !slot.is_empty() || servers.is_empty() {
            return false;
        }
        *slot = servers;
        true
    }

    /// Les `limit` premiers échantillons (les plus récents)
    pub fn network_metrics(&self, limit: usize) -> Vec<NetworkMetric> {
        self.network.lock().iter().take(limit).cloned().collect()
    }

    pub fn replace_network_metrics(&self, metrics: Vec<NetworkMetric>) {
        *self.network.lock() = metrics;
    }

    /// Réserve `count` ids consécutifs, retourne le premier
    pub fn allocate_network_ids(&self, count: u64) -> u64 {
        self.next_network_id.fetch_add(count, Ordering::Relaxed)
    }

    pub fn system_metric(&self) -> Option<SystemMetric> {
        self.system.lock().clone()
    }

    pub fn replace_system_metric(&self, metric: SystemMetric) {
        *self.system.lock() = Some(metric);
    }

    pub fn sizes(&self) -> CacheSizes {
        CacheSizes {
            servers: self.servers.lock().len(),
            network_metrics: self.network.lock().len(),
            system_metric: self.system.lock().is_some(),
        }
    }
}

impl Default for LiveCache {
    fn default() -> Self {
        Self::new()
    }
}
