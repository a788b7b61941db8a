use super::fetch::{fetch_json, FetchError};
use super::sources::{
    map_network_meta, map_rate_limit, map_regions, NetworkMeta, RateLimitStatus, RegionEntry, SystemRanges,
    NETWORK_SAMPLE_COUNT,
};
use super::LiveCache;
use crate::config::RefreshConf;
use crate::health::{LiveSource, RefreshTracker};
use crate::storage::Storage;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error("{} refresh failed: {cause}", .feed.name())]
pub struct SourceError {
    pub feed: LiveSource,
    #[source]
    pub cause: FetchError,
}

/// Résultat d'un cycle : true = source rafraîchie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub servers: bool,
    pub network_metrics: bool,
    pub system_metrics: bool,
}

/// Orchestrateur : lance les 3 adaptateurs au démarrage puis à intervalle fixe
pub struct LiveRefresher {
    client: reqwest::Client,
    cfg: RefreshConf,
    cache: LiveCache,
    storage: Arc<dyn Storage>,
    tracker: RefreshTracker,
}

impl LiveRefresher {
    pub fn new(
        cfg: RefreshConf,
        cache: LiveCache,
        storage: Arc<dyn Storage>,
        tracker: RefreshTracker,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(cfg.user_agent.clone()).build()?;
        Ok(Self { client, cfg, cache, storage, tracker })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, feed: LiveSource, url: &str) -> Result<T, SourceError> {
        fetch_json(&self.client, url, self.cfg.fetch_timeout())
            .await
            .map_err(|cause| SourceError { feed, cause })
    }

    /// Adaptateur serveurs : liste de régions -> 8 snapshots
    pub async fn refresh_servers(&self) -> Result<usize, SourceError> {
        let regions: Vec<RegionEntry> = self.fetch(LiveSource::Servers, &self.cfg.sources.regions_url).await?;
        if regions.is_empty() {
            debug!("[live] regions list empty, servers cache left as is");
            return Ok(0);
        }
        let servers = map_regions(regions, &mut rand::thread_rng());
        let count = servers.len();
        self.cache.replace_servers(servers);
        Ok(count)
    }

    /// Adaptateur réseau : métadonnées -> 8 échantillons synthétiques
    pub async fn refresh_network(&self) -> Result<usize, SourceError> {
        let meta: NetworkMeta = self.fetch(LiveSource::NetworkMetrics, &self.cfg.sources.network_meta_url).await?;
        let first_id = self.cache.allocate_network_ids(NETWORK_SAMPLE_COUNT as u64);
        let samples = map_network_meta(
            meta,
            OffsetDateTime::now_utc(),
            first_id,
            self.cfg.ranges.network_throughput(),
            &mut rand::thread_rng(),
        );
        let count = samples.len();
        self.cache.replace_network_metrics(samples);
        Ok(count)
    }

    /// Adaptateur système : rate limit -> métrique courante
    pub async fn refresh_system(&self) -> Result<usize, SourceError> {
        let status: RateLimitStatus = self.fetch(LiveSource::SystemMetrics, &self.cfg.sources.rate_limit_url).await?;
        let ranges = SystemRanges {
            memory_usage: self.cfg.ranges.memory_usage(),
            network_throughput: self.cfg.ranges.system_throughput(),
        };
        let metric = map_rate_limit(status, OffsetDateTime::now_utc(), ranges, &mut rand::thread_rng());
        self.cache.replace_system_metric(metric);
        Ok(1)
    }

    /// Repli à froid : cache serveurs vide -> contenu du stockage durable
    fn fallback_servers_from_storage(&self) {
        if !self.cache.servers().is_empty() {
            return;
        }
        match self.storage.list_servers() {
            Ok(stored) => {
                let count = stored.len();
                if self.cache.fill_servers_if_empty(stored) {
                    info!("[live] servers cache filled from storage ({} records)", count);
                }
            }
            Err(e) => error!("[live] failed to load servers from storage fallback: {}", e),
        }
    }

    async fn run_source(&self, feed: LiveSource) -> bool {
        let result = match feed {
            LiveSource::Servers => self.refresh_servers().await,
            LiveSource::NetworkMetrics => self.refresh_network().await,
            LiveSource::SystemMetrics => self.refresh_system().await,
        };
        match result {
            Ok(records) => {
                self.tracker.record_success(feed, records);
                true
            }
            Err(e) => {
                warn!("[live] {}", e);
                self.tracker.record_failure(feed, &e.cause.to_string());
                if feed == LiveSource::Servers {
                    self.fallback_servers_from_storage();
                }
                false
            }
        }
    }

    /// Un cycle : les 3 sources en parallèle, échecs indépendants
    pub async fn run_cycle(&self) -> CycleReport {
        let (servers, network_metrics, system_metrics) = tokio::join!(
            self.run_source(LiveSource::Servers),
            self.run_source(LiveSource::NetworkMetrics),
            self.run_source(LiveSource::SystemMetrics),
        );
        let cycle = self.tracker.complete_cycle();
        debug!(
            "[live] cycle {} done (servers: {}, network: {}, system: {})",
            cycle, servers, network_metrics, system_metrics
        );
        CycleReport { servers, network_metrics, system_metrics }
    }

    /// Démarre la boucle : premier cycle immédiat, puis toutes les `interval_secs`.
    /// Les cycles ne se chevauchent jamais : un tick manqué pendant un cycle long est sauté.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.cfg.interval();
        info!("[live] starting refresher (interval: {:?})", period);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("[live] refresher stopped");
        })
    }
}
