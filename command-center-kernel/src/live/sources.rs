/**
 * SOURCES LIVE - Contrats des 3 APIs externes + normalisation en snapshots
 *
 * Chaque source a un DTO explicite (champs optionnels déclarés) et une
 * fonction de mapping pure. Les valeurs manquantes ont un repli documenté,
 * jamais d'inférence sur la forme du JSON.
 *
 * - regions     -> Vec<Server>         (8 premières régions, statut/charge aléatoires)
 * - network meta -> Vec<NetworkMetric>  (8 échantillons synthétiques, 1s d'écart)
 * - rate limit  -> SystemMetric        (remaining/limit comme proxy CPU + nœuds)
 */

use crate::models::{NetworkMetric, Server, ServerStatus, SystemMetric};
use rand::Rng;
use serde::Deserialize;
use std::ops::Range;
use time::{Duration, OffsetDateTime};

pub const SERVER_SNAPSHOT_LIMIT: usize = 8;
pub const NETWORK_SAMPLE_COUNT: usize = 8;
pub const UNKNOWN: &str = "unknown";

/// Identifiant amont pouvant être une chaîne ou un nombre
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LooseId {
    Text(String),
    Number(serde_json::Number),
}

impl LooseId {
    fn into_text(self) -> Option<String> {
        match self {
            LooseId::Text(s) => non_empty(Some(s)),
            LooseId::Number(n) => Some(n.to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Regions -> serveurs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegionEntry {
    pub code: Option<String>,
    pub id: Option<LooseId>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

pub fn random_status_and_load(rng: &mut impl Rng) -> (ServerStatus, u8) {
    let status = ServerStatus::ALL[rng.gen_range(0..ServerStatus::ALL.len())];
    let load = rng.gen_range(status.load_range());
    (status, load)
}

pub fn map_regions(regions: Vec<RegionEntry>, rng: &mut impl Rng) -> Vec<Server> {
    regions
        .into_iter()
        .take(SERVER_SNAPSHOT_LIMIT)
        .enumerate()
        .map(|(i, r)| {
            let server_id = non_empty(r.code)
                .or_else(|| r.id.and_then(LooseId::into_text))
                .unwrap_or_else(|| format!("region-{}", i + 1));
            let region = non_empty(r.location)
                .or_else(|| non_empty(r.name))
                .or_else(|| non_empty(r.country))
                .or_else(|| non_empty(r.city))
                .unwrap_or_else(|| UNKNOWN.to_string());
            let (status, load) = random_status_and_load(rng);
            Server {
                id: i as u64 + 1,
                server_id,
                name: None,
                region,
                status,
                load,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Network meta -> échantillons réseau
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkMeta {
    pub asn: Option<LooseId>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub geo: Option<GeoInfo>,
}

/// Tags géographiques d'un échantillon, "unknown" par défaut
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkTags {
    pub asn: String,
    pub country: String,
    pub city: String,
}

impl NetworkMeta {
    pub fn tags(self) -> NetworkTags {
        let geo = self.geo.unwrap_or_default();
        NetworkTags {
            asn: self.asn.and_then(LooseId::into_text).unwrap_or_else(|| UNKNOWN.into()),
            country: non_empty(self.country)
                .or_else(|| non_empty(geo.country))
                .unwrap_or_else(|| UNKNOWN.into()),
            city: non_empty(self.city)
                .or_else(|| non_empty(geo.city))
                .unwrap_or_else(|| UNKNOWN.into()),
        }
    }
}

/// `NETWORK_SAMPLE_COUNT` échantillons, le plus récent (= `now`) en tête, ids à partir de `first_id`
pub fn map_network_meta(
    meta: NetworkMeta,
    now: OffsetDateTime,
    first_id: u64,
    throughput: Range<f64>,
    rng: &mut impl Rng,
) -> Vec<NetworkMetric> {
    let tags = meta.tags();
    (0..NETWORK_SAMPLE_COUNT)
        .map(|i| NetworkMetric {
            id: first_id + i as u64,
            timestamp: now - Duration::seconds(i as i64),
            inbound: rng.gen_range(throughput.clone()).floor(),
            outbound: rng.gen_range(throughput.clone()).floor(),
            asn: Some(tags.asn.clone()),
            country: Some(tags.country.clone()),
            city: Some(tags.city.clone()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Rate limit -> métrique système
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreLimit {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitResources {
    pub core: Option<CoreLimit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitStatus {
    pub resources: Option<RateLimitResources>,
}

pub struct SystemRanges {
    pub memory_usage: Range<f64>,
    pub network_throughput: Range<f64>,
}

pub fn cpu_proxy(remaining: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    (remaining as f64 / limit as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn map_rate_limit(
    status: RateLimitStatus,
    now: OffsetDateTime,
    ranges: SystemRanges,
    rng: &mut impl Rng,
) -> SystemMetric {
    let core = status.resources.and_then(|r| r.core).unwrap_or_default();
    let remaining = core.remaining.unwrap_or(0);
    let limit = core.limit.unwrap_or(1);
    SystemMetric {
        id: 1,
        cpu_usage: cpu_proxy(remaining, limit),
        memory_usage: rng.gen_range(ranges.memory_usage),
        active_nodes: remaining,
        total_nodes: limit,
        network_throughput: rng.gen_range(ranges.network_throughput),
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_random_status_load_is_consistent() {
        let mut rng = rng();
        for _ in 0..500 {
            let (status, load) = random_status_and_load(&mut rng);
            assert!(status.load_range().contains(&load), "{status:?} -> {load}");
        }
    }

    #[test]
    fn test_map_regions_takes_first_eight() {
        let regions: Vec<RegionEntry> = serde_json::from_value(json!([
            {"code": "r1"}, {"code": "r2"}, {"code": "r3"}, {"code": "r4"}, {"code": "r5"},
            {"code": "r6"}, {"code": "r7"}, {"code": "r8"}, {"code": "r9"}, {"code": "r10"}
        ]))
        .unwrap();
        let servers = map_regions(regions, &mut rng());
        assert_eq!(servers.len(), SERVER_SNAPSHOT_LIMIT);
        assert_eq!(servers[0].id, 1);
        assert_eq!(servers[7].server_id, "r8");
        assert!(servers.iter().all(|s| s.name.is_none() && s.load <= 100));
    }

    #[test]
    fn test_map_regions_fallback_chain() {
        let regions: Vec<RegionEntry> = serde_json::from_value(json!([
            {"code": "eu-1", "location": "Frankfurt"},
            {"id": 42, "name": "Oregon"},
            {"id": "ap-x", "country": "JP", "city": "Tokyo"},
            {"code": "", "city": "Lima"},
            {}
        ]))
        .unwrap();
        let servers = map_regions(regions, &mut rng());
        let pairs: Vec<(&str, &str)> = servers.iter().map(|s| (s.server_id.as_str(), s.region.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("eu-1", "Frankfurt"),
                ("42", "Oregon"),
                ("ap-x", "JP"),
                ("region-4", "Lima"),
                ("region-5", "unknown"),
            ]
        );
    }

    #[test]
    fn test_network_meta_tags() {
        let meta: NetworkMeta = serde_json::from_value(json!({"asn": 13335, "geo": {"country": "FR", "city": "Paris"}})).unwrap();
        assert_eq!(
            meta.tags(),
            NetworkTags { asn: "13335".into(), country: "FR".into(), city: "Paris".into() }
        );

        let meta: NetworkMeta = serde_json::from_value(json!({"country": "DE"})).unwrap();
        let tags = meta.tags();
        assert_eq!(tags.asn, UNKNOWN);
        assert_eq!(tags.country, "DE");
        assert_eq!(tags.city, UNKNOWN);
    }

    #[test]
    fn test_map_network_meta_samples() {
        let now = OffsetDateTime::now_utc();
        let samples = map_network_meta(NetworkMeta::default(), now, 17, 1000.0..7000.0, &mut rng());
        assert_eq!(samples.len(), NETWORK_SAMPLE_COUNT);
        assert_eq!(samples[0].id, 17);
        assert_eq!(samples[7].id, 24);
        assert_eq!(samples[0].timestamp, now);
        assert_eq!(samples[0].timestamp - samples[7].timestamp, Duration::seconds(7));
        for s in &samples {
            assert!((1000.0..7000.0).contains(&s.inbound));
            assert!((1000.0..7000.0).contains(&s.outbound));
            assert_eq!(s.asn.as_deref(), Some(UNKNOWN));
        }
    }

    #[test]
    fn test_cpu_proxy_bounds() {
        assert_eq!(cpu_proxy(4000, 5000), 80.0);
        assert_eq!(cpu_proxy(9000, 5000), 100.0);
        assert_eq!(cpu_proxy(10, 0), 0.0);
    }

    #[test]
    fn test_map_rate_limit_defaults_and_ranges() {
        let now = OffsetDateTime::now_utc();
        let ranges = || SystemRanges { memory_usage: 5.0..20.0, network_throughput: 0.5..5.0 };

        let metric = map_rate_limit(RateLimitStatus::default(), now, ranges(), &mut rng());
        assert_eq!(metric.cpu_usage, 0.0);
        assert_eq!(metric.active_nodes, 0);
        assert_eq!(metric.total_nodes, 1);

        let status: RateLimitStatus =
            serde_json::from_value(json!({"resources": {"core": {"remaining": 30, "limit": 60}}})).unwrap();
        let metric = map_rate_limit(status, now, ranges(), &mut rng());
        assert_eq!(metric.id, 1);
        assert_eq!(metric.cpu_usage, 50.0);
        assert_eq!((metric.active_nodes, metric.total_nodes), (30, 60));
        assert!((5.0..20.0).contains(&metric.memory_usage));
        assert!((0.5..5.0).contains(&metric.network_throughput));
    }
}
