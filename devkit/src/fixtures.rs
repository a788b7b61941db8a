/*!
Données de test prêtes à l'emploi

- `UpstreamPayloads` : réponses typiques des sources externes
- `ApiBodies` : corps JSON des requêtes de l'API REST
*/

use serde_json::{json, Value};

const REGION_SAMPLES: [(&str, &str); 10] = [
    ("us-east-1", "N. Virginia"),
    ("us-west-2", "Oregon"),
    ("eu-west-1", "Ireland"),
    ("eu-central-1", "Frankfurt"),
    ("ap-south-1", "Mumbai"),
    ("ap-northeast-1", "Tokyo"),
    ("ap-southeast-2", "Sydney"),
    ("sa-east-1", "São Paulo"),
    ("ca-central-1", "Montreal"),
    ("af-south-1", "Cape Town"),
];

/// Réponses amont au format des vraies API
pub struct UpstreamPayloads;

impl UpstreamPayloads {
    /// `n` régions avec code + location (cycle sur un jeu de régions réelles)
    pub fn regions(n: usize) -> Value {
        let entries: Vec<Value> = (0..n)
            .map(|i| {
                let (code, location) = REGION_SAMPLES[i % REGION_SAMPLES.len()];
                json!({ "code": code, "location": location })
            })
            .collect();
        Value::Array(entries)
    }

    pub fn regions_with_codes(codes: &[&str]) -> Value {
        Value::Array(
            codes
                .iter()
                .map(|code| json!({ "code": code, "location": format!("{code} datacenter") }))
                .collect(),
        )
    }

    /// Entrées sans code ni location : le mapping doit retomber sur id/name/country
    pub fn regions_without_codes() -> Value {
        json!([
            { "id": 42, "name": "Frankfurt" },
            { "country": "Japan" },
            {}
        ])
    }

    pub fn network_meta() -> Value {
        json!({
            "asn": 13335,
            "country": "FR",
            "city": "Paris",
            "colo": "CDG"
        })
    }

    pub fn rate_limit(remaining: u64, limit: u64) -> Value {
        json!({
            "resources": {
                "core": { "limit": limit, "remaining": remaining, "reset": 1700000000u64, "used": limit.saturating_sub(remaining) }
            },
            "rate": { "limit": limit, "remaining": remaining }
        })
    }
}

/// Corps de requêtes pour l'API REST
pub struct ApiBodies;

impl ApiBodies {
    pub fn server(server_id: &str, region: &str, status: &str, load: u64) -> Value {
        json!({ "serverId": server_id, "region": region, "status": status, "load": load })
    }

    pub fn ticket(ticket_id: &str, subject: &str, status: &str, priority: &str) -> Value {
        json!({ "ticketId": ticket_id, "subject": subject, "status": status, "priority": priority })
    }

    pub fn system_metric(cpu: f64, memory: f64, active_nodes: u64, total_nodes: u64, throughput: f64) -> Value {
        json!({
            "cpuUsage": cpu,
            "memoryUsage": memory,
            "activeNodes": active_nodes,
            "totalNodes": total_nodes,
            "networkThroughput": throughput
        })
    }

    pub fn user(username: &str, password: &str) -> Value {
        json!({ "username": username, "password": password })
    }
}
