use crate::live::fetch::DEFAULT_FETCH_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub http: HttpConf,
    pub storage: StorageConf,
    pub refresh: RefreshConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String, // ex: "0.0.0.0:8080"
    /// Clé exigée dans `x-api-key` (None = API ouverte)
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConf {
    pub data_file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConf {
    pub interval_secs: u64,
    pub fetch_timeout_ms: u64,
    pub user_agent: String,
    pub sources: SourcesConf,
    pub ranges: SyntheticRanges,
}

/// Endpoints externes utilisés comme sources "live"
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SourcesConf {
    pub regions_url: String,
    pub network_meta_url: String,
    pub rate_limit_url: String,
}

/// Plages des valeurs synthétiques (bornes basses incluses, hautes exclues)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyntheticRanges {
    pub network_throughput: [f64; 2],
    pub memory_usage: [f64; 2],
    pub system_throughput: [f64; 2],
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into(), api_key: None }
    }
}

impl Default for StorageConf {
    fn default() -> Self {
        Self { data_file: PathBuf::from("./data/command-center.json") }
    }
}

impl Default for RefreshConf {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            user_agent: concat!("command-center/", env!("CARGO_PKG_VERSION")).into(),
            sources: SourcesConf::default(),
            ranges: SyntheticRanges::default(),
        }
    }
}

impl Default for SourcesConf {
    fn default() -> Self {
        Self {
            regions_url: "https://api.llama-cloud.com/v1/regions".into(),
            network_meta_url: "https://speed.cloudflare.com/meta".into(),
            rate_limit_url: "https://api.github.com/rate_limit".into(),
        }
    }
}

impl Default for SyntheticRanges {
    fn default() -> Self {
        Self {
            network_throughput: [1000.0, 7000.0],
            memory_usage: [5.0, 20.0],
            system_throughput: [0.5, 5.0],
        }
    }
}

const MAX_PERCENT: f64 = 100.0;

impl SyntheticRanges {
    pub fn network_throughput(&self) -> Range<f64> {
        self.network_throughput[0]..self.network_throughput[1]
    }

    pub fn memory_usage(&self) -> Range<f64> {
        self.memory_usage[0]..self.memory_usage[1]
    }

    pub fn system_throughput(&self) -> Range<f64> {
        self.system_throughput[0]..self.system_throughput[1]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, [low, high]) in [
            ("network_throughput", self.network_throughput),
            ("memory_usage", self.memory_usage),
            ("system_throughput", self.system_throughput),
        ] {
            if !(low.is_finite() && high.is_finite() && low >= 0.0 && low < high) {
                return Err(ConfigError::Invalid(format!("refresh.ranges.{name} must be [low, high) with 0 <= low < high")));
            }
        }
        // pourcentage : doit rester acceptable par POST /api/system-metrics
        if self.memory_usage[1] > MAX_PERCENT {
            return Err(ConfigError::Invalid(format!("refresh.ranges.memory_usage must stay within 0..={MAX_PERCENT}")));
        }
        Ok(())
    }
}

impl RefreshConf {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh.interval_secs must be > 0".into()));
        }
        if self.refresh.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("refresh.fetch_timeout_ms must be > 0".into()));
        }
        self.refresh.ranges.validate()
    }

    /// Surcharges par variables d'environnement (après lecture du YAML)
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("COMMAND_CENTER_BIND") {
            self.http.bind = bind;
        }
        if let Ok(data_file) = std::env::var("COMMAND_CENTER_DATA_FILE") {
            self.storage.data_file = PathBuf::from(data_file);
        }
        if let Ok(key) = std::env::var("COMMAND_CENTER_API_KEY") {
            if !key.is_empty() {
                self.http.api_key = Some(key);
            }
        }
    }
}

pub fn parse_config(txt: &str, path: &str) -> Result<KernelConfig, ConfigError> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

pub async fn load_config() -> Result<KernelConfig, ConfigError> {
    let path = std::env::var("COMMAND_CENTER_CONFIG").unwrap_or_else(|_| "command-center.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        info!("[config] loaded {}", path);
        parse_config(&txt, &path)?
    } else {
        warn!("[config] pas de {}, usage config par défaut", path);
        KernelConfig::default()
    };
    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.refresh.interval(), Duration::from_secs(15));
        assert_eq!(cfg.refresh.fetch_timeout(), Duration::from_millis(5000));
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "refresh:\n  interval_secs: 30\n  sources:\n    regions_url: http://localhost:9000/regions\n";
        let cfg = parse_config(yaml, "test.yaml").unwrap();
        assert_eq!(cfg.refresh.interval_secs, 30);
        assert_eq!(cfg.refresh.fetch_timeout_ms, 5000);
        assert_eq!(cfg.refresh.sources.regions_url, "http://localhost:9000/regions");
        assert_eq!(cfg.refresh.sources.rate_limit_url, SourcesConf::default().rate_limit_url);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let cfg = parse_config("  \n", "empty.yaml").unwrap();
        assert_eq!(cfg.refresh.ranges, SyntheticRanges::default());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(matches!(parse_config("refresh: [1, 2", "bad.yaml"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut cfg = KernelConfig::default();
        cfg.refresh.ranges.memory_usage = [20.0, 5.0];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_memory_range_capped_at_hundred_percent() {
        let mut cfg = KernelConfig::default();
        cfg.refresh.ranges.memory_usage = [50.0, 100.0];
        assert!(cfg.validate().is_ok());

        let yaml = "refresh:\n  ranges:\n    memory_usage: [90.0, 150.0]\n";
        let cfg = parse_config(yaml, "test.yaml").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("memory_usage")));
        // la plage réseau n'est pas un pourcentage
        let mut cfg = KernelConfig::default();
        cfg.refresh.ranges.network_throughput = [1000.0, 90000.0];
        assert!(cfg.validate().is_ok());
    }
}
