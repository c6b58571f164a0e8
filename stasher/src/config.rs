//! Runtime configuration for a Stasher node
//!
//! Mirrors the `qnet-api` pattern of a `Config` struct with a `Default`
//! impl and a `from_env` constructor reading `STASHER_*` variables.

use std::time::Duration;

/// Tunable parameters for the DHT core (spec.md §2, §4.5-§4.9)
#[derive(Debug, Clone)]
pub struct StasherConfig {
    /// Max entries per k-bucket and max result size for lookups
    pub k: usize,
    /// Max concurrent in-flight queries per iterative lookup
    pub alpha: usize,
    /// Max stored value size in bytes
    pub max_value_len: usize,
    /// Number of closest nodes a STORE fans out to
    pub num_store: usize,
    /// PING RPC deadline
    pub t_ping: Duration,
    /// FIND_NODE / FIND_VALUE per-query deadline
    pub t_find_node: Duration,
    /// STORE per-query deadline
    pub t_store: Duration,
    /// Reactor housekeeping tick interval
    pub tick_interval: Duration,
    /// Directory holding the `noderefs` and `values` column families
    pub data_dir: String,
    /// Run a self-targeted FIND_NODE after loading noderefs on start()
    pub refresh_on_start: bool,
}

impl Default for StasherConfig {
    fn default() -> Self {
        Self {
            k: 20,
            alpha: 10,
            max_value_len: 30_000,
            num_store: 10,
            t_ping: Duration::from_secs(60),
            t_find_node: Duration::from_secs(20),
            t_store: Duration::from_secs(20),
            tick_interval: Duration::from_secs(1),
            data_dir: "./stasher-data".to_string(),
            refresh_on_start: true,
        }
    }
}

impl StasherConfig {
    /// Build a config from `STASHER_*` environment variables, falling back
    /// to [`Default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            k: env_usize("STASHER_K", default.k),
            alpha: env_usize("STASHER_ALPHA", default.alpha),
            max_value_len: env_usize("STASHER_MAX_VALUE_LEN", default.max_value_len),
            num_store: env_usize("STASHER_NUM_STORE", default.num_store),
            t_ping: env_secs("STASHER_T_PING", default.t_ping),
            t_find_node: env_secs("STASHER_T_FIND_NODE", default.t_find_node),
            t_store: env_secs("STASHER_T_STORE", default.t_store),
            tick_interval: env_secs("STASHER_TICK_INTERVAL", default.tick_interval),
            data_dir: std::env::var("STASHER_DATA_DIR").unwrap_or(default.data_dir),
            refresh_on_start: std::env::var("STASHER_REFRESH_ON_START")
                .map(|v| v != "0")
                .unwrap_or(default.refresh_on_start),
        }
    }
}

fn env_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_secs(key: &str, fallback: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = StasherConfig::default();
        assert_eq!(cfg.k, 20);
        assert_eq!(cfg.max_value_len, 30_000);
        assert_eq!(cfg.num_store, 10);
    }
}
