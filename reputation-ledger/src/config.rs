//! Configuration for the reputation ledger

use crate::registry::ConfigLookup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Config key of the daily cap
pub const DAILY_RANK_LIMIT: &str = "daily_rank_limit";

/// Config key of the cap-exempt activity keys
pub const DAILY_RANK_LIMIT_EXCLUDE: &str = "daily_rank_limit.exclude";

/// Prefix of per-activity delta keys (`rank.<kind>.<action>`)
pub const RANK_KEY_PREFIX: &str = "rank.";

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Rank deltas and daily cap
    pub rank: RankConfig,

    /// Notification queue configuration
    pub notification: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/reputation"),
            service_name: "reputation-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            rank: RankConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Rank deltas per activity key and the daily cap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Maximum capped gain per user per day
    pub daily_rank_limit: i64,

    /// Activity keys exempt from the daily cap
    pub daily_rank_limit_exclude: Vec<String>,

    /// Signed delta per activity key (`answer.voted_up` = 10)
    pub deltas: BTreeMap<String, i64>,
}

impl Default for RankConfig {
    fn default() -> Self {
        let deltas = [
            ("question.vote_up", 0),
            ("question.voted_up", 10),
            ("question.vote_down", 0),
            ("question.voted_down", -2),
            ("answer.vote_up", 0),
            ("answer.voted_up", 10),
            ("answer.vote_down", -1),
            ("answer.voted_down", -2),
            ("answer.accept", 2),
            ("answer.accepted", 15),
            ("comment.vote_up", 0),
            ("comment.vote_down", 0),
            ("question.follow", 0),
            ("tag.follow", 0),
            ("user.follow", 0),
        ]
        .into_iter()
        .map(|(key, delta)| (key.to_string(), delta))
        .collect();

        Self {
            daily_rank_limit: 200,
            daily_rank_limit_exclude: vec!["answer.accepted".to_string()],
            deltas,
        }
    }
}

impl RankConfig {
    /// Override one delta
    pub fn with_delta(mut self, key: impl Into<String>, delta: i64) -> Self {
        self.deltas.insert(key.into(), delta);
        self
    }
}

impl ConfigLookup for RankConfig {
    fn get_int(&self, key: &str) -> crate::Result<i64> {
        if key == DAILY_RANK_LIMIT {
            return Ok(self.daily_rank_limit);
        }
        key.strip_prefix(RANK_KEY_PREFIX)
            .and_then(|activity_key| self.deltas.get(activity_key))
            .copied()
            .ok_or_else(|| crate::Error::Config(format!("missing integer key {}", key)))
    }

    fn get_array_string(&self, key: &str) -> crate::Result<Vec<String>> {
        if key == DAILY_RANK_LIMIT_EXCLUDE {
            return Ok(self.daily_rank_limit_exclude.clone());
        }
        Err(crate::Error::Config(format!("missing list key {}", key)))
    }
}

/// Notification queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Bounded queue capacity
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: notice_bus::DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("REPUTATION_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(limit) = std::env::var("REPUTATION_DAILY_RANK_LIMIT") {
            config.rank.daily_rank_limit = limit.parse().map_err(|_| {
                crate::Error::Config(format!("REPUTATION_DAILY_RANK_LIMIT is not an integer: {}", limit))
            })?;
        }

        if let Ok(capacity) = std::env::var("REPUTATION_NOTICE_CAPACITY") {
            config.notification.queue_capacity = capacity.parse().map_err(|_| {
                crate::Error::Config(format!("REPUTATION_NOTICE_CAPACITY is not a number: {}", capacity))
            })?;
        }

        Ok(config)
    }
}
