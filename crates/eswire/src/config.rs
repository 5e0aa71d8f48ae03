//! Configuration types for eswire.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main run configuration. Built once before a run and read-only after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Cluster admin endpoint.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Data directories of the target node (`path.data`).
    #[serde(default = "default_data_dirs")]
    pub data_dirs: Vec<PathBuf>,
    /// How shards are forced onto the target node.
    #[serde(default)]
    pub relocation: RelocationConfig,
    /// Settlement polling.
    #[serde(default)]
    pub poll: PollConfig,
    /// Local segment store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Run options.
    #[serde(default)]
    pub options: RunOptions,
}

/// Cluster admin endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// REST URL of the node that runs next to the data directories.
    #[serde(default = "default_url")]
    pub url: String,
    /// Optional username for Basic auth.
    pub username: Option<String>,
    /// Optional password for Basic auth.
    pub password: Option<String>,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Timeout of ordinary admin requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout of the blocking force-merge request, in seconds.
    #[serde(default = "default_merge_timeout")]
    pub merge_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            merge_timeout_secs: default_merge_timeout(),
        }
    }
}

impl ClusterConfig {
    /// Ordinary request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Force-merge request timeout.
    #[must_use]
    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_secs)
    }
}

/// Relocation of all primaries onto the target node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocationConfig {
    /// `node.attr.<key>` set only on the target node.
    #[serde(default = "default_node_attr_key")]
    pub node_attr_key: String,
    /// Value of that attribute.
    #[serde(default = "default_node_attr_value")]
    pub node_attr_value: String,
    /// Node id used to confirm every primary landed on the target node.
    /// Without it, an empty recovery list is the only settlement signal.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Issue `_cluster/reroute` right after the allocation update.
    #[serde(default)]
    pub explicit_reroute: bool,
}

impl Default for RelocationConfig {
    fn default() -> Self {
        Self {
            node_attr_key: default_node_attr_key(),
            node_attr_value: default_node_attr_value(),
            node_id: None,
            explicit_reroute: false,
        }
    }
}

impl RelocationConfig {
    /// The `index.routing.allocation.require.*` setting key.
    #[must_use]
    pub fn setting_key(&self) -> String {
        format!("index.routing.allocation.require.{}", self.node_attr_key)
    }
}

/// Fixed-interval polling used while waiting for the cluster to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between two polls.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Polls before giving up with a timeout error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollConfig {
    /// Interval between polls.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Local segment store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Stored field holding the raw document payload.
    #[serde(default = "default_payload_field")]
    pub payload_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            payload_field: default_payload_field(),
        }
    }
}

/// Run options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Delete the index once every document was delivered.
    #[serde(default)]
    pub delete_after_export: bool,
}

fn default_url() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_merge_timeout() -> u64 {
    6 * 3600
}

fn default_data_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("/var/lib/elasticsearch")]
}

fn default_node_attr_key() -> String {
    "eswire".to_string()
}

fn default_node_attr_value() -> String {
    "yup".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    // 5s * 8640 = 12h
    8640
}

fn default_payload_field() -> String {
    "_source".to_string()
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            data_dirs: default_data_dirs(),
            relocation: RelocationConfig::default(),
            poll: PollConfig::default(),
            store: StoreConfig::default(),
            options: RunOptions::default(),
        }
    }
}

impl WireConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        crate::cluster::common::validate_url(&self.cluster.url)?;
        if self.data_dirs.is_empty() {
            return Err(Error::Config(
                "at least one data directory is required".to_string(),
            ));
        }
        if self.relocation.node_attr_key.trim().is_empty()
            || self.relocation.node_attr_value.trim().is_empty()
        {
            return Err(Error::Config(
                "node attribute key and value cannot be empty".to_string(),
            ));
        }
        if matches!(&self.relocation.node_id, Some(id) if id.trim().is_empty()) {
            return Err(Error::Config("node_id cannot be blank".to_string()));
        }
        if self.poll.interval_secs == 0 {
            return Err(Error::Config(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        if self.poll.max_attempts == 0 {
            return Err(Error::Config(
                "poll max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.store.payload_field.is_empty() {
            return Err(Error::Config("payload field cannot be empty".to_string()));
        }
        Ok(())
    }
}
