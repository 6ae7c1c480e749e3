//! Node exclusion lists used to drain shards off nodes and let them back in.
//!
//! Every mutation here is read-then-write against a store without
//! compare-and-swap. Two overlapping drains or fills against the same cluster
//! can lose one of the changes; callers must serialize mutations per cluster.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cluster::{settings_group, ClusterStateReader, RemoteSettingsStore, SETTINGS_PATH};
use crate::error::Result;
use crate::flatten::flatten;

pub const EXCLUDE_NAME_KEY: &str = "cluster.routing.allocation.exclude._name";
pub const EXCLUDE_IP_KEY: &str = "cluster.routing.allocation.exclude._ip";
pub const EXCLUDE_HOST_KEY: &str = "cluster.routing.allocation.exclude._host";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSettings {
    pub names: Vec<String>,
    pub ips: Vec<String>,
    pub hosts: Vec<String>,
}

impl ExclusionSettings {
    /// Reads the three lists from the `transient` group of a settings document.
    pub fn from_transient(doc: &Value) -> Result<Self> {
        let flat = flatten(settings_group(doc, "transient")?);
        let list = |key: &str| split_list(flat.get(key).map(String::as_str).unwrap_or(""));
        Ok(Self {
            names: list(EXCLUDE_NAME_KEY),
            ips: list(EXCLUDE_IP_KEY),
            hosts: list(EXCLUDE_HOST_KEY),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.ips.is_empty() && self.hosts.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Splits a comma-joined upstream value. An empty value is an empty list.
pub fn split_list(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(',').map(str::to_string).collect()
}

pub fn join_list(items: &[String]) -> String {
    items.join(",")
}

pub struct ExclusionManager {
    reader: Arc<dyn ClusterStateReader>,
    store: Arc<dyn RemoteSettingsStore>,
}

impl ExclusionManager {
    pub fn new(reader: Arc<dyn ClusterStateReader>, store: Arc<dyn RemoteSettingsStore>) -> Self {
        Self { reader, store }
    }

    pub async fn read(&self) -> Result<ExclusionSettings> {
        let doc = self.reader.get_raw_settings().await?;
        ExclusionSettings::from_transient(&doc)
    }

    /// Adds `node` to the excluded names. Draining the same node twice lists it twice.
    pub async fn drain(&self, node: &str) -> Result<ExclusionSettings> {
        let current = self.read().await?;
        let mut names = current.names;
        names.push(node.to_string());

        let resp = self.put_names(&names).await?;
        let written = ExclusionSettings::from_transient(&resp)?;
        info!(node = %node, excluded = %join_list(&written.names), "drained node");

        // The write only echoes `_name`; ips and hosts were not touched.
        Ok(ExclusionSettings {
            names: written.names,
            ips: current.ips,
            hosts: current.hosts,
        })
    }

    /// Removes every occurrence of `node` (trimmed) from the excluded names.
    pub async fn fill(&self, node: &str) -> Result<ExclusionSettings> {
        let current = self.read().await?;
        let node = node.trim();
        let names: Vec<String> = current.names.into_iter().filter(|n| n != node).collect();

        self.put_names(&names).await?;
        let refreshed = self.read().await?;
        info!(node = %node, excluded = %join_list(&refreshed.names), "filled node");
        Ok(refreshed)
    }

    /// Clears all three exclusion lists in a single write.
    pub async fn fill_all(&self) -> Result<ExclusionSettings> {
        let body = json!({
            "transient": {
                "cluster.routing.allocation.exclude": {
                    "_name": "",
                    "_ip": "",
                    "_host": "",
                }
            }
        });
        debug!(path = SETTINGS_PATH, "clearing all exclusions");
        let resp = self.store.put(SETTINGS_PATH, &body).await?.ensure_success()?;
        let settings = ExclusionSettings::from_transient(&resp)?;
        info!("filled all nodes");
        Ok(settings)
    }

    async fn put_names(&self, names: &[String]) -> Result<Value> {
        let body = json!({
            "transient": { EXCLUDE_NAME_KEY: join_list(names) }
        });
        debug!(path = SETTINGS_PATH, body = %body, "writing excluded names");
        self.store.put(SETTINGS_PATH, &body).await?.ensure_success()
    }
}
