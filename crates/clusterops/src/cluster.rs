//! Cluster-facing capability interfaces and the records they return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{OpsError, Result};

/// Path every settings mutation is written to.
pub const SETTINGS_PATH: &str = "_cluster/settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardRole {
    Primary,
    Replica,
}

impl ShardRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "primary" => Some(ShardRole::Primary),
            "r" | "replica" => Some(ShardRole::Replica),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardState {
    Started,
    Relocating,
    Initializing,
    Unassigned,
    Other(String),
}

impl ShardState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "STARTED" => ShardState::Started,
            "RELOCATING" => ShardState::Relocating,
            "INITIALIZING" => ShardState::Initializing,
            "UNASSIGNED" => ShardState::Unassigned,
            other => ShardState::Other(other.to_string()),
        }
    }

    /// A copy in this state holds data and serves it.
    pub fn is_live(&self) -> bool {
        matches!(self, ShardState::Started | ShardState::Relocating)
    }
}

impl fmt::Display for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardState::Started => f.write_str("STARTED"),
            ShardState::Relocating => f.write_str("RELOCATING"),
            ShardState::Initializing => f.write_str("INITIALIZING"),
            ShardState::Unassigned => f.write_str("UNASSIGNED"),
            ShardState::Other(s) => f.write_str(s),
        }
    }
}

/// One shard copy as placed on the cluster.
///
/// `node` is the plain node name, except while relocating where the cluster
/// reports `"<source> -> <target address> <target id> <target>"` in one string.
/// Unassigned copies have an empty `node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub index: String,
    pub shard: u32,
    pub role: ShardRole,
    pub state: ShardState,
    pub node: String,
}

impl ShardRecord {
    pub fn new(index: &str, shard: u32, role: ShardRole, state: ShardState, node: &str) -> Self {
        Self {
            index: index.to_string(),
            shard,
            role,
            state,
            node: node.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub replica_count: u32,
}

impl IndexInfo {
    pub fn new(name: &str, replica_count: u32) -> Self {
        Self {
            name: name.to_string(),
            replica_count,
        }
    }
}

/// One in-flight shard recovery. `elapsed` is the raw time text reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub index: String,
    pub shard: u32,
    pub stage: String,
    pub recovery_type: String,
    pub source_node: String,
    pub target_node: String,
    pub elapsed: String,
    pub bytes_total: u64,
    pub bytes_recovered: u64,
}

/// Raw outcome of a write against the remote settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: u16,
    pub body: String,
}

impl StoreResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body of a 2xx response; any other status becomes `BadStatus`
    /// with the body kept verbatim.
    pub fn ensure_success(self) -> Result<Value> {
        if !self.is_success() {
            return Err(OpsError::BadStatus {
                status: self.status,
                body: self.body,
            });
        }
        serde_json::from_str(&self.body)
            .map_err(|e| OpsError::malformed(format!("response body is not JSON: {}", e)))
    }
}

/// Read-only view of cluster placement and configuration.
#[async_trait]
pub trait ClusterStateReader: Send + Sync {
    /// Every shard copy in the cluster.
    async fn get_shards(&self) -> Result<Vec<ShardRecord>>;

    /// Every index with its configured replica count.
    async fn get_indices(&self) -> Result<Vec<IndexInfo>>;

    /// Settings document with top-level `persistent` and `transient` objects.
    async fn get_raw_settings(&self) -> Result<Value>;

    /// Shard recoveries currently in flight.
    async fn get_recoveries(&self) -> Result<Vec<RecoveryRecord>>;
}

/// Key/value writes against the cluster's settings endpoint.
///
/// Writes are not versioned: the store offers no compare-and-swap, so a
/// read-modify-write built on top of it is only correct while a single
/// mutator works on a given cluster at a time.
#[async_trait]
pub trait RemoteSettingsStore: Send + Sync {
    /// Sends `body` to `path`. Transport failures are errors; an HTTP status,
    /// successful or not, is returned as-is in the `StoreResponse`.
    async fn put(&self, path: &str, body: &Value) -> Result<StoreResponse>;
}

/// Top-level settings group of a settings document.
pub(crate) fn settings_group<'a>(doc: &'a Value, group: &str) -> Result<&'a Value> {
    match doc.get(group) {
        Some(v) if v.is_object() => Ok(v),
        Some(_) => Err(OpsError::malformed(format!("`{}` is not an object", group))),
        None => Err(OpsError::malformed(format!("missing `{}` settings", group))),
    }
}
