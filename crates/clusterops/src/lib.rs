//! Cluster operations core: node exclusions, cluster settings, shard overlap
//! safety and recovery estimates for a distributed search cluster.
//!
//! Each operation is one or two request/response cycles against the cluster.
//! Nothing is retried; dropping a returned future cancels the request in flight.
//!
//! Mutating operations (`drain`, `fill`, `set`) read the current value and then
//! write a new one. The cluster offers no compare-and-swap, so callers must run
//! at most one mutation per cluster at a time or risk a lost update.

pub mod cluster;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod flatten;
pub mod http;
pub mod overlap;
pub mod recovery;
pub mod settings;

pub use cluster::{
    ClusterStateReader, IndexInfo, RecoveryRecord, RemoteSettingsStore, ShardRecord, ShardRole,
    ShardState, StoreResponse,
};
pub use config::ClusterConfig;
pub use error::{OpsError, Result};
pub use exclusion::{ExclusionManager, ExclusionSettings};
pub use http::HttpCluster;
pub use overlap::{OverlapAnalyzer, OverlapReport, ShardOverlap};
pub use recovery::{Eta, RecoveryMonitor, RecoveryProgress, RecoverySample};
pub use settings::{ClusterSettings, Setting, SettingChange, SettingsManager};

use std::sync::Arc;

/// All operations against one cluster, sharing a single pair of collaborators.
#[derive(Clone)]
pub struct ClusterOps {
    reader: Arc<dyn ClusterStateReader>,
    store: Arc<dyn RemoteSettingsStore>,
}

impl ClusterOps {
    pub fn new(reader: Arc<dyn ClusterStateReader>, store: Arc<dyn RemoteSettingsStore>) -> Self {
        Self { reader, store }
    }

    /// Operations over the cluster's HTTP API.
    pub fn connect(config: &ClusterConfig) -> Result<Self> {
        let http = Arc::new(HttpCluster::new(config)?);
        Ok(Self::new(http.clone(), http))
    }

    pub fn exclusions(&self) -> ExclusionManager {
        ExclusionManager::new(self.reader.clone(), self.store.clone())
    }

    pub fn settings(&self) -> SettingsManager {
        SettingsManager::new(self.reader.clone(), self.store.clone())
    }

    pub fn overlap(&self) -> OverlapAnalyzer {
        OverlapAnalyzer::new(self.reader.clone())
    }

    pub fn recoveries(&self) -> RecoveryMonitor {
        RecoveryMonitor::new(self.reader.clone())
    }
}
