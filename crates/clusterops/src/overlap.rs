//! Shard overlap between a set of nodes and the rest of the cluster.
//!
//! Node filters are compiled as unanchored regular expressions, so a plain
//! node name also works as a filter. A name containing regex metacharacters
//! (`.`, `+`, ...) or one that is a prefix of other names (`es-1` vs `es-10`)
//! matches more nodes than intended.
//!
//! A relocating shard reports both its source and target node in one
//! descriptor; a filter matching either half selects the shard.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cluster::{ClusterStateReader, ShardRecord, ShardRole};
use crate::error::{OpsError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardOverlap {
    pub index: String,
    pub shard: u32,
    pub primary_found: bool,
    pub replicas_found: u32,
    pub replicas_total: u32,
}

impl ShardOverlap {
    /// False when the selected nodes hold the live primary and at least as many
    /// live replicas as configured, i.e. every copy would go with them.
    pub fn safe_to_remove(&self) -> bool {
        !(self.primary_found && self.replicas_found >= self.replicas_total)
    }
}

pub fn overlap_key(index: &str, shard: u32) -> String {
    format!("{}_{}", index, shard)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapReport {
    pub shards: BTreeMap<String, ShardOverlap>,
}

impl OverlapReport {
    pub fn get(&self, index: &str, shard: u32) -> Option<&ShardOverlap> {
        self.shards.get(&overlap_key(index, shard))
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn unsafe_shards(&self) -> Vec<&ShardOverlap> {
        self.shards.values().filter(|o| !o.safe_to_remove()).collect()
    }

    pub fn is_safe(&self) -> bool {
        self.shards.values().all(ShardOverlap::safe_to_remove)
    }
}

pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| OpsError::InvalidPattern {
                pattern: p.clone(),
                msg: e.to_string(),
            })
        })
        .collect()
}

/// Keeps the records whose node descriptor matches any filter; no filters keeps all.
pub fn filter_shards<'a>(shards: &'a [ShardRecord], filters: &[Regex]) -> Vec<&'a ShardRecord> {
    shards
        .iter()
        .filter(|s| filters.is_empty() || filters.iter().any(|re| re.is_match(&s.node)))
        .collect()
}

/// Folds shard copies into one overlap entry per `(index, shard)`.
pub fn fold_overlap<'a>(
    shards: impl IntoIterator<Item = &'a ShardRecord>,
    replica_counts: &HashMap<String, u32>,
) -> OverlapReport {
    let mut report = OverlapReport::default();
    for record in shards {
        let replicas_total = match replica_counts.get(&record.index) {
            Some(n) => *n,
            None => {
                warn!(index = %record.index, "index missing from index listing, assuming 0 replicas");
                0
            }
        };
        let entry = report
            .shards
            .entry(overlap_key(&record.index, record.shard))
            .or_insert_with(|| ShardOverlap {
                index: record.index.clone(),
                shard: record.shard,
                primary_found: false,
                replicas_found: 0,
                replicas_total,
            });

        if !record.state.is_live() {
            continue;
        }
        match record.role {
            ShardRole::Primary => entry.primary_found = true,
            ShardRole::Replica => entry.replicas_found += 1,
        }
    }
    report
}

pub struct OverlapAnalyzer {
    reader: Arc<dyn ClusterStateReader>,
}

impl OverlapAnalyzer {
    pub fn new(reader: Arc<dyn ClusterStateReader>) -> Self {
        Self { reader }
    }

    /// Overlap of the shards living on nodes matching `patterns`.
    pub async fn analyze(&self, patterns: &[String]) -> Result<OverlapReport> {
        let filters = compile_patterns(patterns)?;
        let shards = self.reader.get_shards().await?;
        let replica_counts: HashMap<String, u32> = self
            .reader
            .get_indices()
            .await?
            .into_iter()
            .map(|i| (i.name, i.replica_count))
            .collect();

        let selected = filter_shards(&shards, &filters);
        debug!(
            total = shards.len(),
            selected = selected.len(),
            "computing shard overlap"
        );
        Ok(fold_overlap(selected, &replica_counts))
    }
}
