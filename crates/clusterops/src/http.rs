//! HTTP implementation of the cluster collaborators.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::cluster::{
    ClusterStateReader, IndexInfo, RecoveryRecord, RemoteSettingsStore, ShardRecord, ShardRole,
    ShardState, StoreResponse, SETTINGS_PATH,
};
use crate::config::ClusterConfig;
use crate::error::{OpsError, Result};

const SHARDS_PATH: &str = "_cat/shards?format=json&h=index,shard,prirep,state,node";
const INDICES_PATH: &str = "_cat/indices?format=json&h=index,rep";
// Time is left in the cluster's unit-suffixed form (`350ms`, `1.2h`); an explicit
// `time=` unit would print bare numbers.
const RECOVERY_PATH: &str = "_cat/recovery?format=json&active_only=true&bytes=b\
    &h=index,shard,time,type,stage,source_node,target_node,bytes_total,bytes_recovered";

/// Talks to one cluster over its HTTP API. Every request is bounded by the
/// configured timeout and never retried.
pub struct HttpCluster {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCluster {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| OpsError::Config { msg: e.to_string() })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn transport_error(&self, e: reqwest::Error) -> OpsError {
        if e.is_timeout() {
            OpsError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            OpsError::Transport { msg: e.to_string() }
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<StoreResponse> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok(StoreResponse { status, body })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(method = "GET", path = %path, "cluster request");
        let resp = self.send(self.client.get(self.url(path))).await?;
        let doc = resp.ensure_success()?;
        serde_json::from_value(doc)
            .map_err(|e| OpsError::malformed(format!("unexpected shape from {}: {}", path, e)))
    }
}

#[derive(Deserialize)]
struct CatShardRow {
    index: String,
    shard: String,
    prirep: String,
    state: String,
    node: Option<String>,
}

impl TryFrom<CatShardRow> for ShardRecord {
    type Error = OpsError;

    fn try_from(row: CatShardRow) -> Result<Self> {
        let shard = parse_number(&row.shard, "shard")?;
        let role = ShardRole::parse(&row.prirep)
            .ok_or_else(|| OpsError::malformed(format!("unknown shard role {:?}", row.prirep)))?;
        Ok(ShardRecord {
            index: row.index,
            shard,
            role,
            state: ShardState::parse(&row.state),
            node: row.node.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct CatIndexRow {
    index: String,
    rep: String,
}

#[derive(Deserialize)]
struct CatRecoveryRow {
    index: String,
    shard: String,
    time: String,
    #[serde(rename = "type")]
    recovery_type: String,
    stage: String,
    source_node: Option<String>,
    target_node: Option<String>,
    bytes_total: String,
    bytes_recovered: String,
}

impl TryFrom<CatRecoveryRow> for RecoveryRecord {
    type Error = OpsError;

    fn try_from(row: CatRecoveryRow) -> Result<Self> {
        Ok(RecoveryRecord {
            shard: parse_number(&row.shard, "shard")?,
            bytes_total: parse_number(&row.bytes_total, "bytes_total")?,
            bytes_recovered: parse_number(&row.bytes_recovered, "bytes_recovered")?,
            index: row.index,
            stage: row.stage,
            recovery_type: row.recovery_type,
            source_node: row.source_node.unwrap_or_default(),
            target_node: row.target_node.unwrap_or_default(),
            elapsed: row.time,
        })
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, field: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| OpsError::malformed(format!("{} is not a number: {:?}", field, text)))
}

#[async_trait]
impl ClusterStateReader for HttpCluster {
    async fn get_shards(&self) -> Result<Vec<ShardRecord>> {
        let rows: Vec<CatShardRow> = self.get_json(SHARDS_PATH).await?;
        rows.into_iter().map(ShardRecord::try_from).collect()
    }

    async fn get_indices(&self) -> Result<Vec<IndexInfo>> {
        let rows: Vec<CatIndexRow> = self.get_json(INDICES_PATH).await?;
        rows.into_iter()
            .map(|row| {
                Ok(IndexInfo {
                    replica_count: parse_number(&row.rep, "rep")?,
                    name: row.index,
                })
            })
            .collect()
    }

    async fn get_raw_settings(&self) -> Result<Value> {
        self.get_json(SETTINGS_PATH).await
    }

    async fn get_recoveries(&self) -> Result<Vec<RecoveryRecord>> {
        let rows: Vec<CatRecoveryRow> = self.get_json(RECOVERY_PATH).await?;
        rows.into_iter().map(RecoveryRecord::try_from).collect()
    }
}

#[async_trait]
impl RemoteSettingsStore for HttpCluster {
    async fn put(&self, path: &str, body: &Value) -> Result<StoreResponse> {
        debug!(method = "PUT", path = %path, "cluster request");
        self.send(self.client.put(self.url(path)).json(body)).await
    }
}
