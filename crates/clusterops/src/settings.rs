//! Read-modify-write of arbitrary dotted cluster settings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cluster::{settings_group, ClusterStateReader, RemoteSettingsStore, SETTINGS_PATH};
use crate::error::Result;
use crate::flatten::flatten;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

fn to_settings(flat: BTreeMap<String, String>) -> Vec<Setting> {
    // BTreeMap iteration is already ordered by key.
    flat.into_iter()
        .map(|(key, value)| Setting { key, value })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub persistent: Vec<Setting>,
    pub transient: Vec<Setting>,
}

impl ClusterSettings {
    pub fn from_document(doc: &Value) -> Result<Self> {
        Ok(Self {
            persistent: to_settings(flatten(settings_group(doc, "persistent")?)),
            transient: to_settings(flatten(settings_group(doc, "transient")?)),
        })
    }

    /// Effective value of `key`: transient wins over persistent.
    pub fn find(&self, key: &str) -> Option<&str> {
        fn lookup<'a>(group: &'a [Setting], key: &str) -> Option<&'a str> {
            group
                .iter()
                .find(|s| s.key == key)
                .map(|s| s.value.as_str())
        }
        lookup(&self.transient, key).or_else(|| lookup(&self.persistent, key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }
}

/// Outcome of a single `set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

pub struct SettingsManager {
    reader: Arc<dyn ClusterStateReader>,
    store: Arc<dyn RemoteSettingsStore>,
}

impl SettingsManager {
    pub fn new(reader: Arc<dyn ClusterStateReader>, store: Arc<dyn RemoteSettingsStore>) -> Self {
        Self { reader, store }
    }

    pub async fn get(&self) -> Result<ClusterSettings> {
        let doc = self.reader.get_raw_settings().await?;
        ClusterSettings::from_document(&doc)
    }

    /// Writes `key` as a transient setting. `None` resets it to the cluster default.
    ///
    /// The old value is resolved from a read taken before the write; a
    /// concurrent writer between the two calls is not detected.
    pub async fn set(&self, key: &str, value: Option<&str>) -> Result<SettingChange> {
        let current = self.get().await?;
        let old_value = current.find(key).map(str::to_string);

        let body = json!({ "transient": { key: value } });
        debug!(path = SETTINGS_PATH, body = %body, "writing setting");
        let resp = self.store.put(SETTINGS_PATH, &body).await?.ensure_success()?;
        let new_value = flatten(settings_group(&resp, "transient")?).remove(key);

        info!(
            key = %key,
            old = old_value.as_deref().unwrap_or("<unset>"),
            new = new_value.as_deref().unwrap_or("<default>"),
            "updated cluster setting"
        );
        Ok(SettingChange {
            key: key.to_string(),
            old_value,
            new_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeCluster;
    use crate::error::OpsError;

    fn manager(fake: FakeCluster) -> (Arc<FakeCluster>, SettingsManager) {
        let fake = Arc::new(fake);
        let mgr = SettingsManager::new(fake.clone(), fake.clone());
        (fake, mgr)
    }

    #[test]
    fn test_from_document_sorted_and_no_empty_values() {
        let doc = json!({
            "persistent": {
                "indices": {"recovery": {"max_bytes_per_sec": "100mb"}},
                "action.destructive_requires_name": "true"
            },
            "transient": {
                "cluster": {"routing": {"allocation": {
                    "exclude": {"_name": ""},
                    "enable": "primaries"
                }}}
            }
        });
        let settings = ClusterSettings::from_document(&doc).unwrap();
        let keys: Vec<_> = settings.persistent.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["action.destructive_requires_name", "indices.recovery.max_bytes_per_sec"]
        );
        assert_eq!(
            settings.transient,
            vec![Setting {
                key: "cluster.routing.allocation.enable".to_string(),
                value: "primaries".to_string(),
            }]
        );
    }

    #[test]
    fn test_from_document_missing_group() {
        assert!(matches!(
            ClusterSettings::from_document(&json!({"transient": {}})),
            Err(OpsError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_find_prefers_transient() {
        let settings = ClusterSettings {
            persistent: vec![Setting {
                key: "k".to_string(),
                value: "p".to_string(),
            }],
            transient: vec![Setting {
                key: "k".to_string(),
                value: "t".to_string(),
            }],
        };
        assert_eq!(settings.find("k"), Some("t"));
        assert_eq!(settings.find("other"), None);

        let persistent_only = ClusterSettings {
            transient: Vec::new(),
            ..settings
        };
        assert_eq!(persistent_only.find("k"), Some("p"));
    }

    #[tokio::test]
    async fn test_get() {
        let (_, mgr) = manager(
            FakeCluster::new()
                .with_persistent("b.key", "2")
                .with_persistent("a.key", "1")
                .with_transient("t.key", "x"),
        );
        let settings = mgr.get().await.unwrap();
        assert_eq!(settings.persistent.len(), 2);
        assert_eq!(settings.persistent[0].key, "a.key");
        assert_eq!(settings.transient[0].value, "x");
    }

    #[tokio::test]
    async fn test_set_new_value() {
        let (fake, mgr) = manager(FakeCluster::new());
        let change = mgr
            .set("cluster.routing.allocation.enable", Some("none"))
            .await
            .unwrap();
        assert_eq!(change.old_value, None);
        assert_eq!(change.new_value, Some("none".to_string()));
        assert_eq!(
            fake.puts()[0].1,
            json!({"transient": {"cluster.routing.allocation.enable": "none"}})
        );
    }

    #[tokio::test]
    async fn test_set_old_value_falls_back_to_persistent() {
        let (_, mgr) = manager(FakeCluster::new().with_persistent("indices.recovery.max_bytes_per_sec", "40mb"));
        let change = mgr
            .set("indices.recovery.max_bytes_per_sec", Some("200mb"))
            .await
            .unwrap();
        assert_eq!(change.old_value, Some("40mb".to_string()));
        assert_eq!(change.new_value, Some("200mb".to_string()));
    }

    #[tokio::test]
    async fn test_set_then_reset() {
        let (fake, mgr) = manager(FakeCluster::new());
        let key = "cluster.routing.rebalance.enable";
        mgr.set(key, Some("replicas")).await.unwrap();

        let change = mgr.set(key, None).await.unwrap();
        assert_eq!(change.old_value, Some("replicas".to_string()));
        assert_eq!(change.new_value, None);
        assert_eq!(fake.puts()[1].1, json!({"transient": {key: null}}));

        let settings = mgr.get().await.unwrap();
        assert!(!settings.contains(key));
    }

    #[tokio::test]
    async fn test_set_bad_status_surfaces_body() {
        let (fake, mgr) = manager(FakeCluster::new());
        let body = r#"{"error":{"type":"illegal_argument_exception","reason":"unknown setting [foo]"}}"#;
        fake.fail_next_put(400, body);
        let err = mgr.set("foo", Some("bar")).await.unwrap_err();
        match err {
            OpsError::BadStatus { status, body: got } => {
                assert_eq!(status, 400);
                assert_eq!(got, body);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
