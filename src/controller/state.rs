//! In-memory display cache of the latest gate health
//!
//! Every reconciler writes its rule's entry after each pass; the status page
//! reads snapshots. Last write wins and no history is kept.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::GateRule;
use crate::prober::ProbeResult;

pub const MESSAGE_GATE_OPEN: &str = "Gate Open";
pub const MESSAGE_GATE_CLOSED: &str = "Gate Closed";

/// Latest displayed state of one gate rule
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    pub name: String,
    pub target: String,
    pub check_type: String,
    pub healthy: bool,
    pub last_check: DateTime<Utc>,
    pub duration_ms: u64,
    pub message: String,
}

/// Shared, injectable store of [`GateStatus`] keyed by rule name
#[derive(Clone, Debug, Default)]
pub struct GateStateStore {
    inner: Arc<RwLock<BTreeMap<String, GateStatus>>>,
}

impl GateStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `rule` with `result`
    pub async fn update(&self, rule: &GateRule, result: &ProbeResult) {
        let status = GateStatus {
            name: rule.name.clone(),
            target: rule.check_target.clone(),
            check_type: rule.check_type.clone(),
            healthy: result.healthy,
            last_check: result.timestamp,
            duration_ms: result.duration.as_millis() as u64,
            message: if result.healthy {
                MESSAGE_GATE_OPEN
            } else {
                MESSAGE_GATE_CLOSED
            }
            .to_string(),
        };
        self.inner.write().await.insert(rule.name.clone(), status);
    }

    pub async fn get(&self, name: &str) -> Option<GateStatus> {
        self.inner.read().await.get(name).cloned()
    }

    /// All entries, sorted by rule name
    pub async fn snapshot(&self) -> Vec<GateStatus> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rule(name: &str) -> GateRule {
        GateRule {
            name: name.to_string(),
            gate_name: String::new(),
            target_label: String::new(),
            namespace: "default".to_string(),
            check_type: "tcp".to_string(),
            check_target: format!("{name}:80"),
            interval: "5s".to_string(),
            sink: None,
        }
    }

    fn result(healthy: bool) -> ProbeResult {
        ProbeResult {
            healthy,
            timestamp: Utc::now(),
            duration: Duration::from_millis(12),
        }
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = GateStateStore::new();
        store.update(&rule("db"), &result(true)).await;
        store.update(&rule("db"), &result(false)).await;

        let status = store.get("db").await.unwrap();
        assert!(!status.healthy);
        assert_eq!(status.message, MESSAGE_GATE_CLOSED);
        assert_eq!(status.duration_ms, 12);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_sorted_by_name() {
        let store = GateStateStore::new();
        store.update(&rule("web"), &result(true)).await;
        store.update(&rule("api"), &result(true)).await;
        store.update(&rule("db"), &result(false)).await;

        let names: Vec<_> = store
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["api", "db", "web"]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = GateStateStore::new();
        let reader = store.clone();
        assert!(reader.is_empty().await);
        store.update(&rule("db"), &result(true)).await;
        assert_eq!(reader.get("db").await.unwrap().message, MESSAGE_GATE_OPEN);
    }
}
