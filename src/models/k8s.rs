// View structs rendered into answers and the health report
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeContext {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
    pub is_active: bool,
    /// API server URL — used for health checks
    pub server_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub ready: String,
    pub restarts: u32,
    pub age: String,
    pub node: String,
}

impl PodSummary {
    /// One line of a `kubectl get pods`-style listing.
    pub fn line(&self) -> String {
        format!(
            "{}  {}  {}  restarts={}  age={}  node={}",
            self.name, self.ready, self.status, self.restarts, self.age, self.node
        )
    }
}
