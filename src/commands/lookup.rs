// Read-only cluster lookups used by the direct query router

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use kube::Client;

use super::{logs, pods, resources};
use crate::error::LookupError;

#[async_trait]
pub trait ClusterLookup: Send + Sync {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError>;
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, LookupError>;
    async fn pod_logs(&self, namespace: &str, name: &str, tail_lines: i64)
        -> Result<String, LookupError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, LookupError>;
    async fn get_node(&self, name: &str) -> Result<Option<Node>, LookupError>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, LookupError>;
    async fn get_service(&self, namespace: &str, name: &str)
        -> Result<Option<Service>, LookupError>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, LookupError>;
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, LookupError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, LookupError>;
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, LookupError>;
}

/// kube-rs backed lookups against the active cluster.
#[derive(Clone)]
pub struct KubeLookup {
    client: Client,
}

impl KubeLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterLookup for KubeLookup {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError> {
        pods::list_pods(&self.client, namespace).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, LookupError> {
        pods::get_pod(&self.client, namespace, name).await
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        tail_lines: i64,
    ) -> Result<String, LookupError> {
        logs::get_pod_logs(&self.client, namespace, name, tail_lines).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, LookupError> {
        resources::list_cluster(&self.client).await
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, LookupError> {
        resources::get_cluster(&self.client, name).await
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, LookupError> {
        resources::list_namespaced(&self.client, namespace).await
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, LookupError> {
        resources::get_namespaced(&self.client, namespace, name).await
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, LookupError> {
        resources::list_namespaced(&self.client, namespace).await
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, LookupError> {
        resources::get_namespaced(&self.client, namespace, name).await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, LookupError> {
        resources::list_cluster(&self.client).await
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, LookupError> {
        resources::get_cluster(&self.client, name).await
    }
}
