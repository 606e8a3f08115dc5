// Generic get/list helpers over kube-rs typed APIs

use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;

use crate::error::LookupError;

/// Lists a namespaced kind (services, deployments) in `namespace`.
pub async fn list_namespaced<K>(client: &Client, namespace: &str) -> Result<Vec<K>, LookupError>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    Ok(api.list(&ListParams::default()).await?.items)
}

/// Fetches one namespaced object; `None` when it does not exist.
pub async fn get_namespaced<K>(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<Option<K>, LookupError>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    Ok(api.get_opt(name).await?)
}

/// Lists a cluster-scoped kind (nodes, namespaces).
pub async fn list_cluster<K>(client: &Client) -> Result<Vec<K>, LookupError>
where
    K: Resource<Scope = ClusterResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::all(client.clone());
    Ok(api.list(&ListParams::default()).await?.items)
}

pub async fn get_cluster<K>(client: &Client, name: &str) -> Result<Option<K>, LookupError>
where
    K: Resource<Scope = ClusterResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::all(client.clone());
    Ok(api.get_opt(name).await?)
}
