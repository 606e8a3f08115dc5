use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Serialize;

use crate::error::LookupError;
use crate::models::k8s::KubeContext;

// ── helpers ───────────────────────────────────────────────────────────────────

/// Merges `extra` into `base` by extending clusters, auth_infos, and contexts.
/// `base.current_context` wins; `extra.current_context` is used only if base has none.
fn merge_kubeconfig(mut base: Kubeconfig, extra: Kubeconfig) -> Kubeconfig {
    base.clusters.extend(extra.clusters);
    base.auth_infos.extend(extra.auth_infos);
    base.contexts.extend(extra.contexts);
    if base.current_context.is_none() {
        base.current_context = extra.current_context;
    }
    base
}

/// Regular, non-hidden files in `dir`, sorted so the merge order is stable.
fn scan_kube_dir(dir: &std::path::Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("kubeconfig: cannot read directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        })
        .collect();
    paths.sort();
    paths
}

/// Parses every candidate and merges those that are kubeconfigs. Files that
/// fail to parse are expected here (caches, notes) and only logged.
fn load_from_paths(paths: &[PathBuf]) -> Option<Kubeconfig> {
    paths
        .iter()
        .filter_map(|path| match Kubeconfig::read_from(path) {
            Ok(cfg) => {
                log::info!(
                    "kubeconfig: loaded {} context(s) from {}",
                    cfg.contexts.len(),
                    path.display()
                );
                Some(cfg)
            }
            Err(e) => {
                log::info!("kubeconfig: skipping {} ({e})", path.display());
                None
            }
        })
        .reduce(merge_kubeconfig)
}

// ── loading ───────────────────────────────────────────────────────────────────

/// Loads the merged kubeconfig.
///
/// Resolution order:
/// 1. If KUBECONFIG env var is set, delegate to `Kubeconfig::read()` which merges
///    every listed file with the same semantics as kubectl.
/// 2. Otherwise scan ~/.kube for ALL regular files, attempt to parse each one as
///    a kubeconfig, and merge every valid result.
///
/// Returns `None` — not an error — when no kubeconfig can be found (in-cluster).
pub fn load_kubeconfig() -> Option<Kubeconfig> {
    let kube_env = std::env::var("KUBECONFIG").unwrap_or_default();
    log::info!("kubeconfig: KUBECONFIG env = {:?}", kube_env);

    if !kube_env.is_empty() {
        return match Kubeconfig::read() {
            Ok(cfg) => {
                log::info!(
                    "kubeconfig: Kubeconfig::read() merged {} context(s)",
                    cfg.contexts.len()
                );
                Some(cfg)
            }
            Err(e) => {
                log::warn!("kubeconfig: Kubeconfig::read() failed: {e}");
                None
            }
        };
    }

    let Some(home) = dirs::home_dir() else {
        log::warn!("kubeconfig: cannot determine home directory");
        return None;
    };

    let kube_dir = home.join(".kube");
    log::info!("kubeconfig: KUBECONFIG not set — scanning {}", kube_dir.display());

    let candidates = scan_kube_dir(&kube_dir);
    log::info!(
        "kubeconfig: {} candidate file(s) in {}",
        candidates.len(),
        kube_dir.display()
    );

    let merged = load_from_paths(&candidates);
    if merged.is_none() {
        log::warn!(
            "kubeconfig: no valid kubeconfig files found in {}",
            kube_dir.display()
        );
    }
    merged
}

/// Flattens a kubeconfig into one `KubeContext` per named context.
/// `selected` overrides the file's current-context when picking the active one.
pub fn kubeconfig_contexts(kubeconfig: &Kubeconfig, selected: Option<&str>) -> Vec<KubeContext> {
    let current = selected
        .map(str::to_string)
        .or_else(|| kubeconfig.current_context.clone())
        .unwrap_or_default();

    // Build a cluster-name → server-URL lookup from the clusters stanza
    let cluster_servers: HashMap<&str, String> = kubeconfig
        .clusters
        .iter()
        .filter_map(|nc| {
            let server = nc.cluster.as_ref()?.server.clone()?;
            Some((nc.name.as_str(), server))
        })
        .collect();

    kubeconfig
        .contexts
        .iter()
        .filter_map(|named| {
            let ctx = named.context.as_ref()?;
            Some(KubeContext {
                name: named.name.clone(),
                cluster: ctx.cluster.clone(),
                user: ctx.user.clone().unwrap_or_default(),
                namespace: ctx.namespace.clone(),
                is_active: named.name == current,
                server_url: cluster_servers.get(ctx.cluster.as_str()).cloned(),
            })
        })
        .collect()
}

/// Builds a client for `context` (or the current context) from the merged
/// kubeconfig, falling back to in-cluster / inferred config when there is none.
pub async fn cluster_client(context: Option<&str>) -> Result<Client, LookupError> {
    let config = match load_kubeconfig() {
        Some(kubeconfig) => {
            let options = KubeConfigOptions {
                context: context.map(str::to_string),
                ..KubeConfigOptions::default()
            };
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| LookupError::Unavailable(format!("kubeconfig: {e}")))?
        }
        None => Config::infer()
            .await
            .map_err(|e| LookupError::Unavailable(format!("no cluster config: {e}")))?,
    };

    Client::try_from(config).map_err(LookupError::Api)
}

// ── health ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterHealth {
    Healthy,
    Slow,
    Unreachable,
}

/// Buckets a /healthz round trip.
pub fn classify_latency(elapsed: Duration) -> ClusterHealth {
    if elapsed > Duration::from_millis(1500) {
        ClusterHealth::Slow
    } else {
        ClusterHealth::Healthy
    }
}

/// Pings the Kubernetes API server at `<server_url>/healthz` and returns:
/// - `Healthy`      — responded in < 1.5 s
/// - `Slow`         — responded in 1.5 – 5 s
/// - `Unreachable`  — timed out or connection refused
///
/// Accepts invalid / self-signed TLS certs because many k8s clusters use them.
pub async fn check_cluster_health(server_url: &str) -> ClusterHealth {
    let client = match reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(_) => return ClusterHealth::Unreachable,
    };

    let url = format!("{}/healthz", server_url.trim_end_matches('/'));
    let started = Instant::now();

    match client.get(&url).send().await {
        Ok(_) => classify_latency(started.elapsed()),
        Err(e) => {
            log::debug!("health: {url} unreachable: {e}");
            ClusterHealth::Unreachable
        }
    }
}
