// Get/list pods via kube-rs
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::LookupError;
use crate::models::k8s::PodSummary;

/// Lists all pods in the given namespace.
pub async fn list_pods(client: &Client, namespace: &str) -> Result<Vec<Pod>, LookupError> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pods = api.list(&ListParams::default()).await?.items;
    log::debug!("pods: {} in namespace {namespace}", pods.len());
    Ok(pods)
}

/// Fetches one pod; `None` when it does not exist.
pub async fn get_pod(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<Option<Pod>, LookupError> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    Ok(api.get_opt(name).await?)
}

// ── naming ────────────────────────────────────────────────────────────────────

fn generated_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| {
        Regex::new(r"^(.+?)-([a-z0-9]{8,10})(?:-([a-z0-9]{5}))?$")
            .expect("suffix pattern is a literal")
    })
}

/// Strips controller-generated suffixes: `web-7d9f8b6c5d-x2k4p` → `web`.
/// The hash segment must contain a digit so `my-postgres` stays intact.
pub fn generic_name(name: &str) -> &str {
    match generated_suffix().captures(name) {
        Some(caps) if caps[2].chars().any(|c| c.is_ascii_digit()) => {
            caps.get(1).map_or(name, |m| m.as_str())
        }
        _ => name,
    }
}

/// First pod whose generic name matches `requested`.
pub fn find_by_generic_name<'a>(pods: &'a [Pod], requested: &str) -> Option<&'a Pod> {
    pods.iter().find(|pod| {
        pod.metadata
            .name
            .as_deref()
            .is_some_and(|name| generic_name(name) == requested)
    })
}

// ── presentation ──────────────────────────────────────────────────────────────

pub fn total_restarts(pod: &Pod) -> u32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|cs| cs.iter().map(|c| c.restart_count.max(0) as u32).sum())
        .unwrap_or(0)
}

pub fn phase(pod: &Pod) -> String {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// `ready/total` containers, as kubectl prints it.
pub fn ready_ratio(pod: &Pod) -> String {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default();
    let ready = statuses.iter().filter(|c| c.ready).count();
    let total = pod
        .spec
        .as_ref()
        .map_or(statuses.len(), |spec| spec.containers.len());
    format!("{ready}/{total}")
}

/// Compact age like `3d4h`, `12m`, `40s`.
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    if days > 0 {
        format!("{days}d{hours}h")
    } else if hours > 0 {
        format!("{hours}h{minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

pub fn summarize(pod: &Pod, now: DateTime<Utc>) -> PodSummary {
    PodSummary {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        status: phase(pod),
        ready: ready_ratio(pod),
        restarts: total_restarts(pod),
        age: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |t| format_age(t.0, now)),
        node: pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.clone())
            .unwrap_or_else(|| "<none>".to_string()),
    }
}
