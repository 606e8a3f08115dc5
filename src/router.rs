// Direct query routing without a translator: extract an intent, dispatch through a closed
// (resource type, intent) table of read-only lookups. No retries.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use k8s_openapi::api::core::v1::{Container, Pod, Probe};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use regex::Regex;

use crate::commands::lookup::ClusterLookup;
use crate::commands::pods;
use crate::error::LookupError;
use crate::models::intent::{Intent, ResourceType, StructuredIntent};
use crate::models::intent::{Intent as I, ResourceType as R};
use crate::normalize::canonical;

pub const UNRECOGNIZED_MESSAGE: &str = "Action or resource type not recognized.";

// ── dispatch table ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Count,
    List,
    Age,
    PodStatus,
    PodIp,
    PodLogs,
    PodRestarts,
    PodEnvVar,
    PodMountPaths,
    PodPorts,
    PodReadinessProbe,
    NodeStatus,
    NodeIp,
    ServiceIp,
    ServicePorts,
    DeploymentStatus,
    NamespaceStatus,
}

pub const DISPATCH: &[((ResourceType, Intent), Lookup)] = &[
    ((R::Pod, I::Count), Lookup::Count),
    ((R::Pod, I::List), Lookup::List),
    ((R::Pod, I::Status), Lookup::PodStatus),
    ((R::Pod, I::Ip), Lookup::PodIp),
    ((R::Pod, I::Logs), Lookup::PodLogs),
    ((R::Pod, I::Age), Lookup::Age),
    ((R::Pod, I::Restarts), Lookup::PodRestarts),
    ((R::Pod, I::EnvironmentVariable), Lookup::PodEnvVar),
    ((R::Pod, I::MountPath), Lookup::PodMountPaths),
    ((R::Pod, I::Port), Lookup::PodPorts),
    ((R::Pod, I::ReadinessProbe), Lookup::PodReadinessProbe),
    ((R::Node, I::Count), Lookup::Count),
    ((R::Node, I::List), Lookup::List),
    ((R::Node, I::Status), Lookup::NodeStatus),
    ((R::Node, I::Ip), Lookup::NodeIp),
    ((R::Node, I::Age), Lookup::Age),
    ((R::Service, I::Count), Lookup::Count),
    ((R::Service, I::List), Lookup::List),
    ((R::Service, I::Ip), Lookup::ServiceIp),
    ((R::Service, I::Port), Lookup::ServicePorts),
    ((R::Service, I::Age), Lookup::Age),
    ((R::Deployment, I::Count), Lookup::Count),
    ((R::Deployment, I::List), Lookup::List),
    ((R::Deployment, I::Status), Lookup::DeploymentStatus),
    ((R::Deployment, I::Age), Lookup::Age),
    ((R::Namespace, I::Count), Lookup::Count),
    ((R::Namespace, I::List), Lookup::List),
    ((R::Namespace, I::Status), Lookup::NamespaceStatus),
    ((R::Namespace, I::Age), Lookup::Age),
];

pub fn lookup_for(resource_type: ResourceType, intent: Intent) -> Option<Lookup> {
    DISPATCH
        .iter()
        .find(|(key, _)| *key == (resource_type, intent))
        .map(|(_, lookup)| *lookup)
}

// ── extraction ────────────────────────────────────────────────────────────────

/// When one query mentions several actions, the most specific wins.
const INTENT_PRECEDENCE: [Intent; 11] = [
    I::EnvironmentVariable,
    I::MountPath,
    I::ReadinessProbe,
    I::Logs,
    I::Ip,
    I::Port,
    I::Restarts,
    I::Age,
    I::Count,
    I::Status,
    I::List,
];

const ENV_STOPWORDS: &[&str] = &[
    "of", "for", "in", "on", "from", "the", "value", "named", "called", "is", "set", "var",
    "variable",
];

fn words(query: &str) -> Vec<String> {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Canonical intents mentioned in the query, two-word phrases first.
fn mentioned_intents(words: &[String]) -> Vec<Intent> {
    let mut found = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let pair = words.get(i + 1).map(|next| format!("{} {next}", words[i]));
        if let Some(intent) = pair.as_deref().and_then(canonical).and_then(Intent::from_canonical) {
            found.push(intent);
            i += 2;
            continue;
        }
        if let Some(intent) = canonical(&words[i]).and_then(Intent::from_canonical) {
            found.push(intent);
        }
        i += 1;
    }
    found
}

pub fn extract_intent(query: &str) -> Option<Intent> {
    let mentioned = mentioned_intents(&words(query));
    INTENT_PRECEDENCE
        .into_iter()
        .find(|intent| mentioned.contains(intent))
}

pub fn extract_resource_type(query: &str) -> Option<ResourceType> {
    words(query).iter().find_map(|w| ResourceType::parse(w))
}

fn name_patterns() -> &'static [(ResourceType, Regex)] {
    static PATTERNS: OnceLock<Vec<(ResourceType, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ResourceType::ALL
            .into_iter()
            .map(|kind| {
                let pattern = format!(
                    r#"(?i)\b(?:{}|{})\s+(?:named|called|with\s+(?:the\s+)?name)\s+['"]?([\w.\-]+)['"]?"#,
                    kind.as_str(),
                    kind.plural()
                );
                let regex = Regex::new(&pattern).expect("name pattern is built from fixed words");
                (kind, regex)
            })
            .collect()
    })
}

/// Resource name following "<kind> named|called|with name". Case preserving.
pub fn extract_resource_name(query: &str, resource_type: ResourceType) -> Option<String> {
    let (_, pattern) = name_patterns().iter().find(|(kind, _)| *kind == resource_type)?;
    let name = pattern.captures(query)?.get(1)?.as_str();
    Some(name.trim_end_matches('.').to_string())
}

fn namespace_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)\b(?:in|from|within|across)\s+(?:the\s+)?(?:namespace|ns)\s+(?:named\s+|called\s+)?['"]?([a-z0-9][a-z0-9.\-]*)['"]?"#,
            r#"(?i)\b(?:in|from|within)\s+(?:the\s+)?['"]?([a-z0-9][a-z0-9\-]*)['"]?\s+(?:namespace|ns)\b"#,
            r#"(?:^|\s)(?:-n|--namespace)[=\s]+([a-z0-9][a-z0-9\-]*)"#,
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("namespace pattern is a literal"))
        .collect()
    })
}

pub fn extract_namespace(query: &str) -> Option<String> {
    namespace_patterns()
        .iter()
        .find_map(|p| p.captures(query))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:env(?:ironment)?\s+var(?:iable)?|variable|var|env)\s+(?:named\s+|called\s+)?['"$]?([A-Za-z_][A-Za-z0-9_]*)"#)
            .expect("env var pattern is a literal")
    })
}

pub fn extract_env_var_name(query: &str) -> Option<String> {
    if let Some(dollar) = query
        .split_whitespace()
        .find_map(|w| w.strip_prefix('$'))
        .map(|w| w.trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '_')))
        .filter(|w| !w.is_empty())
    {
        return Some(dollar.to_string());
    }
    env_var_pattern()
        .captures_iter(query)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|name| !ENV_STOPWORDS.contains(&name.to_lowercase().as_str()))
        .map(str::to_string)
}

/// Reduces free text to a structured intent. `None` when either the action
/// or the resource type cannot be identified.
pub fn extract(query: &str) -> Option<StructuredIntent> {
    let intent = extract_intent(query)?;
    let resource_type = extract_resource_type(query)?;

    let mut structured = StructuredIntent::new(intent, resource_type)
        .with_namespace(extract_namespace(query).as_deref());
    if let Some(name) = extract_resource_name(query, resource_type) {
        structured = structured.with_name(name);
    }
    if intent == I::EnvironmentVariable {
        if let Some(var) = extract_env_var_name(query) {
            structured = structured.with_env_var(var);
        }
    }
    Some(structured)
}

// ── outcomes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterOutcome {
    Answer(String),
    NotFound(String),
    MissingName(ResourceType),
    MissingEnvVarName,
    Unrecognized,
    Failed(String),
}

impl RouterOutcome {
    pub fn message(&self) -> String {
        match self {
            RouterOutcome::Answer(text) | RouterOutcome::NotFound(text) => text.clone(),
            RouterOutcome::MissingName(kind) => {
                format!("Could not extract {kind} name from the query.")
            }
            RouterOutcome::MissingEnvVarName => {
                "Could not extract environment variable name from the query.".to_string()
            }
            RouterOutcome::Unrecognized => UNRECOGNIZED_MESSAGE.to_string(),
            RouterOutcome::Failed(error) => format!("Error querying the cluster: {error}"),
        }
    }

    /// The router understood the query well enough to answer it itself.
    pub fn is_recognized(&self) -> bool {
        matches!(
            self,
            RouterOutcome::Answer(_) | RouterOutcome::NotFound(_) | RouterOutcome::Failed(_)
        )
    }
}

impl From<LookupError> for RouterOutcome {
    fn from(e: LookupError) -> Self {
        log::error!("router: lookup failed: {e}");
        RouterOutcome::Failed(e.to_string())
    }
}

// ── router ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DirectRouter {
    lookup: Arc<dyn ClusterLookup>,
    log_tail_lines: i64,
}

impl DirectRouter {
    pub fn new(lookup: Arc<dyn ClusterLookup>, log_tail_lines: i64) -> Self {
        Self {
            lookup,
            log_tail_lines,
        }
    }

    pub async fn route_query(&self, query: &str) -> RouterOutcome {
        match extract(query) {
            Some(intent) => {
                log::debug!("router: extracted {intent:?}");
                self.dispatch(&intent).await
            }
            None => RouterOutcome::Unrecognized,
        }
    }

    /// Validates the intent against the table, then performs its lookup.
    /// Missing names are reported before any cluster call.
    pub async fn dispatch(&self, intent: &StructuredIntent) -> RouterOutcome {
        let Some(lookup) = lookup_for(intent.resource_type, intent.intent) else {
            return RouterOutcome::Unrecognized;
        };

        if !intent.intent.is_per_resource() {
            return self
                .collection(lookup, intent.resource_type, &intent.namespace)
                .await
                .unwrap_or_else(RouterOutcome::from);
        }

        let Some(name) = intent.resource_name.as_deref() else {
            return RouterOutcome::MissingName(intent.resource_type);
        };
        if lookup == Lookup::PodEnvVar && intent.env_var_name.is_none() {
            return RouterOutcome::MissingEnvVarName;
        }

        self.single(lookup, intent, name)
            .await
            .unwrap_or_else(RouterOutcome::from)
    }

    async fn collection(
        &self,
        lookup: Lookup,
        kind: ResourceType,
        namespace: &str,
    ) -> Result<RouterOutcome, LookupError> {
        let names: Vec<String> = match kind {
            R::Pod => {
                let pods = self.lookup.list_pods(namespace).await?;
                if lookup == Lookup::List && !pods.is_empty() {
                    let now = Utc::now();
                    let lines: Vec<String> = pods
                        .iter()
                        .map(|p| pods::summarize(p, now).line())
                        .collect();
                    return Ok(RouterOutcome::Answer(lines.join("\n")));
                }
                pods.iter().map(|p| name_of(&p.metadata)).collect()
            }
            R::Node => names_of(self.lookup.list_nodes().await?.iter().map(|n| &n.metadata)),
            R::Service => names_of(
                self.lookup
                    .list_services(namespace)
                    .await?
                    .iter()
                    .map(|s| &s.metadata),
            ),
            R::Deployment => names_of(
                self.lookup
                    .list_deployments(namespace)
                    .await?
                    .iter()
                    .map(|d| &d.metadata),
            ),
            R::Namespace => names_of(self.lookup.list_namespaces().await?.iter().map(|n| &n.metadata)),
        };

        let scope = match kind {
            R::Node | R::Namespace => "in the cluster".to_string(),
            _ => format!("in namespace '{namespace}'"),
        };

        Ok(RouterOutcome::Answer(match lookup {
            Lookup::Count => match names.len() {
                1 => format!("There is 1 {kind} {scope}."),
                n => format!("There are {n} {} {scope}.", kind.plural()),
            },
            _ if names.is_empty() => format!("No {} found {scope}.", kind.plural()),
            _ => names.join("\n"),
        }))
    }

    async fn single(
        &self,
        lookup: Lookup,
        intent: &StructuredIntent,
        name: &str,
    ) -> Result<RouterOutcome, LookupError> {
        let ns = intent.namespace.as_str();
        match intent.resource_type {
            R::Pod => {
                let Some(pod) = self.fetch_pod(ns, name).await? else {
                    return Ok(not_found(R::Pod, name, Some(ns)));
                };
                let shown = pod.metadata.name.as_deref().unwrap_or(name).to_string();
                if lookup == Lookup::PodLogs {
                    let logs = self.lookup.pod_logs(ns, &shown, self.log_tail_lines).await?;
                    return Ok(RouterOutcome::Answer(if logs.trim().is_empty() {
                        format!("No logs available for pod '{shown}'.")
                    } else {
                        logs.trim_end().to_string()
                    }));
                }
                Ok(pod_answer(lookup, &pod, &shown, intent.env_var_name.as_deref()))
            }
            R::Node => {
                let Some(node) = self.lookup.get_node(name).await? else {
                    return Ok(not_found(R::Node, name, None));
                };
                let status = node.status.as_ref();
                Ok(RouterOutcome::Answer(match lookup {
                    Lookup::NodeStatus => {
                        let ready = status
                            .and_then(|s| s.conditions.as_ref())
                            .and_then(|cs| cs.iter().find(|c| c.type_ == "Ready"))
                            .is_some_and(|c| c.status == "True");
                        format!("Node '{name}' is {}.", if ready { "Ready" } else { "NotReady" })
                    }
                    Lookup::NodeIp => {
                        let addresses = status.and_then(|s| s.addresses.as_deref()).unwrap_or_default();
                        match addresses
                            .iter()
                            .find(|a| a.type_ == "InternalIP")
                            .or_else(|| addresses.first())
                        {
                            Some(addr) => format!("Node '{name}' has IP {}.", addr.address),
                            None => format!("Node '{name}' reports no addresses."),
                        }
                    }
                    _ => age_sentence(R::Node, name, &node.metadata),
                }))
            }
            R::Service => {
                let Some(svc) = self.lookup.get_service(ns, name).await? else {
                    return Ok(not_found(R::Service, name, Some(ns)));
                };
                let spec = svc.spec.as_ref();
                Ok(RouterOutcome::Answer(match lookup {
                    Lookup::ServiceIp => match spec.and_then(|s| s.cluster_ip.as_deref()) {
                        Some(ip) => format!("Service '{name}' has cluster IP {ip}."),
                        None => format!("Service '{name}' has no cluster IP."),
                    },
                    Lookup::ServicePorts => {
                        let ports: Vec<String> = spec
                            .and_then(|s| s.ports.as_deref())
                            .unwrap_or_default()
                            .iter()
                            .map(|p| {
                                let target = p
                                    .target_port
                                    .as_ref()
                                    .map_or_else(|| p.port.to_string(), int_or_string);
                                let proto = p.protocol.as_deref().unwrap_or("TCP");
                                format!("{}->{target}/{proto}", p.port)
                            })
                            .collect();
                        if ports.is_empty() {
                            format!("Service '{name}' exposes no ports.")
                        } else {
                            format!("Service '{name}' ports: {}", ports.join(", "))
                        }
                    }
                    _ => age_sentence(R::Service, name, &svc.metadata),
                }))
            }
            R::Deployment => {
                let Some(deploy) = self.lookup.get_deployment(ns, name).await? else {
                    return Ok(not_found(R::Deployment, name, Some(ns)));
                };
                Ok(RouterOutcome::Answer(match lookup {
                    Lookup::DeploymentStatus => {
                        let desired = deploy.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                        let ready = deploy
                            .status
                            .as_ref()
                            .and_then(|s| s.ready_replicas)
                            .unwrap_or(0);
                        format!("Deployment '{name}' has {ready}/{desired} replicas ready.")
                    }
                    _ => age_sentence(R::Deployment, name, &deploy.metadata),
                }))
            }
            R::Namespace => {
                let Some(namespace) = self.lookup.get_namespace(name).await? else {
                    return Ok(not_found(R::Namespace, name, None));
                };
                Ok(RouterOutcome::Answer(match lookup {
                    Lookup::NamespaceStatus => {
                        let phase = namespace
                            .status
                            .as_ref()
                            .and_then(|s| s.phase.as_deref())
                            .unwrap_or("Unknown");
                        format!("Namespace '{name}' is {phase}.")
                    }
                    _ => age_sentence(R::Namespace, name, &namespace.metadata),
                }))
            }
        }
    }

    /// Exact name first, then the first pod sharing the generic name.
    async fn fetch_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, LookupError> {
        if let Some(pod) = self.lookup.get_pod(namespace, name).await? {
            return Ok(Some(pod));
        }
        let pods = self.lookup.list_pods(namespace).await?;
        let found = pods::find_by_generic_name(&pods, name).cloned();
        if let Some(ref pod) = found {
            log::debug!("router: {name} matched pod {:?}", pod.metadata.name);
        }
        Ok(found)
    }
}

// ── rendering ─────────────────────────────────────────────────────────────────

fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

fn names_of<'a>(metas: impl Iterator<Item = &'a ObjectMeta>) -> Vec<String> {
    metas.map(name_of).collect()
}

fn title(kind: ResourceType) -> &'static str {
    match kind {
        R::Pod => "Pod",
        R::Node => "Node",
        R::Service => "Service",
        R::Deployment => "Deployment",
        R::Namespace => "Namespace",
    }
}

fn not_found(kind: ResourceType, name: &str, namespace: Option<&str>) -> RouterOutcome {
    let kind_title = title(kind);
    RouterOutcome::NotFound(match namespace {
        Some(ns) => format!("{kind_title} '{name}' not found in namespace '{ns}'."),
        None => format!("{kind_title} '{name}' not found."),
    })
}

fn age_sentence(kind: ResourceType, name: &str, meta: &ObjectMeta) -> String {
    match meta.creation_timestamp.as_ref() {
        Some(Time(created)) => format!(
            "{} '{name}' was created {} ago ({}).",
            title(kind),
            pods::format_age(*created, Utc::now()),
            created.to_rfc3339()
        ),
        None => format!("{} '{name}' has no creation timestamp.", title(kind)),
    }
}

fn int_or_string(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(n) => n.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

fn containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default()
}

fn pod_answer(lookup: Lookup, pod: &Pod, name: &str, env_var: Option<&str>) -> RouterOutcome {
    let answer = match lookup {
        Lookup::PodStatus => format!(
            "Pod '{name}' is {} ({} containers ready).",
            pods::phase(pod),
            pods::ready_ratio(pod)
        ),
        Lookup::PodIp => match pod.status.as_ref().and_then(|s| s.pod_ip.as_deref()) {
            Some(ip) => format!("Pod '{name}' has IP {ip}."),
            None => format!("Pod '{name}' has no IP assigned yet."),
        },
        Lookup::PodRestarts => format!(
            "Pod '{name}' has restarted {} time(s).",
            pods::total_restarts(pod)
        ),
        Lookup::PodEnvVar => {
            let wanted = env_var.unwrap_or_default();
            let found = containers(pod)
                .iter()
                .flat_map(|c| c.env.iter().flatten())
                .find(|e| e.name == wanted)
                .or_else(|| {
                    containers(pod)
                        .iter()
                        .flat_map(|c| c.env.iter().flatten())
                        .find(|e| e.name.eq_ignore_ascii_case(wanted))
                });
            match found {
                Some(var) => match (&var.value, &var.value_from) {
                    (Some(value), _) => format!(
                        "Environment variable {} in pod '{name}' is '{value}'.",
                        var.name
                    ),
                    (None, Some(_)) => format!(
                        "Environment variable {} in pod '{name}' is set from a reference (secret, config map or field).",
                        var.name
                    ),
                    (None, None) => {
                        format!("Environment variable {} in pod '{name}' is empty.", var.name)
                    }
                },
                None => {
                    return RouterOutcome::NotFound(format!(
                        "Environment variable {wanted} not found in pod '{name}'."
                    ))
                }
            }
        }
        Lookup::PodMountPaths => {
            let mounts: Vec<String> = containers(pod)
                .iter()
                .flat_map(|c| {
                    c.volume_mounts
                        .iter()
                        .flatten()
                        .map(move |m| format!("{}/{}: {}", c.name, m.name, m.mount_path))
                })
                .collect();
            if mounts.is_empty() {
                format!("Pod '{name}' has no volume mounts.")
            } else {
                mounts.join("\n")
            }
        }
        Lookup::PodPorts => {
            let ports: Vec<String> = containers(pod)
                .iter()
                .flat_map(|c| {
                    c.ports.iter().flatten().map(move |p| {
                        format!(
                            "{}: {}/{}",
                            c.name,
                            p.container_port,
                            p.protocol.as_deref().unwrap_or("TCP")
                        )
                    })
                })
                .collect();
            if ports.is_empty() {
                format!("Pod '{name}' declares no container ports.")
            } else {
                ports.join("\n")
            }
        }
        Lookup::PodReadinessProbe => {
            let probes: Vec<String> = containers(pod)
                .iter()
                .filter_map(|c| {
                    c.readiness_probe
                        .as_ref()
                        .map(|p| format!("{}: {}", c.name, describe_probe(p)))
                })
                .collect();
            if probes.is_empty() {
                format!("Pod '{name}' has no readiness probe configured.")
            } else {
                probes.join("\n")
            }
        }
        _ => age_sentence(R::Pod, name, &pod.metadata),
    };
    RouterOutcome::Answer(answer)
}

fn describe_probe(probe: &Probe) -> String {
    let action = if let Some(http) = &probe.http_get {
        format!(
            "HTTP GET {}:{}",
            http.path.as_deref().unwrap_or("/"),
            int_or_string(&http.port)
        )
    } else if let Some(tcp) = &probe.tcp_socket {
        format!("TCP socket :{}", int_or_string(&tcp.port))
    } else if let Some(exec) = &probe.exec {
        format!("exec `{}`", exec.command.as_deref().unwrap_or_default().join(" "))
    } else if let Some(grpc) = &probe.grpc {
        format!("gRPC :{}", grpc.port)
    } else {
        "no handler".to_string()
    };
    format!(
        "{action} (initial delay {}s, period {}s)",
        probe.initial_delay_seconds.unwrap_or(0),
        probe.period_seconds.unwrap_or(10)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{Namespace, Node, Service};
    use serde_json::json;

    use super::*;

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(name_patterns().len(), ResourceType::ALL.len());
        assert_eq!(namespace_patterns().len(), 3);
        assert!(env_var_pattern().is_match("env var HOME"));
    }

    #[derive(Default)]
    struct FakeCluster {
        pods: Vec<Pod>,
        nodes: Vec<Node>,
        services: Vec<Service>,
        deployments: Vec<Deployment>,
        namespaces: Vec<Namespace>,
        logs: String,
        calls: AtomicUsize,
    }

    fn named<'a, T>(items: &'a [T], meta: impl Fn(&T) -> &ObjectMeta, name: &str) -> Option<&'a T> {
        items.iter().find(|i| meta(i).name.as_deref() == Some(name))
    }

    impl FakeCluster {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ClusterLookup for FakeCluster {
        async fn list_pods(&self, _ns: &str) -> Result<Vec<Pod>, LookupError> {
            self.hit();
            Ok(self.pods.clone())
        }
        async fn get_pod(&self, _ns: &str, name: &str) -> Result<Option<Pod>, LookupError> {
            self.hit();
            Ok(named(&self.pods, |p| &p.metadata, name).cloned())
        }
        async fn pod_logs(&self, _ns: &str, _name: &str, _tail: i64) -> Result<String, LookupError> {
            self.hit();
            Ok(self.logs.clone())
        }
        async fn list_nodes(&self) -> Result<Vec<Node>, LookupError> {
            self.hit();
            Ok(self.nodes.clone())
        }
        async fn get_node(&self, name: &str) -> Result<Option<Node>, LookupError> {
            self.hit();
            Ok(named(&self.nodes, |n| &n.metadata, name).cloned())
        }
        async fn list_services(&self, _ns: &str) -> Result<Vec<Service>, LookupError> {
            self.hit();
            Ok(self.services.clone())
        }
        async fn get_service(&self, _ns: &str, name: &str) -> Result<Option<Service>, LookupError> {
            self.hit();
            Ok(named(&self.services, |s| &s.metadata, name).cloned())
        }
        async fn list_deployments(&self, _ns: &str) -> Result<Vec<Deployment>, LookupError> {
            self.hit();
            Ok(self.deployments.clone())
        }
        async fn get_deployment(
            &self,
            _ns: &str,
            name: &str,
        ) -> Result<Option<Deployment>, LookupError> {
            self.hit();
            Ok(named(&self.deployments, |d| &d.metadata, name).cloned())
        }
        async fn list_namespaces(&self) -> Result<Vec<Namespace>, LookupError> {
            self.hit();
            Ok(self.namespaces.clone())
        }
        async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, LookupError> {
            self.hit();
            Ok(named(&self.namespaces, |n| &n.metadata, name).cloned())
        }
    }

    fn web_pod() -> Pod {
        serde_json::from_value(json!({
            "metadata": {
                "name": "web-7d9f8b6c5d-x2k4p",
                "namespace": "default",
                "creationTimestamp": "2024-01-01T00:00:00Z"
            },
            "spec": {
                "nodeName": "node-a",
                "containers": [{
                    "name": "app",
                    "image": "nginx",
                    "env": [
                        {"name": "MODE", "value": "prod"},
                        {"name": "DB_PASSWORD", "valueFrom": {"secretKeyRef": {"name": "db", "key": "pw"}}}
                    ],
                    "volumeMounts": [{"name": "data", "mountPath": "/var/data"}],
                    "ports": [{"containerPort": 8080, "protocol": "TCP"}],
                    "readinessProbe": {
                        "httpGet": {"path": "/ready", "port": 8080},
                        "initialDelaySeconds": 5,
                        "periodSeconds": 15
                    }
                }]
            },
            "status": {
                "phase": "Running",
                "podIP": "10.1.2.3",
                "containerStatuses": [{
                    "name": "app", "ready": true, "restartCount": 4,
                    "image": "nginx", "imageID": "sha256:abc"
                }]
            }
        }))
        .unwrap()
    }

    fn cluster() -> Arc<FakeCluster> {
        Arc::new(FakeCluster {
            pods: vec![web_pod()],
            nodes: vec![serde_json::from_value(json!({
                "metadata": {"name": "node-a"},
                "status": {
                    "conditions": [{"type": "Ready", "status": "True"}],
                    "addresses": [
                        {"type": "Hostname", "address": "node-a"},
                        {"type": "InternalIP", "address": "192.168.1.10"}
                    ]
                }
            }))
            .unwrap()],
            services: vec![serde_json::from_value(json!({
                "metadata": {"name": "api", "namespace": "default"},
                "spec": {"clusterIP": "10.96.0.12", "ports": [{"port": 80, "targetPort": 8080, "protocol": "TCP"}]}
            }))
            .unwrap()],
            deployments: vec![serde_json::from_value(json!({
                "metadata": {"name": "web", "namespace": "default"},
                "spec": {"replicas": 3, "selector": {}, "template": {}},
                "status": {"replicas": 3, "readyReplicas": 2}
            }))
            .unwrap()],
            namespaces: vec![serde_json::from_value(json!({
                "metadata": {"name": "kube-system"},
                "status": {"phase": "Active"}
            }))
            .unwrap()],
            logs: "started\nlistening on 8080\n".into(),
            calls: AtomicUsize::new(0),
        })
    }

    fn router(cluster: &Arc<FakeCluster>) -> DirectRouter {
        DirectRouter::new(cluster.clone(), 50)
    }

    async fn ask(query: &str) -> String {
        router(&cluster()).route_query(query).await.message()
    }

    #[test]
    fn table_has_unique_keys_and_covers_every_resource() {
        for (i, (key, _)) in DISPATCH.iter().enumerate() {
            assert!(DISPATCH[i + 1..].iter().all(|(other, _)| other != key), "{key:?}");
        }
        for kind in ResourceType::ALL {
            assert_eq!(lookup_for(kind, I::Count), Some(Lookup::Count));
            assert_eq!(lookup_for(kind, I::List), Some(Lookup::List));
        }
        assert_eq!(lookup_for(R::Service, I::Logs), None);
    }

    #[test]
    fn extraction_reads_shape_name_and_namespace() {
        let intent = extract("What is the IP of pod named Web-1 in namespace prod?").unwrap();
        assert_eq!(intent.intent, I::Ip);
        assert_eq!(intent.resource_type, R::Pod);
        assert_eq!(intent.resource_name.as_deref(), Some("Web-1"));
        assert_eq!(intent.namespace, "prod");

        let intent = extract("how many pods are there").unwrap();
        assert_eq!(intent.intent, I::Count);
        assert_eq!(intent.namespace, "default");

        let intent = extract("how many restarts for pod called api in the payments namespace").unwrap();
        assert_eq!(intent.intent, I::Restarts);
        assert_eq!(intent.resource_name.as_deref(), Some("api"));
        assert_eq!(intent.namespace, "payments");

        assert_eq!(extract("what is the env var DATABASE_URL of pod named api").unwrap().env_var_name.as_deref(), Some("DATABASE_URL"));
        assert_eq!(extract_env_var_name("value of $HOME in pod named x").as_deref(), Some("HOME"));
        assert!(extract("tell me a joke").is_none());
    }

    #[test]
    fn specific_actions_beat_counting() {
        assert_eq!(extract_intent("how many restarts does pod named x have"), Some(I::Restarts));
        assert_eq!(extract_intent("how many pods are ready"), Some(I::Count));
        assert_eq!(extract_intent("show the readiness probe of pod named x"), Some(I::ReadinessProbe));
        assert_eq!(extract_intent("what is the port number of service named api"), Some(I::Port));
    }

    #[tokio::test]
    async fn missing_pod_name_makes_no_cluster_calls() {
        let cluster = cluster();
        let outcome = router(&cluster).route_query("what is the status of the pod").await;
        assert_eq!(outcome, RouterOutcome::MissingName(R::Pod));
        assert_eq!(outcome.message(), "Could not extract pod name from the query.");
        assert!(!outcome.is_recognized());
        assert_eq!(cluster.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_combinations_are_unrecognized() {
        let cluster = cluster();
        let outcome = router(&cluster).route_query("show logs of service named api").await;
        assert_eq!(outcome.message(), UNRECOGNIZED_MESSAGE);
        assert_eq!(cluster.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pod_lookups() {
        assert_eq!(ask("how many pods are there").await, "There is 1 pod in namespace 'default'.");
        assert_eq!(ask("ip of pod named web-7d9f8b6c5d-x2k4p").await, "Pod 'web-7d9f8b6c5d-x2k4p' has IP 10.1.2.3.");
        assert_eq!(
            ask("status of pod named web").await,
            "Pod 'web-7d9f8b6c5d-x2k4p' is Running (1/1 containers ready)."
        );
        assert_eq!(ask("restarts of pod named web").await, "Pod 'web-7d9f8b6c5d-x2k4p' has restarted 4 time(s).");
        assert_eq!(ask("logs of pod named web").await, "started\nlistening on 8080");
        assert_eq!(ask("mount path of pod named web").await, "app/data: /var/data");
        assert_eq!(ask("ports of pod named web").await, "app: 8080/TCP");
        assert_eq!(
            ask("readiness probe of pod named web").await,
            "app: HTTP GET /ready:8080 (initial delay 5s, period 15s)"
        );
        assert!(ask("age of pod named web").await.contains("2024-01-01T00:00:00+00:00"));
        assert!(ask("list pods").await.starts_with("web-7d9f8b6c5d-x2k4p  1/1  Running"));
    }

    #[tokio::test]
    async fn env_var_lookups() {
        assert_eq!(
            ask("env var MODE of pod named web").await,
            "Environment variable MODE in pod 'web-7d9f8b6c5d-x2k4p' is 'prod'."
        );
        assert!(ask("env var DB_PASSWORD of pod named web").await.contains("from a reference"));
        let missing = router(&cluster()).route_query("env var NOPE of pod named web").await;
        assert!(matches!(missing, RouterOutcome::NotFound(_)));
        assert_eq!(
            router(&cluster()).route_query("environment of pod named web").await,
            RouterOutcome::MissingEnvVarName
        );
    }

    #[tokio::test]
    async fn missing_pod_is_a_typed_not_found() {
        let outcome = router(&cluster()).route_query("ip of pod named ghost in namespace prod").await;
        assert_eq!(
            outcome,
            RouterOutcome::NotFound("Pod 'ghost' not found in namespace 'prod'.".into())
        );
        assert!(outcome.is_recognized());
    }

    #[tokio::test]
    async fn other_resource_lookups() {
        assert_eq!(ask("status of node named node-a").await, "Node 'node-a' is Ready.");
        assert_eq!(ask("ip of node named node-a").await, "Node 'node-a' has IP 192.168.1.10.");
        assert_eq!(ask("cluster ip of service named api").await, "Service 'api' has cluster IP 10.96.0.12.");
        assert_eq!(ask("port of service named api").await, "Service 'api' ports: 80->8080/TCP");
        assert_eq!(ask("status of deployment named web").await, "Deployment 'web' has 2/3 replicas ready.");
        assert_eq!(ask("status of namespace named kube-system").await, "Namespace 'kube-system' is Active.");
        assert_eq!(ask("how many nodes").await, "There is 1 node in the cluster.");
        assert_eq!(ask("list services").await, "api");
    }

    #[tokio::test]
    async fn structured_dispatch_uses_normalized_action() {
        let intent = StructuredIntent::from_raw(&crate::models::intent::RawIntent {
            action: "total".into(),
            resource_type: "deployments".into(),
            ..Default::default()
        })
        .unwrap();
        let outcome = router(&cluster()).dispatch(&intent).await;
        assert_eq!(outcome.message(), "There is 1 deployment in namespace 'default'.");
    }
}
