// Canonical "what the user wants" representation, shared by the direct
// router and the /intent endpoint.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::normalize;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Count,
    List,
    Status,
    Ip,
    Logs,
    Age,
    Restarts,
    EnvironmentVariable,
    MountPath,
    Port,
    ReadinessProbe,
}

impl Intent {
    pub const ALL: [Intent; 11] = [
        Intent::Count,
        Intent::List,
        Intent::Status,
        Intent::Ip,
        Intent::Logs,
        Intent::Age,
        Intent::Restarts,
        Intent::EnvironmentVariable,
        Intent::MountPath,
        Intent::Port,
        Intent::ReadinessProbe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Count => "count",
            Intent::List => "list",
            Intent::Status => "status",
            Intent::Ip => "ip",
            Intent::Logs => "logs",
            Intent::Age => "age",
            Intent::Restarts => "restarts",
            Intent::EnvironmentVariable => "environment-variable",
            Intent::MountPath => "mount-path",
            Intent::Port => "port",
            Intent::ReadinessProbe => "readiness-probe",
        }
    }

    /// Parses an already-normalized action token.
    pub fn from_canonical(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == token)
    }

    /// Intents that address one named resource rather than a collection.
    pub fn is_per_resource(self) -> bool {
        !matches!(self, Intent::Count | Intent::List)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Pod,
    Node,
    Service,
    Deployment,
    Namespace,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Pod,
        ResourceType::Node,
        ResourceType::Service,
        ResourceType::Deployment,
        ResourceType::Namespace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Pod => "pod",
            ResourceType::Node => "node",
            ResourceType::Service => "service",
            ResourceType::Deployment => "deployment",
            ResourceType::Namespace => "namespace",
        }
    }

    /// Accepts singular, plural and the usual kubectl short names.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "pod" | "pods" => Some(ResourceType::Pod),
            "node" | "nodes" => Some(ResourceType::Node),
            "service" | "services" | "svc" => Some(ResourceType::Service),
            "deployment" | "deployments" | "deploy" => Some(ResourceType::Deployment),
            "namespace" | "namespaces" | "ns" => Some(ResourceType::Namespace),
            _ => None,
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ResourceType::Pod => "pods",
            ResourceType::Node => "nodes",
            ResourceType::Service => "services",
            ResourceType::Deployment => "deployments",
            ResourceType::Namespace => "namespaces",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent as it arrives over the wire: every field loosely specified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawIntent {
    pub action: String,
    pub resource_type: String,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub env_var_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredIntent {
    pub intent: Intent,
    pub resource_type: ResourceType,
    /// Case preserving.
    pub resource_name: Option<String>,
    /// Never empty.
    pub namespace: String,
    /// The action token exactly as supplied, before normalization.
    pub action: String,
    pub env_var_name: Option<String>,
}

impl StructuredIntent {
    pub fn new(intent: Intent, resource_type: ResourceType) -> Self {
        Self {
            intent,
            resource_type,
            resource_name: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            action: intent.as_str().to_string(),
            env_var_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace_or_default(namespace);
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = Some(name.into());
        self
    }

    /// Resolves the free-form action through the synonym table. `None` when
    /// either the action or the resource type has no canonical value.
    pub fn from_raw(raw: &RawIntent) -> Option<Self> {
        let intent = Intent::from_canonical(&normalize(&raw.action))?;
        let resource_type = ResourceType::parse(&raw.resource_type)?;
        Some(Self {
            intent,
            resource_type,
            resource_name: non_blank(raw.resource_name.as_deref()),
            namespace: namespace_or_default(raw.namespace.as_deref()),
            action: raw.action.clone(),
            env_var_name: non_blank(raw.env_var_name.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn namespace_or_default(namespace: Option<&str>) -> String {
    non_blank(namespace).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}
