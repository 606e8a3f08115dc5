// Synonym resolution for action tokens; each row lists its canonical spelling first

/// Canonical action → accepted spellings (lowercase, single-spaced).
pub const SYNONYMS: &[(&str, &[&str])] = &[
    (
        "count",
        &["count", "howmany", "how many", "total", "quantity", "number", "number of", "tally"],
    ),
    (
        "list",
        &["list", "enumerate", "all", "which", "names", "list all", "get all"],
    ),
    (
        "status",
        &["status", "state", "phase", "health", "condition", "healthy", "ready"],
    ),
    (
        "ip",
        &["ip", "ip address", "address", "ipaddress", "pod ip", "podip", "cluster ip", "clusterip"],
    ),
    (
        "logs",
        &["logs", "log", "logging", "output", "stdout", "log output"],
    ),
    (
        "age",
        &["age", "old", "how old", "created", "creation", "uptime", "since"],
    ),
    (
        "restarts",
        &["restarts", "restart", "restarted", "restart count", "restartcount", "crashes"],
    ),
    (
        "environment-variable",
        &[
            "environment-variable",
            "environment variable",
            "environment",
            "env",
            "env var",
            "envvar",
            "env variable",
            "variable",
            "var",
        ],
    ),
    (
        "mount-path",
        &["mount-path", "mount path", "mountpath", "mount", "mounts", "mounted", "volume mount", "volume"],
    ),
    (
        "port",
        &["port", "ports", "port number", "listening", "target port", "targetport"],
    ),
    (
        "readiness-probe",
        &["readiness-probe", "readiness probe", "readinessprobe", "readiness", "probe"],
    ),
];

/// Maps an action token to its canonical action. Case-insensitive and
/// whitespace-trimmed; a token with no synonym comes back unchanged.
pub fn normalize(token: &str) -> String {
    canonical(token).map_or_else(|| token.to_string(), str::to_string)
}

/// Like [`normalize`] but distinguishes a hit from a passthrough.
pub fn canonical(token: &str) -> Option<&'static str> {
    let key = token
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    SYNONYMS
        .iter()
        .find(|(_, spellings)| spellings.contains(&key.as_str()))
        .map(|(action, _)| *action)
}
