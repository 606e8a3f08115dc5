use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::commands::ai::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::error::ConfigError;

/// Which front door answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every query goes through the translator retry loop.
    Translator,
    /// Pattern-matched lookups only; no translator needed.
    Direct,
    /// Direct lookups for shapes the router recognizes, translator otherwise.
    Hybrid,
}

impl Mode {
    pub fn needs_translator(self) -> bool {
        matches!(self, Mode::Translator | Mode::Hybrid)
    }

    pub fn needs_router(self) -> bool {
        matches!(self, Mode::Direct | Mode::Hybrid)
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "translator" => Ok(Mode::Translator),
            "direct" => Ok(Mode::Direct),
            "hybrid" => Ok(Mode::Hybrid),
            _ => Err(ConfigError::Invalid {
                key: "mode",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: String,
    /// `None` picks hybrid when an API key is present, direct otherwise.
    pub mode: Option<Mode>,
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
    pub interpret_timeout_secs: u64,
    pub execute_timeout_secs: u64,
    pub kube_context: Option<String>,
    pub log_level: String,
    pub log_tail_lines: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            mode: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            max_tokens: 256,
            interpret_timeout_secs: 30,
            execute_timeout_secs: 30,
            kube_context: None,
            log_level: "info".to_string(),
            log_tail_lines: 50,
        }
    }
}

impl Settings {
    /// `.env`, then the YAML file named by `CLUSTER_QUERY_CONFIG`, then
    /// individual environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut settings = match std::env::var("CLUSTER_QUERY_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CLUSTER_QUERY_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("CLUSTER_QUERY_MODE") {
            self.mode = Some(v.parse()?);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = get("CLUSTER_QUERY_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("CLUSTER_QUERY_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("CLUSTER_QUERY_INTERPRET_TIMEOUT_SECS") {
            self.interpret_timeout_secs = parse_secs("interpret_timeout_secs", &v)?;
        }
        if let Some(v) = get("CLUSTER_QUERY_EXECUTE_TIMEOUT_SECS") {
            self.execute_timeout_secs = parse_secs("execute_timeout_secs", &v)?;
        }
        if let Some(v) = get("CLUSTER_QUERY_KUBE_CONTEXT") {
            self.kube_context = Some(v);
        }
        if let Some(v) = get("CLUSTER_QUERY_LOG") {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mode = self.mode();
        if mode.needs_translator() && self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingApiKey(format!("{mode:?}").to_lowercase()));
        }
        if self.interpret_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "interpret_timeout_secs",
                value: "0".into(),
            });
        }
        if self.execute_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "execute_timeout_secs",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(if self.api_key.is_some() {
            Mode::Hybrid
        } else {
            Mode::Direct
        })
    }

    pub fn interpret_timeout(&self) -> Duration {
        Duration::from_secs(self.interpret_timeout_secs)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout_secs)
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
