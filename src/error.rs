use std::time::Duration;

use thiserror::Error;

/// The translator could not produce a well-formed resolution.
#[derive(Debug, Error)]
pub enum TranslationFailure {
    #[error("translator request failed: {0}")]
    Transport(String),

    #[error("translator returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("translator response is not valid JSON: {0}")]
    Malformed(String),

    #[error("translator response has neither kubectl_command nor general_response")]
    MissingKeys,

    #[error("translator response has both kubectl_command and general_response")]
    BothKeys,

    #[error("translator did not answer within {0:?}")]
    Timeout(Duration),
}

/// A resolved command ran but the command layer reported an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{command}` failed: {diagnostic}")]
pub struct ExecutionFailure {
    pub command: String,
    pub diagnostic: String,
}

impl ExecutionFailure {
    pub fn new(command: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("mode `{0}` needs ANTHROPIC_API_KEY")]
    MissingApiKey(String),
}
