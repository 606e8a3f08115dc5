// Wire and pipeline types for the natural-language query path.
use serde::{Deserialize, Serialize};

/// What the translator resolved a query to. Exactly one of the two shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCommand {
    Kubectl(String),
    General(String),
}

/// Inbound body of `POST /query`. `query` is optional here so a missing
/// field can be answered with a 400 instead of a rejection from the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub query: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
