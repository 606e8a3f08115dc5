// Anthropic Messages API integration — natural language → kubectl command
// Transport: reqwest, non-streaming

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TranslationFailure;
use crate::models::query::ResolvedCommand;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

// ── prompt variants ───────────────────────────────────────────────────────────

/// Escalating instruction sets. Each rung keeps everything the previous one
/// said and adds one more directive; retries climb the ladder in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PromptVariant {
    Baseline = 1,
    Specific = 2,
    Structural = 3,
}

impl PromptVariant {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// The next rung, or `None` at the top of the ladder.
    pub fn next(self) -> Option<Self> {
        match self {
            PromptVariant::Baseline => Some(PromptVariant::Specific),
            PromptVariant::Specific => Some(PromptVariant::Structural),
            PromptVariant::Structural => None,
        }
    }

    pub fn system_prompt(self) -> String {
        let mut prompt = String::from(BASELINE_PROMPT);
        if self >= PromptVariant::Specific {
            prompt.push_str(SPECIFIC_DIRECTIVE);
        }
        if self >= PromptVariant::Structural {
            prompt.push_str(STRUCTURAL_DIRECTIVE);
        }
        prompt
    }
}

const BASELINE_PROMPT: &str = "\
You are an assistant that interprets Kubernetes questions and answers with structured JSON.\n\
For each query, produce the kubectl command that answers it.\n\n\
Fields in the response JSON:\n\
- \"kubectl_command\": the exact kubectl command to run. It may pipe into wc, grep, head, \
tail, uniq, cut, tr or jq; no other programs, redirects or command lists are run.\n\n\
Examples:\n\
- Query: \"How many pods are in the default namespace?\"\n\
  Response: {\"kubectl_command\": \"kubectl get pods -n default --no-headers | wc -l\"}\n\
- Query: \"What is the IP of the pod nginx in the web namespace?\"\n\
  Response: {\"kubectl_command\": \"kubectl get pod nginx -n web -o=jsonpath='{.status.podIP}'\"}\n\
- Query: \"Show logs for pod my-pod in the default namespace.\"\n\
  Response: {\"kubectl_command\": \"kubectl logs my-pod -n default\"}\n\n\
If the query does not call for a kubectl command, answer it directly as:\n\
{\"general_response\": \"<informative answer>\"}\n\n\
Never include both keys. Respond with the JSON object only, without commentary.";

const SPECIFIC_DIRECTIVE: &str = "\n\n\
Be specific and complete about targeting: always name the resource kind, \
pass the namespace explicitly with -n, and select exactly the field the question asks for.";

const STRUCTURAL_DIRECTIVE: &str = "\n\n\
A previous command failed. Reconsider the structure of the command: check that the \
resource kind, flag names, jsonpath expressions and pipeline are valid for kubectl \
before answering.";

/// Builds the user turn. Feedback from a failed execution is appended verbatim.
pub fn user_prompt(query: &str, error_feedback: Option<&str>) -> String {
    match error_feedback {
        Some(feedback) => format!(
            "Interpret this query: {query}\n\n\
             The previous command failed with this error:\n{feedback}"
        ),
        None => format!("Interpret this query: {query}"),
    }
}

// ── response validation ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawResolution {
    kubectl_command: Option<String>,
    general_response: Option<String>,
}

/// Accepts the translator's text only if it is a JSON object carrying exactly
/// one of `kubectl_command` / `general_response`.
pub fn parse_resolution(text: &str) -> Result<ResolvedCommand, TranslationFailure> {
    let body = strip_code_fence(text);
    let raw: RawResolution =
        serde_json::from_str(body).map_err(|e| TranslationFailure::Malformed(e.to_string()))?;

    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    match (present(raw.kubectl_command), present(raw.general_response)) {
        (Some(command), None) => Ok(ResolvedCommand::Kubectl(command.trim().to_string())),
        (None, Some(answer)) => Ok(ResolvedCommand::General(answer.trim().to_string())),
        (Some(_), Some(_)) => Err(TranslationFailure::BothKeys),
        (None, None) => Err(TranslationFailure::MissingKeys),
    }
}

/// Models like to wrap JSON in ```json fences even when told not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ── interpreter seam ──────────────────────────────────────────────────────────

#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(
        &self,
        query: &str,
        variant: PromptVariant,
        error_feedback: Option<&str>,
    ) -> Result<ResolvedCommand, TranslationFailure>;
}

pub struct AnthropicInterpreter {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicInterpreter {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, TranslationFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationFailure::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            api_url,
            model,
            max_tokens,
            timeout,
        })
    }
}

#[async_trait]
impl Interpreter for AnthropicInterpreter {
    async fn interpret(
        &self,
        query: &str,
        variant: PromptVariant,
        error_feedback: Option<&str>,
    ) -> Result<ResolvedCommand, TranslationFailure> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.3,
            "system": variant.system_prompt(),
            "messages": [
                {"role": "user", "content": user_prompt(query, error_feedback)}
            ]
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslationFailure::Timeout(self.timeout)
                } else {
                    TranslationFailure::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationFailure::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranslationFailure::Malformed(e.to_string()))?;

        let text = json["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|block| block["text"].as_str())
            .collect::<String>();

        log::debug!("translator (variant {}) replied: {text}", variant.number());
        parse_resolution(&text)
    }
}
