// Spawn kubectl subprocesses for resolved commands

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ExecutionFailure;

/// Returned in place of an empty stdout. Empty output is not a failure.
pub const NO_OUTPUT: &str = "No output available";

/// Longest diagnostic tail fed back to the translator.
pub const DIAGNOSTIC_TAIL_CHARS: usize = 2000;

#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs one command once. Never retries.
    async fn execute(&self, command: &str) -> Result<String, ExecutionFailure>;
}

/// How a command string will be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `kubectl` with pre-split arguments, no shell involved.
    Direct(Vec<String>),
    /// `kubectl` piped through text filters, run by `sh -c`. `kubectl` holds
    /// its arguments only; each filter stage is a full argv.
    Pipeline {
        kubectl: Vec<String>,
        filters: Vec<Vec<String>>,
    },
}

/// Programs allowed after a `|`. None of them can launch other programs.
pub const FILTERS: &[&str] = &["wc", "grep", "head", "tail", "uniq", "cut", "tr", "jq"];

/// Splits `line` on unquoted `|`. Any other shell control syntax outside
/// single quotes is refused.
fn pipeline_stages(line: &str) -> Result<Vec<&str>, String> {
    let mut stages = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => {
                chars.next();
            }
            (Some('"'), '"') => quote = None,
            (_, '`') => return Err("command substitution is not allowed".into()),
            (_, '$') => return Err("shell expansion is not allowed".into()),
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '|') => {
                if matches!(chars.peek(), Some((_, '|'))) {
                    return Err("`||` is not allowed".into());
                }
                stages.push(&line[start..idx]);
                start = idx + 1;
            }
            (None, ';' | '&' | '>' | '<' | '(' | ')' | '\n') => {
                return Err(format!("`{}` is not allowed", c.escape_default()));
            }
            (None, _) => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated quote".into());
    }
    stages.push(&line[start..]);
    Ok(stages)
}

/// Decides how to run `command`. The first stage must be `kubectl`; later
/// stages must be one of [`FILTERS`]. Lists, redirects and substitutions are
/// refused.
pub fn plan(command: &str) -> Result<Invocation, ExecutionFailure> {
    let trimmed = command.trim();
    let refuse = |why: String| ExecutionFailure::new(trimmed, why);

    let stages = pipeline_stages(trimmed).map_err(|e| refuse(format!("refusing to run: {e}")))?;
    let mut stages = stages
        .into_iter()
        .map(|stage| {
            shell_words::split(stage).map_err(|e| refuse(format!("cannot parse command: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let mut kubectl = stages.next().unwrap_or_default();
    match kubectl.first().map(String::as_str) {
        Some("kubectl") => {}
        Some(other) => {
            return Err(refuse(format!(
                "refusing to run `{other}`: only kubectl commands are executed"
            )))
        }
        None => return Err(refuse("empty command".into())),
    }
    kubectl.remove(0);

    let filters: Vec<Vec<String>> = stages.collect();
    for filter in &filters {
        match filter.first().map(String::as_str) {
            Some(name) if FILTERS.contains(&name) => {}
            Some(other) => {
                return Err(refuse(format!(
                    "refusing to pipe into `{other}`: allowed filters are {}",
                    FILTERS.join(", ")
                )))
            }
            None => return Err(refuse("empty pipeline stage".into())),
        }
    }

    if filters.is_empty() {
        Ok(Invocation::Direct(kubectl))
    } else {
        Ok(Invocation::Pipeline { kubectl, filters })
    }
}

/// Last `max_chars` characters of `text`, on a char boundary.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - max_chars)
        .map_or(0, |(idx, _)| idx);
    &text[start..]
}

pub struct KubectlExecutor {
    kubectl: PathBuf,
    context: Option<String>,
}

impl KubectlExecutor {
    /// Resolves `kubectl` on PATH, falling back to the bare name.
    pub fn new(context: Option<String>) -> Self {
        let kubectl = which::which("kubectl").unwrap_or_else(|_| PathBuf::from("kubectl"));
        Self::with_kubectl(kubectl, context)
    }

    pub fn with_kubectl(kubectl: PathBuf, context: Option<String>) -> Self {
        Self { kubectl, context }
    }

    /// `args` plus `--context` when one is configured and not already given.
    fn with_context(&self, args: &[String]) -> Vec<String> {
        let mut args = args.to_vec();
        if let Some(ref ctx) = self.context {
            if !args.iter().any(|a| a.starts_with("--context")) {
                args.push(format!("--context={ctx}"));
            }
        }
        args
    }

    /// The `sh -c` line for a pipeline, every word re-quoted.
    pub fn shell_line(&self, kubectl: &[String], filters: &[Vec<String>]) -> String {
        let mut first = vec![self.kubectl.to_string_lossy().into_owned()];
        first.extend(self.with_context(kubectl));
        std::iter::once(&first)
            .chain(filters)
            .map(shell_words::join)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn command_for(&self, invocation: &Invocation) -> Command {
        match invocation {
            Invocation::Direct(args) => {
                let mut cmd = Command::new(&self.kubectl);
                cmd.args(self.with_context(args));
                cmd
            }
            Invocation::Pipeline { kubectl, filters } => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(self.shell_line(kubectl, filters));
                cmd
            }
        }
    }
}

#[async_trait]
impl Executor for KubectlExecutor {
    async fn execute(&self, command: &str) -> Result<String, ExecutionFailure> {
        let invocation = plan(command)?;
        log::info!("kubectl: running {command}");

        let output = self
            .command_for(&invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutionFailure::new(command, format!("failed to spawn: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let detail = if stderr.is_empty() { stdout } else { stderr };
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            log::debug!("kubectl: exit {code} for {command}");
            return Err(ExecutionFailure::new(
                command,
                format!("exit status {code}: {}", tail(detail, DIAGNOSTIC_TAIL_CHARS)),
            ));
        }

        log::debug!("kubectl: {} byte(s) of output", stdout.len());
        if stdout.is_empty() {
            Ok(NO_OUTPUT.to_string())
        } else {
            Ok(stdout.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_commands_run_without_a_shell() {
        assert_eq!(
            plan("kubectl get pod web -n prod -o=jsonpath='{.status.podIP}'").unwrap(),
            Invocation::Direct(vec![
                "get".into(),
                "pod".into(),
                "web".into(),
                "-n".into(),
                "prod".into(),
                "-o=jsonpath={.status.podIP}".into(),
            ])
        );
    }

    #[test]
    fn pipelines_go_through_sh() {
        assert_eq!(
            plan("kubectl get pods -n default --no-headers | wc -l").unwrap(),
            Invocation::Pipeline {
                kubectl: vec![
                    "get".into(),
                    "pods".into(),
                    "-n".into(),
                    "default".into(),
                    "--no-headers".into(),
                ],
                filters: vec![vec!["wc".into(), "-l".into()]],
            }
        );
    }

    #[test]
    fn quoted_operators_are_plain_text() {
        assert!(matches!(
            plan("kubectl get pods --no-headers | grep -E 'web|api' | wc -l").unwrap(),
            Invocation::Pipeline { filters, .. } if filters.len() == 2
        ));
    }

    #[test]
    fn non_kubectl_commands_are_refused() {
        let err = plan("rm -rf /").unwrap_err();
        assert_eq!(err.command, "rm -rf /");
        assert!(err.diagnostic.contains("only kubectl"));
        assert!(plan("   ").is_err());
        assert!(plan("kubectl get pods 'unterminated").is_err());
    }

    #[test]
    fn shell_lists_and_substitutions_are_refused() {
        for cmd in [
            "kubectl version; touch x",
            "kubectl get pods && curl http://example.com",
            "kubectl get pods || true",
            "kubectl get pods > /tmp/out",
            "kubectl get pods < /dev/null",
            "kubectl get pods $(whoami)",
            "kubectl get pods `whoami`",
            "kubectl get pods \"$HOME\"",
            "kubectl get pods & sleep 1",
            "kubectl get pods\ntouch x",
        ] {
            let err = plan(cmd).unwrap_err();
            assert!(err.diagnostic.starts_with("refusing to run"), "{cmd}: {}", err.diagnostic);
        }
    }

    #[test]
    fn only_text_filters_follow_a_pipe() {
        let err = plan("kubectl get pods | sh").unwrap_err();
        assert!(err.diagnostic.contains("refusing to pipe into `sh`"));
        assert!(plan("kubectl get pods | awk '{print $1}'").is_err());
        assert!(plan("wc -l | kubectl get pods").is_err());
        assert!(plan("kubectl get pods | | wc -l").is_err());
    }

    #[test]
    fn context_reaches_every_kubectl_stage() {
        let executor =
            KubectlExecutor::with_kubectl(PathBuf::from("/usr/bin/kubectl"), Some("prod".into()));
        let Invocation::Pipeline { kubectl, filters } =
            plan("kubectl get pods -n default --no-headers | wc -l").unwrap()
        else {
            panic!("expected a pipeline");
        };
        assert_eq!(
            executor.shell_line(&kubectl, &filters),
            "/usr/bin/kubectl get pods -n default --no-headers '--context=prod' | wc -l"
        );

        let explicit = vec!["get".into(), "pods".into(), "--context=dev".into()];
        assert_eq!(executor.with_context(&explicit), explicit);
    }

    #[test]
    fn tail_keeps_the_end_on_char_boundaries() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("ééé", 2), "éé");
    }

    #[tokio::test]
    async fn refused_command_is_an_execution_failure() {
        let executor = KubectlExecutor::new(None);
        let err = executor.execute("echo hi").await.unwrap_err();
        assert_eq!(err.command, "echo hi");
    }

    // `sh` stands in for kubectl so each case scripts its own exit status.
    #[cfg(unix)]
    fn scripted(context: Option<&str>) -> KubectlExecutor {
        let sh = which::which("sh").unwrap();
        KubectlExecutor::with_kubectl(sh, context.map(str::to_string))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_command_reports_exit_status_and_stderr() {
        let err = scripted(Some("prod"))
            .execute("kubectl -c 'echo partial; echo boom >&2; exit 3'")
            .await
            .unwrap_err();
        assert_eq!(err.diagnostic, "exit status 3: boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_stderr_falls_back_to_stdout() {
        let err = scripted(None)
            .execute("kubectl -c 'echo partial; exit 1'")
            .await
            .unwrap_err();
        assert_eq!(err.diagnostic, "exit status 1: partial");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn long_diagnostics_keep_only_the_tail() {
        let err = scripted(None)
            .execute(r#"kubectl -c 'yes x | head -n 3000 | tr -d "\n" >&2; exit 2'"#)
            .await
            .unwrap_err();
        assert_eq!(err.diagnostic, format!("exit status 2: {}", "x".repeat(DIAGNOSTIC_TAIL_CHARS)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipelines_run_with_the_configured_context() {
        let out = scripted(Some("prod"))
            .execute("kubectl -c 'echo ARGS:$0' | grep ARGS")
            .await
            .unwrap();
        assert_eq!(out, "ARGS:--context=prod");

        let out = scripted(None).execute("kubectl -c 'true'").await.unwrap();
        assert_eq!(out, NO_OUTPUT);
    }
}
