// Resolution loop: interpret, execute, feed errors back, escalate
// Each resolve() call keeps its state on its own stack; one Resolver serves concurrent queries

use std::sync::Arc;
use std::time::Duration;

use crate::commands::ai::{Interpreter, PromptVariant};
use crate::commands::kubectl::{Executor, NO_OUTPUT};
use crate::error::{ExecutionFailure, TranslationFailure};
use crate::models::query::ResolvedCommand;

pub const EXHAUSTED_MESSAGE: &str =
    "Could not generate a successful command. Please refine your question or try a different query.";

/// Upper bound on interpret-then-execute rounds; one per prompt variant.
pub const MAX_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A command ran successfully.
    Executed,
    /// The translator answered directly; nothing was executed.
    General,
    /// Every variant was used up.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub answer: String,
    pub outcome: Outcome,
    /// Interpretation calls made.
    pub attempts: u8,
}

enum State {
    Interpreting {
        variant: PromptVariant,
        feedback: Option<String>,
    },
    Executing {
        variant: PromptVariant,
        command: String,
    },
    Success {
        answer: String,
        outcome: Outcome,
    },
    Exhausted,
}

#[derive(Clone)]
pub struct Resolver {
    interpreter: Arc<dyn Interpreter>,
    executor: Arc<dyn Executor>,
    interpret_timeout: Duration,
    execute_timeout: Duration,
}

impl Resolver {
    pub fn new(
        interpreter: Arc<dyn Interpreter>,
        executor: Arc<dyn Executor>,
        interpret_timeout: Duration,
        execute_timeout: Duration,
    ) -> Self {
        Self {
            interpreter,
            executor,
            interpret_timeout,
            execute_timeout,
        }
    }

    pub async fn resolve(&self, query: &str) -> Resolution {
        let mut attempts = 0u8;
        let mut state = State::Interpreting {
            variant: PromptVariant::Baseline,
            feedback: None,
        };

        loop {
            state = match state {
                State::Interpreting { variant, feedback } => {
                    attempts += 1;
                    debug_assert!(attempts <= MAX_ATTEMPTS);
                    match self.interpret(query, variant, feedback.as_deref()).await {
                        Ok(ResolvedCommand::General(answer)) => {
                            log::info!("resolver: general response on variant {}", variant.number());
                            State::Success {
                                answer,
                                outcome: Outcome::General,
                            }
                        }
                        Ok(ResolvedCommand::Kubectl(command)) => {
                            State::Executing { variant, command }
                        }
                        Err(e) => {
                            log::warn!("resolver: variant {} not interpretable: {e}", variant.number());
                            match variant.next() {
                                Some(next) => State::Interpreting {
                                    variant: next,
                                    feedback,
                                },
                                None => State::Exhausted,
                            }
                        }
                    }
                }
                State::Executing { variant, command } => match self.execute(&command).await {
                    Ok(output) => State::Success {
                        answer: if output.trim().is_empty() {
                            NO_OUTPUT.to_string()
                        } else {
                            output
                        },
                        outcome: Outcome::Executed,
                    },
                    Err(failure) => {
                        log::warn!(
                            "resolver: variant {} command failed: {failure}",
                            variant.number()
                        );
                        match variant.next() {
                            Some(next) => State::Interpreting {
                                variant: next,
                                feedback: Some(failure.diagnostic),
                            },
                            None => State::Exhausted,
                        }
                    }
                },
                State::Success { answer, outcome } => {
                    return Resolution {
                        answer,
                        outcome,
                        attempts,
                    }
                }
                State::Exhausted => {
                    log::warn!("resolver: gave up after {attempts} attempt(s) for {query:?}");
                    return Resolution {
                        answer: EXHAUSTED_MESSAGE.to_string(),
                        outcome: Outcome::Exhausted,
                        attempts,
                    };
                }
            };
        }
    }

    async fn interpret(
        &self,
        query: &str,
        variant: PromptVariant,
        feedback: Option<&str>,
    ) -> Result<ResolvedCommand, TranslationFailure> {
        tokio::time::timeout(
            self.interpret_timeout,
            self.interpreter.interpret(query, variant, feedback),
        )
        .await
        .map_err(|_| TranslationFailure::Timeout(self.interpret_timeout))?
    }

    async fn execute(&self, command: &str) -> Result<String, ExecutionFailure> {
        tokio::time::timeout(self.execute_timeout, self.executor.execute(command))
            .await
            .map_err(|_| {
                ExecutionFailure::new(
                    command,
                    format!("timed out after {}s", self.execute_timeout.as_secs()),
                )
            })?
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Interpret { variant: u8, feedback: Option<String> },
        Execute(String),
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    struct ScriptedInterpreter {
        replies: Mutex<VecDeque<Result<ResolvedCommand, TranslationFailure>>>,
        log: Log,
    }

    #[async_trait]
    impl Interpreter for ScriptedInterpreter {
        async fn interpret(
            &self,
            _query: &str,
            variant: PromptVariant,
            error_feedback: Option<&str>,
        ) -> Result<ResolvedCommand, TranslationFailure> {
            self.log.lock().unwrap().push(Call::Interpret {
                variant: variant.number(),
                feedback: error_feedback.map(str::to_string),
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TranslationFailure::MissingKeys))
        }
    }

    struct ScriptedExecutor {
        replies: Mutex<VecDeque<Result<String, ExecutionFailure>>>,
        log: Log,
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn execute(&self, command: &str) -> Result<String, ExecutionFailure> {
            self.log.lock().unwrap().push(Call::Execute(command.to_string()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ExecutionFailure::new(command, "unscripted")))
        }
    }

    struct SlowInterpreter;

    #[async_trait]
    impl Interpreter for SlowInterpreter {
        async fn interpret(
            &self,
            _query: &str,
            _variant: PromptVariant,
            _error_feedback: Option<&str>,
        ) -> Result<ResolvedCommand, TranslationFailure> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ResolvedCommand::General("too late".into()))
        }
    }

    struct SlowExecutor {
        log: Log,
    }

    #[async_trait]
    impl Executor for SlowExecutor {
        async fn execute(&self, command: &str) -> Result<String, ExecutionFailure> {
            self.log.lock().unwrap().push(Call::Execute(command.to_string()));
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
    }

    fn resolver(
        interpretations: Vec<Result<ResolvedCommand, TranslationFailure>>,
        executions: Vec<Result<String, ExecutionFailure>>,
    ) -> (Resolver, Log) {
        let log: Log = Arc::default();
        let interpreter = ScriptedInterpreter {
            replies: Mutex::new(interpretations.into()),
            log: log.clone(),
        };
        let executor = ScriptedExecutor {
            replies: Mutex::new(executions.into()),
            log: log.clone(),
        };
        let resolver = Resolver::new(
            Arc::new(interpreter),
            Arc::new(executor),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        (resolver, log)
    }

    fn kubectl(cmd: &str) -> Result<ResolvedCommand, TranslationFailure> {
        Ok(ResolvedCommand::Kubectl(cmd.to_string()))
    }

    fn fail(diagnostic: &str) -> Result<String, ExecutionFailure> {
        Err(ExecutionFailure::new("kubectl", diagnostic))
    }

    fn calls(log: &Log) -> Vec<Call> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn general_response_skips_execution() {
        let (resolver, log) = resolver(
            vec![Ok(ResolvedCommand::General("A pod is a group of containers.".into()))],
            vec![],
        );
        let res = resolver.resolve("what is a pod").await;
        assert_eq!(res.answer, "A pod is a group of containers.");
        assert_eq!(res.outcome, Outcome::General);
        assert!(!calls(&log).iter().any(|c| matches!(c, Call::Execute(_))));
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let (resolver, log) = resolver(vec![kubectl("kubectl get pods | wc -l")], vec![Ok("7".into())]);
        let res = resolver.resolve("how many pods are there").await;
        assert_eq!(res.answer, "7");
        assert_eq!(res.attempts, 1);
        assert_eq!(
            calls(&log),
            vec![
                Call::Interpret { variant: 1, feedback: None },
                Call::Execute("kubectl get pods | wc -l".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failure_feedback_reaches_the_next_variant() {
        let (resolver, log) = resolver(
            vec![kubectl("kubectl get pods -n nope"), kubectl("kubectl get pods -n default")],
            vec![fail("namespace not found"), Ok("3".into())],
        );
        let res = resolver.resolve("how many pods are there").await;
        assert_eq!(res.answer, "3");
        assert_eq!(res.outcome, Outcome::Executed);
        assert_eq!(
            calls(&log),
            vec![
                Call::Interpret { variant: 1, feedback: None },
                Call::Execute("kubectl get pods -n nope".into()),
                Call::Interpret {
                    variant: 2,
                    feedback: Some("namespace not found".into())
                },
                Call::Execute("kubectl get pods -n default".into()),
            ]
        );
    }

    #[tokio::test]
    async fn three_failed_executions_exhaust() {
        let (resolver, log) = resolver(
            vec![kubectl("a"), kubectl("b"), kubectl("c")],
            vec![fail("e1"), fail("e2"), fail("secret diagnostic")],
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.answer, EXHAUSTED_MESSAGE);
        assert_eq!(res.outcome, Outcome::Exhausted);
        let calls = calls(&log);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Interpret { .. })).count(), 3);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Execute(_))).count(), 3);
        assert_eq!(
            calls[4],
            Call::Interpret {
                variant: 3,
                feedback: Some("e2".into())
            }
        );
    }

    #[tokio::test]
    async fn success_on_the_last_variant() {
        let (resolver, log) = resolver(
            vec![kubectl("a"), kubectl("b"), kubectl("c")],
            vec![fail("e1"), fail("e2"), Ok("done".into())],
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.answer, "done");
        assert_eq!(res.outcome, Outcome::Executed);
        assert_eq!(res.attempts, 3);
        assert_eq!(calls(&log)[5], Call::Execute("c".into()));
    }

    #[tokio::test]
    async fn translation_failures_escalate_without_executing() {
        let (resolver, log) = resolver(
            vec![
                Err(TranslationFailure::Malformed("x".into())),
                Err(TranslationFailure::BothKeys),
                Err(TranslationFailure::MissingKeys),
            ],
            vec![],
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.answer, EXHAUSTED_MESSAGE);
        assert_eq!(res.attempts, 3);
        assert!(calls(&log).iter().all(|c| matches!(c, Call::Interpret { .. })));
    }

    #[tokio::test]
    async fn translation_failure_keeps_earlier_feedback() {
        let (resolver, log) = resolver(
            vec![
                kubectl("kubectl get pods -n nope"),
                Err(TranslationFailure::Transport("reset".into())),
                kubectl("kubectl get pods"),
            ],
            vec![fail("namespace not found"), Ok("".into())],
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.answer, NO_OUTPUT);
        assert_eq!(
            calls(&log)[3],
            Call::Interpret {
                variant: 3,
                feedback: Some("namespace not found".into())
            }
        );
    }

    #[tokio::test]
    async fn general_response_mid_loop_short_circuits() {
        let (resolver, log) = resolver(
            vec![kubectl("kubectl bad"), Ok(ResolvedCommand::General("cannot tell".into()))],
            vec![fail("unknown command")],
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.answer, "cannot tell");
        assert_eq!(res.attempts, 2);
        assert_eq!(calls(&log).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_translator_counts_as_a_failure() {
        let log: Log = Arc::default();
        let executor = ScriptedExecutor {
            replies: Mutex::new(VecDeque::new()),
            log: log.clone(),
        };
        let resolver = Resolver::new(
            Arc::new(SlowInterpreter),
            Arc::new(executor),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.outcome, Outcome::Exhausted);
        assert_eq!(res.attempts, 3);
        assert!(calls(&log).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_command_feeds_a_timeout_back() {
        let log: Log = Arc::default();
        let interpreter = ScriptedInterpreter {
            replies: Mutex::new(
                vec![kubectl("kubectl get pods"), kubectl("kubectl get pods -A")].into(),
            ),
            log: log.clone(),
        };
        let resolver = Resolver::new(
            Arc::new(interpreter),
            Arc::new(SlowExecutor { log: log.clone() }),
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        let res = resolver.resolve("q").await;
        assert_eq!(res.outcome, Outcome::Exhausted);
        assert_eq!(
            calls(&log)[..4],
            [
                Call::Interpret { variant: 1, feedback: None },
                Call::Execute("kubectl get pods".into()),
                Call::Interpret {
                    variant: 2,
                    feedback: Some("timed out after 2s".into())
                },
                Call::Execute("kubectl get pods -A".into()),
            ]
        );
        assert_eq!(
            calls(&log)[4],
            Call::Interpret {
                variant: 3,
                feedback: Some("timed out after 2s".into())
            }
        );
    }
}
