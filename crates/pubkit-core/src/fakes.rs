//! In-memory collaborators for exercising pipelines without a terminal or
//! real child processes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::process::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner};
use crate::prompt::{Answer, PromptError, Prompter, Question};

type Effect = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync>;

enum Reaction {
    Stdout(String),
    Fail(Option<i32>),
    Effect(Effect),
}

struct Rule {
    prefix: String,
    reaction: Reaction,
}

/// Runner that records every command and answers from a rule list.
///
/// Rules match on the rendered command line prefix; the first match wins.
/// Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `stdout` for commands starting with `prefix`.
    pub fn stdout(mut self, prefix: &str, stdout: &str) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            reaction: Reaction::Stdout(stdout.to_string()),
        });
        self
    }

    /// Fail with exit code 1 for commands starting with `prefix`.
    pub fn fail(mut self, prefix: &str) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            reaction: Reaction::Fail(Some(1)),
        });
        self
    }

    /// Run `effect` for commands starting with `prefix`.
    pub fn effect<F>(mut self, prefix: &str, effect: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            reaction: Reaction::Effect(Box::new(effect)),
        });
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CommandSpec>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every command run so far, rendered as command lines.
    pub fn calls(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    /// Every command run so far.
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.lock().clone()
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        self.lock().push(spec.clone());

        let line = spec.to_string();
        let Some(rule) = self.rules.iter().find(|rule| line.starts_with(&rule.prefix)) else {
            return Ok(ProcessOutput::default());
        };

        match &rule.reaction {
            Reaction::Stdout(stdout) => Ok(ProcessOutput {
                stdout: stdout.clone(),
            }),
            Reaction::Fail(exit_code) => Err(ProcessError::Failed {
                command: line,
                exit_code: *exit_code,
            }),
            Reaction::Effect(effect) => effect(spec),
        }
    }
}

/// Prompter that answers from a script keyed by question name.
///
/// Unscripted questions receive their default answer.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: HashMap<String, Answer>,
    failure: Option<String>,
    asked: Mutex<Vec<Question>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, name: &str, answer: Answer) -> Self {
        self.answers.insert(name.to_string(), answer);
        self
    }

    /// Fail every prompt with `cause`.
    pub fn fail_with(mut self, cause: &str) -> Self {
        self.failure = Some(cause.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Question>> {
        self.asked.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Names of the questions asked so far.
    pub fn asked(&self) -> Vec<String> {
        self.lock().iter().map(|q| q.name.clone()).collect()
    }

    /// The questions asked so far.
    pub fn questions(&self) -> Vec<Question> {
        self.lock().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt(&self, question: &Question) -> Result<Answer, PromptError> {
        self.lock().push(question.clone());

        if let Some(cause) = &self.failure {
            return Err(PromptError::Failed {
                question: question.name.clone(),
                cause: cause.clone(),
            });
        }

        self.answers
            .get(&question.name)
            .cloned()
            .or_else(|| question.default_answer())
            .ok_or_else(|| PromptError::Failed {
                question: question.name.clone(),
                cause: "no scripted answer".to_string(),
            })
    }
}
