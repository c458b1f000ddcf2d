//! Interactive operator questions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Predicate deciding whether a question is asked, given earlier answers.
pub type Condition = Arc<dyn Fn(&Answers) -> bool + Send + Sync>;

/// The shape of a question and its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Yes/no
    Confirm { default: bool },

    /// One of an enumerated list; `default` indexes `choices`
    Select { choices: Vec<String>, default: usize },

    /// Free text
    Text { default: Option<String> },
}

/// A single question to put to the operator.
#[derive(Clone)]
pub struct Question {
    /// Key the answer is stored under
    pub name: String,

    /// Text shown to the operator
    pub message: String,

    /// Kind and default
    pub kind: QuestionKind,

    when: Option<Condition>,
}

impl Question {
    pub fn confirm(name: impl Into<String>, message: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            kind: QuestionKind::Confirm { default },
            when: None,
        }
    }

    /// A single-choice question. An unknown `default` falls back to the first choice.
    pub fn select<I, S>(
        name: impl Into<String>,
        message: impl Into<String>,
        choices: I,
        default: &str,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
        let default = choices.iter().position(|c| c == default).unwrap_or(0);

        Self {
            name: name.into(),
            message: message.into(),
            kind: QuestionKind::Select { choices, default },
            when: None,
        }
    }

    pub fn text(
        name: impl Into<String>,
        message: impl Into<String>,
        default: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            kind: QuestionKind::Text { default },
            when: None,
        }
    }

    /// Only ask this question when `condition` holds for the answers so far.
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Answers) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(condition));
        self
    }

    /// Whether the question should be asked.
    pub fn applies(&self, answers: &Answers) -> bool {
        self.when.as_ref().map_or(true, |condition| condition(answers))
    }

    /// The answer an operator gets by accepting the default.
    pub fn default_answer(&self) -> Option<Answer> {
        match &self.kind {
            QuestionKind::Confirm { default } => Some(Answer::Bool(*default)),
            QuestionKind::Select { choices, default } => {
                choices.get(*default).cloned().map(Answer::Choice)
            }
            QuestionKind::Text { default } => default.clone().map(Answer::Text),
        }
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("name", &self.name)
            .field("message", &self.message)
            .field("kind", &self.kind)
            .field("conditional", &self.when.is_some())
            .finish()
    }
}

/// One answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Bool(bool),
    Choice(String),
    Text(String),
}

/// Answers keyed by question name. Skipped questions are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers {
    values: BTreeMap<String, Answer>,
}

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, answer: Answer) {
        self.values.insert(name.into(), answer);
    }

    pub fn get(&self, name: &str) -> Option<&Answer> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(Answer::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// A select or text answer as a string.
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(Answer::Choice(value)) | Some(Answer::Text(value)) => Some(value),
            _ => None,
        }
    }
}

/// Errors from asking questions.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Unable to ask '{question}': {cause}")]
    Failed { question: String, cause: String },

    #[error("Question '{question}' got an answer of the wrong kind")]
    WrongKind { question: String },
}

/// Puts a single question to the operator.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, question: &Question) -> Result<Answer, PromptError>;
}

/// Ask `questions` in order, skipping any whose condition fails.
pub async fn ask(prompter: &dyn Prompter, questions: &[Question]) -> Result<Answers, PromptError> {
    let mut answers = Answers::new();

    for question in questions {
        if !question.applies(&answers) {
            tracing::debug!("Skipping question '{}'", question.name);
            continue;
        }

        let answer = prompter.prompt(question).await?;
        answers.insert(question.name.clone(), answer);
    }

    Ok(answers)
}

/// Terminal prompter backed by `inquire`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InquirePrompter;

impl InquirePrompter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prompter for InquirePrompter {
    async fn prompt(&self, question: &Question) -> Result<Answer, PromptError> {
        let message = question.message.clone();
        let kind = question.kind.clone();

        let result = tokio::task::spawn_blocking(move || prompt_blocking(&message, &kind))
            .await
            .map_err(|e| PromptError::Failed {
                question: question.name.clone(),
                cause: e.to_string(),
            })?;

        result.map_err(|e| PromptError::Failed {
            question: question.name.clone(),
            cause: e.to_string(),
        })
    }
}

fn prompt_blocking(message: &str, kind: &QuestionKind) -> Result<Answer, inquire::InquireError> {
    match kind {
        QuestionKind::Confirm { default } => inquire::Confirm::new(message)
            .with_default(*default)
            .prompt()
            .map(Answer::Bool),
        QuestionKind::Select { choices, default } => {
            inquire::Select::new(message, choices.clone())
                .with_starting_cursor(*default)
                .prompt()
                .map(Answer::Choice)
        }
        QuestionKind::Text { default } => {
            let mut text = inquire::Text::new(message);
            if let Some(default) = default {
                text = text.with_default(default);
            }
            text.prompt().map(Answer::Text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedPrompter;

    #[test]
    fn select_default_resolves_to_index() {
        let question = Question::select("tag", "Channel?", ["stable", "beta", "alpha"], "beta");

        assert_eq!(
            question.default_answer(),
            Some(Answer::Choice("beta".to_string()))
        );
    }

    #[test]
    fn select_unknown_default_falls_back_to_first() {
        let question = Question::select("tag", "Channel?", ["stable", "beta"], "nightly");

        assert_eq!(
            question.default_answer(),
            Some(Answer::Choice("stable".to_string()))
        );
    }

    #[tokio::test]
    async fn skips_questions_whose_condition_fails() {
        let prompter = ScriptedPrompter::new().answer("build", Answer::Bool(false));

        let questions = vec![
            Question::confirm("build", "Build reference docs?", true),
            Question::select("tag", "Channel?", ["stable", "beta"], "stable")
                .when(|answers| answers.bool("build") == Some(true)),
        ];

        let answers = ask(&prompter, &questions).await.unwrap();

        assert_eq!(answers.bool("build"), Some(false));
        assert!(!answers.contains("tag"));
        assert_eq!(prompter.asked(), vec!["build".to_string()]);
    }

    #[tokio::test]
    async fn asks_conditional_question_when_condition_holds() {
        let prompter = ScriptedPrompter::new()
            .answer("build", Answer::Bool(true))
            .answer("tag", Answer::Choice("beta".to_string()));

        let questions = vec![
            Question::confirm("build", "Build reference docs?", true),
            Question::select("tag", "Channel?", ["stable", "beta"], "stable")
                .when(|answers| answers.bool("build") == Some(true)),
        ];

        let answers = ask(&prompter, &questions).await.unwrap();

        assert_eq!(answers.string("tag"), Some("beta"));
        assert_eq!(answers.len(), 2);
    }

    #[tokio::test]
    async fn propagates_prompt_failure() {
        let prompter = ScriptedPrompter::new().fail_with("not a terminal");

        let questions = vec![Question::confirm("publish", "Publish?", false)];
        let err = ask(&prompter, &questions).await.unwrap_err();

        assert!(err.to_string().contains("not a terminal"));
    }
}
