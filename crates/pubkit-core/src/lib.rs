//! Shared plumbing for pubkit pipelines.
//!
//! Every external effect a pipeline performs goes through one of these
//! modules: child processes through [`process`], operator questions through
//! [`prompt`], and staging directories through [`scratch`].

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;
pub mod process;
pub mod prompt;
pub mod release;
pub mod scratch;

pub use process::{
    CommandSpec, ProcessError, ProcessOutput, ProcessRunner, SpawnedProcessSet, Stdio,
    TokioProcessRunner,
};
pub use prompt::{
    ask, Answer, Answers, InquirePrompter, PromptError, Prompter, Question, QuestionKind,
};
pub use release::{ReleaseTag, VersionBump};
pub use scratch::{ScratchError, ScratchManager, ScratchWorkspace};
