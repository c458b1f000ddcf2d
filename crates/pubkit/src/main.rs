//! pubkit CLI - docs publishing and npm release automation.

use std::path::PathBuf;

use clap::error::{ContextKind, ErrorKind};
use clap::{CommandFactory, Parser, Subcommand};
use pubkit_core::{ScratchManager, SpawnedProcessSet};
use pubkit_release::ReleaseError;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;
mod lifecycle;

use commands::Context;
use lifecycle::{ExitCause, Lifecycle};

#[derive(Parser, Debug)]
#[command(name = "pubkit")]
#[command(about = "Publish docs sites and npm releases for JavaScript libraries")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print help
    #[arg(short, long, global = true)]
    help: bool,

    /// Print version
    #[arg(short, long, global = true)]
    version: bool,

    /// Path to pubkit.toml config file
    #[arg(long, global = true, default_value = "pubkit.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Scaffold docs, theme config and pubkit.toml in the current project
    Init,

    /// Serve the docs site locally with Jekyll
    Serve,

    /// Publish the docs site to the pages branch
    PublishDocs,

    /// Release to npm, push a git tag and republish the docs
    PublishRelease,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => std::process::exit(parse_failure(err)),
    };

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    if cli.help || cli.version {
        if cli.help {
            print_help();
        }
        if cli.version {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        std::process::exit(0);
    }

    let Some(command) = cli.command else {
        print_help();
        std::process::exit(1);
    };

    std::process::exit(run(command, cli.config).await);
}

/// Run one command under the lifecycle and return the exit code.
async fn run(command: Commands, config_path: PathBuf) -> i32 {
    let processes = SpawnedProcessSet::new();
    let scratch = ScratchManager::new();
    let lifecycle = Lifecycle::new();

    let children = processes.clone();
    lifecycle.on_interrupt(move || {
        let signalled = children.terminate_all();
        if signalled > 0 {
            tracing::debug!("Sent SIGHUP to {} child process(es)", signalled);
        }
    });

    let workspaces = scratch.clone();
    lifecycle.on_shutdown(move |_| async move {
        workspaces.teardown_all();
    });

    let task = dispatch(command, config_path, processes, scratch);

    lifecycle.run(task, report_failure).await
}

async fn dispatch(
    command: Commands,
    config_path: PathBuf,
    processes: SpawnedProcessSet,
    scratch: ScratchManager,
) -> anyhow::Result<()> {
    let ctx = Context::current(config_path, processes, scratch)?;

    match command {
        Commands::Init => commands::init::run(ctx.project_root()).await,
        Commands::Serve => commands::serve::run(ctx).await,
        Commands::PublishDocs => commands::publish_docs::run(ctx).await,
        Commands::PublishRelease => commands::publish_release::run(ctx).await,
    }
}

/// Log a failed command once. A declined release exits quietly.
fn report_failure(err: anyhow::Error) -> ExitCause {
    if !is_declined(&err) {
        tracing::error!("{:#}", err);
    }
    ExitCause::Failure
}

fn is_declined(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ReleaseError>(), Some(ReleaseError::Declined))
}

/// Handle an argument error and return the exit code.
fn parse_failure(err: clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument => {
            let given = err
                .get(ContextKind::InvalidSubcommand)
                .or_else(|| err.get(ContextKind::InvalidArg))
                .map(|value| value.to_string())
                .unwrap_or_default();
            eprintln!("Invalid command given '{}'", given);
            print_help();
            1
        }
        _ => {
            let _ = err.print();
            1
        }
    }
}

fn print_help() {
    let _ = Cli::command().print_help();
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use pubkit_core::fakes::ScriptedPrompter;
    use pubkit_core::{Answer, ProcessError, ReleaseTag, VersionBump};
    use pubkit_docs::DocsError;
    use pubkit_release::{
        DocsPublisher, PackageRegistry, ReleaseConfig, ReleasePipeline, SourceControl,
    };
    use tracing_test::traced_test;

    /// Git, npm and docs in one stand-in; `fail_branch` breaks the first step.
    struct Stub {
        branch: &'static str,
        fail_branch: bool,
    }

    #[async_trait]
    impl SourceControl for Stub {
        async fn current_branch(&self) -> Result<String, ProcessError> {
            if self.fail_branch {
                return Err(ProcessError::Failed {
                    command: "Injected git error".to_string(),
                    exit_code: Some(128),
                });
            }
            Ok(self.branch.to_string())
        }

        async fn tag_exists(&self, _tag: &str) -> Result<bool, ProcessError> {
            Ok(false)
        }

        async fn create_tag(&self, _tag: &str) -> Result<(), ProcessError> {
            Ok(())
        }

        async fn push_tag(&self, _tag: &str) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PackageRegistry for Stub {
        async fn whoami(&self) -> Result<(), ProcessError> {
            Ok(())
        }

        async fn login(&self) -> Result<(), ProcessError> {
            Ok(())
        }

        async fn run_script(&self, _script: &str) -> Result<(), ProcessError> {
            Ok(())
        }

        async fn bump_version(&self, _bump: VersionBump) -> Result<String, ProcessError> {
            Ok("v1.0.1".to_string())
        }

        async fn publish(&self, _tag: ReleaseTag) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    #[async_trait]
    impl DocsPublisher for Stub {
        async fn publish_release_docs(
            &self,
            _tag: ReleaseTag,
            _version: &str,
        ) -> Result<(), DocsError> {
            Ok(())
        }
    }

    /// Run a stubbed release and report it the way the CLI does.
    async fn release(stub: Stub, prompter: ScriptedPrompter) -> ExitCause {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join("package.json"),
            r#"{ "name": "example-name", "version": "1.0.0", "scripts": { "test": "mocha" } }"#,
        )
        .unwrap();

        let stub = Arc::new(stub);
        let pipeline = ReleasePipeline::new(
            ReleaseConfig {
                project_root: temp.path().to_path_buf(),
                primary_branch: "master".to_string(),
            },
            Arc::new(prompter),
            stub.clone(),
            stub.clone(),
            stub,
        );

        match pipeline.run().await {
            Ok(_) => ExitCause::Success,
            Err(e) => report_failure(e.into()),
        }
    }

    fn error_lines(lines: &[&str]) -> usize {
        lines.iter().filter(|line| line.contains("ERROR")).count()
    }

    #[test]
    fn parses_commands() {
        let cli = Cli::try_parse_from(["pubkit", "publish-release"]).unwrap();
        assert_eq!(cli.command, Some(Commands::PublishRelease));

        let cli = Cli::try_parse_from(["pubkit", "publish-docs", "--verbose"]).unwrap();
        assert_eq!(cli.command, Some(Commands::PublishDocs));
        assert!(cli.verbose);
    }

    #[test]
    fn no_arguments_has_no_command() {
        let cli = Cli::try_parse_from(["pubkit"]).unwrap();

        assert!(cli.command.is_none());
        assert!(!cli.help);
        assert_eq!(cli.config, PathBuf::from("pubkit.toml"));
    }

    #[test]
    fn short_flags_are_help_and_version() {
        let cli = Cli::try_parse_from(["pubkit", "-h"]).unwrap();
        assert!(cli.help);

        let cli = Cli::try_parse_from(["pubkit", "-v"]).unwrap();
        assert!(cli.version);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = Cli::try_parse_from(["pubkit", "deploy-everything"]).unwrap_err();

        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument
        ));
        assert_eq!(parse_failure(err), 1);
    }

    #[test]
    fn declined_release_is_not_reported() {
        let declined = anyhow::Error::new(ReleaseError::Declined);
        let failed = anyhow::anyhow!("npm exploded");

        assert!(is_declined(&declined));
        assert!(!is_declined(&failed));
        assert_eq!(report_failure(declined), ExitCause::Failure);
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_step_is_the_first_logged_line() {
        let stub = Stub {
            branch: "master",
            fail_branch: true,
        };

        let cause = release(stub, ScriptedPrompter::new()).await;

        assert_eq!(cause, ExitCause::Failure);
        logs_assert(|lines: &[&str]| {
            let first = lines.first().ok_or("nothing was logged")?;
            if !first.contains("ERROR") || !first.contains("Injected git error") {
                return Err(format!("unexpected first line: {}", first));
            }
            match error_lines(lines) {
                1 => Ok(()),
                n => Err(format!("expected one error line, got {}", n)),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn declined_branch_logs_no_errors() {
        let stub = Stub {
            branch: "random-branch-1234567890",
            fail_branch: false,
        };
        let prompter = ScriptedPrompter::new().answer("publish", Answer::Bool(false));

        let cause = release(stub, prompter).await;

        assert_eq!(cause, ExitCause::Failure);
        logs_assert(|lines: &[&str]| match error_lines(lines) {
            0 => Ok(()),
            n => Err(format!("expected no error lines, got {}", n)),
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn successful_release_logs_no_errors() {
        let stub = Stub {
            branch: "master",
            fail_branch: false,
        };
        let prompter = ScriptedPrompter::new().answer("publish", Answer::Bool(true));

        let cause = release(stub, prompter).await;

        assert_eq!(cause, ExitCause::Success);
        logs_assert(|lines: &[&str]| match error_lines(lines) {
            0 => Ok(()),
            n => Err(format!("expected no error lines, got {}", n)),
        });
    }
}
