//! Process lifecycle: runs one command, then shuts down exactly once.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Why the process is exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    Success,
    /// The command failed or the operator declined
    Failure,
    /// Ctrl-C
    Interrupt,
    /// The command panicked
    Fault,
}

impl ExitCause {
    pub fn code(self) -> i32 {
        match self {
            ExitCause::Success => 0,
            ExitCause::Failure => 1,
            ExitCause::Interrupt => 2,
            ExitCause::Fault => 99,
        }
    }
}

type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Hook = Box<dyn FnOnce(ExitCause) -> ShutdownFuture + Send>;
type InterruptHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    fired: AtomicBool,
    hooks: Mutex<Vec<Hook>>,
    interrupt_hooks: Mutex<Vec<InterruptHook>>,
}

/// Shutdown callbacks for the current invocation.
#[derive(Clone, Default)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback to run at shutdown, in registration order.
    pub fn on_shutdown<F, Fut>(&self, hook: F)
    where
        F: FnOnce(ExitCause) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: Hook = Box::new(move |cause| -> ShutdownFuture { Box::pin(hook(cause)) });
        self.lock().push(hook);
    }

    /// Register a callback to run on Ctrl-C, before the command is cancelled.
    pub fn on_interrupt<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .interrupt_hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(hook));
    }

    /// Run every callback for `cause`.
    ///
    /// Only the first call does anything; it returns `true`.
    pub async fn shutdown(&self, cause: ExitCause) -> bool {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        tracing::debug!("Shutting down ({:?})", cause);

        let hooks = std::mem::take(&mut *self.lock());
        for hook in hooks {
            hook(cause).await;
        }

        true
    }

    /// Run `command` to completion or until Ctrl-C, shut down, and return the
    /// exit code. `on_error` reports a failed command and picks its cause.
    pub async fn run<F, R>(&self, command: F, on_error: R) -> i32
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
        R: FnOnce(anyhow::Error) -> ExitCause,
    {
        self.run_until(command, on_error, async {
            // If the handler cannot be installed, only the command can end the run.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    async fn run_until<F, R, I>(&self, command: F, on_error: R, interrupt: I) -> i32
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
        R: FnOnce(anyhow::Error) -> ExitCause,
        I: Future<Output = ()>,
    {
        let mut task = tokio::spawn(command);

        let joined = tokio::select! {
            joined = &mut task => Some(joined),
            _ = interrupt => None,
        };

        let cause = match joined {
            Some(Ok(Ok(()))) => ExitCause::Success,
            Some(Ok(Err(e))) => on_error(e),
            Some(Err(e)) if e.is_panic() => {
                tracing::error!("Unexpected fault: {}", panic_message(e.into_panic()));
                ExitCause::Fault
            }
            Some(Err(e)) => {
                tracing::error!("Unexpected fault: {}", e);
                ExitCause::Fault
            }
            None => {
                tracing::warn!("Interrupted");
                let hooks = std::mem::take(
                    &mut *self
                        .inner
                        .interrupt_hooks
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()),
                );
                for hook in hooks {
                    hook();
                }

                // The command stops at its next await; shutdown hooks must not race it.
                task.abort();
                let _ = task.await;
                ExitCause::Interrupt
            }
        };

        self.shutdown(cause).await;

        cause.code()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Hook>> {
        self.inner
            .hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn explode() -> anyhow::Result<()> {
        panic!("unexpected")
    }

    fn counting(lifecycle: &Lifecycle) -> (Arc<AtomicUsize>, Arc<Mutex<Vec<ExitCause>>>) {
        let count = Arc::new(AtomicUsize::new(0));
        let causes = Arc::new(Mutex::new(Vec::new()));
        let (c, seen) = (count.clone(), causes.clone());
        lifecycle.on_shutdown(move |cause| async move {
            c.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(cause);
        });
        (count, causes)
    }

    #[tokio::test]
    async fn dispatches_hooks_exactly_once() {
        let lifecycle = Lifecycle::new();
        let (count, causes) = counting(&lifecycle);

        assert!(lifecycle.shutdown(ExitCause::Interrupt).await);
        assert!(!lifecycle.shutdown(ExitCause::Success).await);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*causes.lock().unwrap(), vec![ExitCause::Interrupt]);
    }

    #[tokio::test]
    async fn runs_hooks_in_registration_order() {
        let lifecycle = Lifecycle::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["children", "scratch"] {
            let order = order.clone();
            lifecycle.on_shutdown(move |_| async move {
                order.lock().unwrap().push(name);
            });
        }

        lifecycle.shutdown(ExitCause::Success).await;

        assert_eq!(*order.lock().unwrap(), vec!["children", "scratch"]);
    }

    #[tokio::test]
    async fn success_exits_zero() {
        let lifecycle = Lifecycle::new();
        let (count, _) = counting(&lifecycle);

        let code = lifecycle
            .run_until(async { Ok::<(), anyhow::Error>(()) }, |_| ExitCause::Failure, std::future::pending())
            .await;

        assert_eq!(code, 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_uses_reported_cause() {
        let lifecycle = Lifecycle::new();
        let (_, causes) = counting(&lifecycle);

        let code = lifecycle
            .run_until(
                async { Err::<(), _>(anyhow::anyhow!("boom")) },
                |e| {
                    assert_eq!(e.to_string(), "boom");
                    ExitCause::Failure
                },
                std::future::pending(),
            )
            .await;

        assert_eq!(code, 1);
        assert_eq!(*causes.lock().unwrap(), vec![ExitCause::Failure]);
    }

    #[tokio::test]
    async fn panic_exits_99() {
        let lifecycle = Lifecycle::new();
        let (count, _) = counting(&lifecycle);

        let code = lifecycle
            .run_until(
                async { explode() },
                |_| ExitCause::Failure,
                std::future::pending(),
            )
            .await;

        assert_eq!(code, 99);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interrupt_exits_2_and_stops_command() {
        let lifecycle = Lifecycle::new();
        let (_, causes) = counting(&lifecycle);

        let code = lifecycle
            .run_until(
                async {
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                    Ok::<(), anyhow::Error>(())
                },
                |_| ExitCause::Failure,
                async {},
            )
            .await;

        assert_eq!(code, 2);
        assert_eq!(*causes.lock().unwrap(), vec![ExitCause::Interrupt]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn interrupt_waits_for_command_before_teardown() {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("gh-pages");
        let lifecycle = Lifecycle::new();

        let teardown = staging.clone();
        lifecycle.on_shutdown(move |_| async move {
            let _ = std::fs::remove_dir_all(&teardown);
        });

        let (interrupted, interrupt) = tokio::sync::oneshot::channel::<()>();
        let working = staging.clone();
        let code = lifecycle
            .run_until(
                async move {
                    std::fs::create_dir_all(&working)?;
                    let _ = interrupted.send(());
                    // Synchronous copy still in progress when Ctrl-C lands.
                    std::thread::sleep(std::time::Duration::from_millis(200));
                    std::fs::create_dir_all(working.join("copied"))?;
                    tokio::task::yield_now().await;
                    std::fs::create_dir_all(working.join("after-cancel"))?;
                    Ok::<(), anyhow::Error>(())
                },
                |_| ExitCause::Failure,
                async move {
                    let _ = interrupt.await;
                },
            )
            .await;

        assert_eq!(code, 2);
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn interrupt_hooks_run_before_shutdown_hooks() {
        let lifecycle = Lifecycle::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (on_interrupt, on_shutdown) = (order.clone(), order.clone());
        lifecycle.on_interrupt(move || on_interrupt.lock().unwrap().push("hang up"));
        lifecycle.on_shutdown(move |_| async move {
            on_shutdown.lock().unwrap().push("teardown");
        });

        let code = lifecycle
            .run_until(std::future::pending::<anyhow::Result<()>>(), |_| ExitCause::Failure, async {})
            .await;

        assert_eq!(code, 2);
        assert_eq!(*order.lock().unwrap(), vec!["hang up", "teardown"]);
    }

    #[tokio::test]
    async fn interrupt_hooks_skip_normal_exit() {
        let lifecycle = Lifecycle::new();
        let hung_up = Arc::new(AtomicBool::new(false));
        let flag = hung_up.clone();
        lifecycle.on_interrupt(move || flag.store(true, Ordering::SeqCst));

        let code = lifecycle
            .run_until(async { Ok::<(), anyhow::Error>(()) }, |_| ExitCause::Failure, std::future::pending())
            .await;

        assert_eq!(code, 0);
        assert!(!hung_up.load(Ordering::SeqCst));
    }
}
