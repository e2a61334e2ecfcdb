//! Runner lifecycle integration tests
//!
//! - Flags before start, while alive, after completion
//! - stop/abort before start, during main, after completion
//! - Hook order and skipping on initialize failure or stop
//! - Errors, panics and cleanup failures
//! - join/start misuse
//! - Dropping a runner with a pending task

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use runway_core::{Context, Exit, Phase, RunError, Runnable, Runner, async_trait};

#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<&'static str>>>);

impl Calls {
    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    fn snapshot(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Return,
    Fail,
    Sleep,
    Panic,
    FailInit,
    StopInInit,
    AbortInInit,
    FailCleanup,
}

struct Scripted {
    mode: Mode,
    calls: Calls,
}

#[async_trait]
impl Runnable for Scripted {
    type Output = &'static str;

    async fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
        self.calls.push("initialize");
        match self.mode {
            Mode::FailInit => anyhow::bail!("initialize failed"),
            Mode::StopInInit => ctx.stop(),
            Mode::AbortInInit => ctx.abort(),
            _ => {}
        }
        Ok(())
    }

    async fn main(&mut self, _ctx: &Context) -> anyhow::Result<&'static str> {
        self.calls.push("main");
        match self.mode {
            Mode::Fail => anyhow::bail!("main failed"),
            Mode::Panic => panic!("main panicked"),
            Mode::Sleep => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("slept")
            }
            _ => Ok("done"),
        }
    }

    async fn cleanup(&mut self, _ctx: &Context, exit: Exit<'_>) -> anyhow::Result<()> {
        self.calls.push(match exit {
            Exit::Success => "cleanup:success",
            Exit::Cancelled => "cleanup:cancelled",
            Exit::Failed(_) => "cleanup:failed",
        });
        if matches!(self.mode, Mode::FailCleanup) {
            anyhow::bail!("cleanup failed");
        }
        Ok(())
    }
}

fn scripted(mode: Mode) -> (Runner<Scripted>, Calls) {
    let calls = Calls::default();
    let runner = Runner::new(Scripted {
        mode,
        calls: calls.clone(),
    });
    (runner, calls)
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), fut)
        .await
        .expect("test timed out")
}

async fn wait_for_phase(runner: &Runner<Scripted>, phase: Phase) {
    within(async {
        while runner.phase() != phase {
            tokio::task::yield_now().await;
        }
    })
    .await;
}

fn assert_not_running(runner: &Runner<Scripted>) {
    assert!(!runner.is_alive());
    assert!(!runner.is_done());
}

fn assert_alive(runner: &Runner<Scripted>) {
    assert!(runner.is_alive());
    assert!(!runner.is_done());
}

fn assert_done(runner: &Runner<Scripted>) {
    assert!(!runner.is_alive());
    assert!(runner.is_done());
    assert!(runner.should_stop());
    assert!(!runner.is_aborted());
}

fn assert_aborted(runner: &Runner<Scripted>) {
    assert!(!runner.is_alive());
    assert!(runner.is_done());
    assert!(runner.should_stop());
    assert!(runner.is_aborted());
}

// ---------------------------------------------------------------------------
// Normal completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completion_runs_every_hook_in_order() {
    let (mut runner, calls) = scripted(Mode::Return);

    assert_not_running(&runner);
    runner.start().unwrap();
    assert_alive(&runner);

    assert_eq!(within(runner.join()).await.unwrap(), "done");
    assert_done(&runner);
    assert!(runner.is_initialized());
    assert_eq!(runner.phase(), Phase::Succeeded);
    assert_eq!(
        calls.snapshot(),
        vec!["initialize", "main", "cleanup:success"]
    );
}

#[tokio::test]
async fn default_name_is_type_name() {
    let (runner, _) = scripted(Mode::Return);
    assert_eq!(runner.name(), "Scripted");

    let named = Runner::named(
        Scripted {
            mode: Mode::Return,
            calls: Calls::default(),
        },
        "custom",
    );
    assert_eq!(named.name(), "custom");
    assert_eq!(named.context().name(), "custom");
}

// ---------------------------------------------------------------------------
// stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_before_start_cancels_without_hooks() {
    let (mut runner, calls) = scripted(Mode::Return);

    runner.stop();
    assert_not_running(&runner);
    runner.start().unwrap();
    assert_alive(&runner);
    assert!(runner.should_stop());

    assert!(matches!(within(runner.join()).await, Err(RunError::Cancelled)));
    assert_done(&runner);
    assert_eq!(runner.phase(), Phase::Cancelled);
    assert!(calls.snapshot().is_empty());
}

#[tokio::test]
async fn stop_during_main_cancels_and_cleans_up() {
    let (mut runner, calls) = scripted(Mode::Sleep);

    runner.start().unwrap();
    wait_for_phase(&runner, Phase::Running).await;

    runner.stop();
    assert_alive(&runner);
    assert!(runner.should_stop());

    assert!(matches!(within(runner.join()).await, Err(RunError::Cancelled)));
    assert_done(&runner);
    assert_eq!(
        calls.snapshot(),
        vec!["initialize", "main", "cleanup:cancelled"]
    );
}

#[tokio::test]
async fn stop_after_completion_changes_nothing() {
    let (mut runner, _) = scripted(Mode::Return);

    runner.start().unwrap();
    within(runner.join()).await.unwrap();
    assert_done(&runner);

    runner.stop();
    assert_done(&runner);
    assert_eq!(runner.phase(), Phase::Succeeded);
}

#[tokio::test]
async fn stop_through_context_is_the_same_stop() {
    let (mut runner, _) = scripted(Mode::Sleep);

    runner.start().unwrap();
    wait_for_phase(&runner, Phase::Running).await;
    runner.context().stop();

    assert!(matches!(within(runner.join()).await, Err(RunError::Cancelled)));
    assert_done(&runner);
}

#[tokio::test]
async fn stop_from_initialize_skips_main_and_cleanup() {
    let (mut runner, calls) = scripted(Mode::StopInInit);

    runner.start().unwrap();
    assert!(matches!(within(runner.join()).await, Err(RunError::Cancelled)));

    assert_done(&runner);
    assert!(!runner.is_initialized());
    assert_eq!(calls.snapshot(), vec!["initialize"]);
}

// ---------------------------------------------------------------------------
// abort
// ---------------------------------------------------------------------------

#[tokio::test]
async fn abort_before_start() {
    let (runner, _) = scripted(Mode::Return);

    assert_not_running(&runner);
    runner.abort();
    assert_not_running(&runner);
    assert!(runner.is_aborted());
    assert!(runner.should_stop());
}

#[tokio::test]
async fn abort_during_main() {
    let (mut runner, calls) = scripted(Mode::Sleep);

    runner.start().unwrap();
    wait_for_phase(&runner, Phase::Running).await;
    runner.abort();
    assert!(runner.is_aborted());

    assert!(matches!(within(runner.join()).await, Err(RunError::Cancelled)));
    assert_aborted(&runner);
    assert_eq!(
        calls.snapshot(),
        vec!["initialize", "main", "cleanup:cancelled"]
    );
}

#[tokio::test]
async fn abort_after_completion_sets_flag() {
    let (mut runner, _) = scripted(Mode::Return);

    runner.start().unwrap();
    within(runner.join()).await.unwrap();
    runner.abort();

    assert_aborted(&runner);
    assert_eq!(runner.phase(), Phase::Succeeded);
}

#[tokio::test]
async fn abort_from_initialize_skips_main_and_cleanup() {
    let (mut runner, calls) = scripted(Mode::AbortInInit);

    runner.start().unwrap();
    assert_alive(&runner);
    assert!(matches!(within(runner.join()).await, Err(RunError::Cancelled)));

    assert_aborted(&runner);
    assert!(!runner.is_initialized());
    assert_eq!(calls.snapshot(), vec!["initialize"]);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_main_aborts_and_still_cleans_up() {
    let (mut runner, calls) = scripted(Mode::Fail);

    runner.start().unwrap();
    match within(runner.join()).await {
        Err(RunError::Failed(error)) => assert_eq!(error.to_string(), "main failed"),
        other => panic!("unexpected result: {other:?}"),
    }

    assert_aborted(&runner);
    assert_eq!(runner.phase(), Phase::Failed);
    assert_eq!(
        calls.snapshot(),
        vec!["initialize", "main", "cleanup:failed"]
    );
}

#[tokio::test]
async fn failing_initialize_skips_main_and_cleanup() {
    let (mut runner, calls) = scripted(Mode::FailInit);

    runner.start().unwrap();
    assert!(matches!(within(runner.join()).await, Err(RunError::Failed(_))));

    assert_aborted(&runner);
    assert!(!runner.is_initialized());
    assert_eq!(calls.snapshot(), vec!["initialize"]);
}

#[tokio::test]
async fn panicking_main_is_reported_and_cleaned_up() {
    let (mut runner, calls) = scripted(Mode::Panic);

    runner.start().unwrap();
    match within(runner.join()).await {
        Err(RunError::Panicked { name, message }) => {
            assert_eq!(name, "Scripted");
            assert_eq!(message, "main panicked");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_aborted(&runner);
    assert_eq!(
        calls.snapshot(),
        vec!["initialize", "main", "cleanup:failed"]
    );
}

#[tokio::test]
async fn cleanup_error_replaces_success() {
    let (mut runner, _) = scripted(Mode::FailCleanup);

    runner.start().unwrap();
    match within(runner.join()).await {
        Err(RunError::Failed(error)) => assert_eq!(error.to_string(), "cleanup failed"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_aborted(&runner);
}

// ---------------------------------------------------------------------------
// Misuse
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_cannot_be_called_twice() {
    let (mut runner, _) = scripted(Mode::Return);

    runner.start().unwrap();
    assert!(matches!(
        runner.start(),
        Err(RunError::AlreadyStarted { .. })
    ));

    assert_alive(&runner);
    within(runner.join()).await.unwrap();
    assert_done(&runner);
}

#[tokio::test]
async fn join_requires_a_started_runner() {
    let (mut runner, _) = scripted(Mode::Return);

    assert_not_running(&runner);
    assert!(matches!(
        runner.join().await,
        Err(RunError::NotRunning { .. })
    ));
}

#[tokio::test]
async fn result_can_be_joined_once() {
    let (mut runner, _) = scripted(Mode::Return);

    runner.start().unwrap();
    within(runner.join()).await.unwrap();
    assert!(matches!(
        runner.join().await,
        Err(RunError::AlreadyJoined { .. })
    ));
}

#[test]
fn start_outside_runtime_fails() {
    let (mut runner, _) = scripted(Mode::Return);

    assert!(matches!(runner.start(), Err(RunError::NoRuntime { .. })));
    assert!(!runner.is_started());
}

// ---------------------------------------------------------------------------
// Scoped use
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_treats_cancellation_as_clean_exit() {
    let (mut runner, calls) = scripted(Mode::Sleep);

    runner.start().unwrap();
    assert_alive(&runner);
    assert_eq!(within(runner.shutdown()).await.unwrap(), None);

    assert_done(&runner);
    assert!(!calls.snapshot().contains(&"cleanup:failed"));
}

#[tokio::test]
async fn shutdown_of_finished_runner_returns_output() {
    let (mut runner, _) = scripted(Mode::Return);

    runner.start().unwrap();
    wait_for_phase(&runner, Phase::Succeeded).await;
    assert_eq!(within(runner.shutdown()).await.unwrap(), Some("done"));
}

// ---------------------------------------------------------------------------
// Drop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropping_a_running_runner_stops_it() {
    let (mut runner, calls) = scripted(Mode::Sleep);
    runner.start().unwrap();
    wait_for_phase(&runner, Phase::Running).await;

    let ctx = runner.context();
    drop(runner);
    within(async {
        while !ctx.phase().is_terminal() {
            tokio::task::yield_now().await;
        }
    })
    .await;

    assert_eq!(ctx.phase(), Phase::Cancelled);
    assert!(ctx.should_stop());
    assert_eq!(
        calls.snapshot(),
        vec!["initialize", "main", "cleanup:cancelled"]
    );
}
