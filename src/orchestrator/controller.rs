//! Run lifecycle controller.
//!
//! Owns start/restart/quit orchestration and forwards engine events to presentation layers.

use crate::engine::{EngineControl, RunOutcome, SimApi, SimEngine};
use crate::model::SimEvent;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;

/// Commands emitted by UI layers to control the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UiCommand {
    /// Launch a run with this population size.
    Start(u32),
    Quit,
}

/// Internal handle for a running simulation task.
struct RunCtx {
    ctrl_tx: UnboundedSender<EngineControl>,
    handle: Option<tokio::task::JoinHandle<Result<RunOutcome>>>,
}

/// Spawn a new run and return its control handle.
fn start_run<A: SimApi>(
    api: &Arc<A>,
    poll_interval: Duration,
    num_people: u32,
    event_tx: UnboundedSender<SimEvent>,
) -> RunCtx {
    let (ctrl_tx, ctrl_rx) = tokio::sync::mpsc::unbounded_channel::<EngineControl>();
    let engine = SimEngine::new(api.clone(), poll_interval);
    let handle = tokio::spawn(async move { engine.run(num_people, event_tx, ctrl_rx).await });
    RunCtx {
        ctrl_tx,
        handle: Some(handle),
    }
}

/// Orchestrate runs based on UI commands. At most one run is active; a `Start`
/// during a run cancels it and launches the new one once the old one has stopped.
pub(crate) async fn run_controller<A: SimApi>(
    api: Arc<A>,
    poll_interval: Duration,
    event_tx: UnboundedSender<SimEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut run_ctx: Option<RunCtx> = None;
    let mut restart_pending: Option<u32> = None;
    let mut quit_pending = false;
    // Cancel watchdog: a poll may be in flight when a cancel arrives.
    let mut cancel_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    let res = loop {
        tokio::select! {
            // Once quitting, stop reading so a closed channel doesn't spin the loop.
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::Start(num_people)) => {
                        if let Some(ctx) = &run_ctx {
                            tracing::debug!(num_people, "restart requested while a run is active");
                            restart_pending = Some(num_people);
                            let _ = ctx.ctrl_tx.send(EngineControl::Cancel);
                            cancel_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(3));
                        } else {
                            run_ctx = Some(start_run(&api, poll_interval, num_people, event_tx.clone()));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        restart_pending = None;
                        if let Some(ctx) = &run_ctx {
                            let _ = ctx.ctrl_tx.send(EngineControl::Cancel);
                            cancel_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(3));
                        } else {
                            break Ok(());
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut run_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    if let Some(ctx) = &mut run_ctx {
                        ctx.handle.take();
                    }
                    match join_res {
                        Ok(Ok(outcome)) => {
                            tracing::debug!(?outcome, "run finished");
                        }
                        Ok(Err(e)) => {
                            let _ = event_tx.send(SimEvent::Info(format!("Run failed: {e:#}")));
                        }
                        Err(e) => {
                            let _ = event_tx.send(SimEvent::Info(format!("Run join failed: {e}")));
                        }
                    }
                    run_ctx = None;
                    cancel_deadline = None;
                    if quit_pending {
                        break Ok(());
                    }
                    if let Some(num_people) = restart_pending.take() {
                        run_ctx = Some(start_run(&api, poll_interval, num_people, event_tx.clone()));
                    }
                }
            }
            _ = watchdog.tick() => {
                if let Some(deadline) = cancel_deadline {
                    if tokio::time::Instant::now() >= deadline && run_ctx.is_some() {
                        let _ = event_tx.send(SimEvent::Info("Still cancelling…".into()));
                        cancel_deadline = None;
                    }
                }
            }
        }
    };

    res
}
