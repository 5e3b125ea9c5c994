mod client;
mod launcher;
mod poller;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpSimClient, SimApi};

use crate::model::SimEvent;
use anyhow::{Context, Result};
use launcher::Launch;
use poller::{PollOutcome, PollParams};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum EngineControl {
    /// Stop the run; no further view updates are emitted, even for a launch in flight.
    Cancel,
}

/// How a single run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { polls: u64 },
    LaunchFailed { message: String },
    Cancelled,
}

/// One launch followed by the poll loop.
pub struct SimEngine<A> {
    api: Arc<A>,
    poll_interval: Duration,
}

impl<A: SimApi> SimEngine<A> {
    pub fn new(api: Arc<A>, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    pub async fn run(
        self,
        num_people: u32,
        event_tx: mpsc::UnboundedSender<SimEvent>,
        mut control_rx: mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<RunOutcome> {
        let cancel = Arc::new(AtomicBool::new(false));

        // Control listener.
        let cancel2 = cancel.clone();
        let control_handle = tokio::spawn(async move {
            while let Some(msg) = control_rx.recv().await {
                match msg {
                    EngineControl::Cancel => {
                        cancel2.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        let res = self.drive(num_people, &event_tx, cancel).await;

        // Dropping the JoinHandle would leave the listener parked on recv().
        control_handle.abort();
        res
    }

    async fn drive(
        &self,
        num_people: u32,
        event_tx: &mpsc::UnboundedSender<SimEvent>,
        cancel: Arc<AtomicBool>,
    ) -> Result<RunOutcome> {
        match launcher::launch(self.api.as_ref(), num_people, event_tx, &cancel).await {
            Ok(Launch::Accepted(_)) => {}
            Ok(Launch::Cancelled) => {
                tracing::debug!(num_people, "run cancelled during launch");
                return Ok(RunOutcome::Cancelled);
            }
            Err(e) => {
                return Ok(RunOutcome::LaunchFailed {
                    message: e.to_string(),
                })
            }
        }

        let outcome = poller::poll_until_complete(PollParams {
            api: self.api.as_ref(),
            interval: self.poll_interval,
            event_tx,
            cancel,
        })
        .await
        .context("status polling failed")?;

        Ok(match outcome {
            PollOutcome::Completed { polls } => RunOutcome::Completed { polls },
            PollOutcome::Cancelled { polls } => {
                tracing::debug!(polls, "run cancelled");
                RunOutcome::Cancelled
            }
        })
    }
}
