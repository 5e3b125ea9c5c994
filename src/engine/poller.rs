use crate::engine::client::{ApiError, SimApi};
use crate::model::SimEvent;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Parameters for running the status poll loop.
pub(crate) struct PollParams<'a, A> {
    pub api: &'a A,
    pub interval: Duration,
    pub event_tx: &'a mpsc::UnboundedSender<SimEvent>,
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Completed { polls: u64 },
    Cancelled { polls: u64 },
}

/// Poll `/update` until the service reports completion or the run is cancelled.
/// One request is in flight at a time; the next one is issued `interval` after
/// the previous response.
pub(crate) async fn poll_until_complete<A: SimApi>(
    params: PollParams<'_, A>,
) -> Result<PollOutcome, ApiError> {
    let PollParams {
        api,
        interval,
        event_tx,
        cancel,
    } = params;
    let mut polls = 0u64;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(PollOutcome::Cancelled { polls });
        }

        let update = match api.update().await {
            Ok(u) => u,
            Err(e) => {
                if cancel.load(Ordering::Relaxed) {
                    return Ok(PollOutcome::Cancelled { polls });
                }
                tracing::warn!(polls, error = %e, "status poll failed; polling stopped");
                let _ = event_tx.send(SimEvent::PollFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        // A response that lands after cancellation is dropped.
        if cancel.load(Ordering::Relaxed) {
            return Ok(PollOutcome::Cancelled { polls });
        }

        polls += 1;
        let complete = update.simulation_complete;
        tracing::trace!(polls, complete, "status received");
        let _ = event_tx.send(SimEvent::Building {
            building_text: update.building_text,
            complete,
        });

        if complete {
            tracing::info!(polls, "simulation complete");
            return Ok(PollOutcome::Completed { polls });
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedApi;

    fn params<'a>(
        api: &'a ScriptedApi,
        tx: &'a mpsc::UnboundedSender<SimEvent>,
        cancel: Arc<AtomicBool>,
    ) -> PollParams<'a, ScriptedApi> {
        PollParams {
            api,
            interval: Duration::from_millis(500),
            event_tx: tx,
            cancel,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_complete_at_fixed_interval() {
        let api = ScriptedApi::completing_after(3);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();

        let outcome = poll_until_complete(params(&api, &tx, Arc::new(AtomicBool::new(false))))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Completed { polls: 4 });
        // Three sleeps between four requests.
        assert_eq!(start.elapsed(), Duration::from_millis(1500));

        drop(tx);
        let mut frames = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let SimEvent::Building {
                building_text,
                complete,
            } = ev
            {
                frames.push((building_text, complete));
            }
        }
        assert_eq!(frames.len(), 4);
        assert!(frames[..3].iter().all(|(_, c)| !c));
        assert_eq!(frames[3], ("done".to_string(), true));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_failure() {
        let api = ScriptedApi::failing_after(2);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let res = poll_until_complete(params(&api, &tx, Arc::new(AtomicBool::new(false)))).await;
        assert!(res.is_err());
        assert_eq!(
            api.update_calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );

        drop(tx);
        let mut last = None;
        while let Some(ev) = rx.recv().await {
            last = Some(ev);
        }
        assert!(matches!(last, Some(SimEvent::PollFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_loop_without_further_events() {
        let api = Arc::new(ScriptedApi::endless());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let task = {
            let api = api.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_until_complete(PollParams {
                    api: api.as_ref(),
                    interval: Duration::from_millis(500),
                    event_tx: &tx,
                    cancel,
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1200)).await;
        cancel.store(true, Ordering::Relaxed);
        let outcome = task.await.unwrap().unwrap();
        let polls = match outcome {
            PollOutcome::Cancelled { polls } => polls,
            other => panic!("expected cancellation, got {other:?}"),
        };

        let mut seen = 0;
        while let Ok(ev) = rx.try_recv() {
            assert!(matches!(ev, SimEvent::Building { .. }));
            seen += 1;
        }
        assert_eq!(seen, polls);
    }
}
