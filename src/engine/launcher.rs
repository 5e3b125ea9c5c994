use crate::engine::client::{ApiError, SimApi};
use crate::model::{InitResponse, SimEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Debug)]
pub(crate) enum Launch {
    Accepted(InitResponse),
    /// The run was cancelled before the service answered; nothing was emitted for the answer.
    Cancelled,
}

/// Ask the service to begin a run. Emits `LaunchStarted` and then exactly one of
/// `Launched` or `LaunchFailed`, unless `cancel` is set by the time the service
/// answers. The launch is never retried.
pub(crate) async fn launch<A: SimApi>(
    api: &A,
    num_people: u32,
    event_tx: &mpsc::UnboundedSender<SimEvent>,
    cancel: &AtomicBool,
) -> Result<Launch, ApiError> {
    if cancel.load(Ordering::Relaxed) {
        return Ok(Launch::Cancelled);
    }
    let _ = event_tx.send(SimEvent::LaunchStarted { num_people });
    tracing::debug!(num_people, "launching simulation");

    let res = api.init(num_people).await;
    if cancel.load(Ordering::Relaxed) {
        tracing::debug!(num_people, ok = res.is_ok(), "launch answer dropped after cancel");
        return Ok(Launch::Cancelled);
    }

    match res {
        Ok(ack) => {
            tracing::info!(
                num_people,
                accepted = ?ack.num_people,
                ack = ?ack.status,
                "simulation launched"
            );
            let _ = event_tx.send(SimEvent::Launched {
                ack: ack.status.clone(),
            });
            Ok(Launch::Accepted(ack))
        }
        Err(e) => {
            match &e {
                ApiError::Rejected { status, .. } => {
                    tracing::warn!(num_people, status, error = %e, "launch rejected")
                }
                _ => tracing::warn!(num_people, error = %e, "launch failed"),
            }
            let _ = event_tx.send(SimEvent::LaunchFailed {
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedApi;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn success_emits_started_then_launched() {
        let api = ScriptedApi::completing_after(0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let ack = match launch(&api, 4, &tx, &AtomicBool::new(false)).await.unwrap() {
            Launch::Accepted(ack) => ack,
            Launch::Cancelled => panic!("launch was not cancelled"),
        };
        assert_eq!(ack.num_people, Some(4));
        assert_eq!(api.last_num_people.load(Ordering::SeqCst), 4);

        assert_eq!(
            rx.recv().await,
            Some(SimEvent::LaunchStarted { num_people: 4 })
        );
        assert_eq!(
            rx.recv().await,
            Some(SimEvent::Launched {
                ack: Some("Simulation initialized".into())
            })
        );
    }

    #[tokio::test]
    async fn rejection_is_reported_once_without_retry() {
        let api = ScriptedApi::rejecting("Minimum number of people is 1.");
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(launch(&api, 0, &tx, &AtomicBool::new(false)).await.is_err());
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(
            events,
            vec![
                SimEvent::LaunchStarted { num_people: 0 },
                SimEvent::LaunchFailed {
                    message: "Minimum number of people is 1.".into()
                },
            ]
        );
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_arriving_after_cancel_is_dropped() {
        let api = Arc::new(
            ScriptedApi::rejecting("Maximum number of people is 5.")
                .with_init_delay(Duration::from_secs(2)),
        );
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = {
            let api = api.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { launch(api.as_ref(), 7, &tx, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.store(true, Ordering::Relaxed);

        assert!(matches!(task.await.unwrap(), Ok(Launch::Cancelled)));
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events, vec![SimEvent::LaunchStarted { num_people: 7 }]);
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let api = ScriptedApi::completing_after(0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let res = launch(&api, 2, &tx, &AtomicBool::new(true)).await;
        assert!(matches!(res, Ok(Launch::Cancelled)));
        drop(tx);
        assert_eq!(rx.recv().await, None);
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 0);
    }
}
