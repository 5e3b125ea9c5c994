//! In-memory `SimApi` with scripted responses.

use super::client::{ApiError, SimApi};
use crate::model::{InitResponse, UpdateResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) struct ScriptedApi {
    /// `None` accepts every launch; `Some(msg)` rejects with `msg`.
    reject_with: Option<String>,
    /// How long `init` takes to answer.
    init_delay: Duration,
    frames: Mutex<VecDeque<UpdateResponse>>,
    /// Returned once the scripted frames run out.
    fallback: Option<UpdateResponse>,
    pub init_calls: AtomicU32,
    pub update_calls: AtomicU32,
    pub last_num_people: AtomicU32,
}

impl ScriptedApi {
    /// Serve `n` in-progress frames followed by one completed frame.
    pub fn completing_after(n: usize) -> Self {
        let mut frames: VecDeque<UpdateResponse> = (0..n)
            .map(|i| UpdateResponse {
                building_text: format!("frame {i}"),
                simulation_complete: false,
            })
            .collect();
        frames.push_back(UpdateResponse {
            building_text: "done".into(),
            simulation_complete: true,
        });
        Self::with_frames(frames, None)
    }

    /// Never completes.
    pub fn endless() -> Self {
        Self::with_frames(
            VecDeque::new(),
            Some(UpdateResponse {
                building_text: "running".into(),
                simulation_complete: false,
            }),
        )
    }

    /// Serve `n` in-progress frames, then fail every poll.
    pub fn failing_after(n: usize) -> Self {
        let frames = (0..n)
            .map(|i| UpdateResponse {
                building_text: format!("frame {i}"),
                simulation_complete: false,
            })
            .collect();
        Self::with_frames(frames, None)
    }

    pub fn rejecting(message: &str) -> Self {
        let mut api = Self::completing_after(0);
        api.reject_with = Some(message.to_string());
        api
    }

    /// Like `self`, but `init` answers only after `delay`.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    fn with_frames(frames: VecDeque<UpdateResponse>, fallback: Option<UpdateResponse>) -> Self {
        Self {
            reject_with: None,
            init_delay: Duration::ZERO,
            frames: Mutex::new(frames),
            fallback,
            init_calls: AtomicU32::new(0),
            update_calls: AtomicU32::new(0),
            last_num_people: AtomicU32::new(0),
        }
    }
}

impl SimApi for ScriptedApi {
    async fn init(&self, num_people: u32) -> Result<InitResponse, ApiError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.last_num_people.store(num_people, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        match &self.reject_with {
            Some(message) => Err(ApiError::Rejected {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(InitResponse {
                status: Some("Simulation initialized".into()),
                num_people: Some(num_people),
            }),
        }
    }

    async fn update(&self) -> Result<UpdateResponse, ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.frames.lock().expect("frames lock poisoned").pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(frame) => Ok(frame),
            None => Err(ApiError::Rejected {
                status: 500,
                message: "Server returned 500 Internal Server Error".into(),
            }),
        }
    }
}
