use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status shown before any run and after a failed launch.
pub const STATUS_WAITING: &str = "Waiting for input...";
/// Status shown once a launch has been issued.
pub const STATUS_IN_PROGRESS: &str = "Simulation in progress...";
/// Status shown when the service reports completion.
pub const STATUS_COMPLETE: &str = "Simulation Complete!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Body returned by `POST /init` on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub num_people: Option<u32>,
}

/// Body returned by `POST /init` when the service rejects the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Body returned by `GET /update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub building_text: String,
    pub simulation_complete: bool,
}

/// Events emitted by the engine and consumed by presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A launch request is about to be sent.
    LaunchStarted { num_people: u32 },
    /// The service accepted the launch; polling begins.
    Launched { ack: Option<String> },
    /// The launch failed; `message` is what the user should see.
    LaunchFailed { message: String },
    /// A status response arrived.
    Building {
        building_text: String,
        complete: bool,
    },
    /// The poll loop stopped on a request failure.
    PollFailed { message: String },
    /// Non-fatal message for the info line.
    Info(String),
}

/// Final state of a run, printed in `--json` mode and written by `--export-json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub base_url: String,
    pub num_people: u32,
    pub status: String,
    pub building_text: String,
    pub polls: u64,
    #[serde(default)]
    pub finished_at_utc: String,
}
