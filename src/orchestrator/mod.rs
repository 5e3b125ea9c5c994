//! Application-level orchestration.
//!
//! This module owns run lifecycle control (start/restart/quit). The TUI calls into it
//! so that presentation stays separate from the network work.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
