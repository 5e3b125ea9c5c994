use crate::engine::{EngineControl, HttpSimClient, RunOutcome, SimApi, SimEngine};
use crate::model::{RunConfig, RunSummary, SimEvent};
use crate::view::ViewState;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "simwatch",
    version,
    about = "Launch a remote simulation and follow it until it completes"
)]
pub struct Cli {
    /// Base URL of the simulation service
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Population size for non-interactive runs (pre-filled in the TUI)
    #[arg(long, default_value_t = 5)]
    pub num_people: u32,

    /// Delay between status polls
    #[arg(long, default_value = "500ms")]
    pub poll_interval: humantime::Duration,

    /// Per-request timeout
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,

    /// Run once and print JSON summary (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Run once and print progress as text (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for scripts)
    #[arg(long)]
    pub silent: bool,

    /// Write the final summary as JSON to this path
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Append logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    let interactive = !args.json && !args.text && cfg!(feature = "tui");
    crate::logging::init(&args, interactive)?;

    if args.silent {
        return run_json(args, true).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args, false).await;
    }

    run_text(args).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        base_url: args.base_url.clone(),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("simwatch/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Resolves on the first Ctrl-C. If the handler cannot be installed it never resolves.
async fn ctrl_c_pressed() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        futures::future::pending::<()>().await;
    }
}

/// Launch one run and follow it to the end, passing every event (and the view after
/// applying it) to `on_event`. The run is cancelled when `interrupt` resolves.
async fn drive_run<A: SimApi>(
    api: Arc<A>,
    poll_interval: Duration,
    num_people: u32,
    interrupt: impl std::future::Future<Output = ()>,
    mut on_event: impl FnMut(&SimEvent, &ViewState),
) -> Result<(RunOutcome, ViewState)> {
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<SimEvent>();
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<EngineControl>();

    let engine = SimEngine::new(api, poll_interval);
    let handle = tokio::spawn(async move { engine.run(num_people, evt_tx, ctrl_rx).await });

    let mut view = ViewState::default();
    // Created once so a signal arriving while an event is handled is not lost.
    tokio::pin!(interrupt);
    let mut interrupted = false;
    loop {
        tokio::select! {
            ev = evt_rx.recv() => {
                let Some(ev) = ev else { break };
                view.apply(&ev);
                on_event(&ev, &view);
            }
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                tracing::info!("interrupt received, cancelling run");
                let _ = ctrl_tx.send(EngineControl::Cancel);
            }
        }
    }

    let outcome = handle
        .await
        .context("simulation task failed")?
        .context("simulation run failed")?;
    Ok((outcome, view))
}

fn summarize(args: &Cli, view: &ViewState) -> RunSummary {
    RunSummary {
        base_url: args.base_url.clone(),
        num_people: args.num_people,
        status: view.status.clone(),
        building_text: view.building.clone(),
        polls: view.polls,
        finished_at_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
    }
}

/// Map a finished run onto the process result.
fn outcome_to_result(outcome: &RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Completed { .. } => Ok(()),
        RunOutcome::LaunchFailed { message } => {
            Err(anyhow::anyhow!("simulation launch rejected: {message}"))
        }
        RunOutcome::Cancelled => Err(anyhow::anyhow!("simulation run cancelled")),
    }
}

/// Run once and print a JSON summary. `silent` suppresses all output.
async fn run_json(args: Cli, silent: bool) -> Result<()> {
    let cfg = build_config(&args);
    let api = Arc::new(HttpSimClient::new(&cfg)?);
    let (outcome, view) = drive_run(
        api,
        cfg.poll_interval,
        args.num_people,
        ctrl_c_pressed(),
        |_, _| {},
    )
    .await?;
    outcome_to_result(&outcome)?;

    let summary = summarize(&args, &view);
    handle_exports(&args, &summary)?;

    if !silent {
        let (out_tx, out_handle) = spawn_output_writer();
        let out = serde_json::to_string_pretty(&summary)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
        drop(out_tx);
        let _ = out_handle.await;
    }
    Ok(())
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let api = Arc::new(HttpSimClient::new(&cfg)?);
    let (out_tx, out_handle) = spawn_output_writer();

    let res = follow_as_text(&args, &cfg, api, &out_tx).await;

    drop(out_tx);
    let _ = out_handle.await;
    res
}

async fn follow_as_text<A: SimApi>(
    args: &Cli,
    cfg: &RunConfig,
    api: Arc<A>,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let progress_tx = out_tx.clone();
    let (outcome, view) = drive_run(api, cfg.poll_interval, args.num_people, ctrl_c_pressed(), move |ev, view| {
        let line = match ev {
            SimEvent::LaunchStarted { num_people } => {
                Some(format!("{} ({num_people} people)", view.status))
            }
            SimEvent::Launched { ack } => ack.clone(),
            SimEvent::LaunchFailed { message } => {
                Some(format!("Error: {message}\n{}", view.status))
            }
            SimEvent::Building { complete: true, .. } => Some(view.status.clone()),
            SimEvent::Building { .. } => None,
            SimEvent::PollFailed { message } => Some(format!("Status poll failed: {message}")),
            SimEvent::Info(msg) => Some(msg.clone()),
        };
        if let Some(line) = line {
            let _ = progress_tx.send(OutputLine::Stderr(line));
        }
    })
    .await?;
    outcome_to_result(&outcome)?;

    let summary = summarize(args, &view);
    for line in crate::text_summary::build_text_summary(&summary).lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    if let Some(p) = handle_exports(args, &summary)? {
        let _ = out_tx.send(OutputLine::Stderr(format!("Exported JSON: {}", p.display())));
    }
    Ok(())
}

/// Handle `--export-json` for both text and JSON modes.
fn handle_exports(args: &Cli, summary: &RunSummary) -> Result<Option<std::path::PathBuf>> {
    match args.export_json.as_deref() {
        Some(p) => crate::storage::export_json(p, summary).map(Some),
        None => Ok(None),
    }
}
