mod help;

use crate::cli::{build_config, Cli};
use crate::engine::HttpSimClient;
use crate::model::SimEvent;
use crate::orchestrator::{self, UiCommand};
use crate::view::{parse_population, ViewState};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Longest population input accepted from the keyboard.
const MAX_INPUT_LEN: usize = 9;

#[derive(Default)]
struct UiState {
    input: String,
    view: ViewState,
    info: String,
    show_help: bool,
}

/// What a key press asks the UI loop to do.
#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Send(UiCommand),
    Quit,
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SimEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let cfg = build_config(&args);
    let api = Arc::new(HttpSimClient::new(&cfg)?);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let initial_input = args.num_people.to_string();
    let ui_handle = std::thread::spawn(move || run_threaded(initial_input, event_rx, cmd_tx));

    let res = orchestrator::run_controller(api, cfg.poll_interval, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    initial_input: String,
    mut event_rx: UnboundedReceiver<SimEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        input: initial_input,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, &ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match on_key(&mut state, k.modifiers, k.code) {
                    KeyAction::None => {}
                    KeyAction::Send(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn on_key(state: &mut UiState, modifiers: KeyModifiers, code: KeyCode) -> KeyAction {
    match (modifiers, code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Char('q')) | (_, KeyCode::Esc) => {
            KeyAction::Quit
        }
        (_, KeyCode::Char('?')) => {
            state.show_help = !state.show_help;
            KeyAction::None
        }
        (_, KeyCode::Backspace) => {
            state.input.pop();
            KeyAction::None
        }
        (_, KeyCode::Enter) => match parse_population(&state.input) {
            Some(n) => {
                state.info.clear();
                KeyAction::Send(UiCommand::Start(n))
            }
            None => {
                // Invalid input never reaches the service.
                state.view.reject_input();
                KeyAction::None
            }
        },
        (_, KeyCode::Char(c)) if !c.is_control() && state.input.len() < MAX_INPUT_LEN => {
            state.input.push(c);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn apply_event(state: &mut UiState, ev: &SimEvent) {
    state.view.apply(ev);
    match ev {
        SimEvent::Launched { ack: Some(ack) } => state.info = ack.clone(),
        SimEvent::PollFailed { message } => {
            state.info = format!("Status poll failed: {message}");
        }
        SimEvent::Info(msg) => state.info = msg.clone(),
        _ => {}
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Population input
                Constraint::Length(3), // Status
                Constraint::Length(3), // Error
                Constraint::Min(0),    // Building
                Constraint::Length(1), // Info / key hints
            ]
            .as_ref(),
        )
        .split(area);

    let input = Paragraph::new(Line::from(vec![
        Span::raw(state.input.as_str()),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Number of people"),
    );
    f.render_widget(input, chunks[0]);

    let status_color = if state.view.is_complete() {
        Color::Green
    } else {
        Color::Yellow
    };
    let status = Paragraph::new(Span::styled(
        state.view.status.as_str(),
        Style::default().fg(status_color),
    ))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[1]);

    let error = Paragraph::new(Span::styled(
        state.view.error.as_str(),
        Style::default().fg(Color::Red),
    ))
    .block(Block::default().borders(Borders::ALL).title("Error"));
    f.render_widget(error, chunks[2]);

    if state.show_help {
        help::draw_help(chunks[3], f);
    } else {
        let building = Paragraph::new(
            state
                .view
                .building
                .lines()
                .map(|l| Line::from(l.to_string()))
                .collect::<Vec<_>>(),
        )
        .block(Block::default().borders(Borders::ALL).title("Building"));
        f.render_widget(building, chunks[3]);
    }

    let bottom = if state.info.is_empty() {
        help::footer()
    } else {
        Line::from(Span::styled(
            state.info.as_str(),
            Style::default().fg(Color::Cyan),
        ))
    };
    f.render_widget(Paragraph::new(bottom), chunks[4]);
}
