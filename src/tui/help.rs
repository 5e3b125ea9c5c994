use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn keybind(key: &'static str, pad: usize, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        keybind("0-9", 9, "Edit population size"),
        keybind("Backspace", 3, "Delete last digit"),
        keybind("Enter", 7, "Start simulation (restarts a running one)"),
        keybind("?", 11, "Toggle this help"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Esc", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        Line::from(""),
        Line::from("The status is polled every poll interval until the service reports"),
        Line::from("completion. Launch errors from the service are shown verbatim."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}

/// One-line key hint shown under the dashboard.
pub fn footer() -> Line<'static> {
    Line::from(vec![
        Span::styled("Enter", Style::default().fg(Color::Magenta)),
        Span::raw(" start  "),
        Span::styled("?", Style::default().fg(Color::Magenta)),
        Span::raw(" help  "),
        Span::styled("q", Style::default().fg(Color::Magenta)),
        Span::raw(" quit"),
    ])
}
