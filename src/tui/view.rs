use crate::shared::{DisplayState, LayerView};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const KEY_LABELS: [&str; 10] = ["A", "S", "D", "F", "G", "H", "J", "K", "L", ";"];

const HELP: &str = "+ add  i instrument  tab next  x remove  m mute  o solo  [ ] vol  { } master  \
                    r rec  p pause  c clear  space take  enter play  v beautify  u upgrade  e export  esc quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status bar
            Constraint::Min(6),    // layers
            Constraint::Length(3), // keyboard
            Constraint::Length(3), // help
        ])
        .split(area);

    draw_status(frame, sections[0], state, blink_on);
    draw_layers(frame, sections[1], state);
    draw_keys(frame, sections[2], state);
    frame.render_widget(
        Paragraph::new(HELP)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL)),
        sections[3],
    );
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let rec_style = match state.recorder {
        "REC" if blink_on => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        "REC" => Style::default().fg(Color::DarkGray),
        "PAUSED" => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    };
    let lock = if state.highlighted_locked { " (locked)" } else { "" };
    let line = Line::from(vec![
        Span::styled(format!(" {} ", state.licence), Style::default().fg(Color::Cyan)),
        Span::raw(format!(" master {:>3}  ", state.master_volume)),
        Span::styled(state.recorder, rec_style),
        Span::raw(if state.has_recording { " [take]" } else { "" }),
        Span::raw(if state.beautify { "  beautify" } else { "" }),
        Span::raw(format!("  next: {}{}  ", state.highlighted_instrument, lock)),
        Span::styled(state.status.clone(), Style::default().fg(Color::Magenta)),
    ]);
    let block = Block::default().borders(Borders::ALL).title(" WindHarmony ");
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn layer_line(layer: &LayerView) -> Line<'static> {
    let marker = if layer.selected { ">" } else { " " };
    let flags = format!(
        "{}{}{}{}",
        if layer.muted { "M" } else { "-" },
        if layer.solo { "S" } else { "-" },
        if layer.locked { "L" } else { "-" },
        if layer.recording { "R" } else { "-" },
    );
    let style = if !layer.audible || layer.locked {
        Style::default().fg(Color::DarkGray)
    } else if layer.selected {
        Style::default().fg(Color::LightMagenta)
    } else {
        Style::default()
    };
    Line::styled(
        format!(
            "{marker} {:<20} vol {:>3}  {flags}  {} notes",
            layer.instrument_name, layer.volume, layer.events
        ),
        style,
    )
}

fn draw_layers(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines: Vec<Line> = if state.layers.is_empty() {
        vec![Line::raw("no layers, press + to add one")]
    } else {
        state.layers.iter().map(layer_line).collect()
    };
    let block = Block::default().borders(Borders::ALL).title(" layers ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_keys(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let spans: Vec<Span> = KEY_LABELS
        .iter()
        .zip(state.keys.iter())
        .map(|(label, pitch)| Span::raw(format!(" {label}:{pitch:<4}")))
        .collect();
    let block = Block::default().borders(Borders::ALL).title(" keys ");
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
