use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use subway_core::{
    LineListing, LineService, Section, StationResponse, StationService, Storage,
};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::prompt::{Command, Prompt, PromptKind};

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            danger: Color::Red,
        }
    }
}

/// Map a stored line colour such as `bg-green-600` or `#00a84d` to a terminal colour.
fn line_color(color: &str) -> Option<Color> {
    if let Some(rgb) = parse_hex_color(color) {
        return Some(rgb);
    }
    let lower = color.to_lowercase();
    let named = [
        ("red", Color::Red),
        ("orange", Color::LightRed),
        ("yellow", Color::Yellow),
        ("green", Color::Green),
        ("teal", Color::Cyan),
        ("cyan", Color::Cyan),
        ("blue", Color::Blue),
        ("indigo", Color::Blue),
        ("purple", Color::Magenta),
        ("pink", Color::LightMagenta),
        ("gray", Color::Gray),
        ("white", Color::White),
    ];
    named
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, color)| *color)
}

fn parse_hex_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#')?;
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Lines,
    Stations,
}

enum AppEvent {
    Input(Event),
    Tick,
}

struct UiState {
    screen: Screen,
    lines: Vec<LineListing>,
    sections: Vec<Section>,
    stations: Vec<StationResponse>,
    line_cursor: usize,
    station_cursor: usize,
    status: String,
    status_is_error: bool,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            screen: Screen::Lines,
            lines: Vec::new(),
            sections: Vec::new(),
            stations: Vec::new(),
            line_cursor: 0,
            station_cursor: 0,
            status: "Ready".to_string(),
            status_is_error: false,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, status: String) {
        self.status = status;
        self.status_is_error = false;
    }

    fn set_error(&mut self, status: String) {
        self.status = status;
        self.status_is_error = true;
    }

    fn current_line(&self) -> Option<&LineListing> {
        self.lines.get(self.line_cursor)
    }

    fn current_station(&self) -> Option<&StationResponse> {
        self.stations.get(self.station_cursor)
    }

    fn move_cursor(&mut self, delta: isize) {
        let (cursor, len) = match self.screen {
            Screen::Lines => (&mut self.line_cursor, self.lines.len()),
            Screen::Stations => (&mut self.station_cursor, self.stations.len()),
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = (*cursor as isize + delta).clamp(0, len as isize - 1);
        *cursor = next as usize;
    }

    fn clamp_cursors(&mut self) {
        self.line_cursor = self.line_cursor.min(self.lines.len().saturating_sub(1));
        self.station_cursor = self
            .station_cursor
            .min(self.stations.len().saturating_sub(1));
    }
}

/// Terminal front end over the line and station services.
pub struct SubwayApp<S> {
    lines: LineService<S>,
    stations: StationService<S>,
    state: UiState,
    prompt: Option<Prompt>,
    theme: Theme,
}

impl<S: Storage> SubwayApp<S> {
    pub fn new(lines: LineService<S>, stations: StationService<S>) -> Self {
        Self {
            lines,
            stations,
            state: UiState::default(),
            prompt: None,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        match self.reload() {
            Ok(()) => self.state.set_status(format!(
                "Loaded {} lines and {} stations",
                self.state.lines.len(),
                self.state.stations.len()
            )),
            Err(err) => self.state.set_error(format!("Load failed: {err}")),
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let result = loop {
            if let Err(err) = terminal.draw(|frame| self.draw(frame)) {
                break Err(err.into());
            }
            if self.state.should_quit {
                break Ok(());
            }
            match event_rx.recv().await {
                Some(AppEvent::Input(Event::Key(key))) => self.handle_key(key),
                Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => {}
                None => break Ok(()),
            }
        };

        restore_terminal(&mut terminal)?;
        result
    }

    fn reload(&mut self) -> Result<()> {
        self.state.stations = self.stations.find_stations()?;
        self.state.lines = self.lines.find_lines()?;
        self.state.clamp_cursors();
        self.refresh_sections();
        info!(
            lines = self.state.lines.len(),
            stations = self.state.stations.len(),
            "Directory reloaded"
        );
        Ok(())
    }

    fn refresh_sections(&mut self) {
        let line_id = match self.state.current_line() {
            Some(line) if line.stations.is_ok() => line.id,
            _ => {
                self.state.sections.clear();
                return;
            }
        };
        match self.lines.ordered_sections(line_id) {
            Ok(sections) => self.state.sections = sections,
            Err(err) => {
                error!(?err, line_id = %line_id, "Failed to order sections");
                self.state.sections.clear();
                self.state.set_error(format!("Line #{line_id}: {err}"));
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return;
        }
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.state.should_quit = true,
            KeyCode::Tab => {
                self.state.screen = match self.state.screen {
                    Screen::Lines => Screen::Stations,
                    Screen::Stations => Screen::Lines,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('r') => match self.reload() {
                Ok(()) => self.state.set_status("Reloaded".to_string()),
                Err(err) => self.state.set_error(format!("Reload failed: {err}")),
            },
            KeyCode::Char('s') => self.prompt = Some(Prompt::new(PromptKind::NewStation)),
            KeyCode::Char('n') => self.prompt = Some(Prompt::new(PromptKind::NewLine)),
            KeyCode::Char('a') => self.open_line_prompt(PromptKind::AddSection),
            KeyCode::Char('x') => self.open_line_prompt(PromptKind::RemoveStation),
            KeyCode::Char('d') => self.delete_selected(),
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        self.state.move_cursor(delta);
        if self.state.screen == Screen::Lines {
            self.refresh_sections();
        }
    }

    fn open_line_prompt(&mut self, kind: fn(subway_core::LineId) -> PromptKind) {
        match self.state.current_line() {
            Some(line) if self.state.screen == Screen::Lines => {
                self.prompt = Some(Prompt::new(kind(line.id)));
            }
            _ => self
                .state
                .set_status("Select a line on the Lines screen first".to_string()),
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                self.state.set_status("Cancelled".to_string());
            }
            KeyCode::Enter => match prompt.parse() {
                Ok(command) => {
                    self.prompt = None;
                    self.apply(command);
                }
                Err(err) => self.state.set_error(format!("{err:#}")),
            },
            KeyCode::Left => prompt.move_cursor(-1),
            KeyCode::Right => prompt.move_cursor(1),
            KeyCode::Home => prompt.move_home(),
            KeyCode::End => prompt.move_end(),
            KeyCode::Backspace => prompt.backspace(),
            KeyCode::Delete => prompt.delete(),
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    prompt.insert(ch);
                }
            }
            _ => {}
        }
    }

    fn apply(&mut self, command: Command) {
        let outcome = match command {
            Command::CreateStation(name) => self
                .stations
                .create_station(&name)
                .map(|station| format!("Created station {} (#{})", station.name, station.id)),
            Command::CreateLine(request) => self
                .lines
                .create_line(&request)
                .map(|line| format!("Created line {} (#{})", line.name, line.id)),
            Command::AddSection(line_id, request) => self
                .lines
                .add_section(line_id, &request)
                .map(|line| format!("{}: {}", line.name, line.station_names().join(" → "))),
            Command::RemoveStation(line_id, station_id) => self
                .lines
                .remove_station(line_id, station_id)
                .map(|line| format!("{}: {}", line.name, line.station_names().join(" → "))),
        };

        match outcome {
            Ok(message) => {
                if let Err(err) = self.reload() {
                    self.state.set_error(format!("Reload failed: {err}"));
                } else {
                    self.state.set_status(message);
                }
            }
            Err(err) => {
                error!(%err, "Command failed");
                self.state.set_error(format!("Error: {err}"));
            }
        }
    }

    fn delete_selected(&mut self) {
        let outcome = match self.state.screen {
            Screen::Lines => match self.state.current_line() {
                Some(line) => {
                    let (id, name) = (line.id, line.name.clone());
                    self.lines
                        .delete_line(id)
                        .map(|()| format!("Deleted line {name}"))
                }
                None => return,
            },
            Screen::Stations => match self.state.current_station() {
                Some(station) => {
                    let (id, name) = (station.id, station.name.clone());
                    self.stations
                        .delete_station(id)
                        .map(|()| format!("Deleted station {name}"))
                }
                None => return,
            },
        };
        match outcome {
            Ok(message) => match self.reload() {
                Ok(()) => self.state.set_status(message),
                Err(err) => self.state.set_error(format!("Reload failed: {err}")),
            },
            Err(err) => self.state.set_error(format!("Error: {err}")),
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let size = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(4)])
            .split(size);

        match self.state.screen {
            Screen::Lines => {
                let body = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
                    .split(chunks[0]);
                self.render_line_list(frame, body[0]);
                self.render_line_detail(frame, body[1]);
            }
            Screen::Stations => self.render_station_list(frame, chunks[0]),
        }
        self.render_status(frame, chunks[1]);

        if let Some(prompt) = &self.prompt {
            self.render_prompt(frame, prompt);
        }
    }

    fn render_line_list(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .state
            .lines
            .iter()
            .map(|line| {
                let chip = Span::styled(
                    "■ ",
                    Style::default().fg(line_color(&line.color).unwrap_or(self.theme.muted)),
                );
                let name = Span::styled(
                    line.name.clone(),
                    Style::default()
                        .fg(self.theme.primary_fg)
                        .add_modifier(Modifier::BOLD),
                );
                let count = match &line.stations {
                    Ok(stations) => Span::styled(
                        format!("  {} stations", stations.len()),
                        Style::default().fg(self.theme.muted),
                    ),
                    Err(_) => Span::styled("  malformed", Style::default().fg(self.theme.danger)),
                };
                ListItem::new(Line::from(vec![chip, name, count]))
            })
            .collect();

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.state.line_cursor));
        }
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Lines"))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_line_detail(&self, frame: &mut Frame, area: Rect) {
        let Some(line) = self.state.current_line() else {
            let paragraph = Paragraph::new("No lines yet. Press s to add stations, n to add a line.")
                .block(Block::default().borders(Borders::ALL).title("Stations"))
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        };

        let accent = line_color(&line.color).unwrap_or(self.theme.accent);
        let mut lines = vec![
            Line::from(vec![
                Span::styled(line.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  #{} · {}", line.id, line.color),
                    Style::default().fg(self.theme.muted),
                ),
            ]),
            Line::from(""),
        ];
        let stations = match &line.stations {
            Ok(stations) => stations,
            Err(err) => {
                lines.push(Line::from(Span::styled(
                    err.to_string(),
                    Style::default().fg(self.theme.danger),
                )));
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "Press d to delete this line.",
                    Style::default().fg(self.theme.muted),
                )));
                let paragraph = Paragraph::new(lines)
                    .block(Block::default().borders(Borders::ALL).title("Stations"))
                    .wrap(Wrap { trim: false });
                frame.render_widget(paragraph, area);
                return;
            }
        };
        for (idx, station) in stations.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled("● ", Style::default().fg(accent)),
                Span::raw(station.name.clone()),
                Span::styled(
                    format!("  #{}", station.id),
                    Style::default().fg(self.theme.muted),
                ),
            ]));
            if let Some(section) = self.state.sections.get(idx) {
                lines.push(Line::from(Span::styled(
                    format!("│ {}", section.distance()),
                    Style::default().fg(accent),
                )));
            }
        }
        let total: u32 = self.state.sections.iter().map(Section::distance).sum();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Total distance: {total}"),
            Style::default().fg(self.theme.muted),
        )));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Stations"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_station_list(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .state
            .stations
            .iter()
            .map(|station| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("#{:<4}", station.id),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::raw(station.name.clone()),
                ]))
            })
            .collect();

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.state.station_cursor));
        }
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("All Stations"))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let color = if self.state.status_is_error {
            self.theme.danger
        } else {
            self.theme.success
        };
        let help = match self.state.screen {
            Screen::Lines => "j/k move  n line  s station  a add section  x remove station  d delete line  Tab stations  q quit",
            Screen::Stations => "j/k move  s station  d delete station  Tab lines  r reload  q quit",
        };
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(self.state.status.clone(), Style::default().fg(color))),
            Line::from(Span::styled(help, Style::default().fg(self.theme.muted))),
        ])
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_prompt(&self, frame: &mut Frame, prompt: &Prompt) {
        let area = centered_rect(64, 6, frame.size());
        frame.render_widget(Clear, area);

        let input_line = Line::from(vec![
            Span::styled("> ", Style::default().fg(self.theme.accent)),
            Span::raw(prompt.input.clone()),
        ]);
        let helper = Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" confirm  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]);
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(
                prompt.instruction(),
                Style::default().fg(self.theme.muted),
            )),
            input_line,
            Line::from(""),
            helper,
        ])
        .block(Block::default().borders(Borders::ALL).title(prompt.title()));
        frame.render_widget(paragraph, area);

        let cursor_x = (area.x + 3 + cursor_offset(prompt))
            .min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + 2);
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

/// Terminal cells taken by the input before the cursor; wide characters count twice.
fn cursor_offset(prompt: &Prompt) -> u16 {
    let width = Span::raw(prompt.before_cursor()).width();
    u16::try_from(width).unwrap_or(u16::MAX)
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
