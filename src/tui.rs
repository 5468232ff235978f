//! Terminal front end.
//!
//! An input line, a read-only output pane and a status line. Enter sends
//! the sentence; the model call runs as a task on the tokio runtime and the
//! answer is picked up from a oneshot channel between redraws, so the
//! screen stays live while the model thinks.

use anyhow::Result;
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
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, warn};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::enhancer::{Enhancer, EMPTY_INPUT_MESSAGE};

const TITLE: &str = " echopp: sentence coach ";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A model call running in the background.
struct Pending {
    started: Instant,
    result: oneshot::Receiver<String>,
}

/// Everything the screen shows.
struct App {
    input: Input,
    output: String,
    pending: Option<Pending>,
    model: String,
}

impl App {
    fn new(initial: Option<String>, model: String) -> Self {
        let input = match initial {
            Some(text) => Input::default().with_value(text),
            None => Input::default(),
        };
        Self {
            input,
            output: String::new(),
            pending: None,
            model,
        }
    }

    fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a request unless one is already running.
    fn submit(&mut self, enhancer: &Arc<Enhancer>, handle: &Handle) {
        if self.is_busy() {
            return;
        }

        let text = self.input.value().trim().to_string();
        if text.is_empty() {
            self.output = EMPTY_INPUT_MESSAGE.to_string();
            return;
        }

        let (tx, rx) = oneshot::channel();
        let enhancer = Arc::clone(enhancer);
        handle.spawn(async move {
            let display = enhancer.enhance(&text).await;
            // The receiver is gone if the user quit mid-request.
            let _ = tx.send(display);
        });

        debug!("Request dispatched");
        self.output.clear();
        self.pending = Some(Pending {
            started: Instant::now(),
            result: rx,
        });
    }

    /// Move a finished answer into the output pane.
    fn collect(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        match pending.result.try_recv() {
            Ok(display) => {
                self.output = display;
                self.pending = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => {
                warn!("Enhance task ended without a result");
                self.output = "Error: the request was interrupted.".to_string();
                self.pending = None;
            }
        }
    }

    fn status_line(&self) -> String {
        match &self.pending {
            Some(pending) => format!(
                "Thinking with {}... {}s",
                self.model,
                pending.started.elapsed().as_secs()
            ),
            None => format!("{} | Enter: enhance  Esc: quit", self.model),
        }
    }
}

/// Run the TUI until the user quits. Blocks the calling thread; model calls
/// are spawned onto `handle`.
pub fn run_tui(enhancer: Arc<Enhancer>, handle: Handle, initial: Option<String>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(initial, enhancer.describe());
    let result = run_event_loop(&mut terminal, &mut app, &enhancer, &handle);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    enhancer: &Arc<Enhancer>,
    handle: &Handle,
) -> Result<()> {
    loop {
        app.collect();
        terminal.draw(|frame| draw_ui(frame, app))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            // Only handle key press events (not release)
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Enter => app.submit(enhancer, handle),
                KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(());
                }
                KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    app.input.reset();
                    app.output.clear();
                }
                _ => {
                    app.input.handle_event(&Event::Key(key));
                }
            }
        }
    }
}

/// Draw the TUI.
fn draw_ui(frame: &mut Frame, app: &App) {
    let [input_area, output_area, status_area] = split_screen(frame.area());

    let input_block = Block::default()
        .title(TITLE)
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner_area = input_block.inner(input_area);
    frame.render_widget(input_block, input_area);

    // Scroll the input if cursor is beyond visible area
    let input_width = inner_area.width.max(1) as usize;
    let cursor_pos = app.input.visual_cursor();
    let scroll = cursor_pos.saturating_sub(input_width - 1);
    let visible_value: String = app.input.value().chars().skip(scroll).take(input_width).collect();

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            visible_value,
            Style::default().fg(Color::White),
        ))),
        inner_area,
    );

    let output_block = Block::default()
        .title(" Improved sentence ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(
        Paragraph::new(app.output.as_str())
            .block(output_block)
            .wrap(Wrap { trim: false }),
        output_area,
    );

    let status_style = if app.is_busy() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(app.status_line(), status_style)),
        status_area,
    );

    if !app.is_busy() {
        frame.set_cursor_position((inner_area.x + (cursor_pos - scroll) as u16, inner_area.y));
    }
}

/// Input box on top, output filling the middle, one status row at the bottom.
fn split_screen(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}
