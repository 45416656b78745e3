use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::core::config::ConnectionConfig;
use crate::core::telemetry::{MonitorAlert, MonitorRuntime, MonitorView, SortMode};

use super::event_handler::{map_key, MonitorEvent};
use super::render::render_ui;

/// Requests the app makes of the telemetry runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCommand {
    SetSortMode(SortMode),
    Reconnect,
}

/// Monitor application state
pub struct MonitorApp {
    pub view: Arc<MonitorView>,
    pub port: String,
    pub baud_rate: u32,
    pub sort_mode: SortMode,
    pub should_quit: bool,
    pub show_help: bool,
    pub selected_task_index: usize,
    /// Errors waiting to be acknowledged; the front one is on screen.
    pub alerts: VecDeque<MonitorAlert>,
}

impl MonitorApp {
    pub fn new(config: &MonitorAppConfig) -> Self {
        Self {
            view: Arc::new(MonitorView::default()),
            port: config.connection.port.clone(),
            baud_rate: config.connection.baud_rate,
            sort_mode: config.sort_mode,
            should_quit: false,
            show_help: false,
            selected_task_index: 0,
            alerts: VecDeque::new(),
        }
    }

    /// Swap in the latest view, keeping the selection inside the table.
    pub fn update_view(&mut self, view: Arc<MonitorView>) {
        let max_index = view.tasks.tasks.len().saturating_sub(1);
        self.selected_task_index = self.selected_task_index.min(max_index);
        self.view = view;
    }

    pub fn push_alert(&mut self, alert: MonitorAlert) {
        self.alerts.push_back(alert);
    }

    pub fn current_alert(&self) -> Option<&MonitorAlert> {
        self.alerts.front()
    }

    /// Handle keyboard events
    pub fn handle_event(&mut self, event: MonitorEvent) -> Option<RuntimeCommand> {
        match event {
            MonitorEvent::Quit => self.should_quit = true,
            MonitorEvent::ToggleHelp => self.show_help = !self.show_help,
            MonitorEvent::SortBy(mode) => return self.change_sort(mode),
            MonitorEvent::CycleSort => return self.change_sort(self.sort_mode.next()),
            MonitorEvent::Reconnect => {
                self.alerts.retain(|alert| !alert.is_terminal());
                return Some(RuntimeCommand::Reconnect);
            }
            MonitorEvent::DismissAlert => {
                self.alerts.pop_front();
            }
            MonitorEvent::TaskUp => {
                self.selected_task_index = self.selected_task_index.saturating_sub(1);
            }
            MonitorEvent::TaskDown => {
                let max_index = self.view.tasks.tasks.len().saturating_sub(1);
                if self.selected_task_index < max_index {
                    self.selected_task_index += 1;
                }
            }
            MonitorEvent::None => {}
        }
        None
    }

    fn change_sort(&mut self, mode: SortMode) -> Option<RuntimeCommand> {
        if mode == self.sort_mode {
            return None;
        }
        self.sort_mode = mode;
        Some(RuntimeCommand::SetSortMode(mode))
    }
}

/// Configuration for the monitor app
#[derive(Debug, Clone)]
pub struct MonitorAppConfig {
    pub connection: ConnectionConfig,
    pub sort_mode: SortMode,
    pub tick_rate_ms: u64,
}

impl Default for MonitorAppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            sort_mode: SortMode::default(),
            tick_rate_ms: 100,
        }
    }
}

/// Run the monitor TUI application
pub fn run_monitor_app(config: MonitorAppConfig) -> Result<()> {
    // Connect before touching the terminal so config errors print normally
    let mut runtime = MonitorRuntime::connect(config.connection.clone(), config.sort_mode)
        .context("Failed to start telemetry session")?;

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = MonitorApp::new(&config);
    let result = event_loop(&mut terminal, &mut app, &mut runtime, &config);

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    runtime.shutdown().context("Failed to stop telemetry session")?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut MonitorApp,
    runtime: &mut MonitorRuntime,
    config: &MonitorAppConfig,
) -> Result<()> {
    let tick_rate = Duration::from_millis(config.tick_rate_ms.max(10));

    loop {
        app.update_view(runtime.latest_view());
        while let Some(alert) = runtime.try_next_alert() {
            app.push_alert(alert);
        }

        terminal.draw(|frame| render_ui(frame, app))?;

        if event::poll(tick_rate).context("Event poll failed")? {
            if let Event::Key(key) = event::read().context("Event read failed")? {
                if key.kind == KeyEventKind::Press {
                    // Esc closes an open popup before it quits
                    let mut monitor_event = map_key(key.code);
                    if monitor_event == MonitorEvent::Quit
                        && key.code == crossterm::event::KeyCode::Esc
                        && (app.show_help || app.current_alert().is_some())
                    {
                        monitor_event = if app.show_help {
                            MonitorEvent::ToggleHelp
                        } else {
                            MonitorEvent::DismissAlert
                        };
                    }

                    match app.handle_event(monitor_event) {
                        Some(RuntimeCommand::SetSortMode(mode)) => runtime.set_sort_mode(mode),
                        Some(RuntimeCommand::Reconnect) => {
                            if let Err(e) = runtime.reconnect() {
                                log::error!("Reconnect failed: {}", e);
                            }
                        }
                        None => {}
                    }
                }
            }
        }

        // Check if should quit
        if app.should_quit {
            return Ok(());
        }
    }
}
