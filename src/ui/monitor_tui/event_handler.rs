use crossterm::event::KeyCode;

use crate::core::telemetry::SortMode;

/// Events that can occur in the monitor TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Quit the application
    Quit,
    /// Toggle help overlay
    ToggleHelp,
    /// Sort the task table by a specific key
    SortBy(SortMode),
    /// Cycle to the next sort key
    CycleSort,
    /// Start a new session after a transport failure
    Reconnect,
    /// Close the error popup
    DismissAlert,
    /// Navigate task list up
    TaskUp,
    /// Navigate task list down
    TaskDown,
    /// No action
    None,
}

pub fn map_key(code: KeyCode) -> MonitorEvent {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => MonitorEvent::Quit,
        KeyCode::Char('?') | KeyCode::Char('h') => MonitorEvent::ToggleHelp,
        KeyCode::Char('n') => MonitorEvent::SortBy(SortMode::Name),
        KeyCode::Char('p') => MonitorEvent::SortBy(SortMode::Percentage),
        KeyCode::Char('c') => MonitorEvent::SortBy(SortMode::Core),
        KeyCode::Char('s') | KeyCode::Tab => MonitorEvent::CycleSort,
        KeyCode::Char('r') => MonitorEvent::Reconnect,
        KeyCode::Enter | KeyCode::Char(' ') => MonitorEvent::DismissAlert,
        KeyCode::Up | KeyCode::Char('k') => MonitorEvent::TaskUp,
        KeyCode::Down | KeyCode::Char('j') => MonitorEvent::TaskDown,
        _ => MonitorEvent::None,
    }
}
