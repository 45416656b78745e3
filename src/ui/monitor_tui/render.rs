use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use super::app::MonitorApp;
use super::widgets::colored_gauge;
use crate::core::telemetry::{ConnectionStatus, MemoryUsage, MonitorAlert, SortMode};
use crate::ui::formatters::{
    format_core_usage, format_memory_usage, format_size, format_timestamp, task_row,
};

/// Main render function
pub fn render_ui(frame: &mut Frame, app: &MonitorApp) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Connection header
            Constraint::Length(3), // Core usage
            Constraint::Length(3), // Heap + internal memory
            Constraint::Min(4),    // Task table
            Constraint::Length(1), // Footer
        ])
        .split(area);

    render_header(frame, chunks[0], app);
    render_core_section(frame, chunks[1], app);
    render_memory_section(frame, chunks[2], app);
    render_tasks_section(frame, chunks[3], app);
    render_footer(frame, chunks[4]);

    if let Some(alert) = app.current_alert() {
        render_alert_popup(frame, area, alert, app.alerts.len());
    } else if app.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &MonitorApp) {
    let status_style = match app.view.status {
        ConnectionStatus::Connecting => Style::default().fg(Color::LightYellow),
        ConnectionStatus::Streaming => Style::default().fg(Color::Cyan),
        ConnectionStatus::Disconnected(_) => Style::default().fg(Color::Red),
    };

    let updated = if app.view.updated_at > 0 {
        format_timestamp(app.view.updated_at)
    } else {
        "--:--:--".to_string()
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.port),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("@ {} baud │ ", app.baud_rate)),
        Span::styled(app.view.status.to_string(), status_style),
        Span::raw(format!(" │ updated {}", updated)),
    ]);

    let block = Block::default()
        .title(" ESP Task Monitor ")
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_core_section(frame: &mut Frame, area: Rect, app: &MonitorApp) {
    let cores = &app.view.tasks.cores;
    if cores.is_empty() {
        return;
    }

    let constraints = vec![Constraint::Ratio(1, cores.len() as u32); cores.len()];
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (usage, chunk) in cores.iter().zip(chunks.iter()) {
        let label = format_core_usage(usage.core, usage.percentage);
        let gauge = colored_gauge(usage.percentage, &label)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(gauge, *chunk);
    }
}

fn render_memory_section(frame: &mut Frame, area: Rect, app: &MonitorApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let (heap, internal) = match app.view.memory {
        Some(memory) => (memory.heap, memory.internal),
        None => (MemoryUsage::default(), MemoryUsage::default()),
    };

    render_memory_gauge(frame, chunks[0], "Heap", &heap);
    render_memory_gauge(frame, chunks[1], "Internal", &internal);
}

fn render_memory_gauge(frame: &mut Frame, area: Rect, label: &str, usage: &MemoryUsage) {
    let text = format_memory_usage(label, usage);
    let title = format!(" {} free ", format_size(usage.total - usage.used));
    let gauge = colored_gauge(usage.percent_used, &text)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(gauge, area);
}

fn render_tasks_section(frame: &mut Frame, area: Rect, app: &MonitorApp) {
    let sort_mode = app.view.tasks.sort_mode;
    let block = Block::default()
        .title(format!(
            " Tasks ({}) sorted by {} [n/p/c:sort ↑↓:nav] ",
            app.view.tasks.tasks.len(),
            sort_mode.label()
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Not enough space for header + at least one row
    if inner.height < 2 {
        return;
    }

    let header_cell = |title: &'static str, mode: Option<SortMode>| {
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if mode == Some(sort_mode) {
            style = style.fg(Color::Cyan);
        }
        Cell::from(title).style(style)
    };

    let header = Row::new(vec![
        header_cell("Task Name", Some(SortMode::Name)),
        header_cell("Run Time", None),
        header_cell("Percentage", Some(SortMode::Percentage)),
        header_cell("Core", Some(SortMode::Core)),
        header_cell("Status", None),
    ])
    .height(1);

    // Keep the selected row visible
    let visible = inner.height.saturating_sub(1) as usize;
    let offset = (app.selected_task_index + 1).saturating_sub(visible);

    let rows: Vec<Row> = app
        .view
        .tasks
        .tasks
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible)
        .map(|(i, task)| {
            let style = if i == app.selected_task_index {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else if task.is_idle() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new(task_row(task).map(Cell::from)).style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(34),
        Constraint::Percentage(20),
        Constraint::Percentage(16),
        Constraint::Percentage(10),
        Constraint::Percentage(20),
    ];

    let table = Table::new(rows, widths).header(header);
    frame.render_widget(table, inner);
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let help = " q: Quit │ ?: Help │ n/p/c: Sort │ s: Next sort │ r: Reconnect ";
    let para = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn render_alert_popup(frame: &mut Frame, area: Rect, alert: &MonitorAlert, queued: usize) {
    let (title, color) = match alert {
        MonitorAlert::Protocol(_) => (" Device Error ", Color::LightRed),
        MonitorAlert::Transport(_) => (" Serial Error ", Color::Red),
    };

    let mut text = vec![Line::from(alert.message().to_string()), Line::from("")];
    if alert.is_terminal() {
        text.push(Line::from("Press r to reconnect."));
    }
    let more = if queued > 1 {
        format!("Enter: dismiss ({} more)", queued - 1)
    } else {
        "Enter: dismiss".to_string()
    };
    text.push(Line::from(Span::styled(
        more,
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true });

    let popup_area = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(paragraph, popup_area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = r#"
    ESP Task Monitor - Help

    Keyboard Shortcuts:
    ─────────────────────────────────────
    q / Esc     Quit the application
    ? / h       Toggle this help screen
    n           Sort tasks by name
    p           Sort tasks by CPU percentage
    c           Sort tasks by core
    s / Tab     Next sort mode
    r           Reconnect to the serial port
    Enter       Dismiss error message

    Core totals exclude IDLE tasks.
    "#;

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::DarkGray));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .alignment(Alignment::Left);

    // Center the help popup
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(paragraph, popup_area);
}

/// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
