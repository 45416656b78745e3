use ratatui::{prelude::*, widgets::Gauge};

/// Create a gauge with color based on value thresholds
pub fn colored_gauge<'a>(value: f64, label: &'a str) -> Gauge<'a> {
    Gauge::default()
        .gauge_style(Style::default().fg(usage_color(value)).bg(Color::Black))
        .ratio((value / 100.0).clamp(0.0, 1.0))
        .label(label)
}

/// Get color for a usage percentage
pub fn usage_color(value: f64) -> Color {
    match value {
        v if v < 50.0 => Color::Cyan,
        v if v < 75.0 => Color::LightYellow,
        v if v < 90.0 => Color::LightRed,
        _ => Color::Red,
    }
}
