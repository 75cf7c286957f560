//! Status bar UI component.

use crate::app::App;
use crate::ui::formatters::{format_number, truncate_to_width};
use crate::ui::ThemeColors;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Text shown for the session: state, source and counters.
pub fn status_text(app: &App) -> String {
    let stats = app.scheduler.stats();
    let buffer = app.scheduler.buffer();
    format!(
        "[{}] {} | {} ch, {} samples | frames {} skipped {} | {}",
        app.scheduler.state().name(),
        app.source_name,
        buffer.channel_count(),
        format_number(buffer.total_len()),
        stats.rendered,
        stats.skipped,
        app.status
    )
}

/// Draw the status bar.
pub(crate) fn draw_status(f: &mut Frame<'_>, area: Rect, app: &App, colors: &ThemeColors) {
    let width = area.width as usize;
    let text = truncate_to_width(&status_text(app), width);
    let used = unicode_width::UnicodeWidthStr::width(text.as_str());

    let mut spans = vec![Span::styled(text, Style::default().fg(colors.fg0))];
    if let Some(error) = &app.error_message {
        spans.push(Span::styled(
            truncate_to_width(&format!(" | {}", error), width.saturating_sub(used)),
            Style::default().fg(colors.red),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(colors.bg1));
    f.render_widget(paragraph, area);
}
