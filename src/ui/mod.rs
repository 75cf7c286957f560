//! User interface rendering.

mod chart;
pub mod formatters;
mod keymap_bar;
mod layout;
mod status_bar;
mod theme;

use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::Block,
    Frame,
};

pub use layout::ChartLayout;
pub use status_bar::status_text;
pub use theme::ThemeColors;

/// Draw the UI.
pub fn draw(f: &mut Frame<'_>, app: &mut App) {
    let colors = ThemeColors::from_theme(&app.theme);
    let area = f.area();
    f.render_widget(Block::default().style(Style::default().bg(colors.bg0)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(app.layout.status_height),
            Constraint::Length(app.layout.keymap_height),
        ])
        .split(area);

    // Next frame is reduced to whatever width the chart has now.
    app.resize_chart(chunks[0].width);

    chart::draw_chart(f, chunks[0], app, &colors);
    status_bar::draw_status(f, chunks[1], app, &colors);
    keymap_bar::draw_keymap(f, chunks[2], app.scheduler.state(), &colors);
}
