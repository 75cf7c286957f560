//! Keymap help bar UI component.

use crate::scheduler::SessionState;
use crate::ui::ThemeColors;
use ratatui::{layout::Rect, style::Style, widgets::Paragraph, Frame};

/// Draw the keymap help bar.
pub(crate) fn draw_keymap(f: &mut Frame<'_>, area: Rect, state: SessionState, colors: &ThemeColors) {
    let keymap_text = match state {
        SessionState::Stopped => "s:start | 1-9:channel | c:clear | y:copy | T:theme | q:quit",
        SessionState::Running => {
            "space:pause | s:stop | 1-9:channel | c:clear | y:copy | T:theme | q:quit"
        },
        SessionState::Paused => {
            "space:resume | s:stop | 1-9:channel | c:clear | y:copy | T:theme | q:quit"
        },
    };

    let paragraph =
        Paragraph::new(keymap_text).style(Style::default().fg(colors.green).bg(colors.bg0));

    f.render_widget(paragraph, area);
}
