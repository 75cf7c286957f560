//! Clipboard integration.

use crate::error::Result;
use arboard::Clipboard;

/// Plain-text report: a title, an underline, then one line per entry.
pub fn format_report(title: &str, lines: &[String]) -> String {
    let mut text = format!("{}\n", title);
    text.push_str(&"=".repeat(title.chars().count().clamp(1, 80)));
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Copy a report to the system clipboard; returns the number of bytes copied.
pub fn copy_report(title: &str, lines: &[String]) -> Result<usize> {
    let text = format_report(title, lines);
    let mut clipboard = Clipboard::new()?;
    clipboard.set_text(text.as_str())?;
    tracing::debug!("Copied {} bytes to clipboard", text.len());
    Ok(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_layout() {
        let text = format_report("Sine", &["channel 0 (a): 3 columns".to_string()]);
        assert_eq!(text, "Sine\n====\nchannel 0 (a): 3 columns\n");
    }

    #[test]
    fn underline_is_capped() {
        let title = "x".repeat(200);
        let text = format_report(&title, &[]);
        assert_eq!(text.lines().nth(1).unwrap().len(), 80);
    }
}
