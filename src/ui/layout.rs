//! Layout configuration for the chart view.

/// Chart layout constants.
#[derive(Debug, Clone)]
pub struct ChartLayout {
    /// Padding factor for the y axis (0.15 = 15% margin above and below).
    pub y_axis_padding_factor: f64,
    /// Braille dots per terminal cell horizontally.
    pub dots_per_column: usize,
    /// Columns taken by the chart border and y axis labels.
    pub axis_gutter: u16,
    /// Height of the status bar.
    pub status_height: u16,
    /// Height of the keymap bar.
    pub keymap_height: u16,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            y_axis_padding_factor: 0.15,
            dots_per_column: 2,
            axis_gutter: 10,
            status_height: 1,
            keymap_height: 1,
        }
    }
}

impl ChartLayout {
    /// Pixel width a chart `area_width` cells wide can show; never zero.
    pub fn pixel_width(&self, area_width: u16) -> usize {
        let cells = area_width.saturating_sub(self.axis_gutter).max(1) as usize;
        cells * self.dots_per_column.max(1)
    }

    /// Y bounds with padding; flat data gets a unit band.
    pub fn padded_y_bounds(&self, lo: f64, hi: f64) -> [f64; 2] {
        let span = hi - lo;
        if span <= 0.0 {
            return [lo - 1.0, hi + 1.0];
        }
        let pad = span * self.y_axis_padding_factor;
        [lo - pad, hi + pad]
    }
}
