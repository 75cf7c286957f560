//! Plot surfaces - the receiving end of the render pipeline.
//!
//! A surface only ever sees reduced, ready-to-draw arrays. The terminal chart
//! lives in `ui::chart`; this module holds the trait and the headless surface.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::buffer::ChannelId;
use crate::downsample::{contiguous_runs, RenderFrame};

/// Destination for rendered series.
pub trait PlotSurface {
    /// Horizontal pixel (column) count frames should be reduced to.
    fn pixel_width(&self) -> usize;

    /// Replace the drawn data of one channel.
    ///
    /// `bucket_width` is the x distance between adjacent buckets, or `None`
    /// when each column is a raw sample. Columns further apart than one bucket
    /// straddle a gap and must not be joined.
    fn set_series(
        &mut self,
        channel: ChannelId,
        name: &str,
        x: &[f64],
        y_min: &[f64],
        y_max: &[f64],
        bucket_width: Option<f64>,
    );

    /// Called after every channel of a frame has been set.
    ///
    /// `visible` lists the channels of the frame; series of other channels
    /// should no longer be drawn.
    fn finish_frame(&mut self, visible: &[ChannelId]) {
        let _ = visible;
    }
}

/// Hand a complete frame to a surface.
pub fn present<P: PlotSurface + ?Sized>(surface: &mut P, frame: &RenderFrame) {
    for series in &frame.series {
        surface.set_series(
            series.channel,
            &series.name,
            &series.xs(),
            &series.y_mins(),
            &series.y_maxs(),
            series.bucket_width,
        );
    }
    let visible: Vec<ChannelId> = frame.series.iter().map(|s| s.channel).collect();
    surface.finish_frame(&visible);
}

/// Arrays last drawn for one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawnSeries {
    /// Display name.
    pub name: String,
    /// X coordinates.
    pub x: Vec<f64>,
    /// Lower envelope.
    pub y_min: Vec<f64>,
    /// Upper envelope.
    pub y_max: Vec<f64>,
    /// Bucket width the columns were reduced with.
    pub bucket_width: Option<f64>,
}

impl DrawnSeries {
    /// Smallest and largest drawn value.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let lo = self.y_min.iter().copied().reduce(f64::min)?;
        let hi = self.y_max.iter().copied().reduce(f64::max)?;
        Some((lo, hi))
    }

    /// Index ranges of columns with no empty bucket between them.
    pub fn runs(&self) -> Vec<Range<usize>> {
        contiguous_runs(&self.x, self.bucket_width)
    }
}

/// Surface that keeps the last drawn series in memory.
///
/// Used for headless runs and as the data half of the terminal chart.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    width: usize,
    series: BTreeMap<ChannelId, DrawnSeries>,
    frames: u64,
}

impl SeriesStore {
    /// Create a store reducing to `width` columns.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            series: BTreeMap::new(),
            frames: 0,
        }
    }

    /// Change the column count for subsequent frames.
    pub fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    /// Drawn series, ordered by channel id.
    pub fn series(&self) -> impl Iterator<Item = (ChannelId, &DrawnSeries)> {
        self.series.iter().map(|(id, s)| (*id, s))
    }

    /// Drawn series of one channel.
    pub fn get(&self, channel: ChannelId) -> Option<&DrawnSeries> {
        self.series.get(&channel)
    }

    /// Number of completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Forget every drawn series.
    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// One line per channel describing what is on screen.
    pub fn summary_lines(&self) -> Vec<String> {
        self.series
            .iter()
            .map(|(id, s)| match s.value_range() {
                Some((lo, hi)) => format!(
                    "channel {} ({}): {} columns, min {}, max {}",
                    id,
                    s.name,
                    s.x.len(),
                    lo,
                    hi
                ),
                None => format!("channel {} ({}): no data", id, s.name),
            })
            .collect()
    }
}

impl PlotSurface for SeriesStore {
    fn pixel_width(&self) -> usize {
        self.width
    }

    fn set_series(
        &mut self,
        channel: ChannelId,
        name: &str,
        x: &[f64],
        y_min: &[f64],
        y_max: &[f64],
        bucket_width: Option<f64>,
    ) {
        let entry = self.series.entry(channel).or_default();
        entry.name.clear();
        entry.name.push_str(name);
        entry.x.clear();
        entry.x.extend_from_slice(x);
        entry.y_min.clear();
        entry.y_min.extend_from_slice(y_min);
        entry.y_max.clear();
        entry.y_max.extend_from_slice(y_max);
        entry.bucket_width = bucket_width;
    }

    fn finish_frame(&mut self, visible: &[ChannelId]) {
        self.series.retain(|id, _| visible.contains(id));
        self.frames += 1;
        tracing::trace!("Frame {} with {} series", self.frames, self.series.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsample::{ChannelSeries, Column};

    fn frame(ids: &[ChannelId]) -> RenderFrame {
        RenderFrame {
            width: 4,
            series: ids
                .iter()
                .map(|&id| ChannelSeries {
                    channel: id,
                    name: format!("ch{}", id),
                    columns: vec![
                        Column { x: 0.0, y_min: -1.0, y_max: 1.0 },
                        Column { x: 1.0, y_min: 0.0, y_max: 3.0 },
                    ],
                    bucket_width: None,
                })
                .collect(),
        }
    }

    #[test]
    fn present_replaces_series_and_drops_hidden_channels() {
        let mut store = SeriesStore::new(4);
        present(&mut store, &frame(&[0, 1]));
        assert_eq!(store.series().count(), 2);

        present(&mut store, &frame(&[1]));
        assert_eq!(store.series().map(|(id, _)| id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(store.frames(), 2);

        let drawn = store.get(1).unwrap();
        assert_eq!(drawn.x, vec![0.0, 1.0]);
        assert_eq!(drawn.value_range(), Some((-1.0, 3.0)));
    }

    #[test]
    fn summary_describes_each_channel() {
        let mut store = SeriesStore::new(4);
        present(&mut store, &frame(&[3]));
        assert_eq!(
            store.summary_lines(),
            vec!["channel 3 (ch3): 2 columns, min -1, max 3".to_string()]
        );
    }

    #[test]
    fn stored_series_keep_their_gaps() {
        let mut store = SeriesStore::new(10);
        store.set_series(0, "a", &[0.5, 1.5, 8.5], &[0.0; 3], &[1.0; 3], Some(1.0));
        assert_eq!(store.get(0).unwrap().runs(), vec![0..2, 2..3]);

        store.set_series(0, "a", &[0.5, 1.5, 8.5], &[0.0; 3], &[1.0; 3], None);
        assert_eq!(store.get(0).unwrap().runs(), vec![0..3]);
    }
}
