//! Min/max envelope downsampling.
//!
//! A snapshot is reduced to at most one column per pixel. Each column keeps the
//! minimum and maximum value of its time bucket so spikes survive the
//! reduction; empty buckets produce no column and show up as gaps.

use std::ops::Range;

use crate::buffer::{ChannelId, Sample};
use crate::error::{GraphViewError, Result};

/// One drawable column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    /// Bucket centre (or the sample timestamp when not bucketed).
    pub x: f64,
    /// Smallest value in the bucket.
    pub y_min: f64,
    /// Largest value in the bucket.
    pub y_max: f64,
}

/// Reduced data for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    /// Channel identifier.
    pub channel: ChannelId,
    /// Display name.
    pub name: String,
    /// Columns ordered by x.
    pub columns: Vec<Column>,
    /// Width of one bucket; `None` when every column is a single sample.
    pub bucket_width: Option<f64>,
}

impl ChannelSeries {
    /// Reduce one channel's samples to `target_width` columns.
    pub fn reduce(
        channel: ChannelId,
        name: String,
        samples: &[Sample],
        target_width: usize,
    ) -> Result<Self> {
        let (columns, bucket_width) = reduce_bucketed(samples, target_width)?;
        Ok(Self {
            channel,
            name,
            columns,
            bucket_width,
        })
    }

    /// X coordinates.
    pub fn xs(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.x).collect()
    }

    /// Lower envelope.
    pub fn y_mins(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.y_min).collect()
    }

    /// Upper envelope.
    pub fn y_maxs(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.y_max).collect()
    }
}

/// Everything drawn in one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderFrame {
    /// Pixel width the frame was reduced for.
    pub width: usize,
    /// One entry per visible channel, ordered by channel id.
    pub series: Vec<ChannelSeries>,
}

impl RenderFrame {
    /// Total number of columns across channels.
    pub fn column_count(&self) -> usize {
        self.series.iter().map(|s| s.columns.len()).sum()
    }

    /// Combined `(x_min, x_max, y_min, y_max)` bounds, `None` if the frame is empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut columns = self.series.iter().flat_map(|s| s.columns.iter());
        let first = columns.next()?;
        let init = (first.x, first.x, first.y_min, first.y_max);
        Some(columns.fold(init, |(x0, x1, y0, y1), c| {
            (x0.min(c.x), x1.max(c.x), y0.min(c.y_min), y1.max(c.y_max))
        }))
    }
}

/// Reduce `samples` to at most `target_width` min/max columns.
///
/// The finite timestamp range is split into `target_width` equal buckets.
/// When there are no more samples than buckets, every sample becomes its own
/// column. Samples with a non-finite timestamp or value are skipped.
pub fn reduce(samples: &[Sample], target_width: usize) -> Result<Vec<Column>> {
    reduce_bucketed(samples, target_width).map(|(columns, _)| columns)
}

fn reduce_bucketed(
    samples: &[Sample],
    target_width: usize,
) -> Result<(Vec<Column>, Option<f64>)> {
    if target_width == 0 {
        return Err(GraphViewError::InvalidWidth(target_width));
    }

    let finite = || {
        samples
            .iter()
            .filter(|s| s.timestamp.is_finite() && s.value.is_finite())
    };

    let count = finite().count();
    if count == 0 {
        return Ok((Vec::new(), None));
    }

    if count <= target_width {
        let mut columns: Vec<Column> = finite()
            .map(|s| Column {
                x: s.timestamp,
                y_min: s.value,
                y_max: s.value,
            })
            .collect();
        columns.sort_by(|a, b| a.x.total_cmp(&b.x));
        return Ok((columns, None));
    }

    let (t_min, t_max) = finite().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.timestamp), hi.max(s.timestamp))
    });
    let span = t_max - t_min;

    // All samples share one timestamp: a single bucket holds them.
    if span <= 0.0 {
        let (y_min, y_max) = finite().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.value), hi.max(s.value))
        });
        return Ok((
            vec![Column {
                x: t_min,
                y_min,
                y_max,
            }],
            None,
        ));
    }

    let bucket_width = span / target_width as f64;
    let mut buckets: Vec<Option<(f64, f64)>> = vec![None; target_width];
    for sample in finite() {
        let idx = bucket_index(sample.timestamp, t_min, span, target_width);
        let slot = &mut buckets[idx];
        *slot = Some(match *slot {
            Some((lo, hi)) => (lo.min(sample.value), hi.max(sample.value)),
            None => (sample.value, sample.value),
        });
    }

    let columns = buckets
        .into_iter()
        .enumerate()
        .filter_map(|(i, bucket)| {
            bucket.map(|(y_min, y_max)| Column {
                x: t_min + (i as f64 + 0.5) * bucket_width,
                y_min,
                y_max,
            })
        })
        .collect();
    Ok((columns, Some(bucket_width)))
}

/// Bucket holding timestamp `t`; the range end falls into the last bucket.
///
/// A zero `width` has no buckets and maps everything to index 0.
pub fn bucket_index(t: f64, t_min: f64, span: f64, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    let position = ((t - t_min) / span * width as f64).floor();
    if position <= 0.0 {
        0
    } else {
        (position as usize).min(width - 1)
    }
}

/// Index ranges of `x` that may be joined by a line.
///
/// Adjacent columns more than one bucket apart have an empty bucket between
/// them and start a new run. Unbucketed columns form a single run.
pub fn contiguous_runs(x: &[f64], bucket_width: Option<f64>) -> Vec<Range<usize>> {
    if x.is_empty() {
        return Vec::new();
    }
    let limit = match bucket_width {
        Some(width) if width > 0.0 => width * 1.5,
        _ => return vec![0..x.len()],
    };
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..x.len() {
        if x[i] - x[i - 1] > limit {
            runs.push(start..i);
            start = i;
        }
    }
    runs.push(start..x.len());
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[(f64, f64)]) -> Vec<Sample> {
        values.iter().map(|&(t, v)| Sample::new(t, 0, v)).collect()
    }

    #[test]
    fn zero_width_fails_fast() {
        let err = reduce(&series(&[(0.0, 1.0)]), 0).unwrap_err();
        assert!(matches!(err, GraphViewError::InvalidWidth(0)));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(reduce(&[], 10).unwrap().is_empty());
    }

    #[test]
    fn sparse_input_keeps_every_sample() {
        let columns = reduce(&series(&[(0.0, 1.0), (5.0, -2.0), (9.0, 3.0)]), 100).unwrap();
        assert_eq!(
            columns,
            vec![
                Column { x: 0.0, y_min: 1.0, y_max: 1.0 },
                Column { x: 5.0, y_min: -2.0, y_max: -2.0 },
                Column { x: 9.0, y_min: 3.0, y_max: 3.0 },
            ]
        );
    }

    #[test]
    fn spike_survives_reduction() {
        let mut data: Vec<(f64, f64)> = (0..1_000).map(|i| (i as f64, 0.0)).collect();
        data[517].1 = 42.0;
        let columns = reduce(&series(&data), 10).unwrap();

        assert_eq!(columns.len(), 10);
        let max = columns.iter().map(|c| c.y_max).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(max, 42.0);
        assert_eq!(columns[5].y_max, 42.0);
        assert_eq!(columns[5].y_min, 0.0);
    }

    #[test]
    fn empty_buckets_are_gaps() {
        let mut data: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 0.1, 1.0)).collect();
        data.extend((0..10).map(|i| (9.0 + i as f64 * 0.1, 2.0)));
        let columns = reduce(&series(&data), 10).unwrap();

        assert_eq!(columns.len(), 2);
        assert!(columns[0].x < 1.0);
        assert!(columns[1].x > 9.0);
        assert_eq!(columns[1].y_min, 2.0);
    }

    #[test]
    fn bucket_centres_are_evenly_spaced() {
        let data: Vec<(f64, f64)> = (0..=100).map(|i| (i as f64, i as f64)).collect();
        let columns = reduce(&series(&data), 4).unwrap();

        let xs: Vec<f64> = columns.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![12.5, 37.5, 62.5, 87.5]);
        assert_eq!((columns[0].y_min, columns[0].y_max), (0.0, 24.0));
        assert_eq!((columns[3].y_min, columns[3].y_max), (75.0, 100.0));
    }

    #[test]
    fn every_sample_is_inside_its_bucket_envelope() {
        let data: Vec<(f64, f64)> = (0..5_000)
            .map(|i| {
                let t = i as f64 * 0.013;
                (t, (t * 3.1).sin() * 10.0 + (i % 7) as f64)
            })
            .collect();
        let samples = series(&data);
        let width = 37;
        let columns = reduce(&samples, width).unwrap();

        let t_min = data[0].0;
        let span = data[data.len() - 1].0 - t_min;
        let bucket_width = span / width as f64;
        for sample in &samples {
            let idx = bucket_index(sample.timestamp, t_min, span, width);
            let centre = t_min + (idx as f64 + 0.5) * bucket_width;
            let column = columns
                .iter()
                .find(|c| (c.x - centre).abs() < 1e-9)
                .expect("bucket for sample");
            assert!(column.y_min <= sample.value && sample.value <= column.y_max);
        }
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let data = series(&[(0.0, 1.0), (1.0, f64::NAN), (f64::INFINITY, 2.0), (2.0, 3.0)]);
        let columns = reduce(&data, 10).unwrap();
        assert_eq!(columns.len(), 2);
        assert!(columns.iter().all(|c| c.y_min.is_finite()));
    }

    #[test]
    fn identical_timestamps_collapse_to_one_column() {
        let data = series(&[(1.0, 1.0), (1.0, 5.0), (1.0, -1.0)]);
        let columns = reduce(&data, 2).unwrap();
        assert_eq!(columns, vec![Column { x: 1.0, y_min: -1.0, y_max: 5.0 }]);
    }

    #[test]
    fn frame_bounds_cover_all_series() {
        let frame = RenderFrame {
            width: 10,
            series: vec![
                ChannelSeries {
                    channel: 0,
                    name: "a".into(),
                    columns: vec![Column { x: 1.0, y_min: -1.0, y_max: 2.0 }],
                    bucket_width: None,
                },
                ChannelSeries {
                    channel: 1,
                    name: "b".into(),
                    columns: vec![Column { x: 4.0, y_min: 0.0, y_max: 9.0 }],
                    bucket_width: None,
                },
            ],
        };
        assert_eq!(frame.bounds(), Some((1.0, 4.0, -1.0, 9.0)));
        assert_eq!(frame.column_count(), 2);
        assert_eq!(RenderFrame::default().bounds(), None);
    }

    #[test]
    fn bucket_index_with_zero_width_is_zero() {
        assert_eq!(bucket_index(5.0, 0.0, 10.0, 0), 0);
        assert_eq!(bucket_index(10.0, 0.0, 10.0, 4), 3);
    }

    #[test]
    fn empty_buckets_split_runs() {
        // Ten buckets over [0, 10]; buckets 2..8 get nothing.
        let mut data = series(&[(0.0, 1.0), (0.5, 2.0), (1.0, 0.0), (1.5, 4.0)]);
        data.extend(series(&[(8.5, 1.0), (9.0, 2.0), (9.5, 3.0), (10.0, 1.0)]));
        data.extend(series(&[(0.2, 1.0), (9.8, 1.0), (1.2, 1.0), (8.2, 1.0)]));
        let reduced = ChannelSeries::reduce(0, "a".into(), &data, 10).unwrap();
        assert_eq!(reduced.bucket_width, Some(1.0));
        assert_eq!(reduced.columns.len(), 4);
        assert_eq!(contiguous_runs(&reduced.xs(), reduced.bucket_width), vec![0..2, 2..4]);
    }

    #[test]
    fn unbucketed_columns_form_one_run() {
        let data = series(&[(0.0, 1.0), (50.0, 2.0), (51.0, 3.0)]);
        let reduced = ChannelSeries::reduce(0, "a".into(), &data, 10).unwrap();
        assert_eq!(reduced.bucket_width, None);
        assert_eq!(contiguous_runs(&reduced.xs(), None), vec![0..3]);
        assert!(contiguous_runs(&[], Some(1.0)).is_empty());
    }
}
