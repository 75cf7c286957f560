//! Chart view - draws the series the scheduler last presented.

use std::ops::Range;

use crate::app::App;
use crate::surface::DrawnSeries;
use crate::ui::formatters::{format_axis_label, format_stat_value};
use crate::ui::ThemeColors;
use ratatui::{
    layout::{Alignment, Rect},
    style::Style,
    symbols::Marker,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

/// Points of the upper and lower envelope over `run`; the lower one is
/// omitted when it coincides with the upper one everywhere.
fn envelope_points(
    series: &DrawnSeries,
    run: Range<usize>,
) -> (Vec<(f64, f64)>, Option<Vec<(f64, f64)>>) {
    let x = &series.x[run.clone()];
    let y_min = &series.y_min[run.clone()];
    let y_max = &series.y_max[run];
    let upper: Vec<(f64, f64)> = x.iter().copied().zip(y_max.iter().copied()).collect();
    if y_min == y_max {
        return (upper, None);
    }
    let lower = x.iter().copied().zip(y_min.iter().copied()).collect();
    (upper, Some(lower))
}

/// One line segment of a channel; the legend goes on the channel's first.
struct Segment {
    index: usize,
    legend: Option<String>,
    points: Vec<(f64, f64)>,
}

fn x_bounds<'a>(points: impl IntoIterator<Item = &'a [(f64, f64)]>) -> Option<[f64; 2]> {
    let (lo, hi) = points
        .into_iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (x, _)| {
            (lo.min(*x), hi.max(*x))
        });
    if lo > hi {
        return None;
    }
    if lo == hi {
        return Some([lo - 0.5, hi + 0.5]);
    }
    Some([lo, hi])
}

/// Draw the chart.
///
/// Each channel is split at empty buckets so no line bridges a gap;
/// isolated columns are drawn as points.
pub(crate) fn draw_chart(f: &mut Frame<'_>, area: Rect, app: &App, colors: &ThemeColors) {
    let store = app.scheduler.surface();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.bg2))
        .title(format!(" {} ", app.title))
        .title_style(Style::default().fg(colors.yellow));

    // Owned point vectors first; datasets borrow them.
    let mut segments = Vec::new();
    let mut value_lo = f64::INFINITY;
    let mut value_hi = f64::NEG_INFINITY;
    for (index, (_, series)) in store.series().enumerate() {
        if let Some((lo, hi)) = series.value_range() {
            value_lo = value_lo.min(lo);
            value_hi = value_hi.max(hi);
        }
        let mut legend = Some(match series.y_max.last() {
            Some(latest) => format!("{} = {}", series.name, format_stat_value(*latest)),
            None => series.name.clone(),
        });
        for run in series.runs() {
            let (upper, lower) = envelope_points(series, run);
            segments.push(Segment {
                index,
                legend: legend.take(),
                points: upper,
            });
            if let Some(lower) = lower {
                segments.push(Segment {
                    index,
                    legend: None,
                    points: lower,
                });
            }
        }
    }

    let x_range = match x_bounds(segments.iter().map(|s| s.points.as_slice())) {
        Some(range) => range,
        None => {
            let para = Paragraph::new("Waiting for data")
                .style(Style::default().fg(colors.fg1))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(para, area);
            return;
        },
    };
    let y_range = app.layout.padded_y_bounds(value_lo, value_hi);

    let datasets: Vec<Dataset<'_>> = segments
        .iter()
        .map(|segment| {
            let graph_type = if segment.points.len() == 1 {
                GraphType::Scatter
            } else {
                GraphType::Line
            };
            let dataset = Dataset::default()
                .marker(Marker::Braille)
                .graph_type(graph_type)
                .style(Style::default().fg(colors.series_color(segment.index)))
                .data(&segment.points);
            match &segment.legend {
                Some(legend) => dataset.name(legend.as_str()),
                None => dataset,
            }
        })
        .collect();

    let (x_title, y_title) = app.axis_titles;
    let x_axis = Axis::default()
        .title(x_title)
        .style(Style::default().fg(colors.fg0))
        .bounds(x_range)
        .labels(vec![
            format_axis_label(x_range[0]),
            format_axis_label((x_range[0] + x_range[1]) / 2.0),
            format_axis_label(x_range[1]),
        ]);
    let y_axis = Axis::default()
        .title(y_title)
        .style(Style::default().fg(colors.fg0))
        .bounds(y_range)
        .labels(vec![
            format_axis_label(y_range[0]),
            format_axis_label((y_range[0] + y_range[1]) / 2.0),
            format_axis_label(y_range[1]),
        ]);

    let chart = Chart::new(datasets).block(block).x_axis(x_axis).y_axis(y_axis);
    f.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::surface::PlotSurface;
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    fn series(x: &[f64], y_min: &[f64], y_max: &[f64], bucket_width: Option<f64>) -> DrawnSeries {
        DrawnSeries {
            name: "a".into(),
            x: x.to_vec(),
            y_min: y_min.to_vec(),
            y_max: y_max.to_vec(),
            bucket_width,
        }
    }

    /// Braille cells with at least one dot set.
    fn dotted_cells(buffer: &Buffer) -> usize {
        buffer
            .content()
            .iter()
            .filter(|cell| {
                cell.symbol()
                    .chars()
                    .any(|c| ('\u{2801}'..='\u{28FF}').contains(&c))
            })
            .count()
    }

    fn render(x: &[f64], bucket_width: Option<f64>) -> usize {
        let mut app = App::new(&ViewerConfig::default()).unwrap();
        let y = vec![0.0; x.len()];
        app.scheduler
            .surface_mut()
            .set_series(0, "a", x, &y, &y, bucket_width);
        let colors = ThemeColors::from_theme(&app.theme);
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal
            .draw(|f| draw_chart(f, f.area(), &app, &colors))
            .unwrap();
        dotted_cells(terminal.backend().buffer())
    }

    #[test]
    fn flat_envelope_draws_one_line() {
        let series = series(&[0.0, 1.0], &[1.0, 2.0], &[1.0, 2.0], None);
        let (upper, lower) = envelope_points(&series, 0..2);
        assert_eq!(upper, vec![(0.0, 1.0), (1.0, 2.0)]);
        assert!(lower.is_none());
    }

    #[test]
    fn spread_envelope_draws_both_edges() {
        let series = series(&[0.0, 1.0], &[-1.0, 2.0], &[1.0, 2.0], None);
        let (_, lower) = envelope_points(&series, 0..2);
        assert_eq!(lower, Some(vec![(0.0, -1.0), (1.0, 2.0)]));
        let (upper, _) = envelope_points(&series, 1..2);
        assert_eq!(upper, vec![(1.0, 2.0)]);
    }

    #[test]
    fn x_bounds_widen_single_points() {
        assert_eq!(x_bounds(Vec::<&[(f64, f64)]>::new()), None);
        assert_eq!(x_bounds([&[(2.0, 0.0)][..]]), Some([1.5, 2.5]));
        assert_eq!(
            x_bounds([&[(0.0, 0.0)][..], &[(4.0, 1.0)][..]]),
            Some([0.0, 4.0])
        );
    }

    #[test]
    fn empty_buckets_leave_a_gap() {
        // Columns at both ends with eight empty buckets between them.
        let isolated = render(&[0.0, 10.0], Some(1.0));
        assert!(isolated <= 4, "{} cells drawn across the gap", isolated);

        // The same columns as raw samples are joined.
        let joined = render(&[0.0, 10.0], None);
        assert!(joined > 20, "only {} cells drawn", joined);
    }
}
