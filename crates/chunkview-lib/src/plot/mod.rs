//! Backend-agnostic figures for the chunk on screen.

use crate::error::ConversionError;
use crate::navigation::ChunkView;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    /// Fixed extent; `None` fits the data.
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

const PALETTE: [u32; 6] = [0x1F77B4, 0xFF7F0E, 0x2CA02C, 0xD62728, 0x9467BD, 0x8C564B];
const MARKER_COLOR: u32 = 0xFF0077;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Vertical marker at `x`, drawn across the full plot height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    pub x: f64,
    pub label: String,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
    pub markers: Vec<Marker>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis {
                label: None,
                range: None,
            },
            y: Axis {
                label: None,
                range: None,
            },
            series: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Data extent over all series as `(x_min, x_max, y_min, y_max)`, or
    /// `None` when there are no points.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|series| match series {
            Series::Line(line) => line.points.iter(),
        });
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        let sample = points[start];
        result.push(sample);
    }
    result
}

/// Figure for the visible window of a chunk: one line per selected channel in
/// absolute seconds, plus a marker per annotation in view.
pub fn figure_from_view(view: &ChunkView, max_points: usize) -> Result<Figure, ConversionError> {
    let origin = view.chunk.origin_seconds();
    let window = view.window;
    let mut fig = Figure::new(Some(format!(
        "chunk {} ({:.2}s to {:.2}s)",
        view.chunk_index, view.absolute_window.start, view.absolute_window.end
    )));
    fig.x = Axis {
        label: Some("time (s)".into()),
        range: Some([view.absolute_window.start, view.absolute_window.end]),
    };
    for (idx, trace) in view.traces()?.into_iter().enumerate() {
        let fs = trace.series.fs;
        let points: Vec<[f64; 2]> = trace
            .series
            .data
            .iter()
            .enumerate()
            .map(|(i, value)| (i as f64 / fs, *value))
            .filter(|(t, _)| *t >= window.start() && *t <= window.end())
            .map(|(t, value)| [origin + t, value])
            .collect();
        fig.add_series(Series::Line(LineSeries {
            name: trace.label,
            points: decimate_points(&points, max_points),
            style: Style {
                width: 1.4,
                color: Color(PALETTE[idx % PALETTE.len()]),
            },
        }));
    }
    fig.markers = view
        .annotations
        .iter()
        .map(|annotation| (annotation, annotation.seconds_into(&view.chunk)))
        .filter(|(_, seconds)| window.contains(*seconds))
        .map(|(annotation, seconds)| Marker {
            x: origin + seconds,
            label: annotation.text.clone(),
            color: Color(MARKER_COLOR),
        })
        .collect();
    Ok(fig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavigatorConfig;
    use crate::navigation::{NavCommand, NavigationController, Outcome};
    use crate::signal::Recording;
    use crate::source::FetchResponse;

    #[test]
    fn decimation_keeps_bucket_heads() {
        let points: Vec<[f64; 2]> = (0..100).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 10);
        assert_eq!(out.len(), 10);
        assert_eq!(out[1][0], 10.0);
        assert_eq!(decimate_points(&points[..5], 10).len(), 5);
    }

    #[test]
    fn view_figure_clips_to_window() {
        let recording = Recording::new("mem", vec!["a".into(), "b".into()], 10.0, 300).unwrap();
        let mut nav = NavigationController::new(NavigatorConfig::default());
        let Outcome::Fetch(ticket) = nav.open_file(recording, Vec::new(), None) else {
            panic!("expected a fetch");
        };
        let response = FetchResponse {
            data: vec![(0..100).map(f64::from).collect(), vec![1.0; 100]],
            channel_labels: vec!["a".into(), "b".into()],
            sampling_frequency: 10.0,
            chunk_size: 100,
            chunk_start: 0,
            total_samples: 300,
            annotations: None,
        };
        nav.complete_fetch(ticket.token, Ok(response));
        nav.add_annotation(25, None, "blink", None);
        nav.add_annotation(80, None, "outside", None);
        nav.handle(NavCommand::SetWindow {
            start: 2.0,
            end: 4.0,
        });
        let view = nav.snapshot().view.unwrap();
        let fig = figure_from_view(&view, 1000).unwrap();
        assert_eq!(fig.series.len(), 2);
        let Series::Line(first) = &fig.series[0];
        assert_eq!(first.style.width, 1.4);
        let (x0, x1, y0, y1) = fig.bounds().unwrap();
        assert!((x0 - 2.0).abs() < 1e-9 && (x1 - 4.0).abs() < 1e-9);
        assert!((y0 - 1.0).abs() < 1e-9 && (y1 - 40.0).abs() < 1e-9);
        assert_eq!(fig.markers.len(), 1);
        assert_eq!(fig.markers[0].label, "blink");
        assert_eq!(fig.x.range, Some([2.0, 4.0]));
    }
}
