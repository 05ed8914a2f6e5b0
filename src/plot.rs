//! Laying out flag commands per antenna and time, for plotting.

use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use itertools::Itertools;
use log::{info, warn};
use thiserror::Error;

use crate::{
    record::FlagCommands,
    selection::SelectionKey,
    time::{format_mjd_seconds, TimeSpan},
};

/// Flags spanning at least this long \[seconds\] would squash every other flag
/// on a time axis, so they are set aside.
pub const MAX_PLOTTED_SPAN: f64 = 10000.0;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Error writing flag plot to {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReasonCategory {
    Focus,
    Subreflector,
    OffSource,
    NotInSubarray,
    Other,
}

impl ReasonCategory {
    pub fn from_reason(reason: &str) -> ReasonCategory {
        match reason {
            "FOCUS_ERROR" => ReasonCategory::Focus,
            "SUBREFLECTOR_ERROR" => ReasonCategory::Subreflector,
            "ANTENNA_NOT_ON_SOURCE" => ReasonCategory::OffSource,
            "ANTENNA_NOT_IN_SUBARRAY" => ReasonCategory::NotInSubarray,
            _ => ReasonCategory::Other,
        }
    }

    /// Legend text.
    pub fn label(self) -> &'static str {
        match self {
            ReasonCategory::Focus => "FOCUS",
            ReasonCategory::Subreflector => "SUBREFLECTOR",
            ReasonCategory::OffSource => "OFF SOURCE",
            ReasonCategory::NotInSubarray => "NOT IN SUBARRAY",
            ReasonCategory::Other => "Other",
        }
    }

    pub fn colour(self) -> &'static str {
        match self {
            ReasonCategory::Focus => "red",
            ReasonCategory::Subreflector => "blue",
            ReasonCategory::OffSource => "green",
            ReasonCategory::NotInSubarray => "black",
            ReasonCategory::Other => "orange",
        }
    }

    /// Vertical offset from the antenna's row, so overlapping flags with
    /// different reasons stay visible.
    pub fn offset(self) -> f64 {
        match self {
            ReasonCategory::Focus | ReasonCategory::Other => 0.3,
            ReasonCategory::Subreflector => 0.15,
            ReasonCategory::OffSource => 0.0,
            ReasonCategory::NotInSubarray => -0.15,
        }
    }
}

impl Display for ReasonCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One flag on one antenna. Times are MJD seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSegment {
    pub antenna: String,
    pub start: f64,
    pub end: f64,
    pub category: ReasonCategory,
}

impl PlotSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagPlot {
    /// Sorted antenna names; each gets a row of the plot.
    pub antennas: Vec<String>,

    pub segments: Vec<PlotSegment>,

    /// Segments at least [`MAX_PLOTTED_SPAN`] long.
    pub too_long: Vec<PlotSegment>,

    /// The dataset's time span; flags without a time range cover all of it.
    pub span: TimeSpan,
}

/// Lay out `flag_cmds` for plotting.
pub fn flag_plot(flag_cmds: &FlagCommands, span: &TimeSpan) -> FlagPlot {
    let (segments, too_long): (Vec<_>, Vec<_>) = flag_cmds
        .values()
        .map(|r| {
            let (start, end) = match r.selection.get(SelectionKey::Timerange) {
                Some(_) => r.timerange(),
                None => (span.start, span.end),
            };
            PlotSegment {
                antenna: r
                    .selection
                    .get(SelectionKey::Antenna)
                    .unwrap_or_default()
                    .to_string(),
                start,
                end,
                category: ReasonCategory::from_reason(&r.reason),
            }
        })
        .partition(|s| s.duration() < MAX_PLOTTED_SPAN);

    let antennas = flag_cmds
        .values()
        .map(|r| {
            r.selection
                .get(SelectionKey::Antenna)
                .unwrap_or_default()
                .to_string()
        })
        .sorted()
        .dedup()
        .collect();

    FlagPlot {
        antennas,
        segments,
        too_long,
        span: *span,
    }
}

/// Something that can draw a [`FlagPlot`].
pub trait FlagPlotter {
    fn render(&mut self, plot: &FlagPlot) -> Result<(), PlotError>;
}

/// Renders a plot as text: one line per segment, grouped by antenna. It goes
/// to a file if one is given, otherwise to the log.
#[derive(Debug, Clone, Default)]
pub struct TextPlotter {
    path: Option<PathBuf>,
}

impl TextPlotter {
    pub fn new(path: Option<PathBuf>) -> TextPlotter {
        TextPlotter { path }
    }

    fn lines(plot: &FlagPlot) -> Vec<String> {
        let mut lines = vec![format!(
            "Flags from {} to {}",
            format_mjd_seconds(plot.span.start),
            format_mjd_seconds(plot.span.end)
        )];
        for (row, antenna) in plot.antennas.iter().enumerate() {
            for s in plot.segments.iter().filter(|s| &s.antenna == antenna) {
                lines.push(format!(
                    "{:>8} {:>6.2} {} ~ {} {} ({})",
                    antenna,
                    (row + 1) as f64 + s.category.offset(),
                    format_mjd_seconds(s.start),
                    format_mjd_seconds(s.end),
                    s.category,
                    s.category.colour(),
                ));
            }
        }
        for s in &plot.too_long {
            lines.push(format!(
                "Not plotted: {} flag on {} spans {:.0} s",
                s.category,
                s.antenna,
                s.duration()
            ));
        }
        lines
    }
}

impl FlagPlotter for TextPlotter {
    fn render(&mut self, plot: &FlagPlot) -> Result<(), PlotError> {
        let lines = Self::lines(plot);
        match &self.path {
            None => {
                for l in &lines {
                    info!("{l}");
                }
            }
            Some(path) => {
                let io_err = |source| PlotError::IO {
                    path: path.clone(),
                    source,
                };
                let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
                for l in &lines {
                    writeln!(out, "{l}").map_err(io_err)?;
                }
                out.flush().map_err(io_err)?;
                info!("Wrote flag plot to {}", path.display());
            }
        }
        if !plot.too_long.is_empty() {
            warn!(
                "{} flags are too long to plot alongside the others",
                plot.too_long.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FlagCommandRecord;

    fn online_cmds() -> FlagCommands {
        let t0 = 4.8e9;
        [
            ("ea01", t0, t0 + 60.0, "FOCUS_ERROR"),
            ("ea03", t0 + 10.0, t0 + 20.0, "ANTENNA_NOT_ON_SOURCE"),
            ("ea01", t0, t0 + 20000.0, "SUBREFLECTOR_ERROR"),
            ("ea02", t0 + 5.0, t0 + 6.0, "WIND"),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (ant, start, end, reason))| {
            (
                i,
                FlagCommandRecord::online(i, &i.to_string(), ant, start, end, reason),
            )
        })
        .collect()
    }

    #[test]
    fn test_reason_categories() {
        assert_eq!(
            ReasonCategory::from_reason("ANTENNA_NOT_IN_SUBARRAY"),
            ReasonCategory::NotInSubarray
        );
        assert_eq!(ReasonCategory::from_reason("focus_error"), ReasonCategory::Other);
        assert_eq!(ReasonCategory::from_reason(""), ReasonCategory::Other);
    }

    #[test]
    fn test_flag_plot() {
        let span = TimeSpan::new(4.8e9, 4.8e9 + 3600.0);
        let plot = flag_plot(&online_cmds(), &span);
        assert_eq!(plot.antennas, ["ea01", "ea02", "ea03"]);
        assert_eq!(plot.segments.len(), 3);
        assert_eq!(plot.too_long.len(), 1);
        assert_eq!(plot.too_long[0].category, ReasonCategory::Subreflector);
        assert_eq!(plot.segments[2].category, ReasonCategory::Other);
        assert!((plot.segments[0].duration() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_flag_without_timerange_covers_the_span() {
        let span = TimeSpan::new(100.0, 400.0);
        let cmds: FlagCommands = [(
            0,
            FlagCommandRecord::from_command_line(
                0,
                "antenna=ea05 reason=FOCUS_ERROR",
                &crate::record::RecordDefaults {
                    time: 0.0,
                    interval: 0.0,
                    day_start: 0.0,
                },
            )
            .unwrap(),
        )]
        .into_iter()
        .collect();
        let plot = flag_plot(&cmds, &span);
        assert_eq!(plot.segments[0].start, 100.0);
        assert_eq!(plot.segments[0].end, 400.0);
        assert_eq!(plot.segments[0].category, ReasonCategory::Focus);
    }

    #[test]
    fn test_text_plotter_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.txt");
        let span = TimeSpan::new(4.8e9, 4.8e9 + 3600.0);
        let mut plotter = TextPlotter::new(Some(path.clone()));
        plotter.render(&flag_plot(&online_cmds(), &span)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 5);
        assert!(contents.lines().last().unwrap().starts_with("Not plotted: SUBREFLECTOR flag on ea01"));
    }
}
