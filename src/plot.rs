//! Chart assembly: records in, one SVG document out.
//!
//! Assembly happens in two steps. [`plan`] resolves every series, error
//! margin, color and axis range into a [`ChartPlan`], failing before anything
//! is drawn. [`render`] turns a plan into SVG text without further checks
//! beyond what the drawing backend reports.

use std::{error::Error, io::Write, ops::Range};

use plotters::{coord::Shift, prelude::*, series::DashedLineSeries};
use tracing::{debug, info};

use crate::{
    error::PlotError,
    record::MeasurementRecord,
    series::{self, Grouping, Measure, Point, Series},
    style::{self, LineDash, Marker, Rank, Rgb, StyleToken, VisualEncoding},
};

/// Figure size, in inches, that `scale` multiplies.
pub const BASE_SIZE: (f64, f64) = (6.4, 4.8);
pub const PIXELS_PER_INCH: f64 = 100.;
pub const DEFAULT_SCALE: f64 = 1.5;
/// Scale of line charts drawn with the built-in style table.
pub const BUILTIN_SCALE: f64 = 2.0;
/// Input length compared by the bar chart.
pub const BAR_LENGTH: u64 = 3000;

const ALPHA: f64 = 0.5;
const CAP: i32 = 3;
const BAR_HALF_HEIGHT: f64 = 0.4;
const PADDING: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartKind {
    /// One horizontal bar per row measured at `length`.
    Bar { length: u64 },
    /// One line per series; `sort_x` orders each line's points by `x` first.
    Line { sort_x: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct ChartConfig<'a> {
    pub kind: ChartKind,
    pub encoding: VisualEncoding<'a>,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Titles {
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
}

const BAR_TITLES: Titles = Titles {
    title: "HTML Escape Function Call Times",
    x_label: "Call Time (μs, lower is better)",
    y_label: "HTML Escape Function",
};

const LINE_TITLES: Titles = Titles {
    title: "String Length vs Call Time (μs)",
    x_label: "String Length",
    y_label: "Call Time (μs)",
};

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub error_margin: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub label: String,
    pub style: StyleToken,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marks {
    /// Bottom bar first.
    Bars(Vec<Bar>),
    /// Legend order.
    Lines(Vec<Line>),
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPlan {
    pub size: (u32, u32),
    pub titles: Titles,
    /// Value axis range for bars, `x` range for lines.
    pub x_range: Range<f64>,
    /// `y` range for lines; for bars, one unit-wide slot per bar.
    pub y_range: Range<f64>,
    pub marks: Marks,
}

pub fn figure_size(scale: f64) -> (u32, u32) {
    let px = |inches: f64| (inches * scale * PIXELS_PER_INCH).round() as u32;
    (px(BASE_SIZE.0), px(BASE_SIZE.1))
}

pub fn plan(records: &[MeasurementRecord], config: &ChartConfig) -> Result<ChartPlan, PlotError> {
    let plan = match config.kind {
        ChartKind::Bar { length } => plan_bars(records, length, config)?,
        ChartKind::Line { sort_x } => plan_lines(records, sort_x, config)?,
    };
    check_finite(&plan)?;
    debug!(size = ?plan.size, kind = ?config.kind, "planned chart");
    Ok(plan)
}

fn plan_bars(
    records: &[MeasurementRecord],
    length: u64,
    config: &ChartConfig,
) -> Result<ChartPlan, PlotError> {
    let admitted = series::admit_length(records, length);
    if admitted.is_empty() {
        return Err(PlotError::Render(format!(
            "no rows with length {} to draw",
            length
        )));
    }
    let groups = series::aggregate(admitted, Grouping::Identity, Measure::SampleMean)?;

    let values: Vec<f64> = groups.values().map(|s| s.points[0].y).collect();
    let colors: Vec<Rgb> = match config.encoding {
        VisualEncoding::Rank => style::rank_all(&values)
            .into_iter()
            .map(Rank::color)
            .collect(),
        VisualEncoding::Table(table) => groups
            .values()
            .map(|s| -> Result<Rgb, PlotError> { Ok(table.lookup(&s.series_id)?.token.color) })
            .collect::<Result<Vec<_>, PlotError>>()?,
    };

    let bars: Vec<Bar> = groups
        .into_iter()
        .zip(colors)
        .map(|((_, series), color)| Bar {
            value: series.points[0].y,
            error_margin: series.points[0].error_margin,
            label: series.series_id,
            color,
        })
        .collect();

    let low = bars
        .iter()
        .map(|b| b.value - b.error_margin)
        .fold(0., f64::min);
    let high = bars
        .iter()
        .map(|b| b.value + b.error_margin)
        .fold(0., f64::max);

    Ok(ChartPlan {
        size: figure_size(config.scale),
        titles: BAR_TITLES,
        x_range: padded(low, high),
        y_range: -0.5..(bars.len() as f64 - 0.5),
        marks: Marks::Bars(bars),
    })
}

fn plan_lines(
    records: &[MeasurementRecord],
    sort_x: bool,
    config: &ChartConfig,
) -> Result<ChartPlan, PlotError> {
    let mut groups: Vec<Series> = series::aggregate(records, Grouping::SeriesId, Measure::Mean)?
        .into_iter()
        .map(|(_, series)| series)
        .collect();
    if groups.is_empty() {
        return Err(PlotError::Render("no rows to draw".to_string()));
    }
    if sort_x {
        groups.iter_mut().for_each(Series::sort_by_x);
    }

    let mut lines = Vec::with_capacity(groups.len());
    match config.encoding {
        VisualEncoding::Table(table) => {
            for series in groups {
                let style = table.lookup(&series.series_id)?;
                lines.push(Line {
                    label: style.name.clone(),
                    style: style.token,
                    points: series.points,
                });
            }
        }
        VisualEncoding::Rank => {
            let means: Vec<f64> = groups
                .iter()
                .map(|s| s.points.iter().map(|p| p.y).sum::<f64>() / s.points.len() as f64)
                .collect();
            for (series, rank) in groups.into_iter().zip(style::rank_all(&means)) {
                lines.push(Line {
                    label: series.series_id,
                    style: StyleToken {
                        color: rank.color(),
                        marker: Some(Marker::Point),
                        line: Some(LineDash::Solid),
                    },
                    points: series.points,
                });
            }
        }
    }

    let points = || lines.iter().flat_map(|l| l.points.iter());
    let x_low = points().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let x_high = points().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let y_low = points()
        .map(|p| p.y - p.error_margin)
        .fold(f64::INFINITY, f64::min);
    let y_high = points()
        .map(|p| p.y + p.error_margin)
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(ChartPlan {
        size: figure_size(config.scale),
        titles: LINE_TITLES,
        x_range: padded(x_low, x_high),
        y_range: padded(y_low, y_high),
        marks: Marks::Lines(lines),
    })
}

/// Widens `low..high` by a margin on each side; a point range becomes ±1.
fn padded(low: f64, high: f64) -> Range<f64> {
    let span = high - low;
    if span > 0. {
        (low - span * PADDING)..(high + span * PADDING)
    } else {
        (low - 1.)..(high + 1.)
    }
}

fn check_finite(plan: &ChartPlan) -> Result<(), PlotError> {
    let marks_finite = match &plan.marks {
        Marks::Bars(bars) => bars
            .iter()
            .all(|b| b.value.is_finite() && b.error_margin.is_finite()),
        Marks::Lines(lines) => lines
            .iter()
            .flat_map(|l| l.points.iter())
            .all(|p| p.x.is_finite() && p.y.is_finite() && p.error_margin.is_finite()),
    };
    let ranges_finite = [
        plan.x_range.start,
        plan.x_range.end,
        plan.y_range.start,
        plan.y_range.end,
    ]
    .iter()
    .all(|v| v.is_finite());

    if marks_finite && ranges_finite {
        Ok(())
    } else {
        Err(PlotError::Render("non-finite value in chart data".to_string()))
    }
}

fn rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

/// Renders a plan into an SVG document.
pub fn render(plan: &ChartPlan) -> Result<String, PlotError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, plan.size).into_drawing_area();
        let drawn = match &plan.marks {
            Marks::Bars(bars) => draw_bars(&root, plan, bars),
            Marks::Lines(lines) => draw_lines(&root, plan, lines),
        };
        drawn
            .and_then(|_| root.present().map_err(Into::into))
            .map_err(|e| PlotError::Render(e.to_string()))?;
    }
    Ok(svg)
}

fn draw_bars(
    root: &DrawingArea<SVGBackend, Shift>,
    plan: &ChartPlan,
    bars: &[Bar],
) -> Result<(), Box<dyn Error>> {
    root.fill(&WHITE)?;

    let longest = bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
    let mut chart = ChartBuilder::on(root)
        .caption(plan.titles.title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(40 + 8 * longest as u32)
        .build_cartesian_2d(plan.x_range.clone(), plan.y_range.clone())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(bars.len())
        .y_label_formatter(&|y| {
            let slot = y.round();
            if slot < 0. || (y - slot).abs() > 1e-6 {
                return String::new();
            }
            bars.get(slot as usize)
                .map(|b| b.label.clone())
                .unwrap_or_default()
        })
        .x_desc(plan.titles.x_label)
        .y_desc(plan.titles.y_label)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
        let y = i as f64;
        Rectangle::new(
            [(0., y - BAR_HALF_HEIGHT), (bar.value, y + BAR_HALF_HEIGHT)],
            rgb(bar.color).mix(ALPHA).filled(),
        )
    }))?;

    let whiskers: Vec<(f64, f64, f64)> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            (
                bar.value - bar.error_margin,
                bar.value + bar.error_margin,
                i as f64,
            )
        })
        .collect();
    chart.draw_series(
        whiskers
            .iter()
            .map(|&(lo, hi, y)| PathElement::new(vec![(lo, y), (hi, y)], BLACK.stroke_width(1))),
    )?;
    chart.draw_series(
        whiskers
            .iter()
            .flat_map(|&(lo, hi, y)| vec![(lo, y), (hi, y)])
            .map(|end| {
                EmptyElement::at(end)
                    + PathElement::new(vec![(0, -CAP), (0, CAP)], BLACK.stroke_width(1))
            }),
    )?;

    Ok(())
}

fn draw_lines(
    root: &DrawingArea<SVGBackend, Shift>,
    plan: &ChartPlan,
    lines: &[Line],
) -> Result<(), Box<dyn Error>> {
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(root)
        .caption(plan.titles.title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(plan.x_range.clone(), plan.y_range.clone())?;

    chart
        .configure_mesh()
        .x_desc(plan.titles.x_label)
        .y_desc(plan.titles.y_label)
        .draw()?;

    for line in lines {
        let color = rgb(line.style.color);
        let xy: Vec<(f64, f64)> = line.points.iter().map(|p| (p.x, p.y)).collect();

        let stroke = color.stroke_width(2);
        match line.style.line {
            Some(LineDash::Solid) => {
                chart.draw_series(LineSeries::new(xy.clone(), stroke))?;
            }
            Some(LineDash::Dashed) => {
                chart.draw_series(DashedLineSeries::new(xy.clone(), 10, 5, stroke))?;
            }
            Some(LineDash::DashDot) => {
                chart.draw_series(DashedLineSeries::new(xy.clone(), 6, 4, stroke))?;
            }
            Some(LineDash::Dotted) => {
                chart.draw_series(DashedLineSeries::new(xy.clone(), 2, 3, stroke))?;
            }
            None => {}
        }

        let bar_style = color.mix(ALPHA).stroke_width(1);
        chart.draw_series(line.points.iter().map(|p| {
            PathElement::new(
                vec![(p.x, p.y - p.error_margin), (p.x, p.y + p.error_margin)],
                bar_style,
            )
        }))?;
        chart.draw_series(
            line.points
                .iter()
                .flat_map(|p| vec![(p.x, p.y - p.error_margin), (p.x, p.y + p.error_margin)])
                .map(|end| EmptyElement::at(end) + PathElement::new(vec![(-CAP, 0), (CAP, 0)], bar_style)),
        )?;

        let points = xy.iter().copied();
        match line.style.marker {
            Some(Marker::Point) => {
                chart.draw_series(points.map(|c| Circle::new(c, 3, color.filled())))?;
            }
            Some(Marker::Pixel) => {
                chart.draw_series(points.map(|c| Circle::new(c, 1, color.filled())))?;
            }
            Some(Marker::Circle) => {
                chart.draw_series(points.map(|c| Circle::new(c, 5, color.filled())))?;
            }
            Some(Marker::Cross) => {
                chart.draw_series(points.map(|c| Cross::new(c, 4, color.stroke_width(2))))?;
            }
            Some(Marker::Plus) => {
                chart.draw_series(points.map(|c| {
                    EmptyElement::at(c)
                        + PathElement::new(vec![(-4, 0), (4, 0)], color.stroke_width(2))
                        + PathElement::new(vec![(0, -4), (0, 4)], color.stroke_width(2))
                }))?;
            }
            Some(Marker::Triangle) => {
                chart.draw_series(points.map(|c| TriangleMarker::new(c, 5, color.filled())))?;
            }
            None => {}
        }

        chart
            .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())?
            .label(line.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

/// Plans, renders and writes one chart. Nothing reaches `sink` unless the
/// whole chart rendered.
pub fn draw<W: Write>(
    records: &[MeasurementRecord],
    config: &ChartConfig,
    mut sink: W,
) -> Result<(), PlotError> {
    let plan = plan(records, config)?;
    let svg = render(&plan)?;
    sink.write_all(svg.as_bytes())
        .and_then(|_| sink.flush())
        .map_err(|e| PlotError::Render(format!("unable to write image: {}", e)))?;
    info!(bytes = svg.len(), kind = ?config.kind, "wrote chart");
    Ok(())
}
