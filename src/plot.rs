use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::coord::{cartesian::Cartesian2d, types::RangedCoordf64, Shift};
use plotters::prelude::IntoLogRange;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use tracing::{info, warn};

use crate::models::AlignedTable;
use crate::offsets::HeatmapView;

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

#[derive(Debug, Clone)]
pub struct HistogramStyle {
    pub bins: usize,
    pub alpha: f64,
    pub log_scale: bool,
    pub title: String,
    pub x_label: String,
}

impl Default for HistogramStyle {
    fn default() -> Self {
        Self {
            bins: 45,
            alpha: 0.5,
            log_scale: false,
            title: String::new(),
            x_label: String::new(),
        }
    }
}

/// One plotted sample: the crossing days of every unit that reached N.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSeries {
    pub label: String,
    pub days: Vec<usize>,
}

impl HistogramSeries {
    pub fn from_aligned(label: impl Into<String>, aligned: &AlignedTable) -> Self {
        Self {
            label: label.into(),
            days: aligned.crossing_days(),
        }
    }
}

pub fn overlay_file_name(threshold: i64, labels: &[&str]) -> PathBuf {
    PathBuf::from(format!("hist_N{}_{}.png", threshold, labels.join("_")))
}

pub fn heatmap_path(csv_path: &Path) -> PathBuf {
    let text = csv_path.to_string_lossy();
    match text.strip_suffix(".csv") {
        Some(stem) => PathBuf::from(format!("{stem}.png")),
        None => PathBuf::from(format!("{text}.png")),
    }
}

/// Counts per bin over `bins` equal-width bins spanning `[lo, hi]`; the last
/// bin is closed on the right.
pub fn bin_counts(days: &[usize], lo: f64, hi: f64, bins: usize) -> Vec<usize> {
    let bins = bins.max(1);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
    let mut counts = vec![0; bins];
    for &day in days {
        let slot = ((day as f64 - lo) / width).floor();
        if slot < 0.0 {
            continue;
        }
        counts[(slot as usize).min(bins - 1)] += 1;
    }
    counts
}

/// Histogram of a single aligned table. Returns `None` when no unit crossed.
pub fn histogram(
    aligned: &AlignedTable,
    style: &HistogramStyle,
    path: &Path,
) -> Result<Option<PathBuf>> {
    let series = [HistogramSeries::from_aligned(aligned.source.label(), aligned)];
    draw_histograms(&series, style, path)
}

/// Several samples drawn over a shared set of bins, written to
/// `out_dir/hist_N<threshold>_<labels>.png`.
pub fn overlay_histogram(
    threshold: i64,
    series: &[HistogramSeries],
    style: &HistogramStyle,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    let path = out_dir.join(overlay_file_name(threshold, &labels));
    draw_histograms(series, style, &path)
}

fn draw_histograms(
    series: &[HistogramSeries],
    style: &HistogramStyle,
    path: &Path,
) -> Result<Option<PathBuf>> {
    let plotted: Vec<&HistogramSeries> = series.iter().filter(|s| !s.days.is_empty()).collect();
    if plotted.is_empty() {
        warn!("no data to plot for {}", path.display());
        return Ok(None);
    }
    for skipped in series.iter().filter(|s| s.days.is_empty()) {
        warn!(
            "{}: no unit crossed the threshold, left out of the plot",
            skipped.label
        );
    }

    let root = BitMapBackend::new(path, (1500, 1000)).into_drawing_area();
    draw_histogram_chart(&root, &plotted, style)?;
    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("histogram written to {}", path.display());
    Ok(Some(path.to_path_buf()))
}

fn draw_histogram_chart<DB>(
    root: &DrawingArea<DB, Shift>,
    plotted: &[&HistogramSeries],
    style: &HistogramStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let days = || plotted.iter().flat_map(|s| s.days.iter()).copied();
    let lo = days().min().unwrap_or(0) as f64;
    let hi = days().max().unwrap_or(0) as f64;
    let bins = style.bins.max(1);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

    let counted: Vec<(&HistogramSeries, Vec<usize>)> = plotted
        .iter()
        .map(|s| (*s, bin_counts(&s.days, lo, hi, bins)))
        .collect();
    let peak = counted
        .iter()
        .flat_map(|(_, counts)| counts.iter())
        .copied()
        .max()
        .unwrap_or(1)
        .max(1) as f64;

    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 60);
    if !style.title.is_empty() {
        builder.caption(
            &style.title,
            FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Normal),
        );
    }
    let x_range = lo..(lo + width * bins as f64);
    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);

    if style.log_scale {
        // Bars start below one so a single-unit bin keeps a visible height.
        let floor = 0.5;
        let mut chart = builder.build_cartesian_2d(x_range, (floor..peak * 2.0).log_scale())?;
        chart
            .configure_mesh()
            .x_desc(style.x_label.as_str())
            .y_desc("Frequency")
            .axis_desc_style(axis_font)
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()?;
        draw_bars(&mut chart, &counted, lo, width, floor, style.alpha)
    } else {
        let mut chart = builder.build_cartesian_2d(x_range, 0.0..peak * 1.1)?;
        chart
            .configure_mesh()
            .x_desc(style.x_label.as_str())
            .y_desc("Frequency")
            .axis_desc_style(axis_font)
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()?;
        draw_bars(&mut chart, &counted, lo, width, 0.0, style.alpha)
    }
}

fn draw_bars<'a, DB, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, Y>>,
    counted: &[(&HistogramSeries, Vec<usize>)],
    lo: f64,
    width: f64,
    floor: f64,
    alpha: f64,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    Y: Ranged<ValueType = f64>,
{
    let alpha = alpha.clamp(0.0, 1.0);
    let bars_of = |counts: &[usize]| -> Vec<(f64, f64)> {
        counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(bin, &count)| (lo + width * bin as f64, count as f64))
            .collect()
    };

    for (index, (series, counts)) in counted.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        let fill = color.mix(alpha).filled();
        let bars = bars_of(counts.as_slice());
        chart
            .draw_series(
                bars.iter()
                    .map(|&(x0, count)| Rectangle::new([(x0, floor), (x0 + width, count)], fill)),
            )?
            .label(series.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 18, y + 6)], fill));
        chart.draw_series(bars.iter().map(|&(x0, count)| {
            Rectangle::new([(x0, floor), (x0 + width, count)], BLACK.stroke_width(1))
        }))?;
    }

    if counted.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font(FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Normal))
            .background_style(&WHITE.mix(0.7))
            .border_style(&BLACK.mix(0.3))
            .draw()?;
    }
    Ok(())
}

fn lerp(from: (u8, u8, u8), to: (u8, u8, u8), t: f64) -> RGBColor {
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Dark orange through white to dark blue across `[lo, hi]`.
pub fn diverging_color(value: f64, lo: f64, hi: f64) -> RGBColor {
    let t = if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    if t < 0.5 {
        lerp((127, 39, 4), (255, 245, 235), t / 0.5)
    } else {
        lerp((247, 251, 255), (8, 48, 107), (t - 0.5) / 0.5)
    }
}

/// Colour-coded offset grid written next to `csv_path`.
pub fn heatmap(view: &HeatmapView, csv_path: &Path) -> Result<Option<PathBuf>> {
    let path = heatmap_path(csv_path);
    let Some((lo, hi)) = view.range().filter(|_| !view.is_empty()) else {
        warn!("no data to plot for {}", path.display());
        return Ok(None);
    };
    draw_heatmap(view, &path, lo as f64, hi as f64)?;
    info!("heatmap written to {}", path.display());
    Ok(Some(path))
}

fn draw_heatmap(view: &HeatmapView, path: &Path, lo: f64, hi: f64) -> Result<()> {
    let rows = view.cells.len();
    let columns = view.column_units.len();

    let root = BitMapBackend::new(path, (1100, 1000)).into_drawing_area();
    root.fill(&WHITE)?;
    let (grid_area, bar_area) = root.split_horizontally(960);

    let mut grid = ChartBuilder::on(&grid_area)
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 40)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..columns as f64, 0.0..rows as f64)?;
    grid.configure_mesh().disable_mesh().draw()?;
    grid.draw_series(view.cells.iter().enumerate().flat_map(|(r, cells)| {
        cells.iter().enumerate().map(move |(c, &value)| {
            Rectangle::new(
                [(c as f64, r as f64), (c as f64 + 1.0, r as f64 + 1.0)],
                diverging_color(value as f64, lo, hi).filled(),
            )
        })
    }))?;

    let steps = 256;
    let mut bar = ChartBuilder::on(&bar_area)
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Right, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..1.0, lo..hi.max(lo + 1.0))?;
    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;
    let span = hi.max(lo + 1.0) - lo;
    bar.draw_series((0..steps).map(|step| {
        let y0 = lo + span * step as f64 / steps as f64;
        let y1 = lo + span * (step + 1) as f64 / steps as f64;
        Rectangle::new([(0.0, y0), (1.0, y1)], diverging_color(y0, lo, hi).filled())
    }))?;

    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
