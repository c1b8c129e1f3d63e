//! PNG charts of the index.
//!
//! - trend: EEI by year for one location, line with markers inside a shaded
//!   band of fixed half width
//! - scatter: salinity against biodiversity, points colored by EEI on the
//!   viridis scale with a color bar labelled "EEI"

use std::path::Path;

use plotters::prelude::*;

use crate::config::ReportConfig;
use crate::dataset::display_name;
use crate::model::{EeiError, EeiRecord};

pub const SCATTER_TITLE: &str = "Salinity vs. Biodiversity vs. EEI";

const COLORBAR_STEPS: usize = 100;

type ChartResult = Result<(), Box<dyn std::error::Error>>;

fn chart_error(path: &Path, err: Box<dyn std::error::Error>) -> EeiError {
    EeiError::Chart(format!("{}: {}", path.display(), err))
}

/// `(lo, hi)` widened by `pad` on both sides, and by 1 when empty.
fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let margin = (hi - lo) * pad;
    (lo - margin, hi + margin)
}

/// Viridis color for `value` within `[lo, hi]`; the midpoint color when the
/// range is degenerate.
pub fn viridis(value: f64, lo: f64, hi: f64) -> RGBColor {
    if hi - lo <= f64::EPSILON || !value.is_finite() {
        ViridisRGB::get_color(0.5)
    } else {
        ViridisRGB::get_color_normalized(value.clamp(lo, hi), lo, hi)
    }
}

/// `(year, eei)` for rows at `location`, ordered by year.
pub fn trend_points(records: &[EeiRecord], location: &str) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = records
        .iter()
        .filter(|r| r.location == location)
        .map(|r| (r.year as f64, r.eei))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

/// Trend chart title naming the location and the plotted year span.
pub fn trend_title(location: &str, points: &[(f64, f64)]) -> String {
    let name = display_name(location);
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if first.0 != last.0 => {
            format!("EEI Trend for {} ({:.0}–{:.0})", name, first.0, last.0)
        }
        (Some(only), _) => format!("EEI Trend for {} ({:.0})", name, only.0),
        _ => format!("EEI Trend for {}", name),
    }
}

// ---------------------------------------------------------------------------
// Trend chart
// ---------------------------------------------------------------------------

/// Draws the EEI trend for `report.trend_location` to `path`.
pub fn draw_trend_chart(records: &[EeiRecord], report: &ReportConfig, path: &Path) -> Result<(), EeiError> {
    let points = trend_points(records, &report.trend_location);
    if points.is_empty() {
        return Err(EeiError::Chart(format!(
            "no rows for trend location '{}'",
            report.trend_location
        )));
    }
    render_trend(&points, report, path).map_err(|e| chart_error(path, e))
}

fn render_trend(points: &[(f64, f64)], report: &ReportConfig, path: &Path) -> ChartResult {
    let band = report.band_half_width;
    let title = trend_title(&report.trend_location, points);
    let root = BitMapBackend::new(path, (report.width_px, report.height_px)).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = padded_range(points.iter().map(|p| p.0), 0.05);
    let (y_lo, y_hi) = padded_range(
        points.iter().flat_map(|p| [p.1 - band, p.1 + band]),
        0.1,
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 64))
        .margin(40)
        .x_label_area_size(120)
        .y_label_area_size(140)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("EEI")
        .x_label_formatter(&|x| format!("{:.0}", x))
        .label_style(("sans-serif", 36))
        .axis_desc_style(("sans-serif", 44))
        .draw()?;

    let band_outline: Vec<(f64, f64)> = points
        .iter()
        .map(|&(x, y)| (x, y + band))
        .chain(points.iter().rev().map(|&(x, y)| (x, y - band)))
        .collect();
    chart.draw_series(std::iter::once(Polygon::new(band_outline, BLUE.mix(0.2).filled())))?;

    chart.draw_series(LineSeries::new(points.to_vec(), BLUE.stroke_width(6)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 14, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Scatter chart
// ---------------------------------------------------------------------------

/// Draws salinity against biodiversity colored by EEI to `path`.
pub fn draw_scatter_chart(records: &[EeiRecord], report: &ReportConfig, path: &Path) -> Result<(), EeiError> {
    if records.is_empty() {
        return Err(EeiError::Chart("no rows to plot".to_string()));
    }
    render_scatter(records, report, path).map_err(|e| chart_error(path, e))
}

fn render_scatter(records: &[EeiRecord], report: &ReportConfig, path: &Path) -> ChartResult {
    let root = BitMapBackend::new(path, (report.width_px, report.height_px)).into_drawing_area();
    root.fill(&WHITE)?;

    let bar_width = report.width_px / 10;
    let (plot_area, bar_area) = root.split_horizontally(report.width_px - bar_width);

    let (eei_lo, eei_hi) = records
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r.eei), hi.max(r.eei)));

    let (x_lo, x_hi) = padded_range(records.iter().map(|r| r.salinity), 0.1);
    let (y_lo, y_hi) = padded_range(records.iter().map(|r| r.biodiversity), 0.1);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(SCATTER_TITLE, ("sans-serif", 64))
        .margin(40)
        .x_label_area_size(120)
        .y_label_area_size(140)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Salinity (g/L)")
        .y_desc("Biodiversity (Shannon Index)")
        .label_style(("sans-serif", 36))
        .axis_desc_style(("sans-serif", 44))
        .draw()?;

    chart.draw_series(records.iter().map(|r| {
        Circle::new(
            (r.salinity, r.biodiversity),
            24,
            viridis(r.eei, eei_lo, eei_hi).filled(),
        )
    }))?;

    draw_colorbar(&bar_area, eei_lo, eei_hi)?;

    root.present()?;
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(area: &DrawingArea<DB, plotters::coord::Shift>, lo: f64, hi: f64) -> ChartResult
where
    DB::ErrorType: 'static,
{
    let (bar_lo, bar_hi) = if hi - lo <= f64::EPSILON { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let (width, height) = area.dim_in_pixel();

    let mut bar = ChartBuilder::on(area)
        .margin_top(height / 12)
        .margin_bottom(height / 10)
        .margin_right(width / 15)
        .y_label_area_size(width / 2)
        .build_cartesian_2d(0.0..1.0, bar_lo..bar_hi)?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc("EEI")
        .label_style(("sans-serif", 32))
        .axis_desc_style(("sans-serif", 44))
        .draw()?;

    let step = (bar_hi - bar_lo) / COLORBAR_STEPS as f64;
    bar.draw_series((0..COLORBAR_STEPS).map(|i| {
        let y0 = bar_lo + step * i as f64;
        Rectangle::new([(0.0, y0), (1.0, y0 + step)], viridis(y0 + step / 2.0, lo, hi).filled())
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::index_stage;

    #[test]
    fn test_trend_points_filter_and_sort() {
        let records = index_stage(&PipelineConfig::default()).unwrap().records;
        let points = trend_points(&records, "Urmia");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, 1990.0);
        assert_eq!(points[1].0, 2024.0);
        assert!(trend_points(&records, "Nowhere").is_empty());
    }

    #[test]
    fn test_trend_title_follows_location_and_years() {
        let records = index_stage(&PipelineConfig::default()).unwrap().records;
        let urmia = trend_points(&records, "Urmia");
        assert_eq!(trend_title("Urmia", &urmia), "EEI Trend for Lake Urmia (1990–2024)");

        let aral = trend_points(&records, "Aral Sea");
        assert_eq!(trend_title("Aral Sea", &aral), "EEI Trend for Aral Sea (2020)");

        let span = [(2001.0, 5.0), (2015.0, 4.0)];
        assert_eq!(trend_title("Aral Sea", &span), "EEI Trend for Aral Sea (2001–2015)");
        assert_eq!(trend_title("Pantanal", &[]), "EEI Trend for Pantanal");
    }

    #[test]
    fn test_padded_range_handles_single_value() {
        assert_eq!(padded_range([5.0].into_iter(), 0.1), (4.0, 6.0));
        assert_eq!(padded_range(std::iter::empty(), 0.1), (0.0, 1.0));
        let (lo, hi) = padded_range([0.0, 10.0].into_iter(), 0.1);
        assert!((lo + 1.0).abs() < 1e-12 && (hi - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_viridis_ends_and_degenerate_range() {
        assert_eq!(viridis(0.0, 0.0, 1.0), ViridisRGB::get_color(0.0));
        assert_eq!(viridis(1.0, 0.0, 1.0), ViridisRGB::get_color(1.0));
        assert_eq!(viridis(3.0, 3.0, 3.0), ViridisRGB::get_color(0.5));
    }

    #[test]
    fn test_trend_without_rows_is_a_chart_error() {
        let report = ReportConfig {
            trend_location: "Nowhere".to_string(),
            ..ReportConfig::default()
        };
        let path = Path::new("unused.png");
        assert!(matches!(draw_trend_chart(&[], &report, path), Err(EeiError::Chart(_))));
    }

    #[test]
    #[ignore] // requires system fonts
    fn test_charts_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let records = index_stage(&PipelineConfig::default()).unwrap().records;
        let report = ReportConfig {
            width_px: 600,
            height_px: 360,
            ..ReportConfig::default()
        };
        let trend = dir.path().join("trend.png");
        let scatter = dir.path().join("scatter.png");
        draw_trend_chart(&records, &report, &trend).unwrap();
        draw_scatter_chart(&records, &report, &scatter).unwrap();
        assert!(std::fs::metadata(&trend).unwrap().len() > 0);
        assert!(std::fs::metadata(&scatter).unwrap().len() > 0);
    }
}
