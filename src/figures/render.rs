//! Bitmap rendering and CSV dumps of the figure data.

use std::error::Error;
use std::io::Write;
use std::path::Path;

use plotters::prelude::*;

use super::comparison::{QuartileGroup, RunComparison, SurfaceBoxplot};
use super::layers::{LayerDistribution, LayerGroup};
use super::modules::BasinIceFigure;
use crate::era::{EraStats, EraTable};
use crate::error::Result;
use crate::stats::BoxStats;
use crate::table::TimeSeriesTable;

type DrawResult = std::result::Result<(), Box<dyn Error>>;

const PALETTE: [RGBColor; 7] = [
    RGBColor(0x00, 0x72, 0xB2),
    RGBColor(0xE6, 0x9F, 0x00),
    RGBColor(0x00, 0x9E, 0x73),
    RGBColor(0xD5, 0x5E, 0x00),
    RGBColor(0xF0, 0xE4, 0x42),
    RGBColor(0xCC, 0x79, 0xA7),
    RGBColor(0x55, 0x55, 0x55),
];

fn color(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn stamp<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    version: &str,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    if !version.is_empty() {
        area.draw(&Text::new(
            format!("moonpies v{version}"),
            (8, 4),
            ("sans-serif", 13).into_font().color(&BLACK.mix(0.6)),
        ))?;
    }
    Ok(())
}

pub(super) fn write_era_csv<W: Write>(writer: W, stats: &EraStats) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["era".to_string(), "statistic".to_string()];
    header.extend(stats.mean.columns.iter().map(|c| c.label().to_string()));
    wtr.write_record(&header)?;
    let tables: [(&str, &EraTable); 3] = [
        ("mean", &stats.mean),
        ("min", &stats.min),
        ("max", &stats.max),
    ];
    for (row, label) in stats.mean.labels.iter().enumerate() {
        for (name, table) in tables {
            let mut record = vec![label.clone(), name.to_string()];
            record.extend(table.values[row].iter().map(|v| opt(*v)));
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Grouped bars of the era means with min/max whiskers. Loss depths are
/// drawn translucent.
pub(super) fn era_bars(path: &Path, stats: &EraStats, version: &str) -> DrawResult {
    const FLOOR: f64 = 1e-4;
    let n_eras = stats.mean.labels.len();
    let n_cols = stats.mean.columns.len().max(1);
    let width = 0.8 / n_cols as f64;

    let root = BitMapBackend::new(path, (1500, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Ice delivery and loss by module", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(20)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n_eras as f64 - 0.5), (FLOOR..1e2f64).log_scale())?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_desc("Ice deposited per km² per timestep [m]")
        .draw()?;

    for (j, column) in stats.mean.columns.iter().enumerate() {
        let c = color(j);
        let fill = if column.is_loss() {
            c.mix(0.3).filled()
        } else {
            c.filled()
        };
        let bars = (0..n_eras).filter_map(|i| {
            let v = stats.mean.values[i][j]?;
            let x0 = i as f64 - 0.4 + j as f64 * width;
            (v > FLOOR).then(|| Rectangle::new([(x0, FLOOR), (x0 + width, v)], fill))
        });
        chart
            .draw_series(bars)?
            .label(column.label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], c.filled()));

        let whiskers = (0..n_eras).filter_map(|i| {
            let lo = stats.min.values[i][j]?.max(FLOOR);
            let hi = stats.max.values[i][j]?;
            let xc = i as f64 - 0.4 + (j as f64 + 0.5) * width;
            (hi > FLOOR).then(|| PathElement::new(vec![(xc, lo), (xc, hi)], BLACK))
        });
        chart.draw_series(whiskers)?;
    }
    for i in 0..n_eras.saturating_sub(1) {
        let x = i as f64 + 0.5;
        chart.draw_series(std::iter::once(PathElement::new(vec![(x, FLOOR), (x, 1e2)], BLACK)))?;
    }
    chart.draw_series(stats.mean.labels.iter().enumerate().map(|(i, label)| {
        Text::new(label.clone(), (i as f64 - 0.1, 2.0 * FLOOR), ("sans-serif", 18))
    }))?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    stamp(&root, version)?;
    root.present()?;
    Ok(())
}

fn time_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    table: &TimeSeriesTable,
    y_range: (f64, f64),
    y_desc: &str,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let (lo, hi) = y_range;
    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..4.25f64, (lo..hi).log_scale())?;
    chart
        .configure_mesh()
        .x_desc("Time [Ga ago]")
        .y_desc(y_desc)
        .draw()?;

    let ga: Vec<f64> = table.time().iter().map(|t| t / 1e9).collect();
    for (j, (column, values)) in table.columns().enumerate() {
        let c = color(j);
        let points: Vec<(f64, f64)> = ga
            .iter()
            .zip(values)
            .map(|(&x, &v)| (x, v.clamp(lo, hi)))
            .collect();
        if column.is_loss() {
            chart
                .draw_series(AreaSeries::new(points, lo, c.mix(0.15)))?
                .label(format!("Max {}", column.label()))
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 12, y + 5)], c.mix(0.3).filled())
                });
        } else {
            chart
                .draw_series(LineSeries::new(points, c.stroke_width(2)))?
                .label(column.label())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c));
        }
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

pub(super) fn module_time(
    path: &Path,
    binned: &TimeSeriesTable,
    cumulative: &TimeSeriesTable,
    version: &str,
) -> DrawResult {
    let root = BitMapBackend::new(path, (1700, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));
    time_panel(&panels[0], binned, (1e-7, 3e2), "Ice deposited per km² per timestep [m]")?;
    time_panel(&panels[1], cumulative, (1e-3, 1e3), "Cumulative ice deposited per km² [m]")?;
    stamp(&root, version)?;
    root.present()?;
    Ok(())
}

pub(super) fn write_basin_csv<W: Write>(writer: W, figure: &BasinIceFigure) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["time".to_string()];
    for s in &figure.series {
        header.push(format!("{} mean", s.class));
        header.push(format!("{} p99.7", s.class));
    }
    wtr.write_record(&header)?;
    for (i, t) in figure.time.iter().enumerate() {
        let mut record = vec![t.to_string()];
        for s in &figure.series {
            record.push(s.mean[i].to_string());
            record.push(s.p99_7[i].to_string());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub(super) fn basin_lines(
    path: &Path,
    figure: &BasinIceFigure,
    n_runs: usize,
    version: &str,
) -> DrawResult {
    const FLOOR: f64 = 0.1;
    let y_max = figure
        .series
        .iter()
        .flat_map(|s| s.per_seed.iter().flatten().chain(&s.p99_7))
        .fold(1.0f64, |acc, &v| if v.is_finite() { acc.max(v) } else { acc });

    let root = BitMapBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Ice Delivered to South Pole by Basins ({n_runs} runs)"),
            ("sans-serif", 22),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(3.79f64..4.25f64, (FLOOR..y_max * 1.5).log_scale())?;
    chart
        .configure_mesh()
        .x_desc("Time [Ga ago]")
        .y_desc("Total ice thickness [m]")
        .draw()?;

    let ga: Vec<f64> = figure.time.iter().map(|t| t / 1e9).collect();
    for (k, series) in figure.series.iter().enumerate() {
        let c = if k == 0 {
            RGBColor(0x7f, 0x7f, 0x7f)
        } else {
            RGBColor(0x1f, 0x77, 0xb4)
        };
        let scatter = series.per_seed.iter().flat_map(|run| {
            ga.iter()
                .zip(run)
                .filter(|&(_, &v)| v > FLOOR)
                .map(move |(&x, &v)| Cross::new((x, v), 3, c.mix(0.5)))
        });
        chart.draw_series(scatter)?;
        let line = |values: &[f64]| -> Vec<(f64, f64)> {
            ga.iter().zip(values).map(|(&x, &v)| (x, v.max(FLOOR))).collect()
        };
        let mean = line(series.mean.as_slice());
        let upper = line(series.p99_7.as_slice());
        chart
            .draw_series(LineSeries::new(mean, c.stroke_width(3)))?
            .label(format!("{} mean", series.class))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c.stroke_width(3)));
        chart
            .draw_series(LineSeries::new(upper, c.mix(0.5).stroke_width(2)))?
            .label("99.7 percentile")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c.mix(0.5)));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    stamp(&root, version)?;
    root.present()?;
    Ok(())
}

fn write_box(record: &mut Vec<String>, b: &BoxStats) {
    record.extend(
        [b.whisker_lo, b.q1, b.median, b.q3, b.whisker_hi]
            .iter()
            .map(|v| v.to_string()),
    );
    record.push(b.count.to_string());
}

const BOX_HEADER: [&str; 6] = ["whisker_lo", "q1", "median", "q3", "whisker_hi", "count"];

pub(super) fn write_groups_csv<W: Write>(writer: W, groups: &[QuartileGroup]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["coldtrap", "run"];
    header.extend(BOX_HEADER);
    wtr.write_record(&header)?;
    for g in groups {
        let mut record = vec![g.coldtrap.clone(), g.run.clone()];
        write_box(&mut record, &g.stats);
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

type BoxBody = Rectangle<(f64, f64)>;
type BoxStroke = PathElement<(f64, f64)>;

/// Box body plus median and whisker strokes centred on `x`.
fn box_parts(x: f64, half: f64, b: &BoxStats, c: RGBColor) -> (BoxBody, [BoxStroke; 3]) {
    let median = vec![(x - half, b.median), (x + half, b.median)];
    (
        Rectangle::new([(x - half, b.q1), (x + half, b.q3)], c.mix(0.6).filled()),
        [
            PathElement::new(median, BLACK.stroke_width(2)),
            PathElement::new(vec![(x, b.whisker_lo), (x, b.q1)], BLACK),
            PathElement::new(vec![(x, b.q3), (x, b.whisker_hi)], BLACK),
        ],
    )
}

/// Side-by-side quartile boxes of log10 total ice per coldtrap.
pub(super) fn quartiles(path: &Path, figure: &RunComparison, version: &str) -> DrawResult {
    let coldtraps: Vec<&str> = {
        let mut seen: Vec<&str> = Vec::new();
        for g in &figure.groups {
            if !seen.contains(&g.coldtrap.as_str()) {
                seen.push(&g.coldtrap);
            }
        }
        seen
    };
    let n_runs = figure.runs.len().max(1);
    let slot = 0.9 / n_runs as f64;

    let root = BitMapBackend::new(path, (1600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&figure.title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(20)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(coldtraps.len() as f64 - 0.25), -0.45f64..3f64)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_label_formatter(&|v| format!("{}", 10f64.powf(*v).round()))
        .y_desc("Total ice thickness [m]")
        .draw()?;

    for (k, run) in figure.runs.iter().enumerate() {
        let c = color(k + 2);
        let mut bodies = Vec::new();
        let mut strokes = Vec::new();
        for g in figure.groups.iter().filter(|g| &g.run == run && g.stats.count > 0) {
            let Some(i) = coldtraps.iter().position(|&ct| ct == g.coldtrap) else {
                continue;
            };
            let x = i as f64 - 0.45 + (k as f64 + 0.5) * slot;
            let (body, lines) = box_parts(x, slot * 0.4, &g.stats, c);
            bodies.push(body);
            strokes.extend(lines);
        }
        chart
            .draw_series(bodies)?
            .label(run.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], c.filled()));
        chart.draw_series(strokes)?;
    }
    chart.draw_series(coldtraps.iter().enumerate().map(|(i, name)| {
        Text::new(name.to_string(), (i as f64 - 0.4, -0.4), ("sans-serif", 14))
    }))?;
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    stamp(&root, version)?;
    root.present()?;
    Ok(())
}

pub(super) fn write_surface_csv<W: Write>(writer: W, figure: &SurfaceBoxplot) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["depth", "coldtrap"];
    header.extend(BOX_HEADER);
    header.push("exceedance");
    wtr.write_record(&header)?;
    for panel in &figure.panels {
        for ((coldtrap, b), (_, frac)) in panel.boxes.iter().zip(&panel.exceedance) {
            let mut record = vec![panel.depth.to_string(), coldtrap.clone()];
            write_box(&mut record, b);
            record.push(frac.to_string());
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub(super) fn surface_boxes(path: &Path, figure: &SurfaceBoxplot, version: &str) -> DrawResult {
    let n_panels = figure.panels.len().max(1);
    let root = BitMapBackend::new(path, (1200, 550 * n_panels as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((n_panels, 1));
    for (panel, area) in figure.panels.iter().zip(&areas) {
        let y_max = if panel.depth <= 6.0 {
            1.0
        } else {
            panel.depth / 3.0
        };
        let n = panel.boxes.len();
        let mut chart = ChartBuilder::on(area)
            .margin(15)
            .x_label_area_size(20)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|_| String::new())
            .y_desc(format!(
                "Total ice thickness [m] (upper {} m, {:.3}k runs)",
                panel.depth,
                figure.run_count as f64 / 1e3
            ))
            .draw()?;

        let mut bodies = Vec::new();
        let mut strokes = Vec::new();
        for (i, (_, b)) in panel.boxes.iter().enumerate().filter(|(_, (_, b))| b.count > 0) {
            let (body, lines) = box_parts(i as f64, 0.3, b, color(0));
            bodies.push(body);
            strokes.extend(lines);
        }
        chart.draw_series(bodies)?;
        chart.draw_series(strokes)?;
        let five_pct = panel.depth * 0.05;
        chart.draw_series(DashedLineSeries::new(
            vec![(-0.5, five_pct), (n as f64 - 0.5, five_pct)],
            6,
            4,
            BLACK.into(),
        ))?;
        chart.draw_series(panel.boxes.iter().enumerate().map(|(i, (name, _))| {
            Text::new(name.clone(), (i as f64 - 0.4, y_max * 0.95), ("sans-serif", 14))
        }))?;
    }
    stamp(&root, version)?;
    root.present()?;
    Ok(())
}

pub(super) fn write_layers_csv<W: Write>(writer: W, groups: &[LayerGroup]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["coldtrap".to_string(), "run".to_string()];
    for prefix in ["ice", "depth_top"] {
        header.extend(BOX_HEADER.iter().map(|h| format!("{prefix} {h}")));
    }
    wtr.write_record(&header)?;
    for g in groups {
        let mut record = vec![g.coldtrap.clone(), g.run.clone()];
        write_box(&mut record, &g.ice_stats);
        write_box(&mut record, &g.depth_top_stats);
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

const LCROSS_DEPTHS: [(f64, &str); 2] = [
    (6.0, "Luchsinger et al. (2021)"),
    (10.0, "Schultz et al. (2010)"),
];

/// Plotted points per panel are thinned to every `LAYER_SKIP`th layer above
/// this many.
const LAYER_THIN_ABOVE: usize = 1000;
const LAYER_SKIP: usize = 300;

/// One log-log panel of layer ice against depth per coldtrap.
pub(super) fn layer_panels(path: &Path, figure: &LayerDistribution, version: &str) -> DrawResult {
    const X_RANGE: (f64, f64) = (0.05, 150.0);
    const Y_RANGE: (f64, f64) = (0.1, 800.0);
    let mut coldtraps: Vec<&str> = Vec::new();
    for g in &figure.groups {
        if !coldtraps.contains(&g.coldtrap.as_str()) {
            coldtraps.push(&g.coldtrap);
        }
    }
    let n_rows = coldtraps.len().div_ceil(2).max(1);

    let root = BitMapBackend::new(path, (1000, 420 * n_rows as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((n_rows, 2));
    for (i, (coldtrap, area)) in coldtraps.iter().zip(&areas).enumerate() {
        let mut chart = ChartBuilder::on(area)
            .caption(*coldtrap, ("sans-serif", 16))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(55)
            .build_cartesian_2d(
                (X_RANGE.0..X_RANGE.1).log_scale(),
                (Y_RANGE.0..Y_RANGE.1).log_scale(),
            )?;
        chart
            .configure_mesh()
            .x_desc("Ice layer thickness [m]")
            .y_desc("Depth [m]")
            .draw()?;

        if i < 2 {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(10.0, 10.0), (X_RANGE.1, Y_RANGE.1)],
                BLACK.mix(0.15).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                "Gigaton Zone",
                (25.0, 12.0),
                ("sans-serif", 12),
            )))?;
        }

        for (k, run) in figure.runs.iter().enumerate() {
            let Some(g) = figure
                .groups
                .iter()
                .find(|g| g.coldtrap == *coldtrap && &g.run == run)
            else {
                continue;
            };
            let c = color(k);
            let step = if g.ice.len() > LAYER_THIN_ABOVE {
                LAYER_SKIP
            } else {
                1
            };
            let points = g
                .ice
                .iter()
                .zip(&g.depth)
                .step_by(step)
                .map(move |(&x, &y)| Circle::new((x, y), 2, c.mix(0.5).filled()));
            chart
                .draw_series(points)?
                .label(run.as_str())
                .legend(move |(x, y)| Circle::new((x + 6, y), 4, c.filled()));
        }

        if *coldtrap == "Cabeus" {
            for (depth, label) in LCROSS_DEPTHS {
                chart
                    .draw_series(DashedLineSeries::new(
                        vec![(X_RANGE.0, depth), (X_RANGE.1, depth)],
                        6,
                        4,
                        BLACK.stroke_width(2),
                    ))?
                    .label(label)
                    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
            }
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    stamp(&root, version)?;
    root.present()?;
    Ok(())
}
