//! Plot of the log profile, the rejected samples and the fitted curve.

use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;

use crate::config::{NormalizeConfig, PlotDevice};
use crate::error::SnormError;
use crate::pipeline::Normalized;

const SIZE: (u32, u32) = (1200, 800);

/// Render the fit to the configured device; a no-op for `PlotDevice::None`
pub fn render_fit(config: &NormalizeConfig, run: &Normalized) -> Result<(), SnormError> {
    let result = match &config.device {
        PlotDevice::None => return Ok(()),
        PlotDevice::Png { path } => {
            let root = BitMapBackend::new(path, SIZE).into_drawing_area();
            draw_fit(&root, config, run)
        }
        PlotDevice::Svg { path } => {
            let root = SVGBackend::new(path, SIZE).into_drawing_area();
            draw_fit(&root, config, run)
        }
    };
    result.map_err(|e| SnormError::Plot(e.to_string()))?;
    info!("Fit plot written to {:?}", config.device);
    Ok(())
}

fn draw_fit<DB>(
    root: &DrawingArea<DB, Shift>,
    config: &NormalizeConfig,
    run: &Normalized,
) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let samples: Vec<(f64, f64)> = run
        .profile
        .ok_samples()
        .map(|(x, v)| (x as f64, v))
        .collect();
    let curve: Vec<(f64, f64)> = run
        .log_grid
        .xs
        .iter()
        .zip(&run.log_grid.values)
        .map(|(&x, &v)| (x as f64, v))
        .collect();
    let rejected: Vec<(f64, f64)> = samples
        .iter()
        .copied()
        .filter(|(x, _)| run.outcome.rejected_x.contains(x))
        .collect();

    let (x_min, x_max) = run.profile.ok_range;
    let (y_min, y_max) = samples
        .iter()
        .chain(&curve)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    let pad = ((y_max - y_min) * 0.05).max(1e-3);

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("Spectral profile fit: {}", config.model),
            ("sans-serif", 26),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min as f64..x_max as f64, (y_min - pad)..(y_max + pad))?;

    chart
        .configure_mesh()
        .x_desc("X (pixels)")
        .y_desc("ln(mean counts)")
        .x_label_formatter(&|x| format!("{x:.0}"))
        .y_label_formatter(&|y| format!("{y:.3}"))
        .draw()?;

    chart
        .draw_series(samples.iter().map(|&p| Circle::new(p, 2, BLUE.filled())))?
        .label("profile")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

    chart
        .draw_series(rejected.iter().map(|&p| Cross::new(p, 5, RED.stroke_width(2))))?
        .label("rejected")
        .legend(|(x, y)| Cross::new((x + 10, y), 4, RED));

    chart
        .draw_series(LineSeries::new(curve, GREEN.stroke_width(2)))?
        .label("fit")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    let (xf1, xf2) = config.fit_range();
    for xf in [xf1, xf2] {
        chart.draw_series(LineSeries::new(
            vec![(xf as f64, y_min - pad), (xf as f64, y_max + pad)],
            BLACK.mix(0.4),
        ))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
