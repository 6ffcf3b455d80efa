//! Forecast chart rendered to a PNG data URI.
//!
//! Actual closes over a trailing window are drawn as a solid line with markers,
//! followed by a dashed segment from the last close to the predicted point.
//! The x axis is the session index inside the window; the prediction sits one
//! session past the end.

use base64::Engine;
use chrono::NaiveDate;
use forecast_core::{ForecastError, ForecastResult, PriceSeries};
use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;

pub const DEFAULT_WIDTH: u32 = 1400;
pub const DEFAULT_HEIGHT: u32 = 800;
pub const DEFAULT_WINDOW: usize = 100;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";
const DASH_SEGMENTS: usize = 16;

const ACTUAL_COLOR: RGBColor = RGBColor(31, 119, 180);
const FORECAST_COLOR: RGBColor = RGBColor(214, 39, 40);
const GRID_COLOR: RGBColor = RGBColor(225, 225, 225);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    /// Trailing sessions of history to draw.
    pub window: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            window: DEFAULT_WINDOW,
        }
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> ForecastError {
    ForecastError::Render(e.to_string())
}

pub struct ChartRenderer {
    config: ChartConfig,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn with_window(window: usize) -> Self {
        Self::new(ChartConfig {
            window,
            ..ChartConfig::default()
        })
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Render and return `data:image/png;base64,...`.
    pub fn render(&self, series: &PriceSeries, predicted_date: NaiveDate, predicted_price: f64) -> ForecastResult<String> {
        let png = self.render_png(series, predicted_date, predicted_price)?;
        Ok(format!(
            "{}{}",
            DATA_URI_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }

    pub fn render_png(&self, series: &PriceSeries, predicted_date: NaiveDate, predicted_price: f64) -> ForecastResult<Vec<u8>> {
        let last = series
            .last()
            .ok_or_else(|| ForecastError::Render(format!("no price history to chart for {}", series.ticker())))?;
        if predicted_date <= last.date {
            return Err(ForecastError::Render(format!(
                "predicted date {} is not after the last session {}",
                predicted_date, last.date
            )));
        }
        if !predicted_price.is_finite() {
            return Err(ForecastError::Render("predicted price is not finite".to_string()));
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Err(ForecastError::Render("chart dimensions must be non-zero".to_string()));
        }

        let closes = series.closes();
        let window = self.config.window.max(1).min(closes.len());
        let visible = &closes[closes.len() - window..];

        let actual: Vec<(f64, f64)> = visible.iter().enumerate().map(|(i, c)| (i as f64, *c)).collect();
        let last_point = (window as f64 - 1.0, visible[window - 1]);
        let forecast_point = (window as f64, predicted_price);

        let (y_min, y_max) = padded_range(visible.iter().copied().chain(std::iter::once(predicted_price)));
        let x_max = window as f64 + 0.5;

        let (width, height) = (self.config.width, self.config.height);
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_err)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(
                    format!("{} next-session forecast ({})", series.ticker(), predicted_date),
                    ("sans-serif", 28),
                )
                .margin(30)
                .x_label_area_size(40)
                .y_label_area_size(70)
                .build_cartesian_2d(-0.5f64..x_max, y_min..y_max)
                .map_err(render_err)?;

            chart
                .configure_mesh()
                .light_line_style(GRID_COLOR)
                .x_desc("Session")
                .y_desc("Close")
                .draw()
                .map_err(render_err)?;

            chart
                .draw_series(LineSeries::new(actual.iter().copied(), ACTUAL_COLOR.stroke_width(2)))
                .map_err(render_err)?;
            chart
                .draw_series(actual.iter().map(|p| Circle::new(*p, 3, ACTUAL_COLOR.filled())))
                .map_err(render_err)?;

            chart
                .draw_series(dashed_segment(last_point, forecast_point).into_iter().map(|(a, b)| {
                    PathElement::new(vec![a, b], FORECAST_COLOR.stroke_width(2))
                }))
                .map_err(render_err)?;
            chart
                .draw_series(std::iter::once(Circle::new(forecast_point, 6, FORECAST_COLOR.filled())))
                .map_err(render_err)?;

            root.present().map_err(render_err)?;
        }

        let image = RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| ForecastError::Render("bitmap buffer has the wrong size".to_string()))?;
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(render_err)?;

        tracing::debug!("Rendered {}x{} forecast chart ({} bytes)", width, height, png.len());
        Ok(png)
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

/// Min/max with 5% headroom; a flat range is widened by one unit each way.
fn padded_range<I: Iterator<Item = f64>>(values: I) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = max - min;
    if span <= 0.0 {
        (min - 1.0, max + 1.0)
    } else {
        (min - span * 0.05, max + span * 0.05)
    }
}

/// Every other piece of the segment split into `DASH_SEGMENTS` parts.
fn dashed_segment(from: (f64, f64), to: (f64, f64)) -> Vec<((f64, f64), (f64, f64))> {
    let lerp = |t: f64| (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
    (0..DASH_SEGMENTS)
        .step_by(2)
        .map(|i| {
            let start = i as f64 / DASH_SEGMENTS as f64;
            let end = (i + 1) as f64 / DASH_SEGMENTS as f64;
            (lerp(start), lerp(end))
        })
        .collect()
}
