//! Histogram rendering with [`plotters`].
//!
//! The chart is drawn into an in-memory RGB buffer by the bitmap backend and
//! written to disk as PNG through [`image`].

use std::path::Path;

use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use thiserror::Error;

use super::histogram::HistogramBin;
use crate::color::generate_palette;

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 800;

/// Errors that can occur during plot generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("Failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Failed to save plot to file: {0}")]
    FileSave(#[from] image::ImageError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

type Result<T> = core::result::Result<T, PlotError>;

/// Draw one coloured bar per bin with its count on top and save as PNG.
pub fn render_histogram(bins: &[HistogramBin], title: &str, output_path: &Path) -> Result<()> {
    if bins.is_empty() {
        return Err(PlotError::InvalidData("no bins to draw".to_string()));
    }

    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    draw_histogram(&mut buffer, bins, title)?;

    let img = image::RgbImage::from_raw(WIDTH, HEIGHT, buffer)
        .ok_or_else(|| PlotError::Drawing("pixel buffer size mismatch".to_string()))?;
    img.save(output_path)?;

    log::info!("Wrote histogram to {}", output_path.display());
    Ok(())
}

fn draw_histogram(buffer: &mut [u8], bins: &[HistogramBin], title: &str) -> Result<()> {
    let root = BitMapBackend::with_buffer(buffer, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let n = bins.len() as u32;
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as u32;
    // Headroom for the count labels above the tallest bar.
    let y_max = (max_count + max_count / 5).max(max_count + 1);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(85)
        // Integer ranges are inclusive, so 0..n-1 gives exactly n slots.
        .build_cartesian_2d((0u32..n - 1).into_segmented(), 0u32..y_max)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    let labels: Vec<&str> = bins.iter().map(|b| b.label.as_str()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bins.len())
        .x_desc("5-year price change")
        .y_desc("Number of ZIP codes")
        .label_style(("sans-serif", 25))
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels
                .get(*i as usize)
                .map_or_else(String::new, |l| l.to_string()),
            _ => String::new(),
        })
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let palette = generate_palette(bins.len());
    chart
        .draw_series(bins.iter().zip(&palette).enumerate().map(|(i, (bin, color))| {
            let i = i as u32;
            let right = if i + 1 == n {
                SegmentValue::Last
            } else {
                SegmentValue::Exact(i + 1)
            };
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0), (right, bin.count as u32)],
                color.filled(),
            );
            bar.set_margin(0, 0, 12, 12);
            bar
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let count_style = TextStyle::from(("sans-serif", 28).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    chart
        .draw_series(bins.iter().enumerate().map(|(i, bin)| {
            Text::new(
                bin.count.to_string(),
                (SegmentValue::CenterOf(i as u32), bin.count as u32),
                count_style.clone(),
            )
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    Ok(())
}
