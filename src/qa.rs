//! QA artifacts: chord/waveform plot and JSON reports

use crate::audio::load_waveform_for_plot;
use crate::chord_library::simplify_chord_label;
use crate::error::{Result as SplitResult, SplitError};
use crate::lab::ChordSegment;
use plotters::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Region colours, cycled over the distinct simplified labels
const PALETTE: [RGBColor; 10] = [
    RGBColor(0x63, 0x6E, 0xFA),
    RGBColor(0xEF, 0x55, 0x3B),
    RGBColor(0x00, 0xCC, 0x96),
    RGBColor(0xAB, 0x63, 0xFA),
    RGBColor(0xFF, 0xA1, 0x5A),
    RGBColor(0x19, 0xD3, 0xF3),
    RGBColor(0xFF, 0x66, 0x92),
    RGBColor(0xB6, 0xE8, 0x80),
    RGBColor(0xFF, 0x97, 0xFF),
    RGBColor(0xFE, 0xCB, 0x52),
];

/// Colour per simplified chord label, assigned in sorted label order
pub fn label_colors(segments: &[ChordSegment]) -> BTreeMap<String, RGBColor> {
    let mut labels: Vec<&str> = segments
        .iter()
        .map(|s| simplify_chord_label(&s.label))
        .collect();
    labels.sort_unstable();
    labels.dedup();
    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| (label.to_string(), PALETTE[i % PALETTE.len()]))
        .collect()
}

fn qa_error<E: std::fmt::Debug>(what: &str, e: E) -> SplitError {
    SplitError::QaGenerationError(format!("{}: {:?}", what, e))
}

/// Render the stem waveform with translucent chord regions to a PNG
pub fn write_chords_plot(
    wav_path: &Path,
    segments: &[ChordSegment],
    png_path: &Path,
    max_points: usize,
) -> SplitResult<()> {
    let waveform = load_waveform_for_plot(wav_path, max_points)?;
    let colors = label_colors(segments);

    let duration = waveform.duration_s.max(f32::EPSILON);
    let peak = waveform
        .mono
        .iter()
        .fold(0.0f32, |m, &v| m.max(v.abs()))
        .max(1e-3);

    let root = BitMapBackend::new(png_path, (1400, 500)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| qa_error("Failed to fill plot background", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Chords", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(0f32..duration, -peak..peak)
        .map_err(|e| qa_error("Failed to build chart", e))?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Amplitude")
        .draw()
        .map_err(|e| qa_error("Failed to draw mesh", e))?;

    for segment in segments {
        let label = simplify_chord_label(&segment.label);
        let color = colors.get(label).copied().unwrap_or(RGBColor(0x99, 0x99, 0x99));
        let x0 = segment.start_s.clamp(0.0, duration);
        let x1 = segment.end_s.clamp(0.0, duration);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x0, -peak), (x1, peak)],
                color.mix(0.22).filled(),
            )))
            .map_err(|e| qa_error("Failed to draw chord region", e))?;
    }

    chart
        .draw_series(LineSeries::new(
            waveform
                .times_s
                .iter()
                .copied()
                .zip(waveform.mono.iter().copied()),
            &BLACK,
        ))
        .map_err(|e| qa_error("Failed to draw waveform", e))?;

    for (label, color) in &colors {
        let color = *color;
        chart
            .draw_series(std::iter::empty::<PathElement<(f32, f32)>>())
            .map_err(|e| qa_error("Failed to draw legend entry", e))?
            .label(label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| qa_error("Failed to draw legend", e))?;

    root.present().map_err(|e| qa_error("Failed to write plot", e))?;
    info!("Saved chord plot to {}", png_path.display());
    Ok(())
}

/// Write any serializable report as pretty JSON
pub fn write_json_report<T: Serialize>(report: &T, path: &Path) -> SplitResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    info!("Exported report to {}", path.display());
    Ok(())
}
