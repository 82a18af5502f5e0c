use std::path::{Path, PathBuf};

use image::{ImageError, Rgb, RgbImage};

use crate::error::{ChallengeError, ChallengeResult};
use crate::flagwave::Waveform;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([160, 160, 160]);
const SIGNAL: Rgb<u8> = Rgb([31, 119, 180]);

/// Draw amplitude against sample index.
///
/// Each column covers a run of samples and gets a vertical stroke from the
/// smallest to the largest sample of that run, so long signals stay readable.
/// The vertical scale is symmetric around the zero axis.
pub fn render_waveform(wave: &Waveform, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width.max(1), height.max(2), BACKGROUND);
    let (width, height) = canvas.dimensions();
    let middle = height / 2;
    for x in 0..width {
        canvas.put_pixel(x, middle, AXIS);
    }
    if wave.is_empty() {
        return canvas;
    }

    let peak = wave.peak(0, wave.len()).max(f32::EPSILON);
    let to_row = |value: f32| -> u32 {
        let normalized = (1.0 - value / peak) / 2.0; // 0 = top, 1 = bottom
        ((normalized * (height - 1) as f32).round() as u32).min(height - 1)
    };

    let samples_per_column = (wave.len() as f64 / f64::from(width)).max(1.0);
    for x in 0..width {
        let start = (f64::from(x) * samples_per_column) as usize;
        if start >= wave.len() {
            break;
        }
        let end = ((f64::from(x + 1) * samples_per_column) as usize).clamp(start + 1, wave.len());
        let run = &wave.samples[start..end];
        let low = run.iter().cloned().fold(f32::MAX, f32::min);
        let high = run.iter().cloned().fold(f32::MIN, f32::max);
        for y in to_row(high)..=to_row(low) {
            canvas.put_pixel(x, y, SIGNAL);
        }
    }
    canvas
}

/// Location of the plot for a given audio file: same stem, `.png` extension
pub fn plot_path_for(audio_path: &Path) -> PathBuf {
    audio_path.with_extension("png")
}

/// Render the plot and store it beside the audio file
pub fn save_plot(wave: &Waveform, audio_path: &Path) -> ChallengeResult<PathBuf> {
    let path = plot_path_for(audio_path);
    render_waveform(wave, 1280, 480)
        .save(&path)
        .map_err(|e| match e {
            ImageError::IoError(io) => ChallengeError::Io(io),
            other => ChallengeError::InvalidParameter(format!(
                "unable to save plot {}: {}",
                path.display(),
                other
            )),
        })?;
    Ok(path)
}
