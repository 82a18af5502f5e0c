mod bitlogics;
mod challenge;
mod error;
mod ffmpeg;
mod flagwave;
mod options;
mod plot;
mod tiling;
mod watermark;

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::info;

// Re-export for external access (main.rs, tests, benches)
pub use crate::bitlogics::BitString;
pub use crate::challenge::{
    build_flag_audio, construct_surround_audio, construct_video_with_hint, create_challenge,
    prepare_environment, ChallengeSettings, Workspace,
};
pub use crate::error::{ChallengeError, ChallengeResult};
pub use crate::ffmpeg::{Ffmpeg, SurroundChannels, FRAME_PATTERN};
pub use crate::flagwave::{
    demodulate, generate_wave, recover_text, wav_duration_secs, Waveform, CARRIER_FREQUENCY_HZ,
};
pub use crate::options::{extract_options, AppMode, ChallengeOptions, CliData};
pub use crate::plot::{render_waveform, save_plot};
pub use crate::tiling::{divide_image, divide_image_file, GridDims, SubImage, SubImageGrid};
pub use crate::watermark::{insert_tiles_into_frames, list_frame_files, plan_placements, Placement};

/// Seeded placements are reproducible, otherwise the generator is seeded from the OS
fn placement_rng(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    }
}

/// Execute the mode picked on the command line
pub fn execute_with_options(options: ChallengeOptions) -> ChallengeResult<()> {
    match options {
        ChallengeOptions::Create(n) => {
            let ffmpeg = Ffmpeg::new(&n.ffmpeg, n.verbose);
            let mut rng = placement_rng(n.seed);
            let placements = create_challenge(
                &ffmpeg,
                &n.settings,
                &n.workspace,
                Path::new(&n.input_file),
                Path::new(&n.hint_image),
                Path::new(&n.output_file),
                &mut rng,
                n.show_progress,
            )?;
            info!("{} hint tiles placed", placements.len());
        }
        ChallengeOptions::Flag(n) => {
            prepare_environment(&n.workspace)?;
            let duration = build_flag_audio(&n.settings, &n.workspace)?;
            info!(
                "Flag audio ready: {} ({}s)",
                n.workspace.flag_audio.display(),
                duration
            );
        }
        ChallengeOptions::Watermark(n) => {
            let mut rng = placement_rng(n.seed);
            let placements = insert_tiles_into_frames(
                Path::new(&n.frames_dir),
                Path::new(&n.hint_image),
                n.grid,
                n.frame_interval,
                n.start_frame,
                &mut rng,
                n.show_progress,
            )?;
            info!("{} hint tiles placed", placements.len());
        }
        ChallengeOptions::Recover(n) => {
            let text = recover_text(&n.audio_file, n.bit_duration)?;
            println!("{}", text);
        }
    }
    Ok(())
}
