//! End to end construction of a challenge video.
//!
//! The flag audio and the watermarked frames are produced here; everything
//! touching the source container goes through [`Ffmpeg`]. Errors of the core
//! steps abort the run. ffmpeg failures are only logged and the next stage
//! runs anyway, matching the best effort nature of the tool.

use std::fs;
use std::path::{Path, PathBuf};

use pretty_bytes_rust::pretty_bytes;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::ChallengeResult;
use crate::ffmpeg::{Ffmpeg, SurroundChannels};
use crate::flagwave::{generate_wave, wav_duration_secs};
use crate::plot::{plot_path_for, save_plot};
use crate::tiling::GridDims;
use crate::watermark::{insert_tiles_into_frames, Placement};

/// Location of every intermediate file of a run
#[derive(Clone, Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub flag_audio_high_volume: PathBuf,
    pub flag_audio: PathBuf,
    pub video_sound: PathBuf,
    pub video_sound_high_volume: PathBuf,
    pub left_channel: PathBuf,
    pub right_channel: PathBuf,
    pub surround_audio: PathBuf,
    pub video: PathBuf,
    pub frames_dir: PathBuf,
    pub video_with_hint: PathBuf,
}

impl Workspace {
    pub fn new<P: AsRef<Path>>(root: P) -> Workspace {
        let root = root.as_ref().to_path_buf();
        Workspace {
            flag_audio_high_volume: root.join("flag_audio_high_vol.wav"),
            flag_audio: root.join("flag_audio.wav"),
            video_sound: root.join("video_sound.wav"),
            video_sound_high_volume: root.join("video_sound_high_vol.wav"),
            left_channel: root.join("video_sound_left_channel.wav"),
            right_channel: root.join("video_sound_right_channel.wav"),
            surround_audio: root.join("5_1_audio_with_flag.wav"),
            video: root.join("video_file.mp4"),
            frames_dir: root.join("extracted_frames"),
            video_with_hint: root.join("video_file_with_hint.mp4"),
            root,
        }
    }

    /// Files a run writes into the workspace root
    pub fn intermediate_files(&self) -> Vec<PathBuf> {
        vec![
            self.flag_audio_high_volume.clone(),
            plot_path_for(&self.flag_audio_high_volume),
            self.flag_audio.clone(),
            self.video_sound.clone(),
            self.video_sound_high_volume.clone(),
            self.left_channel.clone(),
            self.right_channel.clone(),
            self.surround_audio.clone(),
            self.video.clone(),
            self.video_with_hint.clone(),
        ]
    }
}

/// Knobs of a challenge run. `Default` gives the values the challenge was designed with.
#[derive(Clone, Debug, PartialEq)]
pub struct ChallengeSettings {
    pub flag: String,
    pub sample_rate: u32,
    pub bit_duration: f64,
    pub db_high: f64,
    pub db_low: f64,
    /// Ratio applied to the flag audio before mixing
    pub flag_volume_ratio: f64,
    /// Ratio applied to the source soundtrack before splitting
    pub sound_volume_ratio: f64,
    /// Seconds skipped at the start of the source
    pub start_time: u64,
    pub grid: GridDims,
    pub frame_interval: usize,
    pub start_frame: usize,
    pub fps: u32,
    pub plot: bool,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        ChallengeSettings {
            flag: "FLAG-AMPMOD_ON_LFE".to_string(),
            sample_rate: 48000,
            bit_duration: 1.0,
            db_high: 20.0,
            db_low: -20.0,
            flag_volume_ratio: 0.2,
            sound_volume_ratio: 1.5,
            start_time: 14,
            grid: GridDims { rows: 4, cols: 4 },
            frame_interval: 30,
            start_frame: 1800,
            fps: 30,
            plot: true,
        }
    }
}

/// Clear what an earlier run left in the workspace and create the directories.
///
/// The frame directory is emptied: frames of a longer earlier run would
/// otherwise be encoded after the new ones.
pub fn prepare_environment(workspace: &Workspace) -> ChallengeResult<()> {
    if workspace.frames_dir.exists() {
        fs::remove_dir_all(&workspace.frames_dir)?;
        debug!("Removed {}", workspace.frames_dir.display());
    }
    for path in workspace.intermediate_files() {
        if path.is_file() {
            fs::remove_file(&path)?;
            debug!("Removed {}", path.display());
        }
    }
    fs::create_dir_all(&workspace.root)?;
    fs::create_dir_all(&workspace.frames_dir)?;
    info!("Folders created successfully.");
    Ok(())
}

/// Log an ffmpeg failure and carry on
fn keep_going(stage: &str, result: ChallengeResult<()>) {
    if let Err(e) = result {
        error!("[{}] {}", stage, e);
    }
}

fn file_size(path: &Path) -> String {
    fs::metadata(path)
        .map(|m| pretty_bytes(m.len(), None))
        .unwrap_or_else(|_| "?".to_string())
}

/// Write the loud and the attenuated flag audio, return the trimming duration in seconds
pub fn build_flag_audio(settings: &ChallengeSettings, workspace: &Workspace) -> ChallengeResult<u64> {
    info!("> Creating flag bass audio.");
    let wave = generate_wave(
        &settings.flag,
        settings.db_high,
        settings.db_low,
        settings.sample_rate,
        settings.bit_duration,
    )?;
    wave.save_wav(&workspace.flag_audio_high_volume)?;
    if settings.plot {
        let plot = save_plot(&wave, &workspace.flag_audio_high_volume)?;
        info!("Waveform plot saved: {}", plot.display());
    }

    info!("> Decreasing flag bass audio volume level.");
    wave.scaled(settings.flag_volume_ratio)?
        .save_wav(&workspace.flag_audio)?;
    info!(
        "Flag audio written: {} ({})",
        workspace.flag_audio.display(),
        file_size(&workspace.flag_audio)
    );

    let duration = wav_duration_secs(&workspace.flag_audio)?;
    info!("> Duration has found: {}.", duration);
    Ok(duration)
}

/// Cut the source soundtrack and rebuild it as 5.1 with the flag on the LFE channel
pub fn construct_surround_audio(
    ffmpeg: &Ffmpeg,
    settings: &ChallengeSettings,
    workspace: &Workspace,
    input: &Path,
    duration: u64,
) {
    const STAGE: &str = "5.1 audio";
    info!("> Extracting the audio from the container.");
    keep_going(
        STAGE,
        ffmpeg.extract_audio(input, &workspace.video_sound, settings.start_time, duration),
    );
    info!("> Increasing audio volume level.");
    keep_going(
        STAGE,
        ffmpeg.adjust_volume(
            &workspace.video_sound,
            &workspace.video_sound_high_volume,
            settings.sound_volume_ratio,
        ),
    );
    info!("> Extracting left and right audio from sound file.");
    keep_going(
        STAGE,
        ffmpeg.split_stereo(
            &workspace.video_sound_high_volume,
            &workspace.left_channel,
            &workspace.right_channel,
        ),
    );
    info!("> Combining the channels with bass flag into 5.1 channels.");
    let channels = SurroundChannels {
        left: &workspace.left_channel,
        center: &workspace.left_channel,
        right: &workspace.right_channel,
        lfe: &workspace.flag_audio,
        rear_left: &workspace.left_channel,
        rear_right: &workspace.right_channel,
    };
    keep_going(
        STAGE,
        ffmpeg.merge_channels(&channels, &workspace.surround_audio),
    );
}

/// Cut the source video, scatter the hint over its frames and encode it back
#[allow(clippy::too_many_arguments)]
pub fn construct_video_with_hint<R: Rng + ?Sized>(
    ffmpeg: &Ffmpeg,
    settings: &ChallengeSettings,
    workspace: &Workspace,
    input: &Path,
    hint_image: &Path,
    duration: u64,
    rng: &mut R,
    show_progress: bool,
) -> ChallengeResult<Vec<Placement>> {
    const STAGE: &str = "video with hint";
    info!("> Extracting video from the container.");
    keep_going(
        STAGE,
        ffmpeg.extract_video(input, &workspace.video, settings.start_time, duration),
    );
    info!("> Extracting the frames from the video.");
    keep_going(
        STAGE,
        ffmpeg.sample_frames(&workspace.video, &workspace.frames_dir, settings.fps),
    );
    info!("> Placing hint image onto frames randomly.");
    let placements = insert_tiles_into_frames(
        &workspace.frames_dir,
        hint_image,
        settings.grid,
        settings.frame_interval,
        settings.start_frame,
        rng,
        show_progress,
    )?;
    if placements.len() < settings.grid.cell_count() {
        warn!(
            "Only {} of {} hint tiles were placed, the video is too short",
            placements.len(),
            settings.grid.cell_count()
        );
    }
    info!("> Creating video from the new frames.");
    keep_going(
        STAGE,
        ffmpeg.encode_frames(&workspace.frames_dir, &workspace.video_with_hint, settings.fps),
    );
    Ok(placements)
}

/// Run the whole pipeline and write the challenge to `output`
#[allow(clippy::too_many_arguments)]
pub fn create_challenge<R: Rng + ?Sized>(
    ffmpeg: &Ffmpeg,
    settings: &ChallengeSettings,
    workspace: &Workspace,
    input: &Path,
    hint_image: &Path,
    output: &Path,
    rng: &mut R,
    show_progress: bool,
) -> ChallengeResult<Vec<Placement>> {
    prepare_environment(workspace)?;
    if let Err(e) = ffmpeg.ensure_available() {
        warn!("{}", e);
    }

    let duration = build_flag_audio(settings, workspace)?;
    info!("FLAG BASS AUDIO IS CREATED");

    construct_surround_audio(ffmpeg, settings, workspace, input, duration);
    info!("ORIGINAL VIDEO HAS COMBINED WITH FLAG BASS");

    let placements = construct_video_with_hint(
        ffmpeg,
        settings,
        workspace,
        input,
        hint_image,
        duration,
        rng,
        show_progress,
    )?;
    info!("VIDEO WITH HINT IMAGES IS CREATED");

    info!("> Combining the hinted video and audio with bass flag.");
    keep_going(
        "final mux",
        ffmpeg.mux(&workspace.video_with_hint, &workspace.surround_audio, output),
    );
    info!("> Challenge is created. File -> {}", output.display());
    Ok(placements)
}
