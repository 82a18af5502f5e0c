use clap::builder::TypedValueParser;
use clap::Parser;

use crate::challenge::{ChallengeSettings, Workspace};
use crate::tiling::GridDims;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AppMode {
    Create,
    Flag,
    Watermark,
    Recover,
}

impl std::fmt::Display for AppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Flag => "flag",
            Self::Watermark => "watermark",
            Self::Recover => "recover",
        };
        s.fmt(f)
    }
}

impl std::str::FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "flag" => Ok(Self::Flag),
            "watermark" => Ok(Self::Watermark),
            "recover" => Ok(Self::Recover),
            _ => Err(format!("Unknown mode: {s}")),
        }
    }
}

/// CLI arguments
///
/// Running without any argument builds the challenge with the values it was
/// designed with. Every value can be overridden, and a mode can restrict the
/// run to one part of the pipeline.
#[derive(Parser)]
#[clap(name = "bassflag")]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct CliData {
    /// Possible values:
    /// "create" = build the full challenge video (default).
    /// "flag" = only write the flag audio files.
    /// "watermark" = only scatter the hint over an existing frame directory.
    /// "recover" = decode the flag from a flag audio file.
    #[arg(short='m', long, value_parser = clap::builder::PossibleValuesParser::new(["create", "flag", "watermark", "recover"])
    .map(|s| s.parse::<AppMode>().unwrap()),)]
    pub mode: Option<AppMode>,

    /// Text hidden in the LFE channel
    #[arg(long)]
    pub flag: Option<String>,

    /// Source video (create) or flag audio file (recover)
    #[arg(short, long)]
    pub input_file_path: Option<String>,

    /// Image cut into tiles and scattered over the frames
    #[arg(long)]
    pub hint_image: Option<String>,

    /// Where the finished challenge is written
    #[arg(short, long)]
    pub output_file_path: Option<String>,

    /// Directory holding the intermediate files
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Directory of frames to watermark (watermark mode)
    #[arg(long)]
    pub frames_dir: Option<String>,

    #[arg(short, long)]
    pub sample_rate: Option<u32>,

    /// Seconds of tone per bit
    #[arg(short, long)]
    pub bit_duration: Option<f64>,

    /// Level in dB of a `1` bit
    #[arg(long, allow_hyphen_values = true)]
    pub db_high: Option<f64>,

    /// Level in dB of a `0` bit
    #[arg(long, allow_hyphen_values = true)]
    pub db_low: Option<f64>,

    /// Seconds of the source skipped before the challenge starts
    #[arg(long)]
    pub start_time: Option<u64>,

    /// Tiles of the hint image, rows x cols (e.g. 4x4)
    #[arg(short, long)]
    pub grid: Option<String>,

    /// Place a tile every n frames
    #[arg(long)]
    pub frame_interval: Option<usize>,

    /// First frame that may receive a tile
    #[arg(long)]
    pub start_frame: Option<usize>,

    #[arg(short, long)]
    pub fps: Option<u32>,

    /// Seed of the tile placement. Random when missing.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the waveform plot
    #[arg(long)]
    pub no_plot: bool,

    /// Show ffmpeg's own output
    #[arg(long)]
    pub verbose: bool,

    #[arg(long)]
    pub ffmpeg: Option<String>,
}

/// Required options to build the whole challenge
#[derive(Clone)]
pub struct CreateOptions {
    pub settings: ChallengeSettings,
    pub workspace: Workspace,
    pub input_file: String,
    pub hint_image: String,
    pub output_file: String,
    pub ffmpeg: String,
    pub verbose: bool,
    pub seed: Option<u64>,
    pub show_progress: bool,
}

#[derive(Clone)]
pub struct FlagOptions {
    pub settings: ChallengeSettings,
    pub workspace: Workspace,
}

#[derive(Clone)]
pub struct WatermarkOptions {
    pub frames_dir: String,
    pub hint_image: String,
    pub grid: GridDims,
    pub frame_interval: usize,
    pub start_frame: usize,
    pub seed: Option<u64>,
    pub show_progress: bool,
}

#[derive(Clone)]
pub struct RecoverOptions {
    pub audio_file: String,
    pub bit_duration: f64,
}

#[derive(Clone)]
pub enum ChallengeOptions {
    Create(CreateOptions),
    Flag(FlagOptions),
    Watermark(WatermarkOptions),
    Recover(RecoverOptions),
}

fn settings_from(args: &CliData) -> Result<ChallengeSettings, String> {
    let defaults = ChallengeSettings::default();
    let grid = match &args.grid {
        Some(g) => g.parse::<GridDims>().map_err(|e| e.to_string())?,
        None => defaults.grid,
    };
    Ok(ChallengeSettings {
        flag: args.flag.clone().unwrap_or(defaults.flag),
        sample_rate: args.sample_rate.unwrap_or(defaults.sample_rate),
        bit_duration: args.bit_duration.unwrap_or(defaults.bit_duration),
        db_high: args.db_high.unwrap_or(defaults.db_high),
        db_low: args.db_low.unwrap_or(defaults.db_low),
        start_time: args.start_time.unwrap_or(defaults.start_time),
        grid,
        frame_interval: args.frame_interval.unwrap_or(defaults.frame_interval),
        start_frame: args.start_frame.unwrap_or(defaults.start_frame),
        fps: args.fps.unwrap_or(defaults.fps),
        plot: !args.no_plot,
        ..defaults
    })
}

/// Extract from the command line (CLI) argument the option.
///
/// # Arguments
/// args - The command line arguments
/// show_progress - Whether progress bars should be drawn (usually: stdout is a terminal)
///
/// # Returns
/// A well formed structure for the mode asked, or the reason the arguments are unusable
pub fn extract_options(args: CliData, show_progress: bool) -> Result<ChallengeOptions, String> {
    let settings = settings_from(&args)?;
    let workspace = Workspace::new(args.workspace.clone().unwrap_or_else(|| "tmp".to_string()));
    let hint_image = args
        .hint_image
        .clone()
        .unwrap_or_else(|| "docs/hint_image.png".to_string());

    Ok(match args.mode.unwrap_or(AppMode::Create) {
        AppMode::Create => ChallengeOptions::Create(CreateOptions {
            input_file: args
                .input_file_path
                .unwrap_or_else(|| "docs/bbb_sunflower_1080p_30fps_normal.mp4".to_string()),
            output_file: args
                .output_file_path
                .unwrap_or_else(|| "challenge_video.mp4".to_string()),
            ffmpeg: args.ffmpeg.unwrap_or_else(|| "ffmpeg".to_string()),
            verbose: args.verbose,
            seed: args.seed,
            hint_image,
            settings,
            workspace,
            show_progress,
        }),
        AppMode::Flag => ChallengeOptions::Flag(FlagOptions {
            settings,
            workspace,
        }),
        AppMode::Watermark => ChallengeOptions::Watermark(WatermarkOptions {
            frames_dir: args
                .frames_dir
                .unwrap_or_else(|| workspace.frames_dir.to_string_lossy().into_owned()),
            hint_image,
            grid: settings.grid,
            frame_interval: settings.frame_interval,
            start_frame: settings.start_frame,
            seed: args.seed,
            show_progress,
        }),
        AppMode::Recover => ChallengeOptions::Recover(RecoverOptions {
            audio_file: args
                .input_file_path
                .unwrap_or_else(|| workspace.flag_audio.to_string_lossy().into_owned()),
            bit_duration: settings.bit_duration,
        }),
    })
}
