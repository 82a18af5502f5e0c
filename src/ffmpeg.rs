//! Thin wrapper around the `ffmpeg` command line.
//!
//! Every operation builds its argument list with a pure function (easy to
//! check in tests) and hands it to [`Ffmpeg::run`]. A non-zero exit or a
//! failure to spawn is reported as `ExternalToolFailure`.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{ChallengeError, ChallengeResult};

/// Pattern of the frame files written by `sample_frames` and read by `encode_frames`
pub const FRAME_PATTERN: &str = "output_frames_%04d.png";

/// The six mono inputs of a 5.1 mix, in `amerge` channel order
pub struct SurroundChannels<'a> {
    pub left: &'a Path,
    pub center: &'a Path,
    pub right: &'a Path,
    pub lfe: &'a Path,
    pub rear_left: &'a Path,
    pub rear_right: &'a Path,
}

impl<'a> SurroundChannels<'a> {
    fn in_order(&self) -> [&'a Path; 6] {
        [
            self.left,
            self.center,
            self.right,
            self.lfe,
            self.rear_left,
            self.rear_right,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Ffmpeg {
    pub binary: String,
    /// Forward ffmpeg's own stderr instead of discarding it
    pub show_output: bool,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Ffmpeg {
            binary: "ffmpeg".to_string(),
            show_output: false,
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn base_args() -> Vec<String> {
    vec!["-hide_banner".to_string(), "-y".to_string()]
}

pub fn extract_audio_args(input: &Path, output: &Path, start_time: u64, duration: u64) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-ss".to_string(),
        start_time.to_string(),
        "-t".to_string(),
        duration.to_string(),
        "-i".to_string(),
        path_arg(input),
        // The audio of the source container is its second stream
        "-map".to_string(),
        "0:1".to_string(),
        path_arg(output),
    ]);
    args
}

pub fn extract_video_args(input: &Path, output: &Path, start_time: u64, duration: u64) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-ss".to_string(),
        start_time.to_string(),
        "-t".to_string(),
        duration.to_string(),
        "-i".to_string(),
        path_arg(input),
        path_arg(output),
    ]);
    args
}

pub fn split_stereo_args(input: &Path, left: &Path, right: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(input),
        "-filter_complex".to_string(),
        "[0:a]channelsplit=channel_layout=stereo[left][right]".to_string(),
        "-map".to_string(),
        "[left]".to_string(),
        path_arg(left),
        "-map".to_string(),
        "[right]".to_string(),
        path_arg(right),
    ]);
    args
}

pub fn adjust_volume_args(input: &Path, output: &Path, volume_level: f64) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(input),
        "-filter_complex".to_string(),
        format!("volume={volume_level}"),
        path_arg(output),
    ]);
    args
}

pub fn merge_channels_args(channels: &SurroundChannels, output: &Path) -> Vec<String> {
    let mut args = base_args();
    for input in channels.in_order() {
        args.push("-i".to_string());
        args.push(path_arg(input));
    }
    args.extend([
        "-filter_complex".to_string(),
        "[0:a][1:a][2:a][3:a][4:a][5:a]amerge=inputs=6[a]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        path_arg(output),
    ]);
    args
}

pub fn sample_frames_args(video: &Path, frame_dir: &Path, fps: u32) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(video),
        "-vf".to_string(),
        format!("fps={fps}"),
        path_arg(&frame_dir.join(FRAME_PATTERN)),
    ]);
    args
}

pub fn encode_frames_args(frame_dir: &Path, output: &Path, fps: u32) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        path_arg(&frame_dir.join(FRAME_PATTERN)),
        "-crf".to_string(),
        "20".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        path_arg(output),
    ]);
    args
}

pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(video),
        "-i".to_string(),
        path_arg(audio),
        path_arg(output),
    ]);
    args
}

impl Ffmpeg {
    pub fn new(binary: &str, show_output: bool) -> Ffmpeg {
        Ffmpeg {
            binary: binary.to_string(),
            show_output,
        }
    }

    /// Check that the binary answers `-version`
    pub fn ensure_available(&self) -> ChallengeResult<()> {
        let out = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ChallengeError::ExternalToolFailure {
                operation: "ffmpeg -version".to_string(),
                reason: e.to_string(),
            })?;
        if !out.success() {
            return Err(ChallengeError::ExternalToolFailure {
                operation: "ffmpeg -version".to_string(),
                reason: format!("exited with {out}"),
            });
        }
        Ok(())
    }

    /// Run ffmpeg with `args` and wait for it
    pub fn run(&self, operation: &str, args: &[String]) -> ChallengeResult<()> {
        debug!("{} {}", self.binary, args.join(" "));
        let stderr = if self.show_output {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .status()
            .map_err(|e| ChallengeError::ExternalToolFailure {
                operation: operation.to_string(),
                reason: format!("unable to start {}: {}", self.binary, e),
            })?;
        if !status.success() {
            return Err(ChallengeError::ExternalToolFailure {
                operation: operation.to_string(),
                reason: format!("{} exited with {}", self.binary, status),
            });
        }
        debug!("{} complete.", operation);
        Ok(())
    }

    pub fn extract_audio(&self, input: &Path, output: &Path, start_time: u64, duration: u64) -> ChallengeResult<()> {
        self.run("Audio extraction", &extract_audio_args(input, output, start_time, duration))
    }

    pub fn extract_video(&self, input: &Path, output: &Path, start_time: u64, duration: u64) -> ChallengeResult<()> {
        self.run("Video extraction", &extract_video_args(input, output, start_time, duration))
    }

    pub fn split_stereo(&self, input: &Path, left: &Path, right: &Path) -> ChallengeResult<()> {
        self.run("Stereo channel extraction", &split_stereo_args(input, left, right))
    }

    pub fn adjust_volume(&self, input: &Path, output: &Path, volume_level: f64) -> ChallengeResult<()> {
        self.run("Volume adjustment", &adjust_volume_args(input, output, volume_level))
    }

    pub fn merge_channels(&self, channels: &SurroundChannels, output: &Path) -> ChallengeResult<()> {
        self.run("5.1 channel combination", &merge_channels_args(channels, output))
    }

    pub fn sample_frames(&self, video: &Path, frame_dir: &Path, fps: u32) -> ChallengeResult<()> {
        self.run("Frame extraction", &sample_frames_args(video, frame_dir, fps))
    }

    pub fn encode_frames(&self, frame_dir: &Path, output: &Path, fps: u32) -> ChallengeResult<()> {
        self.run("Video creation from frames", &encode_frames_args(frame_dir, output, fps))
    }

    pub fn mux(&self, video: &Path, audio: &Path, output: &Path) -> ChallengeResult<()> {
        self.run("Video combination with sound", &mux_args(video, audio, output))
    }
}
