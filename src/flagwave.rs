//! Amplitude modulated encoding of the flag.
//!
//! Every bit of the flag becomes a fixed length sine segment. A `1` is played
//! loud (`db_high`), a `0` quiet (`db_low`). The carrier sits at 10 Hz, below
//! hearing, so once mixed into the LFE channel the flag only shows up when the
//! bass track is looked at with a spectrum or waveform viewer.

use std::f64::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::bitlogics::BitString;
use crate::error::{ChallengeError, ChallengeResult};

/// Frequency of the tone carrying each bit
pub const CARRIER_FREQUENCY_HZ: f64 = 10.0;

/// Mono audio signal produced by the encoder
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Convert decibels into a linear amplitude factor
pub fn db_to_amplitude(db: f64) -> f64 {
    10_f64.powf(db / 20.0)
}

/// Number of samples a single bit occupies
pub fn samples_per_bit(sample_rate: u32, bit_duration: f64) -> ChallengeResult<usize> {
    if sample_rate == 0 {
        return Err(ChallengeError::InvalidParameter(
            "sample rate must be greater than 0".to_string(),
        ));
    }
    if !bit_duration.is_finite() || bit_duration <= 0.0 {
        return Err(ChallengeError::InvalidParameter(format!(
            "bit duration must be a positive number of seconds, got {bit_duration}"
        )));
    }
    let count = (bit_duration * f64::from(sample_rate)).round();
    if count < 1.0 {
        return Err(ChallengeError::InvalidParameter(format!(
            "a bit of {bit_duration}s at {sample_rate}Hz holds no sample"
        )));
    }
    if count >= usize::MAX as f64 {
        return Err(ChallengeError::InvalidParameter(format!(
            "a bit of {bit_duration}s at {sample_rate}Hz holds too many samples"
        )));
    }
    Ok(count as usize)
}

/// Encode `text` into an amplitude modulated waveform.
///
/// # Arguments
/// text - The flag, must not be empty
/// db_high - Level of the segments carrying a `1`
/// db_low - Level of the segments carrying a `0`
/// sample_rate - Samples per second of the produced signal
/// bit_duration - Seconds of signal for each bit
pub fn generate_wave(
    text: &str,
    db_high: f64,
    db_low: f64,
    sample_rate: u32,
    bit_duration: f64,
) -> ChallengeResult<Waveform> {
    if text.is_empty() {
        return Err(ChallengeError::InvalidParameter(
            "the flag text is empty".to_string(),
        ));
    }
    if !db_high.is_finite() || !db_low.is_finite() {
        return Err(ChallengeError::InvalidParameter(format!(
            "decibel levels must be finite, got high={db_high} low={db_low}"
        )));
    }
    let bits = BitString::from_text(text);
    modulate(&bits, db_high, db_low, sample_rate, bit_duration)
}

/// Turn already computed bits into the waveform
pub fn modulate(
    bits: &BitString,
    db_high: f64,
    db_low: f64,
    sample_rate: u32,
    bit_duration: f64,
) -> ChallengeResult<Waveform> {
    let segment_len = samples_per_bit(sample_rate, bit_duration)?;
    let too_long = || {
        ChallengeError::InvalidParameter(format!(
            "{} bits of {} samples do not fit in memory",
            bits.len(),
            segment_len
        ))
    };
    let total = bits.len().checked_mul(segment_len).ok_or_else(too_long)?;
    let mut samples: Vec<f32> = Vec::new();
    samples.try_reserve_exact(total).map_err(|_| too_long())?;
    let high_amplitude = db_to_amplitude(db_high);
    let low_amplitude = db_to_amplitude(db_low);

    // The tone restarts at phase 0 for every bit, so one segment serves all bits
    let tone: Vec<f64> = (0..segment_len)
        .map(|n| {
            let t = n as f64 / f64::from(sample_rate);
            (2.0 * PI * CARRIER_FREQUENCY_HZ * t).sin()
        })
        .collect();

    for bit in bits.bits() {
        let amplitude = if *bit { high_amplitude } else { low_amplitude };
        samples.extend(tone.iter().map(|s| (amplitude * s) as f32));
    }
    debug!(
        "Modulated {} bits into {} samples at {}Hz",
        bits.len(),
        samples.len(),
        sample_rate
    );

    Ok(Waveform {
        samples,
        sample_rate,
    })
}

impl Waveform {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Multiply every sample by `ratio`, e.g. 0.2 to keep the flag below casual hearing
    pub fn scaled(&self, ratio: f64) -> ChallengeResult<Waveform> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(ChallengeError::InvalidParameter(format!(
                "volume ratio must be a non-negative number, got {ratio}"
            )));
        }
        Ok(Waveform {
            samples: self
                .samples
                .iter()
                .map(|s| (f64::from(*s) * ratio) as f32)
                .collect(),
            sample_rate: self.sample_rate,
        })
    }

    /// Largest absolute sample in `[start, end)`
    pub fn peak(&self, start: usize, end: usize) -> f32 {
        self.samples[start..end]
            .iter()
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Store as a single channel 32 bits float WAV
    pub fn save_wav<P: AsRef<Path>>(&self, path: P) -> ChallengeResult<()> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let to_error = |e: hound::Error| match e {
            hound::Error::IoError(io) => ChallengeError::Io(io),
            other => ChallengeError::InvalidParameter(format!(
                "unable to write {}: {}",
                path.as_ref().display(),
                other
            )),
        };
        let mut writer = WavWriter::create(path.as_ref(), spec).map_err(to_error)?;
        for sample in &self.samples {
            writer.write_sample(*sample).map_err(to_error)?;
        }
        writer.finalize().map_err(to_error)?;
        Ok(())
    }

    /// Load a mono WAV. Integer PCM is normalized to `[-1, 1]`, multi-channel files keep the first channel.
    pub fn load_wav<P: AsRef<Path>>(path: P) -> ChallengeResult<Waveform> {
        let path = path.as_ref();
        let not_audio = |e: hound::Error| ChallengeError::NotAnAudioFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let reader = WavReader::open(path).map_err(not_audio)?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));
        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(not_audio)?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(not_audio)?
            }
        };
        let samples = interleaved.into_iter().step_by(channels).collect();
        Ok(Waveform {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Duration of a WAV file in whole seconds (fraction dropped)
pub fn wav_duration_secs<P: AsRef<Path>>(path: P) -> ChallengeResult<u64> {
    let path = path.as_ref();
    let reader = WavReader::open(path).map_err(|e| ChallengeError::NotAnAudioFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(ChallengeError::NotAnAudioFile {
            path: path.to_path_buf(),
            reason: "sample rate of 0".to_string(),
        });
    }
    // hound reports frames (samples per channel)
    Ok(u64::from(reader.duration()) / u64::from(spec.sample_rate))
}

/// Read back the bits of a modulated waveform.
///
/// The loudest and quietest segment peaks define the two levels, anything
/// above their midpoint is a `1`. The absolute level does not matter, which
/// lets an attenuated copy decode as well as the original.
pub fn demodulate(wave: &Waveform, bit_duration: f64) -> ChallengeResult<BitString> {
    let segment_len = samples_per_bit(wave.sample_rate, bit_duration)?;
    let segments = wave.len() / segment_len;
    if segments == 0 {
        return Err(ChallengeError::InvalidParameter(
            "the waveform is shorter than a single bit".to_string(),
        ));
    }
    let peaks: Vec<f32> = (0..segments)
        .map(|i| wave.peak(i * segment_len, (i + 1) * segment_len))
        .collect();
    let loudest = peaks.iter().cloned().fold(f32::MIN, f32::max);
    let quietest = peaks.iter().cloned().fold(f32::MAX, f32::min);
    let threshold = (loudest + quietest) / 2.0;
    Ok(BitString::from_bits(
        peaks.into_iter().map(|p| p > threshold).collect(),
    ))
}

/// Decode the flag hidden in a WAV file produced by this crate
pub fn recover_text<P: AsRef<Path>>(path: P, bit_duration: f64) -> ChallengeResult<String> {
    let wave = Waveform::load_wav(path)?;
    let bits = demodulate(&wave, bit_duration)?;
    Ok(bits.to_text())
}
