//! Descriptive information about a sound source, probed once when a
//! [`Sound`](crate::Sound) is created.
use std::path::Path;

use maudio_sys::ffi as sys;

use crate::audio::formats::Format;

/// Container format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
    Mp3,
    Vorbis,
    Unknown,
}

impl AudioFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return AudioFormat::Unknown,
        };
        match ext.as_str() {
            "wav" | "wave" => AudioFormat::Wav,
            "flac" => AudioFormat::Flac,
            "mp3" => AudioFormat::Mp3,
            "ogg" | "oga" => AudioFormat::Vorbis,
            _ => AudioFormat::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    format: AudioFormat,
    sample_format: Option<Format>,
    channels: u32,
    sample_rate: u32,
    bit_depth: u32,
    length_in_frames: u64,
}

impl Metadata {
    pub(crate) fn new(
        format: AudioFormat,
        raw_format: sys::ma_format,
        channels: u32,
        sample_rate: u32,
        length_in_frames: u64,
    ) -> Self {
        Self {
            format,
            sample_format: Format::try_from(raw_format).ok(),
            channels,
            sample_rate,
            bit_depth: Format::bit_depth_of(raw_format),
            length_in_frames,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Decoded sample format, if miniaudio reported a known one.
    pub fn sample_format(&self) -> Option<Format> {
        self.sample_format
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    pub fn length_in_frames(&self) -> u64 {
        self.length_in_frames
    }

    /// Duration in seconds. Zero when the sample rate is unknown.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length_in_frames as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn audio_format_from_extension() {
        assert_eq!(AudioFormat::from_path(Path::new("a/b.wav")), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_path(Path::new("b.WAV")), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_path(Path::new("b.flac")), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_path(Path::new("b.mp3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("b.ogg")), AudioFormat::Vorbis);
        assert_eq!(AudioFormat::from_path(Path::new("b.aiff")), AudioFormat::Unknown);
        assert_eq!(AudioFormat::from_path(Path::new("noext")), AudioFormat::Unknown);
    }

    #[test]
    fn metadata_duration_is_frames_over_rate() {
        let meta = Metadata::new(
            AudioFormat::Wav,
            sys::ma_format_ma_format_s16,
            2,
            48_000,
            24_000,
        );
        assert_eq!(meta.duration(), 0.5);
        assert_eq!(meta.bit_depth(), 16);
        assert_eq!(meta.sample_format(), Some(Format::S16));
    }

    #[test]
    fn metadata_duration_zero_without_rate() {
        let meta = Metadata::new(
            AudioFormat::Unknown,
            sys::ma_format_ma_format_unknown,
            0,
            0,
            1000,
        );
        assert_eq!(meta.duration(), 0.0);
        assert_eq!(meta.bit_depth(), 0);
        assert_eq!(meta.sample_format(), None);
    }
}
