//! Fixtures shared by the inline test modules.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::TempDir;

use crate::{Engine, EngineBuilder};

pub(crate) const TEST_SAMPLE_RATE: u32 = 48_000;

/// A WAV file inside its own temp dir. The dir is removed on drop.
pub(crate) struct WavFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl WavFixture {
    /// Writes a 16-bit 440Hz sine with `frames` frames.
    pub(crate) fn sine(channels: u16, sample_rate: u32, frames: u32) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("wav writer");
        for n in 0..frames {
            let t = n as f32 / sample_rate as f32;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.25;
            for _ in 0..channels {
                writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .expect("wav sample");
            }
        }
        writer.finalize().expect("wav finalize");

        Self { _dir: dir, path }
    }

    /// A file with a `.wav` extension that does not contain audio.
    pub(crate) fn garbage() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").expect("write garbage");
        Self { _dir: dir, path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

/// Headless engine that renders only when frames are pulled from it.
pub(crate) fn headless_engine() -> Arc<Engine> {
    EngineBuilder::new()
        .no_device(true)
        .set_channels(2)
        .set_sample_rate(TEST_SAMPLE_RATE)
        .build()
        .expect("headless engine")
}

/// Pulls `seconds` worth of audio through a headless engine.
pub(crate) fn pump(engine: &Engine, seconds: f64) {
    let mut remaining = (seconds * TEST_SAMPLE_RATE as f64).ceil() as u64;
    while remaining > 0 {
        let chunk = remaining.min(1024);
        engine.read_pcm_frames(chunk).expect("read frames");
        remaining -= chunk;
    }
}

#[inline]
pub(crate) fn assert_f32_eq(a: f32, b: f32) {
    approx::assert_abs_diff_eq!(a, b, epsilon = 1e-6);
}
