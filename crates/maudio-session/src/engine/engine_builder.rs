use std::{sync::Arc, time::Duration};

use maudio_sys::ffi as sys;

use crate::{engine::Engine, SessionResult};

/// Channels used for a headless engine when none were set.
const HEADLESS_CHANNELS: u32 = 2;
/// Sample rate used for a headless engine when none was set.
const HEADLESS_SAMPLE_RATE: u32 = 48_000;

/// Configuration for an [`Engine`].
///
/// The configuration is retained by the engine: switching the output device
/// rebuilds the native engine with the same settings.
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    channels: u32,
    sample_rate: u32,
    no_device: bool,
    no_auto_start: bool,
    listener_count: u32,
    job_thread_count: Option<u32>,
    ready_retry_delay: Duration,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            channels: 0,
            sample_rate: 0,
            no_device: false,
            no_auto_start: false,
            listener_count: 1,
            job_thread_count: None,
            ready_retry_delay: Duration::from_millis(10),
        }
    }

    /// Sets how many listeners the engine will create.
    ///
    /// The default is `1` listener (index `0`).
    pub fn listener_count(mut self, count: u32) -> Self {
        self.listener_count = count;
        self
    }

    /// Sets up the engine without an output device.
    ///
    /// Audio is only rendered when frames are pulled with
    /// [`Engine::read_pcm_frames()`], which also drives end-of-playback
    /// notifications. Unset channels and sample rate fall back to stereo
    /// at 48kHz.
    pub fn no_device(mut self, enabled: bool) -> Self {
        self.no_device = enabled;
        self
    }

    /// The number of channels to use when mixing and spatializing.
    ///
    /// When set to 0, will use the native channel count of the device.
    pub fn set_channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    /// When set to 0 will use the native sample rate of the device.
    pub fn set_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// False by default, meaning the engine will be started automatically on creation.
    pub fn no_auto_start(mut self, yes: bool) -> Self {
        self.no_auto_start = yes;
        self
    }

    /// Number of resource manager job threads. Uses miniaudio's default when unset.
    pub fn resource_job_threads(mut self, count: u32) -> Self {
        self.job_thread_count = Some(count);
        self
    }

    /// How long instance creation waits before re-checking a data source
    /// that still reports `MA_BUSY`. Defaults to 10ms.
    pub fn ready_retry_delay(mut self, delay: Duration) -> Self {
        self.ready_retry_delay = delay;
        self
    }

    pub fn build(self) -> SessionResult<Arc<Engine>> {
        Engine::new_with_config(self)
    }

    /// Honors the `ci-tests` feature by building a headless engine.
    pub fn build_for_tests(self) -> SessionResult<Arc<Engine>> {
        if cfg!(feature = "ci-tests") {
            self.no_device(true)
                .set_channels(2)
                .set_sample_rate(44_100)
                .build()
        } else {
            self.build()
        }
    }

    pub(crate) fn is_headless(&self) -> bool {
        self.no_device
    }

    pub(crate) fn channels(&self) -> u32 {
        if self.no_device && self.channels == 0 {
            HEADLESS_CHANNELS
        } else {
            self.channels
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        if self.no_device && self.sample_rate == 0 {
            HEADLESS_SAMPLE_RATE
        } else {
            self.sample_rate
        }
    }

    pub(crate) fn job_thread_count(&self) -> Option<u32> {
        self.job_thread_count
    }

    pub(crate) fn retry_delay(&self) -> Duration {
        self.ready_retry_delay
    }

    /// Native engine config, without the resource manager and device pointers.
    pub(crate) fn to_raw(&self) -> sys::ma_engine_config {
        let mut config = unsafe { sys::ma_engine_config_init() };
        config.channels = self.channels();
        config.sampleRate = self.sample_rate();
        config.noDevice = self.no_device as sys::ma_bool32;
        config.noAutoStart = self.no_auto_start as sys::ma_bool32;
        config.listenerCount = self.listener_count;
        config
    }
}
