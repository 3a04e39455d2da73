//! `maudio-session` manages playback sessions on top of miniaudio.
//!
//! The crate sits above miniaudio's engine and resource manager and takes care
//! of the parts that are easy to get wrong when driving them directly:
//!
//! - turning a [`Sound`] (a description of *what* to play) into live,
//!   engine-owned playback instances,
//! - tracking every instance that is currently playing in a lock-guarded pool
//!   and retiring it when it finishes or is stopped,
//! - switching the output device without leaking or racing in-flight playback,
//! - bridging miniaudio's "sound finished" callback, which runs on the audio
//!   thread, back into managed state.
//!
//! Decoding, mixing and device I/O stay inside miniaudio.
//!
//! ## Quick start
//! ```no_run
//! # use maudio_session::{Engine, Sound};
//! # fn main() -> maudio_session::SessionResult<()> {
//! let engine = Engine::new()?;
//! let sound = engine.new_sound_from_file("click.wav".as_ref(), false)?;
//! sound.set_volume(0.5);
//! sound.play();
//! /* block the main thread while the sound is playing */
//! engine.stop_all_sounds();
//! # Ok(())
//! # }
//! ```
//!
//! ## Property writes
//! Volume, position and listener setters never return errors. Writes that are
//! out of range, or that target an engine which is not initialized, are
//! ignored. Checked variants (for example [`Engine::try_set_volume()`]) exist
//! for callers that want to know.
//!
//! # Feature flags
//!
//! ## `vorbis`
//! Forwarded to `maudio-sys`. Enables Ogg/Vorbis decoding.
//!
//! ## `ci-tests`
//! Makes [`EngineBuilder::build_for_tests()`] create a headless engine.
//!
//! ## `no-*`
//! Forwarded to `maudio-sys` to disable individual miniaudio backends.
pub mod audio;
mod context;
pub mod device;
pub mod engine;
pub mod sound;

#[cfg(test)]
pub(crate) mod test_assets;

#[doc(hidden)]
pub extern crate maudio_sys;

use maudio_sys::ffi as sys;

pub use audio::{
    formats::Format,
    math::vec3::Vec3,
    metadata::{AudioFormat, Metadata},
};
pub use device::AudioDevice;
pub use engine::{engine_builder::EngineBuilder, Engine};
pub use sound::{
    instance::{InstanceId, InstanceState},
    notifier::CompletionHandler,
    Sound, SoundDefaults, SourceLocator,
};

pub(crate) trait Binding {
    type Raw;

    fn to_raw(&self) -> Self::Raw;
}

/// A raw miniaudio result code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaError(pub sys::ma_result);

impl MaError {
    pub const ERROR: MaError = MaError(sys::ma_result_MA_ERROR);
    pub const INVALID_ARGS: MaError = MaError(sys::ma_result_MA_INVALID_ARGS);
    pub const INVALID_OPERATION: MaError = MaError(sys::ma_result_MA_INVALID_OPERATION);
    pub const OUT_OF_MEMORY: MaError = MaError(sys::ma_result_MA_OUT_OF_MEMORY);
    pub const OUT_OF_RANGE: MaError = MaError(sys::ma_result_MA_OUT_OF_RANGE);
    pub const BUSY: MaError = MaError(sys::ma_result_MA_BUSY);
    pub const DOES_NOT_EXIST: MaError = MaError(sys::ma_result_MA_DOES_NOT_EXIST);

    /// Turns a raw result into `Ok(())` on `MA_SUCCESS`.
    #[inline]
    pub(crate) fn check(res: sys::ma_result) -> Result<(), MaError> {
        if res == sys::ma_result_MA_SUCCESS {
            Ok(())
        } else {
            Err(MaError(res))
        }
    }

    pub fn code(self) -> sys::ma_result {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            sys::ma_result_MA_ERROR => "MiniaudioError",
            sys::ma_result_MA_INVALID_ARGS => "InvalidArgs",
            sys::ma_result_MA_INVALID_OPERATION => "InvalidOperation",
            sys::ma_result_MA_OUT_OF_MEMORY => "OutOfMemory",
            sys::ma_result_MA_OUT_OF_RANGE => "OutOfRange",
            sys::ma_result_MA_ACCESS_DENIED => "AccessDenied",
            sys::ma_result_MA_DOES_NOT_EXIST => "DoesNotExist",
            sys::ma_result_MA_TOO_MANY_OPEN_FILES => "TooManyOpenFiles",
            sys::ma_result_MA_INVALID_FILE => "InvalidFile",
            sys::ma_result_MA_IS_DIRECTORY => "IsDirectory",
            sys::ma_result_MA_AT_END => "AtEnd",
            sys::ma_result_MA_BUSY => "Busy",
            sys::ma_result_MA_IO_ERROR => "IoError",
            sys::ma_result_MA_UNAVAILABLE => "Unavailable",
            sys::ma_result_MA_NO_DATA_AVAILABLE => "NoDataAvailable",
            sys::ma_result_MA_NOT_IMPLEMENTED => "NotImplemented",
            sys::ma_result_MA_INVALID_DATA => "InvalidData",
            sys::ma_result_MA_TIMEOUT => "Timeout",
            sys::ma_result_MA_CANCELLED => "Cancelled",
            sys::ma_result_MA_FORMAT_NOT_SUPPORTED => "FormatNotSupported",
            sys::ma_result_MA_DEVICE_TYPE_NOT_SUPPORTED => "DeviceTypeNotSupported",
            sys::ma_result_MA_NO_BACKEND => "NoBackend",
            sys::ma_result_MA_NO_DEVICE => "NoDevice",
            sys::ma_result_MA_INVALID_DEVICE_CONFIG => "InvalidDeviceConfig",
            sys::ma_result_MA_DEVICE_NOT_INITIALIZED => "DeviceNotInitialized",
            sys::ma_result_MA_DEVICE_NOT_STARTED => "DeviceNotStarted",
            sys::ma_result_MA_FAILED_TO_INIT_BACKEND => "FailedToInitBackend",
            sys::ma_result_MA_FAILED_TO_OPEN_BACKEND_DEVICE => "FailedToOpenBackendDevice",
            sys::ma_result_MA_FAILED_TO_START_BACKEND_DEVICE => "FailedToStartBackendDevice",
            _ => "UNKNOWN_MA_ERROR",
        }
    }
}

impl std::fmt::Display for MaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl std::fmt::Debug for MaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MaError({}, {})", self.name(), self.0)
    }
}

/// Errors surfaced by construction-time operations.
///
/// Every variant that stems from a native failure carries the miniaudio result
/// code that caused it. Partially acquired native resources are always released
/// before one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("failed to initialize the audio context: {0}")]
    ContextInit(MaError),
    #[error("failed to enumerate audio devices: {0}")]
    DeviceEnumeration(MaError),
    #[error("failed to initialize the playback device: {0}")]
    DeviceInit(MaError),
    #[error("failed to initialize the audio engine: {0}")]
    EngineInit(MaError),
    #[error("failed to load `{locator}`: {code}")]
    FileLoad { locator: String, code: MaError },
    #[error("failed to start playback: {0}")]
    Playback(MaError),
    #[error("volume {0} is outside of 0.0..=1.0")]
    InvalidVolume(f32),
}

impl SessionError {
    /// The native result code behind this error, if there is one.
    pub fn code(&self) -> Option<MaError> {
        match self {
            SessionError::ContextInit(code)
            | SessionError::DeviceEnumeration(code)
            | SessionError::DeviceInit(code)
            | SessionError::EngineInit(code)
            | SessionError::Playback(code) => Some(*code),
            SessionError::FileLoad { code, .. } => Some(*code),
            SessionError::InvalidVolume(_) => None,
        }
    }

    pub(crate) fn file_load(locator: impl std::fmt::Display, code: MaError) -> Self {
        SessionError::FileLoad {
            locator: locator.to_string(),
            code,
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ma_error_is_readable() {
        let err = MaError(sys::ma_result_MA_INVALID_ARGS);
        assert!(err.to_string().contains("InvalidArgs"));

        let err = MaError(sys::ma_result_MA_DOES_NOT_EXIST);
        assert!(err.to_string().contains("DoesNotExist"));

        let err = MaError(sys::ma_result_MA_BUSY);
        assert_eq!(err.name(), "Busy");
    }

    #[test]
    fn ma_error_check_passes_success_through() {
        assert!(MaError::check(sys::ma_result_MA_SUCCESS).is_ok());
        assert_eq!(
            MaError::check(sys::ma_result_MA_INVALID_FILE),
            Err(MaError(sys::ma_result_MA_INVALID_FILE))
        );
    }

    #[test]
    fn session_error_carries_native_code() {
        let err = SessionError::file_load("/nope.wav", MaError::DOES_NOT_EXIST);
        assert_eq!(err.code(), Some(MaError::DOES_NOT_EXIST));
        assert!(err.to_string().contains("/nope.wav"));
        assert!(err.to_string().contains("DoesNotExist"));

        assert_eq!(SessionError::InvalidVolume(2.0).code(), None);
    }
}
