//! Sound definitions: *what* to play.
//!
//! A [`Sound`] names a source (path or `file://` URI), carries the defaults
//! applied to each new playback instance and the metadata probed when it was
//! created. It never owns live playback; instances belong to the
//! [`Engine`]'s pool.
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
    audio::{
        math::vec3::Vec3,
        metadata::{AudioFormat, Metadata},
    },
    engine::{
        resource::{
            rm_source::{NativePath, ResourceManagerSource},
            rm_source_flags::RmSourceFlags,
            ResourceManager,
        },
        Engine,
    },
    MaError, SessionError, SessionResult,
};

pub mod instance;
pub mod notifier;
pub(crate) mod sound_flags;

/// Where a sound's data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Path(PathBuf),
    /// A `file://` URI and the path it resolves to.
    Uri { uri: String, path: PathBuf },
}

impl SourceLocator {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        SourceLocator::Path(path.into())
    }

    /// Only the `file` scheme is supported.
    pub fn from_uri(uri: &str) -> SessionResult<Self> {
        let invalid = || SessionError::file_load(uri, MaError::INVALID_ARGS);
        let parsed = url::Url::parse(uri).map_err(|_| invalid())?;
        if parsed.scheme() != "file" {
            return Err(invalid());
        }
        let path = parsed.to_file_path().map_err(|_| invalid())?;
        Ok(SourceLocator::Uri {
            uri: uri.to_owned(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            SourceLocator::Path(path) => path,
            SourceLocator::Uri { path, .. } => path,
        }
    }

    pub(crate) fn native_path(&self) -> Result<NativePath, MaError> {
        NativePath::new(self.path())
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
            SourceLocator::Uri { uri, .. } => f.write_str(uri),
        }
    }
}

/// Settings copied into every instance created after they were set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundDefaults {
    pub volume: f32,
    pub position: Vec3,
    pub looping: bool,
}

impl Default for SoundDefaults {
    fn default() -> Self {
        Self {
            volume: 1.0,
            position: Vec3::ZERO,
            looping: false,
        }
    }
}

pub(crate) struct SoundShared {
    locator: SourceLocator,
    spatial: bool,
    defaults: Mutex<SoundDefaults>,
    metadata: Metadata,
    engine: Weak<Engine>,
}

/// A playable sound definition.
///
/// Cloning is cheap and yields a handle to the *same* definition: instances
/// started through either clone are grouped together by [`Sound::stop()`] and
/// friends.
#[derive(Clone)]
pub struct Sound {
    pub(crate) shared: Arc<SoundShared>,
}

impl Sound {
    /// Creates a sound on the process-wide engine (see [`Engine::shared()`]).
    pub fn from_path(path: impl AsRef<Path>, spatial: bool) -> SessionResult<Sound> {
        Engine::shared()?.new_sound_from_file(path.as_ref(), spatial)
    }

    /// Creates a sound from a `file://` URI on the process-wide engine.
    pub fn from_uri(uri: &str, spatial: bool) -> SessionResult<Sound> {
        Engine::shared()?.new_sound_from_uri(uri, spatial)
    }

    pub(crate) fn new(
        engine: &Arc<Engine>,
        locator: SourceLocator,
        spatial: bool,
    ) -> SessionResult<Sound> {
        let metadata = engine.probe_metadata(&locator)?;
        tracing::debug!(
            %locator,
            channels = metadata.channels(),
            sample_rate = metadata.sample_rate(),
            duration = metadata.duration(),
            "sound created"
        );
        Ok(Sound {
            shared: Arc::new(SoundShared {
                locator,
                spatial,
                defaults: Mutex::new(SoundDefaults::default()),
                metadata,
                engine: Arc::downgrade(engine),
            }),
        })
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.shared.locator
    }

    pub fn is_spatial(&self) -> bool {
        self.shared.spatial
    }

    pub fn metadata(&self) -> &Metadata {
        &self.shared.metadata
    }

    /// Duration in seconds, from the metadata.
    pub fn duration(&self) -> f64 {
        self.shared.metadata.duration()
    }

    /// The engine this sound plays on, if it is still alive.
    pub fn engine(&self) -> Option<Arc<Engine>> {
        self.shared.engine.upgrade()
    }

    /// Whether `self` and `other` are handles to the same definition.
    pub fn ptr_eq(&self, other: &Sound) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn defaults(&self) -> SoundDefaults {
        *self.shared.defaults.lock()
    }

    pub fn volume(&self) -> f32 {
        self.shared.defaults.lock().volume
    }

    /// Default volume for new instances. Values outside `0.0..=1.0` are ignored.
    pub fn set_volume(&self, volume: f32) {
        if (0.0..=1.0).contains(&volume) {
            self.shared.defaults.lock().volume = volume;
        }
    }

    pub fn position(&self) -> Vec3 {
        self.shared.defaults.lock().position
    }

    pub fn set_position(&self, position: Vec3) {
        self.shared.defaults.lock().position = position;
    }

    pub fn loops(&self) -> bool {
        self.shared.defaults.lock().looping
    }

    pub fn set_loops(&self, looping: bool) {
        self.shared.defaults.lock().looping = looping;
    }

    /// Starts a new instance of this sound. Returns `false` if the engine is
    /// gone or the instance could not be created or started.
    pub fn play(&self) -> bool {
        match self.engine() {
            Some(engine) => engine.play(self),
            None => false,
        }
    }

    /// Whether any instance of this sound is playing.
    pub fn is_playing(&self) -> bool {
        self.engine().is_some_and(|engine| engine.is_sound_playing(self))
    }

    /// Pauses every instance of this sound. Returns whether any was paused.
    pub fn pause(&self) -> bool {
        self.engine().is_some_and(|engine| engine.pause_sound(self))
    }

    /// Resumes every paused instance of this sound.
    pub fn resume(&self) -> bool {
        self.engine().is_some_and(|engine| engine.resume_sound(self))
    }

    /// Stops every instance of this sound and removes them from the pool.
    pub fn stop(&self) -> bool {
        self.engine().is_some_and(|engine| engine.stop_sound(self))
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("locator", &self.shared.locator)
            .field("spatial", &self.shared.spatial)
            .field("metadata", &self.shared.metadata)
            .finish_non_exhaustive()
    }
}

/// Opens a transient decoded data source to read the source's format and
/// length, then releases it.
pub(crate) fn probe(rm: &ResourceManager, locator: &SourceLocator) -> SessionResult<Metadata> {
    let load_err = |code| SessionError::file_load(locator, code);

    let path = locator.native_path().map_err(load_err)?;
    let source = ResourceManagerSource::open(
        rm,
        &path,
        RmSourceFlags::DECODE | RmSourceFlags::WAIT_INIT,
    )
    .map_err(load_err)?;
    let format = source.data_format().map_err(load_err)?;
    let length = source.length_in_pcm_frames().unwrap_or(0);

    Ok(Metadata::new(
        AudioFormat::from_path(locator.path()),
        format.format,
        format.channels,
        format.sample_rate,
        length,
    ))
}
