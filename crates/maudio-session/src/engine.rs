//! Playback session engine.
//!
//! [`Engine`] owns the native miniaudio cluster (resource manager, engine and,
//! after [`Engine::set_output_device()`], an explicit context and device) and
//! the pool of instances that are currently playing.
//!
//! ## Quick start
//! ```no_run
//! # use maudio_session::Engine;
//! # fn main() -> maudio_session::SessionResult<()> {
//! let engine = Engine::new()?;
//! let sound = engine.new_sound_from_file("music.ogg".as_ref(), false)?;
//! let id = engine.try_play(&sound)?;
//! engine.pause_instance(id);
//! engine.resume_instance(id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//! Every method takes `&self`. Playback and property calls share a read lock
//! on the native cluster; switching the output device takes it exclusively,
//! so a device switch never races a `play()`.
//!
//! miniaudio mixes on its own audio thread. Completion handlers run there.
//! A handler may stop instances (its own included); they leave the pool on the
//! next engine call made outside a handler. [`Engine::set_output_device()`]
//! fails with `MA_INVALID_OPERATION` when called from a handler.
use std::{mem::MaybeUninit, path::Path, sync::Arc};

use maudio_sys::ffi as sys;
use parking_lot::{Mutex, RwLock};

use crate::{
    audio::{math::vec3::Vec3, metadata::Metadata},
    context::Context,
    device::{AudioDevice, Device},
    engine::{engine_builder::EngineBuilder, pool::InstancePool, resource::ResourceManager},
    sound::{
        instance::{InstanceId, InstanceState, PlaybackInstance},
        notifier::{self, CompletionHandler},
        probe, Sound, SourceLocator,
    },
    Binding, MaError, SessionError, SessionResult,
};

pub mod engine_builder;
pub(crate) mod pool;
pub(crate) mod resource;

static SHARED: Mutex<Option<Arc<Engine>>> = Mutex::new(None);

/// The native objects behind an [`Engine`].
///
/// Teardown order is pool, device, engine, resource manager, context. The
/// engine storage is allocated once and reused across device switches, so
/// the address handed to a device's data callback stays valid.
struct NativeEngine {
    engine: *mut sys::ma_engine,
    initialized: bool,
    resource_manager: ResourceManager,
    device: Option<Device>,
    context: Option<Context>,
}

unsafe impl Send for NativeEngine {}
unsafe impl Sync for NativeEngine {}

impl NativeEngine {
    fn new(config: &EngineBuilder) -> SessionResult<Self> {
        let resource_manager = ResourceManager::new(config.job_thread_count())
            .map_err(SessionError::EngineInit)?;
        let engine = Box::into_raw(Box::new(MaybeUninit::<sys::ma_engine>::uninit()))
            .cast::<sys::ma_engine>();

        let mut native = NativeEngine {
            engine,
            initialized: false,
            resource_manager,
            device: None,
            context: None,
        };
        // On failure `native` drops here and releases the resource manager.
        native.init_engine(config)?;
        Ok(native)
    }

    fn init_engine(&mut self, config: &EngineBuilder) -> SessionResult<()> {
        let mut raw = config.to_raw();
        raw.pResourceManager = self.resource_manager.to_raw();
        if let Some(device) = &self.device {
            raw.pDevice = device.to_raw();
            raw.noDevice = 0;
        }
        engine_ffi::engine_init(&raw, self.engine).map_err(SessionError::EngineInit)?;
        self.initialized = true;
        Ok(())
    }

    /// Releases the device and the engine. The device storage is freed only
    /// after the engine, which may still reference it while uninitializing.
    fn release_engine(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.release();
        }
        if self.initialized {
            engine_ffi::engine_uninit(self.engine);
            self.initialized = false;
        }
        self.device = None;
    }

    fn reconfigure(
        &mut self,
        target: Option<&AudioDevice>,
        config: &EngineBuilder,
    ) -> SessionResult<()> {
        self.release_engine();

        if self.context.is_none() {
            self.context = Some(Context::new()?);
        }
        if let (Some(target), Some(context)) = (target, self.context.as_ref()) {
            self.device = Some(Device::new_playback(
                context,
                target,
                self.engine,
                config.channels(),
                config.sample_rate(),
            )?);
        }

        if let Err(err) = self.init_engine(config) {
            self.device = None;
            return Err(err);
        }
        Ok(())
    }

    fn engine_ptr(&self) -> Option<*mut sys::ma_engine> {
        self.initialized.then_some(self.engine)
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.release_engine();
        drop(unsafe { Box::from_raw(self.engine.cast::<MaybeUninit<sys::ma_engine>>()) });
        // `resource_manager` and then `context` are released by field order.
    }
}

/// Playback session engine.
///
/// Create one with [`Engine::new()`], an [`EngineBuilder`], or use the
/// process-wide instance from [`Engine::shared()`].
pub struct Engine {
    pool: InstancePool,
    native: RwLock<NativeEngine>,
    config: EngineBuilder,
}

impl Engine {
    /// Creates an engine that plays through the default output device.
    pub fn new() -> SessionResult<Arc<Self>> {
        EngineBuilder::new().build()
    }

    pub(crate) fn new_with_config(config: EngineBuilder) -> SessionResult<Arc<Self>> {
        let native = match NativeEngine::new(&config) {
            Ok(native) => native,
            Err(err) => {
                tracing::warn!(error = %err, "audio engine initialization failed");
                return Err(err);
            }
        };
        let engine = Arc::new(Self {
            pool: InstancePool::new(),
            native: RwLock::new(native),
            config,
        });
        tracing::info!(
            channels = engine.channels(),
            sample_rate = engine.sample_rate(),
            headless = engine.config.is_headless(),
            "audio engine initialized"
        );
        Ok(engine)
    }

    /// The process-wide engine, created with default settings on first access.
    ///
    /// A failed creation is returned to the caller and retried on the next
    /// access.
    pub fn shared() -> SessionResult<Arc<Engine>> {
        Self::init_shared(EngineBuilder::new())
    }

    /// Like [`Engine::shared()`], but creates the engine with `config` if it
    /// does not exist yet. An existing engine is returned unchanged.
    pub fn init_shared(config: EngineBuilder) -> SessionResult<Arc<Engine>> {
        let mut shared = SHARED.lock();
        if let Some(engine) = shared.as_ref() {
            return Ok(engine.clone());
        }
        let engine = config.build()?;
        *shared = Some(engine.clone());
        Ok(engine)
    }

    /// Releases the process-wide engine. It is torn down once the last
    /// outstanding `Arc` is dropped. Returns whether one existed.
    pub fn shutdown_shared() -> bool {
        let engine = SHARED.lock().take();
        let existed = engine.is_some();
        drop(engine);
        existed
    }

    pub fn new_sound_from_file(self: &Arc<Self>, path: &Path, spatial: bool) -> SessionResult<Sound> {
        Sound::new(self, SourceLocator::from_path(path), spatial)
    }

    /// Only `file://` URIs are supported.
    pub fn new_sound_from_uri(self: &Arc<Self>, uri: &str, spatial: bool) -> SessionResult<Sound> {
        Sound::new(self, SourceLocator::from_uri(uri)?, spatial)
    }

    pub fn new_sound(self: &Arc<Self>, locator: SourceLocator, spatial: bool) -> SessionResult<Sound> {
        Sound::new(self, locator, spatial)
    }

    pub(crate) fn probe_metadata(&self, locator: &SourceLocator) -> SessionResult<Metadata> {
        let native = self.native.read();
        probe(&native.resource_manager, locator)
    }

    /// Whether the native engine is currently usable. Only `false` after a
    /// failed [`Engine::set_output_device()`].
    pub fn is_initialized(&self) -> bool {
        self.native.read().initialized
    }

    /// Plays a new instance of `sound`. Returns `false` if the instance could
    /// not be created or started.
    pub fn play(&self, sound: &Sound) -> bool {
        self.try_play(sound).is_ok()
    }

    /// Plays a new instance of `sound` and returns its id.
    pub fn try_play(&self, sound: &Sound) -> SessionResult<InstanceId> {
        self.start_instance(sound, None)
    }

    /// Like [`Engine::try_play()`], and calls `on_complete` on the audio
    /// thread when the instance reaches its end.
    ///
    /// `on_complete` may stop instances through this engine. Instances it stops
    /// are evicted by the next engine call made outside a handler. It must not
    /// block, and should hold the engine through a `Weak` to avoid a cycle.
    pub fn play_with_completion<F>(&self, sound: &Sound, on_complete: F) -> SessionResult<InstanceId>
    where
        F: Fn(InstanceId) + Send + Sync + 'static,
    {
        self.start_instance(sound, Some(Box::new(on_complete)))
    }

    /// Loads and plays a file in one step. Errors are folded into `false`.
    pub fn play_file(self: &Arc<Self>, path: impl AsRef<Path>, spatial: bool) -> bool {
        self.new_sound_from_file(path.as_ref(), spatial)
            .map(|sound| self.play(&sound))
            .unwrap_or(false)
    }

    /// Loads and plays a `file://` URI in one step. Errors are folded into `false`.
    pub fn play_uri(self: &Arc<Self>, uri: &str, spatial: bool) -> bool {
        self.new_sound_from_uri(uri, spatial)
            .map(|sound| self.play(&sound))
            .unwrap_or(false)
    }

    fn new_instance(&self, native: &NativeEngine, sound: &Sound) -> SessionResult<PlaybackInstance> {
        let engine = native
            .engine_ptr()
            .ok_or(SessionError::Playback(MaError::INVALID_OPERATION))?;
        PlaybackInstance::new(
            sound,
            engine,
            native.resource_manager.to_raw(),
            self.config.retry_delay(),
        )
    }

    #[cfg(test)]
    pub(crate) fn build_instance(&self, sound: &Sound) -> SessionResult<PlaybackInstance> {
        let native = self.native.read();
        self.new_instance(&native, sound)
    }

    fn start_instance(
        &self,
        sound: &Sound,
        on_complete: Option<CompletionHandler>,
    ) -> SessionResult<InstanceId> {
        let native = self.native.read();
        self.pool.reap();

        let instance = match self.new_instance(&native, sound) {
            Ok(instance) => Arc::new(instance),
            Err(err) => {
                tracing::warn!(locator = %sound.locator(), error = %err, "failed to create playback instance");
                return Err(err);
            }
        };
        let id = instance.id();
        self.pool.insert(instance.clone());

        let finished = self.pool.finished_sender();
        instance.set_completion_handler(Some(Box::new(move |id| {
            let _ = finished.send(id);
            if let Some(on_complete) = &on_complete {
                on_complete(id);
            }
        })));

        if let Err(code) = instance.play() {
            tracing::warn!(instance = %id, error = %code, "failed to start playback instance");
            drop(self.pool.evict(id));
            return Err(SessionError::Playback(code));
        }
        tracing::trace!(instance = %id, locator = %sound.locator(), "playback started");
        Ok(id)
    }

    /// Stops every playing instance and empties the pool.
    pub fn stop_all_sounds(&self) {
        let _native = self.native.read();
        self.pool.reap();
        self.pool.stop_all();
        tracing::debug!("stopped all sounds");
    }

    /// Whether any pooled instance is playing.
    pub fn is_playing(&self) -> bool {
        let _native = self.native.read();
        self.pool.reap();
        self.pool.any_playing()
    }

    /// Number of instances in the pool, after evicting finished ones.
    pub fn active_count(&self) -> usize {
        let _native = self.native.read();
        self.pool.reap();
        self.pool.len()
    }

    fn with_instance<R>(&self, id: InstanceId, f: impl FnOnce(&PlaybackInstance) -> R) -> Option<R> {
        let _native = self.native.read();
        self.pool.reap();
        let instance = self.pool.get(id)?;
        Some(f(&instance))
    }

    /// `None` once the instance left the pool.
    pub fn instance_state(&self, id: InstanceId) -> Option<InstanceState> {
        self.with_instance(id, |i| i.state())
    }

    pub fn pause_instance(&self, id: InstanceId) -> bool {
        self.with_instance(id, |i| i.pause()).unwrap_or(false)
    }

    pub fn resume_instance(&self, id: InstanceId) -> bool {
        self.with_instance(id, |i| i.resume()).unwrap_or(false)
    }

    /// Stops the instance and removes it from the pool.
    pub fn stop_instance(&self, id: InstanceId) -> bool {
        let _native = self.native.read();
        self.pool.reap();
        let Some(instance) = self.pool.get(id) else {
            return false;
        };
        let stopped = instance.stop();
        drop(self.pool.retire(id));
        stopped
    }

    pub fn instance_volume(&self, id: InstanceId) -> f32 {
        self.with_instance(id, |i| i.volume()).unwrap_or(0.0)
    }

    /// Values outside `0.0..=1.0` are ignored.
    pub fn set_instance_volume(&self, id: InstanceId, volume: f32) {
        self.with_instance(id, |i| i.set_volume(volume));
    }

    pub fn instance_loops(&self, id: InstanceId) -> bool {
        self.with_instance(id, |i| i.loops()).unwrap_or(false)
    }

    pub fn set_instance_loops(&self, id: InstanceId, looping: bool) {
        self.with_instance(id, |i| i.set_loops(looping));
    }

    pub fn instance_position(&self, id: InstanceId) -> Vec3 {
        self.with_instance(id, |i| i.position()).unwrap_or(Vec3::ZERO)
    }

    pub fn set_instance_position(&self, id: InstanceId, position: Vec3) {
        self.with_instance(id, |i| i.set_position(position));
    }

    /// Playback cursor in seconds.
    pub fn instance_time(&self, id: InstanceId) -> f64 {
        self.with_instance(id, |i| i.current_time()).unwrap_or(0.0)
    }

    /// Seeks to `seconds`. Negative values are ignored.
    pub fn seek_instance(&self, id: InstanceId, seconds: f64) {
        self.with_instance(id, |i| i.set_current_time(seconds));
    }

    pub fn instance_duration(&self, id: InstanceId) -> f64 {
        self.with_instance(id, |i| i.duration()).unwrap_or(0.0)
    }

    pub(crate) fn is_sound_playing(&self, sound: &Sound) -> bool {
        let _native = self.native.read();
        self.pool.reap();
        self.pool.any_playing_from(sound)
    }

    pub(crate) fn pause_sound(&self, sound: &Sound) -> bool {
        let _native = self.native.read();
        self.pool.reap();
        let instances = self.pool.snapshot_from(sound);
        instances.iter().fold(false, |any, i| i.pause() || any)
    }

    pub(crate) fn resume_sound(&self, sound: &Sound) -> bool {
        let _native = self.native.read();
        self.pool.reap();
        let instances = self.pool.snapshot_from(sound);
        instances
            .iter()
            .filter(|i| i.state() == InstanceState::Paused)
            .fold(false, |any, i| i.resume() || any)
    }

    pub(crate) fn stop_sound(&self, sound: &Sound) -> bool {
        let _native = self.native.read();
        self.pool.reap();
        let instances = self.pool.snapshot_from(sound);
        for instance in &instances {
            instance.stop();
            drop(self.pool.retire(instance.id()));
        }
        !instances.is_empty()
    }

    /// Master volume. Zero while the engine is not initialized.
    pub fn volume(&self) -> f32 {
        let native = self.native.read();
        native.engine_ptr().map_or(0.0, engine_ffi::ma_engine_get_volume)
    }

    /// Values outside `0.0..=1.0` are ignored, as are writes while the engine
    /// is not initialized.
    pub fn set_volume(&self, volume: f32) {
        let _ = self.try_set_volume(volume);
    }

    pub fn try_set_volume(&self, volume: f32) -> SessionResult<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SessionError::InvalidVolume(volume));
        }
        let native = self.native.read();
        let engine = native
            .engine_ptr()
            .ok_or(SessionError::EngineInit(MaError::INVALID_OPERATION))?;
        engine_ffi::ma_engine_set_volume(engine, volume).map_err(SessionError::EngineInit)
    }

    pub fn channels(&self) -> u32 {
        let native = self.native.read();
        native.engine_ptr().map_or(0, engine_ffi::ma_engine_get_channels)
    }

    pub fn sample_rate(&self) -> u32 {
        let native = self.native.read();
        native.engine_ptr().map_or(0, engine_ffi::ma_engine_get_sample_rate)
    }

    /// Mixes up to `frame_count` frames of interleaved f32 audio. An engine
    /// with nothing to mix may return fewer frames, or none.
    ///
    /// Meant for engines built with [`EngineBuilder::no_device()`]; end of
    /// playback is detected while frames are read. Requests too large to
    /// buffer fail with [`SessionError::Playback`].
    pub fn read_pcm_frames(&self, frame_count: u64) -> SessionResult<(Vec<f32>, u64)> {
        let native = self.native.read();
        let engine = native
            .engine_ptr()
            .ok_or(SessionError::EngineInit(MaError::INVALID_OPERATION))?;
        engine_ffi::ma_engine_read_pcm_frames(engine, frame_count).map_err(SessionError::Playback)
    }

    pub fn set_listener_position(&self, position: Vec3) {
        let native = self.native.read();
        if let Some(engine) = native.engine_ptr() {
            engine_ffi::ma_engine_listener_set_position(engine, 0, position);
        }
    }

    pub fn listener_position(&self) -> Vec3 {
        let native = self.native.read();
        native.engine_ptr().map_or(Vec3::ZERO, |engine| {
            engine_ffi::ma_engine_listener_get_position(engine, 0)
        })
    }

    /// Sets the facing direction and the world "up" vector of the listener.
    pub fn set_listener_direction(&self, forward: Vec3, up: Vec3) {
        let native = self.native.read();
        if let Some(engine) = native.engine_ptr() {
            engine_ffi::ma_engine_listener_set_direction(engine, 0, forward);
            engine_ffi::ma_engine_listener_set_world_up(engine, 0, up);
        }
    }

    pub fn listener_direction(&self) -> (Vec3, Vec3) {
        let native = self.native.read();
        native.engine_ptr().map_or((Vec3::FORWARD, Vec3::UP), |engine| {
            (
                engine_ffi::ma_engine_listener_get_direction(engine, 0),
                engine_ffi::ma_engine_listener_get_world_up(engine, 0),
            )
        })
    }

    pub fn set_listener_velocity(&self, velocity: Vec3) {
        let native = self.native.read();
        if let Some(engine) = native.engine_ptr() {
            engine_ffi::ma_engine_listener_set_velocity(engine, 0, velocity);
        }
    }

    pub fn listener_velocity(&self) -> Vec3 {
        let native = self.native.read();
        native.engine_ptr().map_or(Vec3::ZERO, |engine| {
            engine_ffi::ma_engine_listener_get_velocity(engine, 0)
        })
    }

    /// Rebuilds the engine on `device`, or on the default device for `None`.
    ///
    /// Every playing instance is stopped and dropped first; playback positions
    /// are not carried over. If this fails the engine stays uninitialized
    /// (playback fails, volume reads zero) until a later call succeeds.
    pub fn set_output_device(&self, device: Option<&AudioDevice>) -> SessionResult<()> {
        if notifier::in_completion_handler() {
            return Err(SessionError::EngineInit(MaError::INVALID_OPERATION));
        }
        let mut native = self.native.write();
        self.pool.reap();
        self.pool.stop_all();

        let result = native.reconfigure(device, &self.config);
        match &result {
            Ok(()) => tracing::info!(
                device = device.map_or("default", |d| d.name()),
                "output device switched"
            ),
            Err(err) => tracing::warn!(error = %err, "output device switch failed"),
        }
        result
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.pool.stop_all();
        tracing::debug!("audio engine shut down");
    }
}

pub(crate) mod engine_ffi {
    use maudio_sys::ffi as sys;

    use crate::{audio::math::vec3::Vec3, MaError};

    #[inline]
    pub fn engine_init(
        config: &sys::ma_engine_config,
        engine: *mut sys::ma_engine,
    ) -> Result<(), MaError> {
        let res = unsafe { sys::ma_engine_init(config, engine) };
        MaError::check(res)
    }

    #[inline]
    pub fn engine_uninit(engine: *mut sys::ma_engine) {
        unsafe {
            sys::ma_engine_uninit(engine);
        }
    }

    /// Fails with `MA_OUT_OF_RANGE` when `frame_count` frames do not fit in a
    /// buffer, and `MA_OUT_OF_MEMORY` when the buffer cannot be allocated.
    pub fn ma_engine_read_pcm_frames(
        engine: *mut sys::ma_engine,
        frame_count: u64,
    ) -> Result<(Vec<f32>, u64), MaError> {
        let channels = ma_engine_get_channels(engine);
        let samples = frame_count
            .checked_mul(u64::from(channels))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(MaError::OUT_OF_RANGE)?;
        let mut buffer: Vec<f32> = Vec::new();
        buffer
            .try_reserve_exact(samples)
            .map_err(|_| MaError::OUT_OF_MEMORY)?;
        buffer.resize(samples, 0.0);
        let mut frames_read = 0;
        let res = unsafe {
            sys::ma_engine_read_pcm_frames(
                engine,
                buffer.as_mut_ptr() as *mut std::ffi::c_void,
                frame_count,
                &mut frames_read,
            )
        };
        MaError::check(res)?;
        buffer.truncate((frames_read * channels as u64) as usize);
        Ok((buffer, frames_read))
    }

    #[inline]
    pub fn ma_engine_get_channels(engine: *mut sys::ma_engine) -> u32 {
        unsafe { sys::ma_engine_get_channels(engine) }
    }

    #[inline]
    pub fn ma_engine_get_sample_rate(engine: *mut sys::ma_engine) -> u32 {
        unsafe { sys::ma_engine_get_sample_rate(engine) }
    }

    #[inline]
    pub fn ma_engine_set_volume(engine: *mut sys::ma_engine, volume: f32) -> Result<(), MaError> {
        let res = unsafe { sys::ma_engine_set_volume(engine, volume) };
        MaError::check(res)
    }

    #[inline]
    pub fn ma_engine_get_volume(engine: *mut sys::ma_engine) -> f32 {
        unsafe { sys::ma_engine_get_volume(engine) }
    }

    #[inline]
    pub fn ma_engine_listener_set_position(engine: *mut sys::ma_engine, listener: u32, position: Vec3) {
        unsafe {
            sys::ma_engine_listener_set_position(engine, listener, position.x, position.y, position.z)
        };
    }

    #[inline]
    pub fn ma_engine_listener_get_position(engine: *mut sys::ma_engine, listener: u32) -> Vec3 {
        let vec = unsafe { sys::ma_engine_listener_get_position(engine as *const _, listener) };
        vec.into()
    }

    #[inline]
    pub fn ma_engine_listener_set_direction(engine: *mut sys::ma_engine, listener: u32, direction: Vec3) {
        unsafe {
            sys::ma_engine_listener_set_direction(
                engine,
                listener,
                direction.x,
                direction.y,
                direction.z,
            )
        };
    }

    #[inline]
    pub fn ma_engine_listener_get_direction(engine: *mut sys::ma_engine, listener: u32) -> Vec3 {
        let vec = unsafe { sys::ma_engine_listener_get_direction(engine as *const _, listener) };
        vec.into()
    }

    #[inline]
    pub fn ma_engine_listener_set_velocity(engine: *mut sys::ma_engine, listener: u32, velocity: Vec3) {
        unsafe {
            sys::ma_engine_listener_set_velocity(
                engine,
                listener,
                velocity.x,
                velocity.y,
                velocity.z,
            )
        };
    }

    #[inline]
    pub fn ma_engine_listener_get_velocity(engine: *mut sys::ma_engine, listener: u32) -> Vec3 {
        let vec = unsafe { sys::ma_engine_listener_get_velocity(engine as *const _, listener) };
        vec.into()
    }

    #[inline]
    pub fn ma_engine_listener_set_world_up(engine: *mut sys::ma_engine, listener: u32, up: Vec3) {
        unsafe { sys::ma_engine_listener_set_world_up(engine, listener, up.x, up.y, up.z) };
    }

    #[inline]
    pub fn ma_engine_listener_get_world_up(engine: *mut sys::ma_engine, listener: u32) -> Vec3 {
        let vec = unsafe { sys::ma_engine_listener_get_world_up(engine as *const _, listener) };
        vec.into()
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_assets::{assert_f32_eq, headless_engine, pump, WavFixture, TEST_SAMPLE_RATE};

    fn long_sound(engine: &Arc<Engine>, wav: &WavFixture) -> Sound {
        engine.new_sound_from_file(wav.path(), false).unwrap()
    }

    #[test]
    fn engine_test_works_with_default() {
        let engine = EngineBuilder::new().build_for_tests().unwrap();
        assert!(engine.is_initialized());
        assert!(engine.channels() > 0);
        assert!(engine.sample_rate() > 0);
    }

    #[test]
    fn test_engine_volume_law() {
        let engine = headless_engine();
        engine.set_volume(0.5);
        assert_f32_eq(engine.volume(), 0.5);

        engine.set_volume(1.5);
        assert_f32_eq(engine.volume(), 0.5);
        engine.set_volume(-0.1);
        assert_f32_eq(engine.volume(), 0.5);
        engine.set_volume(f32::NAN);
        assert_f32_eq(engine.volume(), 0.5);

        engine.set_volume(0.0);
        assert_f32_eq(engine.volume(), 0.0);
        engine.set_volume(1.0);
        assert_f32_eq(engine.volume(), 1.0);

        assert_eq!(engine.try_set_volume(2.0), Err(SessionError::InvalidVolume(2.0)));
        assert!(engine.try_set_volume(0.25).is_ok());
        assert_f32_eq(engine.volume(), 0.25);
    }

    #[test]
    fn test_engine_headless_format() {
        let engine = headless_engine();
        assert_eq!(engine.channels(), 2);
        assert_eq!(engine.sample_rate(), TEST_SAMPLE_RATE);

        let requested = 256u64;
        let (buf, frames) = engine.read_pcm_frames(requested).unwrap();
        assert!(frames <= requested, "engine returned more frames than requested");
        assert_eq!(buf.len(), (frames * 2) as usize);
        assert!(buf.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_engine_read_pcm_frames_rejects_oversized_requests() {
        let engine = headless_engine();

        assert_eq!(
            engine.read_pcm_frames(u64::MAX).err(),
            Some(SessionError::Playback(MaError::OUT_OF_RANGE))
        );
        assert!(matches!(
            engine.read_pcm_frames(u64::MAX / 2),
            Err(SessionError::Playback(_))
        ));

        // Still usable afterwards.
        assert!(engine.read_pcm_frames(64).is_ok());
    }

    #[test]
    fn test_engine_completion_handler_may_stop_instances() {
        let engine = headless_engine();
        let short_wav = WavFixture::sine(1, TEST_SAMPLE_RATE, 4_800);
        let short = engine.new_sound_from_file(short_wav.path(), false).unwrap();
        let long_wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let long = long_sound(&engine, &long_wav);

        let long_id = engine.try_play(&long).unwrap();
        let weak = Arc::downgrade(&engine);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = calls.clone();
        let short_id = engine
            .play_with_completion(&short, move |id| {
                if let Some(engine) = weak.upgrade() {
                    engine.stop_instance(id);
                    engine.stop_instance(long_id);
                    assert!(engine.set_output_device(None).is_err());
                }
                calls_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        pump(&engine, 0.3);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.instance_state(short_id), None);
        assert_eq!(engine.instance_state(long_id), None);
        assert_eq!(engine.active_count(), 0);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_engine_n_plays_make_n_instances() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);

        let ids: Vec<_> = (0..3).map(|_| engine.try_play(&sound).unwrap()).collect();
        assert_eq!(engine.active_count(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert!(engine.is_playing());

        assert!(engine.stop_instance(ids[0]));
        assert!(!engine.stop_instance(ids[0]));
        assert_eq!(engine.active_count(), 2);
        assert_eq!(engine.instance_state(ids[0]), None);
        assert_eq!(engine.instance_state(ids[1]), Some(InstanceState::Playing));
        assert_eq!(engine.instance_state(ids[2]), Some(InstanceState::Playing));
        assert!(engine.is_playing());

        let (buf, _) = engine.read_pcm_frames(1024).unwrap();
        assert!(buf.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_engine_natural_completion_evicts() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, 2_400);
        let sound = long_sound(&engine, &wav);

        let id = engine.try_play(&sound).unwrap();
        assert_eq!(engine.active_count(), 1);

        pump(&engine, 0.2);
        assert_eq!(engine.active_count(), 0);
        assert_eq!(engine.instance_state(id), None);
        assert!(!engine.is_playing());

        // Later stop calls are no-ops for it.
        engine.stop_all_sounds();
        assert!(!engine.stop_instance(id));
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_engine_completion_handler_runs_once() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, 2_400);
        let sound = long_sound(&engine, &wav);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = calls.clone();
        let id = engine
            .play_with_completion(&sound, move |_| {
                calls_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        pump(&engine, 0.2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.instance_state(id), None);

        pump(&engine, 0.1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_engine_stop_all_then_not_playing() {
        let engine = headless_engine();
        let wav = WavFixture::sine(2, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);

        for _ in 0..4 {
            assert!(sound.play());
        }
        assert!(engine.is_playing());

        engine.stop_all_sounds();
        assert!(!engine.is_playing());
        assert_eq!(engine.active_count(), 0);

        // Stopped instances never report completion.
        pump(&engine, 0.1);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_engine_looping_instance_stays() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, 2_400);
        let sound = long_sound(&engine, &wav);
        sound.set_loops(true);

        let id = engine.try_play(&sound).unwrap();
        assert!(engine.instance_loops(id));
        pump(&engine, 0.3);
        assert_eq!(engine.active_count(), 1);
        assert!(engine.is_playing());

        engine.set_instance_loops(id, false);
        pump(&engine, 0.2);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_engine_instance_controls() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);
        let id = engine.try_play(&sound).unwrap();

        engine.set_instance_volume(id, 0.4);
        engine.set_instance_volume(id, 4.0);
        assert_f32_eq(engine.instance_volume(id), 0.4);

        engine.set_instance_position(id, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(engine.instance_position(id), Vec3::new(1.0, 0.0, 0.0));

        approx::assert_abs_diff_eq!(engine.instance_duration(id), 1.0, epsilon = 1e-3);

        assert!(engine.pause_instance(id));
        assert_eq!(engine.instance_state(id), Some(InstanceState::Paused));
        assert!(!engine.is_playing());

        assert!(engine.resume_instance(id));
        assert_eq!(engine.instance_state(id), Some(InstanceState::Playing));
        pump(&engine, 0.05);
        assert!(engine.instance_time(id) > 0.0);

        engine.seek_instance(id, 0.75);
        pump(&engine, 0.01);
        approx::assert_abs_diff_eq!(engine.instance_time(id), 0.76, epsilon = 0.02);

        let missing = InstanceId::next();
        assert!(!engine.pause_instance(missing));
        assert!(!engine.resume_instance(missing));
        assert_eq!(engine.instance_volume(missing), 0.0);
        assert_eq!(engine.instance_duration(missing), 0.0);
    }

    #[test]
    fn test_engine_bad_locator_fails_repeatedly() {
        let engine = headless_engine();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");

        for _ in 0..5 {
            let err = engine.new_sound_from_file(&missing, false).unwrap_err();
            assert!(matches!(err, SessionError::FileLoad { .. }));
            assert!(!engine.play_file(&missing, false));
        }
        assert!(!engine.play_uri("http://example.com/a.wav", false));
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_engine_play_file_and_uri() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let uri = url::Url::from_file_path(wav.path()).unwrap();

        assert!(engine.play_file(wav.path(), false));
        assert!(engine.play_uri(uri.as_str(), true));
        assert_eq!(engine.active_count(), 2);
        assert!(engine.is_playing());
    }

    #[test]
    fn test_engine_listener_roundtrip() {
        let engine = headless_engine();
        engine.set_listener_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(engine.listener_position(), Vec3::new(1.0, 2.0, 3.0));

        engine.set_listener_velocity(Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(engine.listener_velocity(), Vec3::new(0.5, 0.0, 0.0));

        engine.set_listener_direction(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let (forward, up) = engine.listener_direction();
        assert_eq!(forward, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(up, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_engine_uninitialized_is_inert_and_recoverable() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);
        engine.set_volume(0.5);

        // Simulates a failed device switch.
        {
            let mut native = engine.native.write();
            engine.pool.stop_all();
            native.release_engine();
        }

        assert!(!engine.is_initialized());
        assert_eq!(engine.volume(), 0.0);
        engine.set_volume(0.7);
        assert_eq!(
            engine.try_set_volume(0.7),
            Err(SessionError::EngineInit(MaError::INVALID_OPERATION))
        );
        assert!(!engine.play(&sound));
        assert!(matches!(engine.try_play(&sound), Err(SessionError::Playback(_))));
        assert!(engine.read_pcm_frames(16).is_err());
        engine.set_listener_position(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(engine.listener_position(), Vec3::ZERO);
        assert_eq!(engine.channels(), 0);

        engine.set_output_device(None).unwrap();
        assert!(engine.is_initialized());
        assert!(engine.play(&sound));
        assert!(engine.is_playing());
    }

    #[test]
    fn test_engine_set_output_device_none_keeps_playing_later() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);

        assert!(sound.play());
        engine.set_output_device(None).unwrap();
        // Device switches drop everything that was playing.
        assert_eq!(engine.active_count(), 0);

        assert!(sound.play());
        assert!(engine.is_playing());
        engine.stop_all_sounds();
    }

    #[test]
    fn test_engine_set_output_device_concrete_then_default() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);

        let devices = AudioDevice::output_devices().unwrap_or_default();
        if let Some(device) = devices.first() {
            // Opening real hardware may fail on build machines. A failure must
            // leave the engine recoverable.
            if engine.set_output_device(Some(device)).is_ok() {
                assert!(engine.is_initialized());
                assert!(sound.play());
                engine.stop_all_sounds();
            }
        }

        engine.set_output_device(None).unwrap();
        assert!(engine.is_initialized());
        assert!(sound.play());
        assert!(engine.is_playing());
    }

    #[test]
    fn test_engine_concurrent_plays() {
        let engine = headless_engine();
        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE);
        let sound = long_sound(&engine, &wav);

        std::thread::scope(|s| {
            for _ in 0..4 {
                let sound = sound.clone();
                s.spawn(move || {
                    for _ in 0..5 {
                        assert!(sound.play());
                    }
                });
            }
        });
        assert_eq!(engine.active_count(), 20);

        std::thread::scope(|s| {
            s.spawn(|| engine.stop_all_sounds());
            s.spawn(|| {
                let _ = engine.is_playing();
            });
        });
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_engine_shared_lifecycle() {
        let engine = Engine::init_shared(
            EngineBuilder::new()
                .no_device(true)
                .set_channels(2)
                .set_sample_rate(TEST_SAMPLE_RATE),
        )
        .unwrap();
        let again = Engine::shared().unwrap();
        assert!(Arc::ptr_eq(&engine, &again));
        drop(again);

        let wav = WavFixture::sine(1, TEST_SAMPLE_RATE, 4_800);
        let sound = Sound::from_path(wav.path(), false).unwrap();
        assert!(sound.engine().is_some_and(|e| Arc::ptr_eq(&e, &engine)));
        assert!(sound.play());
        drop(engine);

        assert!(Engine::shutdown_shared());
        assert!(!Engine::shutdown_shared());
        assert!(sound.engine().is_none());
        assert!(!sound.play());
    }
}
