//! A single engine-backed playing occurrence of a [`Sound`].
//!
//! The native data source, the native sound and the end-callback slot live
//! together in one heap allocation ([`Voice`]) whose address never changes:
//! miniaudio keeps raw pointers to the data source and to the slot for as long
//! as the sound is initialized.
use std::{
    mem::MaybeUninit,
    ptr::NonNull,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use maudio_sys::ffi as sys;

use crate::{
    audio::math::vec3::Vec3,
    engine::resource::{rm_source::rm_source_ffi, rm_source_flags::RmSourceFlags},
    sound::{
        notifier::{on_end_callback, CompletionHandler, EndSlot},
        sound_flags::SoundFlags,
        Sound, SoundShared,
    },
    SessionError, SessionResult,
};

/// Process-unique identity of a playback instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable state of a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstanceState {
    /// Loaded, never started.
    Ready = 0,
    Playing = 1,
    /// Stopped without rewinding.
    Paused = 2,
    /// Stopped and rewound to the first frame.
    Stopped = 3,
    /// Reached the end of its data. The pool evicts it on its next operation.
    Finished = 4,
}

impl InstanceState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => InstanceState::Playing,
            2 => InstanceState::Paused,
            3 => InstanceState::Stopped,
            4 => InstanceState::Finished,
            _ => InstanceState::Ready,
        }
    }
}

struct Voice {
    source: MaybeUninit<sys::ma_resource_manager_data_source>,
    sound: MaybeUninit<sys::ma_sound>,
    end: EndSlot,
    source_ready: bool,
    sound_ready: bool,
}

pub(crate) struct PlaybackInstance {
    id: InstanceId,
    voice: NonNull<Voice>,
    state: AtomicU8,
    owner: Weak<SoundShared>,
    source_sample_rate: u32,
}

// The voice is only reached through miniaudio calls, which are thread safe,
// and through the end slot, which is `Sync`.
unsafe impl Send for PlaybackInstance {}
unsafe impl Sync for PlaybackInstance {}

impl PlaybackInstance {
    /// Loads `owner`'s source into a new instance bound to `engine`.
    ///
    /// Anything acquired before a failure is released again before the error
    /// is returned.
    pub(crate) fn new(
        owner: &Sound,
        engine: *mut sys::ma_engine,
        rm: *mut sys::ma_resource_manager,
        ready_retry_delay: Duration,
    ) -> SessionResult<Self> {
        let locator = owner.locator();
        let path = locator
            .native_path()
            .map_err(|code| SessionError::file_load(locator, code))?;

        let id = InstanceId::next();
        let voice = Box::new(Voice {
            source: MaybeUninit::uninit(),
            sound: MaybeUninit::uninit(),
            end: EndSlot::new(id),
            source_ready: false,
            sound_ready: false,
        });
        let mut instance = PlaybackInstance {
            id,
            voice: NonNull::from(Box::leak(voice)),
            state: AtomicU8::new(InstanceState::Ready as u8),
            owner: Arc::downgrade(&owner.shared),
            source_sample_rate: 0,
        };

        let source = instance.source_ptr();
        rm_source_ffi::ma_resource_manager_data_source_init(
            rm,
            &path,
            RmSourceFlags::DECODE | RmSourceFlags::WAIT_INIT,
            source,
        )
        .map_err(|code| SessionError::file_load(locator, code))?;
        unsafe { (*instance.voice.as_ptr()).source_ready = true };

        rm_source_ffi::wait_until_ready(source, ready_retry_delay)
            .map_err(|code| SessionError::file_load(locator, code))?;
        instance.source_sample_rate = rm_source_ffi::ma_data_source_get_data_format(source)
            .map(|fmt| fmt.sample_rate)
            .unwrap_or(0);

        sound_ffi::ma_sound_init_from_data_source(
            engine,
            source.cast::<sys::ma_data_source>(),
            SoundFlags::for_spatial(owner.is_spatial()),
            instance.sound_ptr(),
        )
        .map_err(|code| SessionError::file_load(locator, code))?;
        unsafe { (*instance.voice.as_ptr()).sound_ready = true };

        let defaults = owner.defaults();
        instance.set_volume(defaults.volume);
        instance.set_loops(defaults.looping);
        instance.set_position(defaults.position);

        sound_ffi::ma_sound_set_end_callback(
            instance.sound_ptr(),
            Some(on_end_callback),
            instance.end_slot().as_user_data_ptr(),
        );

        Ok(instance)
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    /// Whether this instance was created from `sound` (identity, not value).
    pub(crate) fn is_owned_by(&self, sound: &Sound) -> bool {
        std::ptr::eq(self.owner.as_ptr(), Arc::as_ptr(&sound.shared))
    }

    pub(crate) fn state(&self) -> InstanceState {
        let state = InstanceState::from_u8(self.state.load(Ordering::Acquire));
        if state == InstanceState::Playing && self.end_slot().has_ended() {
            return InstanceState::Finished;
        }
        state
    }

    /// Finished or stopped since its last start. Instances restarted after
    /// reporting completion are not retired.
    pub(crate) fn is_retired(&self) -> bool {
        matches!(self.state(), InstanceState::Finished | InstanceState::Stopped)
    }

    fn set_state(&self, state: InstanceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Installs or clears the handler run when playback reaches the end.
    pub(crate) fn set_completion_handler(&self, handler: Option<CompletionHandler>) {
        self.end_slot().replace(handler);
    }

    /// Starts (or restarts) playback.
    pub(crate) fn play(&self) -> Result<(), crate::MaError> {
        self.end_slot().reset();
        sound_ffi::ma_sound_start(self.sound_ptr())?;
        self.set_state(InstanceState::Playing);
        Ok(())
    }

    pub(crate) fn resume(&self) -> bool {
        self.play().is_ok()
    }

    /// Stops without rewinding.
    pub(crate) fn pause(&self) -> bool {
        let _ = sound_ffi::ma_sound_stop(self.sound_ptr());
        self.set_state(InstanceState::Paused);
        true
    }

    /// Stops and rewinds to the first frame.
    pub(crate) fn stop(&self) -> bool {
        let _ = sound_ffi::ma_sound_stop(self.sound_ptr());
        let _ = sound_ffi::ma_sound_seek_to_pcm_frame(self.sound_ptr(), 0);
        self.set_state(InstanceState::Stopped);
        true
    }

    pub(crate) fn is_playing(&self) -> bool {
        sound_ffi::ma_sound_is_playing(self.sound_ptr())
    }

    pub(crate) fn volume(&self) -> f32 {
        sound_ffi::ma_sound_get_volume(self.sound_ptr())
    }

    /// Values outside `0.0..=1.0` are ignored.
    pub(crate) fn set_volume(&self, volume: f32) {
        if (0.0..=1.0).contains(&volume) {
            sound_ffi::ma_sound_set_volume(self.sound_ptr(), volume);
        }
    }

    pub(crate) fn loops(&self) -> bool {
        sound_ffi::ma_sound_is_looping(self.sound_ptr())
    }

    pub(crate) fn set_loops(&self, looping: bool) {
        sound_ffi::ma_sound_set_looping(self.sound_ptr(), looping);
    }

    pub(crate) fn position(&self) -> Vec3 {
        sound_ffi::ma_sound_get_position(self.sound_ptr())
    }

    pub(crate) fn set_position(&self, position: Vec3) {
        sound_ffi::ma_sound_set_position(self.sound_ptr(), position);
    }

    /// Playback cursor in seconds.
    pub(crate) fn current_time(&self) -> f64 {
        sound_ffi::ma_sound_get_cursor_in_seconds(self.sound_ptr()).unwrap_or(0.0) as f64
    }

    pub(crate) fn set_current_time(&self, seconds: f64) {
        if seconds < 0.0 || self.source_sample_rate == 0 {
            return;
        }
        let frame = (seconds * self.source_sample_rate as f64) as u64;
        let _ = sound_ffi::ma_sound_seek_to_pcm_frame(self.sound_ptr(), frame);
    }

    pub(crate) fn duration(&self) -> f64 {
        sound_ffi::ma_sound_get_length_in_seconds(self.sound_ptr()).unwrap_or(0.0) as f64
    }

    fn end_slot(&self) -> &EndSlot {
        unsafe { &(*self.voice.as_ptr()).end }
    }

    fn sound_ptr(&self) -> *mut sys::ma_sound {
        unsafe { std::ptr::addr_of_mut!((*self.voice.as_ptr()).sound) }.cast::<sys::ma_sound>()
    }

    fn source_ptr(&self) -> *mut sys::ma_resource_manager_data_source {
        unsafe { std::ptr::addr_of_mut!((*self.voice.as_ptr()).source) }
            .cast::<sys::ma_resource_manager_data_source>()
    }
}

impl Drop for PlaybackInstance {
    fn drop(&mut self) {
        let voice = self.voice.as_ptr();
        unsafe {
            if (*voice).sound_ready {
                sound_ffi::ma_sound_set_end_callback(
                    self.sound_ptr(),
                    None,
                    core::ptr::null_mut(),
                );
                (*voice).end.disarm();
                sound_ffi::ma_sound_uninit(self.sound_ptr());
                (*voice).sound_ready = false;
            }
            if (*voice).source_ready {
                rm_source_ffi::ma_resource_manager_data_source_uninit(self.source_ptr());
                (*voice).source_ready = false;
            }
            drop(Box::from_raw(voice));
        }
    }
}

pub(crate) mod sound_ffi {
    use maudio_sys::ffi as sys;

    use crate::{audio::math::vec3::Vec3, sound::sound_flags::SoundFlags, MaError};

    pub fn ma_sound_init_from_data_source(
        engine: *mut sys::ma_engine,
        source: *mut sys::ma_data_source,
        flags: SoundFlags,
        sound: *mut sys::ma_sound,
    ) -> Result<(), MaError> {
        let res = unsafe {
            sys::ma_sound_init_from_data_source(
                engine,
                source,
                flags.bits(),
                core::ptr::null_mut(),
                sound,
            )
        };
        MaError::check(res)
    }

    pub fn ma_sound_uninit(sound: *mut sys::ma_sound) {
        unsafe {
            sys::ma_sound_uninit(sound);
        }
    }

    pub fn ma_sound_set_end_callback(
        sound: *mut sys::ma_sound,
        callback: sys::ma_sound_end_proc,
        user_data: *mut core::ffi::c_void,
    ) {
        unsafe {
            sys::ma_sound_set_end_callback(sound, callback, user_data);
        }
    }

    pub fn ma_sound_start(sound: *mut sys::ma_sound) -> Result<(), MaError> {
        let res = unsafe { sys::ma_sound_start(sound) };
        MaError::check(res)
    }

    pub fn ma_sound_stop(sound: *mut sys::ma_sound) -> Result<(), MaError> {
        let res = unsafe { sys::ma_sound_stop(sound) };
        MaError::check(res)
    }

    pub fn ma_sound_seek_to_pcm_frame(sound: *mut sys::ma_sound, frame: u64) -> Result<(), MaError> {
        let res = unsafe { sys::ma_sound_seek_to_pcm_frame(sound, frame) };
        MaError::check(res)
    }

    pub fn ma_sound_is_playing(sound: *const sys::ma_sound) -> bool {
        let res = unsafe { sys::ma_sound_is_playing(sound) };
        res == 1
    }

    pub fn ma_sound_set_volume(sound: *mut sys::ma_sound, volume: f32) {
        unsafe {
            sys::ma_sound_set_volume(sound, volume);
        }
    }

    pub fn ma_sound_get_volume(sound: *const sys::ma_sound) -> f32 {
        unsafe { sys::ma_sound_get_volume(sound) }
    }

    pub fn ma_sound_set_looping(sound: *mut sys::ma_sound, looping: bool) {
        unsafe {
            sys::ma_sound_set_looping(sound, looping as sys::ma_bool32);
        }
    }

    pub fn ma_sound_is_looping(sound: *const sys::ma_sound) -> bool {
        let res = unsafe { sys::ma_sound_is_looping(sound) };
        res == 1
    }

    pub fn ma_sound_set_position(sound: *mut sys::ma_sound, position: Vec3) {
        unsafe {
            sys::ma_sound_set_position(sound, position.x, position.y, position.z);
        }
    }

    pub fn ma_sound_get_position(sound: *const sys::ma_sound) -> Vec3 {
        let v = unsafe { sys::ma_sound_get_position(sound) };
        v.into()
    }

    pub fn ma_sound_get_cursor_in_seconds(sound: *mut sys::ma_sound) -> Result<f32, MaError> {
        let mut cursor: f32 = 0.0;
        let res = unsafe { sys::ma_sound_get_cursor_in_seconds(sound, &mut cursor) };
        MaError::check(res)?;
        Ok(cursor)
    }

    pub fn ma_sound_get_length_in_seconds(sound: *mut sys::ma_sound) -> Result<f32, MaError> {
        let mut length: f32 = 0.0;
        let res = unsafe { sys::ma_sound_get_length_in_seconds(sound, &mut length) };
        MaError::check(res)?;
        Ok(length)
    }
}
