//! Output device enumeration and the playback device an [`Engine`](crate::Engine)
//! is bound to after [`Engine::set_output_device()`](crate::Engine::set_output_device).
use std::mem::MaybeUninit;

use maudio_sys::ffi as sys;

use crate::{context::Context, Binding, SessionError, SessionResult};

/// A playback device reported by the audio backend.
#[derive(Clone)]
pub struct AudioDevice {
    id: sys::ma_device_id,
    name: String,
    is_default: bool,
}

impl AudioDevice {
    /// Lists the playback devices of the default backend.
    ///
    /// A temporary context is created for the query and released before
    /// returning.
    pub fn output_devices() -> SessionResult<Vec<AudioDevice>> {
        let context = Context::new()?;
        let infos = context.playback_devices()?;
        Ok(infos.iter().map(AudioDevice::from_info).collect())
    }

    pub(crate) fn from_info(info: &sys::ma_device_info) -> Self {
        let bytes: Vec<u8> = info
            .name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        Self {
            id: info.id,
            name: String::from_utf8_lossy(&bytes).into_owned(),
            is_default: info.isDefault != 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the backend marks this as the system default output.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Opaque backend identifier of the device.
    pub fn id(&self) -> &sys::ma_device_id {
        &self.id
    }
}

impl std::fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDevice")
            .field("name", &self.name)
            .field("is_default", &self.is_default)
            .finish_non_exhaustive()
    }
}

/// Playback device owned by an engine.
///
/// Releasing the device ([`Device::release()`]) and freeing its storage are
/// separate steps: an engine bound to this device may still call
/// `ma_device_stop` on it while it is being torn down, so the storage has to
/// outlive the engine.
pub(crate) struct Device {
    inner: *mut sys::ma_device,
    initialized: bool,
}

impl Binding for Device {
    type Raw = *mut sys::ma_device;

    fn to_raw(&self) -> Self::Raw {
        self.inner
    }
}

impl Device {
    /// Creates a stopped f32 playback device for `target` whose data callback
    /// mixes from `engine`. `engine` must stay valid while the device runs.
    pub(crate) fn new_playback(
        context: &Context,
        target: &AudioDevice,
        engine: *mut sys::ma_engine,
        channels: u32,
        sample_rate: u32,
    ) -> SessionResult<Self> {
        let mut config =
            unsafe { sys::ma_device_config_init(sys::ma_device_type_ma_device_type_playback) };
        config.playback.pDeviceID = target.id();
        config.playback.format = sys::ma_format_ma_format_f32;
        config.playback.channels = channels;
        config.sampleRate = sample_rate;
        config.dataCallback = Some(engine_data_callback);
        config.pUserData = engine.cast();

        let mut mem: Box<MaybeUninit<sys::ma_device>> = Box::new(MaybeUninit::uninit());
        device_ffi::ma_device_init(context.to_raw(), &config, mem.as_mut_ptr())
            .map_err(SessionError::DeviceInit)?;

        let inner = Box::into_raw(mem).cast::<sys::ma_device>();
        Ok(Self {
            inner,
            initialized: true,
        })
    }

    /// Stops and uninitializes the native device, keeping the storage alive.
    pub(crate) fn release(&mut self) {
        if self.initialized {
            device_ffi::ma_device_uninit(self.inner);
            self.initialized = false;
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.release();
        drop(unsafe { Box::from_raw(self.inner.cast::<MaybeUninit<sys::ma_device>>()) });
    }
}

/// Pulls mixed frames from the engine stored in the device's user data.
unsafe extern "C" fn engine_data_callback(
    device: *mut sys::ma_device,
    output: *mut core::ffi::c_void,
    _input: *const core::ffi::c_void,
    frame_count: sys::ma_uint32,
) {
    if device.is_null() {
        return;
    }
    let engine = unsafe { (*device).pUserData }.cast::<sys::ma_engine>();
    if engine.is_null() {
        return;
    }
    unsafe {
        sys::ma_engine_read_pcm_frames(engine, output, frame_count as u64, core::ptr::null_mut());
    }
}

pub(crate) mod device_ffi {
    use maudio_sys::ffi as sys;

    use crate::MaError;

    pub fn ma_device_init(
        context: *mut sys::ma_context,
        config: *const sys::ma_device_config,
        device: *mut sys::ma_device,
    ) -> Result<(), MaError> {
        let res = unsafe { sys::ma_device_init(context, config, device) };
        MaError::check(res)
    }

    pub fn ma_device_uninit(device: *mut sys::ma_device) {
        unsafe { sys::ma_device_uninit(device) };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn info_named(name: &[u8], is_default: bool) -> sys::ma_device_info {
        let mut info: sys::ma_device_info = unsafe { std::mem::zeroed() };
        for (dst, src) in info.name.iter_mut().zip(name) {
            *dst = *src as core::ffi::c_char;
        }
        info.isDefault = is_default as sys::ma_bool32;
        info
    }

    #[test]
    fn device_info_name_stops_at_nul() {
        let device = AudioDevice::from_info(&info_named(b"Speakers\0garbage", true));
        assert_eq!(device.name(), "Speakers");
        assert!(device.is_default());

        let device = AudioDevice::from_info(&info_named(b"", false));
        assert_eq!(device.name(), "");
        assert!(!device.is_default());
    }

    #[test]
    fn output_devices_enumerates() {
        // An empty list is valid on machines without audio hardware.
        let devices = AudioDevice::output_devices().unwrap();
        assert!(devices.iter().filter(|d| d.is_default()).count() <= devices.len());
    }
}
