use std::mem::MaybeUninit;

use maudio_sys::ffi as sys;

use crate::{Binding, SessionError, SessionResult};

/// Owned miniaudio context. Devices created from it must be released first.
pub(crate) struct Context {
    inner: *mut sys::ma_context,
}

impl Binding for Context {
    type Raw = *mut sys::ma_context;

    fn to_raw(&self) -> Self::Raw {
        self.inner
    }
}

impl Context {
    pub(crate) fn new() -> SessionResult<Self> {
        let mut mem: Box<MaybeUninit<sys::ma_context>> = Box::new(MaybeUninit::uninit());
        context_ffi::ma_context_init(mem.as_mut_ptr()).map_err(SessionError::ContextInit)?;

        let inner = Box::into_raw(mem).cast::<sys::ma_context>();
        Ok(Self { inner })
    }

    /// Snapshot of the playback devices the backend currently reports.
    pub(crate) fn playback_devices(&self) -> SessionResult<Vec<sys::ma_device_info>> {
        context_ffi::ma_context_get_devices(self.inner).map_err(SessionError::DeviceEnumeration)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        context_ffi::ma_context_uninit(self.inner);
        drop(unsafe { Box::from_raw(self.inner.cast::<MaybeUninit<sys::ma_context>>()) });
    }
}

pub(crate) mod context_ffi {
    use maudio_sys::ffi as sys;

    use crate::MaError;

    pub fn ma_context_init(context: *mut sys::ma_context) -> Result<(), MaError> {
        let res = unsafe {
            sys::ma_context_init(core::ptr::null(), 0, core::ptr::null(), context)
        };
        MaError::check(res)
    }

    pub fn ma_context_uninit(context: *mut sys::ma_context) {
        unsafe {
            sys::ma_context_uninit(context);
        }
    }

    /// Copies the playback device infos out of the context-owned array, which
    /// miniaudio invalidates on the next enumeration.
    pub fn ma_context_get_devices(
        context: *mut sys::ma_context,
    ) -> Result<Vec<sys::ma_device_info>, MaError> {
        let mut playback: *mut sys::ma_device_info = core::ptr::null_mut();
        let mut playback_count: sys::ma_uint32 = 0;
        let mut capture: *mut sys::ma_device_info = core::ptr::null_mut();
        let mut capture_count: sys::ma_uint32 = 0;

        let res = unsafe {
            sys::ma_context_get_devices(
                context,
                &mut playback,
                &mut playback_count,
                &mut capture,
                &mut capture_count,
            )
        };
        MaError::check(res)?;

        if playback.is_null() || playback_count == 0 {
            return Ok(Vec::new());
        }
        let infos = unsafe { std::slice::from_raw_parts(playback, playback_count as usize) };
        Ok(infos.to_vec())
    }
}
