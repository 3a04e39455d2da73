//! Owned miniaudio resource manager.
//!
//! The engine keeps a raw pointer to the resource manager, so the native
//! object lives at a fixed heap address for as long as this wrapper exists.
use std::mem::MaybeUninit;

use maudio_sys::ffi as sys;

use crate::{Binding, MaError};

pub(crate) mod rm_source;
pub(crate) mod rm_source_flags;

pub(crate) struct ResourceManager {
    inner: *mut sys::ma_resource_manager,
}

impl Binding for ResourceManager {
    type Raw = *mut sys::ma_resource_manager;

    fn to_raw(&self) -> Self::Raw {
        self.inner
    }
}

impl ResourceManager {
    /// With zero job threads the job queue is non-blocking, so whoever drives
    /// it never waits on an empty queue.
    pub(crate) fn new(job_thread_count: Option<u32>) -> Result<Self, MaError> {
        let mut config = unsafe { sys::ma_resource_manager_config_init() };
        if let Some(count) = job_thread_count {
            config.jobThreadCount = count;
            if count == 0 {
                config.flags |=
                    sys::ma_resource_manager_flags_MA_RESOURCE_MANAGER_FLAG_NON_BLOCKING as u32;
            }
        }

        let mut mem: Box<MaybeUninit<sys::ma_resource_manager>> = Box::new(MaybeUninit::uninit());
        resource_ffi::ma_resource_manager_init(&config, mem.as_mut_ptr())?;

        let inner = Box::into_raw(mem).cast::<sys::ma_resource_manager>();
        Ok(Self { inner })
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        resource_ffi::ma_resource_manager_uninit(self);
        drop(unsafe { Box::from_raw(self.inner.cast::<MaybeUninit<sys::ma_resource_manager>>()) });
    }
}

pub(crate) mod resource_ffi {
    use maudio_sys::ffi as sys;

    use crate::{engine::resource::ResourceManager, Binding, MaError};

    pub fn ma_resource_manager_init(
        config: *const sys::ma_resource_manager_config,
        rm: *mut sys::ma_resource_manager,
    ) -> Result<(), MaError> {
        let res = unsafe { sys::ma_resource_manager_init(config, rm) };
        MaError::check(res)
    }

    pub fn ma_resource_manager_uninit(rm: &mut ResourceManager) {
        unsafe {
            sys::ma_resource_manager_uninit(rm.to_raw());
        }
    }
}
