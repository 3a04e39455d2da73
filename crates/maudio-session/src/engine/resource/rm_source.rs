//! Resource manager data sources.
//!
//! [`ResourceManagerSource`] is the owned, short-lived form used for probing a
//! file. Playback instances embed their data source inside their own native
//! bundle and drive it through [`rm_source_ffi`] directly.
use std::{mem::MaybeUninit, path::Path};

use maudio_sys::ffi as sys;

use crate::{
    engine::resource::{rm_source_flags::RmSourceFlags, ResourceManager},
    Binding, MaError,
};

/// A file path in the encoding miniaudio expects on this platform.
pub(crate) enum NativePath {
    #[cfg(not(windows))]
    Utf8(std::ffi::CString),
    #[cfg(windows)]
    Wide(Vec<u16>),
}

impl NativePath {
    /// Fails with `MA_INVALID_ARGS` for empty paths and paths with interior NULs.
    pub(crate) fn new(path: &Path) -> Result<Self, MaError> {
        if path.as_os_str().is_empty() {
            return Err(MaError::INVALID_ARGS);
        }
        #[cfg(not(windows))]
        {
            cstring_from_path(path).map(NativePath::Utf8)
        }
        #[cfg(windows)]
        {
            Ok(NativePath::Wide(wide_null_terminated(path)))
        }
    }

    fn apply(&self, config: &mut sys::ma_resource_manager_data_source_config) {
        config.pFilePath = core::ptr::null();
        config.pFilePathW = core::ptr::null();
        match self {
            #[cfg(not(windows))]
            NativePath::Utf8(path) => config.pFilePath = path.as_ptr(),
            #[cfg(windows)]
            NativePath::Wide(path) => config.pFilePathW = path.as_ptr() as *const _,
        }
    }
}

#[cfg(unix)]
fn cstring_from_path(path: &Path) -> Result<std::ffi::CString, MaError> {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| MaError::INVALID_ARGS)
}

#[cfg(all(not(unix), not(windows)))]
fn cstring_from_path(path: &Path) -> Result<std::ffi::CString, MaError> {
    let path = path.to_str().ok_or(MaError::INVALID_ARGS)?;
    std::ffi::CString::new(path).map_err(|_| MaError::INVALID_ARGS)
}

#[cfg(windows)]
fn wide_null_terminated(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;

    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Format, channel count and sample rate as reported by a data source.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DataFormat {
    pub format: sys::ma_format,
    pub channels: u32,
    pub sample_rate: u32,
}

pub(crate) struct ResourceManagerSource {
    inner: *mut sys::ma_resource_manager_data_source,
}

impl Binding for ResourceManagerSource {
    type Raw = *mut sys::ma_resource_manager_data_source;

    fn to_raw(&self) -> Self::Raw {
        self.inner
    }
}

impl ResourceManagerSource {
    pub(crate) fn open(
        rm: &ResourceManager,
        path: &NativePath,
        flags: RmSourceFlags,
    ) -> Result<Self, MaError> {
        let mut mem: Box<MaybeUninit<sys::ma_resource_manager_data_source>> =
            Box::new(MaybeUninit::uninit());

        rm_source_ffi::ma_resource_manager_data_source_init(
            rm.to_raw(),
            path,
            flags,
            mem.as_mut_ptr(),
        )?;

        let inner = Box::into_raw(mem).cast::<sys::ma_resource_manager_data_source>();
        Ok(Self { inner })
    }

    pub(crate) fn data_format(&self) -> Result<DataFormat, MaError> {
        rm_source_ffi::ma_data_source_get_data_format(self.inner)
    }

    pub(crate) fn length_in_pcm_frames(&self) -> Result<u64, MaError> {
        rm_source_ffi::ma_data_source_get_length_in_pcm_frames(self.inner)
    }
}

impl Drop for ResourceManagerSource {
    fn drop(&mut self) {
        rm_source_ffi::ma_resource_manager_data_source_uninit(self.inner);
        drop(unsafe {
            Box::from_raw(
                self.inner
                    .cast::<MaybeUninit<sys::ma_resource_manager_data_source>>(),
            )
        });
    }
}

pub(crate) mod rm_source_ffi {
    use std::time::Duration;

    use maudio_sys::ffi as sys;

    use crate::{
        engine::resource::{
            rm_source::{DataFormat, NativePath},
            rm_source_flags::RmSourceFlags,
        },
        MaError,
    };

    /// `source` must point to writable storage that stays at the same address
    /// until [`ma_resource_manager_data_source_uninit`] is called on it.
    pub fn ma_resource_manager_data_source_init(
        rm: *mut sys::ma_resource_manager,
        path: &NativePath,
        flags: RmSourceFlags,
        source: *mut sys::ma_resource_manager_data_source,
    ) -> Result<(), MaError> {
        let mut config = unsafe { sys::ma_resource_manager_data_source_config_init() };
        config.flags = flags.bits();
        path.apply(&mut config);
        let res = unsafe { sys::ma_resource_manager_data_source_init_ex(rm, &config, source) };
        MaError::check(res)
    }

    pub fn ma_resource_manager_data_source_result(
        source: *const sys::ma_resource_manager_data_source,
    ) -> sys::ma_result {
        unsafe { sys::ma_resource_manager_data_source_result(source) }
    }

    /// Re-checks the load state, retrying once after `retry_delay` while the
    /// source still reports `MA_BUSY`.
    pub fn wait_until_ready(
        source: *const sys::ma_resource_manager_data_source,
        retry_delay: Duration,
    ) -> Result<(), MaError> {
        let res = ma_resource_manager_data_source_result(source);
        if res != sys::ma_result_MA_BUSY {
            return MaError::check(res);
        }
        tracing::trace!(?retry_delay, "data source busy, retrying once");
        std::thread::sleep(retry_delay);
        MaError::check(ma_resource_manager_data_source_result(source))
    }

    pub fn ma_resource_manager_data_source_uninit(
        source: *mut sys::ma_resource_manager_data_source,
    ) {
        unsafe {
            sys::ma_resource_manager_data_source_uninit(source);
        }
    }

    pub fn ma_data_source_get_data_format(
        source: *mut sys::ma_resource_manager_data_source,
    ) -> Result<DataFormat, MaError> {
        let mut format: sys::ma_format = sys::ma_format_ma_format_unknown;
        let mut channels: sys::ma_uint32 = 0;
        let mut sample_rate: sys::ma_uint32 = 0;
        let res = unsafe {
            sys::ma_data_source_get_data_format(
                source.cast::<sys::ma_data_source>(),
                &mut format,
                &mut channels,
                &mut sample_rate,
                core::ptr::null_mut(),
                0,
            )
        };
        MaError::check(res)?;
        Ok(DataFormat {
            format,
            channels,
            sample_rate,
        })
    }

    pub fn ma_data_source_get_length_in_pcm_frames(
        source: *mut sys::ma_resource_manager_data_source,
    ) -> Result<u64, MaError> {
        let mut length: sys::ma_uint64 = 0;
        let res = unsafe {
            sys::ma_data_source_get_length_in_pcm_frames(
                source.cast::<sys::ma_data_source>(),
                &mut length,
            )
        };
        MaError::check(res)?;
        Ok(length)
    }
}
