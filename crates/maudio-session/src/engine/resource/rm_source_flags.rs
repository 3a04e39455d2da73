use maudio_sys::ffi as sys;

type RmSourceFlagsRaw = sys::ma_resource_manager_data_source_flags;

/// Flags passed to `ma_resource_manager_data_source_init_ex`.
#[repr(transparent)]
#[derive(Debug, PartialEq, Clone, Copy, Hash, Eq)]
pub(crate) struct RmSourceFlags(RmSourceFlagsRaw);

impl RmSourceFlags {
    pub const DECODE: Self = Self(
        sys::ma_resource_manager_data_source_flags_MA_RESOURCE_MANAGER_DATA_SOURCE_FLAG_DECODE,
    );

    #[cfg(test)]
    pub const ASYNC: Self = Self(
        sys::ma_resource_manager_data_source_flags_MA_RESOURCE_MANAGER_DATA_SOURCE_FLAG_ASYNC,
    );

    pub const WAIT_INIT: Self = Self(
        sys::ma_resource_manager_data_source_flags_MA_RESOURCE_MANAGER_DATA_SOURCE_FLAG_WAIT_INIT,
    );

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    #[allow(clippy::unnecessary_cast)]
    pub fn bits(self) -> u32 {
        self.0 as u32
    }
}

impl core::ops::BitOr for RmSourceFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for RmSourceFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rm_source_flags_combine() {
        let mut flags = RmSourceFlags::DECODE;
        assert_eq!(flags.bits() & RmSourceFlags::WAIT_INIT.bits(), 0);

        flags |= RmSourceFlags::WAIT_INIT;
        assert_eq!(flags, RmSourceFlags::DECODE | RmSourceFlags::WAIT_INIT);
        assert_eq!(
            flags.bits(),
            RmSourceFlags::DECODE.bits() | RmSourceFlags::WAIT_INIT.bits()
        );
    }
}
