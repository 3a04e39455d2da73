//! Flags that control how a sound is initialized
use maudio_sys::ffi as sys;

type SoundFlagsRaw = sys::ma_sound_flags;

/// Typed wrapper around miniaudio's `ma_sound_flags`, forwarded unchanged to
/// `ma_sound_init_from_data_source`.
#[repr(transparent)]
#[derive(Debug, PartialEq, Clone, Copy, Hash, Eq)]
pub(crate) struct SoundFlags(SoundFlagsRaw);

impl SoundFlags {
    pub const NONE: Self = Self(0);
    /// Disables spatialization so the sound is always treated as non-positional.
    pub const NO_SPATIALIZATION: Self = Self(sys::ma_sound_flags_MA_SOUND_FLAG_NO_SPATIALIZATION);

    /// Flags for an instance of a sound with the given spatial setting.
    pub fn for_spatial(spatial: bool) -> Self {
        if spatial {
            SoundFlags::NONE
        } else {
            SoundFlags::NO_SPATIALIZATION
        }
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    #[allow(clippy::unnecessary_cast)]
    pub fn bits(self) -> u32 {
        self.0 as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sound_flags_follow_spatial_setting() {
        assert_eq!(SoundFlags::for_spatial(true), SoundFlags::NONE);
        assert_eq!(SoundFlags::for_spatial(false), SoundFlags::NO_SPATIALIZATION);
        assert_ne!(SoundFlags::NO_SPATIALIZATION.bits(), 0);
    }
}
