use maudio_sys::ffi as sys;

use crate::MaError;

/// Sample format (numeric representation of decoded audio samples).
///
/// - **`Format::U8`**  8-bit unsigned integer
/// - **`Format::S16`** 16-bit signed integer
/// - **`Format::S24`** 24-bit signed integer (tightly packed)
/// - **`Format::S32`** 32-bit signed integer
/// - **`Format::F32`** 32-bit floating point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum Format {
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl Format {
    /// Bits per sample.
    pub fn bit_depth(self) -> u32 {
        match self {
            Format::U8 => 8,
            Format::S16 => 16,
            Format::S24 => 24,
            Format::S32 | Format::F32 => 32,
        }
    }

    /// Bit depth for a raw native format. Unknown formats report 0.
    pub(crate) fn bit_depth_of(raw: sys::ma_format) -> u32 {
        Format::try_from(raw).map(Format::bit_depth).unwrap_or(0)
    }
}

impl From<Format> for sys::ma_format {
    fn from(value: Format) -> Self {
        match value {
            Format::U8 => sys::ma_format_ma_format_u8,
            Format::S16 => sys::ma_format_ma_format_s16,
            Format::S24 => sys::ma_format_ma_format_s24,
            Format::S32 => sys::ma_format_ma_format_s32,
            Format::F32 => sys::ma_format_ma_format_f32,
        }
    }
}

impl TryFrom<sys::ma_format> for Format {
    type Error = MaError;

    fn try_from(value: sys::ma_format) -> Result<Self, Self::Error> {
        match value {
            sys::ma_format_ma_format_u8 => Ok(Format::U8),
            sys::ma_format_ma_format_s16 => Ok(Format::S16),
            sys::ma_format_ma_format_s24 => Ok(Format::S24),
            sys::ma_format_ma_format_s32 => Ok(Format::S32),
            sys::ma_format_ma_format_f32 => Ok(Format::F32),
            _ => Err(MaError::INVALID_ARGS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_try_from_sys_accepts_known_values() {
        let cases = [
            (sys::ma_format_ma_format_u8, Format::U8),
            (sys::ma_format_ma_format_s16, Format::S16),
            (sys::ma_format_ma_format_s24, Format::S24),
            (sys::ma_format_ma_format_s32, Format::S32),
            (sys::ma_format_ma_format_f32, Format::F32),
        ];
        for (raw, format) in cases {
            assert_eq!(Format::try_from(raw).unwrap(), format);
            assert_eq!(sys::ma_format::from(format), raw);
        }
    }

    #[test]
    fn test_formats_rejects_unknown_values() {
        let err = Format::try_from(sys::ma_format_ma_format_unknown).unwrap_err();
        assert_eq!(err, MaError::INVALID_ARGS);
    }

    #[test]
    fn test_formats_bit_depth_table() {
        assert_eq!(Format::bit_depth_of(sys::ma_format_ma_format_u8), 8);
        assert_eq!(Format::bit_depth_of(sys::ma_format_ma_format_s16), 16);
        assert_eq!(Format::bit_depth_of(sys::ma_format_ma_format_s24), 24);
        assert_eq!(Format::bit_depth_of(sys::ma_format_ma_format_s32), 32);
        assert_eq!(Format::bit_depth_of(sys::ma_format_ma_format_f32), 32);
        assert_eq!(Format::bit_depth_of(sys::ma_format_ma_format_unknown), 0);
    }
}
