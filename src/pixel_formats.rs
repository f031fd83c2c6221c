// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel types and surface formats.
//!
//! Simulation state is a grid of RGBA floating-point texels.  On the host side a texel is a
//! [`Float4`]; values that travel through an 8-bit channel (the sample store's side texture,
//! debug captures) are [`Unorm4`].
//!
//! Surfaces declare their storage with a [`SurfaceFormat`].  The format decides how much
//! precision survives a write:
//!
//! - [`SurfaceFormat::Rgba8Unorm`] - 8-bit normalized, clamped to [0, 1]
//! - [`SurfaceFormat::Rgba16Float`] - half precision, blendable on every device
//! - [`SurfaceFormat::Rgba32Float`] - full precision, blendable only where the device allows it
//!
//! # Examples
//!
//! ```
//! use wavefield::pixel_formats::{Float4, Unorm4};
//!
//! let height = Float4 { r: 0.0, g: 0.0, b: 0.5, a: 1.0 };
//! let packed = Unorm4::from_floats(height);
//! assert_eq!(packed.b, 128);
//! let unpacked = Float4::from_unorm(packed);
//! assert!((unpacked.b - 0.5).abs() <= 1.0 / 255.0);
//! ```

pub use half::f16;

pub(crate) mod sealed {
    /// Marker trait indicating C-compatible memory layout.
    ///
    /// # Safety
    ///
    /// Implementors must have no padding and no uninitialized bytes.
    pub unsafe trait ReprC {}
}

use sealed::ReprC;

/// Convert a slice of C-compatible values to raw bytes.
#[allow(dead_code)] //software-only builds do not upload
pub(crate) fn pixel_as_bytes<T: ReprC>(t: &[T]) -> &[u8] {
    //safe because we know that T is repr(C)
    unsafe { std::slice::from_raw_parts(t.as_ptr() as *const u8, std::mem::size_of_val(t)) }
}

/// 4-channel 32-bit float pixel.
///
/// This is the host-side value of a simulation texel, a disturbance multiplier or a
/// disturbance additive term.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Float4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}
unsafe impl ReprC for Float4 {}

impl Float4 {
    pub const ZERO: Float4 = Float4::splat(0.0);
    pub const ONE: Float4 = Float4::splat(1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Float4 { r, g, b, a }
    }

    pub const fn splat(v: f32) -> Self {
        Float4 { r: v, g: v, b: v, a: v }
    }

    /// Decodes an 8-bit normalized pixel as `channel / 255`.
    pub fn from_unorm(unorm: Unorm4) -> Self {
        Float4 {
            r: unorm.r as f32 / 255.0,
            g: unorm.g as f32 / 255.0,
            b: unorm.b as f32 / 255.0,
            a: unorm.a as f32 / 255.0,
        }
    }

    /// Applies `f` to each channel.
    #[inline]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Float4 {
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
            a: f(self.a),
        }
    }

    /// Combines two pixels channel by channel.
    #[inline]
    pub fn zip(self, other: Float4, f: impl Fn(f32, f32) -> f32) -> Self {
        Float4 {
            r: f(self.r, other.r),
            g: f(self.g, other.g),
            b: f(self.b, other.b),
            a: f(self.a, other.a),
        }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Float4 {
    fn default() -> Self {
        Float4::ZERO
    }
}

impl From<[f32; 4]> for Float4 {
    fn from(v: [f32; 4]) -> Self {
        Float4::new(v[0], v[1], v[2], v[3])
    }
}

/// 4-channel 8-bit normalized pixel.
///
/// ```
/// use wavefield::pixel_formats::{Unorm4, Float4};
///
/// let float_color = Float4 { r: 1.0, g: 0.5, b: 0.0, a: 2.0 };
/// let unorm_color = Unorm4::from_floats(float_color);
/// assert_eq!(unorm_color, Unorm4 { r: 255, g: 128, b: 0, a: 255 });
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unorm4 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}
unsafe impl ReprC for Unorm4 {}
impl Unorm4 {
    /// Convert from normalized float values (0.0-1.0) to 8-bit values (0-255).
    ///
    /// Values are clamped to the valid range and rounded to nearest integer.
    pub fn from_floats(float4: Float4) -> Self {
        Unorm4 {
            r: (float4.r * 255.0).round().clamp(0.0, 255.0) as u8,
            g: (float4.g * 255.0).round().clamp(0.0, 255.0) as u8,
            b: (float4.b * 255.0).round().clamp(0.0, 255.0) as u8,
            a: (float4.a * 255.0).round().clamp(0.0, 255.0) as u8,
        }
    }

    /// Reads one pixel from tightly packed RGBA bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Unorm4 {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
    }
}

/// Storage format of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceFormat {
    Rgba8Unorm,
    #[default]
    Rgba16Float,
    Rgba32Float,
}

impl SurfaceFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            SurfaceFormat::Rgba8Unorm => 4,
            SurfaceFormat::Rgba16Float => 8,
            SurfaceFormat::Rgba32Float => 16,
        }
    }

    /// The value a texel holds after `value` is written to a surface of this format.
    pub fn quantize(self, value: Float4) -> Float4 {
        match self {
            SurfaceFormat::Rgba8Unorm => Float4::from_unorm(Unorm4::from_floats(value)),
            SurfaceFormat::Rgba16Float => value.map(|c| f16::from_f32(c).to_f32()),
            SurfaceFormat::Rgba32Float => value,
        }
    }
}

/// Host-side layout of a pixel readback.
///
/// Readbacks are tightly packed, top row first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadFormat {
    #[default]
    Rgba8Unorm,
}

impl ReadFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            ReadFormat::Rgba8Unorm => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unorm_decode_is_channel_over_255() {
        let f = Float4::from_unorm(Unorm4 { r: 0, g: 51, b: 255, a: 128 });
        assert_eq!(f.r, 0.0);
        assert_eq!(f.g, 0.2);
        assert_eq!(f.b, 1.0);
        assert_eq!(f.a, 128.0 / 255.0);
    }

    #[test]
    fn quantize_clamps_unorm() {
        let q = SurfaceFormat::Rgba8Unorm.quantize(Float4::new(-0.5, 1.5, 0.25, 1.0));
        assert_eq!(q.r, 0.0);
        assert_eq!(q.g, 1.0);
        assert!((q.b - 0.25).abs() <= 0.5 / 255.0);
    }

    #[test]
    fn quantize_half_keeps_small_integers() {
        let v = Float4::new(1.0, -2.0, 0.5, 0.0);
        assert_eq!(SurfaceFormat::Rgba16Float.quantize(v), v);
        let lossy = SurfaceFormat::Rgba16Float.quantize(Float4::splat(0.1));
        assert_ne!(lossy.r, 0.1);
        assert!((lossy.r - 0.1).abs() < 1e-3);
    }
}
