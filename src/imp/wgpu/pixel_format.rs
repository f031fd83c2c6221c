// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::pixel_formats::{Float4, SurfaceFormat, Unorm4, f16};

impl SurfaceFormat {
    pub(crate) const fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            SurfaceFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            SurfaceFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            SurfaceFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Whether a sampler may filter this format on a device with `features`.
    pub(crate) fn filterable(self, features: wgpu::Features) -> bool {
        match self {
            SurfaceFormat::Rgba32Float => features.contains(wgpu::Features::FLOAT32_FILTERABLE),
            SurfaceFormat::Rgba8Unorm | SurfaceFormat::Rgba16Float => true,
        }
    }

    /// Whether this format can be a blended render target on a device with `features`.
    pub(crate) fn blendable(self, features: wgpu::Features) -> bool {
        match self {
            SurfaceFormat::Rgba32Float => features.contains(wgpu::Features::FLOAT32_BLENDABLE),
            SurfaceFormat::Rgba8Unorm | SurfaceFormat::Rgba16Float => true,
        }
    }

    /// Decodes one texel as the device lays it out.
    ///
    /// `bytes` must hold [`Self::bytes_per_pixel`] bytes.
    pub(crate) fn decode_texel(self, bytes: &[u8]) -> Unorm4 {
        match self {
            SurfaceFormat::Rgba8Unorm => Unorm4::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            SurfaceFormat::Rgba16Float => {
                let channel =
                    |i: usize| f16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]).to_f32();
                Unorm4::from_floats(Float4::new(channel(0), channel(1), channel(2), channel(3)))
            }
            SurfaceFormat::Rgba32Float => {
                let channel = |i: usize| {
                    f32::from_le_bytes([
                        bytes[4 * i],
                        bytes[4 * i + 1],
                        bytes[4 * i + 2],
                        bytes[4 * i + 3],
                    ])
                };
                Unorm4::from_floats(Float4::new(channel(0), channel(1), channel(2), channel(3)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_texels_decode_to_unorm() {
        let mut bytes = Vec::new();
        for c in [0.0f32, 0.5, 1.0, 2.0] {
            bytes.extend_from_slice(&f16::from_f32(c).to_le_bytes());
        }
        assert_eq!(
            SurfaceFormat::Rgba16Float.decode_texel(&bytes),
            Unorm4 { r: 0, g: 128, b: 255, a: 255 }
        );
    }

    #[test]
    fn float32_needs_features_to_blend() {
        assert!(!SurfaceFormat::Rgba32Float.blendable(wgpu::Features::empty()));
        assert!(SurfaceFormat::Rgba32Float.blendable(wgpu::Features::FLOAT32_BLENDABLE));
        assert!(SurfaceFormat::Rgba16Float.filterable(wgpu::Features::empty()));
    }
}
