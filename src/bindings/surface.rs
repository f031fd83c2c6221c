// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Surfaces and render targets.
//!
//! A surface is a 2D grid of RGBA texels resident on the rendering device.  The host only
//! ever holds a [`SurfaceHandle`]; texels are written by render passes and read back by
//! [`crate::images::backend::RenderBackend::read_pixels`].
//!
//! # Coordinates
//!
//! Surfaces are addressed with normalized coordinates in [0, 1)², using the same convention
//! as the rest of the crate:
//!
//! ```text
//!            u
//!       0 ────────▶ 1
//!       │ ┌───────┐
//!     v │ │       │
//!       │ │       │
//!       ▼ └───────┘
//!       1
//! ```
//!
//! Texel `(x, y)` of a `w`×`h` surface has its center at `((x + 0.5) / w, (y + 0.5) / h)`.
use crate::pixel_formats::SurfaceFormat;

/// Opaque handle to a surface owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub(crate) u32);

/// How a surface is filtered when a program samples it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Every sample returns exactly one texel.
    Nearest,
    /// Samples interpolate between the four nearest texel centers.
    #[default]
    Linear,
}

/// Describes a surface to allocate.
///
/// Surfaces wrap (repeat) in both axes when sampled.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub filter: FilterMode,
    pub format: SurfaceFormat,
    pub debug_name: String,
}

impl SurfaceConfig {
    /// A `width`×`height` surface with linear filtering and half-float storage.
    pub fn new(width: u32, height: u32) -> Self {
        SurfaceConfig {
            width,
            height,
            filter: FilterMode::default(),
            format: SurfaceFormat::default(),
            debug_name: "surface".to_string(),
        }
    }
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }
    pub fn with_format(mut self, format: SurfaceFormat) -> Self {
        self.format = format;
        self
    }
    pub fn with_debug_name(mut self, debug_name: impl Into<String>) -> Self {
        self.debug_name = debug_name.into();
        self
    }

    /// Index of the texel that covers normalized coordinate `uv`, wrapping outside [0, 1).
    pub fn texel_at(&self, uv: [f32; 2]) -> (u32, u32) {
        (
            wrap_index(uv[0], self.width),
            wrap_index(uv[1], self.height),
        )
    }

    /// Normalized coordinate of the center of texel `(x, y)`.
    pub fn texel_center(&self, x: u32, y: u32) -> [f32; 2] {
        [
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        ]
    }
}

fn wrap_index(coord: f32, extent: u32) -> u32 {
    let scaled = (coord - coord.floor()) * extent as f32;
    (scaled as u32).min(extent - 1)
}

/// Where a pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// An allocated surface.
    Surface(SurfaceHandle),
    /// The backend's default framebuffer.
    Framebuffer,
}

impl From<SurfaceHandle> for Target {
    fn from(handle: SurfaceHandle) -> Self {
        Target::Surface(handle)
    }
}

impl From<Option<SurfaceHandle>> for Target {
    fn from(handle: Option<SurfaceHandle>) -> Self {
        handle.map_or(Target::Framebuffer, Target::Surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_lookup_wraps() {
        let config = SurfaceConfig::new(4, 8);
        assert_eq!(config.texel_at([0.0, 0.0]), (0, 0));
        assert_eq!(config.texel_at([0.99, 0.99]), (3, 7));
        assert_eq!(config.texel_at([1.0, 1.0]), (0, 0));
        assert_eq!(config.texel_at([-0.25, 0.5]), (3, 4));
    }

    #[test]
    fn texel_center_round_trips() {
        let config = SurfaceConfig::new(32, 32);
        let center = config.texel_center(5, 10);
        assert_eq!(config.texel_at(center), (5, 10));
    }

    #[test]
    fn missing_target_is_framebuffer() {
        assert_eq!(Target::from(None), Target::Framebuffer);
        assert_eq!(
            Target::from(Some(SurfaceHandle(3))),
            Target::Surface(SurfaceHandle(3))
        );
    }
}
