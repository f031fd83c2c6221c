// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Errors returned across the crate.
use crate::bindings::surface::SurfaceHandle;
use crate::pixel_formats::SurfaceFormat;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("No surface with handle {0:?}")]
    UnknownSurface(SurfaceHandle),
    #[error("Program {program} samples surface parameter {parameter}, which was never bound")]
    UnboundParameter { program: String, parameter: String },
    #[error("Program {program} samples its own render target through parameter {parameter}")]
    TargetIsBound { program: String, parameter: String },
    #[error("Program {0} has no software kernel")]
    NoSoftwareKernel(String),
    #[error("Surface format {0:?} can't be blended on this device")]
    NotBlendable(SurfaceFormat),
    #[error(
        "Read of {width}x{height} at ({x},{y}) exceeds target of {target_width}x{target_height}"
    )]
    ReadOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },
    #[error("A sample store needs a nonzero grid size and capacity, got {grid_size} and {capacity}")]
    InvalidStoreConfig { grid_size: u32, capacity: u32 },
    #[error("Surfaces must be at least 1x1, got {width}x{height}")]
    InvalidSurfaceSize { width: u32, height: u32 },
    #[cfg(feature = "backend_wgpu")]
    #[error("GPU error {0}")]
    Backend(#[from] BackendError),
}

/// An error reported by the GPU backend.
#[cfg(feature = "backend_wgpu")]
#[derive(Debug)]
pub struct BackendError(pub(crate) crate::imp::wgpu::Error);

#[cfg(feature = "backend_wgpu")]
impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(feature = "backend_wgpu")]
impl std::error::Error for BackendError {}

#[cfg(feature = "backend_wgpu")]
impl From<crate::imp::wgpu::Error> for Error {
    fn from(e: crate::imp::wgpu::Error) -> Self {
        Error::Backend(BackendError(e))
    }
}
