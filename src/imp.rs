// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//software rendering is always available; wgpu is behind backend_wgpu

mod software;
pub use software::SoftwareBackend;

#[cfg(feature = "backend_wgpu")]
pub(crate) mod wgpu;

#[cfg(feature = "backend_wgpu")]
pub use wgpu::WgpuBackend;
