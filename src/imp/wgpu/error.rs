// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    RequestDevice(#[from] wgpu::RequestDeviceError),
    Map(#[from] wgpu::BufferAsyncError),
    Poll(#[from] wgpu::PollError),
    MapCallbackDropped,
    Validation(#[from] wgpu::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoSuchAdapter(e) => write!(f, "No such adapter: {}", e),
            Error::RequestDevice(e) => write!(f, "{}", e),
            Error::Map(e) => write!(f, "Can't map readback buffer: {}", e),
            Error::Poll(e) => write!(f, "Can't wait for the device: {}", e),
            Error::MapCallbackDropped => write!(f, "Readback was abandoned by the device"),
            Error::Validation(e) => write!(f, "{}", e),
        }
    }
}
