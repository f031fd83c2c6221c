// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Defines binding types */

pub mod parameters;
pub mod software;
pub mod surface;

pub use parameters::Parameters;
pub use surface::{SurfaceConfig, SurfaceHandle, Target};
