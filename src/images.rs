// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The rendering component of wavefield */

pub mod backend;
pub mod disturb;
pub mod program;
pub mod render_pass;
pub mod shader;
pub mod simulation;
pub mod store;

pub use backend::RenderBackend;
pub use simulation::Simulation;
