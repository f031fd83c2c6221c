// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! wavefield drives a 2D wave simulation that lives entirely on the GPU.

Simulation state is a grid of RGBA float texels (velocity in `xy`, height in `z`) that is
advanced by render-to-texture passes.  wavefield doesn't prescribe the physics.  What it provides
is the plumbing every such simulation needs around the physics:

| Piece                                              | Does                                                                 |
|----------------------------------------------------|----------------------------------------------------------------------|
| [`images::render_pass`]                            | Binds named parameters into a program and draws it over a surface   |
| [`images::disturb::DisturbanceBatcher`]            | Queues ripples and applies them as two blended passes per frame     |
| [`images::store::SampleStore`]                     | Reads back a handful of texels for game logic, without a full copy   |
| [`images::simulation::Simulation`]                 | Strings the above together over a ping-pong pair of wave surfaces   |

# Frame order

```text
step(physics) -> flush_disturbances() -> store_pixel(..) -> store_done() -> store_load()
```

`store_load` is the only call that waits for the device.  It blocks until every pass that
feeds the sampled texels is done, so results always reflect the current frame.

# Backends

Everything talks to the device through [`images::backend::RenderBackend`].

* [`WgpuBackend`] renders with [wgpu](https://wgpu.rs), so it inherits wgpu's support for
  Vulkan, Metal, DX12 and friends.  It is behind the default `backend_wgpu` feature.
* [`SoftwareBackend`] renders on the CPU with the same blending and quantization.  It needs no
  adapter, which makes it the backend of choice for tests and headless tools.

# Example

```
use wavefield::SoftwareBackend;
use wavefield::images::simulation::{Simulation, SimulationConfig};
use wavefield::pixel_formats::Float4;

let mut simulation: Simulation<_> =
    Simulation::new(SoftwareBackend::new(64, 64), SimulationConfig::new(32)).unwrap();
simulation.disturb([0.5, 0.5], 0.1, Float4::ZERO, Float4::new(0.0, 0.0, 1.0, 0.0));
simulation.flush_disturbances().unwrap();
simulation.store_pixel("bobber".to_string(), 16, 16);
simulation.store_done().unwrap();
simulation.store_load().unwrap();
assert!(simulation.read_stored_pixel("bobber").unwrap().h > 0.5);
```
*/

logwise::declare_logging_domain!();

pub mod bindings;
pub mod debug;
mod error;
pub mod images;
mod imp;
pub mod pixel_formats;

pub use error::Error;
#[cfg(feature = "backend_wgpu")]
pub use error::BackendError;
pub use imp::SoftwareBackend;
#[cfg(feature = "backend_wgpu")]
pub use imp::WgpuBackend;
