// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The per-frame simulation driver.

[`Simulation`] owns a backend and a ping-pong pair of wave surfaces, and strings the
disturbance batcher and sample store together in frame order:

```text
step(program) -> flush_disturbances() -> store_pixel(..) -> store_done() -> store_load()
```

No physics is built in.  A step program reads the current state through its `wave` surface
parameter ([`WAVE_PARAMETER`]), which the driver binds, and writes the next state.

```
use wavefield::SoftwareBackend;
use wavefield::bindings::parameters::{ParameterKind, Parameters};
use wavefield::images::program::Program;
use wavefield::images::shader::FragmentShader;
use wavefield::images::simulation::{Simulation, SimulationConfig, WAVE_PARAMETER};
use wavefield::pixel_formats::Float4;

let backend = SoftwareBackend::new(64, 64);
let mut simulation: Simulation<_> = Simulation::new(backend, SimulationConfig::new(32)).unwrap();
let mut damp = Program::new("damp", FragmentShader::new("damp", String::new()))
    .with_parameter(WAVE_PARAMETER, ParameterKind::Surface)
    .with_software_kernel(|input| input.sample(WAVE_PARAMETER, input.uv).map(|c| c * 0.5));

simulation.disturb([0.5, 0.5], 0.2, Float4::ZERO, Float4::new(0.0, 0.0, 1.0, 0.0));
simulation.flush_disturbances().unwrap();
simulation.step(&mut damp, &Parameters::new()).unwrap();

assert!(simulation.store_pixel("center".to_string(), 16, 16));
simulation.store_done().unwrap();
simulation.store_load().unwrap();
let h = simulation.read_stored_pixel("center").unwrap().h;
assert!(h > 0.4 && h < 0.6);
```
*/
use crate::bindings::parameters::{ParameterValue, Parameters};
use crate::bindings::surface::{SurfaceConfig, SurfaceHandle, Target};
use crate::error::Error;
use crate::images::backend::RenderBackend;
use crate::images::disturb::{DEFAULT_MAX_DISTURBANCES, Disturbance, DisturbanceBatcher};
use crate::images::program::Program;
use crate::images::render_pass::{clear, render};
use crate::images::store::{CapturedSample, DEFAULT_MAX_QUERIES, SampleStore};
use crate::pixel_formats::Float4;
use std::borrow::Borrow;
use std::hash::Hash;

/// Name of the surface parameter through which step programs read the current state.
pub const WAVE_PARAMETER: &str = "wave";

/// Construction-time configuration of a [`Simulation`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Cells per side of the simulation grid.
    pub grid_size: u32,
    pub max_disturbances: usize,
    pub max_queries: u32,
    /// Configuration of the wave surfaces.  Its size is taken from `grid_size`.
    pub surface: SurfaceConfig,
}

impl SimulationConfig {
    pub fn new(grid_size: u32) -> Self {
        SimulationConfig {
            grid_size,
            max_disturbances: DEFAULT_MAX_DISTURBANCES,
            max_queries: DEFAULT_MAX_QUERIES,
            surface: SurfaceConfig::new(grid_size, grid_size).with_debug_name("wave"),
        }
    }
    pub fn with_max_disturbances(mut self, max_disturbances: usize) -> Self {
        self.max_disturbances = max_disturbances;
        self
    }
    pub fn with_max_queries(mut self, max_queries: u32) -> Self {
        self.max_queries = max_queries;
        self
    }
    pub fn with_surface(mut self, surface: SurfaceConfig) -> Self {
        self.surface = surface;
        self
    }
}

/// A wave simulation running on `B`, with samples keyed by `K`.
#[derive(Debug)]
pub struct Simulation<B: RenderBackend, K = String> {
    backend: B,
    config: SimulationConfig,
    //[current, next]
    waves: [SurfaceHandle; 2],
    batcher: DisturbanceBatcher,
    store: SampleStore<K>,
}

impl<B: RenderBackend, K: Eq + Hash> Simulation<B, K> {
    /// Allocates the wave surfaces and the sample store, and zeroes the state.
    pub fn new(mut backend: B, config: SimulationConfig) -> Result<Self, Error> {
        let surface = SurfaceConfig {
            width: config.grid_size,
            height: config.grid_size,
            ..config.surface.clone()
        };
        let current = backend.allocate_surface(surface.clone())?;
        let next = backend.allocate_surface(surface)?;
        let store = SampleStore::new(&mut backend, config.grid_size, config.max_queries)?;
        clear(&mut backend, Target::Surface(current))?;
        clear(&mut backend, Target::Surface(next))?;
        logwise::info_sync!(
            "Created simulation with grid {grid_size}",
            grid_size = config.grid_size
        );
        Ok(Simulation {
            backend,
            batcher: DisturbanceBatcher::new(config.max_disturbances),
            config,
            waves: [current, next],
            store,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The surface holding the current state.
    pub fn wave(&self) -> SurfaceHandle {
        self.waves[0]
    }

    pub fn batcher(&self) -> &DisturbanceBatcher {
        &self.batcher
    }

    pub fn store(&self) -> &SampleStore<K> {
        &self.store
    }

    /// Renders `program` from the current state into the other surface, then swaps them.
    ///
    /// [`WAVE_PARAMETER`] is bound to the current state before `parameters`, so a `wave`
    /// entry in `parameters` wins.
    pub fn step(&mut self, program: &mut Program, parameters: &Parameters) -> Result<(), Error> {
        program.bind(WAVE_PARAMETER, ParameterValue::Surface(self.waves[0]));
        render(
            &mut self.backend,
            Target::Surface(self.waves[1]),
            program,
            parameters,
        )?;
        self.waves.swap(0, 1);
        Ok(())
    }

    /// Renders `program` into the current state surface, replacing it.
    pub fn render_to_wave(
        &mut self,
        program: &mut Program,
        parameters: &Parameters,
    ) -> Result<(), Error> {
        render(
            &mut self.backend,
            Target::Surface(self.waves[0]),
            program,
            parameters,
        )
    }

    /// Zeroes the current state.
    pub fn reset(&mut self) -> Result<(), Error> {
        clear(&mut self.backend, Target::Surface(self.waves[0]))
    }

    /// Queues a disturbance of the current state.  Returns `false` if it was dropped.
    pub fn disturb(
        &mut self,
        position: [f32; 2],
        radius: f32,
        multiplier: Float4,
        additive: Float4,
    ) -> bool {
        self.batcher
            .enqueue(Disturbance::new(position, radius, multiplier, additive))
    }

    /// Draws the queued disturbances into the current state.
    pub fn flush_disturbances(&mut self) -> Result<(), Error> {
        self.batcher
            .flush(&mut self.backend, Target::Surface(self.waves[0]))
    }

    /// Registers grid cell `(grid_x, grid_y)` for sampling under `id`.
    pub fn store_pixel(&mut self, id: K, grid_x: i32, grid_y: i32) -> bool {
        self.store.store_pixel(id, grid_x, grid_y)
    }

    /// Gathers the registered cells from the current state.
    pub fn store_done(&mut self) -> Result<(), Error> {
        self.store.gather(&mut self.backend, self.waves[0])
    }

    /// Reads the gathered samples back.  Blocks until the device is done.
    pub fn store_load(&mut self) -> Result<(), Error> {
        self.store.load(&mut self.backend)
    }

    /// The sample loaded for `id` by the last [`Self::store_load`].
    pub fn read_stored_pixel<Q>(&self, id: &Q) -> Option<CapturedSample>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.store.get(id)
    }
}
