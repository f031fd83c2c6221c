// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The rendering backend abstraction.

Everything above this module (the render pass executor, the disturbance batcher, the sample
store and the simulation driver) talks to the device only through [`RenderBackend`].  Two
implementations ship with the crate:

* [`crate::WgpuBackend`] renders on a GPU through wgpu (feature `backend_wgpu`, on by default).
* [`crate::SoftwareBackend`] renders on the CPU with identical blending semantics, and is used
  by the tests and on machines without an adapter.

# Auto-clear

Backends carry an auto-clear flag, on by default.  While it is on, a
[`RenderBackend::render_geometry`] call clears its target to zero before drawing.  Full-screen
draws cover every texel and ignore the flag.
*/
use crate::bindings::surface::{SurfaceConfig, SurfaceHandle, Target};
use crate::error::Error;
use crate::images::program::Program;
use crate::images::disturb::Disturbance;
use crate::pixel_formats::ReadFormat;

/// How fragment output combines with the texel already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `dst = src`
    Replace,
    /// `dst = dst * src`
    Multiply,
    /// `dst = dst + src`
    Additive,
}

/// Which half of a disturbance flush a geometry batch draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisturbPass {
    /// Writes `1 - alpha * (1 - multiplier)`, for use with [`BlendMode::Multiply`].
    Multiply,
    /// Writes `alpha * additive`, for use with [`BlendMode::Additive`].
    Add,
}

/// One sample store slot, as the gather pass draws it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatherSlot {
    /// Normalized source coordinate to sample.
    pub position: [f32; 2],
    /// `slot / capacity`; selects the destination row.
    pub depth: f32,
}

/// Instanced geometry drawn by [`RenderBackend::render_geometry`].
#[derive(Debug, Clone, Copy)]
pub enum GeometryBatch<'a> {
    /// One radial-falloff quad per event.
    Disturbances {
        pass: DisturbPass,
        events: &'a [Disturbance],
    },
    /// One point per slot, copying the source texel at `position` into row
    /// `round(depth * capacity)` of a `1 × capacity` target.
    Gather {
        source: SurfaceHandle,
        grid_size: u32,
        capacity: u32,
        slots: &'a [GatherSlot],
    },
}

impl GeometryBatch<'_> {
    /// Number of instanced draws in the batch.
    pub fn len(&self) -> usize {
        match self {
            GeometryBatch::Disturbances { events, .. } => events.len(),
            GeometryBatch::Gather { slots, .. } => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters a backend keeps for inspection.
///
/// Draw counters count instances, so a disturbance batch of five events adds five.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub fullscreen_draws: u64,
    pub multiply_draws: u64,
    pub additive_draws: u64,
    pub replace_draws: u64,
    pub readbacks: u64,
    pub bytes_read: u64,
}

/// A device that can hold surfaces and run passes over them.
pub trait RenderBackend {
    /// Creates a surface.  Fresh surfaces hold zero in every channel.
    fn allocate_surface(&mut self, config: SurfaceConfig) -> Result<SurfaceHandle, Error>;

    /// Frees a surface.  Unknown handles are ignored.
    fn release_surface(&mut self, handle: SurfaceHandle);

    fn surface_config(&self, handle: SurfaceHandle) -> Option<&SurfaceConfig>;

    /// Size of the default framebuffer.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Runs `program` over every texel of `target`, replacing its contents.
    ///
    /// Parameters are taken from the program's bound values.
    fn render_fullscreen_quad(&mut self, target: Target, program: &Program) -> Result<(), Error>;

    /// Draws `batch` into `target` with `blend`.
    ///
    /// If auto-clear is on the target is cleared first, even when the batch is empty.
    fn render_geometry(
        &mut self,
        target: Target,
        batch: &GeometryBatch<'_>,
        blend: BlendMode,
    ) -> Result<(), Error>;

    /// Reads a `width × height` rectangle at `(x, y)`, tightly packed, top row first.
    fn read_pixels(
        &mut self,
        target: Target,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: ReadFormat,
    ) -> Result<Vec<u8>, Error>;

    fn set_auto_clear(&mut self, auto_clear: bool);

    fn auto_clear(&self) -> bool;

    fn stats(&self) -> BackendStats;
}

impl<B: RenderBackend + ?Sized> RenderBackend for &mut B {
    fn allocate_surface(&mut self, config: SurfaceConfig) -> Result<SurfaceHandle, Error> {
        (**self).allocate_surface(config)
    }
    fn release_surface(&mut self, handle: SurfaceHandle) {
        (**self).release_surface(handle)
    }
    fn surface_config(&self, handle: SurfaceHandle) -> Option<&SurfaceConfig> {
        (**self).surface_config(handle)
    }
    fn framebuffer_size(&self) -> (u32, u32) {
        (**self).framebuffer_size()
    }
    fn render_fullscreen_quad(&mut self, target: Target, program: &Program) -> Result<(), Error> {
        (**self).render_fullscreen_quad(target, program)
    }
    fn render_geometry(
        &mut self,
        target: Target,
        batch: &GeometryBatch<'_>,
        blend: BlendMode,
    ) -> Result<(), Error> {
        (**self).render_geometry(target, batch, blend)
    }
    fn read_pixels(
        &mut self,
        target: Target,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: ReadFormat,
    ) -> Result<Vec<u8>, Error> {
        (**self).read_pixels(target, x, y, width, height, format)
    }
    fn set_auto_clear(&mut self, auto_clear: bool) {
        (**self).set_auto_clear(auto_clear)
    }
    fn auto_clear(&self) -> bool {
        (**self).auto_clear()
    }
    fn stats(&self) -> BackendStats {
        (**self).stats()
    }
}

/// Size of `target` in texels, or `None` for an unknown surface.
pub fn target_size<B: RenderBackend + ?Sized>(backend: &B, target: Target) -> Option<(u32, u32)> {
    match target {
        Target::Framebuffer => Some(backend.framebuffer_size()),
        Target::Surface(handle) => backend
            .surface_config(handle)
            .map(|c| (c.width, c.height)),
    }
}
