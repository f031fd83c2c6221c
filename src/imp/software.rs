// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A CPU implementation of [`RenderBackend`].

Surfaces are [`Texture`]s held in host memory.  Full-screen programs run their
[`crate::images::program::SoftwareKernel`] once per texel; the built-in disturbance and gather
geometry is rasterized directly.  Every write is quantized to the surface's format, so an
`Rgba16Float` surface holds exactly what the GPU would store.
*/
use crate::bindings::software::texture::{Texel, Texture};
use crate::bindings::surface::{FilterMode, SurfaceConfig, SurfaceHandle, Target};
use crate::error::Error;
use crate::images::backend::{
    BackendStats, BlendMode, DisturbPass, GatherSlot, GeometryBatch, RenderBackend,
};
use crate::images::disturb::{Disturbance, additive_term, multiply_factor};
use crate::images::program::{FragmentInput, Program, SurfaceSampler};
use crate::pixel_formats::{Float4, ReadFormat, SurfaceFormat, Unorm4};
use std::collections::HashMap;

#[derive(Debug)]
struct SoftSurface {
    config: SurfaceConfig,
    texture: Texture,
}

impl SoftSurface {
    fn new(config: SurfaceConfig) -> Self {
        let texture = Texture::new(config.width, config.height, Float4::ZERO);
        SoftSurface { config, texture }
    }

    fn sample(&self, uv: [f32; 2]) -> Float4 {
        match self.config.filter {
            FilterMode::Nearest => self.texture.sample_nearest(uv),
            FilterMode::Linear => self.texture.sample_linear(uv),
        }
    }

    fn write(&mut self, texel: Texel, blend: BlendMode, src: Float4) {
        let dst = self.texture[texel];
        let value = match blend {
            BlendMode::Replace => src,
            BlendMode::Multiply => dst.zip(src, |d, s| d * s),
            BlendMode::Additive => dst.zip(src, |d, s| d + s),
        };
        self.texture[texel] = self.config.format.quantize(value);
    }
}

struct Surfaces<'a>(&'a HashMap<SurfaceHandle, SoftSurface>);

impl SurfaceSampler for Surfaces<'_> {
    fn sample(&self, surface: SurfaceHandle, uv: [f32; 2]) -> Option<Float4> {
        self.0.get(&surface).map(|s| s.sample(uv))
    }
}

/**
Renders on the CPU.

```
use wavefield::SoftwareBackend;
use wavefield::bindings::surface::SurfaceConfig;
use wavefield::images::backend::RenderBackend;

let mut backend = SoftwareBackend::new(64, 64);
let surface = backend.allocate_surface(SurfaceConfig::new(8, 8)).unwrap();
assert_eq!(backend.surface_config(surface).unwrap().width, 8);
```
*/
#[derive(Debug)]
pub struct SoftwareBackend {
    surfaces: HashMap<SurfaceHandle, SoftSurface>,
    framebuffer: SoftSurface,
    next_handle: u32,
    auto_clear: bool,
    stats: BackendStats,
}

impl SoftwareBackend {
    /// Creates a backend whose default framebuffer is `width × height` RGBA8.
    pub fn new(width: u32, height: u32) -> Self {
        let framebuffer = SoftSurface::new(
            SurfaceConfig::new(width, height)
                .with_filter(FilterMode::Nearest)
                .with_format(SurfaceFormat::Rgba8Unorm)
                .with_debug_name("framebuffer"),
        );
        SoftwareBackend {
            surfaces: HashMap::new(),
            framebuffer,
            next_handle: 0,
            auto_clear: true,
            stats: BackendStats::default(),
        }
    }

    /// The texels of `handle`.
    pub fn texture(&self, handle: SurfaceHandle) -> Option<&Texture> {
        self.surfaces.get(&handle).map(|s| &s.texture)
    }

    /// Overwrites every texel of `handle` with `f(texel)`, quantized to the surface's format.
    pub fn write_texels(
        &mut self,
        handle: SurfaceHandle,
        f: impl Fn(Texel) -> Float4,
    ) -> Result<(), Error> {
        let surface = self
            .surfaces
            .get_mut(&handle)
            .ok_or(Error::UnknownSurface(handle))?;
        let format = surface.config.format;
        surface.texture = Texture::new_with(surface.config.width, surface.config.height, |t| {
            format.quantize(f(t))
        });
        Ok(())
    }

    fn target_mut(&mut self, target: Target) -> Result<&mut SoftSurface, Error> {
        match target {
            Target::Framebuffer => Ok(&mut self.framebuffer),
            Target::Surface(handle) => self
                .surfaces
                .get_mut(&handle)
                .ok_or(Error::UnknownSurface(handle)),
        }
    }

    fn target(&self, target: Target) -> Result<&SoftSurface, Error> {
        match target {
            Target::Framebuffer => Ok(&self.framebuffer),
            Target::Surface(handle) => self
                .surfaces
                .get(&handle)
                .ok_or(Error::UnknownSurface(handle)),
        }
    }

    fn draw_disturbances(
        surface: &mut SoftSurface,
        pass: DisturbPass,
        events: &[Disturbance],
        blend: BlendMode,
    ) {
        let (width, height) = (surface.config.width, surface.config.height);
        for event in events {
            //texels whose centers may fall inside the circle
            let span = |center: f32, extent: u32| {
                let lo = ((center - event.radius) * extent as f32 - 0.5).floor();
                let hi = ((center + event.radius) * extent as f32 - 0.5).ceil();
                let lo = lo.max(0.0) as u32;
                let hi = hi.min(extent as f32 - 1.0);
                if hi < 0.0 { None } else { Some((lo, hi as u32)) }
            };
            let (Some((x0, x1)), Some((y0, y1))) = (
                span(event.position[0], width),
                span(event.position[1], height),
            ) else {
                continue;
            };
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let uv = surface.config.texel_center(x, y);
                    let Some(alpha) = event.alpha_at(uv) else {
                        continue;
                    };
                    let src = match pass {
                        DisturbPass::Multiply => multiply_factor(alpha, event.multiplier),
                        DisturbPass::Add => additive_term(alpha, event.additive),
                    };
                    surface.write(Texel { x, y }, blend, src);
                }
            }
        }
    }

    fn gathered_values(
        &self,
        source: SurfaceHandle,
        capacity: u32,
        slots: &[GatherSlot],
    ) -> Result<Vec<(u32, Float4)>, Error> {
        let source = self
            .surfaces
            .get(&source)
            .ok_or(Error::UnknownSurface(source))?;
        Ok(slots
            .iter()
            .map(|slot| {
                let row = (slot.depth * capacity as f32).round() as u32;
                (row, source.texture.sample_nearest(slot.position))
            })
            .collect())
    }

    fn count_draws(&mut self, blend: BlendMode, count: usize) {
        let counter = match blend {
            BlendMode::Replace => &mut self.stats.replace_draws,
            BlendMode::Multiply => &mut self.stats.multiply_draws,
            BlendMode::Additive => &mut self.stats.additive_draws,
        };
        *counter += count as u64;
    }
}

impl RenderBackend for SoftwareBackend {
    fn allocate_surface(&mut self, config: SurfaceConfig) -> Result<SurfaceHandle, Error> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::InvalidSurfaceSize {
                width: config.width,
                height: config.height,
            });
        }
        let handle = SurfaceHandle(self.next_handle);
        self.next_handle += 1;
        logwise::debuginternal_sync!(
            "Allocated software surface {name} {width}x{height}",
            name = config.debug_name.clone(),
            width = config.width,
            height = config.height
        );
        self.surfaces.insert(handle, SoftSurface::new(config));
        Ok(handle)
    }

    fn release_surface(&mut self, handle: SurfaceHandle) {
        self.surfaces.remove(&handle);
    }

    fn surface_config(&self, handle: SurfaceHandle) -> Option<&SurfaceConfig> {
        self.surfaces.get(&handle).map(|s| &s.config)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.framebuffer.config.width, self.framebuffer.config.height)
    }

    fn render_fullscreen_quad(&mut self, target: Target, program: &Program) -> Result<(), Error> {
        let kernel = program
            .software_kernel()
            .ok_or_else(|| Error::NoSoftwareKernel(program.name().to_string()))?;
        let config = self.target(target)?.config.clone();
        let sampler = Surfaces(&self.surfaces);
        let resolution = [config.width, config.height];
        let data = Texture::new_with(config.width, config.height, |texel| {
            let uv = config.texel_center(texel.x, texel.y);
            let input = FragmentInput::new(uv, texel, resolution, program, &sampler);
            config.format.quantize(kernel(&input))
        });
        self.target_mut(target)?.texture = data;
        self.stats.fullscreen_draws += 1;
        Ok(())
    }

    fn render_geometry(
        &mut self,
        target: Target,
        batch: &GeometryBatch<'_>,
        blend: BlendMode,
    ) -> Result<(), Error> {
        let gathered = match batch {
            GeometryBatch::Gather {
                source,
                capacity,
                slots,
                ..
            } => Some(self.gathered_values(*source, *capacity, slots)?),
            GeometryBatch::Disturbances { .. } => None,
        };
        let auto_clear = self.auto_clear;
        let surface = self.target_mut(target)?;
        if auto_clear {
            surface.texture.fill(Float4::ZERO);
        }
        match (batch, gathered) {
            (GeometryBatch::Disturbances { pass, events }, _) => {
                Self::draw_disturbances(surface, *pass, events, blend);
            }
            (GeometryBatch::Gather { .. }, Some(values)) => {
                for (row, value) in values {
                    if row < surface.config.height {
                        surface.write(Texel { x: 0, y: row }, blend, value);
                    }
                }
            }
            (GeometryBatch::Gather { .. }, None) => {}
        }
        self.count_draws(blend, batch.len());
        Ok(())
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
        let surface = self.target(target)?;
        let (target_width, target_height) = (surface.config.width, surface.config.height);
        if x.saturating_add(width) > target_width || y.saturating_add(height) > target_height {
            return Err(Error::ReadOutOfBounds {
                x,
                y,
                width,
                height,
                target_width,
                target_height,
            });
        }
        let mut bytes =
            Vec::with_capacity((width * height * format.bytes_per_pixel()) as usize);
        for row in y..y + height {
            for column in x..x + width {
                let pixel = Unorm4::from_floats(surface.texture[Texel { x: column, y: row }]);
                bytes.extend_from_slice(&[pixel.r, pixel.g, pixel.b, pixel.a]);
            }
        }
        self.stats.readbacks += 1;
        self.stats.bytes_read += bytes.len() as u64;
        Ok(bytes)
    }

    fn set_auto_clear(&mut self, auto_clear: bool) {
        self.auto_clear = auto_clear;
    }

    fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }
}
