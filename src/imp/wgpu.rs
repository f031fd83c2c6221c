// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A headless wgpu implementation of [`RenderBackend`].

Each call encodes its passes and submits them straight away; wgpu keeps them in order.  Only
[`RenderBackend::read_pixels`] waits for the device.
*/
mod error;
mod pipelines;
mod pixel_format;
mod readback;
mod sampler;
mod texture;

pub(crate) use error::Error;

use crate::bindings::surface::{FilterMode, SurfaceConfig, SurfaceHandle, Target};
use crate::images::backend::{
    BackendStats, BlendMode, DisturbPass, GeometryBatch, RenderBackend,
};
use crate::images::program::Program;
use crate::pixel_formats::{Float4, ReadFormat, SurfaceFormat, pixel_as_bytes};
use pipelines::{Pipelines, QUAD_VERTICES};
use sampler::Samplers;
use std::collections::HashMap;
use texture::GpuSurface;
use wgpu::util::DeviceExt;
use wgpu::{Features, Limits, Trace};

const TRANSPARENT: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 0.0,
};

fn target_surface<'a>(
    surfaces: &'a HashMap<SurfaceHandle, GpuSurface>,
    framebuffer: &'a GpuSurface,
    target: Target,
) -> Result<&'a GpuSurface, crate::Error> {
    match target {
        Target::Framebuffer => Ok(framebuffer),
        Target::Surface(handle) => surfaces
            .get(&handle)
            .ok_or(crate::Error::UnknownSurface(handle)),
    }
}

/// Encodes one render pass into `view` and submits it.
fn encode_pass(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    label: &str,
    draw: impl FnOnce(&mut wgpu::RenderPass<'_>),
) {
    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        draw(&mut render_pass);
    }
    queue.submit(std::iter::once(encoder.finish()));
}

/**
Renders on a GPU through wgpu.

The default framebuffer is an offscreen `Rgba8Unorm` texture; nothing is presented.

```no_run
use wavefield::WgpuBackend;
use wavefield::bindings::surface::SurfaceConfig;
use wavefield::images::backend::RenderBackend;

let mut backend = WgpuBackend::new_blocking(256, 256).unwrap();
let wave = backend.allocate_surface(SurfaceConfig::new(128, 128)).unwrap();
```
*/
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: Features,
    samplers: Samplers,
    pipelines: Pipelines,
    surfaces: HashMap<SurfaceHandle, GpuSurface>,
    framebuffer: GpuSurface,
    next_handle: u32,
    auto_clear: bool,
    stats: BackendStats,
}

impl WgpuBackend {
    /// Picks an adapter and creates a device, with a `width × height` offscreen framebuffer.
    pub async fn new(width: u32, height: u32) -> Result<Self, crate::Error> {
        let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        let instance = wgpu::Instance::new(&descriptor);
        let options = wgpu::RequestAdapterOptions {
            power_preference: Default::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        };
        let adapter = instance
            .request_adapter(&options)
            .await
            .map_err(Error::from)?;
        let features =
            adapter.features() & (Features::FLOAT32_BLENDABLE | Features::FLOAT32_FILTERABLE);
        let mut limits = Limits::downlevel_webgl2_defaults();
        limits.max_texture_dimension_1d = 4096;
        limits.max_texture_dimension_2d = 4096;
        let descriptor = wgpu::DeviceDescriptor {
            label: Some("wavefield"),
            required_features: features,
            required_limits: limits,
            memory_hints: Default::default(),
            trace: Trace::Off,
        };
        let (device, queue) = adapter
            .request_device(&descriptor)
            .await
            .map_err(Error::from)?;
        if !features.contains(Features::FLOAT32_BLENDABLE) {
            logwise::warn_sync!("Device can't blend into Rgba32Float surfaces");
        }
        logwise::info_sync!(
            "Created wgpu backend on {adapter}",
            adapter = adapter.get_info().name
        );
        let framebuffer = GpuSurface::new(
            &device,
            SurfaceConfig::new(width, height)
                .with_filter(FilterMode::Nearest)
                .with_format(SurfaceFormat::Rgba8Unorm)
                .with_debug_name("framebuffer"),
        );
        Ok(WgpuBackend {
            samplers: Samplers::new(&device),
            pipelines: Pipelines::new(&device),
            device,
            queue,
            features,
            surfaces: HashMap::new(),
            framebuffer,
            next_handle: 0,
            auto_clear: true,
            stats: BackendStats::default(),
        })
    }

    /// [`Self::new`] for hosts without an executor.
    pub fn new_blocking(width: u32, height: u32) -> Result<Self, crate::Error> {
        test_executors::spin_on(Self::new(width, height))
    }

    /// Whether `Rgba32Float` surfaces can be blended into on this device.
    pub fn float32_blendable(&self) -> bool {
        SurfaceFormat::Rgba32Float.blendable(self.features)
    }
}

impl RenderBackend for WgpuBackend {
    fn allocate_surface(&mut self, config: SurfaceConfig) -> Result<SurfaceHandle, crate::Error> {
        if config.width == 0 || config.height == 0 {
            return Err(crate::Error::InvalidSurfaceSize {
                width: config.width,
                height: config.height,
            });
        }
        let handle = SurfaceHandle(self.next_handle);
        self.next_handle += 1;
        logwise::debuginternal_sync!(
            "Allocated surface {name} {width}x{height}",
            name = config.debug_name.clone(),
            width = config.width,
            height = config.height
        );
        self.surfaces
            .insert(handle, GpuSurface::new(&self.device, config));
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

    fn render_fullscreen_quad(
        &mut self,
        target: Target,
        program: &Program,
    ) -> Result<(), crate::Error> {
        let destination = target_surface(&self.surfaces, &self.framebuffer, target)?;
        let resolution = [destination.config.width, destination.config.height];
        let format = destination.format();

        let mut sources = Vec::new();
        for (name, handle) in program.surface_bindings() {
            let handle = handle.ok_or_else(|| crate::Error::UnboundParameter {
                program: program.name().to_string(),
                parameter: name.to_string(),
            })?;
            let surface = self
                .surfaces
                .get(&handle)
                .ok_or(crate::Error::UnknownSurface(handle))?;
            let filterable = surface.config.format.filterable(self.features);
            if !filterable && surface.config.filter == FilterMode::Linear {
                logwise::warn_sync!(
                    "Sampling {name} with nearest filtering, the device can't filter its format",
                    name = name.to_string()
                );
            }
            sources.push((surface, filterable));
        }
        let filterable = sources.iter().map(|(_, f)| *f).collect();
        let compiled = self
            .pipelines
            .program(&self.device, program, format, filterable)?;

        let lanes: Vec<Float4> = program
            .uniform_lanes(resolution)
            .into_iter()
            .map(Float4::from)
            .collect();
        let uniforms = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(program.name()),
                contents: pixel_as_bytes(&lanes),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniforms.as_entire_binding(),
        }];
        for (n, (surface, filterable)) in sources.iter().enumerate() {
            let n = n as u32;
            let filter = if *filterable {
                surface.config.filter
            } else {
                FilterMode::Nearest
            };
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + 2 * n,
                resource: wgpu::BindingResource::TextureView(&surface.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + 2 * n,
                resource: wgpu::BindingResource::Sampler(self.samplers.get(filter)),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.name()),
            layout: &compiled.bind_group_layout,
            entries: &entries,
        });
        encode_pass(
            &self.device,
            &self.queue,
            &destination.view,
            wgpu::LoadOp::Clear(TRANSPARENT),
            program.name(),
            |render_pass| {
                render_pass.set_pipeline(&compiled.pipeline);
                render_pass.set_bind_group(0, &bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            },
        );
        self.stats.fullscreen_draws += 1;
        Ok(())
    }

    fn render_geometry(
        &mut self,
        target: Target,
        batch: &GeometryBatch<'_>,
        blend: BlendMode,
    ) -> Result<(), crate::Error> {
        let destination = target_surface(&self.surfaces, &self.framebuffer, target)?;
        if blend != BlendMode::Replace && !destination.config.format.blendable(self.features) {
            return Err(crate::Error::NotBlendable(destination.config.format));
        }
        let format = destination.format();
        let load = if self.auto_clear {
            wgpu::LoadOp::Clear(TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };

        match batch {
            GeometryBatch::Disturbances { pass, events } => {
                let pipeline = self.pipelines.disturb(&self.device, *pass, blend, format);
                let instances: Vec<Float4> = events
                    .iter()
                    .flat_map(|e| {
                        [
                            Float4::new(e.position[0], e.position[1], e.radius, 0.0),
                            match pass {
                                DisturbPass::Multiply => e.multiplier,
                                DisturbPass::Add => e.additive,
                            },
                        ]
                    })
                    .collect();
                let vertex_buffer = (!instances.is_empty()).then(|| {
                    self.device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("disturbances"),
                            contents: pixel_as_bytes(&instances),
                            usage: wgpu::BufferUsages::VERTEX,
                        })
                });
                let count = events.len() as u32;
                encode_pass(
                    &self.device,
                    &self.queue,
                    &destination.view,
                    load,
                    "disturb",
                    |render_pass| {
                        if let Some(vertex_buffer) = &vertex_buffer {
                            render_pass.set_pipeline(pipeline);
                            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                            //one draw per event
                            for instance in 0..count {
                                render_pass.draw(0..QUAD_VERTICES, instance..instance + 1);
                            }
                        }
                    },
                );
            }
            GeometryBatch::Gather {
                source,
                capacity,
                slots,
                ..
            } => {
                let source_surface = self
                    .surfaces
                    .get(source)
                    .ok_or(crate::Error::UnknownSurface(*source))?;
                let instances: Vec<Float4> = slots
                    .iter()
                    .map(|s| Float4::new(s.position[0], s.position[1], s.depth, *capacity as f32))
                    .collect();
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("gather"),
                    layout: self.pipelines.gather_bind_group_layout(),
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source_surface.view),
                    }],
                });
                let vertex_buffer = (!instances.is_empty()).then(|| {
                    self.device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("gather slots"),
                            contents: pixel_as_bytes(&instances),
                            usage: wgpu::BufferUsages::VERTEX,
                        })
                });
                let pipeline = self.pipelines.gather(&self.device, blend, format);
                let count = instances.len() as u32;
                encode_pass(
                    &self.device,
                    &self.queue,
                    &destination.view,
                    load,
                    "gather",
                    |render_pass| {
                        if let Some(vertex_buffer) = &vertex_buffer {
                            render_pass.set_pipeline(pipeline);
                            render_pass.set_bind_group(0, &bind_group, &[]);
                            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                            render_pass.draw(0..QUAD_VERTICES, 0..count);
                        }
                    },
                );
            }
        }
        let counter = match blend {
            BlendMode::Replace => &mut self.stats.replace_draws,
            BlendMode::Multiply => &mut self.stats.multiply_draws,
            BlendMode::Additive => &mut self.stats.additive_draws,
        };
        *counter += batch.len() as u64;
        Ok(())
    }

    fn read_pixels(
        &mut self,
        target: Target,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        _format: ReadFormat,
    ) -> Result<Vec<u8>, crate::Error> {
        let surface = target_surface(&self.surfaces, &self.framebuffer, target)?;
        let (target_width, target_height) = (surface.config.width, surface.config.height);
        if x.saturating_add(width) > target_width || y.saturating_add(height) > target_height {
            return Err(crate::Error::ReadOutOfBounds {
                x,
                y,
                width,
                height,
                target_width,
                target_height,
            });
        }
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        let pixels = readback::read_rgba8(&self.device, &self.queue, surface, x, y, width, height)
            .inspect_err(|e| {
                logwise::error_sync!(
                    "Readback failed: {err}",
                    err = logwise::privacy::LogIt(e)
                );
            })?;
        self.stats.readbacks += 1;
        self.stats.bytes_read += pixels.len() as u64;
        Ok(pixels)
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
