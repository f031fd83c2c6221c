// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bindings::surface::SurfaceConfig;
use wgpu::Extent3d;

/// A surface resident on the device.
#[derive(Debug)]
pub(super) struct GpuSurface {
    pub(super) config: SurfaceConfig,
    pub(super) texture: wgpu::Texture,
    pub(super) view: wgpu::TextureView,
}

impl GpuSurface {
    /// Creates the texture.  wgpu zero-initializes it.
    pub(super) fn new(device: &wgpu::Device, config: SurfaceConfig) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&config.debug_name),
            size: Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.format.wgpu_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuSurface {
            config,
            texture,
            view,
        }
    }

    pub(super) fn format(&self) -> wgpu::TextureFormat {
        self.config.format.wgpu_format()
    }
}
