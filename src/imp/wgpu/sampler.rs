// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bindings::surface::FilterMode;
use wgpu::{AddressMode, SamplerDescriptor};

/// Repeat-wrapping samplers, one per filter mode.
#[derive(Debug)]
pub(super) struct Samplers {
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
}

fn make_sampler(device: &wgpu::Device, filter: FilterMode) -> wgpu::Sampler {
    let (label, filter) = match filter {
        FilterMode::Nearest => ("nearest sampler", wgpu::FilterMode::Nearest),
        FilterMode::Linear => ("linear sampler", wgpu::FilterMode::Linear),
    };
    let s = SamplerDescriptor {
        label: Some(label),
        address_mode_u: AddressMode::Repeat,
        address_mode_v: AddressMode::Repeat,
        address_mode_w: AddressMode::Repeat,
        mag_filter: filter,
        min_filter: filter,
        //surfaces have a single mip level
        mipmap_filter: wgpu::FilterMode::Nearest,
        lod_min_clamp: 0.0,
        lod_max_clamp: 0.0,
        compare: None,
        anisotropy_clamp: 1,
        border_color: None,
    };
    device.create_sampler(&s)
}

impl Samplers {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        Samplers {
            nearest: make_sampler(device, FilterMode::Nearest),
            linear: make_sampler(device, FilterMode::Linear),
        }
    }

    pub(super) fn get(&self, filter: FilterMode) -> &wgpu::Sampler {
        match filter {
            FilterMode::Nearest => &self.nearest,
            FilterMode::Linear => &self.linear,
        }
    }
}
