// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render pipelines: the built-in disturbance and gather programs, and compiled user programs.
use crate::images::backend::{BlendMode, DisturbPass};
use crate::images::program::Program;
use crate::imp::wgpu::Error;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use wgpu::{
    BindGroupLayoutEntry, BindingType, BlendComponent, BlendFactor, BlendOperation, BlendState,
    ColorTargetState, MultisampleState, PipelineLayoutDescriptor, PolygonMode, PrimitiveState,
    PrimitiveTopology, RenderPipelineDescriptor, SamplerBindingType, ShaderStages,
    TextureSampleType, TextureViewDimension, VertexAttribute, VertexBufferLayout, VertexState,
    VertexStepMode,
};

const DISTURB_WGSL: &str = r#"
struct Instance {
    //center in xy, radius in z
    @location(0) shape: vec4<f32>,
    @location(1) value: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) coord: vec2<f32>,
    @location(1) value: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, instance: Instance) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>(-1.0,  1.0)
    );
    let corner = corners[vertex_index];
    let uv = instance.shape.xy + instance.shape.z * corner;
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.coord = corner;
    out.value = instance.value;
    return out;
}

@fragment
fn fs_multiply(in: VertexOutput) -> @location(0) vec4<f32> {
    let r2 = dot(in.coord, in.coord);
    if (r2 > 1.0) {
        discard;
    }
    let alpha = (1.0 - r2) * (1.0 - r2);
    return vec4<f32>(1.0) - alpha * (vec4<f32>(1.0) - in.value);
}

@fragment
fn fs_add(in: VertexOutput) -> @location(0) vec4<f32> {
    let r2 = dot(in.coord, in.coord);
    if (r2 > 1.0) {
        discard;
    }
    let alpha = (1.0 - r2) * (1.0 - r2);
    return alpha * in.value;
}
"#;

const GATHER_WGSL: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) source_uv: vec2<f32>,
};

//slot is (u, v, depth, capacity)
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, @location(0) slot: vec4<f32>) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 1.0)
    );
    let corner = corners[vertex_index];
    let row = round(slot.z * slot.w);
    let v = (row + corner.y) / slot.w;
    var out: VertexOutput;
    out.position = vec4<f32>(corner.x * 2.0 - 1.0, 1.0 - v * 2.0, 0.0, 1.0);
    out.source_uv = slot.xy;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(source));
    let texel = vec2<i32>(floor(fract(in.source_uv) * size));
    return textureLoad(source, texel, 0);
}
"#;

/// Vertices per instanced quad.
pub(super) const QUAD_VERTICES: u32 = 6;

pub(super) fn blend_state(blend: BlendMode) -> Option<BlendState> {
    match blend {
        BlendMode::Replace => None,
        BlendMode::Multiply => {
            let component = BlendComponent {
                src_factor: BlendFactor::Zero,
                dst_factor: BlendFactor::Src,
                operation: BlendOperation::Add,
            };
            Some(BlendState {
                color: component,
                alpha: component,
            })
        }
        BlendMode::Additive => {
            let component = BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Add,
            };
            Some(BlendState {
                color: component,
                alpha: component,
            })
        }
    }
}

const PRIMITIVE_STATE: PrimitiveState = PrimitiveState {
    topology: PrimitiveTopology::TriangleList,
    strip_index_format: None,
    front_face: wgpu::FrontFace::Ccw,
    cull_mode: None,
    unclipped_depth: false,
    polygon_mode: PolygonMode::Fill,
    conservative: false,
};

const MULTISAMPLE_STATE: MultisampleState = MultisampleState {
    count: 1,
    mask: !0,
    alpha_to_coverage_enabled: false,
};

const DISTURB_ATTRIBUTES: [VertexAttribute; 2] = [
    VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 16,
        shader_location: 1,
    },
];

const GATHER_ATTRIBUTES: [VertexAttribute; 1] = [VertexAttribute {
    format: wgpu::VertexFormat::Float32x4,
    offset: 0,
    shader_location: 0,
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BuiltinKey {
    Disturb {
        pass: DisturbPass,
        blend: BlendMode,
        format: wgpu::TextureFormat,
    },
    Gather {
        blend: BlendMode,
        format: wgpu::TextureFormat,
    },
}

/// Identifies a compiled user program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProgramKey {
    program: u64,
    format: wgpu::TextureFormat,
    //per surface parameter, in declaration order
    filterable: Vec<bool>,
}

#[derive(Debug)]
pub(super) struct ProgramPipeline {
    pub(super) pipeline: wgpu::RenderPipeline,
    pub(super) bind_group_layout: wgpu::BindGroupLayout,
}

#[derive(Debug)]
pub(super) struct Pipelines {
    disturb_module: wgpu::ShaderModule,
    gather_module: wgpu::ShaderModule,
    disturb_layout: wgpu::PipelineLayout,
    gather_bind_group_layout: wgpu::BindGroupLayout,
    gather_layout: wgpu::PipelineLayout,
    builtin: HashMap<BuiltinKey, wgpu::RenderPipeline>,
    programs: HashMap<ProgramKey, ProgramPipeline>,
}

/// Runs `f`, returning any validation error it raised instead of letting wgpu panic.
fn validated<R>(device: &wgpu::Device, f: impl FnOnce() -> R) -> Result<R, Error> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let r = f();
    match test_executors::spin_on(device.pop_error_scope()) {
        Some(e) => Err(Error::Validation(e)),
        None => Ok(r),
    }
}

impl Pipelines {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let disturb_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("disturb"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(DISTURB_WGSL)),
        });
        let gather_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gather"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(GATHER_WGSL)),
        });
        let disturb_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("disturb"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let gather_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("gather"),
                entries: &[BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }],
            });
        let gather_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("gather"),
            bind_group_layouts: &[&gather_bind_group_layout],
            push_constant_ranges: &[],
        });
        Pipelines {
            disturb_module,
            gather_module,
            disturb_layout,
            gather_bind_group_layout,
            gather_layout,
            builtin: HashMap::new(),
            programs: HashMap::new(),
        }
    }

    pub(super) fn gather_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.gather_bind_group_layout
    }

    pub(super) fn disturb(
        &mut self,
        device: &wgpu::Device,
        pass: DisturbPass,
        blend: BlendMode,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let key = BuiltinKey::Disturb {
            pass,
            blend,
            format,
        };
        let module = &self.disturb_module;
        let layout = &self.disturb_layout;
        self.builtin.entry(key).or_insert_with(|| {
            let fragment_entry = match pass {
                DisturbPass::Multiply => "fs_multiply",
                DisturbPass::Add => "fs_add",
            };
            build_builtin(
                device,
                fragment_entry,
                module,
                layout,
                VertexBufferLayout {
                    array_stride: 32,
                    step_mode: VertexStepMode::Instance,
                    attributes: &DISTURB_ATTRIBUTES,
                },
                blend,
                format,
            )
        })
    }

    pub(super) fn gather(
        &mut self,
        device: &wgpu::Device,
        blend: BlendMode,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let module = &self.gather_module;
        let layout = &self.gather_layout;
        self.builtin
            .entry(BuiltinKey::Gather { blend, format })
            .or_insert_with(|| {
                build_builtin(
                    device,
                    "fs_main",
                    module,
                    layout,
                    VertexBufferLayout {
                        array_stride: 16,
                        step_mode: VertexStepMode::Instance,
                        attributes: &GATHER_ATTRIBUTES,
                    },
                    blend,
                    format,
                )
            })
    }

    /// The pipeline for `program` rendering into `format`, compiling it on first use.
    pub(super) fn program(
        &mut self,
        device: &wgpu::Device,
        program: &Program,
        format: wgpu::TextureFormat,
        filterable: Vec<bool>,
    ) -> Result<&ProgramPipeline, Error> {
        let key = ProgramKey {
            program: program.id(),
            format,
            filterable,
        };
        match self.programs.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let compiled = compile_program(device, program, format, &entry.key().filterable)?;
                logwise::debuginternal_sync!(
                    "Compiled program {name}",
                    name = program.name().to_string()
                );
                Ok(entry.insert(compiled))
            }
        }
    }
}

fn build_builtin(
    device: &wgpu::Device,
    fragment_entry: &str,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    vertex_buffer: VertexBufferLayout<'_>,
    blend: BlendMode,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_buffer],
        },
        primitive: PRIMITIVE_STATE,
        depth_stencil: None,
        multisample: MULTISAMPLE_STATE,
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(ColorTargetState {
                format,
                blend: blend_state(blend),
                write_mask: Default::default(),
            })],
        }),
        multiview: None,
        cache: None,
    })
}

fn compile_program(
    device: &wgpu::Device,
    program: &Program,
    format: wgpu::TextureFormat,
    filterable: &[bool],
) -> Result<ProgramPipeline, Error> {
    let mut entries = vec![BindGroupLayoutEntry {
        binding: 0,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];
    for (n, filterable) in filterable.iter().enumerate() {
        let n = n as u32;
        entries.push(BindGroupLayoutEntry {
            binding: 1 + 2 * n,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float {
                    filterable: *filterable,
                },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(BindGroupLayoutEntry {
            binding: 2 + 2 * n,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(if *filterable {
                SamplerBindingType::Filtering
            } else {
                SamplerBindingType::NonFiltering
            }),
            count: None,
        });
    }
    validated(device, || {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(program.name()),
            entries: &entries,
        });
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(program.name()),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let source = program.wgsl_source();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.fragment_shader().label()),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(program.name()),
            layout: Some(&layout),
            vertex: VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: PRIMITIVE_STATE,
            depth_stencil: None,
            multisample: MULTISAMPLE_STATE,
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: None,
                    write_mask: Default::default(),
                })],
            }),
            multiview: None,
            cache: None,
        });
        ProgramPipeline {
            pipeline,
            bind_group_layout,
        }
    })
}
