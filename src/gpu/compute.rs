//! Compiled programs of the wgpu backend.
//!
//! Three pipelines share the rgba32float image format:
//! - `box_trace`: compute, one noisy sample per pixel
//! - `temporal`: compute, running-mean blend of new sample over history
//! - `blit`: fullscreen triangle to the presentation view

/// WGSL sources embedded at compile time.
const BOX_TRACE_WGSL: &str = include_str!("box_trace.wgsl");
const TEMPORAL_WGSL: &str = include_str!("temporal.wgsl");
const BLIT_WGSL: &str = include_str!("blit.wgsl");

/// Workgroup size (must match @workgroup_size in WGSL).
pub const WG_SIZE: u32 = 8;

/// Image format of every traced, copied and blended image.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Resolve uniform matching the WGSL `Resolve` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ResolveUniform {
    pub frame: u32,
    pub weight: f32,
    pub _pad: [u32; 2],
}

pub struct Programs {
    pub trace_pipeline: wgpu::ComputePipeline,
    pub trace_layout: wgpu::BindGroupLayout,
    pub resolve_pipeline: wgpu::ComputePipeline,
    pub resolve_layout: wgpu::BindGroupLayout,
    pub blit_pipeline: wgpu::RenderPipeline,
    pub blit_layout: wgpu::BindGroupLayout,
}

fn storage_buffer_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn sampled_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            // rgba32float is not filterable without an extra feature; shaders use textureLoad
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: IMAGE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

impl Programs {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let trace_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("box_trace_bgl"),
            entries: &[
                // @binding(0) boxes
                storage_buffer_entry(0),
                // @binding(1) camera
                uniform_entry(1),
                // @binding(2) output image
                storage_texture_entry(2),
            ],
        });
        let trace_pipeline = compute_pipeline(device, "box_trace", BOX_TRACE_WGSL, &trace_layout);

        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("temporal_bgl"),
            entries: &[
                sampled_entry(0, wgpu::ShaderStages::COMPUTE),
                sampled_entry(1, wgpu::ShaderStages::COMPUTE),
                storage_texture_entry(2),
                uniform_entry(3),
            ],
        });
        let resolve_pipeline = compute_pipeline(device, "temporal", TEMPORAL_WGSL, &resolve_layout);

        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit_shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_WGSL.into()),
        });
        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bgl"),
            entries: &[sampled_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });
        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pl"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });
        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit_pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            trace_pipeline,
            trace_layout,
            resolve_pipeline,
            resolve_layout,
            blit_pipeline,
            blit_layout,
        }
    }
}

/// Workgroups needed to cover `width` x `height`.
#[inline]
pub fn workgroups(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(WG_SIZE), height.div_ceil(WG_SIZE))
}

/// Record one compute dispatch over an image.
pub fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    width: u32,
    height: u32,
) {
    let (wg_x, wg_y) = workgroups(width, height);
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(wg_x, wg_y, 1);
}
