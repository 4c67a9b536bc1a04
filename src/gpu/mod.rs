//! wgpu compute device.
//!
//! Runs the box tracer and the temporal resolve as compute shaders on an
//! existing wgpu device, and blits results to a caller-provided view. Every
//! operation submits its own command buffer, so from the pipeline's side each
//! call has completed (in queue order) when it returns.
//!
//! ## Usage
//! ```ignore
//! let device = GpuDevice::new(device.clone(), queue.clone(), surface_format);
//! let mut pipeline = FramePipeline::new(device)?;
//! // per frame
//! let mut target = GpuTarget::new(surface_view, Extent::new(w, h));
//! pipeline.render_frame(&mut state, &settings, &camera, &scene, &mut target)?;
//! ```

mod compute;

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use crate::camera::GpuCameraUniform;
use crate::device::{RenderDevice, TraceParams};
use crate::resolve::blend_weight;
use crate::scene::{GpuBox, SceneSnapshot};
use crate::util::{Error, Extent, Result};

use compute::{Programs, ResolveUniform, IMAGE_FORMAT};

/// rgba32float texture usable as storage, sampled and copy operand.
pub struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent,
}

impl GpuImage {
    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Presentation view for one frame, typically the current surface texture.
pub struct GpuTarget {
    view: wgpu::TextureView,
    extent: Extent,
}

impl GpuTarget {
    pub fn new(view: wgpu::TextureView, extent: Extent) -> Self {
        Self { view, extent }
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    programs: Programs,
    camera_buffer: wgpu::Buffer,
    resolve_buffer: wgpu::Buffer,
    box_buffer: wgpu::Buffer,
    box_capacity: usize,
    /// Validation error raised while building the shader programs.
    program_error: Option<String>,
}

impl GpuDevice {
    /// `surface_format` is the format of the views passed as targets.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, surface_format: wgpu::TextureFormat) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let programs = Programs::new(&device, surface_format);
        let program_error = pollster::block_on(device.pop_error_scope()).map(|e| e.to_string());
        if let Some(e) = &program_error {
            tracing::error!("GPU tracer programs failed validation: {e}");
        }

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("box_trace_camera"),
            size: std::mem::size_of::<GpuCameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("temporal_params"),
            size: std::mem::size_of::<ResolveUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // wgpu rejects zero-sized bindings; start with one empty record
        let box_buffer = Self::create_box_buffer(&device, &[GpuBox::zeroed()]);

        Self {
            device,
            queue,
            programs,
            camera_buffer,
            resolve_buffer,
            box_buffer,
            box_capacity: 1,
            program_error,
        }
    }

    fn create_box_buffer(device: &wgpu::Device, boxes: &[GpuBox]) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("box_trace_boxes"),
            contents: bytemuck::cast_slice(boxes),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn check_extent(a: Extent, b: Extent, op: &str) -> Result<()> {
    if a != b {
        return Err(Error::Device(format!("{op}: extent mismatch {a} vs {b}")));
    }
    Ok(())
}

fn programs_ready(program_error: Option<&str>) -> Result<()> {
    match program_error {
        Some(e) => Err(Error::ProgramUnavailable(format!("shader programs invalid: {e}"))),
        None => Ok(()),
    }
}

fn extent3d(extent: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    }
}

impl RenderDevice for GpuDevice {
    type Image = GpuImage;
    type Target = GpuTarget;

    fn prepare(&mut self) -> Result<()> {
        programs_ready(self.program_error.as_deref())?;
        let limits = self.device.limits();
        if limits.max_storage_textures_per_shader_stage < 1 {
            return Err(Error::ProgramUnavailable("device has no storage textures".into()));
        }
        if limits.max_storage_buffers_per_shader_stage < 1 {
            return Err(Error::ProgramUnavailable("device has no storage buffers".into()));
        }
        if limits.max_compute_invocations_per_workgroup < compute::WG_SIZE * compute::WG_SIZE {
            return Err(Error::ProgramUnavailable(format!(
                "compute workgroups of {0}x{0} not supported",
                compute::WG_SIZE
            )));
        }
        tracing::info!("GPU tracer ready");
        Ok(())
    }

    fn target_extent(&self, target: &GpuTarget) -> Extent {
        target.extent
    }

    fn create_image(&mut self, extent: Extent, label: &str) -> GpuImage {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent3d(extent),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuImage { texture, view, extent }
    }

    fn copy_image(&mut self, src: &GpuImage, dst: &mut GpuImage) -> Result<()> {
        check_extent(src.extent, dst.extent, "copy")?;
        let mut encoder = self.encoder("copy_image");
        encoder.copy_texture_to_texture(
            src.texture.as_image_copy(),
            dst.texture.as_image_copy(),
            extent3d(src.extent),
        );
        self.submit(encoder);
        Ok(())
    }

    fn upload_scene(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
        let boxes = snapshot.boxes();
        if boxes.is_empty() {
            return Ok(());
        }
        if boxes.len() > self.box_capacity {
            self.box_capacity = boxes.len().next_power_of_two();
            let mut grown = vec![GpuBox::zeroed(); self.box_capacity];
            grown[..boxes.len()].copy_from_slice(boxes);
            self.box_buffer = Self::create_box_buffer(&self.device, &grown);
            tracing::debug!("Box buffer grown to {} records", self.box_capacity);
        } else {
            self.queue.write_buffer(&self.box_buffer, 0, snapshot.as_bytes());
        }
        Ok(())
    }

    fn trace(&mut self, params: &TraceParams, output: &mut GpuImage) -> Result<()> {
        if output.extent.is_empty() {
            return Err(Error::Device("trace into empty image".into()));
        }
        let uniform = GpuCameraUniform::new(
            &params.camera,
            params.frame,
            params.max_bounce_count,
            params.rays_per_pixel,
            params.box_count,
        );
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("box_trace_bg"),
            layout: &self.programs.trace_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.box_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
            ],
        });

        let mut encoder = self.encoder("box_trace");
        compute::dispatch(
            &mut encoder,
            "box_trace_pass",
            &self.programs.trace_pipeline,
            &bind_group,
            output.extent.width,
            output.extent.height,
        );
        self.submit(encoder);
        Ok(())
    }

    fn blend(&mut self, new_frame: &GpuImage, history: &GpuImage, frame: u32, output: &mut GpuImage) -> Result<()> {
        check_extent(new_frame.extent, output.extent, "blend")?;
        check_extent(history.extent, output.extent, "blend")?;
        let uniform = ResolveUniform {
            frame,
            weight: blend_weight(frame),
            _pad: [0; 2],
        };
        self.queue.write_buffer(&self.resolve_buffer, 0, bytemuck::bytes_of(&uniform));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("temporal_bg"),
            layout: &self.programs.resolve_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&new_frame.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&history.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.resolve_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.encoder("temporal");
        compute::dispatch(
            &mut encoder,
            "temporal_pass",
            &self.programs.resolve_pipeline,
            &bind_group,
            output.extent.width,
            output.extent.height,
        );
        self.submit(encoder);
        Ok(())
    }

    fn present(&mut self, image: &GpuImage, target: &mut GpuTarget) -> Result<()> {
        check_extent(image.extent, target.extent, "present")?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bg"),
            layout: &self.programs.blit_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&image.view),
            }],
        });

        let mut encoder = self.encoder("blit");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.programs.blit_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1); // fullscreen triangle
        }
        self.submit(encoder);
        Ok(())
    }
}
