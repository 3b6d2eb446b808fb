use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec4};
use log::{debug, info, trace, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::{Window, WindowId};

use crate::camera::CameraMatrices;
use crate::environment::EnvironmentMap;
use crate::error::LabError;
use crate::material::ParamValue;
use crate::mesh::Mesh;

use super::device::{
    GraphicsDevice, MeshHandle, ProgramHandle, RenderFlags, ShaderSource, UniformDecl,
    UniformLocation,
};
use super::overlay::{Overlay, SliderDescriptor};
use super::shaders;

/// wgpu implementation of [`GraphicsDevice`] drawing into a winit window.
///
/// Uniform writes land in a per-program staging block that is copied into a
/// fresh buffer at every draw, so each draw sees exactly the values written
/// before it. Pipelines are built lazily per program and [`RenderFlags`].
pub struct NativeDevice {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    object_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    environment_layout: wgpu::BindGroupLayout,
    environment: EnvironmentTexture,
    programs: Vec<GpuProgram>,
    meshes: Vec<MeshBuffers>,
    flags: RenderFlags,
    frame: Option<PendingFrame>,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl NativeDevice {
    /// Initializes the GPU for the provided window.
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("shading-lab-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no texture formats")?;
        let present_mode = choose_present_mode(&surface_caps.present_modes, vsync);
        debug!("surface format {surface_format:?}, present mode {present_mode:?}");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let global_layout = uniform_layout(&device, "global-bind-layout");
        let object_layout = uniform_layout(&device, "object-bind-layout");
        let material_layout = uniform_layout(&device, "material-bind-layout");
        let environment_layout = environment_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shading-lab-pipeline-layout"),
            bind_group_layouts: &[
                &global_layout,
                &object_layout,
                &material_layout,
                &environment_layout,
            ],
            push_constant_ranges: &[],
        });
        // Placeholder until a panorama is set; shaders fall back to the procedural sky.
        let environment = EnvironmentTexture::create(
            &device,
            &queue,
            &environment_layout,
            "environment-placeholder",
            1,
            1,
            &[255; 4],
            false,
        );

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let egui_ctx = egui::Context::default();
        egui_ctx.set_visuals(egui::Visuals::light());
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &*window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(
            &device,
            config.format,
            egui_wgpu::RendererOptions::default(),
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            object_layout,
            material_layout,
            pipeline_layout,
            global_buffer,
            global_bind_group,
            environment_layout,
            environment,
            programs: Vec::new(),
            meshes: Vec::new(),
            flags: RenderFlags::default(),
            frame: None,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// An overlay drawing into this device's GUI pass.
    pub fn overlay(&self) -> EguiOverlay {
        EguiOverlay {
            ctx: self.egui_ctx.clone(),
        }
    }

    /// Feeds a window event to the GUI; returns true when the GUI consumed it.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.egui_state
            .on_window_event(&self.window, event)
            .consumed
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Reconfigures once on a lost or outdated surface before giving up.
    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, LabError> {
        match self.surface.get_current_texture() {
            Ok(output) => Ok(output),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(|err| LabError::SurfaceAcquisition(err.to_string()))
            }
            Err(err) => Err(LabError::SurfaceAcquisition(err.to_string())),
        }
    }

    fn ensure_pipeline(&mut self, program: usize, flags: RenderFlags) {
        let format = self.config.format;
        let entry = &mut self.programs[program];
        if entry.pipelines.contains_key(&flags) {
            return;
        }
        debug!("building {} pipeline for {:?}", entry.label, flags);
        let pipeline = build_pipeline(
            &self.device,
            &self.pipeline_layout,
            &entry.module,
            format,
            flags,
            entry.label,
        );
        entry.pipelines.insert(flags, pipeline);
    }
}

impl GraphicsDevice for NativeDevice {
    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, LabError> {
        let wgsl = shaders::assemble(source);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(LabError::ProgramCompilation {
                label: source.label.to_string(),
                reason: err.to_string(),
            });
        }
        let handle = ProgramHandle::new(self.programs.len() as u32);
        self.programs.push(GpuProgram {
            label: source.label,
            uniforms: source.uniforms,
            module,
            staging: vec![[0.0; 4]; source.uniforms.len()],
            pipelines: HashMap::new(),
        });
        info!("compiled program {}", source.label);
        Ok(handle)
    }

    fn resolve_uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let entry = self.programs.get(program.index())?;
        let slot = entry.uniforms.iter().position(|decl| decl.name == name)?;
        Some(UniformLocation {
            program,
            slot: slot as u32,
        })
    }

    fn write_uniform(&mut self, location: UniformLocation, value: ParamValue) {
        let Some(entry) = self.programs.get_mut(location.program.index()) else {
            return;
        };
        if let Some(slot) = entry.staging.get_mut(location.slot as usize) {
            *slot = value.to_slot();
        }
    }

    fn upload_mesh(&mut self, label: &str, mesh: &Mesh) -> Result<MeshHandle, LabError> {
        if mesh.indices.is_empty() {
            return Err(LabError::MeshUpload {
                label: label.to_string(),
                reason: "mesh has no triangles".into(),
            });
        }
        let handle = MeshHandle::new(self.meshes.len() as u32);
        self.meshes
            .push(MeshBuffers::from_mesh(&self.device, mesh, label));
        debug!("uploaded {label}: {} triangles", mesh.triangle_count());
        Ok(handle)
    }

    fn set_environment(&mut self, map: &EnvironmentMap) -> Result<(), LabError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if map.width > limit || map.height > limit {
            return Err(LabError::EnvironmentLoad {
                label: map.label.clone(),
                reason: format!(
                    "{}x{} exceeds the device limit of {limit}",
                    map.width, map.height
                ),
            });
        }
        self.environment = EnvironmentTexture::create(
            &self.device,
            &self.queue,
            &self.environment_layout,
            &map.label,
            map.width,
            map.height,
            &map.pixels,
            true,
        );
        info!("uploaded environment {} ({}x{})", map.label, map.width, map.height);
        Ok(())
    }

    fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    fn begin_frame(&mut self) -> Result<(), LabError> {
        if self.frame.is_some() {
            warn!("previous frame was never finished, discarding it");
            self.abort_frame();
        }
        let output = self.acquire()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let raw_input = self.egui_state.take_egui_input(&self.window);
        self.egui_ctx.begin_pass(raw_input);
        self.frame = Some(PendingFrame {
            output,
            view,
            clear: wgpu::Color::BLACK,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn clear(&mut self, color: Vec4) {
        if let Some(frame) = self.frame.as_mut() {
            frame.clear = wgpu::Color {
                r: color.x as f64,
                g: color.y as f64,
                b: color.z as f64,
                a: color.w as f64,
            };
        }
    }

    fn set_camera(&mut self, camera: &CameraMatrices) {
        let uniform = GlobalUniform {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            environment: [if self.environment.loaded { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn set_cull_enabled(&mut self, enabled: bool) {
        self.flags.cull = enabled;
    }

    fn set_depth_write_enabled(&mut self, enabled: bool) {
        self.flags.depth_write = enabled;
    }

    fn draw(
        &mut self,
        mesh: MeshHandle,
        transform: Mat4,
        program: ProgramHandle,
        tint: Vec4,
    ) -> Result<(), LabError> {
        if self.frame.is_none() {
            return Err(LabError::Draw("draw outside of a frame".into()));
        }
        if mesh.index() >= self.meshes.len() {
            return Err(LabError::Draw(format!("unknown mesh {}", mesh.index())));
        }
        if program.index() >= self.programs.len() {
            return Err(LabError::Draw(format!("unknown program {}", program.index())));
        }
        let flags = self.flags;
        self.ensure_pipeline(program.index(), flags);

        let constants = ObjectConstants {
            model: transform.to_cols_array_2d(),
            normal: mat3_to_3x4(Mat3::from_mat4(transform).inverse().transpose()),
            tint: tint.into(),
        };
        let object_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("object-uniform"),
                contents: bytes_of(&constants),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let object_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
        });

        let entry = &self.programs[program.index()];
        let material_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("material-uniform"),
                contents: bytemuck::cast_slice(&material_bytes(&entry.staging)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let material_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material-bind-group"),
            layout: &self.material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buffer.as_entire_binding(),
            }],
        });
        trace!("draw {} with {:?}", entry.label, flags);

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(DrawCommand {
                mesh: mesh.index(),
                program: program.index(),
                flags,
                object_group,
                material_group,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), LabError> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| LabError::Draw("end_frame without begin_frame".into()))?;

        let full_output = self.egui_ctx.end_pass();
        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("shading-lab-encoder"),
            });
        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }
        let gui_commands = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen,
        );

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            pass.set_bind_group(3, &self.environment.bind_group, &[]);

            for draw in &frame.draws {
                let pipeline = self.programs[draw.program]
                    .pipelines
                    .get(&draw.flags)
                    .ok_or_else(|| LabError::Draw("pipeline missing for draw".into()))?;
                let mesh = &self.meshes[draw.mesh];
                pass.set_pipeline(pipeline);
                pass.set_bind_group(1, &draw.object_group, &[]);
                pass.set_bind_group(2, &draw.material_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("overlay-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.egui_renderer.render(&mut pass, &paint_jobs, &screen);
        }
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(
            gui_commands
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
        self.window.pre_present_notify();
        frame.output.present();
        Ok(())
    }

    fn abort_frame(&mut self) {
        if self.frame.take().is_some() {
            // The surface texture is dropped unpresented; the GUI pass still has to end.
            let _ = self.egui_ctx.end_pass();
        }
    }
}

/// Draws overlay widgets into the GUI pass of a [`NativeDevice`].
pub struct EguiOverlay {
    ctx: egui::Context,
}

impl Overlay for EguiOverlay {
    fn text(&mut self, text: &str, position: Vec2, size: f32) {
        let id = egui::Id::new(("overlay-text", text, position.x as i32, position.y as i32));
        egui::Area::new(id)
            .fixed_pos(egui::pos2(position.x, position.y))
            .interactable(false)
            .show(&self.ctx, |ui| {
                ui.label(
                    egui::RichText::new(text)
                        .size(size)
                        .color(egui::Color32::DARK_GRAY),
                );
            });
    }

    fn slider(&mut self, slider: &SliderDescriptor<'_>) -> f32 {
        let mut value = slider.value;
        egui::Area::new(egui::Id::new(("overlay-slider", slider.id)))
            .fixed_pos(egui::pos2(slider.bounds.x, slider.bounds.y))
            .show(&self.ctx, |ui| {
                ui.spacing_mut().slider_width = slider.bounds.width;
                ui.spacing_mut().interact_size.y = slider.bounds.height;
                ui.add(
                    egui::Slider::new(&mut value, slider.min..=slider.max)
                        .fixed_decimals(slider.precision),
                );
            });
        value
    }
}

struct GpuProgram {
    label: &'static str,
    uniforms: &'static [UniformDecl],
    module: wgpu::ShaderModule,
    staging: Vec<[f32; 4]>,
    pipelines: HashMap<RenderFlags, wgpu::RenderPipeline>,
}

struct PendingFrame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    clear: wgpu::Color,
    draws: Vec<DrawCommand>,
}

struct DrawCommand {
    mesh: usize,
    program: usize,
    flags: RenderFlags,
    object_group: wgpu::BindGroup,
    material_group: wgpu::BindGroup,
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct EnvironmentTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    loaded: bool,
}

impl EnvironmentTexture {
    #[allow(clippy::too_many_arguments)]
    fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        loaded: bool,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        // Wraps around the horizon, clamps at the poles.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("environment-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("environment-bind-group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        Self {
            _texture: texture,
            bind_group,
            loaded,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    camera_position: [f32; 4],
    environment: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    tint: [f32; 4],
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("environment-bind-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    flags: RenderFlags,
    label: &str,
) -> wgpu::RenderPipeline {
    let stride = (Mesh::FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as u64;
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: (3 * std::mem::size_of::<f32>()) as u64,
                        shader_location: 1,
                    },
                ],
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: cull_mode(flags),
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled: flags.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

fn cull_mode(flags: RenderFlags) -> Option<wgpu::Face> {
    flags.cull.then_some(wgpu::Face::Back)
}

/// FIFO paces frames to the display; without vsync a low-latency mode is preferred.
fn choose_present_mode(available: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }
    available
        .iter()
        .copied()
        .find(|mode| {
            matches!(
                mode,
                wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
            )
        })
        .unwrap_or(wgpu::PresentMode::Fifo)
}

/// Staged slots followed by the trailing padding slot of the material block.
fn material_bytes(staging: &[[f32; 4]]) -> Vec<[f32; 4]> {
    let mut block = staging.to_vec();
    block.push([0.0; 4]);
    block
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backdrop_flags_disable_culling() {
        assert_eq!(cull_mode(RenderFlags::default()), Some(wgpu::Face::Back));
        assert_eq!(
            cull_mode(RenderFlags {
                cull: false,
                depth_write: false
            }),
            None
        );
    }

    #[test]
    fn vsync_always_uses_fifo() {
        let modes = [wgpu::PresentMode::Immediate, wgpu::PresentMode::Fifo];
        assert_eq!(choose_present_mode(&modes, true), wgpu::PresentMode::Fifo);
        assert_eq!(
            choose_present_mode(&modes, false),
            wgpu::PresentMode::Immediate
        );
        assert_eq!(
            choose_present_mode(&[wgpu::PresentMode::Fifo], false),
            wgpu::PresentMode::Fifo
        );
    }

    #[test]
    fn material_block_matches_shader_layout() {
        let uniforms = [UniformDecl::vec3("lightColor"), UniformDecl::scalar("roughnessValue")];
        let staging = vec![[1.0, 2.0, 3.0, 0.0], [0.5, 0.0, 0.0, 0.0]];
        let block = material_bytes(&staging);
        let bytes: &[u8] = bytemuck::cast_slice(&block);
        assert_eq!(bytes.len() as u64, shaders::material_block_size(&uniforms));
        assert_eq!(block.last(), Some(&[0.0; 4]));
    }

    #[test]
    fn gpu_structs_match_wgsl_sizes() {
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 160);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 128);
    }
}
