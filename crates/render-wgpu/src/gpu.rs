use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};
use orbitview_common::MeshHandle;
use orbitview_render::{DrawItem, DrawList, FrameInput, Renderer, SpotLight};
use orbitview_scene::{MeshData, MeshStore};
use std::collections::HashMap;
use std::ops::Range;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    light_pos: [f32; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
    light_cone: [f32; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    flags: [f32; 4],
}

impl InstanceData {
    fn from_item(item: &DrawItem) -> Self {
        let linear = Mat3::from_mat4(item.model);
        let normal = if linear.determinant().abs() > f32::EPSILON {
            linear.inverse().transpose()
        } else {
            linear
        };
        let col = |c: glam::Vec3| [c.x, c.y, c.z, 0.0];
        Self {
            model: item.model.to_cols_array_2d(),
            normal: [col(normal.x_axis), col(normal.y_axis), col(normal.z_axis)],
            color: item.color.to_linear(),
            flags: [if item.receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, handle: MeshHandle, mesh: &MeshData) -> Self {
        let vertices: Vec<Vertex> = mesh
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| Vertex {
                position: *p,
                normal: mesh.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            })
            .collect();
        let label = format!("mesh_{:016x}", handle.0);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Tunables for the GPU backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// 1 disables multisampling. Any other value selects 4x, the only
    /// multisampled count every adapter supports.
    pub sample_count: u32,
    pub shadow_map_size: u32,
    pub shadows: bool,
    /// Linear ambient intensity applied to every surface.
    pub ambient: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_count: 4,
            shadow_map_size: 2048,
            shadows: true,
            ambient: 0.02,
        }
    }
}

/// Forward renderer for lit meshes with one shadow-casting spotlight.
pub struct WgpuRenderer {
    lit_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    shadow_view: wgpu::TextureView,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    meshes: HashMap<MeshHandle, GpuMesh>,
    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    surface_format: wgpu::TextureFormat,
    settings: RenderSettings,
}

/// Map a requested MSAA count onto what the pipelines are built with.
fn effective_sample_count(requested: u32) -> u32 {
    match requested {
        0 | 1 => 1,
        4 => 4,
        other => {
            tracing::warn!(requested = other, "unsupported msaa sample count, using 4");
            4
        }
    }
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: RenderSettings,
    ) -> Self {
        let settings = RenderSettings {
            sample_count: effective_sample_count(settings.sample_count),
            shadow_map_size: settings.shadow_map_size.clamp(256, 8192),
            ..settings
        };

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals_buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let shadow_view = Self::create_shadow_map(device, settings.shadow_map_size);
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_bind_group"),
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });

        let buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x3,
                ],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<InstanceData>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![
                    2 => Float32x4,
                    3 => Float32x4,
                    4 => Float32x4,
                    5 => Float32x4,
                    6 => Float32x4,
                    7 => Float32x4,
                    8 => Float32x4,
                    9 => Float32x4,
                    10 => Float32x4,
                ],
            },
        ];

        let lit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &shadow_layout],
            push_constant_ranges: &[],
        });
        let lit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lit_pipeline"),
            layout: Some(&lit_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            // Double-sided: the fragment shader flips back-face normals.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: settings.sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        let shadow_layout_desc = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow_pipeline"),
            layout: Some(&shadow_layout_desc),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let instance_capacity = 256;
        let instance_buffer = Self::create_instance_buffer(device, instance_capacity);
        let (depth_view, msaa_view) =
            Self::create_targets(device, surface_format, settings.sample_count, width, height);

        tracing::info!(
            format = ?surface_format,
            samples = settings.sample_count,
            shadow_map = settings.shadow_map_size,
            "wgpu renderer created"
        );

        Self {
            lit_pipeline,
            shadow_pipeline,
            globals_buffer,
            globals_bind_group,
            shadow_bind_group,
            shadow_view,
            instance_buffer,
            instance_capacity,
            meshes: HashMap::new(),
            depth_view,
            msaa_view,
            surface_format,
            settings,
        }
    }

    /// Recreate the size-dependent targets. Takes the surface size in
    /// physical pixels.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (depth_view, msaa_view) = Self::create_targets(
            device,
            self.surface_format,
            self.settings.sample_count,
            width,
            height,
        );
        self.depth_view = depth_view;
        self.msaa_view = msaa_view;
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn uploaded_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Bind the per-frame GPU handles, yielding something that implements
    /// [`Renderer`].
    pub fn frame<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        target: &'a wgpu::TextureView,
    ) -> WgpuFrame<'a> {
        WgpuFrame {
            renderer: self,
            device,
            queue,
            target,
        }
    }

    fn ensure_uploaded(&mut self, device: &wgpu::Device, store: &MeshStore, handle: MeshHandle) -> bool {
        if self.meshes.contains_key(&handle) {
            return true;
        }
        let Some(mesh) = store.get(handle) else {
            return false;
        };
        if mesh.indices.is_empty() {
            return false;
        }
        tracing::debug!(
            handle = format_args!("{:016x}", handle.0),
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "uploading mesh"
        );
        self.meshes.insert(handle, GpuMesh::upload(device, handle, mesh));
        true
    }

    fn ensure_instance_capacity(&mut self, device: &wgpu::Device, needed: usize) {
        if needed <= self.instance_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        tracing::debug!(capacity, "growing instance buffer");
        self.instance_buffer = Self::create_instance_buffer(device, capacity);
        self.instance_capacity = capacity;
    }

    fn globals(&self, input: &FrameInput<'_>, light: Option<&SpotLight>) -> Globals {
        let cam = input.camera;
        let ambient = self.settings.ambient;
        let shadows = self.settings.shadows && light.is_some_and(|l| l.cast_shadow);
        let mut globals = Globals {
            view_proj: cam.view_projection().to_cols_array_2d(),
            light_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [cam.position.x, cam.position.y, cam.position.z, 1.0],
            light_pos: [0.0; 4],
            light_dir: [0.0, -1.0, 0.0, 0.0],
            light_color: [0.0, 0.0, 0.0, 2.0],
            light_cone: [0.0, 1.0, 0.0, 0.0],
            ambient: [ambient, ambient, ambient, if shadows { 1.0 } else { 0.0 }],
        };
        if let Some(spot) = light {
            let (outer, inner) = spot.light.cone_cosines();
            let c = spot.light.color.to_linear();
            globals.light_view_proj = spot.shadow_view_projection().to_cols_array_2d();
            globals.light_pos = [spot.position.x, spot.position.y, spot.position.z, spot.light.intensity];
            globals.light_dir = [spot.direction.x, spot.direction.y, spot.direction.z, spot.light.range];
            globals.light_color = [c[0], c[1], c[2], spot.light.decay];
            globals.light_cone = [
                outer,
                inner.max(outer + 1e-4),
                spot.light.shadow_bias,
                1.0,
            ];
        }
        globals
    }

    fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        input: &FrameInput<'_>,
    ) {
        let list = DrawList::collect(input.scene);

        let mut drawable: Vec<&DrawItem> = Vec::with_capacity(list.items.len());
        for item in &list.items {
            if self.ensure_uploaded(device, input.meshes, item.mesh) {
                drawable.push(item);
            }
        }
        drawable.sort_by_key(|i| i.mesh);

        let shadows = self.settings.shadows && list.light.as_ref().is_some_and(|l| l.cast_shadow);
        let casters: Vec<&DrawItem> = if shadows {
            drawable.iter().copied().filter(|i| i.cast_shadow).collect()
        } else {
            Vec::new()
        };

        let mut instances: Vec<InstanceData> = Vec::with_capacity(drawable.len() + casters.len());
        let lit_batches = batch(&drawable, &mut instances);
        let shadow_batches = batch(&casters, &mut instances);
        self.ensure_instance_capacity(device, instances.len());
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let globals = self.globals(input, list.light.as_ref());
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            if !shadow_batches.is_empty() {
                pass.set_pipeline(&self.shadow_pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                for (handle, range) in &shadow_batches {
                    let mesh = &self.meshes[handle];
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, range.clone());
                }
            }
        }

        {
            let clear = input.viewport.clear_color().to_linear();
            let (view, resolve_target) = match &self.msaa_view {
                Some(msaa) => (msaa, Some(target)),
                None => (target, None),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: clear[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            if !lit_batches.is_empty() {
                pass.set_pipeline(&self.lit_pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                pass.set_bind_group(1, &self.shadow_bind_group, &[]);
                pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                for (handle, range) in &lit_batches {
                    let mesh = &self.meshes[handle];
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, range.clone());
                }
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(
            draws = lit_batches.len(),
            instances = drawable.len(),
            casters = casters.len(),
            "frame submitted"
        );
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: (capacity * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_shadow_map(device: &wgpu::Device, size: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }

    fn create_targets(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        width: u32,
        height: u32,
    ) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let msaa = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("msaa_color"),
                    size,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: surface_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&Default::default())
        });
        (depth.create_view(&Default::default()), msaa)
    }
}

/// Append instances for `items` (sorted by mesh) and return one instance
/// range per mesh.
fn batch(items: &[&DrawItem], instances: &mut Vec<InstanceData>) -> Vec<(MeshHandle, Range<u32>)> {
    let mut batches: Vec<(MeshHandle, Range<u32>)> = Vec::new();
    for item in items {
        let index = instances.len() as u32;
        instances.push(InstanceData::from_item(item));
        match batches.last_mut() {
            Some((handle, range)) if *handle == item.mesh => range.end = index + 1,
            _ => batches.push((item.mesh, index..index + 1)),
        }
    }
    batches
}

/// A [`WgpuRenderer`] bound to the device, queue and target of one frame.
pub struct WgpuFrame<'a> {
    renderer: &'a mut WgpuRenderer,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    target: &'a wgpu::TextureView,
}

impl Renderer for WgpuFrame<'_> {
    type Output = ();

    fn render(&mut self, frame: &FrameInput<'_>) {
        self.renderer.draw(self.device, self.queue, self.target, frame);
    }
}
