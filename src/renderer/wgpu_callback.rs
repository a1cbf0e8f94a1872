//! egui_wgpu integration for 3D scene rendering
//!
//! Uses offscreen rendering with depth buffer, then blits to egui's render pass.
//! Scenes register meshes and objects once, then submit a list of draws every frame.

use glam::Mat4;
use parking_lot::RwLock;
use wgpu::util::DeviceExt;

use super::{
    wireframe_indices, Camera, CameraUniform, LightRig, LightsUniform, Material, MeshData,
    MeshVertex,
};
use crate::assets::{
    create_nearest_sampler, create_sampler, Environment, HdrData, TextureData,
};

/// Handle to a mesh uploaded with [`SceneRenderResources::add_mesh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

/// Handle to an object created with [`SceneRenderResources::add_object`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// One object placed in the world for this frame
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub object: ObjectId,
    pub transform: Mat4,
}

/// Per-frame data passed to the callback
#[derive(Debug, Clone)]
pub struct SceneRenderData {
    pub camera: Camera,
    pub aspect_ratio: f32,
    pub lights: LightRig,
    /// Each object may appear at most once per frame
    pub draws: Vec<DrawItem>,
}

impl Default for SceneRenderData {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            aspect_ratio: 16.0 / 9.0,
            lights: LightRig::default(),
            draws: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topology {
    Triangles,
    Lines,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    topology: Topology,
}

struct GpuObject {
    mesh: MeshId,
    material: Material,
    has_texture: bool,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct MeshPipelines {
    opaque: wgpu::RenderPipeline,
    opaque_double_sided: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    transparent_double_sided: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
}

impl MeshPipelines {
    fn select(&self, material: &Material, topology: Topology) -> &wgpu::RenderPipeline {
        if topology == Topology::Lines {
            return &self.lines;
        }
        let double_sided = matches!(material, Material::Basic { double_sided: true, .. });
        match (material.is_transparent(), double_sided) {
            (false, false) => &self.opaque,
            (false, true) => &self.opaque_double_sided,
            (true, false) => &self.transparent,
            (true, true) => &self.transparent_double_sided,
        }
    }
}

/// Background uniform (skybox group, binding 2)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyboxUniform {
    color: [f32; 4],
    /// x: 1 samples the environment map, y: 1 gamma-encodes output
    mode: [u32; 4],
}

/// GPU resources for 3D scene rendering, stored in callback_resources
pub struct SceneRenderResources {
    // Offscreen render target
    offscreen_texture: wgpu::Texture,
    offscreen_view: wgpu::TextureView,
    offscreen_size: (u32, u32),
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    target_format: wgpu::TextureFormat,
    encode_output: bool,

    // Camera
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    // Lights
    lights_buffer: wgpu::Buffer,
    lights_bind_group: wgpu::BindGroup,

    // Meshes and objects
    object_bind_group_layout: wgpu::BindGroupLayout,
    surface_sampler: wgpu::Sampler,
    white_texture_view: wgpu::TextureView,
    pipelines: MeshPipelines,
    meshes: Vec<GpuMesh>,
    objects: Vec<GpuObject>,

    // Skybox
    skybox_pipeline: wgpu::RenderPipeline,
    skybox_bind_group_layout: wgpu::BindGroupLayout,
    skybox_bind_group: wgpu::BindGroup,
    skybox_buffer: wgpu::Buffer,
    skybox_sampler: wgpu::Sampler,
    skybox: SkyboxUniform,

    // Blit pipeline (for drawing offscreen texture to egui)
    blit_pipeline: wgpu::RenderPipeline,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    blit_bind_group: wgpu::BindGroup,
    blit_sampler: wgpu::Sampler,

    // Shared render data (updated each frame)
    render_data: RwLock<SceneRenderData>,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, kind: wgpu::SamplerBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(kind),
        count: None,
    }
}

struct PipelineSpec {
    label: &'static str,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    blend: wgpu::BlendState,
    depth_write: bool,
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    desc: PipelineSpec,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[MeshVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(desc.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            cull_mode: desc.cull_mode,
            front_face: wgpu::FrontFace::Ccw,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: desc.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl SceneRenderResources {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        log::info!("Initializing SceneRenderResources ({}x{})", width, height);

        // Non-sRGB targets get gamma applied in the shaders
        let encode_output = !target_format.is_srgb();

        // Create offscreen render target
        let (offscreen_texture, offscreen_view) =
            Self::create_offscreen_texture(device, width, height, target_format);
        let (depth_texture, depth_view) = Self::create_depth_texture(device, width, height);

        // Camera
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                )],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Lights
        let lights_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lights Buffer"),
            size: std::mem::size_of::<LightsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let lights_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lights Bind Group Layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
            });

        let lights_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lights Bind Group"),
            layout: &lights_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: lights_buffer.as_entire_binding(),
            }],
        });

        // Objects
        let object_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Object Bind Group Layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                    texture_entry(1, true),
                    sampler_entry(2, wgpu::SamplerBindingType::Filtering),
                ],
            });

        let surface_sampler = create_sampler(device, "Surface Sampler");
        let white_texture = TextureData::solid([255, 255, 255, 255]).create_texture(
            device,
            queue,
            "White Texture",
        );
        let white_texture_view = white_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_SHADER.into()),
        });

        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[
                &camera_bind_group_layout,
                &lights_bind_group_layout,
                &object_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let pipeline = |desc| {
            create_mesh_pipeline(device, &mesh_pipeline_layout, &mesh_shader, target_format, desc)
        };
        let pipelines = MeshPipelines {
            opaque: pipeline(PipelineSpec {
                label: "Opaque Pipeline",
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                blend: wgpu::BlendState::REPLACE,
                depth_write: true,
            }),
            opaque_double_sided: pipeline(PipelineSpec {
                label: "Opaque Double-Sided Pipeline",
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                blend: wgpu::BlendState::REPLACE,
                depth_write: true,
            }),
            transparent: pipeline(PipelineSpec {
                label: "Transparent Pipeline",
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            }),
            transparent_double_sided: pipeline(PipelineSpec {
                label: "Transparent Double-Sided Pipeline",
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            }),
            lines: pipeline(PipelineSpec {
                label: "Line Pipeline",
                topology: wgpu::PrimitiveTopology::LineList,
                cull_mode: None,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: true,
            }),
        };

        // Skybox
        let skybox_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Skybox Bind Group Layout"),
                entries: &[
                    texture_entry(0, false),
                    sampler_entry(1, wgpu::SamplerBindingType::NonFiltering),
                    uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
                ],
            });

        let skybox_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Skybox Buffer"),
            size: std::mem::size_of::<SkyboxUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let skybox_sampler = create_nearest_sampler(device, "Skybox Sampler");
        let placeholder_env = HdrData {
            width: 1,
            height: 1,
            data: vec![0.0, 0.0, 0.0, 1.0],
        }
        .create_texture(device, queue, "Skybox Placeholder");
        let skybox_bind_group = Self::create_skybox_bind_group(
            device,
            &skybox_bind_group_layout,
            &placeholder_env.create_view(&wgpu::TextureViewDescriptor::default()),
            &skybox_sampler,
            &skybox_buffer,
        );

        let skybox_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(SKYBOX_SHADER.into()),
        });

        let skybox_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Skybox Pipeline Layout"),
                bind_group_layouts: &[&camera_bind_group_layout, &skybox_bind_group_layout],
                push_constant_ranges: &[],
            });

        let skybox_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&skybox_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &skybox_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &skybox_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Blit
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let blit_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Blit Bind Group Layout"),
                entries: &[
                    texture_entry(0, true),
                    sampler_entry(1, wgpu::SamplerBindingType::Filtering),
                ],
            });

        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let blit_bind_group = Self::create_blit_bind_group(
            device,
            &blit_bind_group_layout,
            &offscreen_view,
            &blit_sampler,
        );

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_bind_group_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            offscreen_texture,
            offscreen_view,
            offscreen_size: (width, height),
            depth_texture,
            depth_view,
            target_format,
            encode_output,
            camera_buffer,
            camera_bind_group,
            lights_buffer,
            lights_bind_group,
            object_bind_group_layout,
            surface_sampler,
            white_texture_view,
            pipelines,
            meshes: Vec::new(),
            objects: Vec::new(),
            skybox_pipeline,
            skybox_bind_group_layout,
            skybox_bind_group,
            skybox_buffer,
            skybox_sampler,
            skybox: SkyboxUniform {
                color: [0.0, 0.0, 0.0, 1.0],
                mode: [0, encode_output as u32, 0, 0],
            },
            blit_pipeline,
            blit_bind_group_layout,
            blit_bind_group,
            blit_sampler,
            render_data: RwLock::new(SceneRenderData::default()),
        }
    }

    fn create_offscreen_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_blit_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn create_skybox_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        uniform: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
        })
    }

    fn create_object_bind_group(
        &self,
        device: &wgpu::Device,
        uniform: &wgpu::Buffer,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &self.object_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.surface_sampler),
                },
            ],
        })
    }

    fn upload_mesh(
        &mut self,
        device: &wgpu::Device,
        mesh: &MeshData,
        indices: &[u32],
        topology: Topology,
    ) -> MeshId {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            topology,
        });
        MeshId(self.meshes.len() - 1)
    }

    /// Upload a triangle mesh
    pub fn add_mesh(&mut self, device: &wgpu::Device, mesh: &MeshData) -> MeshId {
        self.upload_mesh(device, mesh, &mesh.indices, Topology::Triangles)
    }

    /// Upload the unique edges of a triangle mesh as a line list
    pub fn add_wireframe_mesh(&mut self, device: &wgpu::Device, mesh: &MeshData) -> MeshId {
        let lines = wireframe_indices(mesh);
        log::debug!("Wireframe mesh with {} edges", lines.len() / 2);
        self.upload_mesh(device, mesh, &lines, Topology::Lines)
    }

    /// Create an object drawing `mesh` with `material`
    pub fn add_object(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mesh: MeshId,
        material: Material,
        texture: Option<&TextureData>,
    ) -> ObjectId {
        let line_mesh = self
            .meshes
            .get(mesh.0)
            .is_some_and(|m| m.topology == Topology::Lines);
        if material.is_wireframe() != line_mesh {
            log::warn!(
                "Object on {:?}: wireframe material needs a wireframe mesh and vice versa",
                mesh
            );
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniform Buffer"),
            size: std::mem::size_of::<super::ObjectUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = match texture {
            Some(data) => {
                let view = data
                    .create_texture(device, queue, "Object Texture")
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.create_object_bind_group(device, &uniform_buffer, &view)
            }
            None => self.create_object_bind_group(device, &uniform_buffer, &self.white_texture_view),
        };

        self.objects.push(GpuObject {
            mesh,
            material,
            has_texture: texture.is_some(),
            uniform_buffer,
            bind_group,
        });
        ObjectId(self.objects.len() - 1)
    }

    /// Replace the surface texture of an existing object
    pub fn set_object_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        object: ObjectId,
        texture: &TextureData,
    ) {
        let Some(target) = self.objects.get(object.0) else {
            log::warn!("set_object_texture: unknown object {:?}", object);
            return;
        };
        let view = texture
            .create_texture(device, queue, "Object Texture")
            .create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.create_object_bind_group(device, &target.uniform_buffer, &view);

        if let Some(target) = self.objects.get_mut(object.0) {
            target.bind_group = bind_group;
            target.has_texture = true;
        }
    }

    /// Switch the background between a flat color and an equirectangular map
    pub fn set_environment(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        environment: &Environment,
    ) {
        match environment {
            Environment::Map(hdr) => {
                let view = hdr
                    .create_texture(device, queue, "Environment Map")
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.skybox_bind_group = Self::create_skybox_bind_group(
                    device,
                    &self.skybox_bind_group_layout,
                    &view,
                    &self.skybox_sampler,
                    &self.skybox_buffer,
                );
                self.skybox.mode[0] = 1;
            }
            Environment::Fallback(color) => {
                self.skybox.color = [color[0], color[1], color[2], 1.0];
                self.skybox.mode[0] = 0;
            }
            Environment::Pending => {
                self.skybox.color = [0.0, 0.0, 0.0, 1.0];
                self.skybox.mode[0] = 0;
            }
        }
    }

    /// Update render data (called from app each frame)
    pub fn set_render_data(&self, data: SceneRenderData) {
        *self.render_data.write() = data;
    }

    /// Resize offscreen buffers if needed
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.offscreen_size != (width, height) && width > 0 && height > 0 {
            let (offscreen_texture, offscreen_view) =
                Self::create_offscreen_texture(device, width, height, self.target_format);
            let (depth_texture, depth_view) = Self::create_depth_texture(device, width, height);

            // Blit reads the old view until rebuilt
            self.blit_bind_group = Self::create_blit_bind_group(
                device,
                &self.blit_bind_group_layout,
                &offscreen_view,
                &self.blit_sampler,
            );

            self.offscreen_texture = offscreen_texture;
            self.offscreen_view = offscreen_view;
            self.depth_texture = depth_texture;
            self.depth_view = depth_view;
            self.offscreen_size = (width, height);
        }
    }

    /// Render the 3D scene to offscreen buffer
    pub fn render_offscreen(
        &self,
        _device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let data = self.render_data.read();

        let camera_uniform = CameraUniform::from_camera(&data.camera, data.aspect_ratio);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));

        let mut lights_uniform = data.lights.to_uniform();
        lights_uniform.output[0] = self.encode_output as u32;
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(&lights_uniform));

        queue.write_buffer(&self.skybox_buffer, 0, bytemuck::bytes_of(&self.skybox));

        // Resolve draws and upload per-object transforms
        let mut opaque = Vec::new();
        let mut lines = Vec::new();
        let mut transparent = Vec::new();
        for item in &data.draws {
            let Some(object) = self.objects.get(item.object.0) else {
                log::debug!("Skipping draw of unknown object {:?}", item.object);
                continue;
            };
            let Some(mesh) = self.meshes.get(object.mesh.0) else {
                continue;
            };
            if mesh.index_count == 0 {
                continue;
            }

            let uniform = object.material.to_uniform(item.transform, object.has_texture);
            queue.write_buffer(&object.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

            if mesh.topology == Topology::Lines {
                lines.push((object, mesh));
            } else if object.material.is_transparent() {
                transparent.push((object, mesh));
            } else {
                opaque.push((object, mesh));
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Offscreen Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
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

            // Draw skybox first (at infinity)
            render_pass.set_pipeline(&self.skybox_pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.skybox_bind_group, &[]);
            render_pass.draw(0..3, 0..1);

            // Transparent surfaces last so they blend over everything else
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.lights_bind_group, &[]);
            for (object, mesh) in opaque.iter().chain(&lines).chain(&transparent) {
                render_pass.set_pipeline(self.pipelines.select(&object.material, mesh.topology));
                render_pass.set_bind_group(2, &object.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
    }

    /// Blit the offscreen texture to egui's render pass
    pub fn blit(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        render_pass.set_pipeline(&self.blit_pipeline);
        render_pass.set_bind_group(0, &self.blit_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// The callback that egui_wgpu will invoke
pub struct SceneCallback {
    pub viewport_size: (u32, u32),
}

impl egui_wgpu::CallbackTrait for SceneCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        egui_encoder: &mut wgpu::CommandEncoder,
        callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if let Some(resources) = callback_resources.get_mut::<SceneRenderResources>() {
            resources.resize(device, self.viewport_size.0, self.viewport_size.1);
            resources.render_offscreen(device, queue, egui_encoder);
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        callback_resources: &egui_wgpu::CallbackResources,
    ) {
        if let Some(resources) = callback_resources.get::<SceneRenderResources>() {
            resources.blit(render_pass);
        }
    }
}

// Shader sources
const MESH_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

struct DirectionalLight {
    direction: vec4<f32>,
    color: vec4<f32>,
};

struct PointLight {
    position: vec4<f32>,
    color: vec4<f32>,
};

struct Lights {
    ambient: vec4<f32>,
    hemisphere_sky: vec4<f32>,
    hemisphere_ground: vec4<f32>,
    directional: array<DirectionalLight, 4>,
    point: array<PointLight, 16>,
    counts: vec4<u32>,
    output: vec4<u32>,
};

struct ObjectUniform {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    color: vec4<f32>,
    emissive: vec4<f32>,
    flags: vec4<u32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;
@group(1) @binding(0) var<uniform> lights: Lights;
@group(2) @binding(0) var<uniform> object: ObjectUniform;
@group(2) @binding(1) var base_texture: texture_2d<f32>;
@group(2) @binding(2) var base_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_pos = (object.model * vec4<f32>(in.position, 1.0)).xyz;
    out.clip_position = camera.view_proj * vec4<f32>(world_pos, 1.0);
    out.world_pos = world_pos;
    out.normal = (object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.uv = in.uv;
    return out;
}

fn distance_attenuation(distance: f32, range: f32) -> f32 {
    var falloff = 1.0 / max(distance * distance, 0.01);
    if (range > 0.0) {
        let ratio = distance / range;
        let cutoff = clamp(1.0 - ratio * ratio * ratio * ratio, 0.0, 1.0);
        falloff = falloff * cutoff * cutoff;
    }
    return falloff;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // Derivatives and sampling must stay in uniform control flow
    let face_normal = normalize(cross(dpdy(in.world_pos), dpdx(in.world_pos)));
    let texel = textureSample(base_texture, base_sampler, in.uv);

    var base = object.color.rgb;
    if (object.flags.x == 1u) {
        base = base * texel.rgb;
    }

    var color = base;
    if (object.flags.z == 1u) {
        let view_dir = normalize(camera.camera_pos.xyz - in.world_pos);
        var n = normalize(in.normal);
        if (object.flags.y == 1u) {
            n = face_normal;
        }
        if (dot(n, view_dir) < 0.0) {
            n = -n;
        }

        var irradiance = lights.ambient.rgb;
        irradiance += mix(lights.hemisphere_ground.rgb, lights.hemisphere_sky.rgb, 0.5 * n.y + 0.5);

        for (var i = 0u; i < lights.counts.x; i++) {
            let light = lights.directional[i];
            irradiance += light.color.rgb * max(dot(n, light.direction.xyz), 0.0);
        }

        for (var i = 0u; i < lights.counts.y; i++) {
            let light = lights.point[i];
            let to_light = light.position.xyz - in.world_pos;
            let distance = length(to_light);
            let l = to_light / max(distance, 1e-4);
            irradiance += light.color.rgb * max(dot(n, l), 0.0)
                * distance_attenuation(distance, light.position.w);
        }

        color = base * irradiance + object.emissive.rgb;
    }

    if (lights.output.x == 1u) {
        color = pow(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), vec3<f32>(1.0 / 2.2));
    }
    return vec4<f32>(color, object.color.a);
}
"#;

const SKYBOX_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

struct Background {
    color: vec4<f32>,
    mode: vec4<u32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;
@group(1) @binding(0) var skybox_texture: texture_2d<f32>;
@group(1) @binding(1) var skybox_sampler: sampler;
@group(1) @binding(2) var<uniform> background: Background;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) direction: vec3<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    // Fullscreen triangle
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );

    var out: VertexOutput;
    let pos = positions[vertex_index];
    out.clip_position = vec4<f32>(pos, 0.9999, 1.0);

    let view_dir = normalize(vec3<f32>(pos.x / camera.proj[0][0], pos.y / camera.proj[1][1], -1.0));
    let inv_view_rot = transpose(mat3x3<f32>(
        camera.view[0].xyz,
        camera.view[1].xyz,
        camera.view[2].xyz
    ));
    out.direction = inv_view_rot * view_dir;

    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dir = normalize(in.direction);
    let u = atan2(dir.z, dir.x) / (2.0 * 3.14159265) + 0.5;
    let v = 0.5 - asin(clamp(dir.y, -1.0, 1.0)) / 3.14159265;
    let texel = textureSample(skybox_texture, skybox_sampler, vec2<f32>(u, v)).rgb;

    var color = background.color.rgb;
    if (background.mode.x == 1u) {
        color = texel;
    }
    if (background.mode.y == 1u) {
        color = pow(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), vec3<f32>(1.0 / 2.2));
    }
    return vec4<f32>(color, 1.0);
}
"#;

const BLIT_SHADER: &str = r#"
@group(0) @binding(0) var blit_texture: texture_2d<f32>;
@group(0) @binding(1) var blit_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    // Fullscreen triangle
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );

    var out: VertexOutput;
    let pos = positions[vertex_index];
    out.clip_position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = pos * 0.5 + 0.5;
    out.uv.y = 1.0 - out.uv.y;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(blit_texture, blit_sampler, in.uv);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skybox_uniform_layout() {
        assert_eq!(std::mem::size_of::<SkyboxUniform>(), 32);
    }

    #[test]
    fn test_default_render_data_is_empty() {
        let data = SceneRenderData::default();
        assert!(data.draws.is_empty());
        assert!(data.aspect_ratio > 1.0);
    }
}
