use std::cell::Cell;
use std::rc::Rc;

use ash::vk;
use kestrel_gfx::gfx::Gfx;
use kestrel_gfx::resources::buffer::GfxBuffer;
use kestrel_scene::culling::BoundingSphere;
use kestrel_scene::entity::ScenePrimitive;
use kestrel_scene::render_set::{RenderElement, RenderSet};

/// 三角形顶点：位置 + 颜色，与 scene pass 的顶点输入布局一致
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 3],
    color: [f32; 3],
}

/// XY 平面上的 CCW 三角形
const VERTICES: [Vertex; 3] = [
    Vertex {
        pos: [0.0, 0.8, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        pos: [-0.8, -0.8, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        pos: [0.8, -0.8, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

const INDICES: [u32; 3] = [0, 1, 2];

/// 最简单的可绘制 primitive
///
/// 顶点和索引数据在创建时一次性上传到 device local buffer，
/// model 矩阵每帧由应用层更新，经 push constant 传给 shader
pub struct TrianglePrimitive {
    vertex_buffer: GfxBuffer,
    index_buffer: GfxBuffer,

    /// 渲染循环是单线程的，Cell 足够
    model: Cell<glam::Mat4>,
    frame_descriptor: Cell<vk::DescriptorSet>,

    render_sets: [RenderSet; 1],
}

impl TrianglePrimitive {
    pub fn new(gfx: &Rc<Gfx>) -> Self {
        let device = gfx.device();
        let allocator = gfx.allocator();

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&INDICES);

        let vertex_buffer =
            GfxBuffer::new_vertex(device, allocator.clone(), vertex_bytes.len() as vk::DeviceSize, "triangle-vertex");
        let index_buffer =
            GfxBuffer::new_index(device, allocator.clone(), index_bytes.len() as vk::DeviceSize, "triangle-index");

        let mut vertex_staging = GfxBuffer::new_staging(
            device,
            allocator.clone(),
            vertex_bytes.len() as vk::DeviceSize,
            "triangle-vertex-staging",
        );
        let mut index_staging = GfxBuffer::new_staging(
            device,
            allocator.clone(),
            index_bytes.len() as vk::DeviceSize,
            "triangle-index-staging",
        );
        vertex_staging.write_bytes(vertex_bytes);
        index_staging.write_bytes(index_bytes);

        gfx.one_time_exec(
            |cmd| {
                cmd.cmd_copy_buffer(
                    vertex_staging.vk_buffer(),
                    vertex_buffer.vk_buffer(),
                    &[vk::BufferCopy::default().size(vertex_staging.size())],
                );
                cmd.cmd_copy_buffer(
                    index_staging.vk_buffer(),
                    index_buffer.vk_buffer(),
                    &[vk::BufferCopy::default().size(index_staging.size())],
                );
            },
            "upload-triangle",
        );

        Self {
            vertex_buffer,
            index_buffer,
            model: Cell::new(glam::Mat4::IDENTITY),
            frame_descriptor: Cell::new(vk::DescriptorSet::null()),
            render_sets: [RenderSet::Scene],
        }
    }

    pub fn set_model(&self, model: glam::Mat4) {
        self.model.set(model);
    }

    /// 每帧更新：绘制时使用当前 frame slot 的 descriptor set
    pub fn set_frame_descriptor(&self, set: vk::DescriptorSet) {
        self.frame_descriptor.set(set);
    }
}

impl ScenePrimitive for TrianglePrimitive {
    fn bounding_sphere(&self) -> BoundingSphere {
        let center = self.model.get().transform_point3(glam::Vec3::ZERO);
        BoundingSphere::new(center, 1.5)
    }

    fn render_sets(&self) -> &[RenderSet] {
        &self.render_sets
    }

    fn emit_element(&self, _set: RenderSet) -> RenderElement {
        let model = self.model.get();
        RenderElement {
            vertex_buffer: self.vertex_buffer.vk_buffer(),
            index_buffer: self.index_buffer.vk_buffer(),
            index_type: vk::IndexType::UINT32,
            index_count: INDICES.len() as u32,
            descriptor_set: self.frame_descriptor.get(),
            push_constants: bytemuck::bytes_of(&model).to_vec(),
        }
    }
}
