use std::collections::HashSet;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use kestrel_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    error::GfxError,
    foundation::device::GfxDevice,
    resources::allocator::VmemAllocator,
};
use kestrel_scene::render_set::RenderSetBuckets;

use crate::{
    attachment::{AttachmentDesc, AttachmentPool},
    pass::{CompiledPass, PassDesc},
};

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    /// pass 以 LOAD 读取了一个此前没有任何 pass STORE 过的 attachment；
    /// 声明顺序必须等于数据依赖顺序
    #[error("pass '{pass}' loads attachment {attachment} before any earlier pass stores it")]
    DependencyOrder { pass: String, attachment: usize },
}

/// 校验声明顺序是否满足数据依赖
///
/// 规则：pass 以 LOAD 使用的 attachment 必须已被更早的 pass STORE 过；
/// 同一个 pass 内的 STORE 不满足自己的 LOAD
pub fn validate_declaration_order(passes: &[PassDesc]) -> Result<(), GraphError> {
    let mut stored: HashSet<usize> = HashSet::new();

    for pass in passes {
        let loads = pass
            .color_attachments
            .iter()
            .chain(pass.depth_stencil.iter())
            .filter(|att| att.load_op == vk::AttachmentLoadOp::LOAD);
        for att in loads {
            if !stored.contains(&att.attachment) {
                return Err(GraphError::DependencyOrder {
                    pass: pass.name.clone(),
                    attachment: att.attachment,
                });
            }
        }

        let stores = pass
            .color_attachments
            .iter()
            .chain(pass.depth_stencil.iter())
            .filter(|att| att.store_op == vk::AttachmentStoreOp::STORE)
            .map(|att| att.attachment)
            .chain(pass.resolve_attachment);
        stored.extend(stores);
    }
    Ok(())
}

/// 一帧的绘制计划：每个 pass 一个条目，顺序即声明顺序
///
/// 桶为空的 pass 也会出现在计划中（element_count 为 0），
/// 仍然执行一次 begin/end，使其 attachment 继续向后传递
pub struct PassDrawPlan {
    pub pass_index: usize,
    pub element_count: usize,
}

pub fn build_draw_plan(passes: &[PassDesc], buckets: &RenderSetBuckets) -> Vec<PassDrawPlan> {
    passes
        .iter()
        .enumerate()
        .map(|(pass_index, pass)| PassDrawPlan {
            pass_index,
            element_count: pass.served_sets.iter().map(|set| buckets.elements(*set).len()).sum(),
        })
        .collect_vec()
}

/// 逻辑 pass 图
///
/// 声明一次；每次 swapchain (重)建编译一次；每帧绘制一次
pub struct RenderGraph {
    device: Rc<GfxDevice>,

    passes: Vec<PassDesc>,
    compiled: Vec<CompiledPass>,
    attachment_pool: AttachmentPool,

    extent: vk::Extent2D,
}

// new & init
impl RenderGraph {
    /// 声明顺序在构造时校验一次，之后不再变化
    pub fn new(
        device: Rc<GfxDevice>,
        attachments: Vec<AttachmentDesc>,
        passes: Vec<PassDesc>,
    ) -> Result<Self, GraphError> {
        validate_declaration_order(&passes)?;
        Ok(Self {
            device,
            passes,
            compiled: Vec::new(),
            attachment_pool: AttachmentPool::new(attachments),
            extent: vk::Extent2D::default(),
        })
    }

    /// swapchain (重)建后重建 attachment 池并重新编译所有 pass
    ///
    /// 调用前外部必须已等待 device idle
    pub fn rebuild(
        &mut self,
        allocator: &Rc<VmemAllocator>,
        extent: vk::Extent2D,
        swapchain_format: vk::Format,
        swapchain_views: &[vk::ImageView],
    ) -> Result<(), GfxError> {
        let _span = tracy_client::span!("RenderGraph::rebuild");

        self.compiled.clear();
        self.attachment_pool.rebuild(&self.device, allocator, extent, swapchain_format, swapchain_views);
        self.extent = extent;

        for pass in &self.passes {
            self.compiled.push(CompiledPass::compile(
                self.device.clone(),
                pass,
                &self.attachment_pool,
                swapchain_views.len(),
                extent,
            )?);
        }
        log::info!("render graph compiled: {} passes, extent {}x{}", self.passes.len(), extent.width, extent.height);
        Ok(())
    }

    /// 释放所有与 swapchain 尺寸相关的资源；调用前外部必须已等待 device idle
    pub fn destroy_size_dependents(&mut self) {
        self.compiled.clear();
        self.attachment_pool.destroy_images();
    }
}

// getters
impl RenderGraph {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        !self.compiled.is_empty()
    }
}

// draw
impl RenderGraph {
    /// 按声明顺序录制所有 pass
    ///
    /// 每个元素绑定自己的 vertex/index buffer、descriptor set 和 push constant；
    /// 桶为空的 pass 仍然执行一次 begin/end
    pub fn draw(&self, cmd: &GfxCommandBuffer, image_index: usize, buckets: &RenderSetBuckets) {
        let _span = tracy_client::span!("RenderGraph::draw");
        debug_assert!(self.is_compiled(), "draw before rebuild");

        if log::log_enabled!(log::Level::Trace) {
            for entry in build_draw_plan(&self.passes, buckets) {
                log::trace!("pass '{}': {} elements", self.passes[entry.pass_index].name, entry.element_count);
            }
        }

        for (pass, compiled) in self.passes.iter().zip(self.compiled.iter()) {
            cmd.begin_label(&pass.name);

            let begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(compiled.render_pass())
                .framebuffer(compiled.framebuffer(image_index))
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: self.extent,
                })
                .clear_values(compiled.clear_values());
            cmd.cmd_begin_render_pass(&begin_info);

            if let Some(pipeline) = compiled.pipeline() {
                cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
                cmd.cmd_set_viewport_scissor(self.extent);

                for set in &pass.served_sets {
                    for element in buckets.elements(*set) {
                        cmd.cmd_bind_vertex_buffers(0, &[element.vertex_buffer], &[0]);
                        cmd.cmd_bind_index_buffer(element.index_buffer, 0, element.index_type);
                        if element.descriptor_set != vk::DescriptorSet::null() {
                            cmd.cmd_bind_descriptor_sets(
                                vk::PipelineBindPoint::GRAPHICS,
                                pipeline.layout().handle(),
                                0,
                                &[element.descriptor_set],
                            );
                        }
                        if !element.push_constants.is_empty() {
                            cmd.cmd_push_constants(
                                pipeline.layout().handle(),
                                compiled.push_constant_stages(),
                                0,
                                &element.push_constants,
                            );
                        }
                        cmd.cmd_draw_indexed(element.index_count, 0, 1, 0, 0);
                    }
                }
            }

            cmd.cmd_end_render_pass();
            cmd.end_label();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::PassAttachment;
    use kestrel_scene::render_set::{RenderSet, RenderSetBuckets};

    fn store_pass(name: &str, attachment: usize) -> PassDesc {
        PassDesc::new(name).color(PassAttachment::new(
            attachment,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::STORE,
        ))
    }

    fn load_pass(name: &str, attachment: usize) -> PassDesc {
        PassDesc::new(name).color(PassAttachment::new(
            attachment,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::STORE,
        ))
    }

    #[test]
    fn test_store_then_load_is_valid() {
        let passes = vec![store_pass("a", 0), load_pass("b", 0)];
        assert!(validate_declaration_order(&passes).is_ok());
    }

    #[test]
    fn test_load_before_store_is_rejected() {
        // b 在 a 之前声明，却要读 a 的输出
        let passes = vec![load_pass("b", 0), store_pass("a", 0)];
        let err = validate_declaration_order(&passes).unwrap_err();
        match err {
            GraphError::DependencyOrder { pass, attachment } => {
                assert_eq!(pass, "b");
                assert_eq!(attachment, 0);
            }
        }
    }

    #[test]
    fn test_load_of_never_stored_attachment_is_rejected() {
        let passes = vec![store_pass("a", 0), load_pass("b", 1)];
        assert!(validate_declaration_order(&passes).is_err());
    }

    #[test]
    fn test_pass_cannot_satisfy_its_own_load() {
        // 同一个 pass 既 LOAD 又 STORE 同一个 attachment，LOAD 读的是更早的内容
        let passes = vec![load_pass("a", 0)];
        assert!(validate_declaration_order(&passes).is_err());
    }

    #[test]
    fn test_depth_load_respects_order() {
        let depth_store = PassDesc::new("a").depth(PassAttachment::new(
            1,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::STORE,
        ));
        let depth_load = PassDesc::new("b").depth(PassAttachment::new(
            1,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::DONT_CARE,
        ));
        assert!(validate_declaration_order(&[depth_store, depth_load]).is_ok());

        let depth_load = PassDesc::new("b").depth(PassAttachment::new(
            1,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::DONT_CARE,
        ));
        assert!(validate_declaration_order(&[depth_load]).is_err());
    }

    #[test]
    fn test_empty_bucket_pass_stays_in_draw_plan() {
        let passes = vec![
            store_pass("background", 0),
            load_pass("post", 0).serve(RenderSet::Postprocess),
        ];
        let buckets = RenderSetBuckets::new();

        let plan = build_draw_plan(&passes, &buckets);
        // 没有任何元素时每个 pass 仍然各占一个条目
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|entry| entry.element_count == 0));
    }
}
