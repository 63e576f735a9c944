use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use kestrel_gfx::{
    error::GfxError,
    foundation::device::GfxDevice,
    pipelines::{
        descriptor::GfxDescriptorSetLayout,
        graphics_pipeline::{GraphicsPipeline, GraphicsPipelineCreateInfo, PipelineLayout},
        shader::{ShaderReflection, ShaderStageInfo},
    },
};
use kestrel_scene::render_set::RenderSet;

/// pass 对池中某个 attachment 的使用声明
#[derive(Clone, Copy)]
pub struct PassAttachment {
    /// attachment 池下标
    pub attachment: usize,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
}

impl PassAttachment {
    pub fn new(attachment: usize, load_op: vk::AttachmentLoadOp, store_op: vk::AttachmentStoreOp) -> Self {
        Self {
            attachment,
            load_op,
            store_op,
        }
    }
}

/// pass 所用 pipeline 的描述：spv 路径 + 反射 sidecar 路径
pub struct PassPipelineDesc {
    pub shader_stages: Vec<ShaderStageInfo>,
    pub reflection: PathBuf,

    pub primitive_topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub enable_depth_test: bool,
    pub enable_depth_write: bool,
}

impl PassPipelineDesc {
    /// 常见的 vertex + fragment 组合
    ///
    /// # param
    /// * base - 不带后缀的 shader 路径，如 `shaders/scene`；
    ///   实际读取 `<base>.vert.spv`、`<base>.frag.spv`、`<base>.reflect.json`
    pub fn vs_ps(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            shader_stages: vec![
                ShaderStageInfo {
                    stage: vk::ShaderStageFlags::VERTEX,
                    path: base.with_extension("vert.spv"),
                },
                ShaderStageInfo {
                    stage: vk::ShaderStageFlags::FRAGMENT,
                    path: base.with_extension("frag.spv"),
                },
            ],
            reflection: base.with_extension("reflect.json"),
            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            enable_depth_test: true,
            enable_depth_write: true,
        }
    }
}

/// 逻辑 pass 的声明
///
/// 声明顺序就是执行顺序，同时必须等于数据依赖顺序
pub struct PassDesc {
    pub name: String,

    /// 该 pass 消费哪些渲染分组；可以为空（纯清屏或全屏后处理）
    pub served_sets: Vec<RenderSet>,

    pub color_attachments: Vec<PassAttachment>,
    /// MSAA resolve 目标（池下标）；只在 color attachment 为多采样时有意义
    pub resolve_attachment: Option<usize>,
    pub depth_stencil: Option<PassAttachment>,

    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,

    /// 为 true 时 swapchain-backed 的 color attachment 最终转换到 PRESENT_SRC 布局
    pub present_after: bool,

    /// 为 None 时该 pass 不绑定 pipeline，只执行 load/clear/store（结构性 pass）
    pub pipeline: Option<PassPipelineDesc>,
}

impl PassDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            served_sets: Vec::new(),
            color_attachments: Vec::new(),
            resolve_attachment: None,
            depth_stencil: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            present_after: false,
            pipeline: None,
        }
    }

    pub fn serve(mut self, set: RenderSet) -> Self {
        self.served_sets.push(set);
        self
    }

    pub fn color(mut self, attachment: PassAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn depth(mut self, attachment: PassAttachment) -> Self {
        self.depth_stencil = Some(attachment);
        self
    }

    pub fn resolve_to(mut self, attachment: usize) -> Self {
        self.resolve_attachment = Some(attachment);
        self
    }

    pub fn clear_color_value(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn present(mut self) -> Self {
        self.present_after = true;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PassPipelineDesc) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
}

/// 编译后的 pass：native render pass + 每个 swapchain image 一个 framebuffer
///
/// 每次 swapchain (重)建编译一次，每帧绘制一次
pub struct CompiledPass {
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    pipeline: Option<GraphicsPipeline>,
    /// pipeline layout 引用的 set layout，与 pipeline 同生命周期
    _descriptor_set_layout: Option<GfxDescriptorSetLayout>,
    /// 反射出的 push constant stage 集合，cmd_push_constants 必须与之一致
    push_constant_stages: vk::ShaderStageFlags,

    clear_values: Vec<vk::ClearValue>,

    device: Rc<GfxDevice>,
}

// init & destroy
impl CompiledPass {
    /// 按声明合成 attachment description / subpass / dependency 并编译
    ///
    /// attachment 在 native pass 中的顺序：color..，resolve?，depth?
    pub fn compile(
        device: Rc<GfxDevice>,
        desc: &PassDesc,
        pool: &crate::attachment::AttachmentPool,
        swapchain_image_count: usize,
        extent: vk::Extent2D,
    ) -> Result<Self, GfxError> {
        let _span = tracy_client::span!("CompiledPass::compile");

        let mut attachment_descs = Vec::new();
        let mut attachment_indices = Vec::new();
        let mut clear_values = Vec::new();

        // color attachments
        let mut color_refs = Vec::new();
        for pass_att in &desc.color_attachments {
            let final_layout = if desc.present_after && pool.desc(pass_att.attachment).is_swapchain_backed() {
                vk::ImageLayout::PRESENT_SRC_KHR
            } else {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            };
            let initial_layout = if pass_att.load_op == vk::AttachmentLoadOp::LOAD {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::UNDEFINED
            };

            color_refs.push(
                vk::AttachmentReference::default()
                    .attachment(attachment_descs.len() as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
            attachment_descs.push(
                vk::AttachmentDescription::default()
                    .format(pool.format(pass_att.attachment))
                    .samples(pool.samples(pass_att.attachment))
                    .load_op(pass_att.load_op)
                    .store_op(pass_att.store_op)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(initial_layout)
                    .final_layout(final_layout),
            );
            attachment_indices.push(pass_att.attachment);
            // load op 不是 CLEAR 的槽位也要占位，clear value 按下标对应
            clear_values.push(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: desc.clear_color,
                },
            });
        }

        // MSAA resolve 目标
        let mut resolve_refs = Vec::new();
        if let Some(resolve) = desc.resolve_attachment {
            let final_layout = if desc.present_after && pool.desc(resolve).is_swapchain_backed() {
                vk::ImageLayout::PRESENT_SRC_KHR
            } else {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            };
            resolve_refs.push(
                vk::AttachmentReference::default()
                    .attachment(attachment_descs.len() as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
            attachment_descs.push(
                vk::AttachmentDescription::default()
                    .format(pool.format(resolve))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(final_layout),
            );
            attachment_indices.push(resolve);
            clear_values.push(vk::ClearValue::default());
        }

        // depth-stencil attachment
        let mut depth_ref = vk::AttachmentReference::default();
        if let Some(depth) = &desc.depth_stencil {
            let initial_layout = if depth.load_op == vk::AttachmentLoadOp::LOAD {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::UNDEFINED
            };
            depth_ref = vk::AttachmentReference::default()
                .attachment(attachment_descs.len() as u32)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
            attachment_descs.push(
                vk::AttachmentDescription::default()
                    .format(pool.format(depth.attachment))
                    .samples(pool.samples(depth.attachment))
                    .load_op(depth.load_op)
                    .store_op(depth.store_op)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(initial_layout)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            attachment_indices.push(depth.attachment);
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: desc.clear_depth,
                    stencil: desc.clear_stencil,
                },
            });
        }

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if desc.depth_stencil.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        // EXTERNAL -> 0 依赖，序列化 color/depth 的 read-after-write
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            )
            .src_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachment_descs)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));
        let render_pass = unsafe { device.create_render_pass(&render_pass_info, None).unwrap() };
        device.set_object_debug_name(render_pass, format!("{}-render-pass", desc.name));

        // 每个 swapchain image 一个 framebuffer
        let framebuffers = (0..swapchain_image_count)
            .map(|image_index| {
                let views = attachment_indices.iter().map(|att| pool.view(*att, image_index)).collect_vec();
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(&views)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None).unwrap() };
                device.set_object_debug_name(framebuffer, format!("{}-framebuffer-{image_index}", desc.name));
                framebuffer
            })
            .collect_vec();

        // pipeline（结构性 pass 没有）
        let (pipeline, descriptor_set_layout, push_constant_stages) = match &desc.pipeline {
            None => (None, None, vk::ShaderStageFlags::empty()),
            Some(pipeline_desc) => {
                let reflection = ShaderReflection::load(&pipeline_desc.reflection)?;
                let set_layout = GfxDescriptorSetLayout::new(
                    device.clone(),
                    &reflection.descriptor_set_layout_bindings(),
                    &format!("{}-set-layout", desc.name),
                );
                let push_ranges = reflection.push_constant_ranges();
                let push_constant_stages = push_ranges
                    .iter()
                    .fold(vk::ShaderStageFlags::empty(), |acc, range| acc | range.stage_flags);
                let pipeline_layout = Rc::new(PipelineLayout::new(
                    device.clone(),
                    &[set_layout.handle()],
                    &push_ranges,
                    format!("{}-pipeline-layout", desc.name),
                ));

                let create_info = GraphicsPipelineCreateInfo {
                    shader_stages: pipeline_desc
                        .shader_stages
                        .iter()
                        .map(|s| ShaderStageInfo {
                            stage: s.stage,
                            path: s.path.clone(),
                        })
                        .collect_vec(),
                    vertex_binding_desc: reflection.vertex_binding_descs(),
                    vertex_attribute_desc: reflection.vertex_attribute_descs(),
                    primitive_topology: pipeline_desc.primitive_topology,
                    cull_mode: pipeline_desc.cull_mode,
                    msaa_samples: desc
                        .color_attachments
                        .first()
                        .map(|att| pool.samples(att.attachment))
                        .unwrap_or(vk::SampleCountFlags::TYPE_1),
                    color_attachment_count: desc.color_attachments.len(),
                    enable_depth_test: pipeline_desc.enable_depth_test,
                    enable_depth_write: pipeline_desc.enable_depth_write,
                };
                let pipeline = GraphicsPipeline::new(
                    device.clone(),
                    &create_info,
                    render_pass,
                    0,
                    pipeline_layout,
                    &format!("{}-pipeline", desc.name),
                )?;
                (Some(pipeline), Some(set_layout), push_constant_stages)
            }
        };

        Ok(Self {
            render_pass,
            framebuffers,
            pipeline,
            _descriptor_set_layout: descriptor_set_layout,
            push_constant_stages,
            clear_values,
            device,
        })
    }
}

// getters
impl CompiledPass {
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index]
    }

    #[inline]
    pub fn pipeline(&self) -> Option<&GraphicsPipeline> {
        self.pipeline.as_ref()
    }

    #[inline]
    pub fn push_constant_stages(&self) -> vk::ShaderStageFlags {
        self.push_constant_stages
    }

    #[inline]
    pub fn clear_values(&self) -> &[vk::ClearValue] {
        &self.clear_values
    }
}

impl Drop for CompiledPass {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(*framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
