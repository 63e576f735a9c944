use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    error::GfxError,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    pipelines::shader::{ShaderModule, ShaderStageInfo},
};

pub struct PipelineLayout {
    handle: vk::PipelineLayout,
    device: Rc<GfxDevice>,
}

impl PipelineLayout {
    pub fn new(
        device: Rc<GfxDevice>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        debug_name: impl AsRef<str>,
    ) -> Self {
        let pipeline_layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let handle = unsafe { device.create_pipeline_layout(&pipeline_layout_create_info, None).unwrap() };
        let layout = PipelineLayout { handle, device };
        layout.device.set_debug_name(&layout, debug_name);
        layout
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.handle, None);
        }
    }
}

impl DebugType for PipelineLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// graphics pipeline 的创建参数
pub struct GraphicsPipelineCreateInfo {
    pub shader_stages: Vec<ShaderStageInfo>,

    pub vertex_binding_desc: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attribute_desc: Vec<vk::VertexInputAttributeDescription>,

    pub primitive_topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,

    pub msaa_samples: vk::SampleCountFlags,

    pub color_attachment_count: usize,
    pub enable_depth_test: bool,
    pub enable_depth_write: bool,
}

impl Default for GraphicsPipelineCreateInfo {
    fn default() -> Self {
        Self {
            shader_stages: vec![],
            vertex_binding_desc: vec![],
            vertex_attribute_desc: vec![],
            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            msaa_samples: vk::SampleCountFlags::TYPE_1,
            color_attachment_count: 1,
            enable_depth_test: true,
            enable_depth_write: true,
        }
    }
}

pub struct GraphicsPipeline {
    pipeline: vk::Pipeline,

    /// 因为多个 pipeline 可以使用同一个 pipeline layout，所以这里使用 Rc
    pipeline_layout: Rc<PipelineLayout>,

    device: Rc<GfxDevice>,
}

impl GraphicsPipeline {
    const SHADER_ENTRY: &'static CStr = c"main";

    /// 基于 classic render pass 创建 graphics pipeline
    ///
    /// viewport/scissor 是 dynamic state，随每帧录制时设置，
    /// 因此 pipeline 不需要随 swapchain extent 重建。
    pub fn new(
        device: Rc<GfxDevice>,
        create_info: &GraphicsPipelineCreateInfo,
        render_pass: vk::RenderPass,
        subpass: u32,
        pipeline_layout: Rc<PipelineLayout>,
        debug_name: &str,
    ) -> Result<Self, GfxError> {
        let _span = tracy_client::span!("GraphicsPipeline::new");

        let shader_modules = create_info
            .shader_stages
            .iter()
            .map(|stage| ShaderModule::new(device.clone(), &stage.path))
            .collect::<Result<Vec<_>, _>>()?;
        let shader_stages_info = create_info
            .shader_stages
            .iter()
            .zip(shader_modules.iter())
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(module.handle())
                    .name(Self::SHADER_ENTRY)
            })
            .collect_vec();

        // 顶点输入
        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&create_info.vertex_binding_desc)
            .vertex_attribute_descriptions(&create_info.vertex_attribute_desc);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(create_info.primitive_topology)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        let rasterization_info = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(create_info.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        // MSAA 配置
        let msaa_info =
            vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(create_info.msaa_samples);

        let depth_stencil_info = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(create_info.enable_depth_test)
            .depth_write_enable(create_info.enable_depth_write)
            .depth_compare_op(vk::CompareOp::LESS);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_attach_blend_states = (0..create_info.color_attachment_count)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect_vec();
        let color_blend_info =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_attach_blend_states);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state_info = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages_info)
            .vertex_input_state(&vertex_input_state_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&rasterization_info)
            .multisample_state(&msaa_info)
            .depth_stencil_state(&depth_stencil_info)
            .color_blend_state(&color_blend_info)
            .dynamic_state(&dynamic_state_info)
            .layout(pipeline_layout.handle())
            .render_pass(render_pass)
            .subpass(subpass);

        let pipeline = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
                .unwrap()[0]
        };

        // shader module 在 pipeline 创建完成后即可释放
        drop(shader_modules);

        let pipeline = Self {
            pipeline,
            pipeline_layout,
            device,
        };
        pipeline.device.set_debug_name(&pipeline, debug_name);
        Ok(pipeline)
    }
}

// getters
impl GraphicsPipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> &Rc<PipelineLayout> {
        &self.pipeline_layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

impl DebugType for GraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}
