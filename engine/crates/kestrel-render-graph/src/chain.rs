use std::path::Path;

use ash::vk;

use kestrel_scene::render_set::RenderSet;

use crate::{
    attachment::AttachmentDesc,
    pass::{PassAttachment, PassDesc, PassPipelineDesc},
};

/// 默认 pass 链的 attachment 池布局
pub const ATTACHMENT_SCENE_COLOR: usize = 0;
pub const ATTACHMENT_DEPTH: usize = 1;
pub const ATTACHMENT_XRAY_COLOR: usize = 2;
pub const ATTACHMENT_SWAPCHAIN: usize = 3;

pub fn default_attachments(depth_format: vk::Format) -> Vec<AttachmentDesc> {
    vec![
        AttachmentDesc::owned_color("scene-color", vk::Format::B8G8R8A8_SRGB, vk::SampleCountFlags::TYPE_1),
        AttachmentDesc::owned_depth("scene-depth", depth_format, vk::SampleCountFlags::TYPE_1),
        AttachmentDesc::owned_color("xray-color", vk::Format::B8G8R8A8_SRGB, vk::SampleCountFlags::TYPE_1),
        AttachmentDesc::swapchain_backed("swapchain-color"),
    ]
}

/// 引擎默认的 pass 声明顺序：
/// 清屏 → 不透明场景 → x-ray 写入 → x-ray 合成 → 最终合成到 swapchain → UI
///
/// 后面的 pass 以 LOAD 读取前面 pass STORE 的结果，声明顺序即依赖顺序
///
/// # param
/// * shader_dir - 预编译 shader 的根目录，按 `<name>.{vert,frag}.spv` 查找
pub fn default_pass_chain(shader_dir: &Path, clear_color: [f32; 4]) -> Vec<PassDesc> {
    vec![
        // 纯清屏，不绑定 pipeline
        PassDesc::new("background")
            .color(PassAttachment::new(
                ATTACHMENT_SCENE_COLOR,
                vk::AttachmentLoadOp::CLEAR,
                vk::AttachmentStoreOp::STORE,
            ))
            .depth(PassAttachment::new(
                ATTACHMENT_DEPTH,
                vk::AttachmentLoadOp::CLEAR,
                vk::AttachmentStoreOp::STORE,
            ))
            .clear_color_value(clear_color),
        PassDesc::new("opaque-scene")
            .serve(RenderSet::Scene)
            .color(PassAttachment::new(
                ATTACHMENT_SCENE_COLOR,
                vk::AttachmentLoadOp::LOAD,
                vk::AttachmentStoreOp::STORE,
            ))
            .depth(PassAttachment::new(
                ATTACHMENT_DEPTH,
                vk::AttachmentLoadOp::LOAD,
                vk::AttachmentStoreOp::STORE,
            ))
            .with_pipeline(PassPipelineDesc::vs_ps(shader_dir.join("scene"))),
        // x-ray 元素写入独立的 mask attachment，深度只读
        PassDesc::new("xray-write")
            .serve(RenderSet::Xray)
            .color(PassAttachment::new(
                ATTACHMENT_XRAY_COLOR,
                vk::AttachmentLoadOp::CLEAR,
                vk::AttachmentStoreOp::STORE,
            ))
            .depth(PassAttachment::new(
                ATTACHMENT_DEPTH,
                vk::AttachmentLoadOp::LOAD,
                vk::AttachmentStoreOp::DONT_CARE,
            ))
            .with_pipeline({
                let mut pipeline = PassPipelineDesc::vs_ps(shader_dir.join("xray"));
                pipeline.enable_depth_write = false;
                pipeline
            }),
        // 全屏后处理：把 x-ray mask 合成进场景色
        // 通常没有场景元素，桶为空时仍然 begin/end，向后传递 attachment
        PassDesc::new("xray-composite")
            .serve(RenderSet::Postprocess)
            .color(PassAttachment::new(
                ATTACHMENT_SCENE_COLOR,
                vk::AttachmentLoadOp::LOAD,
                vk::AttachmentStoreOp::STORE,
            ))
            .with_pipeline({
                let mut pipeline = PassPipelineDesc::vs_ps(shader_dir.join("xray_composite"));
                pipeline.enable_depth_test = false;
                pipeline.enable_depth_write = false;
                pipeline.cull_mode = vk::CullModeFlags::NONE;
                pipeline
            }),
        // 全屏合成到 swapchain image
        PassDesc::new("final-composite")
            .serve(RenderSet::Postprocess)
            .color(PassAttachment::new(
                ATTACHMENT_SWAPCHAIN,
                vk::AttachmentLoadOp::DONT_CARE,
                vk::AttachmentStoreOp::STORE,
            ))
            .with_pipeline({
                let mut pipeline = PassPipelineDesc::vs_ps(shader_dir.join("composite"));
                pipeline.enable_depth_test = false;
                pipeline.enable_depth_write = false;
                pipeline.cull_mode = vk::CullModeFlags::NONE;
                pipeline
            }),
        // UI 叠加在最终图像之上，之后转换到 PRESENT_SRC
        PassDesc::new("ui")
            .serve(RenderSet::Ui)
            .color(PassAttachment::new(
                ATTACHMENT_SWAPCHAIN,
                vk::AttachmentLoadOp::LOAD,
                vk::AttachmentStoreOp::STORE,
            ))
            .present()
            .with_pipeline({
                let mut pipeline = PassPipelineDesc::vs_ps(shader_dir.join("ui"));
                pipeline.enable_depth_test = false;
                pipeline.enable_depth_write = false;
                pipeline.cull_mode = vk::CullModeFlags::NONE;
                pipeline
            }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::validate_declaration_order;

    #[test]
    fn test_default_chain_declaration_order_is_valid() {
        let passes = default_pass_chain(Path::new("shaders"), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(passes.len(), 6);
        validate_declaration_order(&passes).unwrap();
    }

    #[test]
    fn test_default_chain_ends_with_present() {
        let passes = default_pass_chain(Path::new("shaders"), [0.0, 0.0, 0.0, 1.0]);
        assert!(passes.last().unwrap().present_after);
        // 只有最后一个 pass 做 present 转换
        assert_eq!(passes.iter().filter(|p| p.present_after).count(), 1);
    }
}
