use std::path::{Path, PathBuf};
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    error::GfxError,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// shader module 封装
///
/// spv 由外部的 shader 工具链预编译产出，这里只负责读取
pub struct ShaderModule {
    handle: vk::ShaderModule,
    device: Rc<GfxDevice>,
}

impl ShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(device: Rc<GfxDevice>, path: &Path) -> Result<Self, GfxError> {
        let mut file = std::fs::File::open(path).map_err(|e| GfxError::ShaderArtifact {
            path: path.to_path_buf(),
            source: e,
        })?;
        let shader_code = ash::util::read_spv(&mut file).map_err(|e| GfxError::ShaderArtifact {
            path: path.to_path_buf(),
            source: e,
        })?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);
        let shader_module = unsafe { device.create_shader_module(&shader_module_info, None).unwrap() };

        let shader_module = Self {
            handle: shader_module,
            device,
        };
        shader_module.device.set_debug_name(&shader_module, path.to_string_lossy());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}

impl DebugType for ShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// 一个 shader stage 的描述：spv 路径 + stage
pub struct ShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub path: PathBuf,
}

/// shader 反射 sidecar
///
/// 由外部的 shader 工具链随 spv 一起产出的 json 文件，
/// 描述顶点输入布局和 descriptor binding 布局。
/// 这里视作不透明输入，仅做 1:1 的结构转换。
#[derive(Debug, Deserialize)]
pub struct ShaderReflection {
    /// 单个 binding 的顶点数据 stride
    pub vertex_stride: u32,
    #[serde(default)]
    pub inputs: Vec<ReflectedInput>,
    #[serde(default)]
    pub bindings: Vec<ReflectedBinding>,
    #[serde(default)]
    pub push_constants: Vec<ReflectedPushConstant>,
}

#[derive(Debug, Deserialize)]
pub struct ReflectedInput {
    pub location: u32,
    pub format: ReflectedFormat,
    pub offset: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ReflectedFormat {
    R32f,
    Rg32f,
    Rgb32f,
    Rgba32f,
}

impl ReflectedFormat {
    fn vk_format(self) -> vk::Format {
        match self {
            ReflectedFormat::R32f => vk::Format::R32_SFLOAT,
            ReflectedFormat::Rg32f => vk::Format::R32G32_SFLOAT,
            ReflectedFormat::Rgb32f => vk::Format::R32G32B32_SFLOAT,
            ReflectedFormat::Rgba32f => vk::Format::R32G32B32A32_SFLOAT,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReflectedBinding {
    pub binding: u32,
    pub descriptor_type: ReflectedDescriptorType,
    pub stage: ReflectedStage,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ReflectedDescriptorType {
    UniformBuffer,
    CombinedImageSampler,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ReflectedStage {
    Vertex,
    Fragment,
    All,
}

impl ReflectedStage {
    fn vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ReflectedStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ReflectedStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ReflectedStage::All => vk::ShaderStageFlags::ALL_GRAPHICS,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReflectedPushConstant {
    pub stage: ReflectedStage,
    pub offset: u32,
    pub size: u32,
}

impl ShaderReflection {
    /// 从 sidecar json 文件读取反射数据
    pub fn load(path: &Path) -> Result<Self, GfxError> {
        let content = std::fs::read_to_string(path).map_err(|e| GfxError::ShaderArtifact {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| GfxError::ShaderReflection {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn vertex_binding_descs(&self) -> Vec<vk::VertexInputBindingDescription> {
        vec![
            vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(self.vertex_stride)
                .input_rate(vk::VertexInputRate::VERTEX),
        ]
    }

    pub fn vertex_attribute_descs(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.inputs
            .iter()
            .map(|input| {
                vk::VertexInputAttributeDescription::default()
                    .binding(0)
                    .location(input.location)
                    .format(input.format.vk_format())
                    .offset(input.offset)
            })
            .collect_vec()
    }

    pub fn descriptor_set_layout_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings
            .iter()
            .map(|binding| {
                let descriptor_type = match binding.descriptor_type {
                    ReflectedDescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
                    ReflectedDescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                };
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type)
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stage.vk_stage())
            })
            .collect_vec()
    }

    pub fn push_constant_ranges(&self) -> Vec<vk::PushConstantRange> {
        self.push_constants
            .iter()
            .map(|pc| {
                vk::PushConstantRange::default().stage_flags(pc.stage.vk_stage()).offset(pc.offset).size(pc.size)
            })
            .collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflection_sidecar_parse() {
        let json = r#"{
            "vertex_stride": 24,
            "inputs": [
                { "location": 0, "format": "rgb32f", "offset": 0 },
                { "location": 1, "format": "rgb32f", "offset": 12 }
            ],
            "bindings": [
                { "binding": 0, "descriptor_type": "uniform_buffer", "stage": "vertex" }
            ],
            "push_constants": [
                { "stage": "vertex", "offset": 0, "size": 64 }
            ]
        }"#;

        let reflection: ShaderReflection = serde_json::from_str(json).unwrap();

        let attrs = reflection.vertex_attribute_descs();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);

        let bindings = reflection.descriptor_set_layout_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        // 省略 count 时默认为 1
        assert_eq!(bindings[0].descriptor_count, 1);

        let ranges = reflection.push_constant_ranges();
        assert_eq!(ranges[0].size, 64);
    }
}
