use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::{commands::command_queue::GfxQueueFamily, error::GfxError};

/// 表示一张物理显卡
///
/// 持有设备选择时采集的 capability 快照：properties、features、
/// 支持的 extensions 以及 queue family 信息。
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 支持的 features
    pub(crate) features: vk::PhysicalDeviceFeatures,

    /// 当前 gpu 支持的 device extensions
    pub(crate) device_extensions: Vec<vk::ExtensionProperties>,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) _mem_props: vk::PhysicalDeviceMemoryProperties,

    pub(crate) gfx_queue_family: GfxQueueFamily,
    pub(crate) compute_queue_family: Option<GfxQueueFamily>,
    pub(crate) transfer_queue_family: Option<GfxQueueFamily>,
}

impl GfxPhysicalDevice {
    /// 设备必须支持的 extensions
    pub fn required_device_exts() -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME]
    }

    /// 按枚举顺序选择第一张满足必要 capability 集合的显卡
    ///
    /// 必要条件：全部 required extensions、anisotropic sampling、
    /// geometry shader、graphics queue family。没有满足条件的显卡
    /// 属于环境不满足，调用方应当直接终止进程。
    pub fn new_suitable_physical_device(instance: &ash::Instance) -> Result<Self, GfxError> {
        let _span = tracy_client::span!("GfxPhysicalDevice::new_suitable_physical_device");

        unsafe {
            instance
                .enumerate_physical_devices()
                .unwrap()
                .iter()
                .filter_map(|pdevice| GfxPhysicalDevice::new(*pdevice, instance))
                .find(GfxPhysicalDevice::is_suitable)
                .ok_or(GfxError::NoSuitableDevice)
        }
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> Option<Self> {
        unsafe {
            let basic_props = instance.get_physical_device_properties(pdevice);
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?}", physical_device_name);

            let features = instance.get_physical_device_features(pdevice);
            let mem_props = instance.get_physical_device_memory_properties(pdevice);

            // 找到当前 gpu 支持的 extensions
            let device_extensions = instance.enumerate_device_extension_properties(pdevice).unwrap();
            let device_extension_strs = device_extensions
                .iter()
                .map(|ext| {
                    let ext_name = CStr::from_ptr(ext.extension_name.as_ptr());
                    ext_name.to_str().unwrap().to_string()
                })
                .join("\n");
            log::debug!("physical device supports extensions: {}", device_extension_strs);

            // 找到所有的队列信息
            let queue_family_props = instance.get_physical_device_queue_family_properties(pdevice);
            log::debug!("physical device: queue family props:\n{:#?}", queue_family_props);

            // 找到符合条件的 queue family
            let find_queue_family = |name: &str, include_flags: vk::QueueFlags, exclude_flags: vk::QueueFlags| {
                queue_family_props
                    .iter()
                    .enumerate()
                    .find(|(_, props)| {
                        props.queue_flags.contains(include_flags) && (props.queue_flags & exclude_flags).is_empty()
                    })
                    .map(|(family_idx, props)| GfxQueueFamily {
                        name: name.to_string(),
                        queue_family_index: family_idx as u32,
                        queue_flags: props.queue_flags,
                        queue_count: props.queue_count,
                    })
            };

            // 全能的 Queue：graphics, compute, transfer。present 能力在
            // surface 创建之后校验，绝大多数驱动上 graphics family 都支持
            let gfx_queue_family = find_queue_family(
                "gfx",
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                vk::QueueFlags::empty(),
            )?;

            // Compute Only
            let compute_queue_family = find_queue_family(
                "compute-only",
                vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS,
            );

            // Transfer Only
            let transfer_queue_family = find_queue_family(
                "transfer-only",
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
            );

            Some(Self {
                vk_handle: pdevice,
                features,
                device_extensions,
                basic_props,
                _mem_props: mem_props,
                gfx_queue_family,
                compute_queue_family,
                transfer_queue_family,
            })
        }
    }

    pub fn destroy(self) {
        // physical device 没有需要销毁的资源
    }
}

// 设备筛选
impl GfxPhysicalDevice {
    /// 必要的 capability 集合是否全部满足
    fn is_suitable(&self) -> bool {
        let name = unsafe { CStr::from_ptr(self.basic_props.device_name.as_ptr()) };

        if self.features.sampler_anisotropy == vk::FALSE {
            log::info!("gpu {:?} rejected: no sampler anisotropy", name);
            return false;
        }
        if self.features.geometry_shader == vk::FALSE {
            log::info!("gpu {:?} rejected: no geometry shader", name);
            return false;
        }
        if !self.supports_extensions(&Self::required_device_exts()) {
            log::info!("gpu {:?} rejected: missing required device extensions", name);
            return false;
        }

        log::info!("select gpu: {:?}", name);
        true
    }

    fn supports_extensions(&self, required: &[&'static CStr]) -> bool {
        required.iter().all(|req| {
            self.device_extensions
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == *req)
        })
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }

    #[inline]
    pub fn gpu_name(&self) -> String {
        unsafe { CStr::from_ptr(self.basic_props.device_name.as_ptr()).to_string_lossy().into_owned() }
    }

    /// uniform buffer 的 descriptor 更新时，offset 必须是这个值的整数倍
    #[inline]
    pub fn min_ubo_offset_align(&self) -> vk::DeviceSize {
        self.basic_props.limits.min_uniform_buffer_offset_alignment
    }
}
