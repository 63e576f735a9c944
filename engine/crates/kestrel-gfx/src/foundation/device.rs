use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::ops::Deref;

use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::DebugType;

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及扩展的函数指针（swapchain、调试工具）。
/// 这些函数指针在应用生命周期中保持不变，可以安全共享。
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 交换链扩展 API
    pub(crate) swapchain: ash::khr::swapchain::Device,
    /// 调试工具扩展 API
    pub(crate) debug_utils: ash::ext::debug_utils::Device,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        queue_create_infos: &[vk::DeviceQueueCreateInfo],
        device_exts: &[&'static CStr],
    ) -> Self {
        let _span = tracy_client::span!("GfxDevice::new");

        let device_exts = device_exts.iter().map(|e| e.as_ptr()).collect_vec();
        let mut exts_str = String::new();
        for ext in &device_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("device exts: {}", exts_str);

        // 设备选择阶段已经确认这些 features 可用
        let features = Self::physical_device_basic_features();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_infos)
            .enabled_extension_names(&device_exts)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(pdevice, &device_create_info, None).unwrap() };

        let vk_swapchain = ash::khr::swapchain::Device::new(instance, &device);
        let vk_debug_utils_device = ash::ext::debug_utils::Device::new(instance, &device);

        Self {
            device,
            swapchain: vk_swapchain,
            debug_utils: vk_debug_utils_device,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        }
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// 创建过程的辅助函数
impl GfxDevice {
    /// 必要的 physical device core features
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true).geometry_shader(true)
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn swapchain_pf(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }
}

// debug-utils
impl GfxDevice {
    /// 为实现了 DebugType 的对象设置 debug name
    pub fn set_debug_name<T: DebugType>(&self, obj: &T, name: impl AsRef<str>) {
        self.set_object_debug_name(obj.vk_handle(), format!("{}::{}", T::debug_type_name(), name.as_ref()));
    }

    /// 为裸的 vk handle 设置 debug name
    pub fn set_object_debug_name<T: vk::Handle>(&self, handle: T, name: impl AsRef<str>) {
        let name = if name.as_ref().is_empty() { "nameless" } else { name.as_ref() };
        let name = CString::new(name).unwrap();
        unsafe {
            self.debug_utils
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default().object_handle(handle).object_name(name.as_c_str()),
                )
                .unwrap();
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        #[cfg(debug_assertions)]
        debug_assert!(!self.destroyed.get(), "GfxDevice already destroyed");

        &self.device
    }
}
