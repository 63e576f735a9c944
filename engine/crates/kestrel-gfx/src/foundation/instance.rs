use std::ffi::{CStr, CString};

use ash::vk;
use itertools::Itertools;

/// Vulkan Instance 封装
pub struct GfxInstance {
    pub(crate) ash_instance: ash::Instance,
}

// 创建与销毁
impl GfxInstance {
    pub fn new(
        vk_entry: &ash::Entry,
        app_name: String,
        engine_name: String,
        extra_instance_exts: Vec<&'static CStr>,
    ) -> Self {
        let app_name = CString::new(app_name.as_str()).unwrap();
        let engine_name = CString::new(engine_name.as_str()).unwrap();
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name.as_c_str())
            .engine_name(engine_name.as_c_str())
            .api_version(vk::API_VERSION_1_3);

        // instance 所需的所有 extension：调用方传入 surface 相关的扩展
        let mut instance_exts = extra_instance_exts.iter().map(|e| e.as_ptr()).collect_vec();
        instance_exts.push(ash::ext::debug_utils::NAME.as_ptr());

        let mut exts_str = String::new();
        for ext in &instance_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance exts: {}", exts_str);

        // debug 构建下开启 validation layer
        let layers = Self::instance_layers().iter().map(|l| l.as_ptr()).collect_vec();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&instance_exts)
            .enabled_layer_names(&layers);

        let ash_instance = unsafe { vk_entry.create_instance(&create_info, None).unwrap() };

        Self { ash_instance }
    }

    pub fn destroy(self) {
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// 创建过程的辅助函数
impl GfxInstance {
    fn instance_layers() -> Vec<&'static CStr> {
        #[cfg(debug_assertions)]
        {
            vec![c"VK_LAYER_KHRONOS_validation"]
        }
        #[cfg(not(debug_assertions))]
        {
            vec![]
        }
    }
}
