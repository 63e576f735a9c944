use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// surface 封装
///
/// capability 不缓存：resize 之后 current_extent 会变化，
/// 每次重建 swapchain 时重新查询。
pub struct GfxSurface {
    handle: vk::SurfaceKHR,
    pf: ash::khr::surface::Instance,
}

impl GfxSurface {
    pub fn new(gfx: &Gfx, window: &winit::window::Window) -> Self {
        let surface_pf = ash::khr::surface::Instance::new(gfx.vk_entry(), gfx.instance());

        let surface = unsafe {
            ash_window::create_surface(
                gfx.vk_entry(),
                gfx.instance(),
                window.display_handle().unwrap().as_raw(),
                window.window_handle().unwrap().as_raw(),
                None,
            )
            .unwrap()
        };

        let surface = GfxSurface {
            handle: surface,
            pf: surface_pf,
        };
        gfx.device().set_debug_name(&surface, "main");

        surface
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    #[inline]
    pub fn pf(&self) -> &ash::khr::surface::Instance {
        &self.pf
    }

    pub fn capabilities(&self, pdevice: vk::PhysicalDevice) -> vk::SurfaceCapabilitiesKHR {
        unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle).unwrap() }
    }

    pub fn formats(&self, pdevice: vk::PhysicalDevice) -> Vec<vk::SurfaceFormatKHR> {
        unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle).unwrap() }
    }

    pub fn present_modes(&self, pdevice: vk::PhysicalDevice) -> Vec<vk::PresentModeKHR> {
        unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle).unwrap() }
    }
}

impl Drop for GfxSurface {
    fn drop(&mut self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
