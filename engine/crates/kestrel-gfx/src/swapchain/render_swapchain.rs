use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    foundation::device::GfxDevice,
    gfx::Gfx,
    swapchain::surface::GfxSurface,
};

/// acquire/present 的结果
///
/// OutOfDate 与 Suboptimal 是预期内的可恢复状态，
/// 由上层的帧状态机走 Recreation 路径处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// swapchain 创建参数
#[derive(Clone, Copy)]
pub struct SwapchainSettings {
    /// 期望的画布大小，会被 clamp 到 surface capability 范围内
    pub requested_extent: vk::Extent2D,
    /// true 时使用阻塞的 FIFO 模式
    pub vsync: bool,
}

pub struct RenderSwapchain {
    device: Rc<GfxDevice>,
    swapchain_handle: vk::SwapchainKHR,

    /// 这里的 image 并非手动创建的，因此无法使用 GfxImage2D 类型
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    color_format: vk::Format,
    extent: vk::Extent2D,
}

// 首选的 surface format
const PREFERRED_SURFACE_FORMATS: [vk::SurfaceFormatKHR; 2] = [
    vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
];

// constructor
impl RenderSwapchain {
    pub fn new(gfx: &Gfx, surface: &GfxSurface, settings: &SwapchainSettings) -> Self {
        let _span = tracy_client::span!("RenderSwapchain::new");

        let pdevice = gfx.physical_device().handle();
        let capabilities = surface.capabilities(pdevice);

        let surface_format = choose_surface_format(&surface.formats(pdevice), &PREFERRED_SURFACE_FORMATS);
        let present_mode = choose_present_mode(&surface.present_modes(pdevice), settings.vsync);
        let extent = clamp_extent(&capabilities, settings.requested_extent);

        log::info!(
            "create swapchain: format {:?}, present mode {:?}, extent {}x{}",
            surface_format.format,
            present_mode,
            extent.width,
            extent.height
        );

        let swapchain_handle =
            Self::create_swapchain(gfx, surface, &capabilities, surface_format, extent, present_mode);

        let device = gfx.device().clone();
        let images = unsafe { device.swapchain_pf().get_swapchain_images(swapchain_handle).unwrap() };
        for (img_idx, img) in images.iter().enumerate() {
            device.set_object_debug_name(*img, format!("swapchain-image-{img_idx}"));
        }
        let image_views = images
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(*img)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = unsafe { device.create_image_view(&view_info, None).unwrap() };
                device.set_object_debug_name(view, format!("swapchain-view-{idx}"));
                view
            })
            .collect_vec();

        Self {
            device,
            swapchain_handle,
            images,
            image_views,
            extent,
            color_format: surface_format.format,
        }
    }

    fn create_swapchain(
        gfx: &Gfx,
        surface: &GfxSurface,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        extent: vk::Extent2D,
        present_mode: vk::PresentModeKHR,
    ) -> vk::SwapchainKHR {
        // 确定 image count
        // max_image_count == 0，表示不限制 image 数量
        let image_count = if capabilities.max_image_count == 0 {
            capabilities.min_image_count + 1
        } else {
            u32::min(capabilities.max_image_count, capabilities.min_image_count + 1)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        unsafe {
            let swapchain_handle = gfx.device().swapchain_pf().create_swapchain(&create_info, None).unwrap();
            gfx.device().set_object_debug_name(swapchain_handle, "main");

            swapchain_handle
        }
    }
}

// getters
impl RenderSwapchain {
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn image(&self, image_index: usize) -> vk::Image {
        self.images[image_index]
    }

    #[inline]
    pub fn image_view(&self, image_index: usize) -> vk::ImageView {
        self.image_views[image_index]
    }
}

// acquire & present
impl RenderSwapchain {
    /// 获取下一张可用的 image
    ///
    /// OUT_OF_DATE 时 semaphore 不会被 signal，调用方应当直接走
    /// Recreation；SUBOPTIMAL 时 image 已被成功获取，semaphore 会被
    /// signal，调用方应当先消费它完成本帧，再安排重建。
    pub fn acquire_next_image(&self, semaphore: &GfxSemaphore) -> (SwapchainStatus, u32) {
        let result = unsafe {
            self.device.swapchain_pf().acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, false)) => (SwapchainStatus::Optimal, image_index),
            Ok((image_index, true)) => (SwapchainStatus::Suboptimal, image_index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => (SwapchainStatus::OutOfDate, 0),
            Err(e) => panic!("failed to acquire swapchain image: {e}"),
        }
    }

    /// 提交 present 请求
    pub fn present_image(
        &self,
        queue: &GfxCommandQueue,
        image_index: u32,
        wait_semaphore: &GfxSemaphore,
    ) -> SwapchainStatus {
        let wait_semaphores = [wait_semaphore.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { self.device.swapchain_pf().queue_present(queue.handle(), &present_info) };
        match result {
            Ok(false) => SwapchainStatus::Optimal,
            Ok(true) => SwapchainStatus::Suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => SwapchainStatus::OutOfDate,
            Err(e) => panic!("failed to present swapchain image: {e}"),
        }
    }
}

impl Drop for RenderSwapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.device.swapchain_pf().destroy_swapchain(self.swapchain_handle, None);
        }
    }
}

/// 选择 surface format：第一个与 preferred 完全匹配的，否则第一个可用的
pub(crate) fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: &[vk::SurfaceFormatKHR],
) -> vk::SurfaceFormatKHR {
    preferred
        .iter()
        .find(|p| available.iter().any(|a| a.format == p.format && a.color_space == p.color_space))
        .or_else(|| available.first())
        .copied()
        .expect("surface reports no formats")
}

/// 选择 present mode
///
/// 不要求 vsync 时优先低延迟非阻塞的模式；FIFO 是规范保证可用的兜底。
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| available.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// 将期望的 extent clamp 到 surface capability 范围内
///
/// current_extent 为 u32::MAX 时表示由 swapchain 自己决定大小
pub(crate) fn clamp_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: requested.width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: requested.height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn test_choose_surface_format_prefers_exact_match() {
        let available = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&available, &PREFERRED_SURFACE_FORMATS);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        // 没有任何 preferred 格式时，使用第一个可用的
        let available = vec![
            surface_format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            surface_format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::HDR10_ST2084_EXT),
        ];
        let chosen = choose_surface_format(&available, &PREFERRED_SURFACE_FORMATS);
        assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn test_choose_present_mode() {
        let available = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&available, false), vk::PresentModeKHR::MAILBOX);
        // vsync 时永远是 FIFO
        assert_eq!(choose_present_mode(&available, true), vk::PresentModeKHR::FIFO);
        // MAILBOX 不可用时退回 IMMEDIATE，再退回 FIFO
        let fifo_only = vec![vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&fifo_only, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_clamp_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D {
                width: 2048,
                height: 2048,
            },
            ..Default::default()
        };

        let clamped = clamp_extent(
            &capabilities,
            vk::Extent2D {
                width: 4000,
                height: 32,
            },
        );
        assert_eq!(clamped.width, 2048);
        assert_eq!(clamped.height, 64);
    }

    #[test]
    fn test_clamp_extent_uses_current_when_fixed() {
        // current_extent 固定时忽略请求值
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let clamped = clamp_extent(
            &capabilities,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!((clamped.width, clamped.height), (800, 600));
    }
}
