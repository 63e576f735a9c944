use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    resources::allocator::VmemAllocator,
};

/// 手动创建的 2D image + view，用于 color/depth/MSAA attachment
///
/// swapchain image 并非手动创建，不使用该类型。
pub struct GfxImage2D {
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,

    format: vk::Format,
    extent: vk::Extent2D,

    device: Rc<GfxDevice>,
    allocator: Rc<VmemAllocator>,
}

// init & destroy
impl GfxImage2D {
    /// 创建一张 attachment image
    ///
    /// # param
    /// * samples - MSAA 采样数；resolve 目标和普通 attachment 为 TYPE_1
    pub fn new_attachment(
        device: Rc<GfxDevice>,
        allocator: Rc<VmemAllocator>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
        debug_name: &str,
    ) -> Self {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(samples)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (image, allocation) = unsafe { allocator.raw().create_image(&image_info, &alloc_info).unwrap() };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { device.create_image_view(&view_info, None).unwrap() };

        let image = Self {
            image,
            allocation,
            view,
            format,
            extent,
            device,
            allocator,
        };
        image.device.set_debug_name(&image, debug_name);
        image.device.set_object_debug_name(image.view, format!("{debug_name}-view"));
        image
    }
}

// getters
impl GfxImage2D {
    #[inline]
    pub fn vk_image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl DebugType for GfxImage2D {
    fn debug_type_name() -> &'static str {
        "GfxImage2D"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.image
    }
}

impl Drop for GfxImage2D {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.allocator.raw().destroy_image(self.image, &mut self.allocation);
        }
    }
}
