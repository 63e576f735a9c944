use std::rc::Rc;

use ash::vk;

use kestrel_gfx::{
    foundation::device::GfxDevice,
    resources::{allocator::VmemAllocator, image::GfxImage2D},
};

/// attachment 的两类来源：自建 image，或 swapchain 提供的 image
///
/// 用封闭的 tagged enum 表达，而不是继承层次
pub enum AttachmentKind {
    OwnedColor {
        format: vk::Format,
        samples: vk::SampleCountFlags,
    },
    OwnedDepth {
        format: vk::Format,
        samples: vk::SampleCountFlags,
    },
    /// 格式与 view 都来自 swapchain，每个 swapchain image 一个 view
    SwapchainBacked,
}

pub struct AttachmentDesc {
    pub name: String,
    pub kind: AttachmentKind,
}

impl AttachmentDesc {
    pub fn owned_color(name: impl Into<String>, format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::OwnedColor { format, samples },
        }
    }

    pub fn owned_depth(name: impl Into<String>, format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::OwnedDepth { format, samples },
        }
    }

    pub fn swapchain_backed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::SwapchainBacked,
        }
    }

    #[inline]
    pub fn is_depth(&self) -> bool {
        matches!(self.kind, AttachmentKind::OwnedDepth { .. })
    }

    #[inline]
    pub fn is_swapchain_backed(&self) -> bool {
        matches!(self.kind, AttachmentKind::SwapchainBacked)
    }
}

/// 所有 pass 共享的 attachment 池，pass 通过下标引用其中的条目
///
/// 自建 image 的实际资源随 swapchain 尺寸重建；
/// swapchain view 由外部在每次重建后注入
pub struct AttachmentPool {
    descs: Vec<AttachmentDesc>,

    /// 与 descs 平行；SwapchainBacked 条目恒为 None
    owned_images: Vec<Option<GfxImage2D>>,
    swapchain_views: Vec<vk::ImageView>,
    swapchain_format: vk::Format,
    extent: vk::Extent2D,
}

// new & init
impl AttachmentPool {
    pub fn new(descs: Vec<AttachmentDesc>) -> Self {
        let owned_images = descs.iter().map(|_| None).collect();
        Self {
            descs,
            owned_images,
            swapchain_views: Vec::new(),
            swapchain_format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
        }
    }

    /// 在 swapchain (重)建之后重建所有自建 attachment
    pub fn rebuild(
        &mut self,
        device: &Rc<GfxDevice>,
        allocator: &Rc<VmemAllocator>,
        extent: vk::Extent2D,
        swapchain_format: vk::Format,
        swapchain_views: &[vk::ImageView],
    ) {
        let _span = tracy_client::span!("AttachmentPool::rebuild");

        self.destroy_images();
        self.extent = extent;
        self.swapchain_format = swapchain_format;
        self.swapchain_views = swapchain_views.to_vec();

        for (desc, slot) in self.descs.iter().zip(self.owned_images.iter_mut()) {
            *slot = match &desc.kind {
                AttachmentKind::OwnedColor { format, samples } => Some(GfxImage2D::new_attachment(
                    device.clone(),
                    allocator.clone(),
                    extent,
                    *format,
                    *samples,
                    vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                    vk::ImageAspectFlags::COLOR,
                    &desc.name,
                )),
                AttachmentKind::OwnedDepth { format, samples } => Some(GfxImage2D::new_attachment(
                    device.clone(),
                    allocator.clone(),
                    extent,
                    *format,
                    *samples,
                    vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                    vk::ImageAspectFlags::DEPTH,
                    &desc.name,
                )),
                AttachmentKind::SwapchainBacked => None,
            };
        }
    }

    /// 释放所有与 swapchain 尺寸相关的资源；调用前外部必须已等待 device idle
    pub fn destroy_images(&mut self) {
        for slot in &mut self.owned_images {
            *slot = None;
        }
        self.swapchain_views.clear();
    }
}

// getters
impl AttachmentPool {
    #[inline]
    pub fn desc(&self, attachment: usize) -> &AttachmentDesc {
        &self.descs[attachment]
    }

    #[inline]
    pub fn attachment_count(&self) -> usize {
        self.descs.len()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self, attachment: usize) -> vk::Format {
        match &self.descs[attachment].kind {
            AttachmentKind::OwnedColor { format, .. } | AttachmentKind::OwnedDepth { format, .. } => *format,
            AttachmentKind::SwapchainBacked => self.swapchain_format,
        }
    }

    pub fn samples(&self, attachment: usize) -> vk::SampleCountFlags {
        match &self.descs[attachment].kind {
            AttachmentKind::OwnedColor { samples, .. } | AttachmentKind::OwnedDepth { samples, .. } => *samples,
            AttachmentKind::SwapchainBacked => vk::SampleCountFlags::TYPE_1,
        }
    }

    /// 取得 attachment 在指定 swapchain image 下的 view
    ///
    /// 自建 attachment 的 view 与 image index 无关
    pub fn view(&self, attachment: usize, image_index: usize) -> vk::ImageView {
        match &self.descs[attachment].kind {
            AttachmentKind::SwapchainBacked => self.swapchain_views[image_index],
            _ => self.owned_images[attachment].as_ref().unwrap_or_else(|| panic!("attachment {attachment} not built")).view(),
        }
    }
}
