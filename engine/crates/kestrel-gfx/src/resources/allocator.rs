use ash::vk;

use crate::foundation::device::GfxDevice;

/// vk-mem 分配器封装
///
/// 必须在 device 销毁之前销毁；所有由它分配的
/// buffer/image 又必须在它销毁之前释放。
pub struct VmemAllocator {
    allocator: Option<vk_mem::Allocator>,
}

impl VmemAllocator {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &GfxDevice) -> Self {
        let create_info = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        let allocator = unsafe { vk_mem::Allocator::new(create_info).unwrap() };
        Self {
            allocator: Some(allocator),
        }
    }

    #[inline]
    pub fn raw(&self) -> &vk_mem::Allocator {
        self.allocator.as_ref().unwrap()
    }
}

impl Drop for VmemAllocator {
    fn drop(&mut self) {
        log::info!("destroying vmem allocator");
        // vk_mem::Allocator 自身的 Drop 会销毁底层 VmaAllocator
        self.allocator.take();
    }
}
