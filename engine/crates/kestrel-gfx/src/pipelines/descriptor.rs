use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

/// descriptor set layout 封装
pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
    device: Rc<GfxDevice>,
}

impl GfxDescriptorSetLayout {
    pub fn new(device: Rc<GfxDevice>, bindings: &[vk::DescriptorSetLayoutBinding], debug_name: &str) -> Self {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let handle = unsafe { device.create_descriptor_set_layout(&create_info, None).unwrap() };

        let layout = Self { handle, device };
        layout.device.set_debug_name(&layout, debug_name);
        layout
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}

impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// descriptor pool 封装
///
/// set 随 pool 一起释放，不支持单独 free
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    device: Rc<GfxDevice>,
}

impl GfxDescriptorPool {
    pub fn new(
        device: Rc<GfxDevice>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        debug_name: &str,
    ) -> Self {
        let create_info = vk::DescriptorPoolCreateInfo::default().max_sets(max_sets).pool_sizes(pool_sizes);
        let handle = unsafe { device.create_descriptor_pool(&create_info, None).unwrap() };

        let pool = Self { handle, device };
        pool.device.set_debug_name(&pool, debug_name);
        pool
    }

    /// 为每个 layout 分配一个 descriptor set
    pub fn alloc_sets(&self, layouts: &[&GfxDescriptorSetLayout], debug_name: &str) -> Vec<vk::DescriptorSet> {
        let vk_layouts = layouts.iter().map(|l| l.handle()).collect_vec();
        let alloc_info =
            vk::DescriptorSetAllocateInfo::default().descriptor_pool(self.handle).set_layouts(&vk_layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info).unwrap() };
        for (idx, set) in sets.iter().enumerate() {
            self.device.set_object_debug_name(*set, format!("{debug_name}-{idx}"));
        }
        sets
    }
}

impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.handle, None);
        }
    }
}

impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
