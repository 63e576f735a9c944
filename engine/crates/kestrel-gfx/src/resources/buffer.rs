use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    resources::allocator::VmemAllocator,
};

/// vk-mem 管理的 buffer 封装
pub struct GfxBuffer {
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
    /// host 可见 buffer 的常驻映射指针
    mapped_ptr: *mut u8,

    allocator: Rc<VmemAllocator>,
}

// init & destroy
impl GfxBuffer {
    fn new(
        device: &GfxDevice,
        allocator: Rc<VmemAllocator>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        alloc_flags: vk_mem::AllocationCreateFlags,
        debug_name: &str,
    ) -> Self {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: alloc_flags,
            ..Default::default()
        };

        let (buffer, allocation) = unsafe { allocator.raw().create_buffer(&buffer_info, &alloc_info).unwrap() };
        let mapped_ptr = allocator.raw().get_allocation_info(&allocation).mapped_data as *mut u8;

        let buffer = Self {
            buffer,
            allocation,
            size,
            mapped_ptr,
            allocator,
        };
        device.set_debug_name(&buffer, debug_name);
        buffer
    }

    /// device local 的 vertex buffer，数据通过 staging buffer 上传
    pub fn new_vertex(device: &GfxDevice, allocator: Rc<VmemAllocator>, size: vk::DeviceSize, name: &str) -> Self {
        Self::new(
            device,
            allocator,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk_mem::AllocationCreateFlags::empty(),
            name,
        )
    }

    /// device local 的 index buffer，数据通过 staging buffer 上传
    pub fn new_index(device: &GfxDevice, allocator: Rc<VmemAllocator>, size: vk::DeviceSize, name: &str) -> Self {
        Self::new(
            device,
            allocator,
            size,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk_mem::AllocationCreateFlags::empty(),
            name,
        )
    }

    /// host 可见并常驻映射的 uniform buffer
    pub fn new_ubo(device: &GfxDevice, allocator: Rc<VmemAllocator>, size: vk::DeviceSize, name: &str) -> Self {
        Self::new(
            device,
            allocator,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk_mem::AllocationCreateFlags::MAPPED | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            name,
        )
    }

    /// host 可见并常驻映射的 staging buffer，用于一次性上传
    pub fn new_staging(device: &GfxDevice, allocator: Rc<VmemAllocator>, size: vk::DeviceSize, name: &str) -> Self {
        Self::new(
            device,
            allocator,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk_mem::AllocationCreateFlags::MAPPED | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            name,
        )
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

// tools
impl GfxBuffer {
    /// 将数据写入常驻映射的内存
    ///
    /// 仅对 MAPPED 创建的 buffer 有效；调用方需要保证
    /// GPU 没有正在读取这段内存（frame slot fence 已经 signal）。
    pub fn write_bytes(&mut self, data: &[u8]) {
        assert!(!self.mapped_ptr.is_null(), "buffer is not host mapped");
        assert!(data.len() as vk::DeviceSize <= self.size);
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped_ptr, data.len());
        }
    }
}

impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.buffer
    }
}

impl Drop for GfxBuffer {
    fn drop(&mut self) {
        unsafe {
            self.allocator.raw().destroy_buffer(self.buffer, &mut self.allocation);
        }
    }
}
