use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use kestrel_gfx::{
    commands::{command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool},
    foundation::device::GfxDevice,
};

/// 每张 swapchain image 一个长驻 command buffer
///
/// 渲染分组的内容可能逐帧变化，buffer 每帧重新录制，
/// 不做跨帧的命令缓存。image i 的 buffer 是否可以重录由
/// image 的使用记录（FrameSync）保证。
pub struct FrameCommandBuffers {
    pool: GfxCommandPool,
    buffers: Vec<GfxCommandBuffer>,
    device: Rc<GfxDevice>,
}

// init & destroy
impl FrameCommandBuffers {
    pub fn new(device: Rc<GfxDevice>, pool: GfxCommandPool, swapchain_image_count: usize) -> Self {
        let buffers = Self::alloc_buffers(&device, &pool, swapchain_image_count);
        Self {
            pool,
            buffers,
            device,
        }
    }

    /// swapchain 重建后 image 数量可能变化，重新分配 buffer
    ///
    /// 调用前外部必须已等待 device idle
    pub fn on_swapchain_rebuilt(&mut self, swapchain_image_count: usize) {
        let old = std::mem::take(&mut self.buffers);
        self.pool.free_command_buffers(&old.iter().map(|cmd| cmd.vk_handle()).collect_vec());
        self.buffers = Self::alloc_buffers(&self.device, &self.pool, swapchain_image_count);
    }

    fn alloc_buffers(device: &Rc<GfxDevice>, pool: &GfxCommandPool, count: usize) -> Vec<GfxCommandBuffer> {
        (0..count).map(|i| GfxCommandBuffer::new(device.clone(), pool, &format!("frame-cmd-{i}"))).collect_vec()
    }
}

// getters
impl FrameCommandBuffers {
    #[inline]
    pub fn buffer(&self, image_index: usize) -> &GfxCommandBuffer {
        &self.buffers[image_index]
    }
}

// tools
impl FrameCommandBuffers {
    /// 每帧重录 image 对应的 buffer
    ///
    /// pool 带 RESET_COMMAND_BUFFER，begin 时隐式 reset
    pub fn record(&self, image_index: usize, frame_name: &str, record_fn: impl FnOnce(&GfxCommandBuffer)) {
        let cmd = self.buffer(image_index);
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, frame_name);
        record_fn(cmd);
        cmd.end();
    }
}
