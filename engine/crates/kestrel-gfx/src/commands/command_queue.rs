use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{fence::GfxFence, submit_info::GfxSubmitInfo},
    foundation::device::GfxDevice,
};

/// queue family 信息
#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// 命令队列封装
///
/// queue 本身归属于 device，不需要手动销毁
pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) device: Rc<GfxDevice>,
}

impl GfxCommandQueue {
    pub fn new(device: Rc<GfxDevice>, queue_family: GfxQueueFamily, queue_index: u32) -> Self {
        let vk_queue = unsafe { device.get_device_queue(queue_family.queue_family_index, queue_index) };
        Self {
            vk_queue,
            queue_family,
            device,
        }
    }
}

// getters
impl GfxCommandQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }
}

// tools
impl GfxCommandQueue {
    /// 向 queue 提交命令，可以指定提交完成后 signal 的 fence
    pub fn submit(&self, submit_infos: &[GfxSubmitInfo], signal_fence: Option<&GfxFence>) {
        let submit_infos = submit_infos.iter().map(|info| info.submit_info()).collect_vec();
        unsafe {
            self.device
                .queue_submit(
                    self.vk_queue,
                    &submit_infos,
                    signal_fence.map_or(vk::Fence::null(), |f| f.handle()),
                )
                .unwrap();
        }
    }

    /// 阻塞等待 queue 中所有命令执行完成
    pub fn wait_idle(&self) {
        unsafe {
            self.device.queue_wait_idle(self.vk_queue).unwrap();
        }
    }
}
