use ash::vk;
use itertools::Itertools;

use crate::commands::{command_buffer::GfxCommandBuffer, semaphore::GfxSemaphore};

/// Gfx 关于 SubmitInfo 的封装，更易用
///
/// 内部持有 wait/signal 的 Vec，保证 vk::SubmitInfo
/// 引用的切片在 submit 调用期间有效。
#[derive(Default)]
pub struct GfxSubmitInfo {
    command_buffers: Vec<vk::CommandBuffer>,
    wait_semaphores: Vec<vk::Semaphore>,
    wait_stages: Vec<vk::PipelineStageFlags>,
    signal_semaphores: Vec<vk::Semaphore>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[GfxCommandBuffer]) -> Self {
        Self {
            command_buffers: commands.iter().map(|cmd| cmd.vk_handle()).collect_vec(),
            wait_semaphores: vec![],
            wait_stages: vec![],
            signal_semaphores: vec![],
        }
    }

    /// builder：提交前等待的 semaphore 以及等待发生的 stage
    #[inline]
    pub fn wait(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags) -> Self {
        self.wait_semaphores.push(semaphore.handle());
        self.wait_stages.push(stage);
        self
    }

    /// builder：提交完成后 signal 的 semaphore
    #[inline]
    pub fn signal(mut self, semaphore: &GfxSemaphore) -> Self {
        self.signal_semaphores.push(semaphore.handle());
        self
    }

    #[inline]
    pub(crate) fn submit_info(&self) -> vk::SubmitInfo<'_> {
        vk::SubmitInfo::default()
            .command_buffers(&self.command_buffers)
            .wait_semaphores(&self.wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .signal_semaphores(&self.signal_semaphores)
    }
}
