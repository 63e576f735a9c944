use std::rc::Rc;

use kestrel_gfx::{
    commands::{fence::GfxFence, semaphore::GfxSemaphore},
    foundation::device::GfxDevice,
};

use crate::frame_counter::{FrameCounter, FrameLabel};

/// 单个 frame slot 的同步对象
///
/// CPU 在 in_flight fence signal 之前不得复用该 slot 的
/// command buffer 和 uniform 数据
pub struct FrameSlotSync {
    pub image_available: GfxSemaphore,
    pub render_finished: GfxSemaphore,
    pub in_flight: GfxFence,
}

impl FrameSlotSync {
    fn new(device: &Rc<GfxDevice>, label: FrameLabel) -> Self {
        Self {
            image_available: GfxSemaphore::new(device.clone(), &format!("image-available-{label}")),
            render_finished: GfxSemaphore::new(device.clone(), &format!("render-finished-{label}")),
            // 初始 signaled，第一帧的 WAIT_SLOT_FENCE 直接通过
            in_flight: GfxFence::new(device.clone(), true, &format!("in-flight-{label}")),
        }
    }
}

/// frame slot 同步对象集合 + 每张 swapchain image 的使用记录
pub struct FrameSync {
    slots: Vec<FrameSlotSync>,

    /// 每张 swapchain image 记录最后一次向它提交的 frame slot。
    /// 与 slot fence 是两套独立的记录：acquire 到的 image 如果仍被
    /// **另一个** slot 的未完成提交占用，需要额外等待那个 slot 的 fence。
    images_in_flight: Vec<Option<usize>>,
}

// new & init
impl FrameSync {
    pub fn new(device: &Rc<GfxDevice>, swapchain_image_count: usize) -> Self {
        let slots = (0..FrameCounter::fif_count()).map(|i| FrameSlotSync::new(device, FrameLabel::from_usize(i))).collect();
        Self {
            slots,
            images_in_flight: vec![None; swapchain_image_count],
        }
    }

    /// swapchain 重建之后 image 集合全部是新的，使用记录清空。
    /// slot 的同步对象与 swapchain 尺寸无关，不重建。
    pub fn on_swapchain_rebuilt(&mut self, swapchain_image_count: usize) {
        self.images_in_flight = vec![None; swapchain_image_count];
    }
}

// getters
impl FrameSync {
    #[inline]
    pub fn slot(&self, slot: usize) -> &FrameSlotSync {
        &self.slots[slot]
    }
}

// tools
impl FrameSync {
    /// acquire 到 image 之后调用：如果该 image 仍被其他 slot 的
    /// 未完成提交占用，等待那个 slot 的 fence，然后把 image
    /// 标记为归当前 slot 所有
    pub fn wait_image_released(&mut self, image_index: usize, current_slot: usize) {
        if let Some(other_slot) = image_wait_slot(&self.images_in_flight, image_index, current_slot) {
            let _span = tracy_client::span!("FrameSync::wait_image_released");
            self.slots[other_slot].in_flight.wait();
        }
        self.images_in_flight[image_index] = Some(current_slot);
    }
}

/// 判断 acquire 到的 image 是否需要额外等待
///
/// 返回 Some(slot) 表示 image 仍被另一个 slot 的提交占用；
/// 占用者就是当前 slot 时，WAIT_SLOT_FENCE 已经等过了，无需重复等待
pub fn image_wait_slot(images_in_flight: &[Option<usize>], image_index: usize, current_slot: usize) -> Option<usize> {
    match images_in_flight[image_index] {
        Some(slot) if slot != current_slot => Some(slot),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_wait_slot_routing() {
        // image 0 被 slot 1 占用，slot 0 acquire 到它时需要等 slot 1
        let images = vec![Some(1), None, Some(0)];
        assert_eq!(image_wait_slot(&images, 0, 0), Some(1));
        // 从未被使用过的 image 无需等待
        assert_eq!(image_wait_slot(&images, 1, 0), None);
        // 占用者就是当前 slot，slot fence 已经等过
        assert_eq!(image_wait_slot(&images, 2, 0), None);
    }

    /// 用纯数据模拟帧循环，验证调度不变量：
    /// 每个 slot 复用前 fence 一定被等待过，且任意时刻未完成的提交不超过 F
    #[test]
    fn test_scheduler_invariants_over_simulated_loop() {
        const F: usize = 2;
        let image_count = 3;

        let mut counter = FrameCounter::new();
        let mut images_in_flight: Vec<Option<usize>> = vec![None; image_count];
        // fence 状态：true 表示 signaled；初始 signaled
        let mut fence_signaled = [true; F];
        let mut outstanding = 0usize;

        for frame in 0..50u64 {
            let slot = counter.frame_slot();
            assert_eq!(slot, (frame % F as u64) as usize);

            // WAIT_SLOT_FENCE：等待即消费一次 GPU 完成
            if !fence_signaled[slot] {
                fence_signaled[slot] = true;
                outstanding -= 1;
            }

            // ACQUIRE：轮转取 image
            let image_index = (frame % image_count as u64) as usize;

            // WAIT_IMAGE_FENCE（可选）
            if let Some(other) = image_wait_slot(&images_in_flight, image_index, slot) {
                if !fence_signaled[other] {
                    fence_signaled[other] = true;
                    outstanding -= 1;
                }
            }
            images_in_flight[image_index] = Some(slot);

            // SUBMIT：reset 之前 fence 必须处于 signaled 状态，否则等待被跳过了
            assert!(fence_signaled[slot], "slot {slot} fence-wait skipped at frame {frame}");
            fence_signaled[slot] = false;
            outstanding += 1;
            assert!(outstanding <= F, "more than {F} submissions outstanding");

            // ADVANCE
            counter.next_frame();
        }
    }

    /// 模拟 Recreation：计数器跨越重建继续 (slot+1) % F，不回到 0
    #[test]
    fn test_recreation_does_not_reset_slot_counter() {
        let mut counter = FrameCounter::new();
        let mut images_in_flight: Vec<Option<usize>> = vec![None; 3];

        for _ in 0..3 {
            counter.next_frame();
        }
        let slot_before = counter.frame_slot();
        assert_eq!(slot_before, 1);

        // surface out of date：swapchain 重建，image 使用记录清空
        images_in_flight.iter_mut().for_each(|slot| *slot = None);
        images_in_flight.resize(4, None);

        // 重建后从 WAIT_SLOT_FENCE 继续，slot 不变，下一帧照常前进
        assert_eq!(counter.frame_slot(), slot_before);
        counter.next_frame();
        assert_eq!(counter.frame_slot(), (slot_before + 1) % FrameCounter::fif_count());
        // 新的 image 全部无占用记录
        assert!(images_in_flight.iter().all(|slot| slot.is_none()));
    }
}
