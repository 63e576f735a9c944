/// frame slot 的可读标签，用于 debug name 和日志
///
/// 按 slot 顺序取 A、B、C...，随 FIF_COUNT 调整而自动扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLabel(char);

impl FrameLabel {
    pub fn from_usize(slot: usize) -> Self {
        debug_assert!(slot < FrameCounter::FIF_COUNT, "invalid frame slot: {slot}");
        Self((b'A' + slot as u8) as char)
    }
}

impl std::fmt::Display for FrameLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 帧计数器
///
/// frame_id 单调递增；frame slot 由 id 对 FIF 数取模得到，
/// 永远按 `(slot + 1) % F` 前进，任何情况下都不会被重置回 0。
pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
}

// new & init
impl FrameCounter {
    const FIF_COUNT: usize = 2;

    pub fn new() -> Self {
        Self { frame_id: 0 }
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}

// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }

    #[inline]
    pub fn frame_slot(&self) -> usize {
        self.frame_id as usize % Self::FIF_COUNT
    }

    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_slot())
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_advances_round_robin() {
        let mut counter = FrameCounter::new();
        let slots: Vec<usize> = (0..5)
            .map(|_| {
                let slot = counter.frame_slot();
                counter.next_frame();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_frame_id_is_monotonic() {
        let mut counter = FrameCounter::new();
        for expected in 0..100 {
            assert_eq!(counter.frame_id(), expected);
            counter.next_frame();
        }
    }

    #[test]
    fn test_frame_name_format() {
        let mut counter = FrameCounter::new();
        assert_eq!(counter.frame_name(), "[F0A]");
        counter.next_frame();
        assert_eq!(counter.frame_name(), "[F1B]");
        counter.next_frame();
        assert_eq!(counter.frame_name(), "[F2A]");
    }

    #[test]
    fn test_label_covers_every_slot() {
        // 标签由 slot 推导，FIF_COUNT 调整时不需要改标签表
        let labels: Vec<String> = (0..FrameCounter::fif_count()).map(|slot| FrameLabel::from_usize(slot).to_string()).collect();
        assert_eq!(labels.len(), FrameCounter::fif_count());
        for (slot, label) in labels.iter().enumerate() {
            assert_eq!(label.as_bytes(), &[b'A' + slot as u8]);
        }
    }
}
