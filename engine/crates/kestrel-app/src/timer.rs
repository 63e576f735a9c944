/// 帧时间统计
#[derive(Debug)]
pub struct Timer {
    start_time: std::time::Instant,
    last_time: std::time::Instant,
    delta_time_s: f32,
    total_time_s: f32,
}

impl Default for Timer {
    fn default() -> Self {
        let now = std::time::Instant::now();
        Self {
            start_time: now,
            last_time: now,
            delta_time_s: 0.0,
            total_time_s: 0.0,
        }
    }
}

impl Timer {
    pub fn update(&mut self) {
        let now = std::time::Instant::now();
        self.delta_time_s = now.duration_since(self.last_time).as_secs_f32();
        self.total_time_s = now.duration_since(self.start_time).as_secs_f32();
        self.last_time = now;
    }

    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.delta_time_s
    }

    #[inline]
    pub fn total_time_s(&self) -> f32 {
        self.total_time_s
    }
}
