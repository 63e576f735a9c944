use ash::vk;

/// 渲染分组：每个 primitive 可以把自己提交到一个或多个分组中，
/// 每个 logical pass 声明自己消费哪些分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderSet {
    Scene,
    Shadow,
    Xray,
    Postprocess,
    Ui,
}

impl RenderSet {
    pub const COUNT: usize = 5;

    pub const ALL: [RenderSet; Self::COUNT] = [
        RenderSet::Scene,
        RenderSet::Shadow,
        RenderSet::Xray,
        RenderSet::Postprocess,
        RenderSet::Ui,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            RenderSet::Scene => 0,
            RenderSet::Shadow => 1,
            RenderSet::Xray => 2,
            RenderSet::Postprocess => 3,
            RenderSet::Ui => 4,
        }
    }
}

/// 单个可绘制元素，由 primitive 在每次 tick 时重新生成
///
/// 只持有裸 handle，不持有所有权；buffer 和 descriptor set
/// 的生命周期由 primitive 自身保证
#[derive(Clone)]
pub struct RenderElement {
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_type: vk::IndexType,
    pub index_count: u32,

    pub descriptor_set: vk::DescriptorSet,

    /// push constant 原始数据；为空表示该元素不使用 push constant
    pub push_constants: Vec<u8>,
}

/// 所有渲染分组的桶，每次 tick 从头重建
#[derive(Default)]
pub struct RenderSetBuckets {
    buckets: [Vec<RenderElement>; RenderSet::COUNT],
}

impl RenderSetBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空所有桶，保留已分配的容量
    pub fn clear_all(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    #[inline]
    pub fn push(&mut self, set: RenderSet, element: RenderElement) {
        self.buckets[set.index()].push(element);
    }

    #[inline]
    pub fn elements(&self, set: RenderSet) -> &[RenderElement] {
        &self.buckets[set.index()]
    }

    #[inline]
    pub fn is_empty(&self, set: RenderSet) -> bool {
        self.buckets[set.index()].is_empty()
    }
}
