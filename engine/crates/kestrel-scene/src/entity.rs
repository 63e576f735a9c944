use slotmap::new_key_type;

use crate::{
    culling::BoundingSphere,
    render_set::{RenderElement, RenderSet},
};

new_key_type! { pub struct EntityKey; }
new_key_type! { pub struct PrimitiveKey; }

/// 每次 tick 都会被调度更新的组件
pub trait Component {
    fn tick(&mut self, delta_time: f32);
}

/// 可绘制的 primitive 组件
///
/// 注册进 collector 后由 collector 持有引用；
/// 同一个 primitive 同一时刻只允许注册进一个 collector
pub trait ScenePrimitive {
    /// 剔除代理体，基于当前帧的世界空间位置
    fn bounding_sphere(&self) -> BoundingSphere;

    /// 该 primitive 的材质所支持的渲染分组
    fn render_sets(&self) -> &[RenderSet];

    /// 为指定的渲染分组生成一个绘制元素
    ///
    /// 入参保证是 `render_sets()` 返回的分组之一
    fn emit_element(&self, set: RenderSet) -> RenderElement;
}

/// 实体：组件的容器
///
/// 对 primitive 只持有 key，不持有所有权；注册表在 collector 中
pub struct Entity {
    name: String,
    components: Vec<Box<dyn Component>>,
    primitives: Vec<PrimitiveKey>,
}

// 创建与销毁
impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            primitives: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: Box<dyn Component>) -> Self {
        self.components.push(component);
        self
    }
}

// getters
impl Entity {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn primitive_keys(&self) -> &[PrimitiveKey] {
        &self.primitives
    }
}

// tools
impl Entity {
    pub fn add_component(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    pub(crate) fn tick_components(&mut self, delta_time: f32) {
        for component in &mut self.components {
            component.tick(delta_time);
        }
    }

    pub(crate) fn link_primitive(&mut self, key: PrimitiveKey) {
        debug_assert!(!self.primitives.contains(&key), "primitive {key:?} already linked to entity {}", self.name);
        self.primitives.push(key);
    }

    pub(crate) fn unlink_primitive(&mut self, key: PrimitiveKey) {
        self.primitives.retain(|k| *k != key);
    }
}
