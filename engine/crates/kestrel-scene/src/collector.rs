use std::rc::Rc;

use slotmap::SlotMap;

use crate::{
    culling::Frustum,
    entity::{Entity, EntityKey, PrimitiveKey, ScenePrimitive},
    render_set::RenderSetBuckets,
};

struct PrimitiveRecord {
    owner: EntityKey,
    primitive: Rc<dyn ScenePrimitive>,
}

/// 在 CPU 侧管理场景内容，每次 tick 重建渲染分组桶
///
/// 外部（场景加载层）只通过 add/remove entity/primitive 四个入口修改场景
#[derive(Default)]
pub struct SceneCollector {
    all_entities: SlotMap<EntityKey, Entity>,
    all_primitives: SlotMap<PrimitiveKey, PrimitiveRecord>,

    buckets: RenderSetBuckets,
}

// new & init
impl SceneCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

// getters
impl SceneCollector {
    #[inline]
    pub fn buckets(&self) -> &RenderSetBuckets {
        &self.buckets
    }

    #[inline]
    pub fn get_entity(&self, key: EntityKey) -> Option<&Entity> {
        self.all_entities.get(key)
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.all_entities.len()
    }

    #[inline]
    pub fn primitive_count(&self) -> usize {
        self.all_primitives.len()
    }
}

// tools
impl SceneCollector {
    pub fn add_entity(&mut self, entity: Entity) -> EntityKey {
        self.all_entities.insert(entity)
    }

    /// 移除实体时，它名下的所有 primitive 一并注销
    pub fn remove_entity(&mut self, key: EntityKey) {
        let Some(entity) = self.all_entities.remove(key) else {
            return;
        };
        for primitive_key in entity.primitive_keys() {
            self.all_primitives.remove(*primitive_key);
        }
    }

    /// 把 primitive 注册到指定实体名下
    ///
    /// 同一个 primitive 实例重复注册属于逻辑错误，仅在 debug 下检查
    pub fn add_primitive(&mut self, owner: EntityKey, primitive: Rc<dyn ScenePrimitive>) -> PrimitiveKey {
        debug_assert!(
            !self.all_primitives.values().any(|record| Rc::ptr_eq(&record.primitive, &primitive)),
            "primitive already registered with this collector"
        );

        let key = self.all_primitives.insert(PrimitiveRecord { owner, primitive });
        let entity = self.all_entities.get_mut(owner).unwrap_or_else(|| panic!("owner entity {owner:?} not found"));
        entity.link_primitive(key);
        key
    }

    pub fn remove_primitive(&mut self, key: PrimitiveKey) {
        let Some(record) = self.all_primitives.remove(key) else {
            return;
        };
        if let Some(entity) = self.all_entities.get_mut(record.owner) {
            entity.unlink_primitive(key);
        }
    }

    /// 每帧一次的场景更新
    ///
    /// 1. 调度所有组件更新
    /// 2. 清空上一帧的所有分组桶
    /// 3. 对每个已注册的 primitive 做视锥剔除
    /// 4. 幸存的 primitive 为它支持的每个分组各生成一个绘制元素
    /// 5. 元素写入对应的桶
    ///
    /// 桶每帧从头重建，后续开销只与可见数量相关
    pub fn tick(&mut self, delta_time: f32, camera_volume: &Frustum) {
        let _span = tracy_client::span!("SceneCollector::tick");

        for (_, entity) in self.all_entities.iter_mut() {
            entity.tick_components(delta_time);
        }

        self.buckets.clear_all();

        for (_, record) in self.all_primitives.iter() {
            if !camera_volume.intersects_sphere(&record.primitive.bounding_sphere()) {
                continue;
            }
            for set in record.primitive.render_sets() {
                self.buckets.push(*set, record.primitive.emit_element(*set));
            }
        }
    }
}

impl Drop for SceneCollector {
    fn drop(&mut self) {
        log::info!("SceneCollector dropped.");
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::{
        culling::BoundingSphere,
        entity::Component,
        render_set::{RenderElement, RenderSet},
    };

    struct TestPrimitive {
        sets: Vec<RenderSet>,
        center: glam::Vec3,
    }

    impl TestPrimitive {
        fn at_origin(sets: Vec<RenderSet>) -> Rc<Self> {
            Rc::new(Self {
                sets,
                center: glam::Vec3::ZERO,
            })
        }
    }

    impl ScenePrimitive for TestPrimitive {
        fn bounding_sphere(&self) -> BoundingSphere {
            BoundingSphere::new(self.center, 1.0)
        }

        fn render_sets(&self) -> &[RenderSet] {
            &self.sets
        }

        fn emit_element(&self, _set: RenderSet) -> RenderElement {
            RenderElement {
                vertex_buffer: vk::Buffer::null(),
                index_buffer: vk::Buffer::null(),
                index_type: vk::IndexType::UINT32,
                index_count: 3,
                descriptor_set: vk::DescriptorSet::null(),
                push_constants: vec![],
            }
        }
    }

    /// 能看到原点的视锥体
    fn test_frustum() -> Frustum {
        let proj = glam::Mat4::perspective_rh(60_f32.to_radians(), 1.0, 0.1, 100.0);
        let view = glam::Mat4::look_at_rh(glam::vec3(0.0, 0.0, 10.0), glam::Vec3::ZERO, glam::Vec3::Y);
        Frustum::from_view_proj(&(proj * view))
    }

    #[test]
    fn test_single_set_primitive_fills_only_its_bucket() {
        let mut collector = SceneCollector::new();
        let entity = collector.add_entity(Entity::new("test-entity"));
        collector.add_primitive(entity, TestPrimitive::at_origin(vec![RenderSet::Scene]));

        collector.tick(0.016, &test_frustum());

        assert_eq!(collector.buckets().elements(RenderSet::Scene).len(), 1);
        for set in RenderSet::ALL {
            if set != RenderSet::Scene {
                assert!(collector.buckets().is_empty(set), "{set:?} bucket should be empty");
            }
        }
    }

    #[test]
    fn test_multi_set_primitive_fills_all_its_buckets() {
        let mut collector = SceneCollector::new();
        let entity = collector.add_entity(Entity::new("test-entity"));
        let key = collector.add_primitive(entity, TestPrimitive::at_origin(vec![RenderSet::Scene, RenderSet::Xray]));

        collector.tick(0.016, &test_frustum());
        assert_eq!(collector.buckets().elements(RenderSet::Scene).len(), 1);
        assert_eq!(collector.buckets().elements(RenderSet::Xray).len(), 1);

        // 移除后重新 tick，两个桶都应为空
        collector.remove_primitive(key);
        collector.tick(0.016, &test_frustum());
        assert!(collector.buckets().is_empty(RenderSet::Scene));
        assert!(collector.buckets().is_empty(RenderSet::Xray));
    }

    #[test]
    fn test_culled_primitive_emits_nothing() {
        let mut collector = SceneCollector::new();
        let entity = collector.add_entity(Entity::new("test-entity"));
        // 位于相机背后
        collector.add_primitive(
            entity,
            Rc::new(TestPrimitive {
                sets: vec![RenderSet::Scene],
                center: glam::vec3(0.0, 0.0, 200.0),
            }),
        );

        collector.tick(0.016, &test_frustum());
        assert!(collector.buckets().is_empty(RenderSet::Scene));
    }

    #[test]
    fn test_remove_entity_unregisters_its_primitives() {
        let mut collector = SceneCollector::new();
        let entity = collector.add_entity(Entity::new("test-entity"));
        collector.add_primitive(entity, TestPrimitive::at_origin(vec![RenderSet::Scene]));
        assert_eq!(collector.primitive_count(), 1);

        collector.remove_entity(entity);
        assert_eq!(collector.primitive_count(), 0);

        collector.tick(0.016, &test_frustum());
        assert!(collector.buckets().is_empty(RenderSet::Scene));
    }

    struct CountingComponent {
        ticks: Rc<std::cell::Cell<u32>>,
    }

    impl Component for CountingComponent {
        fn tick(&mut self, _delta_time: f32) {
            self.ticks.set(self.ticks.get() + 1);
        }
    }

    #[test]
    fn test_components_ticked_every_frame() {
        let ticks = Rc::new(std::cell::Cell::new(0));
        let mut collector = SceneCollector::new();
        collector.add_entity(
            Entity::new("test-entity").with_component(Box::new(CountingComponent { ticks: ticks.clone() })),
        );

        collector.tick(0.016, &test_frustum());
        collector.tick(0.016, &test_frustum());
        assert_eq!(ticks.get(), 2);
    }
}
