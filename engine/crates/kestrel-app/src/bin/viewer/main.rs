use std::rc::Rc;

use ash::vk;
use kestrel_app::app::{AppSettings, OuterApp, WinitApp};
use kestrel_app::camera::Camera;
use kestrel_gfx::gfx::Gfx;
use kestrel_renderer::renderer::{Renderer, RendererSettings};
use kestrel_scene::collector::SceneCollector;
use kestrel_scene::entity::Entity;

mod triangle;

use triangle::TrianglePrimitive;

/// 最小的查看器：一个绕 Y 轴旋转的三角形
#[derive(Default)]
struct ViewerApp {
    triangle: Option<Rc<TrianglePrimitive>>,
    angle_deg: f32,
}

impl OuterApp for ViewerApp {
    fn setup(&mut self, gfx: &Rc<Gfx>, scene: &mut SceneCollector, _renderer: &Renderer) {
        log::info!("viewer setup.");

        let triangle = Rc::new(TrianglePrimitive::new(gfx));
        let entity = scene.add_entity(Entity::new("triangle"));
        scene.add_primitive(entity, triangle.clone());
        self.triangle = Some(triangle);
    }

    fn update(&mut self, renderer: &Renderer, camera: &mut Camera, delta_time: f32) {
        camera.position = glam::vec3(0.0, 0.0, 4.0);

        self.angle_deg = (self.angle_deg + 45.0 * delta_time) % 360.0;
        let triangle = self.triangle.as_ref().unwrap();
        triangle.set_model(glam::Mat4::from_rotation_y(self.angle_deg.to_radians()));
        // 每帧数据的 descriptor set 随 frame slot 轮换
        triangle.set_frame_descriptor(renderer.frame_descriptor_set(renderer.current_frame_slot()));
    }
}

fn main() {
    let shader_dir = std::env::var("KESTREL_SHADER_DIR").unwrap_or_else(|_| "shaders".to_string());

    WinitApp::run(
        AppSettings {
            app_name: "kestrel-viewer".to_string(),
            window_extent: vk::Extent2D {
                width: 1200,
                height: 800,
            },
            renderer: RendererSettings {
                vsync: true,
                clear_color: [0.02, 0.02, 0.05, 1.0],
                shader_dir: shader_dir.into(),
            },
        },
        Box::new(ViewerApp::default()),
    );
}
