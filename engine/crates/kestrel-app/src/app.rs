use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;
use kestrel_crate_tools::init_log::init_log;
use kestrel_gfx::gfx::Gfx;
use kestrel_renderer::renderer::{Renderer, RendererSettings};
use kestrel_scene::collector::SceneCollector;
use raw_window_handle::HasDisplayHandle;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

use crate::{camera::Camera, timer::Timer};

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

/// 应用层的回调接口
///
/// 场景内容的搭建和每帧的逻辑更新在这里注入
pub trait OuterApp {
    /// window 和 renderer 就绪之后调用一次
    fn setup(&mut self, gfx: &Rc<Gfx>, scene: &mut SceneCollector, renderer: &Renderer);

    /// 每帧 tick 之前调用
    fn update(&mut self, _renderer: &Renderer, _camera: &mut Camera, _delta_time: f32) {}
}

pub struct AppSettings {
    pub app_name: String,
    pub window_extent: vk::Extent2D,
    pub renderer: RendererSettings,
}

/// winit 应用壳
///
/// 输入消息由事件循环协作式地排空，每次 about_to_wait
/// 至多触发一次 RedrawRequested，即至多一帧 tick
pub struct WinitApp {
    outer_app: Box<dyn OuterApp>,
    settings: Option<AppSettings>,

    gfx: Option<Rc<Gfx>>,
    renderer: Option<Renderer>,
    scene: SceneCollector,
    camera: Camera,
    timer: Timer,

    window: Option<Window>,
}

// 总的 main 函数
impl WinitApp {
    /// 整个程序的入口
    pub fn run(settings: AppSettings, outer_app: Box<dyn OuterApp>) {
        std::panic::set_hook(Box::new(panic_handler));

        init_log();
        tracy_client::Client::start();
        tracy_client::set_thread_name!("KestrelMain");

        let event_loop = winit::event_loop::EventLoop::new().unwrap();

        let mut app = Self {
            outer_app,
            settings: Some(settings),
            gfx: None,
            renderer: None,
            scene: SceneCollector::new(),
            camera: Camera::default(),
            timer: Timer::default(),
            window: None,
        };
        event_loop.run_app(&mut app).unwrap();

        log::info!("end run.");

        app.destroy();
    }
}

// new & init
impl WinitApp {
    /// 在 window 创建之后初始化 Gfx 和 Renderer
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) {
        let settings = self.settings.take().expect("init_after_window called twice");

        let window_attr = Window::default_attributes().with_title(settings.app_name.clone()).with_inner_size(
            winit::dpi::LogicalSize::new(settings.window_extent.width as f64, settings.window_extent.height as f64),
        );
        let window = event_loop.create_window(window_attr).unwrap();

        // surface 相关的 instance 扩展由窗口系统决定
        let surface_exts = ash_window::enumerate_required_extensions(event_loop.display_handle().unwrap().as_raw())
            .unwrap()
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(*ext) })
            .collect::<Vec<_>>();

        let gfx = Gfx::new(settings.app_name.clone(), surface_exts).unwrap_or_else(|e| panic!("gfx init failed: {e}"));
        let renderer = Renderer::new(gfx.clone(), &window, settings.renderer)
            .unwrap_or_else(|e| panic!("renderer init failed: {e}"));

        self.outer_app.setup(&gfx, &mut self.scene, &renderer);

        self.gfx = Some(gfx);
        self.renderer = Some(renderer);
        self.window = Some(window);
    }
}

// update
impl WinitApp {
    fn tick_frame(&mut self) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        self.timer.update();
        let delta_time = self.timer.delta_time_s();
        self.outer_app.update(renderer, &mut self.camera, delta_time);

        let window_size = self.window.as_ref().unwrap().inner_size();
        let aspect = if window_size.height == 0 {
            1.0
        } else {
            window_size.width as f32 / window_size.height as f32
        };

        renderer.tick(&mut self.scene, &self.camera.matrices(aspect), delta_time);
        tracy_client::frame_mark();
    }
}

// destroy
impl WinitApp {
    fn destroy(mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy();
        }
        self.window = None;
        if let Some(gfx) = self.gfx.take() {
            Rc::into_inner(gfx).expect("gfx still referenced at teardown").destroy();
        }
    }
}

// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.renderer.is_none() {
            self.init_after_window(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.request_shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.notify_resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.tick_frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // 输入消息已经排空，请求下一帧
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
