use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use kestrel_gfx::{
    commands::submit_info::GfxSubmitInfo,
    error::GfxError,
    gfx::Gfx,
    pipelines::descriptor::{GfxDescriptorPool, GfxDescriptorSetLayout},
    resources::buffer::GfxBuffer,
    swapchain::{
        render_swapchain::{RenderSwapchain, SwapchainSettings, SwapchainStatus},
        surface::GfxSurface,
    },
};
use kestrel_render_graph::{
    chain::{default_attachments, default_pass_chain},
    graph::{GraphError, RenderGraph},
};
use kestrel_scene::{collector::SceneCollector, culling::Frustum};

use crate::{frame_commands::FrameCommandBuffers, frame_counter::FrameCounter, frame_sync::FrameSync};

#[derive(thiserror::Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Gfx(#[from] GfxError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// camera 协作方每帧提供的矩阵
#[derive(Clone, Copy)]
pub struct CameraMatrices {
    pub view: glam::Mat4,
    pub proj: glam::Mat4,
}

/// 每帧写入 uniform ring 的数据块
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUbo {
    view: glam::Mat4,
    proj: glam::Mat4,
}

pub struct RendererSettings {
    pub vsync: bool,
    pub clear_color: [f32; 4],
    /// 预编译 shader 的根目录
    pub shader_dir: PathBuf,
}

/// 帧编排器
///
/// 组合 swapchain、帧同步、command buffer、pass 图和场景，
/// 驱动每帧的状态机：
/// `WAIT_SLOT_FENCE → ACQUIRE → WAIT_IMAGE_FENCE? → UPDATE_UNIFORMS → SUBMIT → PRESENT → ADVANCE`
///
/// OUT_OF_DATE / SUBOPTIMAL / 外部 resize 走 Recreation 路径，
/// 帧计数器跨越重建继续前进。
pub struct Renderer {
    frame_counter: FrameCounter,
    frame_sync: FrameSync,
    frame_commands: FrameCommandBuffers,

    /// 每个 frame slot 一个 uniform buffer，只在该 slot 的
    /// fence 等待之后写入
    uniform_ring: Vec<GfxBuffer>,
    frame_descriptor_sets: Vec<vk::DescriptorSet>,
    _frame_descriptor_pool: GfxDescriptorPool,
    _frame_set_layout: GfxDescriptorSetLayout,

    graph: RenderGraph,
    swapchain: Option<RenderSwapchain>,
    surface: GfxSurface,

    settings: RendererSettings,
    requested_extent: vk::Extent2D,
    resize_requested: bool,
    shutdown_requested: bool,

    gfx: Rc<Gfx>,
}

// new & init
impl Renderer {
    pub fn new(gfx: Rc<Gfx>, window: &winit::window::Window, settings: RendererSettings) -> Result<Self, RendererError> {
        let _span = tracy_client::span!("Renderer::new");

        let surface = GfxSurface::new(&gfx, window);
        gfx.verify_present_support(surface.pf(), surface.handle())?;

        let window_size = window.inner_size();
        let requested_extent = vk::Extent2D {
            width: window_size.width,
            height: window_size.height,
        };
        let swapchain = RenderSwapchain::new(
            &gfx,
            &surface,
            &SwapchainSettings {
                requested_extent,
                vsync: settings.vsync,
            },
        );

        let device = gfx.device().clone();
        let mut graph = RenderGraph::new(
            device.clone(),
            default_attachments(gfx.depth_format()),
            default_pass_chain(&settings.shader_dir, settings.clear_color),
        )?;
        let swapchain_views = (0..swapchain.image_count()).map(|i| swapchain.image_view(i)).collect_vec();
        graph.rebuild(gfx.allocator(), swapchain.extent(), swapchain.color_format(), &swapchain_views)?;

        let frame_sync = FrameSync::new(&device, swapchain.image_count());
        let frame_pool = kestrel_gfx::commands::command_pool::GfxCommandPool::new(
            device.clone(),
            gfx.graphics_queue().queue_family().clone(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "frame-commands",
        );
        let frame_commands = FrameCommandBuffers::new(device.clone(), frame_pool, swapchain.image_count());

        // per-slot uniform ring + descriptor set
        let uniform_ring = (0..FrameCounter::fif_count())
            .map(|slot| {
                GfxBuffer::new_ubo(
                    &device,
                    gfx.allocator().clone(),
                    size_of::<FrameUbo>() as vk::DeviceSize,
                    &format!("frame-ubo-{slot}"),
                )
            })
            .collect_vec();

        let frame_set_layout = GfxDescriptorSetLayout::new(
            device.clone(),
            &[vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)],
            "frame-set-layout",
        );
        let frame_descriptor_pool = GfxDescriptorPool::new(
            device.clone(),
            FrameCounter::fif_count() as u32,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: FrameCounter::fif_count() as u32,
            }],
            "frame-descriptor-pool",
        );
        let layouts = (0..FrameCounter::fif_count()).map(|_| &frame_set_layout).collect_vec();
        let frame_descriptor_sets = frame_descriptor_pool.alloc_sets(&layouts, "frame-set");

        for (set, ubo) in frame_descriptor_sets.iter().zip(uniform_ring.iter()) {
            let buffer_info = vk::DescriptorBufferInfo::default()
                .buffer(ubo.vk_buffer())
                .offset(0)
                .range(size_of::<FrameUbo>() as vk::DeviceSize);
            let write = vk::WriteDescriptorSet::default()
                .dst_set(*set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info));
            unsafe {
                device.update_descriptor_sets(std::slice::from_ref(&write), &[]);
            }
        }

        Ok(Self {
            frame_counter: FrameCounter::new(),
            frame_sync,
            frame_commands,
            uniform_ring,
            frame_descriptor_sets,
            _frame_descriptor_pool: frame_descriptor_pool,
            _frame_set_layout: frame_set_layout,
            graph,
            swapchain: Some(swapchain),
            surface,
            settings,
            requested_extent,
            resize_requested: false,
            shutdown_requested: false,
            gfx,
        })
    }

    /// 销毁所有 GPU 对象；之后再由调用方销毁 Gfx
    pub fn destroy(mut self) {
        // 销毁任何对象之前，设备必须完全空闲
        self.gfx.wait_idle();
        self.graph.destroy_size_dependents();
        self.swapchain = None;
        // 其余字段按声明顺序 drop
    }
}

// 外部入口
impl Renderer {
    /// OS 层的 resize 通知；实际重建推迟到下一次 tick
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.requested_extent = vk::Extent2D { width, height };
        self.resize_requested = true;
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    #[inline]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }
}

// getters
impl Renderer {
    #[inline]
    pub fn gfx(&self) -> &Rc<Gfx> {
        &self.gfx
    }

    #[inline]
    pub fn current_frame_slot(&self) -> usize {
        self.frame_counter.frame_slot()
    }

    /// 当前 slot 的每帧数据 descriptor set，供 primitive 的绘制元素引用
    #[inline]
    pub fn frame_descriptor_set(&self, slot: usize) -> vk::DescriptorSet {
        self.frame_descriptor_sets[slot]
    }
}

// 每帧驱动
impl Renderer {
    /// 渲染一帧；窗口最小化或已请求退出时什么都不做
    pub fn tick(&mut self, scene: &mut SceneCollector, camera: &CameraMatrices, delta_time: f32) {
        if self.shutdown_requested {
            return;
        }
        if self.requested_extent.width == 0 || self.requested_extent.height == 0 {
            return;
        }
        let _span = tracy_client::span!("Renderer::tick");

        if self.resize_requested || self.swapchain.is_none() {
            self.resize_requested = false;
            self.recreate_swapchain();
        }
        let Some(swapchain) = &self.swapchain else {
            return;
        };

        let slot = self.frame_counter.frame_slot();
        let frame_name = self.frame_counter.frame_name();

        // WAIT_SLOT_FENCE：CPU 在此之前不得复用该 slot 的任何资源
        self.frame_sync.slot(slot).in_flight.wait();

        // 场景更新：组件、剔除、分桶
        scene.tick(delta_time, &Frustum::from_view_proj(&(camera.proj * camera.view)));

        // ACQUIRE
        let (acquire_status, image_index) = swapchain.acquire_next_image(&self.frame_sync.slot(slot).image_available);
        if acquire_status == SwapchainStatus::OutOfDate {
            // semaphore 未被 signal，直接重建；下一帧从 WAIT_SLOT_FENCE 继续，
            // 计数器不前进也不重置
            self.recreate_swapchain();
            return;
        }
        let image_index = image_index as usize;

        // WAIT_IMAGE_FENCE（可选）：image 仍被其他 slot 的提交占用时额外等待
        self.frame_sync.wait_image_released(image_index, slot);

        // UPDATE_UNIFORMS：slot fence 已经 signal，写入是安全的
        let ubo = FrameUbo {
            view: camera.view,
            proj: camera.proj,
        };
        self.uniform_ring[slot].write_bytes(bytemuck::bytes_of(&ubo));

        // 重录该 image 的 command buffer
        let graph = &self.graph;
        self.frame_commands.record(image_index, &frame_name, |cmd| {
            graph.draw(cmd, image_index, scene.buckets());
        });

        // SUBMIT
        let slot_sync = self.frame_sync.slot(slot);
        slot_sync.in_flight.reset();
        let submit_info = GfxSubmitInfo::new(std::slice::from_ref(self.frame_commands.buffer(image_index)))
            .wait(&slot_sync.image_available, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .signal(&slot_sync.render_finished);
        self.gfx.graphics_queue().submit(&[submit_info], Some(&slot_sync.in_flight));

        // PRESENT
        let swapchain = self.swapchain.as_ref().unwrap();
        let present_queue = self.gfx.present_queue().unwrap();
        let present_status = swapchain.present_image(present_queue, image_index as u32, &slot_sync.render_finished);

        // ADVANCE：无条件 (slot + 1) % F
        self.frame_counter.next_frame();

        // SUBOPTIMAL（acquire 或 present）：本帧已经正常结束，现在重建
        if acquire_status == SwapchainStatus::Suboptimal || present_status != SwapchainStatus::Optimal {
            self.recreate_swapchain();
        }
    }

    /// Recreation 路径
    ///
    /// 销毁所有与 swapchain 尺寸相关的资源之前必须等待设备空闲；
    /// slot 的同步对象和帧计数器与尺寸无关，原样保留。
    fn recreate_swapchain(&mut self) {
        let _span = tracy_client::span!("Renderer::recreate_swapchain");
        log::info!(
            "{} recreate swapchain, requested extent {}x{}",
            self.frame_counter.frame_name(),
            self.requested_extent.width,
            self.requested_extent.height
        );

        self.gfx.wait_idle();

        self.graph.destroy_size_dependents();
        self.swapchain = None;

        let swapchain = RenderSwapchain::new(
            &self.gfx,
            &self.surface,
            &SwapchainSettings {
                requested_extent: self.requested_extent,
                vsync: self.settings.vsync,
            },
        );

        let swapchain_views = (0..swapchain.image_count()).map(|i| swapchain.image_view(i)).collect_vec();
        self.graph
            .rebuild(self.gfx.allocator(), swapchain.extent(), swapchain.color_format(), &swapchain_views)
            .unwrap();
        self.frame_commands.on_swapchain_rebuilt(swapchain.image_count());
        self.frame_sync.on_swapchain_rebuilt(swapchain.image_count());

        self.swapchain = Some(swapchain);
    }
}
