use std::cell::Cell;
use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer,
        command_pool::GfxCommandPool,
        command_queue::GfxCommandQueue,
        submit_info::GfxSubmitInfo,
    },
    error::GfxError,
    foundation::{
        debug_messenger::DebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
    },
    resources::allocator::VmemAllocator,
};

/// Vulkan 图形上下文
///
/// 管理所有 Vulkan 核心资源：实例、显卡、设备、队列、内存分配器。
/// 显式构造一次，通过 Rc 传入依赖它的组件，销毁顺序是确定的。
///
/// # 初始化流程
/// ```ignore
/// let gfx = Gfx::new("MyApp".to_string(), extra_extensions)?;
/// let device = gfx.device().clone();
/// // 使用...
/// gfx.destroy();
/// ```
pub struct Gfx {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    _vk_entry: ash::Entry,

    instance: GfxInstance,
    debug_messenger: DebugMsger,
    physical_device: GfxPhysicalDevice,

    /// Vulkan 设备函数指针集合
    ///
    /// 多个组件需要共享相同的设备函数指针（queue、command buffer、
    /// swapchain 等），函数指针本身很轻量，Rc 共享比传递更高效。
    device: Rc<GfxDevice>,

    gfx_queue: GfxCommandQueue,
    compute_queue: Option<GfxCommandQueue>,
    transfer_queue: Option<GfxCommandQueue>,

    /// graphics queue family 的 present 能力在 surface
    /// 创建之后才能校验
    present_verified: Cell<bool>,

    allocator: Rc<VmemAllocator>,

    /// 临时的 graphics command pool，用于一次性的命令缓冲区
    temp_graphics_command_pool: GfxCommandPool,
}

// 创建与销毁
impl Gfx {
    const ENGINE_NAME: &'static str = "Kestrel";

    pub fn new(app_name: String, extra_instance_exts: Vec<&'static CStr>) -> Result<Rc<Self>, GfxError> {
        let _span = tracy_client::span!("Gfx::new");

        let vk_entry = unsafe { ash::Entry::load() }.expect("Failed to load vulkan entry");
        let instance = GfxInstance::new(&vk_entry, app_name, Self::ENGINE_NAME.to_string(), extra_instance_exts);
        let debug_messenger = DebugMsger::new(&vk_entry, instance.ash_instance());

        // 没有合适的显卡属于环境不满足，由调用方决定终止方式
        let physical_device = GfxPhysicalDevice::new_suitable_physical_device(instance.ash_instance())?;

        // 每个不同的 queue family 各请求一个 queue，
        // 一个 family 可以同时承担多个角色
        let priorities = [1.0_f32];
        let mut queue_create_infos = vec![
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(physical_device.gfx_queue_family.queue_family_index)
                .queue_priorities(&priorities),
        ];
        for family in [&physical_device.compute_queue_family, &physical_device.transfer_queue_family]
            .into_iter()
            .flatten()
        {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family.queue_family_index)
                    .queue_priorities(&priorities),
            );
        }

        let device = Rc::new(GfxDevice::new(
            instance.ash_instance(),
            physical_device.vk_handle,
            &queue_create_infos,
            &GfxPhysicalDevice::required_device_exts(),
        ));

        let gfx_queue = GfxCommandQueue::new(device.clone(), physical_device.gfx_queue_family.clone(), 0);
        let compute_queue = physical_device
            .compute_queue_family
            .clone()
            .map(|family| GfxCommandQueue::new(device.clone(), family, 0));
        let transfer_queue = physical_device
            .transfer_queue_family
            .clone()
            .map(|family| GfxCommandQueue::new(device.clone(), family, 0));

        log::info!("gfx queue's queue family:\n{:#?}", gfx_queue.queue_family);

        let allocator = Rc::new(VmemAllocator::new(instance.ash_instance(), physical_device.vk_handle, &device));

        let temp_graphics_command_pool = GfxCommandPool::new(
            device.clone(),
            physical_device.gfx_queue_family.clone(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-one-time",
        );

        // 在 device 以及 debug_utils 之后才能命名的 vk::Handle
        device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
        device.set_object_debug_name(physical_device.vk_handle, "GfxPhysicalDevice");
        device.set_object_debug_name(device.vk_handle(), "GfxDevice");
        device.set_object_debug_name(gfx_queue.vk_queue, "GfxCommandQueue::gfx");

        Ok(Rc::new(Self {
            _vk_entry: vk_entry,
            instance,
            debug_messenger,
            physical_device,
            device,
            gfx_queue,
            compute_queue,
            transfer_queue,
            present_verified: Cell::new(false),
            allocator,
            temp_graphics_command_pool,
        }))
    }

    /// 销毁所有 GPU 对象
    ///
    /// 调用前必须保证设备空闲，并且所有由 allocator
    /// 分配的资源都已经释放。
    pub fn destroy(self) {
        self.wait_idle();

        drop(self.temp_graphics_command_pool);
        debug_assert_eq!(Rc::strong_count(&self.allocator), 1, "allocator still referenced at teardown");
        drop(self.allocator);

        self.device.destroy();
        self.physical_device.destroy();
        self.debug_messenger.destroy();
        self.instance.destroy();
    }
}

// getters
impl Gfx {
    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        self.instance.ash_instance()
    }

    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self._vk_entry
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn allocator(&self) -> &Rc<VmemAllocator> {
        &self.allocator
    }

    #[inline]
    pub fn graphics_queue(&self) -> &GfxCommandQueue {
        &self.gfx_queue
    }

    /// present 使用的 queue
    ///
    /// graphics family 同时承担 present 角色；在 surface
    /// 创建并校验之前，present family 尚未解析完成。
    pub fn present_queue(&self) -> Result<&GfxCommandQueue, GfxError> {
        if !self.present_verified.get() {
            return Err(GfxError::QueueFamilyMissing("present"));
        }
        Ok(&self.gfx_queue)
    }

    /// compute 角色的 queue：优先使用专用 family，否则复用 graphics family
    #[inline]
    pub fn compute_queue(&self) -> &GfxCommandQueue {
        self.compute_queue.as_ref().unwrap_or(&self.gfx_queue)
    }

    /// transfer 角色的 queue：优先使用专用 family，否则复用 graphics family
    #[inline]
    pub fn transfer_queue(&self) -> &GfxCommandQueue {
        self.transfer_queue.as_ref().unwrap_or(&self.gfx_queue)
    }
}

// tools
impl Gfx {
    /// 校验 graphics family 对给定 surface 的 present 能力
    ///
    /// 不支持 present 的环境无法继续运行
    pub fn verify_present_support(
        &self,
        surface_pf: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(), GfxError> {
        let supported = unsafe {
            surface_pf
                .get_physical_device_surface_support(
                    self.physical_device.vk_handle,
                    self.gfx_queue.queue_family.queue_family_index,
                    surface,
                )
                .unwrap()
        };
        if !supported {
            return Err(GfxError::QueueFamilyMissing("present"));
        }
        self.present_verified.set(true);
        Ok(())
    }

    /// 根据给定的格式，返回支持的格式
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Vec<vk::Format> {
        candidates
            .iter()
            .filter(|f| {
                let props = unsafe {
                    self.instance
                        .ash_instance()
                        .get_physical_device_format_properties(self.physical_device.vk_handle, **f)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => panic!("not supported tiling."),
                }
            })
            .copied()
            .collect()
    }

    /// 根据 vulkan 实例和显卡，获取合适的深度格式
    pub fn depth_format(&self) -> vk::Format {
        self.find_supported_format(
            &[vk::Format::D32_SFLOAT, vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .first()
        .copied()
        .unwrap_or(vk::Format::UNDEFINED)
    }

    /// 立即执行某个 command，并同步等待执行结果
    ///
    /// 用于帧循环之外的上传和 image layout transition
    pub fn one_time_exec<F, R>(&self, func: F, name: impl AsRef<str>) -> R
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let _span = tracy_client::span!("Gfx::one_time_exec");

        let command_buffer = GfxCommandBuffer::new(
            self.device.clone(),
            &self.temp_graphics_command_pool,
            &format!("one-time-{}", name.as_ref()),
        );

        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref());
        let result = func(&command_buffer);
        command_buffer.end();

        self.gfx_queue.submit(&[GfxSubmitInfo::new(std::slice::from_ref(&command_buffer))], None);
        self.gfx_queue.wait_idle();
        self.temp_graphics_command_pool.free_command_buffers(&[command_buffer.vk_handle()]);

        result
    }

    pub fn wait_idle(&self) {
        unsafe {
            self.device.device_wait_idle().unwrap();
        }
    }
}
