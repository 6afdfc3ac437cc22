//! Device registry and per-device event loop (spec.md §4.1).
//!
//! Grounded on `wgpu-hal::vulkan::Instance`'s adapter enumeration (instance
//! creation, physical-device scan) and on `mod.rs`'s `DeviceShared`/`Device`
//! split between the raw Vulkan handles (`Arc`-shared so resources can
//! outlive the `Device` the caller drops first) and the allocators layered
//! on top.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::alloc::{self, AshMemoryDevice};
use crate::descriptor::AshDescriptorDevice;
use crate::error::{Error, Result};
use crate::loader;

/// Device-selection knobs (ambient configuration; spec.md has no
/// file-based config system, so this is a plain struct + `Default`,
/// matching `wgpu-types`' `DeviceDescriptor` pattern).
#[derive(Clone, Debug)]
pub struct DeviceRegistryConfig {
    pub minimum_api_version: u32,
    pub require_timeline_semaphores: bool,
    pub preferred_vendor_id: Option<u32>,
}

impl Default for DeviceRegistryConfig {
    fn default() -> Self {
        Self {
            minimum_api_version: vk::API_VERSION_1_3,
            require_timeline_semaphores: true,
            preferred_vendor_id: None,
        }
    }
}

pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub transfer: u32,
}

/// The raw Vulkan handles shared between `Device` and every resource it
/// produces; kept `Arc`'d so e.g. a `Buffer` can outlive the caller's last
/// `Device` handle as long as the caller still holds the buffer.
pub(crate) struct DeviceShared {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub raw: ash::Device,
    pub families: QueueFamilies,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub limits: vk::PhysicalDeviceLimits,
    /// One-shot pool used for internal staging submissions (texture
    /// creation, `replaceRegion`, mipmap generation) — spec.md §4.3.
    pub staging_pool: Mutex<vk::CommandPool>,
    pub graphics_queue: vk::Queue,
}

impl DeviceShared {
    pub fn memory_device(&self) -> &AshMemoryDevice {
        AshMemoryDevice::wrap(&self.raw)
    }

    pub fn descriptor_device(&self) -> AshDescriptorDevice<'_> {
        AshDescriptorDevice::wrap(&self.raw)
    }

    /// Runs a one-shot command buffer on the graphics queue and blocks on a
    /// fence until it completes, the pattern concrete-texture creation and
    /// `replaceRegion` both use (spec.md §4.3).
    pub fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = *self.staging_pool.lock();
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        unsafe {
            let cmd = self.raw.allocate_command_buffers(&alloc_info)?[0];
            let begin = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.raw.begin_command_buffer(cmd, &begin)?;
            record(cmd);
            self.raw.end_command_buffer(cmd)?;

            let fence = self.raw.create_fence(&vk::FenceCreateInfo::default(), None)?;
            let cmds = [cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&cmds);
            self.raw.queue_submit(self.graphics_queue, &[submit], fence)?;
            self.raw.wait_for_fences(&[fence], true, u64::MAX)?;
            self.raw.destroy_fence(fence, None);
            self.raw.free_command_buffers(pool, &cmds);
        }
        Ok(())
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe {
            self.raw.destroy_command_pool(*self.staging_pool.lock(), None);
            self.raw.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// One callback registered with the event loop: fires once `semaphore`'s
/// counter reaches `target`.
struct PendingWait {
    semaphore: vk::Semaphore,
    target: u64,
    callback: Box<dyn FnOnce() + Send>,
}

/// The single-threaded cooperative scheduler over timeline semaphores
/// described in spec.md §4.1. Index 0 of `semaphores`/`targets` is the
/// reserved wakeup semaphore.
pub(crate) struct EventLoop {
    shared: Arc<DeviceShared>,
    wakeup_semaphore: vk::Semaphore,
    wakeup_target: Mutex<u64>,
    poll_lock: Mutex<()>,
    pending: Mutex<Vec<PendingWait>>,
}

impl EventLoop {
    fn new(shared: Arc<DeviceShared>) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let wakeup_semaphore = unsafe { shared.raw.create_semaphore(&info, None)? };
        Ok(Self {
            shared,
            wakeup_semaphore,
            wakeup_target: Mutex::new(0),
            poll_lock: Mutex::new(()),
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Registers `callback` to run once `semaphore` reaches `target`, then
    /// wakes the loop so a thread blocked in `poll_events` re-checks state.
    pub fn wait_for_semaphore(&self, semaphore: vk::Semaphore, target: u64, callback: Box<dyn FnOnce() + Send>) {
        self.pending.lock().push(PendingWait { semaphore, target, callback });
        self.wakeup();
    }

    pub fn wakeup(&self) {
        let mut target = self.wakeup_target.lock();
        *target += 1;
        let info = vk::SemaphoreSignalInfo::default().semaphore(self.wakeup_semaphore).value(*target);
        unsafe {
            let _ = self.shared.raw.signal_semaphore(&info);
        }
    }

    /// Blocks on `vkWaitSemaphores(ANY)` up to `timeout_ns`, then runs every
    /// callback whose target has been reached. Only one thread polls at a
    /// time (`poll_lock`); entries are removed under `pending`'s mutex and
    /// callbacks run outside it, matching spec.md §4.1's ordering.
    pub fn poll_events(&self, timeout_ns: u64) -> Result<()> {
        let _poll_guard = self.poll_lock.lock();

        let (semaphores, targets): (Vec<_>, Vec<_>) = {
            let pending = self.pending.lock();
            std::iter::once((self.wakeup_semaphore, *self.wakeup_target.lock()))
                .chain(pending.iter().map(|p| (p.semaphore, p.target)))
                .unzip()
        };

        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&targets)
            .flags(vk::SemaphoreWaitFlags::ANY);
        let wait_result = unsafe { self.shared.raw.wait_semaphores(&wait_info, timeout_ns) };
        if matches!(wait_result, Err(vk::Result::TIMEOUT)) {
            return Ok(());
        }
        wait_result?;

        let ready: Vec<PendingWait> = {
            let mut pending = self.pending.lock();
            let mut ready = Vec::new();
            let mut remaining = Vec::new();
            for entry in pending.drain(..) {
                let current = unsafe { self.shared.raw.get_semaphore_counter_value(entry.semaphore)? };
                if current >= entry.target {
                    ready.push(entry);
                } else {
                    remaining.push(entry);
                }
            }
            *pending = remaining;
            ready
        };

        for entry in ready {
            (entry.callback)();
        }
        Ok(())
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        unsafe { self.shared.raw.destroy_semaphore(self.wakeup_semaphore, None) };
    }
}

/// A pooled binary or timeline semaphore handed out by
/// [`SemaphorePool`]. Destroys and recreates on release for simplicity, as
/// spec.md §4.1 explicitly permits.
pub(crate) struct SemaphorePool {
    shared: Arc<DeviceShared>,
}

impl SemaphorePool {
    fn new(shared: Arc<DeviceShared>) -> Self {
        Self { shared }
    }

    pub fn get_timeline_semaphore(&self) -> Result<vk::Semaphore> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        Ok(unsafe { self.shared.raw.create_semaphore(&info, None)? })
    }

    pub fn put_timeline_semaphore(&self, sem: vk::Semaphore) {
        unsafe { self.shared.raw.destroy_semaphore(sem, None) };
    }

    pub fn get_binary_semaphore(&self, exportable: bool) -> Result<vk::Semaphore> {
        let mut export_info = vk::ExportSemaphoreCreateInfo::default()
            .handle_types(vk::ExternalSemaphoreHandleTypeFlags::OPAQUE_FD);
        let mut info = vk::SemaphoreCreateInfo::default();
        if exportable {
            info = info.push_next(&mut export_info);
        }
        Ok(unsafe { self.shared.raw.create_semaphore(&info, None)? })
    }

    pub fn put_binary_semaphore(&self, sem: vk::Semaphore) {
        unsafe { self.shared.raw.destroy_semaphore(sem, None) };
    }
}

/// Process-level handle to a physical+logical GPU (spec.md §3 Data Model).
pub struct Device {
    pub(crate) shared: Arc<DeviceShared>,
    pub(crate) mem_allocator: Mutex<gpu_alloc::GpuAllocator<vk::DeviceMemory>>,
    pub(crate) desc_allocator: Mutex<gpu_descriptor::DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>>,
    pub(crate) event_loop: EventLoop,
    pub(crate) semaphores: SemaphorePool,
}

impl Device {
    /// Enumerates physical devices, keeps only those meeting the feature
    /// floor (API ≥ 1.3, timeline semaphores), and returns a `Device` built
    /// from the first acceptable one — `createSystemDefaultDevice` (spec.md
    /// §6).
    pub fn create_system_default_device() -> Option<Arc<Device>> {
        Self::create_with_config(&DeviceRegistryConfig::default()).ok()
    }

    pub fn create_with_config(config: &DeviceRegistryConfig) -> Result<Arc<Device>> {
        let entry = loader::vulkan_entry()?;

        let app_info = vk::ApplicationInfo::default().api_version(config.minimum_api_version);
        let create_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("vkCreateInstance failed: {e:?}")))?;

        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| Error::InitializationFailed(format!("vkEnumeratePhysicalDevices failed: {e:?}")))?;

        let chosen = physical_devices
            .into_iter()
            .find(|pd| device_meets_floor(&instance, *pd, config))
            .ok_or_else(|| Error::InitializationFailed("no device meets the Vulkan 1.3 + timeline-semaphore floor".to_string()))?;

        Self::from_physical_device(instance, chosen, config)
    }

    fn from_physical_device(instance: ash::Instance, physical_device: vk::PhysicalDevice, _config: &DeviceRegistryConfig) -> Result<Arc<Device>> {
        let queue_family_properties = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let families = select_queue_families(&queue_family_properties);

        let priorities = [1.0f32];
        let queue_infos = unique_family_indices(&families)
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo::default().queue_family_index(family).queue_priorities(&priorities))
            .collect::<Vec<_>>();

        let extension_names: Vec<*const i8> = required_device_extensions()
            .iter()
            .map(|s| s.as_ptr())
            .collect();

        let mut timeline_features = vk::PhysicalDeviceTimelineSemaphoreFeatures::default().timeline_semaphore(true);
        let mut buffer_address_features = vk::PhysicalDeviceBufferDeviceAddressFeatures::default().buffer_device_address(true);
        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut timeline_features)
            .push_next(&mut buffer_address_features);

        let raw = unsafe { instance.create_device(physical_device, &device_create_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("vkCreateDevice failed: {e:?}")))?;

        let graphics_queue = unsafe { raw.get_device_queue(families.graphics, 0) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let device_properties = unsafe { instance.get_physical_device_properties(physical_device) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(families.graphics)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let staging_pool = unsafe { raw.create_command_pool(&pool_info, None)? };

        log::info!(
            "selected queue families graphics={} compute={} transfer={}, enabled {} device extensions",
            families.graphics,
            families.compute,
            families.transfer,
            extension_names.len(),
        );

        let shared = Arc::new(DeviceShared {
            instance,
            physical_device,
            raw,
            families,
            memory_properties,
            limits: device_properties.limits,
            staging_pool: Mutex::new(staging_pool),
            graphics_queue,
        });

        let alloc_config = gpu_alloc::Config::i_am_prototyping();
        let props = alloc::device_properties(&memory_properties, &device_properties.limits, true);
        let mem_allocator = gpu_alloc::GpuAllocator::new(alloc_config, props);
        let desc_allocator = gpu_descriptor::DescriptorAllocator::new(0);

        let event_loop = EventLoop::new(shared.clone())?;
        let semaphores = SemaphorePool::new(shared.clone());

        Ok(Arc::new(Device {
            shared,
            mem_allocator: Mutex::new(mem_allocator),
            desc_allocator: Mutex::new(desc_allocator),
            event_loop,
            semaphores,
        }))
    }

    pub fn poll_events(&self, timeout_ns: u64) -> Result<()> {
        self.event_loop.poll_events(timeout_ns)
    }

    pub fn wakeup_event_loop(&self) {
        self.event_loop.wakeup();
    }

    /// `newCommandQueue` (spec.md §6): a submission channel bound to this
    /// device, carrying its own Vulkan command pool.
    pub fn new_command_queue(self: &Arc<Self>) -> Result<Arc<crate::queue::CommandQueue>> {
        Ok(Arc::new(crate::queue::CommandQueue::new(self.clone())?))
    }

    pub(crate) fn register_completion(&self, semaphore: vk::Semaphore, target: u64, callback: Box<dyn FnOnce() + Send>) {
        self.event_loop.wait_for_semaphore(semaphore, target, callback);
    }
}

fn device_meets_floor(instance: &ash::Instance, pd: vk::PhysicalDevice, config: &DeviceRegistryConfig) -> bool {
    let props = unsafe { instance.get_physical_device_properties(pd) };
    if props.api_version < config.minimum_api_version {
        return false;
    }
    let _ = config.preferred_vendor_id; // ordering preference, not a disqualifier
    if !config.require_timeline_semaphores {
        return true;
    }
    let mut timeline = vk::PhysicalDeviceTimelineSemaphoreFeatures::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut timeline);
    unsafe { instance.get_physical_device_features2(pd, &mut features2) };
    timeline.timeline_semaphore == vk::TRUE
}

/// Scans the family list once, preferring the family exposing the most of
/// {graphics, compute, transfer} simultaneously, then duplicates that
/// selection into every capability slot (spec.md §4.1).
fn select_queue_families(properties: &[vk::QueueFamilyProperties]) -> QueueFamilies {
    let mut best_index = 0u32;
    let mut best_bits = -1i32;
    for (index, family) in properties.iter().enumerate() {
        let flags = family.queue_flags;
        let bits = flags.contains(vk::QueueFlags::GRAPHICS) as i32
            + flags.contains(vk::QueueFlags::COMPUTE) as i32
            + flags.contains(vk::QueueFlags::TRANSFER) as i32;
        if bits > best_bits {
            best_bits = bits;
            best_index = index as u32;
        }
    }
    QueueFamilies { graphics: best_index, compute: best_index, transfer: best_index }
}

fn unique_family_indices(families: &QueueFamilies) -> Vec<u32> {
    let mut v = vec![families.graphics, families.compute, families.transfer];
    v.sort_unstable();
    v.dedup();
    v
}

fn required_device_extensions() -> Vec<&'static CStr> {
    vec![
        ash::extensions::khr::Swapchain::name(),
        ash::extensions::khr::ExternalMemoryFd::name(),
        ash::extensions::khr::ExternalSemaphoreFd::name(),
    ]
}
