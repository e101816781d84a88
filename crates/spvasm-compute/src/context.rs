use crate::config::HarnessConfig;
use anyhow::{Context as _, Result, anyhow};
use ash::vk;
use bytesize::ByteSize;
use gpu_alloc::{GpuAllocator, MemoryBlock, Request, UsageFlags};
use gpu_alloc_ash::AshMemoryDevice;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// The Vulkan instance, device and universal queue that test cases run on.
///
/// One context is created per harness run and shared by every case.
pub struct Context {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: Mutex<vk::Queue>,
    queue_family_index: u32,
    memory_allocator: Mutex<GpuAllocator<vk::DeviceMemory>>,
    limits: vk::PhysicalDeviceLimits,
    device_name: String,
    _entry: ash::Entry,
}

/// A storage buffer bound to host-visible memory.
pub struct HostBuffer {
    pub(crate) buffer: vk::Buffer,
    block: MemoryBlock<vk::DeviceMemory>,
    size: u64,
}

impl HostBuffer {
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Context {
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let api_version = config.vk_api_version()?;
        unsafe {
            let entry = ash::Entry::load().context("Failed to load Vulkan entry")?;

            let instance = entry
                .create_instance(
                    &vk::InstanceCreateInfo::default().application_info(
                        &vk::ApplicationInfo::default()
                            .application_name(c"spvasm-compute")
                            .application_version(vk::make_api_version(0, 0, 1, 0))
                            .engine_name(c"spvasm-compute")
                            .engine_version(vk::make_api_version(0, 0, 1, 0))
                            .api_version(api_version),
                    ),
                    None,
                )
                .context("Failed to create Vulkan instance")?;

            let opened = match open_device(&instance, config.device_index) {
                Ok(opened) => opened,
                Err(e) => {
                    instance.destroy_instance(None);
                    return Err(e);
                }
            };

            info!(
                "Using Vulkan device '{}' (queue family {})",
                opened.device_name, opened.queue_family_index
            );

            let queue = opened.device.get_device_queue(opened.queue_family_index, 0);
            Ok(Self {
                instance,
                physical_device: opened.physical_device,
                queue: Mutex::new(queue),
                device: opened.device,
                queue_family_index: opened.queue_family_index,
                memory_allocator: Mutex::new(opened.memory_allocator),
                limits: opened.limits,
                device_name: opened.device_name,
                _entry: entry,
            })
        }
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn universal_queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Number of storage buffers a single compute descriptor set may bind.
    pub fn max_storage_buffers(&self) -> u32 {
        self.limits
            .max_per_stage_descriptor_storage_buffers
            .min(self.limits.max_descriptor_set_storage_buffers)
    }

    /// Locks the universal queue for submission.
    pub(crate) fn universal_queue(&self) -> Result<MutexGuard<'_, vk::Queue>> {
        self.queue
            .lock()
            .map_err(|_| anyhow!("Universal queue lock poisoned"))
    }

    fn allocator(&self) -> Result<MutexGuard<'_, GpuAllocator<vk::DeviceMemory>>> {
        self.memory_allocator
            .lock()
            .map_err(|_| anyhow!("GPU allocator lock poisoned"))
    }

    /// Creates a storage buffer of `data.len()` bytes in host-visible memory
    /// and copies `data` into it.
    pub fn create_host_buffer(&self, data: &[u8]) -> Result<HostBuffer> {
        anyhow::ensure!(!data.is_empty(), "Cannot create a zero-sized buffer");
        let size = data.len() as u64;
        unsafe {
            let buffer = self
                .device
                .create_buffer(
                    &vk::BufferCreateInfo::default()
                        .size(size)
                        .usage(vk::BufferUsageFlags::STORAGE_BUFFER)
                        .sharing_mode(vk::SharingMode::EXCLUSIVE),
                    None,
                )
                .context("Failed to create buffer")?;

            let block = match self.allocate_and_bind(buffer) {
                Ok(block) => block,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };
            let mut host_buffer = HostBuffer {
                buffer,
                block,
                size,
            };

            if let Err(e) = self.write_host_buffer(&mut host_buffer, data) {
                self.destroy_host_buffer(host_buffer);
                return Err(e);
            }
            debug!("Created storage buffer ({})", ByteSize::b(size));
            Ok(host_buffer)
        }
    }

    unsafe fn allocate_and_bind(
        &self,
        buffer: vk::Buffer,
    ) -> Result<MemoryBlock<vk::DeviceMemory>> {
        unsafe {
            let memory_requirements = self.device.get_buffer_memory_requirements(buffer);
            let block = self
                .allocator()?
                .alloc(
                    AshMemoryDevice::wrap(&self.device),
                    Request {
                        usage: UsageFlags::HOST_ACCESS,
                        align_mask: memory_requirements.alignment - 1,
                        size: memory_requirements.size,
                        memory_types: memory_requirements.memory_type_bits,
                    },
                )
                .context("Failed to allocate buffer memory")?;

            if let Err(e) = self
                .device
                .bind_buffer_memory(buffer, *block.memory(), block.offset())
            {
                self.allocator()?
                    .dealloc(AshMemoryDevice::wrap(&self.device), block);
                return Err(e).context("Failed to bind buffer memory");
            }
            Ok(block)
        }
    }

    /// Copies `data` to the start of the buffer, flushing non-coherent memory.
    pub fn write_host_buffer(&self, buffer: &mut HostBuffer, data: &[u8]) -> Result<()> {
        unsafe {
            buffer
                .block
                .write_bytes(AshMemoryDevice::wrap(&self.device), 0, data)
                .context("Failed to write buffer memory")
        }
    }

    /// Reads `len` bytes from the start of the buffer, invalidating
    /// non-coherent memory first.
    pub fn read_host_buffer(&self, buffer: &mut HostBuffer, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        unsafe {
            buffer
                .block
                .read_bytes(AshMemoryDevice::wrap(&self.device), 0, &mut data)
                .context("Failed to read buffer memory")?;
        }
        Ok(data)
    }

    pub fn destroy_host_buffer(&self, buffer: HostBuffer) {
        unsafe {
            self.device.destroy_buffer(buffer.buffer, None);
            match self.allocator() {
                Ok(mut allocator) => {
                    allocator.dealloc(AshMemoryDevice::wrap(&self.device), buffer.block);
                }
                // The block's memory is reclaimed when the device is destroyed.
                Err(e) => tracing::error!("Leaking buffer memory: {}", e),
            }
        }
    }
}

/// Everything [`Context::new`] creates after the instance.
struct OpenedDevice {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue_family_index: u32,
    memory_allocator: GpuAllocator<vk::DeviceMemory>,
    limits: vk::PhysicalDeviceLimits,
    device_name: String,
}

/// Opens the device at `device_index`. Nothing is left alive on error, so the
/// caller only has to release the instance.
unsafe fn open_device(instance: &ash::Instance, device_index: usize) -> Result<OpenedDevice> {
    unsafe {
        let physical_devices = instance
            .enumerate_physical_devices()
            .context("Failed to enumerate physical devices")?;
        let physical_device = *physical_devices.get(device_index).with_context(|| {
            format!(
                "No Vulkan device at index {} ({} found)",
                device_index,
                physical_devices.len()
            )
        })?;
        let properties = instance.get_physical_device_properties(physical_device);
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let queue_family_index = compute_queue_family(
            &instance.get_physical_device_queue_family_properties(physical_device),
        )
        .context("No compute queue family found")?;

        let memory_properties = gpu_alloc_ash::device_properties(instance, 0, physical_device)
            .context("Failed to query device memory properties")?;

        let device = instance
            .create_device(
                physical_device,
                &vk::DeviceCreateInfo::default()
                    .queue_create_infos(&[vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(queue_family_index)
                        .queue_priorities(&[1.0])])
                    .enabled_features(&vk::PhysicalDeviceFeatures::default()),
                None,
            )
            .context("Failed to create Vulkan device")?;

        Ok(OpenedDevice {
            physical_device,
            device,
            queue_family_index,
            memory_allocator: GpuAllocator::new(
                gpu_alloc::Config::i_am_potato(),
                memory_properties,
            ),
            limits: properties.limits,
            device_name,
        })
    }
}

/// The first family with compute support acts as the universal queue.
fn compute_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|props| props.queue_flags.contains(vk::QueueFlags::COMPUTE))
        .map(|index| index as u32)
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe {
            if let Ok(allocator) = self.memory_allocator.get_mut() {
                allocator.cleanup(AshMemoryDevice::wrap(&self.device));
            }
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
