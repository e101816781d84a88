//! Test case that runs one SPIR-V assembly compute shader and compares its
//! output buffers against the expected bytes.
//!
//! The shader may read any number of input storage buffers and must write at
//! least one output storage buffer. Inputs are bound first, starting at
//! binding 0 of descriptor set 0, and outputs follow them.

use crate::compare::first_mismatch;
use crate::config::HarnessConfig;
use crate::context::{Context, HostBuffer};
use crate::error::HarnessError;
use crate::programs::{BinaryCollection, SourceCollections};
use crate::spec::{BufferInterface, ComputeShaderSpec};
use crate::status::TestStatus;
use anyhow::{Context as _, Result};
use ash::vk;
use std::ffi::CString;
use std::sync::Arc;
use tracing::{debug, trace};

/// Name the shader assembly is registered under in the program collections.
pub const COMPUTE_PROGRAM: &str = "compute";

/// The fence wait never times out; a hung driver hangs the harness.
const INFINITE_TIMEOUT: u64 = u64::MAX;

pub struct SpvAsmComputeShaderCase {
    name: String,
    description: String,
    spec: Arc<ComputeShaderSpec>,
}

impl SpvAsmComputeShaderCase {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        spec: ComputeShaderSpec,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            spec: Arc::new(spec),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn spec(&self) -> &ComputeShaderSpec {
        &self.spec
    }

    pub fn init_programs(&self, programs: &mut SourceCollections) -> Result<(), HarnessError> {
        programs.add(COMPUTE_PROGRAM, self.spec.assembly.as_str())
    }

    pub fn create_instance<'a>(
        &self,
        context: &'a Context,
        binaries: &'a BinaryCollection,
    ) -> SpvAsmComputeShaderInstance<'a> {
        SpvAsmComputeShaderInstance {
            context,
            binaries,
            spec: self.spec.clone(),
        }
    }

    /// Assembles the shader, runs it once and reports the comparison result.
    pub fn run(&self, context: &Context, options: BuildOptions) -> Result<TestStatus> {
        let mut sources = SourceCollections::new();
        self.init_programs(&mut sources)?;
        let binaries = BinaryCollection::build(&sources, options.target_env, options.validate)?;
        self.create_instance(context, &binaries).iterate()
    }
}

/// How [`SpvAsmComputeShaderCase::run`] turns assembly into binaries.
#[derive(Clone, Copy)]
pub struct BuildOptions {
    pub target_env: spirv_tools::TargetEnv,
    pub validate: bool,
}

impl BuildOptions {
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            target_env: config.spirv_target_env()?,
            validate: config.validate,
        })
    }
}

pub struct SpvAsmComputeShaderInstance<'a> {
    context: &'a Context,
    binaries: &'a BinaryCollection,
    spec: Arc<ComputeShaderSpec>,
}

impl SpvAsmComputeShaderInstance<'_> {
    /// Rejects specs the dispatch cannot be built for, before any allocation.
    pub fn check_preconditions(&self) -> Result<(), HarnessError> {
        check_spec(&self.spec, self.context.max_storage_buffers())
    }

    pub fn iterate(&self) -> Result<TestStatus> {
        self.check_preconditions()?;

        let spec = &*self.spec;
        let context = self.context;
        let device = context.device();
        let mut resources = DispatchResources::new(context);

        // Inputs are copied in once; outputs start zeroed.
        for input in &spec.inputs {
            let buffer = context.create_host_buffer(input.data())?;
            resources.buffers.push(buffer);
        }
        for output in &spec.outputs {
            let buffer = context.create_host_buffer(&vec![0u8; output.num_bytes()])?;
            resources.buffers.push(buffer);
        }
        let num_buffers = resources.buffers.len() as u32;
        trace!("Created {} buffers", num_buffers);

        unsafe {
            let bindings = (0..num_buffers)
                .map(|binding| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding)
                        .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                        .descriptor_count(1)
                        .stage_flags(vk::ShaderStageFlags::COMPUTE)
                })
                .collect::<Vec<_>>();
            resources.descriptor_set_layout = device
                .create_descriptor_set_layout(
                    &vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings),
                    None,
                )
                .context("Failed to create descriptor set layout")?;

            resources.pipeline_layout = device
                .create_pipeline_layout(
                    &vk::PipelineLayoutCreateInfo::default()
                        .set_layouts(&[resources.descriptor_set_layout]),
                    None,
                )
                .context("Failed to create pipeline layout")?;

            resources.descriptor_pool = device
                .create_descriptor_pool(
                    &vk::DescriptorPoolCreateInfo::default()
                        .pool_sizes(&[vk::DescriptorPoolSize {
                            ty: vk::DescriptorType::STORAGE_BUFFER,
                            descriptor_count: num_buffers,
                        }])
                        .max_sets(1),
                    None,
                )
                .context("Failed to create descriptor pool")?;
            let descriptor_set = device
                .allocate_descriptor_sets(
                    &vk::DescriptorSetAllocateInfo::default()
                        .descriptor_pool(resources.descriptor_pool)
                        .set_layouts(&[resources.descriptor_set_layout]),
                )
                .context("Failed to allocate descriptor sets")?[0];

            {
                let buffer_infos = resources
                    .buffers
                    .iter()
                    .map(|buffer| {
                        vk::DescriptorBufferInfo::default()
                            .buffer(buffer.buffer)
                            .offset(0)
                            .range(buffer.size())
                    })
                    .collect::<Vec<_>>();
                let descriptor_writes = buffer_infos
                    .iter()
                    .enumerate()
                    .map(|(binding, buffer_info)| {
                        vk::WriteDescriptorSet::default()
                            .dst_set(descriptor_set)
                            .dst_binding(binding as u32)
                            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                            .buffer_info(std::slice::from_ref(buffer_info))
                    })
                    .collect::<Vec<_>>();
                device.update_descriptor_sets(&descriptor_writes, &[]);
            }

            let binary = self.binaries.get(COMPUTE_PROGRAM)?;
            resources.shader_module = device
                .create_shader_module(
                    &vk::ShaderModuleCreateInfo::default().code(binary.words()),
                    None,
                )
                .context("Failed to create shader module")?;
            let entry_point = CString::new(spec.entry_point.as_str())?;
            resources.pipeline = device
                .create_compute_pipelines(
                    vk::PipelineCache::null(),
                    &[vk::ComputePipelineCreateInfo::default()
                        .stage(
                            vk::PipelineShaderStageCreateInfo::default()
                                .stage(vk::ShaderStageFlags::COMPUTE)
                                .module(resources.shader_module)
                                .name(&entry_point),
                        )
                        .layout(resources.pipeline_layout)],
                    None,
                )
                .map_err(|(_, e)| e)
                .context("Failed to create compute pipeline")?[0];

            resources.command_pool = device
                .create_command_pool(
                    &vk::CommandPoolCreateInfo::default()
                        .queue_family_index(context.universal_queue_family_index()),
                    None,
                )
                .context("Failed to create command pool")?;
            let command_buffer = device
                .allocate_command_buffers(
                    &vk::CommandBufferAllocateInfo::default()
                        .command_pool(resources.command_pool)
                        .level(vk::CommandBufferLevel::PRIMARY)
                        .command_buffer_count(1),
                )
                .context("Failed to allocate command buffer")?[0];

            let [x, y, z] = spec.num_work_groups;
            device
                .begin_command_buffer(
                    command_buffer,
                    &vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .context("Failed to begin command buffer")?;
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                resources.pipeline,
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                resources.pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );
            device.cmd_dispatch(command_buffer, x, y, z);
            // The fence only orders device accesses; shader writes need an
            // explicit dependency before the host reads them back.
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[output_visibility_barrier()],
                &[],
                &[],
            );
            device
                .end_command_buffer(command_buffer)
                .context("Failed to end command buffer")?;

            resources.fence = device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .context("Failed to create fence")?;
            {
                let queue = context.universal_queue()?;
                device
                    .queue_submit(
                        *queue,
                        &[vk::SubmitInfo::default().command_buffers(&[command_buffer])],
                        resources.fence,
                    )
                    .context("Failed to submit queue")?;
            }
            debug!("Dispatched {}x{}x{} work groups", x, y, z);
            device
                .wait_for_fences(&[resources.fence], true, INFINITE_TIMEOUT)
                .context("Failed to wait for fence")?;
        }

        let output_buffers = &mut resources.buffers[spec.inputs.len()..];
        let actual = spec
            .outputs
            .iter()
            .zip(output_buffers)
            .map(|(expected, buffer)| context.read_host_buffer(buffer, expected.num_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let expected = spec.outputs.iter().map(|output| output.data()).collect::<Vec<_>>();
        if let Some(index) = first_mismatch(&expected, &actual) {
            debug!("Output {} doesn't match", index);
            return Ok(TestStatus::fail("Output doesn't match with expected"));
        }

        Ok(TestStatus::pass("Output match with expected"))
    }
}

/// Checks a spec against the harness's preconditions and the device's
/// descriptor limit.
pub fn check_spec(spec: &ComputeShaderSpec, max_storage_buffers: u32) -> Result<(), HarnessError> {
    if spec.outputs.is_empty() {
        return Err(HarnessError::NoOutputs);
    }
    if let Some(index) = spec.buffers().position(|buffer| buffer.num_bytes() == 0) {
        return Err(HarnessError::EmptyBuffer { index });
    }
    let count = spec.num_buffers();
    if count > max_storage_buffers as usize {
        return Err(HarnessError::TooManyBuffers {
            count,
            limit: max_storage_buffers,
        });
    }
    Ok(())
}

/// Makes compute shader writes available to host reads once the fence signals.
fn output_visibility_barrier() -> vk::MemoryBarrier<'static> {
    vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::HOST_READ)
}

/// Every object created for one iteration. Handles start out null, and all of
/// them are destroyed when the iteration returns, whichever way it returns.
struct DispatchResources<'a> {
    context: &'a Context,
    buffers: Vec<HostBuffer>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    descriptor_pool: vk::DescriptorPool,
    shader_module: vk::ShaderModule,
    pipeline: vk::Pipeline,
    command_pool: vk::CommandPool,
    fence: vk::Fence,
}

impl<'a> DispatchResources<'a> {
    fn new(context: &'a Context) -> Self {
        Self {
            context,
            buffers: Vec::new(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            shader_module: vk::ShaderModule::null(),
            pipeline: vk::Pipeline::null(),
            command_pool: vk::CommandPool::null(),
            fence: vk::Fence::null(),
        }
    }
}

impl Drop for DispatchResources<'_> {
    fn drop(&mut self) {
        let device = self.context.device();
        // Destroying a null handle is a no-op, so partially built sets are fine.
        unsafe {
            // Work may still be in flight if the fence wait itself failed.
            if self.fence != vk::Fence::null() {
                if let Err(e) = device.device_wait_idle() {
                    tracing::error!("Failed to wait for device idle: {}", e);
                }
            }
            device.destroy_fence(self.fence, None);
            // Frees the command buffer along with the pool.
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_shader_module(self.shader_module, None);
            // Frees the descriptor set along with the pool.
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
        for buffer in self.buffers.drain(..) {
            self.context.destroy_host_buffer(buffer);
        }
    }
}
