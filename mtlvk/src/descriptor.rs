//! Bridges `ash`'s descriptor-pool/-set calls to [`gpu_descriptor`]'s
//! pool-allocator, mirroring [`alloc::AshMemoryDevice`](crate::alloc) but for
//! descriptor sets instead of device memory. Backs the transient descriptor
//! pools render/compute encoders open (spec.md §4.9/§4.10).

use ash::vk;
use gpu_descriptor::{
    allocation_error::{CreatePoolError, DeviceAllocationError},
    DescriptorDevice, DescriptorPoolCreateFlags, DescriptorTotalCount,
};

pub struct AshDescriptorDevice<'a>(&'a ash::Device);

impl<'a> AshDescriptorDevice<'a> {
    pub fn wrap(device: &'a ash::Device) -> Self {
        Self(device)
    }
}

impl<'a> DescriptorDevice<vk::DescriptorSetLayout, vk::DescriptorPool, vk::DescriptorSet> for AshDescriptorDevice<'a> {
    unsafe fn create_descriptor_pool(
        &self,
        descriptor_count: &DescriptorTotalCount,
        max_sets: u32,
        flags: DescriptorPoolCreateFlags,
    ) -> Result<vk::DescriptorPool, CreatePoolError> {
        let mut sizes = Vec::new();
        let mut push = |ty: vk::DescriptorType, count: u32| {
            if count > 0 {
                sizes.push(vk::DescriptorPoolSize { ty, descriptor_count: count });
            }
        };
        push(vk::DescriptorType::SAMPLER, descriptor_count.sampler);
        push(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, descriptor_count.combined_image_sampler);
        push(vk::DescriptorType::SAMPLED_IMAGE, descriptor_count.sampled_image);
        push(vk::DescriptorType::STORAGE_IMAGE, descriptor_count.storage_image);
        push(vk::DescriptorType::UNIFORM_BUFFER, descriptor_count.uniform_buffer);
        push(vk::DescriptorType::STORAGE_BUFFER, descriptor_count.storage_buffer);
        push(vk::DescriptorType::INPUT_ATTACHMENT, descriptor_count.input_attachment);

        let vk_flags = if flags.contains(DescriptorPoolCreateFlags::UPDATE_AFTER_BIND) {
            vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
        } else {
            vk::DescriptorPoolCreateFlags::empty()
        };

        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&sizes)
            .flags(vk_flags);
        self.0
            .create_descriptor_pool(&info, None)
            .map_err(|_| CreatePoolError::OutOfDeviceMemory)
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.0.destroy_descriptor_pool(pool, None);
    }

    unsafe fn alloc_descriptor_sets<'b>(
        &self,
        pool: &mut vk::DescriptorPool,
        layouts: impl ExactSizeIterator<Item = &'b vk::DescriptorSetLayout>,
        sets: &mut impl Extend<vk::DescriptorSet>,
    ) -> Result<(), DeviceAllocationError>
    where
        vk::DescriptorSetLayout: 'b,
    {
        let layouts: Vec<_> = layouts.copied().collect();
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(*pool)
            .set_layouts(&layouts);
        let allocated = self
            .0
            .allocate_descriptor_sets(&info)
            .map_err(|_| DeviceAllocationError::OutOfDeviceMemory)?;
        sets.extend(allocated);
        Ok(())
    }

    unsafe fn dealloc_descriptor_sets<'b>(&self, pool: &mut vk::DescriptorPool, sets: impl Iterator<Item = vk::DescriptorSet>) {
        let sets: Vec<_> = sets.collect();
        let _ = self.0.free_descriptor_sets(*pool, &sets);
    }
}
