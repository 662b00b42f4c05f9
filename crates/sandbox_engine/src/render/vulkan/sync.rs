//! Frame synchronization primitives
//!
//! RAII wrappers for semaphores and fences plus the per-slot bundle used by
//! the frame ring. Fences start signaled so the first wait on each slot
//! returns immediately.

use super::context::{VulkanError, VulkanResult};
use ash::vk;
use ash::Device;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: device.clone(),
            semaphore,
        })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally in the signaled state
    pub fn new(device: &Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence =
            unsafe { device.create_fence(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self {
            device: device.clone(),
            fence,
        })
    }

    /// Block until the fence signals or the timeout elapses
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout_ns)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization bundle for one in-flight frame slot
pub struct FrameSync {
    /// Signaled when the swapchain image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering to the image has finished
    pub render_finished: Semaphore,
    /// Signaled when all submitted work for this slot has completed
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

/// Advance an in-flight slot index to the next slot
pub fn next_frame_index(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_wraps_at_ring_size() {
        let mut index = 0;
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            index = next_frame_index(index);
        }
        assert_eq!(index, 0);
    }

    #[test]
    fn test_frame_index_visits_every_slot() {
        let mut seen = vec![false; MAX_FRAMES_IN_FLIGHT];
        let mut index = 0;
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            seen[index] = true;
            index = next_frame_index(index);
        }
        assert!(seen.iter().all(|&visited| visited));
    }
}
