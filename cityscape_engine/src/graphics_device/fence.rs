/// Fence trait - GPU progress markers polled by the CPU

/// Result of polling a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// Every command submitted before the fence has completed
    Signaled,
    /// The device is still working on commands before the fence
    Pending,
}

/// GPU fence
///
/// Created by [`GraphicsDevice::insert_fence`](crate::graphics_device::GraphicsDevice::insert_fence)
/// after the most recently submitted command. Dropping the fence destroys it.
pub trait Fence: Send + Sync {
    /// Poll the fence without blocking
    fn status(&self) -> FenceStatus;

    /// Convenience wrapper around `status()`
    fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }
}
