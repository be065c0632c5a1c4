//! Runtime configuration.

/// Maximum number of frames on a thread's call stack.
pub const DEFAULT_VM_STACK_SIZE: usize = 512;

/// Limits shared by every thread of a [`Runtime`](crate::runtime::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Call stack capacity in frames.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_VM_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}
