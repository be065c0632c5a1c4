//! Per-thread call stacks.
use std::sync::Arc;

use crate::error::{Result, RuntimeError};
use crate::frame::StackFrame;
use crate::runtime::Runtime;

/// One logical thread of execution. The thread exclusively owns its call
/// stack, the last frame is the one currently executing.
#[derive(Debug)]
pub struct Thread {
    id: usize,
    name: String,
    runtime: Arc<Runtime>,
    call_stack: Vec<StackFrame>,
    stack_size: usize,
}

impl Thread {
    pub fn new(id: usize, name: &str, runtime: Arc<Runtime>) -> Self {
        let stack_size = runtime.config().stack_size;
        Self {
            id,
            name: name.to_string(),
            runtime,
            call_stack: Vec::with_capacity(stack_size),
            stack_size,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Number of frames on the call stack.
    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.call_stack.is_empty()
    }

    /// Frames from the bottom of the stack to the top.
    pub fn frames(&self) -> &[StackFrame] {
        &self.call_stack
    }

    pub fn push_frame(&mut self, frame: StackFrame) -> Result<()> {
        let depth = self.call_stack.len();
        if depth == self.stack_size {
            return Err(RuntimeError::StackOverflow { depth });
        }
        tracing::trace!(
            target: "brewvm::thread",
            thread = self.id,
            depth = depth + 1,
            method = %frame.method(),
            "push frame"
        );
        self.call_stack.push(frame);
        Ok(())
    }

    /// Pop the top frame. Popping an empty call stack does nothing.
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        let frame = self.call_stack.pop()?;
        tracing::trace!(
            target: "brewvm::thread",
            thread = self.id,
            depth = self.call_stack.len(),
            method = %frame.method(),
            "pop frame"
        );
        Some(frame)
    }

    pub fn peek_frame(&self) -> Result<&StackFrame> {
        self.call_stack.last().ok_or(RuntimeError::EmptyCallStack)
    }

    pub fn peek_frame_mut(&mut self) -> Result<&mut StackFrame> {
        self.call_stack.last_mut().ok_or(RuntimeError::EmptyCallStack)
    }

    /// Return from the top frame with a value: pop it and push its top
    /// operand onto the caller.
    pub fn return_value(&mut self) -> Result<()> {
        let mut callee = self.pop_frame().ok_or(RuntimeError::EmptyCallStack)?;
        let caller = self.peek_frame_mut()?;
        callee.pass_return(caller)
    }

    /// Return from the top frame without a value.
    pub fn return_void(&mut self) -> Result<()> {
        self.pop_frame().map(|_| ()).ok_or(RuntimeError::EmptyCallStack)
    }
}
