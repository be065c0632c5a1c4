//! Method activation records.
use std::sync::Arc;

use crate::error::{Result, RuntimeError};
use crate::program::{Method, MethodArea};
use crate::value::{ObjectRef, Value};

/// Execution state for one method invocation. A frame is created when the
/// method is invoked and destroyed when its thread pops it on return.
///
/// The frame holds a program counter snapshot, the local variables and the
/// operand stack. Both are sized from the method's declared `max_locals`
/// and `max_stack`.
#[derive(Debug)]
pub struct StackFrame {
    method: Arc<Method>,
    // Only authoritative while the frame is not on top of the call stack,
    // the live pc of the top frame belongs to the instruction loop.
    pc: u32,
    locals: Vec<Value>,
    operand_stack: Vec<Value>,
}

impl StackFrame {
    pub fn new(method: Arc<Method>) -> Self {
        Self {
            pc: 0,
            locals: vec![Value::Uninitialized; method.max_locals()],
            operand_stack: Vec::with_capacity(method.max_stack()),
            method,
        }
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn max_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn max_stack(&self) -> usize {
        self.method.max_stack()
    }

    /// Current operand stack depth.
    pub fn depth(&self) -> usize {
        self.operand_stack.len()
    }

    pub fn load_var(&self, index: usize) -> Result<Value> {
        self.locals
            .get(index)
            .cloned()
            .ok_or(RuntimeError::LocalOutOfRange {
                index,
                max_locals: self.locals.len(),
            })
    }

    pub fn store_var(&mut self, index: usize, value: Value) -> Result<()> {
        let max_locals = self.locals.len();
        let slot = self
            .locals
            .get_mut(index)
            .ok_or(RuntimeError::LocalOutOfRange { index, max_locals })?;
        *slot = value;
        Ok(())
    }

    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.operand_stack.len() >= self.max_stack() {
            return Err(RuntimeError::OperandStackOverflow {
                capacity: self.max_stack(),
            });
        }
        self.operand_stack.push(value);
        Ok(())
    }

    /// Pop the top operand. The value moves out of the stack so the frame
    /// keeps no reference to it.
    pub fn pop(&mut self) -> Result<Value> {
        self.operand_stack
            .pop()
            .ok_or(RuntimeError::OperandStackUnderflow)
    }

    pub fn peek(&self) -> Result<&Value> {
        self.operand_stack
            .last()
            .ok_or(RuntimeError::OperandStackUnderflow)
    }

    /// Pop `count` invocation arguments. The last pushed argument comes off
    /// first, so the buffer is filled back to front to restore push order.
    pub fn pop_args(&mut self, count: usize) -> Result<Vec<Value>> {
        if self.operand_stack.len() < count {
            return Err(RuntimeError::OperandStackUnderflow);
        }
        let mut params = vec![Value::Uninitialized; count];
        for i in (0..count).rev() {
            params[i] = self.pop()?;
        }
        Ok(params)
    }

    pub fn get_field(&self, objectref: &ObjectRef, index: u16, area: &MethodArea) -> Result<Value> {
        let slot = self
            .method
            .class()?
            .constant_pool()
            .resolve_field(index, area)?;
        objectref.get_field(slot)
    }

    pub fn put_field(
        &self,
        objectref: &ObjectRef,
        index: u16,
        value: Value,
        area: &MethodArea,
    ) -> Result<()> {
        let slot = self
            .method
            .class()?
            .constant_pool()
            .resolve_field(index, area)?;
        objectref.put_field(slot, value)
    }

    /// Move the callee's arguments from this frame's operand stack into the
    /// callee's locals. Instance methods also take the receiver into slot 0.
    pub fn pass_parameters(&mut self, callee: &mut StackFrame) -> Result<()> {
        let method = Arc::clone(&callee.method);
        let mut count = method.parameter_count();
        if !method.is_static() {
            count += 1;
        }
        if count > callee.max_locals() {
            return Err(RuntimeError::LocalOutOfRange {
                index: count - 1,
                max_locals: callee.max_locals(),
            });
        }
        for (i, param) in self.pop_args(count)?.into_iter().enumerate() {
            callee.store_var(i, param)?;
        }
        Ok(())
    }

    /// Hand this frame's return value to the caller.
    pub fn pass_return(&mut self, caller: &mut StackFrame) -> Result<()> {
        caller.push(self.pop()?)
    }
}
