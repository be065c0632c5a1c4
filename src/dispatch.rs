//! Method invocation: `invokestatic`, `invokevirtual` and `invokespecial`.
//!
//! All three protocols run against the current top frame of a thread as
//! the caller. They resolve the constant pool entry at the given index,
//! pop the arguments off the caller's operand stack and then either call
//! the native bridge, pushing its result back on the caller, or push a
//! fresh frame for the target method with the arguments in its locals.
//!
//! Arguments are popped before the receiver, override and native lookups
//! run. When any of these returns `Err` the caller's operand stack is left
//! in an unspecified state and the thread should be halted.
use std::sync::Arc;

use crate::bytecode::{decode_invoke, OPCode, INVOKE_LENGTH};
use crate::error::{Result, RuntimeError};
use crate::frame::StackFrame;
use crate::program::Method;
use crate::thread::Thread;
use crate::value::Value;

/// What a successful invocation did to the thread. After an error the
/// caller frame may have lost some or all of its arguments.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Invoked {
    /// A native function ran, its result (if any) is on the caller's stack.
    Native,
    /// A new frame is on top of the call stack, execution starts at pc 0.
    Frame,
}

impl Thread {
    /// Execute the invocation instruction at `pc` of the current method.
    /// The caller's pc snapshot is set to the next instruction first.
    pub fn invoke(&mut self, code: &[u8], pc: u32) -> Result<Invoked> {
        let (opcode, index) = decode_invoke(code, pc as usize)?;
        let next = pc
            .checked_add(INVOKE_LENGTH as u32)
            .ok_or(RuntimeError::TruncatedInstruction(pc as usize))?;
        self.peek_frame_mut()?.set_pc(next);
        match opcode {
            OPCode::InvokeStatic => self.invoke_static(index),
            OPCode::InvokeVirtual => self.invoke_virtual(index),
            OPCode::InvokeSpecial => self.invoke_special(index),
        }
    }

    /// Invoke a class method.
    pub fn invoke_static(&mut self, index: u16) -> Result<Invoked> {
        let method = self.resolve_method(index)?;
        if !method.is_static() {
            return Err(RuntimeError::NotStaticMethod(method.to_string()));
        }
        let params = self.peek_frame_mut()?.pop_args(method.parameter_count())?;
        self.enter(&method, params)
    }

    /// Invoke an instance method, selecting the implementation from the
    /// receiver's runtime class. Static methods never override.
    pub fn invoke_virtual(&mut self, index: u16) -> Result<Invoked> {
        let method = self.resolve_method(index)?;
        if method.is_static() {
            return Err(RuntimeError::NotInstanceMethod(method.to_string()));
        }
        // with an extra objectref: this
        let params = self
            .peek_frame_mut()?
            .pop_args(method.parameter_count() + 1)?;
        let objectref = params[0]
            .as_reference()
            .ok_or_else(|| RuntimeError::InvalidReceiver(method.to_string()))?;
        let key = method.signature_key();
        let overriding = objectref
            .class()
            .find_virtual_method(&key)
            .ok_or_else(|| RuntimeError::MethodNotFound {
                class: objectref.class().name().to_string(),
                name: method.name().to_string(),
                descriptor: method.descriptor().to_string(),
            })?;
        self.enter(&overriding, params)
    }

    /// Invoke an instance method exactly as resolved, without looking for
    /// overrides. Used for constructors, private methods and `super` calls.
    pub fn invoke_special(&mut self, index: u16) -> Result<Invoked> {
        let method = self.resolve_method(index)?;
        if method.is_static() {
            return Err(RuntimeError::NotInstanceMethod(method.to_string()));
        }
        let params = self
            .peek_frame_mut()?
            .pop_args(method.parameter_count() + 1)?;
        if params[0].as_reference().is_none() {
            return Err(RuntimeError::InvalidReceiver(method.to_string()));
        }
        self.enter(&method, params)
    }

    /// Resolve a method reference from the current method's constant pool.
    fn resolve_method(&self, index: u16) -> Result<Arc<Method>> {
        let class = self.peek_frame()?.method().class()?;
        class
            .constant_pool()
            .resolve_method(index, self.runtime().method_area())
    }

    fn enter(&mut self, method: &Arc<Method>, params: Vec<Value>) -> Result<Invoked> {
        if method.is_native() {
            let result = self.runtime().natives().invoke_native(method, &params)?;
            if !method.return_type().is_void() {
                self.peek_frame_mut()?.push(result.unwrap_or(Value::Null))?;
            }
            return Ok(Invoked::Native);
        }

        let mut frame = StackFrame::new(Arc::clone(method));
        // pass parameters
        for (j, param) in params.into_iter().enumerate() {
            frame.store_var(j, param)?;
        }
        self.push_frame(frame)?;
        Ok(Invoked::Frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::constant_pool::{Constant, MemberRef};
    use crate::error::RuntimeErrorKind;
    use crate::native::NativeRegistry;
    use crate::program::{ClassBuilder, MethodArea, MethodDef, Object, ACC_NATIVE, ACC_STATIC};
    use crate::runtime::Runtime;

    /// `Main.main` with a pool of references into `Lib`.
    fn thread() -> Thread {
        let lib = ClassBuilder::new("Lib")
            .method(MethodDef::new("twice", "(I)I").flags(ACC_STATIC).max_locals(1).max_stack(2))
            .method(MethodDef::new("size", "()I").max_locals(1).max_stack(1))
            .method(MethodDef::new("log", "(I)V").flags(ACC_STATIC | ACC_NATIVE))
            .method(MethodDef::new("unbound", "(I)I").flags(ACC_STATIC | ACC_NATIVE))
            .build()
            .unwrap();
        let main = ClassBuilder::new("Main")
            .constant(Constant::MethodRef(MemberRef::new("Lib", "twice", "(I)I")))
            .constant(Constant::MethodRef(MemberRef::new("Lib", "size", "()I")))
            .constant(Constant::MethodRef(MemberRef::new("Lib", "log", "(I)V")))
            .constant(Constant::MethodRef(MemberRef::new("Lib", "gone", "()V")))
            .constant(Constant::MethodRef(MemberRef::new("Lib", "unbound", "(I)I")))
            .method(MethodDef::new("main", "()V").flags(ACC_STATIC).max_stack(4).max_locals(1))
            .build()
            .unwrap();
        let entry = main.find_method("main()V").unwrap();
        let mut area = MethodArea::new();
        area.define(lib);
        area.define(main);
        let mut natives = NativeRegistry::new();
        natives.register("Lib", "log", |_: i32| ());

        let runtime = Runtime::new(RuntimeConfig::default(), area, natives);
        let mut thread = runtime.spawn_thread("main");
        thread.push_frame(StackFrame::new(entry)).unwrap();
        thread
    }

    #[test]
    fn invoke_decodes_and_saves_the_return_pc() {
        let mut thread = thread();
        thread.peek_frame_mut().unwrap().push(Value::Int(21)).unwrap();
        // bipush 21, invokestatic #1
        let code = [0x10, 0x15, 0xb8, 0x00, 0x01];
        assert_eq!(thread.invoke(&code, 2).unwrap(), Invoked::Frame);
        assert_eq!(thread.depth(), 2);
        assert_eq!(thread.frames()[0].pc(), 5);
        assert_eq!(thread.peek_frame().unwrap().load_var(0).unwrap(), Value::Int(21));
    }

    #[test]
    fn invoke_rejects_a_pc_past_the_code() {
        let mut thread = thread();
        let code = [0xb8, 0x00, 0x01];
        assert!(matches!(
            thread.invoke(&code, u32::MAX),
            Err(RuntimeError::TruncatedInstruction(_))
        ));
        assert!(matches!(
            thread.invoke(&code, 1),
            Err(RuntimeError::UnsupportedOpcode(0x00))
        ));
        assert_eq!(thread.peek_frame().unwrap().pc(), 0);
    }

    #[test]
    fn static_path_rejects_instance_methods() {
        let mut thread = thread();
        let err = thread.invoke_static(2).unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::ProtocolMisuse);
        assert_eq!(thread.depth(), 1);
    }

    #[test]
    fn instance_paths_reject_static_methods() {
        let mut thread = thread();
        thread.peek_frame_mut().unwrap().push(Value::Null).unwrap();
        thread.peek_frame_mut().unwrap().push(Value::Int(1)).unwrap();
        assert!(matches!(thread.invoke_virtual(1), Err(RuntimeError::NotInstanceMethod(_))));
        assert!(matches!(thread.invoke_special(1), Err(RuntimeError::NotInstanceMethod(_))));
    }

    #[test]
    fn null_receivers_are_rejected() {
        let mut thread = thread();
        thread.peek_frame_mut().unwrap().push(Value::Null).unwrap();
        let err = thread.invoke_virtual(2).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidReceiver(_)));
        assert_eq!(err.kind(), RuntimeErrorKind::ProtocolMisuse);

        thread.peek_frame_mut().unwrap().push(Value::Null).unwrap();
        let err = thread.invoke_special(2).unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::ProtocolMisuse);
    }

    #[test]
    fn failed_native_calls_report_the_missing_symbol() {
        let mut thread = thread();
        let caller = thread.peek_frame_mut().unwrap();
        caller.push(Value::Int(99)).unwrap();
        caller.push(Value::Int(1)).unwrap();
        let err = thread.invoke_static(5).unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::UnresolvedNative);
        assert!(matches!(
            err,
            RuntimeError::NativeNotFound(symbol) if symbol == "Java_Lib_unbound"
        ));
        // no frame was entered, the operand stack is not restored
        assert_eq!(thread.depth(), 1);
        assert_eq!(thread.peek_frame().unwrap().depth(), 1);
    }

    #[test]
    fn unresolvable_references_fail_linkage() {
        let mut thread = thread();
        assert_eq!(
            thread.invoke_static(4).unwrap_err().kind(),
            RuntimeErrorKind::Linkage
        );
        assert_eq!(
            thread.invoke_static(9).unwrap_err().kind(),
            RuntimeErrorKind::Linkage
        );
    }

    #[test]
    fn native_void_calls_push_nothing() {
        let mut thread = thread();
        let caller = thread.peek_frame_mut().unwrap();
        caller.push(Value::Int(3)).unwrap();
        caller.push(Value::Int(4)).unwrap();
        assert_eq!(thread.invoke_static(3).unwrap(), Invoked::Native);
        assert_eq!(thread.depth(), 1);
        assert_eq!(thread.peek_frame().unwrap().depth(), 1);
    }

    #[test]
    fn invocation_needs_a_caller_frame() {
        let mut thread = thread();
        thread.pop_frame();
        assert!(matches!(thread.invoke_static(1), Err(RuntimeError::EmptyCallStack)));
    }

    #[test]
    fn receivers_must_be_objects_for_special_calls() {
        let mut thread = thread();
        let lib = thread.runtime().method_area().get("Lib").unwrap();
        let caller = thread.peek_frame_mut().unwrap();
        caller.push(Value::Reference(Object::new(&lib))).unwrap();
        assert_eq!(thread.invoke_special(2).unwrap(), Invoked::Frame);
        assert_eq!(thread.peek_frame().unwrap().method().name(), "size");
    }
}
