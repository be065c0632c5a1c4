//! Execution engine core for a JVM style interpreter.
//!
//! A [`Runtime`] holds loaded classes and registered native functions and
//! hands out [`Thread`]s. Each thread owns a bounded call stack of
//! [`StackFrame`]s, and its dispatch entry points implement
//! `invokestatic`, `invokevirtual` and `invokespecial` on top of it.
pub mod bytecode;
pub mod config;
pub mod constant_pool;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod native;
pub mod program;
pub mod runtime;
pub mod thread;
pub mod value;

pub use config::{RuntimeConfig, DEFAULT_VM_STACK_SIZE};
pub use dispatch::Invoked;
pub use error::{Result, RuntimeError, RuntimeErrorKind};
pub use frame::StackFrame;
pub use native::NativeRegistry;
pub use runtime::Runtime;
pub use thread::Thread;
pub use value::{ObjectRef, Value};
