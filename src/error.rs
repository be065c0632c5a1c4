//! Runtime errors raised by the execution engine.
//!
//! Every error here is a VM-internal invariant violation: invalid bytecode,
//! a broken class hierarchy or a misconfigured native registry. None of them
//! are retried. Dispatch entry points hand them back to the host, which can
//! halt the offending thread or the whole process with [`halt`].
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Coarse classification of a [`RuntimeError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Pushing a frame would exceed the call-stack capacity.
    StackOverflow,
    /// An invocation protocol was used on a target it does not apply to.
    ProtocolMisuse,
    /// Native symbol missing or called with the wrong arguments.
    UnresolvedNative,
    /// A symbolic reference could not be resolved.
    Linkage,
    /// Frame bookkeeping went out of bounds.
    Internal,
}

/// `RuntimeError` represents the possible execution failures of a thread.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack overflow: call stack already holds {depth} frames")]
    StackOverflow { depth: usize },

    #[error("not an instance method: {0}")]
    NotInstanceMethod(String),
    #[error("not a static method: {0}")]
    NotStaticMethod(String),
    #[error("not a native method: {0}")]
    NotNativeMethod(String),
    #[error("receiver is not an object reference: {0}")]
    InvalidReceiver(String),
    #[error("unsupported invocation opcode 0x{0:02x}")]
    UnsupportedOpcode(u8),

    #[error("{0} does not exist")]
    NativeNotFound(String),
    #[error("{symbol} expects {expected} arguments, got {actual}")]
    NativeArityMismatch {
        symbol: String,
        expected: usize,
        actual: usize,
    },
    #[error("{symbol}: argument {index} is not a {expected}")]
    NativeArgumentType {
        symbol: String,
        index: usize,
        expected: &'static str,
    },

    #[error("constant pool index {0} out of range")]
    InvalidConstantIndex(u16),
    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstant { index: u16, expected: &'static str },
    #[error("class {0} not found")]
    ClassNotFound(String),
    #[error("method {class}.{name}{descriptor} not found")]
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },
    #[error("field {class}.{name} not found")]
    FieldNotFound { class: String, name: String },
    #[error("malformed descriptor {0:?}")]
    MalformedDescriptor(String),
    #[error("method {0} is not linked to a class")]
    Unlinked(String),
    #[error("truncated instruction at pc {0}")]
    TruncatedInstruction(usize),

    #[error("operand stack overflow (capacity {capacity})")]
    OperandStackOverflow { capacity: usize },
    #[error("operand stack underflow")]
    OperandStackUnderflow,
    #[error("local variable {index} out of range (max locals {max_locals})")]
    LocalOutOfRange { index: usize, max_locals: usize },
    #[error("field slot {index} out of range ({len} slots)")]
    FieldOutOfRange { index: usize, len: usize },
    #[error("call stack is empty")]
    EmptyCallStack,
}

impl RuntimeError {
    /// Returns the category of the error.
    pub fn kind(&self) -> RuntimeErrorKind {
        use RuntimeError::*;
        match self {
            StackOverflow { .. } => RuntimeErrorKind::StackOverflow,
            NotInstanceMethod(_)
            | NotStaticMethod(_)
            | NotNativeMethod(_)
            | InvalidReceiver(_)
            | UnsupportedOpcode(_) => RuntimeErrorKind::ProtocolMisuse,
            NativeNotFound(_)
            | NativeArityMismatch { .. }
            | NativeArgumentType { .. } => RuntimeErrorKind::UnresolvedNative,
            InvalidConstantIndex(_)
            | UnexpectedConstant { .. }
            | ClassNotFound(_)
            | MethodNotFound { .. }
            | FieldNotFound { .. }
            | MalformedDescriptor(_)
            | Unlinked(_)
            | TruncatedInstruction(_) => RuntimeErrorKind::Linkage,
            OperandStackOverflow { .. }
            | OperandStackUnderflow
            | LocalOutOfRange { .. }
            | FieldOutOfRange { .. }
            | EmptyCallStack => RuntimeErrorKind::Internal,
        }
    }
}

/// Logs a fatal error and terminates the process.
pub fn halt(err: RuntimeError) -> ! {
    tracing::error!(target: "brewvm::fatal", kind = ?err.kind(), "{err}");
    eprintln!("fatal: {err}");
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_classified() {
        assert_eq!(
            RuntimeError::StackOverflow { depth: 512 }.kind(),
            RuntimeErrorKind::StackOverflow
        );
        assert_eq!(
            RuntimeError::NotInstanceMethod("A.foo()V".into()).kind(),
            RuntimeErrorKind::ProtocolMisuse
        );
        assert_eq!(
            RuntimeError::NativeNotFound("Java_A_foo".into()).kind(),
            RuntimeErrorKind::UnresolvedNative
        );
        assert_eq!(
            RuntimeError::OperandStackUnderflow.kind(),
            RuntimeErrorKind::Internal
        );
    }

    #[test]
    fn messages_name_the_symbol() {
        let err = RuntimeError::NativeArityMismatch {
            symbol: "Java_A_foo".into(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Java_A_foo expects 2 arguments, got 1");
    }
}
