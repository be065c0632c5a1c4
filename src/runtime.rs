//! JVM runtime module: the execution environment shared by all threads.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::native::NativeRegistry;
use crate::program::MethodArea;
use crate::thread::Thread;

/// `Runtime` holds what every thread reads: loaded classes, registered
/// native functions and configuration.
///
/// Class linking and native registration are complete by the time a
/// `Runtime` is built, after that it is only read, so threads share it
/// without further locking. Each [`Thread`] owns its own call stack.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    method_area: MethodArea,
    natives: NativeRegistry,
    next_thread_id: AtomicUsize,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, method_area: MethodArea, natives: NativeRegistry) -> Arc<Self> {
        Arc::new(Self {
            config,
            method_area,
            natives,
            next_thread_id: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn method_area(&self) -> &MethodArea {
        &self.method_area
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Create a new thread with an empty call stack.
    pub fn spawn_thread(self: &Arc<Self>, name: &str) -> Thread {
        let id = self.next_thread_id.fetch_add(1, Ordering::Relaxed);
        Thread::new(id, name, Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_get_distinct_ids_and_the_configured_stack() {
        let runtime = Runtime::new(RuntimeConfig::default(), MethodArea::new(), NativeRegistry::new());
        let a = runtime.spawn_thread("a");
        let b = runtime.spawn_thread("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(b.name(), "b");
        assert_eq!(a.runtime().config().stack_size, 512);
    }

    #[test]
    fn runtime_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Runtime>();
        assert_send_sync::<Thread>();
    }
}
