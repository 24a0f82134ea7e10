//! Deferred deallocation for sample buffers
//!
//! A global `basedrop` collector backs every [`basedrop::Shared`] allocation in
//! the crate. When the render thread drops the last reference to a source's
//! sample buffer (for example when a new track replaces it), the drop only
//! enqueues a pointer; the actual free happens on a background GC thread.
//!
//! Freeing a multi-minute decoded file is tens of megabytes of munmap work,
//! which would glitch the audio callback if done inline.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Global handle for creating Shared<T> allocations
static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Spawn the collector thread and return a handle to it
fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread
            let mut collector = Collector::new();

            let handle = collector.handle();
            tx.send(handle).expect("Failed to send GC handle");

            log::info!("Audio GC thread started");

            loop {
                collector.collect();

                // 100ms is fast enough for memory reclamation
                thread::sleep(Duration::from_millis(100));
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Get a handle for creating Shared<T> allocations
///
/// The handle is lightweight and can be cloned. The first call spawns the
/// collector thread.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
