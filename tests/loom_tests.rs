//! Loom-based concurrency tests
//!
//! These tests use the `loom` library to exhaustively check all possible
//! thread interleavings of the registry's acquire/release protocol and detect
//! concurrency bugs like double frees, lost counts, and stale entries.
//!
//! Run with: `RUSTFLAGS="--cfg loom" cargo test --test loom_tests --features loom --release`

#![cfg(loom)]

use convergent_rc::PtrRegistry;
use loom::sync::Arc;
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::thread;

/// Payload whose destructor counts how often it fires.
struct Payload {
    hits: Arc<AtomicUsize>,
}

impl Payload {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (Self { hits: hits.clone() }, hits)
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test: Two threads dropping their own clones free the object exactly once
#[test]
fn loom_concurrent_drops_free_once() {
    loom::model(|| {
        let registry = PtrRegistry::new();
        let (payload, hits) = Payload::new();

        let h1 = registry.adopt(payload);
        let h2 = h1.clone();

        let t1 = thread::spawn(move || drop(h1));
        let t2 = thread::spawn(move || drop(h2));
        t1.join().unwrap();
        t2.join().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.live_entries(), 0);
    });
}

/// Test: A clone racing against a drop never observes a freed object
#[test]
fn loom_clone_races_drop() {
    loom::model(|| {
        let registry = PtrRegistry::new();
        let (payload, hits) = Payload::new();

        let h1 = registry.adopt(payload);
        let h2 = h1.clone();

        let cloner = thread::spawn(move || {
            // h2 pins the count above zero, so cloning is always legal here
            let h3 = h2.clone();
            assert!(h3.ref_count() >= 1);
            drop(h2);
            drop(h3);
        });
        drop(h1);
        cloner.join().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.live_entries(), 0);
    });
}

/// Test: Convergent adoption racing against a release on the same address
#[test]
fn loom_convergent_adoption_races_release() {
    loom::model(|| {
        let registry = PtrRegistry::new();
        let (payload, hits) = Payload::new();

        let root = registry.adopt(payload);
        let addr = root.addr();
        let extra = root.clone();

        let adopter = {
            let registry = registry.clone();
            thread::spawn(move || {
                // SAFETY: `root` is held by the main thread until after join,
                // so the address stays live throughout
                let handle = unsafe { registry.adopt_raw(addr as *mut Payload) };
                assert!(handle.ref_count() >= 2);
                drop(handle);
            })
        };
        drop(extra);
        adopter.join().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        drop(root);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.live_entries(), 0);
    });
}

/// Test: Typed and erased handles to one address, released from two threads
#[test]
fn loom_typed_and_erased_release_once() {
    loom::model(|| {
        let registry = PtrRegistry::new();
        let (payload, hits) = Payload::new();

        let typed = registry.adopt(payload);
        // SAFETY: the pointer is live and managed by the same registry
        let erased = unsafe { registry.adopt_erased_raw(typed.get()) };

        let t1 = thread::spawn(move || drop(typed));
        let t2 = thread::spawn(move || drop(erased));
        t1.join().unwrap();
        t2.join().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.live_entries(), 0);
    });
}
