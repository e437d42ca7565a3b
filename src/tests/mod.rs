//! 单元测试模块
//! Unit test modules.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test payload whose destructor counts how often it fires.
/// 析构器会统计触发次数的测试载荷。
pub(crate) struct DropCounter {
    hits: Arc<AtomicUsize>,
}

impl DropCounter {
    /// Returns the payload and a shared view of its destruction count.
    pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (Self { hits: Arc::clone(&hits) }, hits)
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}
