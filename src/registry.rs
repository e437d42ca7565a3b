use crate::entry::{EntryRef, ReleaseOutcome};
use crate::erased::ErasedRc;
use crate::state::{DEFAULT_ENTRY_CAPACITY, EntryState, NULL_ADDR, RegistryState};
use crate::sync::{Arc, AtomicUsize, Mutex, Ordering};
use crate::typed::CachedRc;
use std::collections::HashMap;

/// An address-keyed reference-count registry.
///
/// `PtrRegistry` is the entry point of the system. Instead of storing a count
/// next to each pointer (as `Arc` does with its control block), every handle
/// created from the same registry records its reference in one shared map,
/// keyed by the managed object's address. Two handles constructed
/// independently from the same raw pointer therefore converge onto the same
/// count group, and typed and type-erased handles share the exact same
/// lifetime-tracking infrastructure.
///
/// `PtrRegistry` is `Clone` and can be freely shared across threads; clones
/// refer to the same underlying map. Typically you either use the process-wide
/// [`PtrRegistry::global()`] instance or construct a private registry per
/// subsystem (private instances also keep tests hermetic).
///
/// **Typical Usage**:
/// ```
/// use convergent_rc::PtrRegistry;
///
/// let registry = PtrRegistry::new();
/// let a = registry.adopt(42i32);
/// let b = a.clone();
/// assert_eq!(a.ref_count(), 2);
/// drop(a);
/// drop(b); // object freed here, exactly once
/// ```
///
/// 以地址为键的引用计数注册表。
/// `PtrRegistry` 是系统的入口点。与 `Arc` 将计数存放在每个指针旁的控制块中
/// 不同，从同一注册表创建的每个句柄都把自己的引用记录在一个以被管理对象
/// 地址为键的共享映射里。因此从同一原始指针独立构造的两个句柄会收敛到
/// 同一个计数组，类型化句柄与类型擦除句柄共享完全相同的生命周期跟踪设施。
/// `PtrRegistry` 实现 `Clone`，可以在线程间自由共享；克隆指向同一底层映射。
#[derive(Clone, Debug)]
pub struct PtrRegistry {
    state: Arc<RegistryState>,
}

impl PtrRegistry {
    /// Create a new, private registry instance.
    /// 创建一个新的私有注册表实例。
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ENTRY_CAPACITY)
    }

    /// Create a registry whose entry map is pre-sized for `capacity` addresses.
    /// 创建一个条目映射为 `capacity` 个地址预留空间的注册表。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RegistryState {
                entries: Mutex::new(HashMap::with_capacity(capacity)),
            }),
        }
    }

    /// The single process-wide registry instance.
    ///
    /// Handles created through it join one global address space, which is what
    /// makes convergent sharing work across unrelated call sites. Prefer a
    /// private [`PtrRegistry::new()`] where isolation matters.
    ///
    /// 进程级的单一注册表实例。
    /// 通过它创建的句柄加入同一个全局地址空间，这正是不相关调用点之间
    /// 收敛共享得以工作的原因。需要隔离时请优先使用私有的
    /// [`PtrRegistry::new()`]。
    #[cfg(not(feature = "loom"))]
    pub fn global() -> Self {
        use std::sync::OnceLock;
        static GLOBAL: OnceLock<PtrRegistry> = OnceLock::new();
        GLOBAL.get_or_init(PtrRegistry::new).clone()
    }

    /// Adopt a value: move it to the heap and return the first typed handle
    /// to it, with the shared count at 1.
    ///
    /// 收养一个值：将其移动到堆上并返回指向它的第一个类型化句柄，
    /// 共享计数为 1。
    #[inline]
    pub fn adopt<T: 'static>(&self, value: T) -> CachedRc<T> {
        let ptr = Box::into_raw(Box::new(value));
        // SAFETY: `ptr` was just produced by `Box::into_raw` and is only
        // reachable through the handle we are about to return.
        unsafe { self.adopt_raw(ptr) }
    }

    /// Adopt a raw pointer previously produced by `Box::into_raw`.
    ///
    /// A null pointer yields an empty handle without touching the registry.
    /// Calling this twice with the same live pointer is explicitly supported:
    /// both handles converge onto one entry and the object is still freed
    /// exactly once, by whichever handle releases last.
    ///
    /// # Safety
    /// A non-null `ptr` must come from `Box::into_raw::<T>`, must not have
    /// been freed, and its lifetime must from now on be managed exclusively
    /// by handles of **this** registry. Mixing registries for one address
    /// double-frees.
    ///
    /// 收养一个此前由 `Box::into_raw` 产生的原始指针。
    /// 空指针产生一个空句柄，不触碰注册表。用同一个存活指针调用两次是
    /// 明确支持的：两个句柄收敛到同一条目，对象仍然只被释放一次，
    /// 由最后释放的句柄执行。
    pub unsafe fn adopt_raw<T: 'static>(&self, ptr: *mut T) -> CachedRc<T> {
        if ptr.is_null() {
            return CachedRc::empty(self.clone());
        }

        let entry = self.acquire(ptr as usize);
        CachedRc::from_parts(self.clone(), Some(entry))
    }

    /// Adopt a value behind a type-erased handle.
    ///
    /// The value's destructor is captured here, at the one site that still
    /// knows `T`, and invoked by whichever release observes the last
    /// reference. `T: Send + Sync` is required because the erased handle
    /// itself is freely shareable across threads.
    ///
    /// 通过类型擦除句柄收养一个值。
    /// 值的析构器在此处（仍然知道 `T` 的唯一位置）被捕获，
    /// 并由观察到最后一个引用的那次释放调用。
    #[inline]
    pub fn adopt_erased<T: Send + Sync + 'static>(&self, value: T) -> ErasedRc {
        let ptr = Box::into_raw(Box::new(value));
        // SAFETY: freshly allocated, only reachable through the new handle.
        unsafe { self.adopt_erased_raw(ptr) }
    }

    /// Type-erased counterpart of [`PtrRegistry::adopt_raw`].
    ///
    /// Because the registry keys entries purely by address, an erased handle
    /// adopted from the same pointer as a typed one joins the typed handle's
    /// count group.
    ///
    /// # Safety
    /// Same contract as [`PtrRegistry::adopt_raw`].
    ///
    /// [`PtrRegistry::adopt_raw`] 的类型擦除对应物。
    /// 由于注册表纯粹以地址为键，从与类型化句柄相同的指针收养的
    /// 擦除句柄会加入该类型化句柄的计数组。
    pub unsafe fn adopt_erased_raw<T: Send + Sync + 'static>(&self, ptr: *mut T) -> ErasedRc {
        if ptr.is_null() {
            return ErasedRc::empty(self.clone());
        }

        let entry = self.acquire(ptr as usize);
        ErasedRc::from_adopted::<T>(self.clone(), entry)
    }

    /// Number of addresses currently tracked. Advisory; mainly for tests and
    /// diagnostics.
    /// 当前被跟踪的地址数量。仅供参考；主要用于测试和诊断。
    pub fn live_entries(&self) -> usize {
        self.state.entries.lock().len()
    }

    /// Join the reference group for `addr`, creating the entry if this is the
    /// first reference.
    ///
    /// The whole find-or-insert-then-increment sequence runs in one lock
    /// scope, so an `acquire` can never observe an entry that a concurrent
    /// `release` is halfway through tearing down.
    ///
    /// 加入 `addr` 的引用组；若这是第一个引用则创建条目。
    /// 整个"查找或插入然后递增"序列在一个锁作用域内运行，
    /// 因此 `acquire` 绝不会观察到一个并发 `release` 拆除到一半的条目。
    pub(crate) fn acquire(&self, addr: usize) -> EntryRef {
        assert!(
            addr != NULL_ADDR,
            "BUG: Acquiring the null address. Empty handles must never touch \
             the registry; this indicates incorrect API usage or a library bug."
        );

        let mut entries = self.state.entries.lock();

        let entry = entries.entry(addr).or_insert_with(|| {
            Arc::new(EntryState {
                addr,
                count: AtomicUsize::new(0),
            })
        });
        entry.count.fetch_add(1, Ordering::Relaxed);

        EntryRef {
            entry: Arc::clone(entry),
        }
    }

    /// Leave the reference group, consuming the token.
    ///
    /// Decrement, zero-check and map erase all happen under the one lock; the
    /// caller performs the actual free *after* this returns, outside the lock,
    /// so arbitrary destructors never extend the registry's critical section.
    ///
    /// 离开引用组，消耗令牌。
    /// 递减、零检查和映射删除都在同一把锁内发生；调用者在本函数返回后、
    /// 锁外执行实际释放，因此任意析构器都不会延长注册表的临界区。
    pub(crate) fn release(&self, entry_ref: EntryRef) -> ReleaseOutcome {
        let EntryRef { entry } = entry_ref;

        let mut entries = self.state.entries.lock();

        let previous = entry.count.fetch_sub(1, Ordering::AcqRel);
        assert!(
            previous > 0,
            "BUG: Releasing an entry whose count is already zero. \
             This indicates incorrect API usage or a library bug."
        );

        if previous == 1 {
            // No other token exists and the lock blocks new acquires, so the
            // entry under this address is necessarily ours.
            let removed = entries.remove(&entry.addr);
            debug_assert!(removed.is_some());
            ReleaseOutcome::LastReference
        } else {
            ReleaseOutcome::StillReferenced
        }
    }
}

impl Default for PtrRegistry {
    fn default() -> Self {
        Self::new()
    }
}
