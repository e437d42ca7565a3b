use crate::entry::{EntryRef, ReleaseOutcome};
use crate::registry::PtrRegistry;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr;

/// A statically typed, registry-backed reference-counted handle.
///
/// `CachedRc<T>` behaves like `Arc<T>` from the outside, but its reference
/// count lives in the [`PtrRegistry`] it was adopted into, keyed by the
/// object's address, rather than in a control block next to the pointer.
/// Cloning re-acquires the entry **by address**, which is what makes two
/// structurally unrelated handles wrapping the same pointer converge onto a
/// single count group.
///
/// A handle may be empty (adopted from a null pointer, or the source of a
/// conversion). Empty handles never touch the registry.
///
/// **Safety Contract**:
/// - The managed object is freed exactly once, by whichever handle's drop
///   observes the count's 1 -> 0 transition.
/// - All handles for one address must come from the same registry.
///
/// 静态类型、由注册表支撑的引用计数句柄。
/// `CachedRc<T>` 的外在行为与 `Arc<T>` 类似，但其引用计数以对象地址为键
/// 存放在其被收养进的 [`PtrRegistry`] 中，而不是指针旁的控制块里。
/// 克隆按**地址**重新获取条目，这正是让包装同一指针的两个结构上无关的
/// 句柄收敛到单一计数组的机制。
/// 句柄可以为空（从空指针收养而来）。空句柄从不触碰注册表。
pub struct CachedRc<T: 'static> {
    registry: PtrRegistry,
    entry: Option<EntryRef>,
    _marker: PhantomData<T>,
}

// Same discipline as Arc: the handle hands out &T from several threads and
// the last drop runs T's destructor on an arbitrary thread.
unsafe impl<T: Send + Sync + 'static> Send for CachedRc<T> {}
unsafe impl<T: Send + Sync + 'static> Sync for CachedRc<T> {}

impl<T: 'static> CachedRc<T> {
    #[inline]
    pub(crate) fn empty(registry: PtrRegistry) -> Self {
        Self::from_parts(registry, None)
    }

    #[inline]
    pub(crate) fn from_parts(registry: PtrRegistry, entry: Option<EntryRef>) -> Self {
        Self {
            registry,
            entry,
            _marker: PhantomData,
        }
    }

    /// Whether this handle currently references an object.
    /// 此句柄当前是否引用某个对象。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// The referenced address, or 0 for an empty handle.
    /// 被引用的地址；空句柄为 0。
    #[inline]
    pub fn addr(&self) -> usize {
        self.entry.as_ref().map_or(0, EntryRef::addr)
    }

    /// The raw pointer, or null for an empty handle.
    /// 原始指针；空句柄为 null。
    #[inline]
    pub fn get(&self) -> *mut T {
        match &self.entry {
            Some(entry) => entry.addr() as *mut T,
            None => ptr::null_mut(),
        }
    }

    /// Borrow the referenced object, or `None` for an empty handle.
    /// 借用被引用的对象；空句柄返回 `None`。
    #[inline]
    pub fn try_get(&self) -> Option<&T> {
        // SAFETY: a non-empty handle holds an `EntryRef`, so the shared count
        // is at least 1 and the object cannot be freed while `self` is alive.
        self.entry
            .as_ref()
            .map(|entry| unsafe { &*(entry.addr() as *const T) })
    }

    /// Borrow the referenced object.
    ///
    /// # Panics
    /// Panics if the handle is empty. Dereferencing an empty handle is a
    /// caller contract violation and fails fast rather than returning a
    /// dangling reference.
    ///
    /// 借用被引用的对象。句柄为空时 panic：解引用空句柄属于调用方
    /// 违约，立即失败而不是返回悬垂引用。
    #[inline]
    pub fn as_ref(&self) -> &T {
        self.try_get().expect(
            "BUG: Dereferencing an empty CachedRc. \
             This indicates incorrect API usage or a library bug.",
        )
    }

    /// Racy snapshot of the shared count, 0 for an empty handle. Advisory
    /// only: another thread may change the count before the value is used.
    ///
    /// 共享计数的竞态快照；空句柄为 0。仅供参考：
    /// 在该值被使用前，另一个线程可能已改变计数。
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.entry.as_ref().map_or(0, EntryRef::count)
    }

    /// The registry this handle records its reference in.
    /// 此句柄记录其引用的注册表。
    #[inline]
    pub fn registry(&self) -> &PtrRegistry {
        &self.registry
    }
}

impl<T: 'static> Clone for CachedRc<T> {
    /// Join the reference group of the same address again.
    ///
    /// The clone calls `acquire` with the address rather than duplicating the
    /// entry token: every live handle must correspond to exactly one counted
    /// reference, and re-acquiring by key is the convergence mechanism.
    ///
    /// 再次加入同一地址的引用组。克隆以地址调用 `acquire`
    /// 而不是复制条目令牌：每个存活句柄必须恰好对应一个被计数的引用，
    /// 而按键重新获取正是收敛机制。
    fn clone(&self) -> Self {
        let entry = self
            .entry
            .as_ref()
            .map(|entry| self.registry.acquire(entry.addr()));
        Self::from_parts(self.registry.clone(), entry)
    }
}

impl<T: 'static> Drop for CachedRc<T> {
    /// Leave the reference group; free the object if this was the last handle.
    ///
    /// The free runs after `release` returns, outside the registry lock, so
    /// `T`'s destructor never blocks other registry traffic.
    ///
    /// 离开引用组；若这是最后一个句柄则释放对象。
    /// 释放在 `release` 返回之后、注册表锁之外进行，
    /// 因此 `T` 的析构器绝不会阻塞其它注册表操作。
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            let addr = entry.addr();
            if let ReleaseOutcome::LastReference = self.registry.release(entry) {
                // SAFETY: the entry is gone from the map and no other token
                // exists, so this handle is the sole owner of the allocation.
                unsafe {
                    drop(Box::from_raw(addr as *mut T));
                }
            }
        }
    }
}

impl<T: 'static> Deref for CachedRc<T> {
    type Target = T;

    /// See [`CachedRc::as_ref`]; panics on an empty handle.
    #[inline]
    fn deref(&self) -> &T {
        self.as_ref()
    }
}

/// Handles are equal iff they reference the same address. Two empty handles
/// compare equal.
/// 引用相同地址的句柄相等。两个空句柄相等。
impl<T: 'static> PartialEq for CachedRc<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: 'static> Eq for CachedRc<T> {}

impl<T: 'static> PartialEq<crate::erased::ErasedRc> for CachedRc<T> {
    #[inline]
    fn eq(&self, other: &crate::erased::ErasedRc) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: 'static> std::fmt::Debug for CachedRc<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRc")
            .field("addr", &(self.addr() as *const T))
            .field("count", &self.ref_count())
            .finish()
    }
}
