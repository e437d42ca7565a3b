use crate::entry::{EntryRef, ReleaseOutcome};
use crate::registry::PtrRegistry;
use crate::typed::CachedRc;
use std::any::TypeId;

/// Invokes `T`'s destructor through an untyped address.
/// Captured at adoption time, the one place that still knows `T`.
/// 通过无类型地址调用 `T` 的析构器。在收养时（仍然知道 `T` 的唯一位置）捕获。
#[inline(always)]
unsafe fn drop_value<T>(ptr: *mut ()) {
    unsafe {
        drop(Box::from_raw(ptr as *mut T));
    }
}

/// Placeholder destructor for empty handles; never reachable through a
/// counted reference.
unsafe fn drop_nothing(_ptr: *mut ()) {}

/// A type-erased, registry-backed reference-counted handle.
///
/// `ErasedRc` follows exactly the same lifecycle protocol as [`CachedRc`]
/// (acquire on construct, re-acquire by address on clone, release and
/// maybe-free on drop) against the same registry, but it carries the managed
/// object as an untyped address. Because the registry never stores type
/// information, the destruction capability is supplied by the caller: it is
/// captured as a plain function pointer when the value is adopted, and the
/// release path invokes it instead of a blind cast-and-delete. A stored
/// `TypeId` makes destroying or converting under the wrong type a guaranteed
/// runtime error rather than silent corruption.
///
/// Since entries are keyed purely by address, an `ErasedRc` and a
/// [`CachedRc<T>`] adopted from the same pointer share one count group and can
/// be converted into each other without touching the registry.
///
/// 类型擦除的、由注册表支撑的引用计数句柄。
/// `ErasedRc` 对同一注册表遵循与 [`CachedRc`] 完全相同的生命周期协议
/// （构造时 acquire，克隆时按地址重新 acquire，drop 时 release 并可能释放），
/// 但它以无类型地址携带被管理对象。由于注册表从不存储类型信息，
/// 析构能力由调用方提供：在收养值时被捕获为普通函数指针，
/// 释放路径调用它而不是盲目地强转后删除。存储的 `TypeId` 使得以错误类型
/// 销毁或转换成为必然可检测的运行时错误，而不是无声的内存破坏。
pub struct ErasedRc {
    registry: PtrRegistry,
    entry: Option<EntryRef>,
    /// Frees the object at the stored address as its true type.
    /// 以真实类型释放存储地址上的对象。
    dtor: unsafe fn(*mut ()),
    /// True type of the adopted value; `TypeId::of::<()>` for empty handles
    /// (unobservable: `is_type` reports `false` while empty).
    type_id: TypeId,
}

// Adoption requires `T: Send + Sync`, so the erased payload is always safe to
// share and to drop on an arbitrary thread.
unsafe impl Send for ErasedRc {}
unsafe impl Sync for ErasedRc {}

impl ErasedRc {
    #[inline]
    pub(crate) fn empty(registry: PtrRegistry) -> Self {
        Self {
            registry,
            entry: None,
            dtor: drop_nothing,
            type_id: TypeId::of::<()>(),
        }
    }

    #[inline]
    pub(crate) fn from_adopted<T: Send + Sync + 'static>(
        registry: PtrRegistry,
        entry: EntryRef,
    ) -> Self {
        Self {
            registry,
            entry: Some(entry),
            dtor: drop_value::<T>,
            type_id: TypeId::of::<T>(),
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

    /// Racy snapshot of the shared count, 0 for an empty handle.
    /// 共享计数的竞态快照；空句柄为 0。
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.entry.as_ref().map_or(0, EntryRef::count)
    }

    /// Whether the adopted value is a `T`. Always `false` for empty handles.
    /// 被收养的值是否为 `T`。空句柄恒为 `false`。
    #[inline]
    pub fn is_type<T: 'static>(&self) -> bool {
        !self.is_empty() && self.type_id == TypeId::of::<T>()
    }

    /// Borrow the referenced object as a `T`, or `None` if the handle is
    /// empty or was adopted as a different type.
    ///
    /// 将被引用对象按 `T` 借用；句柄为空或收养类型不符时返回 `None`。
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if !self.is_type::<T>() {
            return None;
        }
        // SAFETY: the TypeId matched, and the live `EntryRef` keeps the
        // shared count at least 1 while `self` is borrowed.
        self.entry
            .as_ref()
            .map(|entry| unsafe { &*(entry.addr() as *const T) })
    }

    /// Explicit destroy site: leave the reference group, freeing the object
    /// as a `T` if this was the last handle.
    ///
    /// This is the call-site hook for contexts that alone know the element
    /// type. The supplied type is checked against the adopted one, so a
    /// mismatch fails fast instead of freeing through the wrong type.
    /// A no-op on an empty handle.
    ///
    /// # Panics
    /// Panics if the handle is non-empty and was not adopted as a `T`.
    ///
    /// 显式销毁点：离开引用组，若这是最后一个句柄则按 `T` 释放对象。
    /// 这是为"唯独调用方知晓元素类型"的上下文准备的钩子。提供的类型会与
    /// 收养类型核对，不匹配时立即失败而不是以错误类型释放。空句柄上为空操作。
    pub fn release_as<T: 'static>(mut self) {
        if self.entry.is_none() {
            return;
        }
        // Checked before the token is taken: on panic, Drop still releases
        // the reference through the captured destructor path.
        assert!(
            self.type_id == TypeId::of::<T>(),
            "BUG: Releasing an ErasedRc as a type it was not adopted as. \
             This indicates incorrect API usage or a library bug."
        );

        let Some(entry) = self.entry.take() else {
            return;
        };

        let addr = entry.addr();
        if let ReleaseOutcome::LastReference = self.registry.release(entry) {
            // SAFETY: TypeId matched and this was the sole remaining token.
            unsafe {
                drop(Box::from_raw(addr as *mut T));
            }
        }
    }

    /// Recover a typed handle, transferring the entry token without any
    /// registry traffic (the count is unchanged, exactly like a move).
    ///
    /// # Panics
    /// Panics if the handle is non-empty and was not adopted as a `T`.
    /// An empty handle converts into an empty `CachedRc<T>`.
    ///
    /// 恢复类型化句柄：转移条目令牌而不产生任何注册表操作
    /// （计数不变，与移动完全一致）。空句柄转换为空的 `CachedRc<T>`。
    pub fn into_typed<T: 'static>(mut self) -> CachedRc<T> {
        assert!(
            self.entry.is_none() || self.type_id == TypeId::of::<T>(),
            "BUG: Converting an ErasedRc to a type it was not adopted as. \
             This indicates incorrect API usage or a library bug."
        );

        let entry = self.entry.take();
        CachedRc::from_parts(self.registry.clone(), entry)
    }
}

impl Clone for ErasedRc {
    /// Join the reference group of the same address again, carrying the
    /// destruction capability along.
    /// 再次加入同一地址的引用组，并带上析构能力。
    fn clone(&self) -> Self {
        let entry = self
            .entry
            .as_ref()
            .map(|entry| self.registry.acquire(entry.addr()));
        Self {
            registry: self.registry.clone(),
            entry,
            dtor: self.dtor,
            type_id: self.type_id,
        }
    }
}

impl Drop for ErasedRc {
    /// Leave the reference group; run the captured destructor if this was the
    /// last handle. The destructor runs outside the registry lock.
    ///
    /// 离开引用组；若这是最后一个句柄则运行捕获的析构器。
    /// 析构器在注册表锁之外运行。
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            let addr = entry.addr();
            if let ReleaseOutcome::LastReference = self.registry.release(entry) {
                // SAFETY: `dtor` was captured for the true adopted type, the
                // entry is gone from the map, and no other token exists.
                unsafe {
                    (self.dtor)(addr as *mut ());
                }
            }
        }
    }
}

/// Handles are equal iff they reference the same address, regardless of
/// variant. 无论何种变体，引用相同地址的句柄相等。
impl PartialEq for ErasedRc {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ErasedRc {}

impl<T: 'static> PartialEq<CachedRc<T>> for ErasedRc {
    #[inline]
    fn eq(&self, other: &CachedRc<T>) -> bool {
        self.addr() == other.addr()
    }
}

impl std::fmt::Debug for ErasedRc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedRc")
            .field("addr", &(self.addr() as *const ()))
            .field("count", &self.ref_count())
            .finish()
    }
}
