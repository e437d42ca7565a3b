//! Reference-counted handles backed by a shared address-keyed registry.
//!
//! An alternative to `std::sync::Arc`: the reference count is not stored in a
//! control block next to the pointer but in a process-wide (or private)
//! [`PtrRegistry`], keyed by the managed object's address. This gives the
//! system its two distinguishing properties:
//!
//! - **Convergent sharing**: independently constructed handles wrapping the
//!   same raw address transparently join the same reference-count group,
//!   because cloning and adoption both go through the registry's
//!   address-keyed `acquire`.
//! - **Variant interop**: the typed handle ([`CachedRc<T>`]) and the
//!   type-erased handle ([`ErasedRc`]) share the exact same registry and
//!   lifecycle protocol, so they can reference (and correctly free) the same
//!   object.
//!
//! One coarse lock serializes every map access together with every count
//! change that participates in the decrement-to-zero check, which is what
//! guarantees the exactly-once-free invariant; the actual free always runs
//! outside the lock.
//!
//! **Typical Usage**:
//! ```
//! use convergent_rc::PtrRegistry;
//!
//! let registry = PtrRegistry::new();
//!
//! let h1 = registry.adopt(String::from("shared"));
//! let h2 = h1.clone();
//! assert_eq!(h1.ref_count(), 2);
//! assert_eq!(h1, h2);
//!
//! drop(h1); // count = 1, object still alive
//! assert_eq!(h2.as_ref().as_str(), "shared");
//! drop(h2); // count = 0, entry removed, object freed exactly once
//! assert_eq!(registry.live_entries(), 0);
//! ```
//!
//! 由共享的地址键注册表支撑的引用计数句柄。
//! `std::sync::Arc` 的替代方案：引用计数不存放在指针旁的控制块中，
//! 而是以被管理对象的地址为键存放在进程级（或私有的）[`PtrRegistry`] 里。
//! 独立构造的、包装同一原始地址的句柄会透明地收敛到同一个引用计数组；
//! 类型化句柄与类型擦除句柄共享同一注册表和同一生命周期协议。
//! 一把粗粒度锁串行化所有映射访问以及所有参与"减到零"检查的计数变更，
//! 这保证了恰好一次释放的不变式；实际的释放总是在锁外进行。

mod entry;
mod erased;
mod registry;
mod state;
mod sync;
mod typed;

pub use erased::ErasedRc;
pub use registry::PtrRegistry;
pub use typed::CachedRc;

#[cfg(test)]
mod tests;
