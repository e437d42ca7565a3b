use crate::sync::{Arc, AtomicUsize, Mutex};
use std::collections::HashMap;

/// The address value used as the "empty handle" sentinel.
/// 用作"空句柄"标记的地址值。
pub(crate) const NULL_ADDR: usize = 0;

/// Default initial capacity of the entry map.
/// 条目映射的默认初始容量。
pub(crate) const DEFAULT_ENTRY_CAPACITY: usize = 16;

/// The shared count record for one managed address.
///
/// One `EntryState` exists per live address. It is owned by the registry map
/// and shared (via `Arc`) with every outstanding `EntryRef` for that address,
/// so advisory count reads never need the registry lock.
///
/// 每个被管理地址的共享计数记录。
/// 每个存活地址恰好存在一个 `EntryState`。它由注册表映射拥有，
/// 并通过 `Arc` 与该地址所有未结清的 `EntryRef` 共享，
/// 因此咨询性的计数读取不需要注册表锁。
#[derive(Debug)]
pub(crate) struct EntryState {
    /// The managed object's address; immutable for the entry's lifetime.
    /// 被管理对象的地址；在条目的生命周期内不可变。
    pub(crate) addr: usize,
    /// Number of live handles referencing the address.
    /// Mutated only while the registry lock is held.
    /// 引用该地址的存活句柄数量。仅在持有注册表锁时才会被修改。
    pub(crate) count: AtomicUsize,
}

/// Global shared state for one registry instance.
///
/// The single coarse lock guards the map and, by convention, every count
/// mutation that participates in the decrement-to-zero check. A plain atomic
/// counter alone would permit two releasers to both observe count == 1 and
/// free the object twice.
///
/// 一个注册表实例的全局共享状态。
/// 单个粗粒度锁保护映射以及（按约定）所有参与"减到零"检查的计数修改。
/// 仅靠原子计数器会允许两个释放者同时观察到 count == 1 并重复释放对象。
#[derive(Debug)]
pub(crate) struct RegistryState {
    /// Address -> entry map. Values are `Arc`'d so references handed out for
    /// one key stay stable while unrelated keys are inserted or removed.
    /// 地址 -> 条目映射。值为 `Arc`，因此为某个键发出的引用
    /// 在其它键被插入或移除时保持稳定。
    pub(crate) entries: Mutex<HashMap<usize, Arc<EntryState>>>,
}
