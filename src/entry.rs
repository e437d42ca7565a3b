use crate::state::EntryState;
use crate::sync::{Arc, Ordering};

/// A move-only token for one acquired reference to a registry entry.
///
/// Every `EntryRef` is produced by exactly one successful `acquire` and must
/// be consumed by exactly one `release`. It is deliberately neither `Clone`
/// nor `Copy`: duplicating a token without going through `acquire` (or
/// releasing one twice) would silently corrupt the shared count, so the
/// ownership system rules it out instead of programmer discipline.
///
/// 对注册表条目的一次已获取引用的只移动令牌。
/// 每个 `EntryRef` 由恰好一次成功的 `acquire` 产生，且必须被恰好一次
/// `release` 消耗。它刻意不实现 `Clone` 和 `Copy`：绕过 `acquire` 复制令牌
/// （或重复释放同一令牌）会悄悄破坏共享计数，因此由所有权系统而非
/// 程序员纪律来排除这种情况。
#[must_use]
#[derive(Debug)]
pub(crate) struct EntryRef {
    pub(crate) entry: Arc<EntryState>,
}

impl EntryRef {
    /// The address this token's entry is keyed on.
    /// 此令牌条目所键控的地址。
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.entry.addr
    }

    /// Racy snapshot of the shared count. Advisory only.
    /// 共享计数的竞态快照。仅供参考。
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.entry.count.load(Ordering::Relaxed)
    }
}

/// Result of releasing an acquired reference.
///
/// `LastReference` means the releasing handle observed the 1 -> 0 transition
/// and now owns the one-time duty to free the object. The entry has already
/// been removed from the map, under the lock, by the time this is returned.
///
/// 释放一次已获取引用的结果。
/// `LastReference` 表示释放方观察到了 1 -> 0 的转变，
/// 并从此拥有一次性释放对象的职责。返回此值时，
/// 条目已经在锁内从映射中移除。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// The count reached zero; the caller must free the object.
    /// 计数归零；调用者必须释放对象。
    LastReference,
    /// Other handles still reference the address.
    /// 仍有其它句柄引用该地址。
    StillReferenced,
}
