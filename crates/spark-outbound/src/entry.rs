//! 池化写条目与其自由链表池。
//!
//! # 教案式导览
//!
//! - **Why**：出站写入是热路径，逐次堆分配会放大延迟抖动；条目改从通道私有的
//!   槽位池中取用，排空后立刻清空并归还，避免跨通道争用全局池；
//! - **How**：`Vec` 槽位 + 自由索引栈构成自由链表；`next` 用槽位索引表达单向链，
//!   三个外部游标（已刷写/未刷写/队尾）都只存索引；每个槽位携带世代计数，
//!   回收时自增，使过期的 [`WriteTicket`] 在结构上不可能命中复用后的槽位；
//! - **What**：条目被回收前其全部字段（负载、信号、尺寸、标志、链接）必须清空，
//!   复用的条目绝不泄漏上一任写入的任何状态。

use crate::message::OutboundMessage;
use crate::promise::WritePromise;

/// 指向一次在队写入的撤销凭据，仅对签发它的缓冲实例有效。
///
/// # 契约（What）
/// - 凭据携带槽位索引与签发时的世代号；条目排空回收后世代号递增，
///   过期凭据随即失效，撤销调用安全地返回 0；
/// - 世代号为 `u32` 回绕计数，极端情况下（同一槽位恰好被复用 2^32 次后）
///   可能出现误匹配，属于可接受的理论风险。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteTicket {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// 单个在队写条目。字段仅对 crate 内部可见，外部通过缓冲的操作面访问。
pub(crate) struct Entry {
    pub(crate) message: Option<OutboundMessage>,
    pub(crate) pending_size: usize,
    /// 负载的可读字节长度；`None` 表示“长度未知”哨兵，绝不默认为 0。
    pub(crate) total: Option<usize>,
    pub(crate) promise: Option<WritePromise>,
    pub(crate) cancelled: bool,
    pub(crate) next: Option<u32>,
    generation: u32,
}

impl Entry {
    /// 撤销条目：首次调用置位撤销标志、以空哨兵顶替负载、清零记账尺寸，
    /// 返回释放的字节数供调用方退还流控计数；重复调用返回 0。
    pub(crate) fn cancel(&mut self) -> usize {
        if self.cancelled {
            return 0;
        }
        self.cancelled = true;
        self.message = Some(OutboundMessage::empty());
        let freed = self.pending_size;
        self.pending_size = 0;
        self.total = None;
        freed
    }
}

/// 通道私有的条目池：`Vec` 槽位 + 自由索引栈。
pub(crate) struct EntryPool {
    slots: Vec<Entry>,
    free: Vec<u32>,
}

impl EntryPool {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// 取用一个条目槽位并填入本次写入的全部状态，返回撤销凭据。
    pub(crate) fn acquire(
        &mut self,
        message: OutboundMessage,
        pending_size: usize,
        total: Option<usize>,
        promise: WritePromise,
    ) -> WriteTicket {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.message.is_none(), "自由链表中的槽位必须已被清空");
                slot.message = Some(message);
                slot.pending_size = pending_size;
                slot.total = total;
                slot.promise = Some(promise);
                slot.cancelled = false;
                slot.next = None;
                index
            }
            None => {
                self.slots.push(Entry {
                    message: Some(message),
                    pending_size,
                    total,
                    promise: Some(promise),
                    cancelled: false,
                    next: None,
                    generation: 0,
                });
                (self.slots.len() - 1) as u32
            }
        };
        WriteTicket {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// 清空槽位全部字段、递增世代号并归还自由链表。
    /// 这是防止“复用条目泄漏上一任状态”的唯一出口，任何回收都必须走这里。
    pub(crate) fn recycle(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.message = None;
        slot.pending_size = 0;
        slot.total = None;
        slot.promise = None;
        slot.cancelled = false;
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
    }

    pub(crate) fn entry(&self, index: u32) -> &Entry {
        &self.slots[index as usize]
    }

    pub(crate) fn entry_mut(&mut self, index: u32) -> &mut Entry {
        &mut self.slots[index as usize]
    }

    /// 凭据是否仍指向一个在队条目：槽位存在、世代匹配且尚未被回收。
    pub(crate) fn is_live(&self, ticket: &WriteTicket) -> bool {
        self.slots
            .get(ticket.index as usize)
            .is_some_and(|slot| slot.generation == ticket.generation && slot.message.is_some())
    }

    #[cfg(test)]
    pub(crate) fn free_len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sample_ticket(pool: &mut EntryPool, size: usize) -> WriteTicket {
        let (promise, _receipt) = WritePromise::pair();
        pool.acquire(
            OutboundMessage::from(Bytes::from(vec![0u8; size])),
            size,
            Some(size),
            promise,
        )
    }

    #[test]
    fn recycle_clears_every_field_and_bumps_generation() {
        let mut pool = EntryPool::new();
        let ticket = sample_ticket(&mut pool, 16);
        pool.recycle(ticket.index);

        let slot = pool.entry(ticket.index);
        assert!(slot.message.is_none(), "回收后不得残留负载");
        assert!(slot.promise.is_none(), "回收后不得残留完成信号");
        assert_eq!(slot.pending_size, 0);
        assert_eq!(slot.total, None);
        assert!(!slot.cancelled);
        assert_eq!(slot.next, None);
        assert!(!pool.is_live(&ticket), "旧凭据在回收后必须失效");
    }

    #[test]
    fn reused_slot_rejects_stale_ticket() {
        let mut pool = EntryPool::new();
        let stale = sample_ticket(&mut pool, 8);
        pool.recycle(stale.index);
        let fresh = sample_ticket(&mut pool, 8);
        assert_eq!(stale.index, fresh.index, "自由链表应复用同一槽位");
        assert!(!pool.is_live(&stale), "过期凭据不得命中复用后的槽位");
        assert!(pool.is_live(&fresh));
    }

    #[test]
    fn cancel_is_idempotent_and_zeroes_accounting() {
        let mut pool = EntryPool::new();
        let ticket = sample_ticket(&mut pool, 32);
        let entry = pool.entry_mut(ticket.index);
        assert_eq!(entry.cancel(), 32, "首次撤销应返回释放的字节数");
        assert_eq!(entry.cancel(), 0, "重复撤销必须返回 0");
        assert_eq!(entry.pending_size, 0);
        assert_eq!(entry.total, None);
        assert_eq!(
            entry.message.as_ref().and_then(|m| m.readable_len()),
            Some(0),
            "撤销后负载应被空哨兵顶替"
        );
    }

    #[test]
    fn pool_grows_then_reuses() {
        let mut pool = EntryPool::new();
        let a = sample_ticket(&mut pool, 4);
        let b = sample_ticket(&mut pool, 4);
        assert_ne!(a.index, b.index);
        pool.recycle(a.index);
        pool.recycle(b.index);
        assert_eq!(pool.free_len(), 2);
        let c = sample_ticket(&mut pool, 4);
        assert!(c.index == a.index || c.index == b.index, "新条目应复用空闲槽位");
        assert_eq!(pool.free_len(), 1);
    }
}
