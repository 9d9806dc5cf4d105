//! 出站写缓冲：入队、刷写、排空、失败与关闭的队列引擎。
//!
//! # 教案式导览
//!
//! - **Why**：应用写入与套接字排空之间需要一层既保序又能施加背压的队列；
//!   本模块承担“入队计账 → 刷写分区 → 严格 FIFO 排空 → 恰好一次结算”的全链路；
//! - **How**：单向链表由三个游标切分为已刷写区（`flushed_entry` 起、共 `flushed_count` 条）
//!   与未刷写区（`unflushed_entry` 起至 `tail_entry`）；条目实体存放在通道私有的
//!   槽位池中，游标与链接均为槽位索引；流控计数剥离到 [`FlowController`] 并以 `Arc`
//!   共享，队列结构操作则由外部事件循环保证单写者串行；
//! - **What**：所有改动游标的操作（`add_message`/`add_flush`/`remove*`/`fail_flushed`/
//!   `close`/`cancel`）都要求 `&mut self`，借用检查静态兑现了单写者契约；
//!   已排空条目的完成信号恰好结算一次，条目随即清空回池。

use std::sync::Arc;

use crate::entry::{EntryPool, WriteTicket};
use crate::error::{OutboundError, WriteError};
use crate::flow::{FlowController, WritabilityListener};
use crate::message::OutboundMessage;
use crate::promise::WritePromise;
use crate::watermark::WriteBufferWaterMark;

/// 单个通道的出站写缓冲。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 在应用与传输层之间缓冲写请求：生产者只管入队并拿到完成信号，
///   事件循环按自己的节奏刷写、排空，互不阻塞；
/// - 待发字节越过高水位即对上游拉闸，回落到低水位复闸，
///   以迟滞式背压替代单阈值抖动。
///
/// ## 游标不变量（What）
/// - `flushed_entry == None` 当且仅当已刷写区为空；
/// - `tail_entry == None` 当且仅当整个链表为空；
/// - `unflushed_entry == None` 当且仅当已刷写区之后不存在待刷写条目；
/// - `flushed_count` 恒等于从 `flushed_entry` 起可被 `remove` 消费的条目数。
///
/// ## 并发模型（How）
/// - 队列结构操作由外部事件循环串行化，这里以 `&mut self` 静态表达；
/// - 流控计数与可写性标志位于 [`FlowController`]，可经 [`Self::flow`] 克隆 `Arc`
///   交给任意监控线程做无锁只读。
pub struct OutboundBuffer {
    pool: EntryPool,
    flushed_entry: Option<u32>,
    unflushed_entry: Option<u32>,
    tail_entry: Option<u32>,
    flushed_count: usize,
    /// 失败/关闭排空的重入护栏；仅在单写者契约下被触碰，无需原子化。
    in_fail: bool,
    flow: Arc<FlowController>,
}

impl OutboundBuffer {
    /// 以给定水位与监听器构造缓冲。监听器在可写性每次真实翻转时被同步调用。
    pub fn new(watermark: WriteBufferWaterMark, listener: Arc<dyn WritabilityListener>) -> Self {
        Self {
            pool: EntryPool::new(),
            flushed_entry: None,
            unflushed_entry: None,
            tail_entry: None,
            flushed_count: 0,
            in_fail: false,
            flow: Arc::new(FlowController::new(watermark, listener)),
        }
    }

    /// 以默认水位（32 KiB / 64 KiB）构造缓冲。
    pub fn with_defaults(listener: Arc<dyn WritabilityListener>) -> Self {
        Self::new(WriteBufferWaterMark::default(), listener)
    }

    /// 共享流控核心，供监控/背压探测线程克隆持有。
    pub fn flow(&self) -> &Arc<FlowController> {
        &self.flow
    }

    /// 当前是否可写（转发自流控核心）。
    pub fn is_writable(&self) -> bool {
        self.flow.is_writable()
    }

    /// 当前记账的待发字节总量。
    pub fn total_pending_bytes(&self) -> i64 {
        self.flow.total_pending_bytes()
    }

    /// 已刷写且尚未排空的条目数。
    pub fn flushed_count(&self) -> usize {
        self.flushed_count
    }

    /// 整个链表（已刷写 + 未刷写）是否为空。
    pub fn is_empty(&self) -> bool {
        self.tail_entry.is_none()
    }

    /// 入队一条写入。
    ///
    /// # 契约（What）
    /// - `size` 为计入流控的字节成本，与负载自身是否可观测长度无关；
    ///   长度未知的业务消息照常按 `size` 记账；
    /// - `promise` 由生产者在入队时交付（配对的 [`WriteReceipt`](crate::WriteReceipt)
    ///   留在生产者手中），
    ///   此后由缓冲独占结算权：排空成功、失败或关闭时恰好结算一次；
    /// - 返回撤销凭据；
    /// - **后置条件**：条目追加在队尾；若此前不存在未刷写区，本条目成为新的
    ///   `unflushed_entry`；记账增加可能同步触发一次拉闸通知。
    pub fn add_message(
        &mut self,
        message: OutboundMessage,
        size: usize,
        promise: WritePromise,
    ) -> WriteTicket {
        let total = message.readable_len();
        let ticket = self.pool.acquire(message, size, total, promise);

        match self.tail_entry {
            None => {
                self.flushed_entry = None;
            }
            Some(tail) => {
                self.pool.entry_mut(tail).next = Some(ticket.index);
            }
        }
        self.tail_entry = Some(ticket.index);
        if self.unflushed_entry.is_none() {
            self.unflushed_entry = Some(ticket.index);
        }

        self.flow.increment_pending(size);
        ticket
    }

    /// 刷写过渡：把未刷写区整体并入已刷写区。
    ///
    /// # 契约（What）
    /// - 对从 `unflushed_entry` 到队尾的每个条目累加 `flushed_count`；
    ///   若此前已刷写区为空，`flushed_entry` 指向原未刷写头；
    /// - 无未刷写条目时为幂等空操作。
    pub fn add_flush(&mut self) {
        let Some(head) = self.unflushed_entry else {
            return;
        };
        if self.flushed_entry.is_none() {
            self.flushed_entry = Some(head);
        }
        let mut cursor = Some(head);
        while let Some(index) = cursor {
            self.flushed_count += 1;
            cursor = self.pool.entry(index).next;
        }
        self.unflushed_entry = None;
    }

    /// 窥视已刷写区头部条目的负载；区为空时返回 `None`。纯读操作。
    pub fn current(&self) -> Option<&OutboundMessage> {
        self.flushed_entry
            .and_then(|index| self.pool.entry(index).message.as_ref())
    }

    /// 排空已刷写区头部条目并以成功结算其信号。
    ///
    /// # 契约（What）
    /// - 已刷写区为空时返回 `false` 且不做任何改动；
    /// - 未被撤销的条目：信号结算为成功、按其记账尺寸递减待发字节（允许复闸通知）；
    /// - 撤销过的条目：信号不再二次结算、记账早已清零，仅回收槽位；
    /// - 条目无论撤销与否都会被清空回池。
    pub fn remove(&mut self) -> bool {
        self.remove0(None, true)
    }

    /// 排空已刷写区头部条目并以 `cause` 结算失败，用于传输层拒绝写入的场景。
    pub fn remove_failed(&mut self, cause: WriteError) -> bool {
        self.remove0(Some(&cause), true)
    }

    fn remove0(&mut self, cause: Option<&WriteError>, notify: bool) -> bool {
        let Some(index) = self.flushed_entry else {
            return false;
        };
        self.remove_entry(index);

        let (cancelled, size, promise) = {
            let entry = self.pool.entry_mut(index);
            (entry.cancelled, entry.pending_size, entry.promise.take())
        };
        if !cancelled {
            // 负载所有权在此终结：成功路径上传输层已消费字节，失败路径直接丢弃。
            if let Some(promise) = promise {
                match cause {
                    None => {
                        promise.try_succeed();
                    }
                    Some(cause) => {
                        promise.try_fail(cause.clone());
                    }
                }
            }
            self.flow.decrement_pending(size, notify);
        }
        self.pool.recycle(index);
        true
    }

    /// 游标一致性的唯一执法点：摘除已刷写区头部条目并修复三游标。
    ///
    /// 分支结构刻意与排空语义一一对应：计数归零时已刷写区清空；
    /// 若被摘除的恰是队尾，整个链表随之清空（未刷写区必然也为空）；
    /// 否则已刷写头前移到后继。
    fn remove_entry(&mut self, index: u32) {
        self.flushed_count -= 1;
        if self.flushed_count == 0 {
            self.flushed_entry = None;
            if Some(index) == self.tail_entry {
                self.tail_entry = None;
                self.unflushed_entry = None;
            }
        } else {
            self.flushed_entry = self.pool.entry(index).next;
        }
    }

    /// 撤销一次在队写入。
    ///
    /// # 契约（What）
    /// - 凭据过期（条目已排空、槽位已复用）或重复撤销时返回 0，无任何副作用；
    /// - 首次撤销：信号以“已撤销”原因结算，负载替换为空哨兵，
    ///   记账尺寸清零并立即退还流控计数（允许复闸通知），返回释放的字节数；
    /// - 条目保持在链表中直到被正常排空，以维持 FIFO 顺序。
    pub fn cancel(&mut self, ticket: &WriteTicket) -> usize {
        if !self.pool.is_live(ticket) {
            return 0;
        }
        let entry = self.pool.entry_mut(ticket.index);
        if entry.cancelled {
            return 0;
        }
        if let Some(promise) = entry.promise.as_ref() {
            promise.try_fail(WriteError::write_cancelled());
        }
        let freed = entry.cancel();
        if freed > 0 {
            self.flow.decrement_pending(freed, true);
        }
        freed
    }

    /// 以统一原因批量失败整个已刷写区。
    ///
    /// # 契约（What）
    /// - 受 `in_fail` 护栏保护：信号结算的连带效应若再度触发本方法，静默忽略；
    /// - 反复执行失败排空直到已刷写区报告“无可移除”；
    /// - `notify == false` 时记账递减不发布复闸通知（调用方随后将走关闭流程）。
    pub fn fail_flushed(&mut self, cause: WriteError, notify: bool) {
        if self.in_fail {
            return;
        }
        self.in_fail = true;
        tracing::debug!(code = cause.code(), "批量失败已刷写区中的写入");
        while self.remove0(Some(&cause), notify) {}
        self.in_fail = false;
    }

    /// 关闭缓冲：以 `cause` 失败未刷写区的全部条目并清空链表。
    ///
    /// # 契约（What）
    /// - **前置条件**：已刷写区必须为空；违反即返回
    ///   [`OutboundError::FlushedEntriesOutstanding`]，这是致命的调用顺序错误，
    ///   不做内部兜底；
    /// - 正处于失败排空中被重入时静默返回 `Ok(())`；
    /// - 关闭阶段的记账递减不发布可写性事件（停机过程不再驱动上游起停）；
    /// - **后置条件**：三游标全空、所有未撤销条目的信号以 `cause` 结算、槽位全部回池。
    pub fn close(&mut self, cause: WriteError) -> Result<(), OutboundError> {
        if self.in_fail {
            return Ok(());
        }
        if self.flushed_entry.is_some() {
            tracing::error!(
                flushed = self.flushed_count,
                "仍有已刷写条目未排空，拒绝关闭出站缓冲"
            );
            return Err(OutboundError::FlushedEntriesOutstanding {
                flushed: self.flushed_count,
            });
        }
        self.in_fail = true;
        tracing::debug!(code = cause.code(), "关闭出站缓冲并失败未刷写区");

        let mut cursor = self.unflushed_entry;
        while let Some(index) = cursor {
            let (next, cancelled, size, promise) = {
                let entry = self.pool.entry_mut(index);
                (
                    entry.next,
                    entry.cancelled,
                    entry.pending_size,
                    entry.promise.take(),
                )
            };
            cursor = next;
            // 撤销过的条目记账已清零，这里的递减对其是无操作。
            self.flow.decrement_pending(size, false);
            if !cancelled {
                if let Some(promise) = promise {
                    promise.try_fail(cause.clone());
                }
            }
            self.pool.recycle(index);
        }
        self.unflushed_entry = None;
        self.tail_entry = None;
        self.in_fail = false;
        Ok(())
    }
}
