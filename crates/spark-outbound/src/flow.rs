//! 流控协议：待发字节计数与可写性标志的原子协定。
//!
//! # 教案式导览
//!
//! - **Why**：生产者入队与排空路径可能运行在不同执行上下文，监控线程还会随时读取
//!   `is_writable`，因此字节计数采用 fetch-add、可写性标志采用比较交换，
//!   即便队列结构本身由外部单写者串行化，这两项状态也必须自洽；
//! - **How**：计数越过高水位触发“置为不可写”，回落到低水位（或归零）触发“置为可写”；
//!   两个方向都是 CAS 重试循环，只有真正把位从 0↔非 0 翻转的那次胜出 CAS 才允许
//!   发布回调，失败重试与空翻转一律静默（边沿触发而非电平触发）；
//! - **What**：回调在翻转发生的线程上同步执行，每次真实翻转至少触发一次、
//!   空翻转绝不触发；派生查询 `bytes_before_unwritable`/`bytes_before_writable`
//!   在标志与算术矛盾时一律压到 0（刻意保留的源语义，见各方法契约）。

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::watermark::WriteBufferWaterMark;

const UNWRITABLE_BIT: u32 = 1;

/// 可写性变更监听器，由通道在构造出站缓冲时注册。
///
/// # 契约（What）
/// - 回调在引发翻转的线程上同步执行，实现方不得在其中长时间阻塞；
/// - 每次 0↔非 0 的真实翻转至少收到一次通知，空翻转绝不会收到；
/// - 多线程竞争同一翻转时通知不保证与阈值穿越一一对应，只保证边沿语义。
pub trait WritabilityListener: Send + Sync + 'static {
    /// `is_writable == false` 表示待发字节已压过高水位，上游应当暂停生产。
    fn on_writability_changed(&self, is_writable: bool);
}

/// 待发字节计数 + 可写性标志的共享流控核心。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 把“会被并发读取的状态”从队列结构中剥离出来单独共享：队列游标只归单写者，
///   而本结构以 `Arc` 形式交给监控、背压探测等任意线程只读使用；
/// - 高/低双水位构成迟滞区间，先压过高水位才拉闸、回落到低水位才复闸，避免抖动。
///
/// ## 契约（What）
/// - [`is_writable`](Self::is_writable) / [`total_pending_bytes`](Self::total_pending_bytes)
///   为无锁读，任意线程可安全调用；
/// - 计数的增减仅由出站缓冲内部驱动（`pub(crate)`），外部不可直接篡改记账。
pub struct FlowController {
    watermark: WriteBufferWaterMark,
    total_pending: AtomicI64,
    unwritable: AtomicU32,
    listener: Arc<dyn WritabilityListener>,
}

impl FlowController {
    pub(crate) fn new(
        watermark: WriteBufferWaterMark,
        listener: Arc<dyn WritabilityListener>,
    ) -> Self {
        Self {
            watermark,
            total_pending: AtomicI64::new(0),
            unwritable: AtomicU32::new(0),
            listener,
        }
    }

    /// 当前是否可写（未压过高水位）。任意线程可读。
    pub fn is_writable(&self) -> bool {
        self.unwritable.load(Ordering::Acquire) == 0
    }

    /// 当前记账的待发字节总量（已刷写 + 未刷写）。
    pub fn total_pending_bytes(&self) -> i64 {
        self.total_pending.load(Ordering::Acquire)
    }

    /// 配置的水位对。
    pub fn watermark(&self) -> &WriteBufferWaterMark {
        &self.watermark
    }

    /// 距离进入“不可写”还剩多少字节余量。
    ///
    /// # 契约（What）
    /// - 已处于不可写状态时恒为 0，即便算术余量为正也压到 0：
    ///   “已被拦下”的通道对外报告零余量，这是刻意保留的语义而非缺陷。
    pub fn bytes_before_unwritable(&self) -> i64 {
        let bytes = self.watermark.high() as i64 - self.total_pending_bytes();
        if bytes > 0 && self.is_writable() { bytes } else { 0 }
    }

    /// 距离恢复“可写”还需排空多少字节。
    ///
    /// # 契约（What）
    /// - 仍处于可写状态时恒为 0；只有已被拦下时才报告真实积压量。
    pub fn bytes_before_writable(&self) -> i64 {
        let bytes = self.total_pending_bytes() - self.watermark.low() as i64;
        if bytes > 0 && !self.is_writable() { bytes } else { 0 }
    }

    /// 入队记账：原子加 `size`，新总量触及高水位则拉闸。
    pub(crate) fn increment_pending(&self, size: usize) {
        if size == 0 {
            return;
        }
        let new_total = self.total_pending.fetch_add(size as i64, Ordering::AcqRel) + size as i64;
        if new_total >= self.watermark.high() as i64 {
            self.set_unwritable();
        }
    }

    /// 排空/撤销记账：原子减 `size`；`notify` 且新总量归零或回落到低水位则复闸。
    pub(crate) fn decrement_pending(&self, size: usize, notify: bool) {
        if size == 0 {
            return;
        }
        let new_total = self.total_pending.fetch_sub(size as i64, Ordering::AcqRel) - size as i64;
        if notify && (new_total == 0 || new_total <= self.watermark.low() as i64) {
            self.set_writable();
        }
    }

    /// CAS 重试循环置入不可写位；仅真正翻转 0→非 0 的胜出者发布回调。
    fn set_unwritable(&self) {
        loop {
            let old = self.unwritable.load(Ordering::Acquire);
            let new = old | UNWRITABLE_BIT;
            if self
                .unwritable
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if old == 0 && new != 0 {
                    self.fire_writability_changed(false);
                }
                return;
            }
        }
    }

    /// CAS 重试循环清除不可写位；仅真正翻转非 0→0 的胜出者发布回调。
    fn set_writable(&self) {
        loop {
            let old = self.unwritable.load(Ordering::Acquire);
            let new = old & !UNWRITABLE_BIT;
            if self
                .unwritable
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if old != 0 && new == 0 {
                    self.fire_writability_changed(true);
                }
                return;
            }
        }
    }

    fn fire_writability_changed(&self, is_writable: bool) {
        tracing::trace!(
            is_writable,
            pending = self.total_pending_bytes(),
            "出站缓冲可写性翻转"
        );
        self.listener.on_writability_changed(is_writable);
    }
}
