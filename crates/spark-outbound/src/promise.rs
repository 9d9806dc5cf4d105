//! 写完成信号：每个入队写入对应一对 `WritePromise`（缓冲侧）与 `WriteReceipt`（生产者侧）。
//!
//! # 教案式导览
//!
//! - **Why**：排空、失败与关闭三条路径都可能结算同一个条目，信号必须“至多结算一次”，
//!   否则生产者会观察到先成功后失败之类的矛盾结果；
//! - **How**：以原子状态机（空闲 → 结算中 → 已结算）做比较交换，赢得竞争的一方写入结果
//!   并唤醒等待者，输掉的一方得到 `false` 并且不得覆盖结果；
//! - **What**：`WriteReceipt` 同时提供非阻塞的 [`try_outcome`](WriteReceipt::try_outcome)
//!   与标准 `Future` 语义，便于同步排障路径与异步调用方共用一套信号。

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;

use crate::error::WriteError;

const STATE_PENDING: u8 = 0;
const STATE_SETTLING: u8 = 1;
const STATE_SETTLED: u8 = 2;

struct PromiseShared {
    state: AtomicU8,
    outcome: Mutex<Option<Result<(), WriteError>>>,
    waker: Mutex<Option<Waker>>,
}

impl PromiseShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_PENDING),
            outcome: Mutex::new(None),
            waker: Mutex::new(None),
        }
    }
}

/// 缓冲侧持有的结算句柄。
///
/// # 契约（What）
/// - [`try_succeed`](Self::try_succeed) / [`try_fail`](Self::try_fail) 仅首次调用返回 `true`；
///   后续任何结算尝试均为无副作用的 `false`；
/// - 结算动作对持有 [`WriteReceipt`] 的线程立即可见，并唤醒挂起的等待者。
pub struct WritePromise {
    shared: Arc<PromiseShared>,
}

impl WritePromise {
    /// 创建一对新的信号端点：缓冲侧 promise 与生产者侧 receipt。
    pub fn pair() -> (WritePromise, WriteReceipt) {
        let shared = Arc::new(PromiseShared::new());
        (
            WritePromise {
                shared: Arc::clone(&shared),
            },
            WriteReceipt { shared },
        )
    }

    /// 以成功结算信号；竞争失败（已被结算）时返回 `false`。
    pub fn try_succeed(&self) -> bool {
        self.settle(Ok(()))
    }

    /// 以失败结算信号；竞争失败时返回 `false`，且不覆盖既有结果。
    pub fn try_fail(&self, cause: WriteError) -> bool {
        self.settle(Err(cause))
    }

    /// 信号是否已经结算（含正在写入结果的瞬间）。
    pub fn is_settled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) != STATE_PENDING
    }

    fn settle(&self, outcome: Result<(), WriteError>) -> bool {
        // 比较交换抢占结算权：输掉的一方直接返回，绝不触碰结果槽。
        if self
            .shared
            .state
            .compare_exchange(
                STATE_PENDING,
                STATE_SETTLING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        *self.shared.outcome.lock() = Some(outcome);
        self.shared.state.store(STATE_SETTLED, Ordering::Release);
        if let Some(waker) = self.shared.waker.lock().take() {
            waker.wake();
        }
        true
    }
}

/// 生产者侧持有的结果句柄，兼具同步窥探与 `Future` 等待两种消费方式。
pub struct WriteReceipt {
    shared: Arc<PromiseShared>,
}

impl WriteReceipt {
    /// 非阻塞地读取结算结果；尚未结算时返回 `None`。
    pub fn try_outcome(&self) -> Option<Result<(), WriteError>> {
        if self.shared.state.load(Ordering::Acquire) != STATE_SETTLED {
            return None;
        }
        self.shared.outcome.lock().clone()
    }

    /// 信号是否已经完成结算。
    pub fn is_settled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_SETTLED
    }
}

impl Future for WriteReceipt {
    type Output = Result<(), WriteError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.try_outcome() {
            return Poll::Ready(outcome);
        }
        *self.shared.waker.lock() = Some(cx.waker().clone());
        // 注册 waker 后复查，封堵“注册前一瞬完成结算”的窗口。
        match self.try_outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn first_settle_wins_and_later_attempts_are_noops() {
        let (promise, receipt) = WritePromise::pair();
        assert!(promise.try_succeed(), "首次结算应当成功");
        assert!(!promise.try_fail(WriteError::channel_closed()), "二次结算必须被拒绝");
        assert_eq!(receipt.try_outcome(), Some(Ok(())), "结果不得被后续尝试覆盖");
    }

    #[test]
    fn failure_outcome_carries_cause() {
        let (promise, receipt) = WritePromise::pair();
        assert!(promise.try_fail(WriteError::channel_closed()));
        let outcome = receipt.try_outcome().expect("结算后结果必须可读");
        let err = outcome.expect_err("失败结算应产出错误");
        assert_eq!(err.code(), codes::CHANNEL_CLOSED);
    }

    #[test]
    fn receipt_future_wakes_on_cross_thread_settle() {
        let (promise, receipt) = WritePromise::pair();
        let settler = thread::spawn(move || {
            assert!(promise.try_succeed(), "跨线程结算应当成功");
        });
        let outcome = block_on(receipt);
        settler.join().expect("结算线程必须平稳退出");
        assert_eq!(outcome, Ok(()));
    }

    #[test]
    fn unsettled_receipt_reports_none() {
        let (_promise, receipt) = WritePromise::pair();
        assert!(receipt.try_outcome().is_none());
        assert!(!receipt.is_settled());
    }
}
