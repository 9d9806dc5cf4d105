//! 测试桩命名空间，集中暴露官方维护的监听器桩实现，供单元测试、契约测试与示例复用。
//!
//! # 设计背景（Why）
//! - 统一维护常见桩对象，避免各处重复定义零尺寸结构体或记录器；
//! - 当监听器契约演进时，通过单点更新保证所有测试同步适配。

use std::sync::Arc;

use spin::Mutex;

use crate::flow::WritabilityListener;

/// 不做任何事的可写性监听器，适合只关心记账与队列行为的场景。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopWritabilityListener;

impl WritabilityListener for NoopWritabilityListener {
    fn on_writability_changed(&self, _is_writable: bool) {}
}

/// 记录每次可写性翻转的监听器，断言“恰好触发 N 次”的测试主力。
#[derive(Debug, Default)]
pub struct RecordingWritabilityListener {
    transitions: Mutex<Vec<bool>>,
}

impl RecordingWritabilityListener {
    /// 构造一个可跨线程共享的记录器。
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 按发生顺序返回全部翻转事件（`false` = 拉闸，`true` = 复闸）。
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions.lock().clone()
    }

    /// 累计触发次数。
    pub fn count(&self) -> usize {
        self.transitions.lock().len()
    }
}

impl WritabilityListener for RecordingWritabilityListener {
    fn on_writability_changed(&self, is_writable: bool) {
        self.transitions.lock().push(is_writable);
    }
}
