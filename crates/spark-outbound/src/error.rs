//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义出站缓冲对外暴露的错误语义，区分“单次写入失败原因”与“调用方契约违规”两条链路；
//! - 写失败通过条目的完成信号回传给生产者，契约违规则以同步 `Result` 直接返回给调用方，
//!   两者绝不混用，避免排空循环被异常打断。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error` 以兼容 `std::error::Error` 生态；
//! - 写失败原因必须可克隆：`fail_flushed`/`close` 会用同一个根因批量失败整段队列；
//! - 错误码遵循 `<域>.<语义>` 的稳定命名，集中登记在 [`codes`] 模块，便于日志与告警精确分类。

use std::borrow::Cow;

use thiserror::Error;

/// 稳定错误码常量表。
///
/// # 约定（What）
/// - 命名遵循 `outbound.<语义>`；
/// - 常量一经发布不得变更字面值，新增语义只能追加新常量。
pub mod codes {
    /// 通道已关闭，队列中尚未排空的写入被批量失败。
    pub const CHANNEL_CLOSED: &str = "outbound.channel_closed";
    /// 传输层拒绝了一次已刷写的写入。
    pub const FLUSH_FAILED: &str = "outbound.flush_failed";
    /// 生产者在排空前撤销了写入。
    pub const WRITE_CANCELLED: &str = "outbound.write_cancelled";
}

/// 单次写入的失败原因，经由完成信号（[`WriteReceipt`](crate::WriteReceipt)）回传给生产者。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 失败排空（`fail_flushed`/`close`）需要把同一个根因复制到整段队列的每个条目上，
///   因此原因类型必须廉价可克隆，而不是独占所有权的错误链；
/// - 借鉴核心契约层“稳定错误码 + 人读消息”的双轨结构：`code` 面向机读治理，
///   `message` 面向排障人员。
///
/// ## 契约（What）
/// - `code`：`'static` 稳定错误码，建议取自 [`codes`]；
/// - `message`：自然语言描述，避免包含敏感信息；
/// - **后置条件**：实例满足 `Send + Sync + 'static`，可安全跨线程传递并随信号共享。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct WriteError {
    code: &'static str,
    message: Cow<'static, str>,
}

impl WriteError {
    /// 构造写失败原因。`code` 需遵循 `<域>.<语义>` 约定并在 [`codes`] 中备案。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// 通道关闭时批量失败未排空写入所用的标准原因。
    pub fn channel_closed() -> Self {
        Self::new(codes::CHANNEL_CLOSED, "channel closed before write drained")
    }

    /// 生产者撤销写入时结算完成信号所用的标准原因。
    pub fn write_cancelled() -> Self {
        Self::new(codes::WRITE_CANCELLED, "write cancelled by producer")
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 人类可读描述。
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 出站缓冲的契约违规错误，同步返回给调用方，不进入完成信号链路。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 水位配置非法与“带着未排空的已刷写条目关闭”都属于编程错误而非运行时故障，
///   必须在调用点立刻暴露，禁止内部重试或吞掉；
/// - 细粒度变体携带现场数据（水位值、滞留条目数），方便断言与日志直接引用。
///
/// ## 契约（What）
/// - 变体满足 `Send + Sync + 'static`；
/// - 返回 `Err` 时出站缓冲自身状态保持未变，调用方可据此修复调用顺序后重试。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutboundError {
    /// 低水位必须严格小于高水位，否则迟滞区间不存在、可写性将在单一阈值上抖动。
    #[error("invalid watermark: low {low} must be strictly less than high {high}")]
    InvalidWaterMark { low: usize, high: usize },
    /// 已刷写区仍有条目未排空时禁止关闭，这是关闭契约的硬性前置条件。
    #[error("cannot close outbound buffer: {flushed} flushed write(s) still pending drain")]
    FlushedEntriesOutstanding { flushed: usize },
}
