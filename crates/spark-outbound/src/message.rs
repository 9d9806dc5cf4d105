//! 出站消息体：零拷贝字节负载与不透明业务消息的统一载体。
//!
//! 字节类负载的可读长度可直接观测；业务消息的字节成本由更早的编码阶段决定，
//! 此处只以 `None` 表达“长度未知”，绝不退化为 0（0 会错误地绕过流控记账）。

use core::any::Any;
use core::fmt;

use bytes::Bytes;

/// 不透明的高层业务消息，长度对出站缓冲不可见。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 管线中并非所有消息在入队时都已编码为字节（例如文件区域、结构化控制帧），
///   出站缓冲必须能承载这类消息而不强行要求长度；
/// - `type_label` 为日志与排障提供稳定的类型标识，避免依赖 `TypeId` 的晦涩输出。
///
/// ## 契约（What）
/// - `payload` 满足 `Any + Send + Sync`，可在排空线程安全取出；
/// - `downcast_ref`/`into_payload` 提供类型还原通道，类型不匹配时不 panic。
pub struct UserMessage {
    type_label: &'static str,
    payload: Box<dyn Any + Send + Sync>,
}

impl UserMessage {
    /// 打包一个业务消息并附带稳定的类型标签。
    pub fn new(type_label: &'static str, payload: impl Any + Send + Sync) -> Self {
        Self {
            type_label,
            payload: Box::new(payload),
        }
    }

    /// 返回构造时登记的类型标签。
    pub fn type_label(&self) -> &'static str {
        self.type_label
    }

    /// 尝试以具体类型借用内部负载。
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// 消耗自身并交出内部负载的所有权。
    pub fn into_payload(self) -> Box<dyn Any + Send + Sync> {
        self.payload
    }
}

impl fmt::Debug for UserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserMessage")
            .field("type_label", &self.type_label)
            .finish_non_exhaustive()
    }
}

/// 出站缓冲接受的两类负载。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 对齐管线消息“零拷贝字节 + 高层业务消息”并存的分层：字节类走 [`Bytes`] 的
///   引用计数切片，业务类保持不透明；
/// - 出站缓冲只关心“可读长度是否可观测”，因此以 [`Self::readable_len`] 统一抹平差异。
///
/// ## 契约（What）
/// - `Bytes` 变体的 `readable_len()` 恒为 `Some(len)`；
/// - `User` 变体恒为 `None`，表示长度未知的哨兵语义，调用方不得将其默认为 0；
/// - 条目被撤销后负载被替换为 [`Self::empty`]，保持队列顺序的同时释放原负载。
#[derive(Debug)]
pub enum OutboundMessage {
    /// 零拷贝字节负载。
    Bytes(Bytes),
    /// 长度未知的业务消息。
    User(UserMessage),
}

impl OutboundMessage {
    /// 撤销条目时顶替原负载的空哨兵。
    pub fn empty() -> Self {
        Self::Bytes(Bytes::new())
    }

    /// 负载的可读字节长度；业务消息返回 `None`（长度未知哨兵）。
    pub fn readable_len(&self) -> Option<usize> {
        match self {
            Self::Bytes(bytes) => Some(bytes.len()),
            Self::User(_) => None,
        }
    }

    /// 以字节视角借用负载，业务消息返回 `None`。
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::User(_) => None,
        }
    }
}

impl From<Bytes> for OutboundMessage {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<UserMessage> for OutboundMessage {
    fn from(message: UserMessage) -> Self {
        Self::User(message)
    }
}
