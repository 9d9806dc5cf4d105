#![deny(unsafe_code)]
#![doc = "spark-outbound: 通道出站写缓冲、水位流控与写完成信号引擎。"]
#![doc = ""]
#![doc = "本 crate 位于应用写入路径与传输层之间：接收应用写请求并入队、"]
#![doc = "以高/低双水位对上游施加迟滞式背压、按严格 FIFO 把已刷写条目排空给传输层，"]
#![doc = "并保证每条写入的完成信号恰好结算一次（成功、失败或撤销）。"]
#![doc = ""]
#![doc = "== 职责边界 =="]
#![doc = "传输层 IO、管线事件分发与事件循环调度均为外部协作者；"]
#![doc = "本 crate 只约定与它们交汇的三个面：排空面（`current` + `remove*`）、"]
#![doc = "可写性回调面（[`WritabilityListener`]）与逐写入的完成信号面（[`WriteReceipt`]）。"]

mod entry;

pub mod buffer;
pub mod error;
pub mod flow;
pub mod message;
pub mod promise;
pub mod test_stubs;
pub mod watermark;

pub use buffer::OutboundBuffer;
pub use entry::WriteTicket;
pub use error::{OutboundError, WriteError, codes};
pub use flow::{FlowController, WritabilityListener};
pub use message::{OutboundMessage, UserMessage};
pub use promise::{WritePromise, WriteReceipt};
pub use watermark::{DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, WriteBufferWaterMark};
