//! 写缓冲水位配置：高/低双阈值构成迟滞区间，避免可写性在单一阈值上抖动。

use crate::error::OutboundError;

/// 默认低水位：32 KiB。
pub const DEFAULT_LOW_WATER_MARK: usize = 32 * 1024;
/// 默认高水位：64 KiB。
pub const DEFAULT_HIGH_WATER_MARK: usize = 64 * 1024;

/// 出站写缓冲的水位对。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 待发字节达到高水位即进入“不可写”，回落到低水位（或归零）才恢复“可写”，
///   双阈值之间的迟滞区间吸收抖动，上游据此暂停/恢复生产；
/// - 构造期校验 `low < high`，把配置错误挡在进入热路径之前。
///
/// ## 契约（What）
/// - **前置条件**：`low < high`，违反时返回 [`OutboundError::InvalidWaterMark`]；
/// - **后置条件**：实例不可变，可被 [`FlowController`](crate::FlowController) 在多线程下只读共享。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteBufferWaterMark {
    low: usize,
    high: usize,
}

impl WriteBufferWaterMark {
    /// 构造水位对，校验 `low < high`。
    pub fn new(low: usize, high: usize) -> Result<Self, OutboundError> {
        if low >= high {
            return Err(OutboundError::InvalidWaterMark { low, high });
        }
        Ok(Self { low, high })
    }

    /// 低水位（字节）。
    pub fn low(&self) -> usize {
        self.low
    }

    /// 高水位（字节）。
    pub fn high(&self) -> usize {
        self.high
    }
}

impl Default for WriteBufferWaterMark {
    /// 沿用主流传输框架的惯例默认值：32 KiB / 64 KiB。
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_WATER_MARK,
            high: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_watermark_keeps_conventional_values() {
        let mark = WriteBufferWaterMark::default();
        assert_eq!(mark.low(), 32 * 1024);
        assert_eq!(mark.high(), 64 * 1024);
    }

    #[test]
    fn rejects_low_not_strictly_below_high() {
        assert_eq!(
            WriteBufferWaterMark::new(64, 64),
            Err(OutboundError::InvalidWaterMark { low: 64, high: 64 }),
        );
        assert_eq!(
            WriteBufferWaterMark::new(100, 50),
            Err(OutboundError::InvalidWaterMark { low: 100, high: 50 }),
        );
    }

    #[test]
    fn accepts_strict_ordering() {
        let mark = WriteBufferWaterMark::new(50, 100).expect("合法水位对必须构造成功");
        assert_eq!((mark.low(), mark.high()), (50, 100));
    }
}
