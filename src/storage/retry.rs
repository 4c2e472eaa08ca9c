//! Retry policy / 重试策略
//!
//! Explicit policy object instead of sleep constants buried in a loop, so
//! backoff is unit-testable without real timers.

use std::time::Duration;

/// Linear backoff retry policy / 线性退避重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first / 总尝试次数（含首次）
    pub max_attempts: u32,
    /// Delay unit / 退避基准时间
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the retry following failed attempt N (1-based)
    /// 第N次失败后的退避时间（从1开始计）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}
