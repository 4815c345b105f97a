//! 感知重试包装
//!
//! 仿真物理的时序问题让注视/检测的首次调用有非零的虚假失败率：失败后立即重试一次（默认共两次），不退避。
//! 抓取/放置不走这里。后端不可用时不重试。

use std::future::Future;

use crate::backend::BackendError;

/// 默认总尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// 执行 action，失败则立即重试，最多 max_attempts 次（至少 1 次）；全部失败时返回最后一次的错误
pub async fn with_retry<T, F, Fut>(max_attempts: u32, mut action: F) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match action().await {
            Ok(v) => return Ok(v),
            Err(e @ (BackendError::Unavailable(_) | BackendError::Cancelled)) => return Err(e),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Perception attempt failed, retrying");
                attempt += 1;
            }
        }
    }
}
