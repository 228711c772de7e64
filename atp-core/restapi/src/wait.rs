//! 长时间操作轮询

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{RestError, Result};

/// 轮询参数
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// 总超时
    pub timeout: Duration,

    /// 两次探测间隔
    pub delay: Duration,

    /// 超时错误中的描述
    pub message: String,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            delay: Duration::from_secs(5),
            message: "等待条件满足".to_string(),
        }
    }
}

impl WaitOptions {
    pub fn new(timeout: Duration, delay: Duration) -> Self {
        Self {
            timeout,
            delay,
            ..Default::default()
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// 反复执行探测直到返回 `Some`
///
/// 探测出错立即返回该错误；超过 `timeout` 返回 [`RestError::Timeout`]。
pub async fn wait_for<T, F, Fut>(options: &WaitOptions, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + options.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = probe().await? {
            debug!("{}: 第 {} 次探测满足条件", options.message, attempts);
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            warn!("{}: {} 次探测后超时", options.message, attempts);
            return Err(RestError::Timeout(format!(
                "{} ({:?} 内未完成，共探测 {} 次)",
                options.message, options.timeout, attempts
            )));
        }
        sleep(options.delay.min(deadline - now)).await;
    }
}

/// 反复重新加载实体，直到每个实体的 `field` 等于 `expected`
///
/// 例如等待所有请求的 `request_state` 变为 `finished`。
pub async fn wait_for_field(
    entities: &mut [Entity<'_>],
    field: &str,
    expected: &Value,
    options: &WaitOptions,
) -> Result<()> {
    let deadline = Instant::now() + options.timeout;

    loop {
        let mut pending = 0usize;
        for entity in entities.iter_mut() {
            entity.reload().await?;
            if entity.get(field) != Some(expected) {
                pending += 1;
            }
        }
        if pending == 0 {
            return Ok(());
        }
        debug!("{}: 还有 {} 个资源的 {} 不是 {}", options.message, pending, field, expected);

        let now = Instant::now();
        if now >= deadline {
            return Err(RestError::Timeout(format!(
                "{}: {} 个资源的 {} 在 {:?} 内未变为 {}",
                options.message, pending, field, options.timeout, expected
            )));
        }
        sleep(options.delay.min(deadline - now)).await;
    }
}
