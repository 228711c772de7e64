//! 事件流查找检查

use std::time::Duration;

use atp_restapi::{wait_for, RestClient, RestError, WaitOptions};
use serde_json::{json, Value};
use tracing::info;

use super::{CheckParams, CheckResult, Verdict};
use crate::assert::SoftAssert;

const DEFAULT_EVENT_TYPE: &str = "EmsEvent";

/// 轮询 `find_by` 直到有匹配事件，再按 id 获取最后一个
///
/// 条件缺省为 `type=EmsEvent`。超时记为失败而不是错误。
pub(super) async fn find_events(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let criteria: Vec<(&str, Value)> = if params.criteria.is_empty() {
        vec![("type", json!(DEFAULT_EVENT_TYPE))]
    } else {
        params
            .criteria
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect()
    };

    let handle = client.collection(collection)?;
    let options = WaitOptions::new(
        Duration::from_secs(params.timeout_secs.unwrap_or(30)),
        Duration::from_secs(params.delay_secs.unwrap_or(5)),
    )
    .message(format!("{} 中查找 {:?}", collection, criteria));

    let mut sa = SoftAssert::new();
    let found = wait_for(&options, || async {
        let found = handle.find_by(&criteria).await?;
        Ok::<_, RestError>((!found.is_empty()).then_some(found))
    })
    .await;
    let found = match found {
        Ok(found) => found,
        Err(e) if e.is_timeout() => {
            sa.fail(e.to_string());
            return Ok(Verdict::Done(sa));
        }
        Err(e) => return Err(e),
    };
    info!("{} 中找到 {} 个事件", collection, found.len());

    let Some(id) = found.last().and_then(|e| e.id()) else {
        sa.fail(format!("{} 中的事件缺少 id", collection));
        return Ok(Verdict::Done(sa));
    };
    match handle.get(&[("id", Value::String(id.clone()))]).await {
        Ok(event) => {
            sa.eq(event.id(), Some(id.clone()), "按 id 获取的事件");
        }
        Err(e) => sa.fail(format!("无法获取事件 {}: {}", id, e)),
    }
    Ok(Verdict::Done(sa))
}
