//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能：管理平台连接、JSON 参数解析。

use anyhow::{Context, Result};
use atp_restapi::{Attributes, RestClient};
use serde_json::Value;
use tracing::info;

use crate::config::CliConfig;

/// 按配置连接管理平台并加载入口文档
pub async fn connect(appliance: Option<&str>) -> Result<RestClient> {
    let config = CliConfig::load()?;
    let profile = config.resolve(appliance, |key| std::env::var(key).ok())?;

    info!("连接管理平台: {}", profile.base_url);
    let mut client = RestClient::new(&profile.base_url, profile.rest_config())
        .with_context(|| format!("创建 REST 客户端失败: {}", profile.base_url))?;
    if let (Some(user), Some(password)) = (&profile.username, &profile.password) {
        client = client.with_credentials(user, password);
    }

    client.login().await.context("管理平台登录失败")?;
    client.load().await.context("加载入口文档失败")?;
    Ok(client)
}

/// 解析 JSON 对象或对象数组
pub fn parse_resources(raw: &str) -> Result<Vec<Attributes>> {
    let value: Value = serde_json::from_str(raw).context("解析 JSON 失败")?;
    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => anyhow::bail!("第 {} 项不是 JSON 对象: {}", i, other),
            })
            .collect(),
        other => anyhow::bail!("期望 JSON 对象或数组，实际: {}", other),
    }
}

/// 属性值的单行显示
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
