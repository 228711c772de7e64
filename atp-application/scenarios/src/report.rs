//! 检查报告

use serde::{Deserialize, Serialize};
use std::time::Duration;
use chrono::{DateTime, Utc};

/// 套件报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// 套件名称
    pub name: String,

    /// 套件描述
    pub description: Option<String>,

    /// 服务端版本
    pub server_version: Option<String>,

    /// 开始时间
    pub start_time: DateTime<Utc>,

    /// 结束时间
    pub end_time: Option<DateTime<Utc>>,

    /// 总耗时
    #[serde(skip)]
    pub duration: Duration,

    /// 检查总数
    pub total: usize,

    /// 通过数
    pub passed_count: usize,

    /// 失败数
    pub failed_count: usize,

    /// 跳过数
    pub skipped_count: usize,

    /// 检查结果列表
    pub results: Vec<CheckOutcome>,
}

impl SuiteReport {
    /// 创建新的套件报告
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            server_version: None,
            start_time: Utc::now(),
            end_time: None,
            duration: Duration::from_secs(0),
            total: 0,
            passed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            results: Vec::new(),
        }
    }

    /// 添加检查结果
    pub fn add_outcome(&mut self, outcome: CheckOutcome) {
        match outcome.status {
            CheckStatus::Passed => self.passed_count += 1,
            CheckStatus::Failed(_) => self.failed_count += 1,
            CheckStatus::Skipped(_) => self.skipped_count += 1,
        }
        self.total += 1;
        self.results.push(outcome);
    }

    /// 完成报告
    pub fn finalize(&mut self) {
        let end_time = Utc::now();
        self.duration = (end_time - self.start_time)
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        self.end_time = Some(end_time);
    }

    /// 没有失败且至少执行了一项
    pub fn is_success(&self) -> bool {
        self.failed_count == 0 && self.passed_count > 0
    }

    /// 失败的检查
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.results.iter().filter(|r| r.status.is_failed())
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// 单项检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// 检查名称
    pub name: String,

    /// 目标集合
    pub target: Option<String>,

    /// 结果状态
    pub status: CheckStatus,

    /// 耗时
    #[serde(skip)]
    pub duration: Duration,
}

impl CheckOutcome {
    pub fn new(name: &str, target: Option<&str>, status: CheckStatus) -> Self {
        Self {
            name: name.to_string(),
            target: target.map(str::to_string),
            status,
            duration: Duration::from_secs(0),
        }
    }

    pub fn passed(name: &str, target: Option<&str>) -> Self {
        Self::new(name, target, CheckStatus::Passed)
    }

    pub fn failed(name: &str, target: Option<&str>, error: &str) -> Self {
        Self::new(name, target, CheckStatus::Failed(error.to_string()))
    }

    pub fn skipped(name: &str, target: Option<&str>, reason: &str) -> Self {
        Self::new(name, target, CheckStatus::Skipped(reason.to_string()))
    }

    /// `name[target]` 形式的标识
    pub fn label(&self) -> String {
        match &self.target {
            Some(target) => format!("{}[{}]", self.name, target),
            None => self.name.clone(),
        }
    }
}

/// 检查状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CheckStatus {
    /// 通过
    Passed,

    /// 失败
    Failed(String),

    /// 跳过
    Skipped(String),
}

impl CheckStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, CheckStatus::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CheckStatus::Skipped(_))
    }
}
