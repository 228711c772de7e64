//! 检查套件定义与执行
//!
//! 套件以 YAML 描述：
//!
//! ```yaml
//! name: rest-smoke
//! description: REST API 冒烟检查
//! checks:
//!   - check: ping
//!   - check: paging
//!     params: { limit: 11, offset: 13 }
//!   - check: query_simple_collection
//!     collections: [vms, users]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use atp_restapi::RestClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checks::{Check, CheckParams};
use crate::report::{CheckOutcome, SuiteReport};

/// 检查套件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    /// 套件名称
    pub name: String,

    /// 套件描述
    #[serde(default)]
    pub description: Option<String>,

    /// 检查列表
    pub checks: Vec<SuiteCheck>,
}

/// 套件中的一项检查
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteCheck {
    /// 检查项
    pub check: Check,

    /// 目标集合，为空时使用检查项的默认目标
    #[serde(default)]
    pub collections: Vec<String>,

    /// 检查参数
    #[serde(default)]
    pub params: CheckParams,
}

impl SuiteCheck {
    pub fn new(check: Check) -> Self {
        Self {
            check,
            collections: Vec::new(),
            params: CheckParams::default(),
        }
    }
}

impl Suite {
    /// 从 YAML 文件加载套件
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取套件文件失败: {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("解析套件文件失败: {}", path.display()))
    }

    /// 从 YAML 字符串加载套件
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let suite: Suite = serde_yaml::from_str(content)?;
        Ok(suite)
    }

    /// 内置只读套件: 所有不创建/删除资源的检查
    pub fn builtin() -> Self {
        Self {
            name: "builtin".to_string(),
            description: Some("内置只读 REST API 检查".to_string()),
            checks: Check::ALL
                .iter()
                .copied()
                .filter(|c| !c.is_destructive())
                .map(SuiteCheck::new)
                .collect(),
        }
    }
}

/// 套件执行器
///
/// 检查按套件顺序逐项执行，单项失败不影响后续检查。
pub struct SuiteRunner<'a> {
    client: &'a RestClient,
    fail_fast: bool,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self {
            client,
            fail_fast: false,
        }
    }

    /// 第一个失败后停止执行
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// 执行套件
    pub async fn run(&self, suite: &Suite) -> SuiteReport {
        info!("开始执行检查套件: {}", suite.name);
        let capabilities = self.client.capabilities().ok();

        let mut report = SuiteReport::new(&suite.name);
        report.description = suite.description.clone();
        report.server_version = capabilities.map(|c| c.version().to_string());

        'checks: for entry in &suite.checks {
            let check = entry.check;
            let targets: Vec<Option<String>> = if !check.is_collection_scoped() {
                vec![None]
            } else if entry.collections.is_empty() {
                check
                    .default_targets(capabilities)
                    .into_iter()
                    .map(Some)
                    .collect()
            } else {
                entry.collections.iter().cloned().map(Some).collect()
            };

            for target in targets {
                let target = target.as_deref();
                let skip = capabilities.and_then(|c| check.skip_reason(c, target, &entry.params));
                let outcome = match skip {
                    Some(reason) => {
                        info!("跳过检查 {} {:?}: {}", check, target, reason);
                        CheckOutcome::skipped(check.name(), target, &reason)
                    }
                    None => check.run(self.client, target, &entry.params).await,
                };

                let failed = outcome.status.is_failed();
                if failed {
                    warn!("检查失败: {}", outcome.label());
                }
                report.add_outcome(outcome);
                if failed && self.fail_fast {
                    break 'checks;
                }
            }
        }

        report.finalize();
        info!(
            "检查套件完成: {} 通过, {} 失败, {} 跳过",
            report.passed_count, report.failed_count, report.skipped_count
        );
        report
    }
}
