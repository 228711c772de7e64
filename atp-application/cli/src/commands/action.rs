//! 集合级操作命令

use anyhow::{Context, Result};
use atp_restapi::{ActionResult, ResourceRef};
use colored::Colorize;
use serde::Serialize;

use super::common::{connect, display_value, parse_resources};
use super::output::{output_formatted, TableRow};
use crate::ActionAction;

/// 单个目标的结果行
#[derive(Serialize)]
struct ResultRow {
    index: usize,
    success: bool,
    id: Option<String>,
    message: Option<String>,
}

impl ResultRow {
    fn from_result(index: usize, result: &ActionResult) -> Self {
        Self {
            index,
            success: result.success,
            id: result.data.get("id").map(display_value),
            message: result.message.clone(),
        }
    }
}

impl TableRow for ResultRow {
    fn headers() -> Vec<&'static str> {
        vec!["序号", "结果", "ID", "消息"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            if self.success { "成功" } else { "失败" }.to_string(),
            self.id.clone().unwrap_or_else(|| "-".to_string()),
            self.message.clone().unwrap_or_default(),
        ]
    }
}

pub async fn handle(appliance: Option<&str>, action: ActionAction) -> Result<()> {
    match action {
        ActionAction::Run {
            collection,
            action,
            data,
            data_file,
            format,
        } => {
            let raw = match (data, data_file) {
                (Some(raw), _) => Some(raw),
                (None, Some(path)) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("读取数据文件失败: {}", path))?,
                ),
                (None, None) => None,
            };
            let targets = match raw {
                Some(raw) => parse_resources(&raw)?,
                None => Vec::new(),
            };
            run_action(appliance, &collection, &action, targets, &format).await
        }
    }
}

async fn run_action(
    appliance: Option<&str>,
    name: &str,
    action: &str,
    targets: Vec<atp_restapi::Attributes>,
    format: &str,
) -> Result<()> {
    let client = connect(appliance).await?;
    let collection = client.collection(name)?;
    let refs: Vec<ResourceRef> = targets.into_iter().map(ResourceRef::from_attributes).collect();

    let results = collection
        .action(action, &refs)
        .await
        .with_context(|| format!("{} 操作 {} 失败", name, action))?;

    let rows: Vec<ResultRow> = results
        .iter()
        .enumerate()
        .map(|(i, r)| ResultRow::from_result(i, r))
        .collect();
    output_formatted(&rows, format)?;

    let failed = rows.iter().filter(|r| !r.success).count();
    if format == "table" {
        println!();
        if failed == 0 {
            println!("{} {} 个目标全部成功", "✓".green().bold(), rows.len());
        } else {
            println!("{} {} 个目标中 {} 个失败", "✗".red().bold(), rows.len(), failed);
        }
    }
    if failed > 0 {
        anyhow::bail!("操作 {} 有 {} 个目标失败", action, failed);
    }
    Ok(())
}
