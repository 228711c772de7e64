//! 检查套件命令

use anyhow::{Context, Result};
use atp_scenarios::{Check, CheckStatus, Suite, SuiteReport, SuiteRunner};
use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use super::common::connect;
use crate::config::CliConfig;
use crate::CheckAction;

pub async fn handle(appliance: Option<&str>, action: CheckAction) -> Result<()> {
    match action {
        CheckAction::List => list_checks(),
        CheckAction::Run {
            file,
            output,
            format,
            fail_fast,
        } => {
            let suite = load_suite(&file)?;
            run_suite(appliance, &suite, output.as_deref(), &format, fail_fast).await
        }
        CheckAction::Builtin { output, format } => {
            run_suite(appliance, &Suite::builtin(), output.as_deref(), &format, false).await
        }
    }
}

/// 按路径加载套件；相对路径不存在时再到配置的套件目录中查找
fn load_suite(file: &str) -> Result<Suite> {
    let path = Path::new(file);
    if path.exists() {
        return Suite::from_yaml(path);
    }
    let in_dir = CliConfig::load()?.get_suite_dir().join(file);
    if in_dir.exists() {
        return Suite::from_yaml(&in_dir);
    }
    anyhow::bail!("套件文件不存在: {}", file)
}

fn list_checks() -> Result<()> {
    println!("{}\n", "可用检查项:".bold());
    for check in Check::ALL {
        let tag = if check.is_destructive() {
            " [会修改数据]".red().to_string()
        } else {
            String::new()
        };
        println!("  {:<28} {}{}", check.name().cyan(), check.description(), tag);
    }
    Ok(())
}

async fn run_suite(
    appliance: Option<&str>,
    suite: &Suite,
    output: Option<&str>,
    format: &str,
    fail_fast: bool,
) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message("连接管理平台...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let client = connect(appliance).await?;
    spinner.finish_with_message(format!("{} 管理平台连接成功", "✓".green().bold()));

    println!("\n{} {}\n", "开始执行套件:".bold(), suite.name.cyan().bold());
    let report = SuiteRunner::new(&client).fail_fast(fail_fast).run(suite).await;

    print_report(&report);

    if let Some(path) = output {
        let content = match format {
            "yaml" => report.to_yaml()?,
            _ => report.to_json()?,
        };
        std::fs::write(path, content).with_context(|| format!("写入报告失败: {}", path))?;
        println!("报告已保存: {}", path.yellow());
    }

    if report.failed_count > 0 {
        anyhow::bail!("套件执行失败");
    }
    Ok(())
}

fn print_report(report: &SuiteReport) {
    for outcome in &report.results {
        let (icon, detail) = match &outcome.status {
            CheckStatus::Passed => ("✓".green(), None),
            CheckStatus::Failed(msg) => ("✗".red(), Some(msg)),
            CheckStatus::Skipped(reason) => ("⊘".yellow(), Some(reason)),
        };
        println!(
            "{} {} {}",
            icon.bold(),
            outcome.label(),
            format!("({} ms)", outcome.duration.as_millis()).bright_black()
        );
        if let Some(detail) = detail {
            for line in detail.lines() {
                if outcome.status.is_failed() {
                    println!("   {}", line.red());
                } else {
                    println!("   {}", line.bright_black());
                }
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("套件名称: {}", report.name.cyan().bold());
    if let Some(version) = &report.server_version {
        println!("服务端版本: {}", version.yellow());
    }
    println!(
        "开始时间: {}",
        report
            .start_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    println!("执行时间: {} ms", report.duration.as_millis().to_string().yellow());
    println!("  总数: {}", report.total.to_string().bright_blue());
    println!("  通过: {}", report.passed_count.to_string().green());
    println!("  失败: {}", report.failed_count.to_string().red());
    println!("  跳过: {}", report.skipped_count.to_string().yellow());
    println!("{}", "=".repeat(60));

    let status = if report.failed_count == 0 {
        format!("{} 套件执行成功", "✓".green().bold())
    } else {
        format!("{} 套件执行失败", "✗".red().bold())
    };
    println!("{}", status);
}
