//! 服务端信息命令

use anyhow::Result;
use atp_restapi::{Feature, RestClient};
use colored::Colorize;

use super::common::connect;
use super::output::print_yaml;
use crate::InfoAction;

pub async fn handle(appliance: Option<&str>, action: InfoAction) -> Result<()> {
    let client = connect(appliance).await?;
    match action {
        InfoAction::Server => print_yaml(client.server_info()?),
        InfoAction::Product => print_yaml(client.product_info()?),
        InfoAction::Identity => print_yaml(client.identity()?),
        InfoAction::Ping => ping(&client).await,
        InfoAction::Capabilities => capabilities(&client),
    }
}

async fn ping(client: &RestClient) -> Result<()> {
    let started = std::time::Instant::now();
    let body = client.ping().await?;
    println!(
        "{} {} ({} ms)",
        "✓".green().bold(),
        body,
        started.elapsed().as_millis().to_string().bright_black()
    );
    Ok(())
}

fn capabilities(client: &RestClient) -> Result<()> {
    let caps = client.capabilities()?;
    println!("版本:   {}", caps.version().to_string().cyan().bold());
    println!("版本流: {}", caps.stream().to_string().cyan());
    println!();

    println!("{}", "功能:".bold());
    for feature in Feature::ALL {
        let mark = if caps.supports(*feature) {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {:?}", mark, feature);
    }
    println!();

    println!("{}", "未修复的已知缺陷:".bold());
    let mut any = false;
    for defect in caps.open_defects() {
        any = true;
        let scope = if defect.collections.is_empty() {
            "所有集合".to_string()
        } else {
            defect.collections.join(", ")
        };
        println!(
            "  {} {} [{}]",
            defect.id.to_string().yellow(),
            defect.summary,
            scope.bright_black()
        );
    }
    if !any {
        println!("  {}", "无".bright_black());
    }
    Ok(())
}
