//! 管理平台配置命令

use anyhow::Result;
use colored::Colorize;

use crate::config::{ApplianceProfile, CliConfig};
use crate::ApplianceAction;

pub async fn handle(action: ApplianceAction) -> Result<()> {
    match action {
        ApplianceAction::Add {
            name,
            url,
            username,
            password,
            insecure,
            connect_timeout,
            request_timeout,
        } => {
            let profile = ApplianceProfile {
                base_url: url,
                username,
                password,
                verify_ssl: !insecure,
                connect_timeout,
                request_timeout,
            };
            add_appliance(&name, profile)
        }
        ApplianceAction::List => list_appliances(),
        ApplianceAction::Remove { name } => remove_appliance(&name),
        ApplianceAction::Default { name } => set_default(&name),
    }
}

fn add_appliance(name: &str, profile: ApplianceProfile) -> Result<()> {
    let mut config = CliConfig::load()?;
    let url = profile.base_url.clone();
    config.add_appliance(name, profile)?;
    config.save()?;

    println!("{} 管理平台 {} 添加成功", "✓".green().bold(), name.cyan().bold());
    println!("  地址: {}", url.yellow());
    Ok(())
}

fn list_appliances() -> Result<()> {
    let config = CliConfig::load()?;
    let appliances = config.list_appliances();

    if appliances.is_empty() {
        println!("{}", "没有配置任何管理平台".yellow());
        println!("\n使用以下命令添加:");
        println!(
            "  {} atp appliance add <NAME> <URL> -u <USER> -p <PASSWORD>",
            "$".bright_black()
        );
        return Ok(());
    }

    println!("{}\n", "配置的管理平台:".bold());

    for (name, profile) in appliances {
        let marker = if config.default_appliance.as_deref() == Some(name) {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!("{} {}", marker, name.cyan().bold());
        println!("    地址: {}", profile.base_url);
        println!(
            "    用户: {}",
            profile.username.as_deref().unwrap_or("-").bright_black()
        );
        if !profile.verify_ssl {
            println!("    {}", "跳过证书校验".yellow());
        }
    }

    Ok(())
}

fn remove_appliance(name: &str) -> Result<()> {
    let mut config = CliConfig::load()?;
    config.remove_appliance(name)?;
    config.save()?;

    println!("{} 管理平台 {} 已移除", "✓".green().bold(), name.cyan());
    Ok(())
}

fn set_default(name: &str) -> Result<()> {
    let mut config = CliConfig::load()?;
    config.set_default_appliance(name)?;
    config.save()?;

    println!("{} 默认管理平台: {}", "✓".green().bold(), name.cyan().bold());
    Ok(())
}
