//! ATP CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "atp")]
#[command(about = "ATP - 管理平台 REST API 测试工具", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 管理平台名称 (缺省使用默认管理平台)
    #[arg(short, long, global = true)]
    appliance: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 管理平台配置
    Appliance {
        #[command(subcommand)]
        action: ApplianceAction,
    },

    /// 集合浏览
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// 集合级操作
    Action {
        #[command(subcommand)]
        action: ActionAction,
    },

    /// 服务端信息
    Info {
        #[command(subcommand)]
        action: InfoAction,
    },

    /// 检查套件
    Check {
        #[command(subcommand)]
        action: CheckAction,
    },
}

#[derive(Subcommand)]
pub enum ApplianceAction {
    /// 添加管理平台
    Add {
        /// 名称
        name: String,
        /// 基础 URL
        url: String,
        /// 用户名
        #[arg(long, short = 'u')]
        username: Option<String>,
        /// 密码
        #[arg(long, short = 'p')]
        password: Option<String>,
        /// 跳过证书校验
        #[arg(long)]
        insecure: bool,
        /// 连接超时 (秒)
        #[arg(long, default_value = "10")]
        connect_timeout: u64,
        /// 请求超时 (秒)
        #[arg(long, default_value = "30")]
        request_timeout: u64,
    },
    /// 列出管理平台
    List,
    /// 移除管理平台
    Remove { name: String },
    /// 设置默认管理平台
    Default { name: String },
}

#[derive(Subcommand)]
pub enum CollectionAction {
    /// 列出入口文档中的集合
    List {
        /// 输出格式 (table/json/yaml)
        #[arg(short = 'f', long, default_value = "table")]
        format: String,
    },

    /// 显示集合的一页资源
    Show {
        /// 集合名称
        collection: String,
        /// 返回的属性，逗号分隔
        #[arg(long, value_delimiter = ',')]
        attributes: Vec<String>,
        /// 过滤条件，如 `name=foo`、`created_on>2018-01-01`，可重复
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// 排序字段
        #[arg(long)]
        sort_by: Option<String>,
        /// 排序方向 (asc/desc)
        #[arg(long, default_value = "asc")]
        sort_order: String,
        /// 每页数量
        #[arg(long)]
        limit: Option<u64>,
        /// 偏移
        #[arg(long)]
        offset: Option<u64>,
        /// 输出格式 (table/json/yaml)
        #[arg(short = 'f', long, default_value = "table")]
        format: String,
    },

    /// 集合的 OPTIONS 元数据
    Options {
        collection: String,
        /// 输出格式 (table/json/yaml)
        #[arg(short = 'f', long, default_value = "table")]
        format: String,
    },

    /// 按 id 获取资源
    #[command(alias = "query")]
    Get {
        collection: String,
        id: String,
        /// 输出格式 (json/yaml)
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ActionAction {
    /// 提交集合级操作
    Run {
        /// 集合名称
        collection: String,
        /// 操作名称
        action: String,
        /// 目标资源，JSON 对象或对象数组
        #[arg(long, short = 'd')]
        data: Option<String>,
        /// 从文件读取目标资源
        #[arg(long, conflicts_with = "data")]
        data_file: Option<String>,
        /// 输出格式 (table/json/yaml)
        #[arg(short = 'f', long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum InfoAction {
    /// 服务器信息
    Server,
    /// 产品信息
    Product,
    /// 当前用户身份
    Identity,
    /// GET /api/ping
    Ping,
    /// 协商出的能力集和未修复的已知缺陷
    Capabilities,
}

#[derive(Subcommand)]
pub enum CheckAction {
    /// 列出检查项
    List,

    /// 运行套件文件
    Run {
        /// 套件文件路径
        file: String,
        /// 报告输出路径
        #[arg(short, long)]
        output: Option<String>,
        /// 报告格式 (json/yaml)
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
        /// 第一个失败后停止
        #[arg(long)]
        fail_fast: bool,
    },

    /// 运行内置只读套件
    Builtin {
        /// 报告输出路径
        #[arg(short, long)]
        output: Option<String>,
        /// 报告格式 (json/yaml)
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("ATP CLI 启动");

    let appliance = cli.appliance.as_deref();
    match cli.command {
        Commands::Appliance { action } => commands::appliance::handle(action).await?,
        Commands::Collection { action } => commands::collection::handle(appliance, action).await?,
        Commands::Action { action } => commands::action::handle(appliance, action).await?,
        Commands::Info { action } => commands::info::handle(appliance, action).await?,
        Commands::Check { action } => commands::check::handle(appliance, action).await?,
    }

    Ok(())
}
