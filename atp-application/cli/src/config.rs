//! CLI 配置管理
//!
//! **数据存储方式**: TOML 文件 (~/.config/atp/config.toml)
//!
//! 环境变量 `ATP_APPLIANCE_URL`、`ATP_APPLIANCE_USER`、`ATP_APPLIANCE_PASSWORD`
//! 覆盖所选管理平台配置中的对应字段。

use anyhow::{Context, Result};
use atp_restapi::RestConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_URL: &str = "ATP_APPLIANCE_URL";
pub const ENV_USER: &str = "ATP_APPLIANCE_USER";
pub const ENV_PASSWORD: &str = "ATP_APPLIANCE_PASSWORD";

/// CLI 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// 管理平台列表
    #[serde(default)]
    pub appliances: HashMap<String, ApplianceProfile>,

    /// 默认管理平台
    pub default_appliance: Option<String>,

    /// 套件目录
    pub suite_dir: Option<String>,

    /// 配置版本
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

/// 管理平台连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceProfile {
    /// 基础 URL，如 `https://10.0.0.5`
    pub base_url: String,

    /// 用户名
    #[serde(default)]
    pub username: Option<String>,

    /// 密码
    #[serde(default)]
    pub password: Option<String>,

    /// 是否校验证书
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// 连接超时 (秒)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 请求超时 (秒)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl ApplianceProfile {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: None,
            password: None,
            verify_ssl: true,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            verify_ssl: self.verify_ssl,
            ..RestConfig::default()
        }
    }

    /// 应用环境变量覆盖
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.base_url = url;
        }
        if let Some(user) = lookup(ENV_USER) {
            self.username = Some(user);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            appliances: HashMap::new(),
            default_appliance: None,
            suite_dir: Some("./suites".to_string()),
            version: default_version(),
        }
    }
}

impl CliConfig {
    /// 获取配置文件路径
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(".config").join("atp").join("config.toml"))
    }

    /// 加载配置
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        fs::write(path, content).with_context(|| format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }

    /// 添加管理平台
    pub fn add_appliance(&mut self, name: &str, profile: ApplianceProfile) -> Result<()> {
        if self.appliances.contains_key(name) {
            anyhow::bail!("管理平台 {} 已存在", name);
        }

        self.appliances.insert(name.to_string(), profile);

        // 第一个管理平台设为默认
        if self.default_appliance.is_none() {
            self.default_appliance = Some(name.to_string());
        }

        Ok(())
    }

    /// 移除管理平台
    pub fn remove_appliance(&mut self, name: &str) -> Result<()> {
        if self.appliances.remove(name).is_none() {
            anyhow::bail!("管理平台 {} 不存在", name);
        }

        if self.default_appliance.as_deref() == Some(name) {
            self.default_appliance = None;
        }

        Ok(())
    }

    pub fn get_appliance(&self, name: &str) -> Result<&ApplianceProfile> {
        self.appliances
            .get(name)
            .with_context(|| format!("管理平台 {} 不存在", name))
    }

    /// 按名称排序列出
    pub fn list_appliances(&self) -> Vec<(&str, &ApplianceProfile)> {
        let mut list: Vec<_> = self
            .appliances
            .iter()
            .map(|(name, profile)| (name.as_str(), profile))
            .collect();
        list.sort_by_key(|(name, _)| *name);
        list
    }

    pub fn set_default_appliance(&mut self, name: &str) -> Result<()> {
        if !self.appliances.contains_key(name) {
            anyhow::bail!("管理平台 {} 不存在", name);
        }

        self.default_appliance = Some(name.to_string());
        Ok(())
    }

    /// 选出要连接的管理平台并应用环境变量覆盖
    ///
    /// 未指定名称时使用默认管理平台；没有任何配置时只要设置了
    /// `ATP_APPLIANCE_URL` 也可以连接。
    pub fn resolve<F>(&self, name: Option<&str>, lookup: F) -> Result<ApplianceProfile>
    where
        F: Fn(&str) -> Option<String>,
    {
        let selected = name.or(self.default_appliance.as_deref());
        let mut profile = match selected {
            Some(name) => self.get_appliance(name)?.clone(),
            None => {
                let url = lookup(ENV_URL).with_context(|| {
                    format!("未配置管理平台，请使用 `atp appliance add` 或设置 {}", ENV_URL)
                })?;
                ApplianceProfile::new(&url)
            }
        };
        profile.apply_overrides(lookup);
        Ok(profile)
    }

    /// 获取套件目录
    pub fn get_suite_dir(&self) -> PathBuf {
        let dir = self.suite_dir.as_deref().unwrap_or("./suites");
        PathBuf::from(shellexpand::tilde(dir).as_ref())
    }
}
