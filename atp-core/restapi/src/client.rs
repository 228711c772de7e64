//! REST API 客户端核心实现

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::capability::Capabilities;
use crate::collection::Collection;
use crate::error::{RestError, Result};
use crate::models::{EntryPoint, Identity, OptionsInfo, ProductInfo, ServerInfo};

/// REST 客户端配置
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// 连接超时（秒）
    pub connect_timeout: u64,

    /// 请求超时（秒）
    pub request_timeout: u64,

    /// 是否验证 SSL 证书
    pub verify_ssl: bool,

    /// API 根路径
    pub api_path: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 10,
            request_timeout: 30,
            verify_ssl: true,
            api_path: "/api".to_string(),
        }
    }
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// REST API 客户端
///
/// 一个客户端对应一个入口 (`/api` 或 `/api/<version>`)。入口文档通过
/// [`RestClient::load`] 加载一次，集合地址和能力集都从中得到。
pub struct RestClient {
    /// 服务器基础 URL
    base_url: String,

    /// 入口地址
    entry_point: String,

    /// HTTP 客户端
    http_client: Client,

    /// 用户名/密码 (无令牌时使用基本认证)
    credentials: Option<Credentials>,

    /// 认证令牌，版本化客户端之间共享
    auth_token: Arc<RwLock<Option<String>>>,

    /// 入口文档
    entry: Option<EntryPoint>,

    /// 已协商的能力集
    capabilities: Option<Capabilities>,

    /// 配置
    config: RestConfig,
}

impl RestClient {
    /// 创建新的客户端
    pub fn new(base_url: &str, config: RestConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| RestError::HttpError(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RestError::ConfigError(format!(
                "基础 URL 必须以 http:// 或 https:// 开头: {}",
                base_url
            )));
        }
        let entry_point = format!("{}{}", base_url, normalize_path(&config.api_path));

        Ok(Self {
            base_url,
            entry_point,
            http_client,
            credentials: None,
            auth_token: Arc::new(RwLock::new(None)),
            entry: None,
            capabilities: None,
            config,
        })
    }

    /// 设置用户名和密码
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// 创建客户端、登录并加载入口文档
    pub async fn connect(
        base_url: &str,
        config: RestConfig,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let mut client = Self::new(base_url, config)?.with_credentials(username, password);
        client.login().await?;
        client.load().await?;
        Ok(client)
    }

    /// 认证登录
    ///
    /// 以基本认证请求 `GET <api>/auth`，之后的请求携带 `X-Auth-Token`。
    pub async fn login(&self) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| RestError::AuthError("未设置用户名和密码".to_string()))?;
        info!("REST 客户端登录: {}", credentials.username);

        let auth_url = format!(
            "{}{}/auth",
            self.base_url,
            normalize_path(&self.config.api_path)
        );
        let response = self
            .http_client
            .get(&auth_url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| RestError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("登录失败: {} - {}", status, text);
            return Err(RestError::AuthError(format!("登录失败 [{}]: {}", status, text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RestError::ParseError(e.to_string()))?;
        let token = body["auth_token"]
            .as_str()
            .ok_or_else(|| RestError::AuthError("未获取到 auth_token".to_string()))?
            .to_string();

        *self.auth_token.write().await = Some(token);
        info!("REST 客户端登录成功");
        Ok(())
    }

    /// 注销登出
    pub async fn logout(&self) -> Result<()> {
        info!("REST 客户端登出");
        *self.auth_token.write().await = None;
        Ok(())
    }

    /// 加载入口文档并协商能力集
    pub async fn load(&mut self) -> Result<()> {
        info!("加载入口文档: {}", self.entry_point);
        let doc = self.get(&self.entry_point).await?;
        let entry: EntryPoint =
            serde_json::from_value(doc).map_err(|e| RestError::ParseError(e.to_string()))?;

        self.capabilities = match entry.server_info.as_ref().map(|s| s.version.as_str()) {
            Some(version) if !version.is_empty() => Some(Capabilities::negotiate(version)?),
            _ => {
                warn!("入口文档没有 server_info.version，无法协商能力集");
                None
            }
        };
        info!("入口文档包含 {} 个集合", entry.collections.len());
        self.entry = Some(entry);
        Ok(())
    }

    /// 绑定到指定 API 版本的客户端 (`/api/<version>`)
    pub async fn versioned(&self, version: &str) -> Result<RestClient> {
        let href = self
            .entry()?
            .version_entry(version)
            .map(|v| v.href.clone())
            .ok_or_else(|| RestError::Unsupported(format!("API 版本 {} 不存在", version)))?;

        info!("切换到 API 版本 {}: {}", version, href);
        let mut client = RestClient {
            base_url: self.base_url.clone(),
            entry_point: href.trim_end_matches('/').to_string(),
            http_client: self.http_client.clone(),
            credentials: self.credentials.clone(),
            auth_token: Arc::clone(&self.auth_token),
            entry: None,
            capabilities: None,
            config: self.config.clone(),
        };
        client.load().await?;
        Ok(client)
    }

    /// 获取集合
    pub fn collection(&self, name: &str) -> Result<Collection<'_>> {
        let entry = self
            .entry()?
            .collection(name)
            .ok_or_else(|| RestError::Unsupported(format!("集合 {} 不存在", name)))?;
        Ok(Collection::new(self, &entry.name, &entry.href))
    }

    /// 入口文档中的集合名称
    pub fn collection_names(&self) -> Vec<&str> {
        self.entry
            .as_ref()
            .map(|e| e.collections.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn entry(&self) -> Result<&EntryPoint> {
        self.entry
            .as_ref()
            .ok_or_else(|| RestError::ConfigError("入口文档未加载，请先调用 load()".to_string()))
    }

    pub fn capabilities(&self) -> Result<&Capabilities> {
        self.capabilities
            .as_ref()
            .ok_or_else(|| RestError::ConfigError("能力集未协商".to_string()))
    }

    pub fn server_info(&self) -> Result<&ServerInfo> {
        self.entry()?
            .server_info
            .as_ref()
            .ok_or_else(|| RestError::ParseError("入口文档缺少 server_info".to_string()))
    }

    pub fn product_info(&self) -> Result<&ProductInfo> {
        self.entry()?
            .product_info
            .as_ref()
            .ok_or_else(|| RestError::ParseError("入口文档缺少 product_info".to_string()))
    }

    pub fn identity(&self) -> Result<&Identity> {
        self.entry()?
            .identity
            .as_ref()
            .ok_or_else(|| RestError::ParseError("入口文档缺少 identity".to_string()))
    }

    pub fn settings(&self) -> Result<&Value> {
        self.entry()?
            .settings
            .as_ref()
            .ok_or_else(|| RestError::ParseError("入口文档缺少 settings".to_string()))
    }

    /// 入口地址
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// 基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ============================================
    // 原始请求
    // ============================================

    /// `GET <href>`
    pub async fn get(&self, href: &str) -> Result<Value> {
        self.get_with(href, &[]).await
    }

    /// 带查询参数的 `GET <href>`
    pub async fn get_with(&self, href: &str, query: &[(String, String)]) -> Result<Value> {
        Ok(self
            .request(Method::GET, href, query, None)
            .await?
            .unwrap_or(Value::Null))
    }

    /// `POST <href>`
    pub async fn post(&self, href: &str, body: &Value) -> Result<Value> {
        Ok(self
            .request(Method::POST, href, &[], Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    /// `DELETE <href>`，成功时通常没有响应体
    pub async fn delete(&self, href: &str) -> Result<Option<Value>> {
        self.request(Method::DELETE, href, &[], None).await
    }

    /// `OPTIONS <href>`
    pub async fn options(&self, href: &str) -> Result<OptionsInfo> {
        let body = self
            .request(Method::OPTIONS, href, &[], None)
            .await?
            .unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| RestError::ParseError(e.to_string()))
    }

    /// `GET <entry_point>/ping`，返回响应文本 (期望为 `pong`)
    pub async fn ping(&self) -> Result<String> {
        let url = format!("{}/ping", self.entry_point);
        debug!("REST API 请求: GET {}", url);
        let response = self
            .authorize(self.http_client.get(&url))
            .await?
            .send()
            .await
            .map_err(|e| RestError::HttpError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RestError::HttpError(e.to_string()))?;
        if !status.is_success() {
            return Err(RestError::from_response(status.as_u16(), &text));
        }
        Ok(text)
    }

    /// 发送 HTTP 请求
    ///
    /// 非 2xx 响应按状态码转换为错误；空响应体返回 `None`。
    pub(crate) async fn request(
        &self,
        method: Method,
        href: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.resolve(href);
        debug!("REST API 请求: {} {} {:?}", method, url, query);

        let mut request = self.http_client.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| RestError::HttpError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RestError::HttpError(e.to_string()))?;

        if !status.is_success() {
            warn!("API 请求失败: {} {} - {} {}", method, url, status, text);
            return Err(RestError::from_response(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RestError::ParseError(format!("{} {}: {}", method, url, e)))
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.auth_token.read().await.clone();
        match (token, &self.credentials) {
            (Some(token), _) => Ok(request.header("X-Auth-Token", token)),
            (None, Some(c)) => Ok(request.basic_auth(&c.username, Some(&c.password))),
            (None, None) => Err(RestError::AuthError("未认证，请先设置凭据或登录".to_string())),
        }
    }

    /// 绝对地址原样返回，路径拼接到基础 URL
    pub(crate) fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url, normalize_path(href))
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') || trimmed.is_empty() {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = RestClient::new("https://10.0.0.5/", RestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://10.0.0.5");
        assert_eq!(client.entry_point(), "https://10.0.0.5/api");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(RestClient::new("10.0.0.5", RestConfig::default()).is_err());
    }

    #[test]
    fn test_resolve_href() {
        let client = RestClient::new("https://a", RestConfig::default()).unwrap();
        assert_eq!(client.resolve("https://a/api/vms/1"), "https://a/api/vms/1");
        assert_eq!(client.resolve("/api/vms"), "https://a/api/vms");
        assert_eq!(client.resolve("api/vms"), "https://a/api/vms");
    }

    #[test]
    fn test_entry_not_loaded() {
        let client = RestClient::new("https://a", RestConfig::default()).unwrap();
        assert!(client.collection("vms").is_err());
        assert!(client.capabilities().is_err());
        assert!(client.collection_names().is_empty());
    }
}
