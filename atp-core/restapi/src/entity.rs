//! 资源实体
//!
//! 实体是单条后端记录的本地缓存，属性以开放的键值映射保存。
//! 只有 [`Entity::reload`] 和服务端往返的操作 (如 [`Entity::edit`]) 会修改本地数据。

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::action::{self, ActionDescriptor, HttpMethod};
use crate::catalog;
use crate::client::RestClient;
use crate::error::{RestError, Result};

/// 资源属性映射
pub type Attributes = Map<String, Value>;

/// 常用属性键
pub const WELL_KNOWN_KEYS: &[&str] = &["id", "href", "guid", "href_slug"];

/// 资源实体
pub struct Entity<'a> {
    client: &'a RestClient,
    collection: String,
    collection_href: String,
    data: Attributes,
    actions: Vec<ActionDescriptor>,
}

impl fmt::Debug for Entity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("collection", &self.collection)
            .field("data", &self.data)
            .field("actions", &self.actions)
            .finish()
    }
}

impl<'a> Entity<'a> {
    pub(crate) fn new(
        client: &'a RestClient,
        collection: &str,
        collection_href: &str,
        mut data: Attributes,
    ) -> Self {
        let actions = take_actions(&mut data);
        Self {
            client,
            collection: collection.to_string(),
            collection_href: collection_href.trim_end_matches('/').to_string(),
            data,
            actions,
        }
    }

    /// 资源 ID，数字 ID 转换为字符串
    pub fn id(&self) -> Option<String> {
        match self.data.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 资源地址；响应中没有 `href` 时按 `<collection_href>/<id>` 构造
    pub fn href(&self) -> Option<String> {
        self.get_str("href")
            .map(str::to_string)
            .or_else(|| self.id().map(|id| format!("{}/{}", self.collection_href, id)))
    }

    pub fn guid(&self) -> Option<&str> {
        self.get_str("guid")
    }

    pub fn href_slug(&self) -> Option<&str> {
        self.get_str("href_slug")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn data(&self) -> &Attributes {
        &self.data
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn collection_href(&self) -> &str {
        &self.collection_href
    }

    /// 资源级操作声明
    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    /// 最小引用，优先 `href`，其次 `id`
    pub fn ref_repr(&self) -> Attributes {
        let mut map = Map::new();
        if let Some(href) = self.get_str("href") {
            map.insert("href".to_string(), Value::String(href.to_string()));
        } else if let Some(id) = self.data.get("id") {
            map.insert("id".to_string(), id.clone());
        }
        map
    }

    fn require_href(&self) -> Result<String> {
        self.href()
            .ok_or_else(|| RestError::ParseError(format!("{} 资源缺少 id/href", self.collection)))
    }

    fn replace(&mut self, mut data: Attributes) {
        let actions = take_actions(&mut data);
        if !actions.is_empty() {
            self.actions = actions;
        }
        self.data = data;
    }

    /// 从服务端重新获取完整记录，整体替换本地数据
    pub async fn reload(&mut self) -> Result<()> {
        let href = self.require_href()?;
        debug!("重新加载资源: {}", href);
        match self.client.get(&href).await? {
            Value::Object(map) => {
                self.replace(map);
                Ok(())
            }
            other => Err(RestError::ParseError(format!(
                "资源响应不是对象: {}",
                other
            ))),
        }
    }

    /// 资源在服务端是否存在
    ///
    /// 每次调用都发起新的请求，不读取本地状态。
    pub async fn exists(&self) -> Result<bool> {
        let href = self.require_href()?;
        let query = [("attributes".to_string(), "id".to_string())];
        match self.client.get_with(&href, &query).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 编辑资源
    ///
    /// 只提交变更字段，成功后以服务端响应更新本地数据。
    pub async fn edit(&mut self, fields: Attributes) -> Result<()> {
        let href = self.require_href()?;
        info!("编辑资源 {}: {:?}", href, fields.keys().collect::<Vec<_>>());
        let response = action::dispatch_single(self.client, &href, "edit", Some(fields)).await?;
        match response {
            Some(Value::Object(map)) => {
                check_status(&map, "edit", &href)?;
                self.replace(map);
                Ok(())
            }
            _ => Err(RestError::ParseError(format!("edit {} 没有返回资源", href))),
        }
    }

    /// 删除资源
    ///
    /// `Post` 以操作负载提交，`Delete` 使用 HTTP DELETE。实体带有操作声明时，
    /// 所选方法必须在声明中。
    pub async fn delete(&self, method: HttpMethod) -> Result<()> {
        let href = self.require_href()?;
        if !self.actions.is_empty()
            && !self
                .actions
                .iter()
                .any(|a| a.name == "delete" && a.http_method() == method)
        {
            return Err(RestError::Unsupported(format!(
                "{} 没有声明 {} 方式的 delete 操作",
                href, method
            )));
        }

        info!("删除资源 ({}): {}", method, href);
        match method {
            HttpMethod::Post => {
                let response =
                    action::dispatch_single(self.client, &href, "delete", None).await?;
                if let Some(Value::Object(map)) = response {
                    check_status(&map, "delete", &href)?;
                }
                Ok(())
            }
            HttpMethod::Delete => {
                self.client.delete(&href).await?;
                Ok(())
            }
            other => Err(RestError::Unsupported(format!("不支持以 {} 删除资源", other))),
        }
    }

    /// 执行自定义资源操作，如 `mark_as_seen`
    pub async fn run_action(&self, name: &str, fields: Option<Attributes>) -> Result<Option<Value>> {
        let href = self.require_href()?;
        let response = action::dispatch_single(self.client, &href, name, fields).await?;
        if let Some(Value::Object(map)) = &response {
            check_status(map, name, &href)?;
        }
        Ok(response)
    }

    /// 逐个探测集合声明的属性
    ///
    /// 对 `OPTIONS` 返回的属性、虚拟属性和关系逐个请求 `<href>?attributes=<name>`，
    /// 对子集合请求 `<href>/<subcollection>`，返回所有失败项。
    pub async fn probe_attributes(&self) -> Result<AttributeProbe> {
        let href = self.require_href()?;
        let options = self.client.options(&self.collection_href).await?;
        let mut probe = AttributeProbe::default();

        let attributes = options
            .attributes
            .iter()
            .map(|a| (a.as_str(), ProbeKind::Attribute))
            .chain(
                options
                    .virtual_attributes
                    .iter()
                    .map(|a| (a.as_str(), ProbeKind::VirtualAttribute)),
            )
            .chain(
                options
                    .relationships
                    .iter()
                    .map(|a| (a.as_str(), ProbeKind::Relationship)),
            );

        for (name, kind) in attributes {
            let query = [("attributes".to_string(), name.to_string())];
            match self.client.get_with(&href, &query).await {
                Ok(Value::Object(map)) => {
                    if kind == ProbeKind::Attribute && !map.contains_key(name) {
                        probe.missing.push(name.to_string());
                    }
                }
                Ok(_) => probe.missing.push(name.to_string()),
                Err(e) => {
                    warn!("属性 {} 请求失败: {}", name, e);
                    probe.failed.push(ProbeFailure::new(name, kind, &e));
                }
            }
        }

        for sub in &options.subcollections {
            if catalog::shape_of(sub) == catalog::CollectionShape::RequiresParameters {
                continue;
            }
            let sub_href = format!("{}/{}", href, sub);
            if let Err(e) = self.client.get(&sub_href).await {
                warn!("子集合 {} 请求失败: {}", sub, e);
                probe
                    .failed
                    .push(ProbeFailure::new(sub, ProbeKind::Subcollection, &e));
            }
        }

        Ok(probe)
    }
}

/// 属性探测类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Attribute,
    VirtualAttribute,
    Relationship,
    Subcollection,
}

/// 单个属性的探测失败
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub name: String,
    pub kind: ProbeKind,
    pub status: Option<u16>,
    pub error: String,
}

impl ProbeFailure {
    fn new(name: &str, kind: ProbeKind, error: &RestError) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: error.status(),
            error: error.to_string(),
        }
    }
}

/// 属性探测结果
#[derive(Debug, Clone, Default)]
pub struct AttributeProbe {
    pub failed: Vec<ProbeFailure>,
    /// 请求成功但响应中没有该属性
    pub missing: Vec<String>,
}

impl AttributeProbe {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn take_actions(data: &mut Attributes) -> Vec<ActionDescriptor> {
    data.remove("actions")
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// 单资源操作响应可能是状态对象 `{"success": false, "message": ...}`
fn check_status(map: &Attributes, action: &str, href: &str) -> Result<()> {
    if map.get("success").and_then(Value::as_bool) == Some(false) {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(RestError::ActionFailed(format!(
            "{} {}: {}",
            action, href, message
        )));
    }
    Ok(())
}
