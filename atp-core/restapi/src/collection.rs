//! 资源集合
//!
//! 集合句柄由名称和基础地址标识，[`Collection::reload`] 整体替换本地缓存，
//! 缓存顺序与服务端响应顺序一致。[`Collection::query`] 只返回一页结果，不修改缓存。

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::action::{self, ActionDescriptor, ActionResult, ResourceRef};
use crate::client::RestClient;
use crate::entity::{Attributes, Entity};
use crate::envelope::{self, Body, Envelope};
use crate::error::{RestError, Result};
use crate::models::OptionsInfo;
use crate::query::{Filter, Query};

/// 集合句柄
pub struct Collection<'a> {
    client: &'a RestClient,
    name: String,
    href: String,
    resources: Vec<Attributes>,
    count: Option<u64>,
    subcount: Option<u64>,
    actions: Vec<ActionDescriptor>,
    loaded: bool,
}

impl fmt::Debug for Collection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("href", &self.href)
            .field("count", &self.count)
            .field("subcount", &self.subcount)
            .field("cached", &self.resources.len())
            .finish()
    }
}

/// 一页查询结果
#[derive(Debug)]
pub struct Page<'a> {
    pub envelope: Envelope,
    pub entities: Vec<Entity<'a>>,
}

impl Page<'_> {
    pub fn ids(&self) -> Vec<String> {
        self.entities.iter().filter_map(Entity::id).collect()
    }
}

impl<'a> Collection<'a> {
    pub(crate) fn new(client: &'a RestClient, name: &str, href: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            href: href.trim_end_matches('/').to_string(),
            resources: Vec::new(),
            count: None,
            subcount: None,
            actions: Vec::new(),
            loaded: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// 服务端上报的总数 (最近一次 reload)
    pub fn count(&self) -> u64 {
        self.count.unwrap_or(0)
    }

    /// 最近一次 reload 返回的数量
    pub fn subcount(&self) -> u64 {
        self.subcount.unwrap_or(self.resources.len() as u64)
    }

    /// 集合级操作声明 (最近一次 reload)
    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// 缓存中的实体
    pub fn entities(&self) -> Vec<Entity<'a>> {
        self.resources
            .iter()
            .map(|data| self.entity(data.clone()))
            .collect()
    }

    pub fn entity_at(&self, index: usize) -> Option<Entity<'a>> {
        self.resources.get(index).map(|data| self.entity(data.clone()))
    }

    pub fn last(&self) -> Option<Entity<'a>> {
        self.resources.last().map(|data| self.entity(data.clone()))
    }

    /// 用属性构造属于本集合的实体 (如批量操作返回的资源)
    pub fn entity(&self, data: Attributes) -> Entity<'a> {
        Entity::new(self.client, &self.name, &self.href, data)
    }

    /// 批量操作结果中成功返回的资源
    pub fn entities_from(&self, results: &[ActionResult]) -> Vec<Entity<'a>> {
        results
            .iter()
            .filter(|r| r.is_resource())
            .map(|r| self.entity(r.data.clone()))
            .collect()
    }

    /// 重新加载集合，整体替换本地缓存
    pub async fn reload(&mut self) -> Result<()> {
        debug!("重新加载集合: {}", self.name);
        let envelope = self.fetch(&Query::expanded()).await?.into_envelope()?;

        self.count = envelope.count;
        self.subcount = envelope.subcount;
        self.actions = envelope.actions;
        self.resources = envelope.resources.unwrap_or_default();
        self.loaded = true;
        Ok(())
    }

    /// 请求并解析一次响应，保留扁平结构
    pub async fn fetch(&self, query: &Query) -> Result<Body> {
        query.validate()?;
        let value = self.client.get_with(&self.href, &query.to_pairs()).await?;
        envelope::read(value)
    }

    /// 执行一次查询，返回一页结果
    pub async fn query(&self, query: &Query) -> Result<Page<'a>> {
        let envelope = self.fetch(query).await?.into_envelope()?;
        let entities = envelope
            .resources()
            .iter()
            .map(|data| self.entity(data.clone()))
            .collect();
        Ok(Page { envelope, entities })
    }

    /// 按字段相等过滤
    pub async fn find_by(&self, criteria: &[(&str, Value)]) -> Result<Vec<Entity<'a>>> {
        let query = criteria
            .iter()
            .fold(Query::expanded(), |q, (field, value)| {
                q.filter(Filter::from_value(*field, value))
            });
        Ok(self.query(&query).await?.entities)
    }

    /// 按字段相等获取唯一资源
    pub async fn get(&self, criteria: &[(&str, Value)]) -> Result<Entity<'a>> {
        let mut found = self.find_by(criteria).await?;
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(RestError::NotFound {
                klass: String::new(),
                message: format!("{} 中没有匹配 {:?} 的资源", self.name, criteria),
            }),
            n => Err(RestError::ContractViolation(format!(
                "{} 中有 {} 个资源匹配 {:?}",
                self.name, n, criteria
            ))),
        }
    }

    /// 按 ID 获取资源
    pub async fn get_by_id(&self, id: &str) -> Result<Entity<'a>> {
        let href = format!("{}/{}", self.href, id);
        match self.client.get(&href).await? {
            Value::Object(map) => Ok(self.entity(map)),
            other => Err(RestError::ParseError(format!("资源响应不是对象: {}", other))),
        }
    }

    /// `OPTIONS <href>`
    pub async fn options(&self) -> Result<OptionsInfo> {
        self.client.options(&self.href).await
    }

    /// 检查集合级操作只声明了 POST
    pub fn verify_actions(&self) -> Result<()> {
        if !self.loaded {
            return Err(RestError::ConfigError(format!(
                "集合 {} 尚未加载",
                self.name
            )));
        }
        action::verify_collection_actions(&self.name, &self.actions)
    }

    // ============================================
    // 批量操作
    // ============================================

    /// 批量创建
    pub async fn create(&self, resources: Vec<Attributes>) -> Result<Vec<ActionResult>> {
        let resources = resources.into_iter().map(Value::Object).collect();
        self.bulk_action("create", resources).await
    }

    /// 批量编辑，每个目标合并引用和变更字段
    pub async fn edit(&self, targets: Vec<(ResourceRef, Attributes)>) -> Result<Vec<ActionResult>> {
        let resources = targets
            .into_iter()
            .map(|(target, fields)| {
                let mut map: Map<String, Value> = target.as_attributes().clone();
                map.extend(fields);
                Value::Object(map)
            })
            .collect();
        self.bulk_action("edit", resources).await
    }

    /// 批量删除，每个目标独立报告结果
    pub async fn delete(&self, targets: &[ResourceRef]) -> Result<Vec<ActionResult>> {
        self.action("delete", targets).await
    }

    /// 批量查询
    ///
    /// 每个条件解析为一个资源，结果与条件顺序一致；不匹配的条件只在对应项上失败。
    pub async fn query_by(&self, criteria: &[ResourceRef]) -> Result<Vec<ActionResult>> {
        self.action("query", criteria).await
    }

    /// 对一组引用执行集合级操作
    pub async fn action(&self, name: &str, targets: &[ResourceRef]) -> Result<Vec<ActionResult>> {
        let resources = targets.iter().cloned().map(ResourceRef::into_value).collect();
        self.bulk_action(name, resources).await
    }

    async fn bulk_action(&self, name: &str, resources: Vec<Value>) -> Result<Vec<ActionResult>> {
        if let Some(declared) = self.actions.iter().find(|a| a.name == name) {
            if !declared.is_post() {
                warn!("集合 {} 的操作 {} 声明为 {}", self.name, name, declared.method);
                return Err(RestError::ContractViolation(format!(
                    "集合 {} 的操作 {} 只允许 POST，声明为 {}",
                    self.name, name, declared.method
                )));
            }
        }
        info!("集合 {} 执行操作 {}", self.name, name);
        action::dispatch(self.client, &self.href, name, resources).await
    }
}
