//! 响应信封解析
//!
//! 集合响应分两种结构：
//! - 分页集合: `count`/`subcount`/`pages`/`links` + 可选的 `resources`
//! - 扁平对象: 如 `settings`，直接返回属性对象，没有 `resources`
//!
//! 调用方通过 [`Body`] 区分两种结构，不能假设 `resources` 一定存在
//! (`hide=resources` 时分页集合也没有 `resources`)。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::ActionDescriptor;
use crate::entity::Attributes;
use crate::error::{RestError, Result};

/// 分页链接
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingLinks {
    #[serde(rename = "self")]
    pub self_link: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl PagingLinks {
    /// 链接中的 `offset` 参数
    pub fn offset_of(link: &str) -> Option<u64> {
        Self::param_of(link, "offset")
    }

    /// 链接中的 `limit` 参数
    pub fn limit_of(link: &str) -> Option<u64> {
        Self::param_of(link, "limit")
    }

    fn param_of(link: &str, key: &str) -> Option<u64> {
        let query = link.split_once('?').map(|(_, q)| q)?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse().ok())
    }
}

/// 分页集合的信封
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub name: Option<String>,
    /// 符合条件的总数
    pub count: Option<u64>,
    /// 本页返回的数量
    pub subcount: Option<u64>,
    pub pages: Option<u64>,
    pub links: Option<PagingLinks>,
    /// 资源列表；`hide=resources` 或空集合时可能缺失
    pub resources: Option<Vec<Attributes>>,
    /// 集合级操作声明
    pub actions: Vec<ActionDescriptor>,
    /// 其余字段
    pub extra: Attributes,
}

impl Envelope {
    /// 资源列表，缺失时为空
    pub fn resources(&self) -> &[Attributes] {
        self.resources.as_deref().unwrap_or(&[])
    }

    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    pub fn count(&self) -> u64 {
        self.count.unwrap_or(0)
    }

    pub fn subcount(&self) -> u64 {
        self.subcount
            .unwrap_or_else(|| self.resources().len() as u64)
    }
}

/// 响应体结构
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Paged(Envelope),
    Flat(Attributes),
}

impl Body {
    pub fn is_paged(&self) -> bool {
        matches!(self, Body::Paged(_))
    }

    /// 取分页信封，扁平结构报错
    pub fn into_envelope(self) -> Result<Envelope> {
        match self {
            Body::Paged(envelope) => Ok(envelope),
            Body::Flat(_) => Err(RestError::Unsupported(
                "响应是扁平对象，没有分页信封".to_string(),
            )),
        }
    }
}

const ENVELOPE_KEYS: &[&str] = &["count", "subcount", "resources", "pages", "links"];

/// 解析响应体
pub fn read(value: Value) -> Result<Body> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(RestError::ParseError(format!(
                "响应不是 JSON 对象: {}",
                other
            )))
        }
    };

    if !ENVELOPE_KEYS.iter().any(|k| map.contains_key(*k)) {
        return Ok(Body::Flat(map));
    }

    let count = take_u64(&mut map, "count")?;
    let subcount = take_u64(&mut map, "subcount")?;
    let pages = take_u64(&mut map, "pages")?;
    let name = match map.remove("name") {
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    let links = map
        .remove("links")
        .map(serde_json::from_value::<PagingLinks>)
        .transpose()
        .map_err(|e| RestError::ParseError(format!("links: {}", e)))?;
    let resources = map.remove("resources").map(read_resources).transpose()?;
    let actions = map
        .remove("actions")
        .map(serde_json::from_value::<Vec<ActionDescriptor>>)
        .transpose()
        .map_err(|e| RestError::ParseError(format!("actions: {}", e)))?
        .unwrap_or_default();

    Ok(Body::Paged(Envelope {
        name,
        count,
        subcount,
        pages,
        links,
        resources,
        actions,
        extra: map,
    }))
}

fn take_u64(map: &mut Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| RestError::ParseError(format!("{} 不是非负整数: {}", key, n))),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| RestError::ParseError(format!("{} 不是整数: {}", key, s))),
        Some(other) => Err(RestError::ParseError(format!("{} 类型错误: {}", key, other))),
    }
}

fn read_resources(value: Value) -> Result<Vec<Attributes>> {
    let Value::Array(items) = value else {
        return Err(RestError::ParseError("resources 不是数组".to_string()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(RestError::ParseError(format!("资源不是对象: {}", other))),
        })
        .collect()
}

// ============================================
// 分页计算
// ============================================

/// 本页应返回的数量: `offset < count` 时为 `min(limit, count - offset)`，否则为 0
pub fn expected_subcount(count: u64, limit: u64, offset: u64) -> u64 {
    if offset >= count {
        0
    } else {
        limit.min(count - offset)
    }
}

/// 总页数 `ceil(count / limit)`，与 offset 无关
pub fn expected_pages(count: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    count.div_ceil(limit)
}

/// 期望的分页链接偏移量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedLinks {
    pub self_offset: u64,
    pub first_offset: u64,
    pub last_offset: u64,
    /// 仅在 `offset + limit < count` 时存在
    pub next_offset: Option<u64>,
    /// 仅在 `offset > 0` 时存在
    pub previous_offset: Option<u64>,
}

/// 根据总数、每页数量、偏移计算期望的链接偏移量
///
/// `last` 的偏移为 `floor(count / limit) * limit`。
pub fn expected_links(count: u64, limit: u64, offset: u64) -> ExpectedLinks {
    let limit = limit.max(1);
    ExpectedLinks {
        self_offset: offset,
        first_offset: 0,
        last_offset: (count / limit) * limit,
        next_offset: (offset + limit < count).then_some(offset + limit),
        previous_offset: (offset > 0).then_some(offset.saturating_sub(limit)),
    }
}
