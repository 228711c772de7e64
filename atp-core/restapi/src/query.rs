//! 查询参数构造
//!
//! 将属性投影、排序、过滤、分页、`expand`/`hide`、`collection_class`
//! 等结构化参数统一转换为查询参数对，调用方无需手工拼接 URL。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RestError, Result};

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = RestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(RestError::ParseError(format!("未知排序方向: {}", other))),
        }
    }
}

/// 过滤运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "=")]
    Eq,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Lt => "<",
            FilterOp::Gt => ">",
            FilterOp::Eq => "=",
        }
    }
}

/// 过滤表达式 `<field><operator><value>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    /// 日期时间过滤，值格式为 `YYYY-MM-DDTHH:MM:SSZ`
    pub fn datetime(field: impl Into<String>, op: FilterOp, at: &DateTime<Utc>) -> Self {
        Self::new(field, op, at.format("%Y-%m-%dT%H:%M:%SZ").to_string())
    }

    /// 日期过滤，值格式为 `YYYY-MM-DD`
    pub fn date(field: impl Into<String>, op: FilterOp, day: NaiveDate) -> Self {
        Self::new(field, op, day.format("%Y-%m-%d").to_string())
    }

    /// 由 JSON 值构造相等过滤
    ///
    /// 字符串原样使用，`null` 写作 `nil`，其余取 JSON 文本。
    pub fn from_value(field: impl Into<String>, value: &Value) -> Self {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => "nil".to_string(),
            other => other.to_string(),
        };
        Self::eq(field, text)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.op.as_str(), self.value)
    }
}

impl FromStr for Filter {
    type Err = RestError;

    /// 解析 `name=foo`、`created_on>2018-01-01` 形式的表达式
    fn from_str(s: &str) -> Result<Self> {
        let pos = s
            .find(|c| matches!(c, '<' | '>' | '='))
            .ok_or_else(|| RestError::ParseError(format!("过滤表达式缺少运算符: {}", s)))?;
        let (field, rest) = s.split_at(pos);
        if field.is_empty() {
            return Err(RestError::ParseError(format!("过滤表达式缺少字段: {}", s)));
        }
        let op = match &rest[..1] {
            "<" => FilterOp::Lt,
            ">" => FilterOp::Gt,
            _ => FilterOp::Eq,
        };
        Ok(Filter::new(field, op, &rest[1..]))
    }
}

/// 集合查询参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// 属性投影
    #[serde(default)]
    pub attributes: Vec<String>,

    /// 排序字段
    #[serde(default)]
    pub sort_by: Vec<String>,

    /// 排序方向
    #[serde(default)]
    pub sort_order: Option<SortOrder>,

    /// 过滤条件 (多个条件同时生效)
    #[serde(default)]
    pub filters: Vec<Filter>,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default)]
    pub offset: Option<u64>,

    /// 内联展开，如 `resources`
    #[serde(default)]
    pub expand: Vec<String>,

    /// 隐藏，如 `resources`
    #[serde(default)]
    pub hide: Vec<String>,

    /// 多态类型收窄
    #[serde(default)]
    pub collection_class: Option<String>,

    /// 集合特有的其他参数
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// 展开资源的查询，集合加载时使用
    pub fn expanded() -> Self {
        Self::new().expand("resources")
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by.push(field.into());
        self.sort_order = Some(order);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(self, limit: u64, offset: u64) -> Self {
        self.limit(limit).offset(offset)
    }

    pub fn expand(mut self, what: impl Into<String>) -> Self {
        self.expand.push(what.into());
        self
    }

    pub fn hide(mut self, what: impl Into<String>) -> Self {
        self.hide.push(what.into());
        self
    }

    pub fn collection_class(mut self, class: impl Into<String>) -> Self {
        self.collection_class = Some(class.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// 本地校验
    ///
    /// `limit=0` 是无效请求，直接报请求错误而不是返回空页。
    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(RestError::BadRequest {
                klass: "InvalidQuery".to_string(),
                message: "limit 必须大于 0".to_string(),
            });
        }
        if self.sort_order.is_some() && self.sort_by.is_empty() {
            return Err(RestError::BadRequest {
                klass: "InvalidQuery".to_string(),
                message: "sort_order 需要同时指定 sort_by".to_string(),
            });
        }
        Ok(())
    }

    /// 转换为查询参数对
    ///
    /// 多值参数用逗号连接，每个过滤条件单独一个 `filter[]`。
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if !self.expand.is_empty() {
            pairs.push(("expand".to_string(), self.expand.join(",")));
        }
        if !self.hide.is_empty() {
            pairs.push(("hide".to_string(), self.hide.join(",")));
        }
        if !self.attributes.is_empty() {
            pairs.push(("attributes".to_string(), self.attributes.join(",")));
        }
        if !self.sort_by.is_empty() {
            pairs.push(("sort_by".to_string(), self.sort_by.join(",")));
        }
        if let Some(order) = self.sort_order {
            pairs.push(("sort_order".to_string(), order.as_str().to_string()));
        }
        for filter in &self.filters {
            pairs.push(("filter[]".to_string(), filter.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(class) = &self.collection_class {
            pairs.push(("collection_class".to_string(), class.clone()));
        }
        pairs.extend(self.extra.iter().cloned());

        pairs
    }

    /// URL 编码后的查询字符串 (不含 `?`)
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_pairs())
            .finish()
    }
}
