//! 批量操作分发
//!
//! 集合级操作 (`create`/`edit`/`delete`/`query`/自定义如 `mark_as_seen`)
//! 统一以 `POST <collection_href>` 提交：
//!
//! ```json
//! {"action": "delete", "resources": [{"href": "..."}, {"id": "7"}]}
//! ```
//!
//! 响应 `results[]` 与请求顺序一一对应，每个目标独立成功或失败。

use std::fmt;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::client::RestClient;
use crate::entity::{Attributes, Entity};
use crate::error::{RestError, Result};

/// 操作声明 (集合或资源响应中的 `actions[]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub href: Option<String>,
}

impl ActionDescriptor {
    pub fn http_method(&self) -> HttpMethod {
        HttpMethod::parse(&self.method)
    }

    pub fn is_post(&self) -> bool {
        self.http_method() == HttpMethod::Post
    }
}

/// 操作使用的 HTTP 方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Other(String),
}

impl HttpMethod {
    /// 不区分大小写解析
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "get" => HttpMethod::Get,
            "post" => HttpMethod::Post,
            "put" => HttpMethod::Put,
            "patch" => HttpMethod::Patch,
            "delete" => HttpMethod::Delete,
            _ => HttpMethod::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Delete => write!(f, "DELETE"),
            HttpMethod::Other(m) => write!(f, "{}", m.to_uppercase()),
        }
    }
}

/// 集合级操作只允许 POST，其他方法视为接口约定违规
pub fn verify_collection_actions(collection: &str, actions: &[ActionDescriptor]) -> Result<()> {
    let violations: Vec<String> = actions
        .iter()
        .filter(|a| !a.is_post())
        .map(|a| format!("{}({})", a.name, a.method))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        warn!("集合 {} 声明了非 POST 操作: {:?}", collection, violations);
        Err(RestError::ContractViolation(format!(
            "集合 {} 的操作只允许 POST: {}",
            collection,
            violations.join(", ")
        )))
    }
}

/// 批量操作目标引用
///
/// 可以是完整资源，也可以只带 `id`、`href` 或自然键 (如 `name`+`userid`)。
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRef(Attributes);

impl ResourceRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self::field("id", id.into())
    }

    pub fn href(href: impl Into<String>) -> Self {
        Self::field("href", href.into())
    }

    pub fn field(key: &str, value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert(key.to_string(), value.into());
        Self(map)
    }

    /// 追加一个标识字段
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn from_attributes(attributes: Attributes) -> Self {
        Self(attributes)
    }

    pub fn as_attributes(&self) -> &Attributes {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<&Entity<'_>> for ResourceRef {
    fn from(entity: &Entity<'_>) -> Self {
        ResourceRef(entity.ref_repr())
    }
}

/// 单个目标的操作结果
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub message: Option<String>,
    /// 结果原文；成功的 create/edit/query 为资源属性
    pub data: Attributes,
}

impl ActionResult {
    fn from_value(value: Value) -> Result<Self> {
        let Value::Object(data) = value else {
            return Err(RestError::ParseError("results 项不是对象".to_string()));
        };
        let success = data.get("success").and_then(Value::as_bool).unwrap_or(true);
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            success,
            message,
            data,
        })
    }

    /// 结果是否为资源本身 (而非状态对象)
    pub fn is_resource(&self) -> bool {
        self.success && !self.data.contains_key("success") && self.data.contains_key("id")
    }
}

/// 提交一次操作到指定 href
///
/// 请求体总是 `{"action": name, "resources": [...]}`，`resources` 为空时提交空数组；
/// 单资源形式由 [`dispatch_single`] 提交。
pub(crate) async fn dispatch(
    client: &RestClient,
    href: &str,
    action: &str,
    resources: Vec<Value>,
) -> Result<Vec<ActionResult>> {
    info!("批量操作 {}: {} 个目标 -> {}", action, resources.len(), href);
    let expected = resources.len();
    let body = json!({ "action": action, "resources": resources });

    let response = client
        .request(Method::POST, href, &[], Some(&body))
        .await?
        .unwrap_or(Value::Null);

    let results = match response {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(RestError::ParseError(format!(
                    "操作 {} 的响应缺少 results",
                    action
                )))
            }
        },
        other => {
            return Err(RestError::ParseError(format!(
                "操作 {} 的响应不是对象: {}",
                action, other
            )))
        }
    };

    if results.len() != expected {
        return Err(RestError::ContractViolation(format!(
            "操作 {} 提交 {} 个目标，返回 {} 个结果",
            action,
            expected,
            results.len()
        )));
    }

    let results = results
        .into_iter()
        .map(ActionResult::from_value)
        .collect::<Result<Vec<_>>>()?;

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        warn!("批量操作 {}: {} 个目标失败", action, failed);
    }
    Ok(results)
}

/// 提交单资源操作 `{"action": name, "resource": fields}`
pub(crate) async fn dispatch_single(
    client: &RestClient,
    href: &str,
    action: &str,
    resource: Option<Attributes>,
) -> Result<Option<Value>> {
    info!("资源操作 {} -> {}", action, href);
    let mut body = json!({ "action": action });
    if let Some(resource) = resource {
        body["resource"] = Value::Object(resource);
    }
    client.request(Method::POST, href, &[], Some(&body)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, method: &str) -> ActionDescriptor {
        ActionDescriptor {
            name: name.to_string(),
            method: method.to_string(),
            href: None,
        }
    }

    #[test]
    fn test_post_only_collection_actions() {
        let ok = vec![descriptor("create", "post"), descriptor("delete", "POST")];
        assert!(verify_collection_actions("services", &ok).is_ok());

        let bad = vec![descriptor("create", "post"), descriptor("delete", "delete")];
        let err = verify_collection_actions("services", &bad).unwrap_err();
        assert!(matches!(err, RestError::ContractViolation(_)));
        assert!(err.to_string().contains("delete(delete)"));
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!(HttpMethod::parse("Post"), HttpMethod::Post);
        assert_eq!(HttpMethod::parse("DELETE"), HttpMethod::Delete);
        assert_eq!(HttpMethod::parse("purge"), HttpMethod::Other("purge".into()));
        assert_eq!(HttpMethod::parse("purge").to_string(), "PURGE");
    }

    #[test]
    fn test_action_result_status_object() {
        let failed = ActionResult::from_value(serde_json::json!({
            "success": false,
            "message": "Couldn't find Service with 'id'=5"
        }))
        .unwrap();
        assert!(!failed.success);
        assert!(failed.message.unwrap().contains("Couldn't find"));

        let resource = ActionResult::from_value(serde_json::json!({"id": "5", "name": "svc"})).unwrap();
        assert!(resource.success);
        assert!(resource.is_resource());
    }

    #[test]
    fn test_resource_ref_natural_key() {
        let r = ResourceRef::field("name", "admin").with("userid", "admin");
        assert_eq!(r.as_attributes().len(), 2);
        assert_eq!(ResourceRef::id("3").into_value(), serde_json::json!({"id": "3"}));
    }
}
