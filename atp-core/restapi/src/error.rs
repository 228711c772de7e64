//! REST API 错误定义

use serde_json::Value;
use thiserror::Error;

/// REST API 错误类型
#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("认证错误: {0}")]
    AuthError(String),

    /// 400: 请求参数错误或服务端校验失败
    #[error("请求错误 [{klass}]: {message}")]
    BadRequest { klass: String, message: String },

    /// 404: 资源不存在(例如已被删除)
    #[error("资源不存在 [{klass}]: {message}")]
    NotFound { klass: String, message: String },

    #[error("API 错误 [{status}] {klass}: {message}")]
    ApiError {
        status: u16,
        klass: String,
        message: String,
    },

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 轮询超时，与服务端返回的错误严格区分
    #[error("等待超时: {0}")]
    Timeout(String),

    /// 服务端接受了请求，但报告操作失败 (`success: false`)
    #[error("操作失败: {0}")]
    ActionFailed(String),

    #[error("接口约定违规: {0}")]
    ContractViolation(String),

    #[error("不支持的操作: {0}")]
    Unsupported(String),
}

/// REST API 结果类型
pub type Result<T> = std::result::Result<T, RestError>;

impl RestError {
    /// 根据 HTTP 状态码和响应体构造错误
    ///
    /// 响应体形如 `{"error": {"kind": ..., "message": ..., "klass": ...}}`，
    /// 无法解析时整个响应文本作为 message。
    pub fn from_response(status: u16, body: &str) -> Self {
        let (klass, message) = parse_error_body(body);
        match status {
            400 => RestError::BadRequest { klass, message },
            404 => RestError::NotFound { klass, message },
            _ => RestError::ApiError {
                status,
                klass,
                message,
            },
        }
    }

    /// HTTP 状态码 (仅服务端返回的错误有)
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::BadRequest { .. } => Some(400),
            RestError::NotFound { .. } => Some(404),
            RestError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 错误类名或消息中是否包含指定文本
    ///
    /// 用于断言"预期错误"，如 `Api::BadRequestError`、`ActiveRecord::RecordNotFound`
    /// 或 `Extension must be`。
    pub fn matches(&self, needle: &str) -> bool {
        match self {
            RestError::BadRequest { klass, message }
            | RestError::NotFound { klass, message }
            | RestError::ApiError { klass, message, .. } => {
                klass.contains(needle) || message.contains(needle)
            }
            other => other.to_string().contains(needle),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RestError::NotFound { .. })
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, RestError::BadRequest { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RestError::Timeout(_))
    }
}

fn parse_error_body(body: &str) -> (String, String) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (String::new(), body.trim().to_string());
    };

    let error = &value["error"];
    let klass = error["klass"]
        .as_str()
        .or_else(|| error["kind"].as_str())
        .unwrap_or_default()
        .to_string();
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    (klass, message)
}
