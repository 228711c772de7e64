//! 集成测试公共工具: 在进程内模拟管理平台 API

#![allow(dead_code)]

use atp_restapi::{RestClient, RestConfig};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "6c6e9b8a7d";

pub const COLLECTIONS: &[&str] = &[
    "users",
    "services",
    "notifications",
    "pictures",
    "settings",
    "features",
    "service_requests",
];

/// 入口文档
pub fn entry_point(base: &str, version: &str) -> Value {
    let collections: Vec<Value> = COLLECTIONS
        .iter()
        .map(|name| json!({"name": name, "href": format!("{}/api/{}", base, name), "description": name}))
        .collect();
    json!({
        "name": "API",
        "description": "REST API",
        "version": "3.0.0",
        "versions": [{"name": "3.0.0", "href": format!("{}/api/v3.0.0", base)}],
        "collections": collections,
        "identity": {"userid": "admin", "name": "Administrator", "group": "EvmGroup-super_administrator",
                     "role": "EvmRole-super_administrator", "tenant": "My Company", "groups": []},
        "server_info": {"version": version, "build": "20180301", "appliance": "EVM",
                        "server_href": format!("{}/api/servers/1", base),
                        "zone_href": format!("{}/api/zones/1", base),
                        "region_href": format!("{}/api/regions/1", base)},
        "product_info": {"name": "ManageIQ", "name_full": "ManageIQ", "copyright": "Copyright (c) ManageIQ",
                         "support_website": "http://www.manageiq.org", "support_website_text": "ManageIQ.org"},
        "settings": {"locale": "en"}
    })
}

/// 启动模拟服务器并挂载认证和入口文档
pub async fn appliance(version: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth_token": TOKEN,
            "token_ttl": 600,
            "expires_on": "2026-10-19T10:00:00Z"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(entry_point(&server.uri(), version)))
        .mount(&server)
        .await;

    server
}

/// 连接到模拟服务器
pub async fn connect(server: &MockServer) -> RestClient {
    RestClient::connect(&server.uri(), RestConfig::default(), "admin", "smartvm")
        .await
        .unwrap()
}

/// 服务端错误响应
pub fn api_error(status: u16, kind: &str, klass: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"kind": kind, "message": message, "klass": klass}
    }))
}
