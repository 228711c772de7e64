//! 集成测试公共工具: 在进程内模拟管理平台 API 并执行单个检查

#![allow(dead_code)]

use atp_restapi::{RestClient, RestConfig};
use atp_scenarios::{Check, CheckOutcome, Suite, SuiteCheck, SuiteRunner};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "0d3c1f2e";

pub const COLLECTIONS: &[&str] = &[
    "users",
    "groups",
    "roles",
    "features",
    "notifications",
    "services",
    "pictures",
    "events",
    "event_streams",
    "vms",
    "arbitration_settings",
];

pub fn entry_point(base: &str, version: &str) -> Value {
    let collections: Vec<Value> = COLLECTIONS
        .iter()
        .map(|name| json!({"name": name, "href": format!("{}/api/{}", base, name)}))
        .collect();
    json!({
        "name": "API",
        "version": "3.0.0",
        "versions": [{"name": "3.0.0", "href": format!("{}/api/v3.0.0", base)}],
        "collections": collections,
        "identity": {"userid": "admin", "name": "Administrator", "group": "EvmGroup-super_administrator",
                     "role": "EvmRole-super_administrator", "tenant": "My Company", "groups": []},
        "server_info": {"version": version, "build": "20180301", "appliance": "EVM"},
        "product_info": {"name": "ManageIQ"},
        "settings": {}
    })
}

/// 启动模拟服务器并挂载认证和入口文档
pub async fn appliance(version: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"auth_token": TOKEN})))
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

pub async fn connect(server: &MockServer) -> RestClient {
    RestClient::connect(&server.uri(), RestConfig::default(), "admin", "smartvm")
        .await
        .unwrap()
}

/// 指定集合的套件项
pub fn on(check: Check, collections: &[&str]) -> SuiteCheck {
    let mut entry = SuiteCheck::new(check);
    entry.collections = collections.iter().map(|s| s.to_string()).collect();
    entry
}

/// 以单项套件执行一个检查
pub async fn run_one(client: &RestClient, entry: SuiteCheck) -> CheckOutcome {
    let suite = Suite {
        name: entry.check.name().to_string(),
        description: None,
        checks: vec![entry],
    };
    let mut report = SuiteRunner::new(client).run(&suite).await;
    assert_eq!(report.results.len(), 1, "{:?}", report.results);
    report.results.remove(0)
}

/// `<base>/api/<collection>/<id>` 资源，合并额外属性
pub fn resource(base: &str, collection: &str, id: u64, extra: Value) -> Value {
    let mut value = json!({
        "id": id.to_string(),
        "href": format!("{}/api/{}/{}", base, collection, id),
    });
    if let (Some(map), Value::Object(extra)) = (value.as_object_mut(), extra) {
        map.extend(extra);
    }
    value
}

/// 分页信封
pub fn listing(name: &str, resources: Vec<Value>) -> Value {
    json!({
        "name": name,
        "count": resources.len(),
        "subcount": resources.len(),
        "resources": resources,
    })
}

pub fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// 服务端错误响应
pub fn api_error(status: u16, kind: &str, klass: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"kind": kind, "message": message, "klass": klass}
    }))
}

pub fn record_not_found(collection: &str, id: u64) -> ResponseTemplate {
    api_error(
        404,
        "not_found",
        "ActiveRecord::RecordNotFound",
        &format!("Couldn't find {} with 'id'={}", collection, id),
    )
}
