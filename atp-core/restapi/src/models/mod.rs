//! REST API 数据模型
//!
//! 入口文档 (`GET /api`) 与 `OPTIONS` 响应的结构。未列出的字段保存在
//! `extra` 中，不同版本新增的字段不会导致解析失败。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 服务器信息 (`server_info`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub build: String,

    #[serde(default)]
    pub appliance: Option<String>,

    #[serde(default)]
    pub server_href: Option<String>,

    #[serde(default)]
    pub zone_href: Option<String>,

    #[serde(default)]
    pub region_href: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 产品信息 (`product_info`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub name_full: Option<String>,

    #[serde(default)]
    pub copyright: Option<String>,

    #[serde(default)]
    pub support_website: Option<String>,

    #[serde(default)]
    pub support_website_text: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 当前用户身份 (`identity`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub userid: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub tenant: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// API 版本条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub name: String,
    pub href: String,
}

/// 集合条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub name: String,
    pub href: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// 入口文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPoint {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub versions: Vec<VersionEntry>,

    #[serde(default)]
    pub collections: Vec<CollectionEntry>,

    #[serde(default)]
    pub identity: Option<Identity>,

    #[serde(default)]
    pub server_info: Option<ServerInfo>,

    #[serde(default)]
    pub product_info: Option<ProductInfo>,

    /// 用户设置，结构随版本不同
    #[serde(default)]
    pub settings: Option<Value>,
}

impl EntryPoint {
    pub fn collection(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn version_entry(&self, name: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.name == name)
    }
}

/// `OPTIONS <collection_href>` 响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsInfo {
    #[serde(default)]
    pub attributes: Vec<String>,

    #[serde(default)]
    pub virtual_attributes: Vec<String>,

    #[serde(default)]
    pub relationships: Vec<String>,

    #[serde(default)]
    pub subcollections: Vec<String>,

    /// 集合特有数据，如 `node_types`
    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_point_parse() {
        let doc = json!({
            "name": "API",
            "version": "3.0.0",
            "versions": [{"name": "3.0.0", "href": "https://a/api/v3.0.0"}],
            "collections": [{"name": "vms", "href": "https://a/api/vms", "description": "Vms"}],
            "server_info": {"version": "5.9.0.22", "build": "20180301", "appliance": "EVM",
                            "server_href": "https://a/api/servers/1", "extra_field": 1},
            "product_info": {"name": "ManageIQ", "copyright": "(c)"},
            "identity": {"userid": "admin", "groups": ["EvmGroup-super_administrator"]}
        });
        let entry: EntryPoint = serde_json::from_value(doc).unwrap();
        assert_eq!(entry.collection("vms").unwrap().href, "https://a/api/vms");
        assert!(entry.collection("hosts").is_none());
        assert_eq!(entry.version_entry("3.0.0").unwrap().href, "https://a/api/v3.0.0");
        let info = entry.server_info.unwrap();
        assert_eq!(info.version, "5.9.0.22");
        assert!(info.extra.contains_key("extra_field"));
        assert_eq!(entry.identity.unwrap().groups.len(), 1);
    }

    #[test]
    fn test_options_parse() {
        let doc = json!({
            "attributes": ["id", "name", "boot_time"],
            "virtual_attributes": ["ipaddresses"],
            "relationships": ["host"],
            "subcollections": ["tags", "snapshots"],
            "data": {"node_types": ["mixed_clusters"]}
        });
        let options: OptionsInfo = serde_json::from_value(doc).unwrap();
        assert!(options.attributes.contains(&"boot_time".to_string()));
        assert!(options.subcollections.contains(&"tags".to_string()));
        assert!(options.data.contains_key("node_types"));
    }
}
