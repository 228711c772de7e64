//! 集合目录
//!
//! 各发布流提供的集合名称，以及响应结构特殊的集合。

use std::collections::BTreeSet;
use std::fmt;

/// 发布流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    V5_8,
    V5_9,
    Upstream,
    Other(u32, u32),
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::V5_8 => write!(f, "5.8"),
            Stream::V5_9 => write!(f, "5.9"),
            Stream::Upstream => write!(f, "upstream"),
            Stream::Other(major, minor) => write!(f, "{}.{}", major, minor),
        }
    }
}

/// 5.8 之后新增的集合
pub const COLLECTIONS_NEWER_THAN_58: &[&str] = &[
    "alert_definition_profiles",
    "automate_workspaces",
    "cloud_subnets",
    "cloud_tenants",
    "cloud_volumes",
    "container_nodes",
    "container_projects",
    "custom_button_sets",
    "custom_buttons",
    "event_streams",
    "firmwares",
    "floating_ips",
    "generic_object_definitions",
    "generic_objects",
    "guest_devices",
    "metric_rollups",
    "network_routers",
    "physical_servers",
    "regions",
];

/// 5.9 中移除的集合
pub const COLLECTIONS_OBSOLETED_IN_59: &[&str] = &[
    "arbitration_profiles",
    "arbitration_rules",
    "arbitration_settings",
    "blueprints",
    "virtual_templates",
];

/// 5.9 提供的集合
pub const COLLECTIONS_IN_59: &[&str] = &[
    "actions",
    "alert_definition_profiles",
    "alert_definitions",
    "alerts",
    "authentications",
    "automate",
    "automate_domains",
    "automate_workspaces",
    "automation_requests",
    "availability_zones",
    "categories",
    "chargebacks",
    "cloud_networks",
    "cloud_subnets",
    "cloud_tenants",
    "cloud_volumes",
    "clusters",
    "conditions",
    "configuration_script_payloads",
    "configuration_script_sources",
    "container_deployments",
    "container_nodes",
    "container_projects",
    "currencies",
    "custom_button_sets",
    "custom_buttons",
    "data_stores",
    "event_streams",
    "events",
    "features",
    "firmwares",
    "flavors",
    "floating_ips",
    "generic_object_definitions",
    "generic_objects",
    "groups",
    "guest_devices",
    "hosts",
    "instances",
    "load_balancers",
    "measures",
    "metric_rollups",
    "network_routers",
    "notifications",
    "orchestration_templates",
    "physical_servers",
    "pictures",
    "policies",
    "policy_actions",
    "policy_profiles",
    "providers",
    "provision_dialogs",
    "provision_requests",
    "rates",
    "regions",
    "reports",
    "request_tasks",
    "requests",
    "resource_pools",
    "results",
    "roles",
    "security_groups",
    "servers",
    "service_catalogs",
    "service_dialogs",
    "service_orders",
    "service_requests",
    "service_templates",
    "services",
    "settings",
    "tags",
    "tasks",
    "templates",
    "tenants",
    "users",
    "vms",
    "zones",
];

/// 上游开发版提供的集合 (与 5.9 相同)
pub fn collections_in_upstream() -> BTreeSet<&'static str> {
    collections_in_59()
}

pub fn collections_in_59() -> BTreeSet<&'static str> {
    COLLECTIONS_IN_59.iter().copied().collect()
}

/// 5.8 提供的集合: (5.9 ∪ 5.9 中移除) - 5.8 之后新增
pub fn collections_in_58() -> BTreeSet<&'static str> {
    let newer: BTreeSet<&str> = COLLECTIONS_NEWER_THAN_58.iter().copied().collect();
    COLLECTIONS_IN_59
        .iter()
        .chain(COLLECTIONS_OBSOLETED_IN_59)
        .copied()
        .filter(|name| !newer.contains(name))
        .collect()
}

/// 所有已知集合
pub fn all_collections() -> BTreeSet<&'static str> {
    let mut all = collections_in_59();
    all.extend(collections_in_58());
    all
}

/// 指定发布流提供的集合
///
/// 未知发布流按上游处理。
pub fn collections_for(stream: Stream) -> BTreeSet<&'static str> {
    match stream {
        Stream::V5_8 => collections_in_58(),
        Stream::V5_9 => collections_in_59(),
        Stream::Upstream | Stream::Other(..) => collections_in_upstream(),
    }
}

/// 集合响应结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    /// 标准分页集合 (`count`/`subcount`/`resources`)
    Paged,
    /// 扁平对象，没有 `resources`
    Flat,
    /// 需要额外的必填查询参数
    RequiresParameters,
    /// 不支持直接列出
    NoListing,
}

impl CollectionShape {
    pub fn is_listable(self) -> bool {
        self == CollectionShape::Paged
    }
}

/// 集合的响应结构
pub fn shape_of(name: &str) -> CollectionShape {
    match name {
        "settings" => CollectionShape::Flat,
        "metric_rollups" => CollectionShape::RequiresParameters,
        "automate_workspaces" => CollectionShape::NoListing,
        _ => CollectionShape::Paged,
    }
}

/// 集合中的资源是否带有 `href`
pub fn has_href(name: &str) -> bool {
    name != "automate"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_58_excludes_newer_collections() {
        let c58 = collections_in_58();
        assert!(!c58.contains("event_streams"));
        assert!(!c58.contains("regions"));
        assert!(c58.contains("arbitration_settings"));
        assert!(c58.contains("vms"));
    }

    #[test]
    fn test_59_drops_obsoleted() {
        let c59 = collections_for(Stream::V5_9);
        assert!(!c59.contains("arbitration_rules"));
        assert!(c59.contains("pictures"));
        assert_eq!(collections_for(Stream::Upstream), c59);
    }

    #[test]
    fn test_all_is_union() {
        let all = all_collections();
        assert!(all.contains("blueprints"));
        assert!(all.contains("metric_rollups"));
        assert_eq!(all.len(), COLLECTIONS_IN_59.len() + COLLECTIONS_OBSOLETED_IN_59.len());
    }

    #[test]
    fn test_special_shapes() {
        assert_eq!(shape_of("settings"), CollectionShape::Flat);
        assert_eq!(shape_of("metric_rollups"), CollectionShape::RequiresParameters);
        assert_eq!(shape_of("automate_workspaces"), CollectionShape::NoListing);
        assert!(shape_of("vms").is_listable());
        assert!(!has_href("automate"));
    }
}
