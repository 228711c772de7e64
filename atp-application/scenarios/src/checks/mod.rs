//! REST API 检查项
//!
//! 每个检查项针对整个 API 或单个集合执行一组断言。集合级检查在以下情况
//! 跳过而不是失败：集合不属于当前版本流、集合结构特殊、或命中已知缺陷。

mod collections;
mod entry;
mod events;
mod filtering;
mod resources;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use atp_restapi::capability::{
    DEFECT_ARBITRATION_RULE_HTTP_DELETE, DEFECT_ATTRIBUTE_SELECTION, DEFECT_HREF_SLUG,
    DEFECT_NOTIFICATION_HTTP_DELETE,
};
use atp_restapi::catalog::{self, CollectionShape};
use atp_restapi::{Attributes, Capabilities, Feature, RestClient, RestError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assert::SoftAssert;
use crate::report::{CheckOutcome, CheckStatus};

/// 检查执行结论
pub(crate) enum Verdict {
    Done(SoftAssert),
    Skip(String),
}

pub(crate) type CheckResult = atp_restapi::Result<Verdict>;

/// 检查参数，各检查项只读取自己用到的字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckParams {
    /// 分页: 每页数量
    #[serde(default)]
    pub limit: Option<u64>,

    /// 分页: 偏移
    #[serde(default)]
    pub offset: Option<u64>,

    /// 类型收窄使用的类名
    #[serde(default)]
    pub collection_class: Option<String>,

    /// 版本化入口名称，缺省取入口文档中的第一个版本
    #[serde(default)]
    pub version: Option<String>,

    /// 期望存在的属性或用于过滤的字段
    #[serde(default)]
    pub attribute: Option<String>,

    /// 批量查询使用的标识字段
    #[serde(default)]
    pub keys: Vec<String>,

    /// 批量查询的所有条件指向同一资源
    #[serde(default)]
    pub same_resource: bool,

    /// 创建资源使用的数据
    #[serde(default)]
    pub data: Vec<Attributes>,

    /// 期望的错误文本
    #[serde(default)]
    pub expected_error: Option<String>,

    /// 资源删除方式: post 或 delete
    #[serde(default)]
    pub method: Option<String>,

    /// 忽略的属性探测失败或不参与比较的字段
    #[serde(default)]
    pub ignore: Vec<String>,

    /// 从资源详情执行操作，否则从集合批量执行
    #[serde(default)]
    pub from_detail: bool,

    /// 查找条件，字段相等
    #[serde(default)]
    pub criteria: Attributes,

    /// 轮询超时 (秒)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// 轮询间隔 (秒)
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

/// 检查项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    QuerySimpleCollection,
    CollectionActions,
    QueryWithApiVersion,
    SelectAttributes,
    AttributesPresent,
    HttpOptions,
    OptionsNodeTypes,
    OptionsSubcollections,
    ServerInfo,
    ServerInfoHrefs,
    DefaultRegion,
    ProductInfo,
    Identity,
    UserSettings,
    SettingsCollection,
    Ping,
    DatetimeFiltering,
    DateFiltering,
    ResourcesHiding,
    SortingByAttributes,
    Paging,
    CollectionClassValid,
    CollectionClassInvalid,
    BulkDelete,
    BulkQuery,
    DeleteFromCollection,
    DeleteFromDetail,
    CreateRejected,
    AttributeProbe,
    CreateResources,
    EditResources,
    MarkAsSeen,
    FindEvents,
}

impl Check {
    pub const ALL: &'static [Check] = &[
        Check::QuerySimpleCollection,
        Check::CollectionActions,
        Check::QueryWithApiVersion,
        Check::SelectAttributes,
        Check::AttributesPresent,
        Check::HttpOptions,
        Check::OptionsNodeTypes,
        Check::OptionsSubcollections,
        Check::ServerInfo,
        Check::ServerInfoHrefs,
        Check::DefaultRegion,
        Check::ProductInfo,
        Check::Identity,
        Check::UserSettings,
        Check::SettingsCollection,
        Check::Ping,
        Check::DatetimeFiltering,
        Check::DateFiltering,
        Check::ResourcesHiding,
        Check::SortingByAttributes,
        Check::Paging,
        Check::CollectionClassValid,
        Check::CollectionClassInvalid,
        Check::BulkDelete,
        Check::BulkQuery,
        Check::DeleteFromCollection,
        Check::DeleteFromDetail,
        Check::CreateRejected,
        Check::AttributeProbe,
        Check::CreateResources,
        Check::EditResources,
        Check::MarkAsSeen,
        Check::FindEvents,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Check::QuerySimpleCollection => "query_simple_collection",
            Check::CollectionActions => "collection_actions",
            Check::QueryWithApiVersion => "query_with_api_version",
            Check::SelectAttributes => "select_attributes",
            Check::AttributesPresent => "attributes_present",
            Check::HttpOptions => "http_options",
            Check::OptionsNodeTypes => "options_node_types",
            Check::OptionsSubcollections => "options_subcollections",
            Check::ServerInfo => "server_info",
            Check::ServerInfoHrefs => "server_info_hrefs",
            Check::DefaultRegion => "default_region",
            Check::ProductInfo => "product_info",
            Check::Identity => "identity",
            Check::UserSettings => "user_settings",
            Check::SettingsCollection => "settings_collection",
            Check::Ping => "ping",
            Check::DatetimeFiltering => "datetime_filtering",
            Check::DateFiltering => "date_filtering",
            Check::ResourcesHiding => "resources_hiding",
            Check::SortingByAttributes => "sorting_by_attributes",
            Check::Paging => "paging",
            Check::CollectionClassValid => "collection_class_valid",
            Check::CollectionClassInvalid => "collection_class_invalid",
            Check::BulkDelete => "bulk_delete",
            Check::BulkQuery => "bulk_query",
            Check::DeleteFromCollection => "delete_from_collection",
            Check::DeleteFromDetail => "delete_from_detail",
            Check::CreateRejected => "create_rejected",
            Check::AttributeProbe => "attribute_probe",
            Check::CreateResources => "create_resources",
            Check::EditResources => "edit_resources",
            Check::MarkAsSeen => "mark_as_seen",
            Check::FindEvents => "find_events",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Check::QuerySimpleCollection => "加载集合并遍历资源",
            Check::CollectionActions => "集合级操作只允许 POST",
            Check::QueryWithApiVersion => "通过 /api/<version> 加载集合",
            Check::SelectAttributes => "attributes=id 只返回 id (及 href/fqname)",
            Check::AttributesPresent => "href 与 href_slug 格式正确",
            Check::HttpOptions => "OPTIONS 返回属性列表",
            Check::OptionsNodeTypes => "OPTIONS 返回 node_types",
            Check::OptionsSubcollections => "OPTIONS 返回子集合",
            Check::ServerInfo => "入口文档包含服务器信息",
            Check::ServerInfoHrefs => "服务器/区域/地域链接可访问",
            Check::DefaultRegion => "默认地域存在",
            Check::ProductInfo => "入口文档包含产品信息",
            Check::Identity => "入口文档包含用户身份",
            Check::UserSettings => "入口文档包含用户设置",
            Check::SettingsCollection => "settings 集合为扁平对象",
            Check::Ping => "GET /api/ping 返回 pong",
            Check::DatetimeFiltering => "按 YYYY-MM-DDTHH:MM:SSZ 时间过滤",
            Check::DateFiltering => "按 YYYY-MM-DD 日期过滤",
            Check::ResourcesHiding => "hide=resources 隐藏资源但保留 subcount",
            Check::SortingByAttributes => "升序与降序结果相反",
            Check::Paging => "limit/offset 分页信封与链接",
            Check::CollectionClassValid => "collection_class 收窄资源类型",
            Check::CollectionClassInvalid => "无效 collection_class 报错",
            Check::BulkDelete => "批量删除逐项报告结果",
            Check::BulkQuery => "批量查询按条件顺序返回资源",
            Check::DeleteFromCollection => "从集合批量删除资源",
            Check::DeleteFromDetail => "从资源详情删除，再次删除报 404",
            Check::CreateRejected => "无效数据创建被服务端拒绝",
            Check::AttributeProbe => "逐个请求资源属性",
            Check::CreateResources => "创建资源后按 id 读取，字段与提交一致",
            Check::EditResources => "编辑资源，响应与存储值均为新值",
            Check::MarkAsSeen => "将未读资源标记为已读",
            Check::FindEvents => "轮询查找事件并按 id 读取",
        }
    }

    /// 是否按集合执行
    pub fn is_collection_scoped(self) -> bool {
        !matches!(
            self,
            Check::ServerInfo
                | Check::ServerInfoHrefs
                | Check::ProductInfo
                | Check::Identity
                | Check::UserSettings
                | Check::Ping
        )
    }

    /// 是否会创建或删除资源
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            Check::BulkDelete
                | Check::DeleteFromCollection
                | Check::DeleteFromDetail
                | Check::CreateRejected
                | Check::CreateResources
                | Check::EditResources
                | Check::MarkAsSeen
        )
    }

    /// 是否需要列出集合资源
    fn needs_listing(self) -> bool {
        !matches!(
            self,
            Check::CollectionActions
                | Check::HttpOptions
                | Check::OptionsNodeTypes
                | Check::OptionsSubcollections
                | Check::SettingsCollection
        )
    }

    /// 未指定集合时的默认目标
    pub fn default_targets(self, capabilities: Option<&Capabilities>) -> Vec<String> {
        let fixed: &[&str] = match self {
            Check::HttpOptions | Check::OptionsSubcollections => &["vms"],
            Check::OptionsNodeTypes => &["hosts", "clusters"],
            Check::DefaultRegion => &["regions"],
            Check::SettingsCollection => &["settings"],
            Check::DatetimeFiltering
            | Check::DateFiltering
            | Check::CollectionClassValid
            | Check::CollectionClassInvalid => &["vms"],
            Check::ResourcesHiding => &["roles"],
            Check::SortingByAttributes => &["groups"],
            Check::Paging => &["features"],
            Check::BulkDelete => &["services"],
            Check::BulkQuery => &["events"],
            Check::DeleteFromCollection | Check::DeleteFromDetail | Check::AttributeProbe => {
                &["notifications"]
            }
            Check::CreateRejected => &["pictures"],
            Check::CreateResources => &["services"],
            Check::EditResources => &["arbitration_settings", "arbitration_rules"],
            Check::MarkAsSeen => &["notifications"],
            Check::FindEvents => &["event_streams"],
            Check::QuerySimpleCollection
            | Check::CollectionActions
            | Check::QueryWithApiVersion
            | Check::SelectAttributes
            | Check::AttributesPresent => {
                let names = match capabilities {
                    Some(caps) => catalog::collections_for(caps.stream()),
                    None => catalog::all_collections(),
                };
                return names.into_iter().map(str::to_string).collect();
            }
            _ => &[],
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }

    /// 跳过原因；`None` 表示应执行
    pub fn skip_reason(
        self,
        capabilities: &Capabilities,
        target: Option<&str>,
        params: &CheckParams,
    ) -> Option<String> {
        match self {
            Check::Ping if !capabilities.supports(Feature::Ping) => {
                return Some(format!("{} 不支持 /ping", capabilities.version()));
            }
            Check::Paging if !capabilities.supports(Feature::Paging) => {
                return Some(format!("{} 不支持分页参数", capabilities.version()));
            }
            Check::FindEvents if !capabilities.supports(Feature::EventStreamQueries) => {
                return Some(format!("{} 不支持 event_streams 查询", capabilities.version()));
            }
            _ => {}
        }

        let collection = target?;
        if collection.starts_with("arbitration_")
            && !capabilities.supports(Feature::ArbitrationCollections)
        {
            return Some(format!(
                "{} 已移除 arbitration 集合 {}",
                capabilities.version(),
                collection
            ));
        }
        if !capabilities.has_collection(collection) {
            return Some(format!(
                "集合 {} 不属于 {} 版本流",
                collection,
                capabilities.stream()
            ));
        }

        let shape = catalog::shape_of(collection);
        if self.needs_listing() && !shape.is_listable() {
            return Some(format!("集合 {} 结构特殊 ({:?})", collection, shape));
        }
        if self == Check::CollectionActions && shape == CollectionShape::RequiresParameters {
            return Some(format!("集合 {} 需要额外参数", collection));
        }

        let defect = match self {
            Check::SelectAttributes => Some(DEFECT_ATTRIBUTE_SELECTION),
            Check::AttributesPresent if !catalog::has_href(collection) => {
                return Some(format!("集合 {} 没有 href", collection));
            }
            Check::AttributesPresent => Some(DEFECT_HREF_SLUG),
            Check::DeleteFromDetail if is_http_delete(params) => match collection {
                "arbitration_rules" => Some(DEFECT_ARBITRATION_RULE_HTTP_DELETE),
                "notifications" if !capabilities.supports(Feature::HttpDeleteOnNotifications) => {
                    return Some(format!(
                        "{} 的通知不支持 HTTP DELETE (已知缺陷 {})",
                        capabilities.version(),
                        DEFECT_NOTIFICATION_HTTP_DELETE
                    ));
                }
                _ => None,
            },
            _ => None,
        };
        match defect {
            Some(id) if capabilities.defect_applies(id, Some(collection)) => {
                Some(format!("受已知缺陷 {} 影响", id))
            }
            _ => None,
        }
    }

    /// 执行检查
    pub async fn run(
        self,
        client: &RestClient,
        target: Option<&str>,
        params: &CheckParams,
    ) -> CheckOutcome {
        let started = Instant::now();
        info!("执行检查 {} {:?}", self.name(), target);

        let result = match target {
            Some(collection) => self.run_on(client, collection, params).await,
            None => self.run_global(client).await,
        };

        let status = match result {
            Ok(Verdict::Done(sa)) => sa.into_status(),
            Ok(Verdict::Skip(reason)) => CheckStatus::Skipped(reason),
            Err(e) => {
                warn!("检查 {} 出错: {}", self.name(), e);
                CheckStatus::Failed(e.to_string())
            }
        };

        let mut outcome = CheckOutcome::new(self.name(), target, status);
        outcome.duration = started.elapsed();
        outcome
    }

    async fn run_global(self, client: &RestClient) -> CheckResult {
        match self {
            Check::ServerInfo => entry::server_info(client),
            Check::ServerInfoHrefs => entry::server_info_hrefs(client).await,
            Check::ProductInfo => entry::product_info(client),
            Check::Identity => entry::identity(client),
            Check::UserSettings => entry::user_settings(client),
            Check::Ping => entry::ping(client).await,
            other => Err(RestError::ConfigError(format!(
                "检查 {} 需要指定集合",
                other.name()
            ))),
        }
    }

    async fn run_on(self, client: &RestClient, collection: &str, params: &CheckParams) -> CheckResult {
        match self {
            Check::QuerySimpleCollection => collections::query_simple(client, collection).await,
            Check::CollectionActions => collections::actions_are_post(client, collection).await,
            Check::QueryWithApiVersion => {
                collections::query_with_api_version(client, collection, params).await
            }
            Check::SelectAttributes => collections::select_attributes(client, collection).await,
            Check::AttributesPresent => collections::attributes_present(client, collection).await,
            Check::HttpOptions => collections::http_options(client, collection, params).await,
            Check::OptionsNodeTypes => collections::options_node_types(client, collection).await,
            Check::OptionsSubcollections => {
                collections::options_subcollections(client, collection).await
            }
            Check::DefaultRegion => entry::default_region(client, collection).await,
            Check::SettingsCollection => entry::settings_collection(client, collection).await,
            Check::DatetimeFiltering => filtering::datetime_filtering(client, collection, params).await,
            Check::DateFiltering => filtering::date_filtering(client, collection, params).await,
            Check::ResourcesHiding => collections::resources_hiding(client, collection).await,
            Check::SortingByAttributes => collections::sorting_by_attributes(client, collection).await,
            Check::Paging => collections::paging(client, collection, params).await,
            Check::CollectionClassValid => {
                collections::collection_class_valid(client, collection, params).await
            }
            Check::CollectionClassInvalid => {
                collections::collection_class_invalid(client, collection, params).await
            }
            Check::BulkDelete => resources::bulk_delete(client, collection, params).await,
            Check::BulkQuery => resources::bulk_query(client, collection, params).await,
            Check::DeleteFromCollection => resources::delete_from_collection(client, collection).await,
            Check::DeleteFromDetail => resources::delete_from_detail(client, collection, params).await,
            Check::CreateRejected => resources::create_rejected(client, collection, params).await,
            Check::AttributeProbe => resources::attribute_probe(client, collection, params).await,
            Check::CreateResources => resources::create_resources(client, collection, params).await,
            Check::EditResources => resources::edit_resources(client, collection, params).await,
            Check::MarkAsSeen => resources::mark_as_seen(client, collection, params).await,
            Check::FindEvents => events::find_events(client, collection, params).await,
            global => global.run_global(client).await,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Check {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Check::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("未知检查项: {}", s))
    }
}

fn is_http_delete(params: &CheckParams) -> bool {
    params
        .method
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case("delete"))
}

/// 资源 ID 转为整数，用于排序比较
pub(crate) fn numeric_id(entity: &atp_restapi::Entity<'_>) -> Option<u64> {
    entity.id().and_then(|id| id.parse().ok())
}
