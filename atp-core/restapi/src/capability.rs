//! 版本能力协商
//!
//! 连接时根据服务端上报的版本号 (`server_info.version`) 协商一次能力集，
//! 之后通过 [`Capabilities::supports`] 和 [`Capabilities::defect_applies`] 查询，
//! 避免在各处散落版本字符串比较。

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::catalog::{self, Stream};
use crate::error::{RestError, Result};

/// 服务端版本号
///
/// 数字版本形如 `5.9.0.22`；`master`/`upstream` 等非数字版本视为上游开发版，
/// 比任何数字版本都新。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    Release {
        major: u32,
        minor: u32,
        patch: u32,
        build: u32,
    },
    Upstream,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        ApiVersion::Release {
            major,
            minor,
            patch: 0,
            build: 0,
        }
    }

    /// 解析版本字符串
    pub fn parse(raw: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("版本号正则")
        });

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RestError::ParseError("版本号为空".to_string()));
        }

        match pattern.captures(raw) {
            Some(caps) => {
                let part = |i: usize| -> Result<u32> {
                    caps.get(i)
                        .map(|m| m.as_str().parse::<u32>())
                        .transpose()
                        .map(|v| v.unwrap_or(0))
                        .map_err(|e| RestError::ParseError(format!("版本号 {}: {}", raw, e)))
                };
                Ok(ApiVersion::Release {
                    major: part(1)?,
                    minor: part(2)?,
                    patch: part(3)?,
                    build: part(4)?,
                })
            }
            None if raw.chars().next().is_some_and(|c| c.is_ascii_digit()) => Err(
                RestError::ParseError(format!("无法识别的版本号: {}", raw)),
            ),
            None => Ok(ApiVersion::Upstream),
        }
    }

    /// 所属发布流
    pub fn stream(&self) -> Stream {
        match self {
            ApiVersion::Release { major: 5, minor: 8, .. } => Stream::V5_8,
            ApiVersion::Release { major: 5, minor: 9, .. } => Stream::V5_9,
            ApiVersion::Release { major, minor, .. } => Stream::Other(*major, *minor),
            ApiVersion::Upstream => Stream::Upstream,
        }
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ApiVersion::Upstream, ApiVersion::Upstream) => Ordering::Equal,
            (ApiVersion::Upstream, _) => Ordering::Greater,
            (_, ApiVersion::Upstream) => Ordering::Less,
            (
                ApiVersion::Release { major, minor, patch, build },
                ApiVersion::Release {
                    major: o_major,
                    minor: o_minor,
                    patch: o_patch,
                    build: o_build,
                },
            ) => (major, minor, patch, build).cmp(&(o_major, o_minor, o_patch, o_build)),
        }
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::Release { major, minor, patch, build } => {
                write!(f, "{}.{}.{}.{}", major, minor, patch, build)
            }
            ApiVersion::Upstream => write!(f, "upstream"),
        }
    }
}

/// 随版本变化的功能
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `limit`/`offset` 分页与 `links`
    Paging,
    /// `GET /api/ping`
    Ping,
    /// 资源携带 `href_slug`
    HrefSlug,
    /// 通知资源支持 HTTP DELETE
    HttpDeleteOnNotifications,
    /// `arbitration_*` 集合 (5.9 起移除)
    ArbitrationCollections,
    /// `event_streams` 属性查询与过滤
    EventStreamQueries,
}

impl Feature {
    pub const ALL: &'static [Feature] = &[
        Feature::Paging,
        Feature::Ping,
        Feature::HrefSlug,
        Feature::HttpDeleteOnNotifications,
        Feature::ArbitrationCollections,
        Feature::EventStreamQueries,
    ];

    /// 可用版本区间 `[since, until)`
    fn range(self) -> (Option<ApiVersion>, Option<ApiVersion>) {
        match self {
            Feature::Paging
            | Feature::Ping
            | Feature::HttpDeleteOnNotifications
            | Feature::EventStreamQueries => (Some(ApiVersion::new(5, 9)), None),
            Feature::HrefSlug => (Some(ApiVersion::new(5, 8)), None),
            Feature::ArbitrationCollections => (None, Some(ApiVersion::new(5, 9))),
        }
    }
}

/// 已知缺陷
///
/// 仅在 `fixed_in` 之前的版本、且仅对 `collections` 中列出的集合
/// (为空表示全部集合) 应用规避措施，其余情况按真实失败处理。
#[derive(Debug, Clone)]
pub struct KnownDefect {
    pub id: u32,
    pub summary: &'static str,
    pub fixed_in: Option<ApiVersion>,
    pub collections: &'static [&'static str],
}

impl KnownDefect {
    fn affects(&self, version: &ApiVersion, collection: Option<&str>) -> bool {
        let in_range = match &self.fixed_in {
            Some(fixed) => version < fixed,
            None => true,
        };
        let in_scope = self.collections.is_empty()
            || collection.is_some_and(|name| self.collections.contains(&name));
        in_range && in_scope
    }
}

pub const DEFECT_ATTRIBUTE_SELECTION: u32 = 1437201;
pub const DEFECT_HREF_SLUG: u32 = 1485310;
pub const DEFECT_NOTIFICATION_HTTP_DELETE: u32 = 1420872;
pub const DEFECT_ARBITRATION_RULE_HTTP_DELETE: u32 = 1410504;
pub const DEFECT_DATETIME_FILTER: u32 = 1437529;

/// 已知缺陷表
pub const KNOWN_DEFECTS: &[KnownDefect] = &[
    KnownDefect {
        id: DEFECT_ATTRIBUTE_SELECTION,
        summary: "attributes 参数在部分集合上无效",
        fixed_in: Some(ApiVersion::new(5, 9)),
        collections: &["results", "service_catalogs", "automate", "categories", "roles"],
    },
    KnownDefect {
        id: DEFECT_HREF_SLUG,
        summary: "资源缺少 href_slug",
        fixed_in: Some(ApiVersion::new(5, 9)),
        collections: &["policy_actions", "automate_domains"],
    },
    KnownDefect {
        id: DEFECT_NOTIFICATION_HTTP_DELETE,
        summary: "通知资源不支持 HTTP DELETE",
        fixed_in: Some(ApiVersion::new(5, 9)),
        collections: &["notifications"],
    },
    KnownDefect {
        id: DEFECT_ARBITRATION_RULE_HTTP_DELETE,
        summary: "仲裁规则 HTTP DELETE 不可用 (不会修复)",
        fixed_in: None,
        collections: &["arbitration_rules"],
    },
    KnownDefect {
        id: DEFECT_DATETIME_FILTER,
        summary: "日期时间过滤: `=` 无匹配，`>` 返回边界相等的记录",
        fixed_in: None,
        collections: &[],
    },
];

/// 已协商的能力集
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    version: ApiVersion,
}

impl Capabilities {
    pub fn new(version: ApiVersion) -> Self {
        Self { version }
    }

    /// 根据服务端上报的版本字符串协商能力集
    pub fn negotiate(raw_version: &str) -> Result<Self> {
        let version = ApiVersion::parse(raw_version)?;
        debug!("能力协商: {} -> {:?}", raw_version, version.stream());
        Ok(Self::new(version))
    }

    pub fn version(&self) -> &ApiVersion {
        &self.version
    }

    pub fn stream(&self) -> Stream {
        self.version.stream()
    }

    /// 是否支持指定功能
    pub fn supports(&self, feature: Feature) -> bool {
        let (since, until) = feature.range();
        since.map_or(true, |v| self.version >= v) && until.map_or(true, |v| self.version < v)
    }

    /// 已知缺陷是否适用于当前版本和集合
    pub fn defect_applies(&self, id: u32, collection: Option<&str>) -> bool {
        KNOWN_DEFECTS
            .iter()
            .find(|d| d.id == id)
            .is_some_and(|d| d.affects(&self.version, collection))
    }

    /// 当前版本尚未修复的已知缺陷
    pub fn open_defects(&self) -> impl Iterator<Item = &'static KnownDefect> + '_ {
        KNOWN_DEFECTS
            .iter()
            .filter(|d| d.fixed_in.as_ref().map_or(true, |fixed| &self.version < fixed))
    }

    /// 当前版本是否提供该集合
    pub fn has_collection(&self, name: &str) -> bool {
        catalog::collections_for(self.stream()).contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release() {
        let v = ApiVersion::parse("5.9.0.22").unwrap();
        assert_eq!(
            v,
            ApiVersion::Release { major: 5, minor: 9, patch: 0, build: 22 }
        );
        assert_eq!(v.stream(), Stream::V5_9);
        assert_eq!(ApiVersion::parse("5.8").unwrap(), ApiVersion::new(5, 8));
    }

    #[test]
    fn test_parse_upstream() {
        assert_eq!(ApiVersion::parse("master").unwrap(), ApiVersion::Upstream);
        assert!(ApiVersion::Upstream > ApiVersion::parse("5.10.1.1").unwrap());
        assert!(ApiVersion::parse("").is_err());
        assert!(ApiVersion::parse("5x").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(ApiVersion::parse("5.8.3.1").unwrap() < ApiVersion::new(5, 9));
        assert!(ApiVersion::parse("5.9.0.1").unwrap() > ApiVersion::new(5, 9));
    }

    #[test]
    fn test_feature_ranges() {
        let old = Capabilities::negotiate("5.8.2.3").unwrap();
        assert!(!old.supports(Feature::Paging));
        assert!(old.supports(Feature::HrefSlug));
        assert!(old.supports(Feature::ArbitrationCollections));

        let new = Capabilities::negotiate("5.9.1.2").unwrap();
        assert!(new.supports(Feature::Paging));
        assert!(new.supports(Feature::Ping));
        assert!(!new.supports(Feature::ArbitrationCollections));
    }

    #[test]
    fn test_defect_scope() {
        let old = Capabilities::negotiate("5.8.2.3").unwrap();
        assert!(old.defect_applies(DEFECT_ATTRIBUTE_SELECTION, Some("roles")));
        assert!(!old.defect_applies(DEFECT_ATTRIBUTE_SELECTION, Some("vms")));

        let new = Capabilities::negotiate("5.9.0.5").unwrap();
        assert!(!new.defect_applies(DEFECT_ATTRIBUTE_SELECTION, Some("roles")));
        assert!(new.defect_applies(DEFECT_ARBITRATION_RULE_HTTP_DELETE, Some("arbitration_rules")));
        assert!(new.defect_applies(DEFECT_DATETIME_FILTER, None));
        assert!(!new.defect_applies(999, None));
    }

    #[test]
    fn test_open_defects() {
        let old = Capabilities::negotiate("5.8.2.3").unwrap();
        assert_eq!(old.open_defects().count(), KNOWN_DEFECTS.len());

        let new = Capabilities::negotiate("5.9.0.5").unwrap();
        let ids: Vec<u32> = new.open_defects().map(|d| d.id).collect();
        assert_eq!(ids, vec![DEFECT_ARBITRATION_RULE_HTTP_DELETE, DEFECT_DATETIME_FILTER]);
    }
}
