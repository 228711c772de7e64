//! 管理平台 REST API 客户端
//!
//! 提供资源集合的查询、分页、批量操作和资源实体缓存。
//!
//! # 功能
//!
//! - **入口与认证** (`RestClient`): 令牌登录、入口文档、版本化入口
//! - **集合** (`Collection`): 加载、过滤、分页查询、批量 create/edit/delete/query
//! - **资源实体** (`Entity`): reload、edit、exists、delete、自定义操作
//! - **查询构造** (`Query`): 属性投影、排序、过滤、分页、类型收窄
//! - **响应信封** (`envelope`): 分页信封与扁平对象两种结构
//! - **能力协商** (`Capabilities`): 按服务端版本判定特性和已知缺陷
//! - **轮询** (`wait`): 等待长时间操作完成，超时单独报错
//!
//! # 示例
//!
//! ```ignore
//! use atp_restapi::{Filter, Query, ResourceRef, RestClient, RestConfig, SortOrder};
//!
//! let client = RestClient::connect("https://appliance", RestConfig::default(), "admin", "smartvm").await?;
//!
//! // 分页查询
//! let users = client.collection("users")?;
//! let page = users
//!     .query(&Query::expanded().sort_by("id", SortOrder::Desc).page(11, 13))
//!     .await?;
//! println!("count={} subcount={}", page.envelope.count(), page.envelope.subcount());
//!
//! // 批量删除
//! let results = users.delete(&[ResourceRef::id("7"), ResourceRef::id("8")]).await?;
//! for r in &results {
//!     println!("{} {:?}", r.success, r.message);
//! }
//! ```

pub mod action;
pub mod capability;
pub mod catalog;
pub mod client;
pub mod collection;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod models;
pub mod query;
pub mod wait;

pub use client::{RestClient, RestConfig};
pub use error::{RestError, Result};

pub use action::{ActionDescriptor, ActionResult, HttpMethod, ResourceRef};
pub use capability::{ApiVersion, Capabilities, Feature, KnownDefect};
pub use catalog::{CollectionShape, Stream};
pub use collection::{Collection, Page};
pub use entity::{AttributeProbe, Attributes, Entity, ProbeFailure, ProbeKind};
pub use envelope::{Body, Envelope, ExpectedLinks, PagingLinks};
pub use models::{
    CollectionEntry, EntryPoint, Identity, OptionsInfo, ProductInfo, ServerInfo, VersionEntry,
};
pub use query::{Filter, FilterOp, Query, SortOrder};
pub use wait::{wait_for, wait_for_field, WaitOptions};
