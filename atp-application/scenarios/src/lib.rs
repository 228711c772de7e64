//! ATP REST API 测试场景库
//!
//! 提供面向管理平台 REST API 的检查项 ([`Check`])、软断言 ([`SoftAssert`])
//! 以及 YAML 描述的检查套件 ([`Suite`]) 和执行器 ([`SuiteRunner`])。
//!
//! # 示例
//!
//! ```ignore
//! use atp_restapi::{RestClient, RestConfig};
//! use atp_scenarios::{Suite, SuiteRunner};
//!
//! let client = RestClient::connect("https://appliance", RestConfig::default(), "admin", "smartvm").await?;
//! let suite = Suite::from_yaml("suites/rest-smoke.yaml")?;
//! let report = SuiteRunner::new(&client).run(&suite).await;
//! println!("{}", report.to_json()?);
//! ```

pub mod assert;
pub mod checks;
pub mod report;
pub mod suite;

pub use assert::SoftAssert;
pub use checks::{Check, CheckParams};
pub use report::{CheckOutcome, CheckStatus, SuiteReport};
pub use suite::{Suite, SuiteCheck, SuiteRunner};
