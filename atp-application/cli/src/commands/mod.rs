//! CLI 命令处理模块

pub mod action;
pub mod appliance;
pub mod check;
pub mod collection;
pub mod common; // 公共工具函数
pub mod info;
pub mod output; // table/json/yaml 输出
