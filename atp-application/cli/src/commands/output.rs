//! CLI 通用输出格式化模块
//!
//! 提供 table/json/yaml 三种输出格式。固定列的数据实现 [`TableRow`]，
//! 集合资源的列在运行时由属性决定，使用 [`print_records`]。

use anyhow::Result;
use atp_restapi::Attributes;
use serde::Serialize;

use super::common::display_value;

const COLUMN_WIDTH: usize = 20;

/// 可输出为表格行的数据 trait
pub trait TableRow {
    /// 返回表格列标题
    fn headers() -> Vec<&'static str>;

    /// 返回该项的表格行数据
    fn row(&self) -> Vec<String>;
}

fn print_line<S: AsRef<str>>(cells: &[S]) -> usize {
    let line = cells
        .iter()
        .map(|c| format!("{:<width$}", c.as_ref(), width = COLUMN_WIDTH))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line.trim_end());
    line.len()
}

/// 表格格式输出
pub fn print_table<T: TableRow>(items: &[T]) {
    let width = print_line(&T::headers());
    println!("{}", "-".repeat(width));

    for item in items {
        print_line(&item.row());
    }
}

/// JSON 格式输出
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// YAML 格式输出
pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// 根据格式参数选择输出方式
pub fn output_formatted<T: TableRow + Serialize>(items: &[T], format: &str) -> Result<()> {
    match format {
        "json" => print_json(items)?,
        "yaml" => print_yaml(items)?,
        _ => print_table(items),
    }
    Ok(())
}

/// 表格列: 指定的属性，未指定时取所有资源属性的并集 (保持首次出现的顺序)
pub fn record_columns(records: &[Attributes], attributes: &[String]) -> Vec<String> {
    if !attributes.is_empty() {
        return attributes.to_vec();
    }
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// 输出集合资源
pub fn print_records(records: &[Attributes], attributes: &[String], format: &str) -> Result<()> {
    match format {
        "json" => print_json(records)?,
        "yaml" => print_yaml(records)?,
        _ => {
            let columns = record_columns(records, attributes);
            let width = print_line(&columns);
            println!("{}", "-".repeat(width));
            for record in records {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| record.get(c).map(display_value).unwrap_or_else(|| "-".to_string()))
                    .collect();
                print_line(&cells);
            }
        }
    }
    Ok(())
}
