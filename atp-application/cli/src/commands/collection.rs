//! 集合浏览命令

use anyhow::{Context, Result};
use atp_restapi::{Filter, Query, SortOrder};
use colored::Colorize;
use serde::Serialize;

use super::common::connect;
use super::output::{output_formatted, print_json, print_records, print_yaml, TableRow};
use crate::CollectionAction;

#[derive(Serialize)]
struct CollectionRow {
    name: String,
    href: String,
    description: String,
}

impl TableRow for CollectionRow {
    fn headers() -> Vec<&'static str> {
        vec!["名称", "地址", "描述"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.href.clone(), self.description.clone()]
    }
}

pub async fn handle(appliance: Option<&str>, action: CollectionAction) -> Result<()> {
    match action {
        CollectionAction::List { format } => list_collections(appliance, &format).await,
        CollectionAction::Show {
            collection,
            attributes,
            filters,
            sort_by,
            sort_order,
            limit,
            offset,
            format,
        } => {
            let query = build_query(&attributes, &filters, sort_by, &sort_order, limit, offset)?;
            show_collection(appliance, &collection, &query, &attributes, &format).await
        }
        CollectionAction::Options { collection, format } => {
            show_options(appliance, &collection, &format).await
        }
        CollectionAction::Get {
            collection,
            id,
            format,
        } => get_resource(appliance, &collection, &id, &format).await,
    }
}

/// 由命令行参数构造查询
fn build_query(
    attributes: &[String],
    filters: &[String],
    sort_by: Option<String>,
    sort_order: &str,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Query> {
    let mut query = Query::expanded().attributes(attributes.iter().cloned());
    for raw in filters {
        let filter: Filter = raw.parse().with_context(|| format!("无效的过滤条件: {}", raw))?;
        query = query.filter(filter);
    }
    if let Some(field) = sort_by {
        let order: SortOrder = sort_order
            .parse()
            .with_context(|| format!("无效的排序方向: {}", sort_order))?;
        query = query.sort_by(field, order);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    if let Some(offset) = offset {
        query = query.offset(offset);
    }
    query.validate()?;
    Ok(query)
}

async fn list_collections(appliance: Option<&str>, format: &str) -> Result<()> {
    let client = connect(appliance).await?;
    let rows: Vec<CollectionRow> = client
        .entry()?
        .collections
        .iter()
        .map(|c| CollectionRow {
            name: c.name.clone(),
            href: c.href.clone(),
            description: c.description.clone().unwrap_or_default(),
        })
        .collect();

    output_formatted(&rows, format)
}

async fn show_collection(
    appliance: Option<&str>,
    name: &str,
    query: &Query,
    attributes: &[String],
    format: &str,
) -> Result<()> {
    let client = connect(appliance).await?;
    let collection = client.collection(name)?;
    let page = collection
        .query(query)
        .await
        .with_context(|| format!("查询集合 {} 失败", name))?;

    print_records(page.envelope.resources(), attributes, format)?;

    if format == "table" {
        let envelope = &page.envelope;
        println!();
        println!(
            "{} 共 {} 个，本页 {} 个{}",
            name.cyan().bold(),
            envelope.count().to_string().yellow(),
            envelope.subcount().to_string().yellow(),
            envelope
                .pages
                .map(|p| format!("，{} 页", p))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn show_options(appliance: Option<&str>, name: &str, format: &str) -> Result<()> {
    let client = connect(appliance).await?;
    let options = client.collection(name)?.options().await?;

    match format {
        "json" => print_json(&options),
        "yaml" => print_yaml(&options),
        _ => {
            let sections = [
                ("属性", &options.attributes),
                ("虚拟属性", &options.virtual_attributes),
                ("关联", &options.relationships),
                ("子集合", &options.subcollections),
            ];
            for (title, items) in sections {
                println!("{} ({})", title.bold(), items.len());
                for item in items {
                    println!("  {}", item);
                }
            }
            if !options.data.is_empty() {
                let keys: Vec<&str> = options.data.keys().map(String::as_str).collect();
                println!("{}: {}", "data".bold(), keys.join(", "));
            }
            Ok(())
        }
    }
}

async fn get_resource(appliance: Option<&str>, name: &str, id: &str, format: &str) -> Result<()> {
    let client = connect(appliance).await?;
    let collection = client.collection(name)?;
    let entity = collection
        .get_by_id(id)
        .await
        .with_context(|| format!("获取 {}/{} 失败", name, id))?;

    match format {
        "yaml" => print_yaml(entity.data()),
        _ => print_json(entity.data()),
    }
}
