//! 资源创建、编辑、批量操作和删除检查

use std::time::Duration;

use atp_restapi::{
    wait_for, Attributes, Entity, HttpMethod, ResourceRef, RestClient, RestError, WaitOptions,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{CheckParams, CheckResult, Verdict};
use crate::assert::SoftAssert;

/// 生成 `count` 组只含 `field` 的唯一取值
fn generated(field: &str, prefix: &str, count: usize) -> Vec<Attributes> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    (0..count)
        .map(|i| {
            let mut map = Attributes::new();
            map.insert(field.to_string(), json!(format!("{}_{}_{}", prefix, stamp, i)));
            map
        })
        .collect()
}

/// 提交的每个字段在 `data` 中取值一致
fn expect_fields(
    sa: &mut SoftAssert,
    data: &Attributes,
    fields: &Attributes,
    ignore: &[String],
    what: &str,
) {
    for (key, value) in fields {
        if ignore.contains(key) {
            continue;
        }
        sa.eq(data.get(key), Some(value), &format!("{} {}", what, key));
    }
}

/// 删除还存在的资源，失败只记录日志
async fn cleanup(entities: &[Entity<'_>]) {
    for entity in entities {
        match entity.exists().await {
            Ok(true) => {
                if let Err(e) = entity.delete(HttpMethod::Post).await {
                    warn!("清理资源 {:?} 失败: {}", entity.href(), e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("检查资源 {:?} 是否存在失败: {}", entity.href(), e),
        }
    }
}

/// 批量删除时已删除的资源单独报告失败，不影响其他资源
pub(super) async fn bulk_delete(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let handle = client.collection(collection)?;
    let data = if params.data.len() >= 2 {
        params.data.clone()
    } else {
        generated("name", "atp", 2)
    };

    let results = handle.create(data).await?;
    let created = handle.entities_from(&results);
    let mut sa = SoftAssert::new();
    if !sa.eq(created.len(), 2, "创建的资源数量") {
        cleanup(&created).await;
        return Ok(Verdict::Done(sa));
    }

    let outcome = async {
        created[0].delete(HttpMethod::Post).await?;
        let targets: Vec<ResourceRef> = created.iter().map(ResourceRef::from).collect();
        handle.delete(&targets).await
    }
    .await;

    match outcome {
        Ok(results) => {
            let flags: Vec<bool> = results.iter().map(|r| r.success).collect();
            sa.eq(flags, vec![false, true], "批量删除结果");
        }
        Err(e) => sa.fail(format!("批量删除失败: {}", e)),
    }
    cleanup(&created).await;
    Ok(Verdict::Done(sa))
}

/// 批量查询按条件顺序返回资源
pub(super) async fn bulk_query(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let keys: Vec<String> = if params.keys.is_empty() {
        vec!["id".into(), "href".into(), "guid".into()]
    } else {
        params.keys.clone()
    };

    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    let needed = if params.same_resource { 1 } else { keys.len() };
    if handle.len() < needed {
        return Ok(Verdict::Skip(format!(
            "{} 中资源不足 {} 个",
            collection, needed
        )));
    }

    let sources: Vec<Entity<'_>> = (0..keys.len())
        .filter_map(|i| handle.entity_at(if params.same_resource { 0 } else { i }))
        .collect();
    let mut criteria = Vec::with_capacity(keys.len());
    for (key, entity) in keys.iter().zip(&sources) {
        match entity.get(key) {
            Some(value) => criteria.push(ResourceRef::field(key, value.clone())),
            None => {
                return Ok(Verdict::Skip(format!(
                    "{} 的资源没有 {} 属性",
                    collection, key
                )))
            }
        }
    }

    let results = handle.query_by(&criteria).await?;
    let mut sa = SoftAssert::new();
    sa.eq(results.len(), criteria.len(), "批量查询结果数量");
    for (i, (result, source)) in results.iter().zip(&sources).enumerate() {
        if !sa.check(result.success, format!("第 {} 个条件查询失败: {:?}", i, result.message)) {
            continue;
        }
        // 结果与原资源经同一集合构造，操作声明不参与比较
        let found = handle.entity(result.data.clone());
        if params.same_resource {
            sa.eq(found.id(), source.id(), &format!("第 {} 个结果 id", i));
        } else {
            sa.check(
                found.data() == source.data(),
                format!("第 {} 个结果与原资源不一致", i),
            );
        }
    }
    Ok(Verdict::Done(sa))
}

/// 集合中最后两个资源
async fn last_two<'a>(
    handle: &mut atp_restapi::Collection<'a>,
) -> atp_restapi::Result<Vec<Entity<'a>>> {
    handle.reload().await?;
    let entities = handle.entities();
    let skip = entities.len().saturating_sub(2);
    Ok(entities.into_iter().skip(skip).collect())
}

/// 从集合批量删除，等待资源消失后再次删除应报 404
pub(super) async fn delete_from_collection(client: &RestClient, collection: &str) -> CheckResult {
    let mut handle = client.collection(collection)?;
    let targets = last_two(&mut handle).await?;
    if targets.is_empty() {
        return Ok(Verdict::Skip(format!("{} 中没有资源", collection)));
    }
    let refs: Vec<ResourceRef> = targets.iter().map(ResourceRef::from).collect();

    let mut sa = SoftAssert::new();
    let results = handle.delete(&refs).await?;
    sa.check(
        results.iter().all(|r| r.success),
        format!("批量删除存在失败项: {:?}", results),
    );

    let options = WaitOptions::new(Duration::from_secs(30), Duration::from_secs(1))
        .message(format!("{} 资源删除完成", collection));
    for entity in &targets {
        let gone = wait_for(&options, || async {
            let exists = entity.exists().await?;
            Ok::<_, RestError>((!exists).then_some(()))
        })
        .await;
        if let Err(e) = gone {
            sa.fail(format!("{:?} 未被删除: {}", entity.href(), e));
        }
    }

    match handle.delete(&refs).await {
        Err(e) => {
            sa.check(
                e.is_not_found() || e.matches("ActiveRecord::RecordNotFound"),
                format!("再次删除期望 404，实际: {}", e),
            );
        }
        Ok(results) => {
            sa.check(
                results.iter().all(|r| !r.success),
                "再次删除已删除的资源没有报错",
            );
        }
    }
    Ok(Verdict::Done(sa))
}

/// 从资源详情删除，再次删除应报 `ActiveRecord::RecordNotFound`
pub(super) async fn delete_from_detail(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let method = HttpMethod::parse(params.method.as_deref().unwrap_or("post"));
    let mut handle = client.collection(collection)?;
    let targets = last_two(&mut handle).await?;
    if targets.is_empty() {
        return Ok(Verdict::Skip(format!("{} 中没有资源", collection)));
    }

    let mut sa = SoftAssert::new();
    for entity in &targets {
        info!("从详情删除 ({}) {:?}", method, entity.href());
        if let Err(e) = entity.delete(method.clone()).await {
            sa.fail(format!("删除 {:?} 失败: {}", entity.href(), e));
            continue;
        }
        match entity.delete(method.clone()).await {
            Ok(()) => sa.fail(format!("再次删除 {:?} 没有报错", entity.href())),
            Err(e) => {
                sa.check(
                    e.is_not_found() && e.matches("ActiveRecord::RecordNotFound"),
                    format!("再次删除期望 ActiveRecord::RecordNotFound，实际: {}", e),
                );
            }
        }
    }
    Ok(Verdict::Done(sa))
}

/// 无效数据创建被拒绝，且集合数量不变
pub(super) async fn create_rejected(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let data = if params.data.is_empty() {
        let mut map = Attributes::new();
        map.insert("extension".to_string(), json!("xcf"));
        map.insert(
            "content".to_string(),
            Value::String(
                "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg=="
                    .to_string(),
            ),
        );
        vec![map]
    } else {
        params.data.clone()
    };
    let expected = params
        .expected_error
        .as_deref()
        .unwrap_or("Extension must be");

    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    let before = handle.count();

    let mut sa = SoftAssert::new();
    match handle.create(data).await {
        Ok(results) => {
            sa.fail(format!("无效数据创建成功: {:?}", results));
            let created = handle.entities_from(&results);
            cleanup(&created).await;
        }
        Err(e) => {
            sa.check(e.status() == Some(400), format!("期望 HTTP 400，实际: {}", e));
            sa.check(e.matches(expected), format!("期望错误 `{}`，实际: {}", expected, e));
        }
    }

    handle.reload().await?;
    sa.eq(handle.count(), before, "创建失败后集合数量");
    Ok(Verdict::Done(sa))
}

/// 逐个请求集合中最后一个资源的属性
pub(super) async fn attribute_probe(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    let Some(entity) = handle.last() else {
        return Ok(Verdict::Skip(format!("{} 中没有资源", collection)));
    };

    let probe = entity.probe_attributes().await?;
    let mut sa = SoftAssert::new();
    for failure in &probe.failed {
        if params.ignore.iter().any(|n| n == &failure.name) {
            continue;
        }
        sa.fail(format!(
            "{:?} \"{}\": status: {:?}, error: `{}`",
            failure.kind, failure.name, failure.status, failure.error
        ));
    }
    Ok(Verdict::Done(sa))
}

/// 创建资源后按 id 读取，提交的字段与读取结果一致，集合数量相应增加
pub(super) async fn create_resources(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let data = if params.data.is_empty() {
        generated("name", "atp", 2)
    } else {
        params.data.clone()
    };

    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    let before = handle.count();

    let results = handle.create(data.clone()).await?;
    let created = handle.entities_from(&results);
    let mut sa = SoftAssert::new();
    sa.eq(created.len(), data.len(), "创建的资源数量");

    for (entity, fields) in created.iter().zip(&data) {
        let Some(id) = entity.id() else {
            continue;
        };
        match handle.get_by_id(&id).await {
            Ok(record) => {
                sa.eq(record.id(), Some(id.clone()), "读取结果 id");
                expect_fields(
                    &mut sa,
                    record.data(),
                    fields,
                    &params.ignore,
                    &format!("{}/{}", collection, id),
                );
            }
            Err(e) => sa.fail(format!("读取 {}/{} 失败: {}", collection, id, e)),
        }
    }

    handle.reload().await?;
    sa.eq(handle.count(), before + created.len() as u64, "创建后集合数量");
    cleanup(&created).await;
    Ok(Verdict::Done(sa))
}

/// 编辑集合中最后两个资源，服务端响应和再次读取的值均为新值
///
/// `data` 未指定时为每个资源生成新的 `attribute` (缺省 `name`)。
pub(super) async fn edit_resources(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let mut handle = client.collection(collection)?;
    let mut targets = last_two(&mut handle).await?;
    if targets.is_empty() {
        return Ok(Verdict::Skip(format!("{} 中没有资源", collection)));
    }
    let changes: Vec<Attributes> = if params.data.len() >= targets.len() {
        params.data[..targets.len()].to_vec()
    } else {
        let field = params.attribute.as_deref().unwrap_or("name");
        generated(field, "atp_edit", targets.len())
    };

    let mut sa = SoftAssert::new();
    if params.from_detail {
        for (entity, fields) in targets.iter_mut().zip(&changes) {
            match entity.edit(fields.clone()).await {
                Ok(()) => expect_fields(&mut sa, entity.data(), fields, &params.ignore, "编辑响应"),
                Err(e) => sa.fail(format!("编辑 {:?} 失败: {}", entity.href(), e)),
            }
        }
    } else {
        let edits: Vec<(ResourceRef, Attributes)> = targets
            .iter()
            .map(ResourceRef::from)
            .zip(changes.iter().cloned())
            .collect();
        let results = handle.edit(edits).await?;
        for (i, (result, fields)) in results.iter().zip(&changes).enumerate() {
            if sa.check(result.success, format!("第 {} 个编辑失败: {:?}", i, result.message)) {
                expect_fields(&mut sa, &result.data, fields, &params.ignore, "编辑响应");
            }
        }
    }

    for (entity, fields) in targets.iter().zip(&changes) {
        let Some(id) = entity.id() else {
            continue;
        };
        let stored = handle.get_by_id(&id).await?;
        expect_fields(
            &mut sa,
            stored.data(),
            fields,
            &params.ignore,
            &format!("{}/{} 存储值", collection, id),
        );
    }
    Ok(Verdict::Done(sa))
}

/// 将最后两个未读资源标记为已读，重新加载后 `seen` 为 true
pub(super) async fn mark_as_seen(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let handle = client.collection(collection)?;
    let unseen = handle.find_by(&[("seen", Value::Bool(false))]).await?;
    let skip = unseen.len().saturating_sub(2);
    let mut targets: Vec<Entity<'_>> = unseen.into_iter().skip(skip).collect();
    if targets.is_empty() {
        return Ok(Verdict::Skip(format!("{} 中没有未读资源", collection)));
    }

    let mut sa = SoftAssert::new();
    if params.from_detail {
        for entity in &targets {
            if let Err(e) = entity.run_action("mark_as_seen", None).await {
                sa.fail(format!("标记 {:?} 失败: {}", entity.href(), e));
            }
        }
    } else {
        let refs: Vec<ResourceRef> = targets.iter().map(ResourceRef::from).collect();
        let results = handle.action("mark_as_seen", &refs).await?;
        sa.check(
            results.iter().all(|r| r.success),
            format!("批量标记存在失败项: {:?}", results),
        );
    }

    for entity in targets.iter_mut() {
        entity.reload().await?;
        let seen = entity.get("seen").and_then(Value::as_bool);
        sa.eq(seen, Some(true), &format!("{:?} seen", entity.href()));
    }
    Ok(Verdict::Done(sa))
}
