//! 集合查询相关检查

use atp_restapi::action::verify_collection_actions;
use atp_restapi::envelope::{self, expected_links, expected_pages, expected_subcount, PagingLinks};
use atp_restapi::{Feature, Filter, Query, RestClient, SortOrder};

use super::{numeric_id, CheckParams, CheckResult, Verdict};
use crate::assert::SoftAssert;

/// 加载集合并遍历所有资源
pub(super) async fn query_simple(client: &RestClient, collection: &str) -> CheckResult {
    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    let mut sa = SoftAssert::new();
    let entities = handle.entities();
    sa.check(
        entities.iter().all(|e| e.id().is_some()),
        format!("{} 中存在没有 id 的资源", collection),
    );
    Ok(Verdict::Done(sa))
}

/// 集合级操作只能是 POST；资源级操作 (如 DELETE) 不在此列
pub(super) async fn actions_are_post(client: &RestClient, collection: &str) -> CheckResult {
    let handle = client.collection(collection)?;
    let body = envelope::read(client.get(handle.href()).await?)?;
    let mut sa = SoftAssert::new();
    if let atp_restapi::Body::Paged(envelope) = body {
        if let Err(e) = verify_collection_actions(collection, &envelope.actions) {
            sa.fail(e.to_string());
        }
    }
    Ok(Verdict::Done(sa))
}

pub(super) async fn query_with_api_version(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let version = match &params.version {
        Some(v) => v.clone(),
        None => match client.entry()?.versions.first() {
            Some(v) => v.name.clone(),
            None => return Ok(Verdict::Skip("入口文档没有版本列表".to_string())),
        },
    };
    let versioned = client.versioned(&version).await?;
    let mut handle = versioned.collection(collection)?;
    handle.reload().await?;
    let mut sa = SoftAssert::new();
    sa.check(
        handle.href().contains(&version),
        format!("{} 的地址不在版本 {} 入口下: {}", collection, version, handle.href()),
    );
    Ok(Verdict::Done(sa))
}

/// `attributes=id` 时资源只包含 `id`，以及存在时的 `href`/`fqname`
pub(super) async fn select_attributes(client: &RestClient, collection: &str) -> CheckResult {
    let handle = client.collection(collection)?;
    let page = handle.query(&Query::expanded().attribute("id")).await?;
    let mut sa = SoftAssert::new();
    for resource in page.envelope.resources() {
        if !sa.check(resource.contains_key("id"), format!("{} 资源缺少 id", collection)) {
            continue;
        }
        let mut expected = 1;
        if resource.contains_key("href") {
            expected += 1;
        }
        if resource.contains_key("fqname") {
            expected += 1;
        }
        sa.eq(
            resource.len(),
            expected,
            &format!("{} 资源属性数量 {:?}", collection, resource.keys().collect::<Vec<_>>()),
        );
    }
    Ok(Verdict::Done(sa))
}

/// `href == <collection_href>/<id>`，`href_slug == <collection>/<id>`
pub(super) async fn attributes_present(client: &RestClient, collection: &str) -> CheckResult {
    let handle = client.collection(collection)?;
    let page = handle
        .query(&Query::expanded().attributes(["href", "id", "href_slug"]))
        .await?;
    let check_slug = client.capabilities()?.supports(Feature::HrefSlug);

    let mut sa = SoftAssert::new();
    for entity in &page.entities {
        let Some(id) = entity.id() else {
            sa.fail(format!("{} 资源缺少 id", collection));
            continue;
        };
        match entity.get_str("href") {
            Some(href) => {
                sa.eq(href.to_string(), format!("{}/{}", handle.href(), id), "href");
            }
            None => sa.fail(format!("{}/{} 缺少 href", collection, id)),
        }
        if check_slug {
            match entity.href_slug() {
                Some(slug) => {
                    sa.eq(slug.to_string(), format!("{}/{}", collection, id), "href_slug");
                }
                None => sa.fail(format!("{}/{} 缺少 href_slug", collection, id)),
            }
        }
    }
    Ok(Verdict::Done(sa))
}

pub(super) async fn http_options(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let options = client.collection(collection)?.options().await?;
    let mut sa = SoftAssert::new();
    sa.check(
        !options.attributes.is_empty(),
        format!("OPTIONS {} 没有 attributes", collection),
    );
    let expected = params.attribute.as_deref().unwrap_or("id");
    sa.check(
        options.attributes.iter().any(|a| a == expected),
        format!("OPTIONS {} 的 attributes 不包含 {}", collection, expected),
    );
    Ok(Verdict::Done(sa))
}

pub(super) async fn options_node_types(client: &RestClient, collection: &str) -> CheckResult {
    let options = client.collection(collection)?.options().await?;
    let mut sa = SoftAssert::new();
    sa.check(
        options.data.contains_key("node_types"),
        format!("OPTIONS {} 的 data 不包含 node_types", collection),
    );
    Ok(Verdict::Done(sa))
}

pub(super) async fn options_subcollections(client: &RestClient, collection: &str) -> CheckResult {
    let options = client.collection(collection)?.options().await?;
    let mut sa = SoftAssert::new();
    sa.check(
        options.subcollections.iter().any(|s| s == "tags"),
        format!("OPTIONS {} 的 subcollections 不包含 tags", collection),
    );
    Ok(Verdict::Done(sa))
}

/// `hide=resources` 隐藏资源数组，`subcount` 不变
pub(super) async fn resources_hiding(client: &RestClient, collection: &str) -> CheckResult {
    let handle = client.collection(collection)?;
    let filter = Filter::eq("read_only", "true");

    let visible = handle.query(&Query::new().filter(filter.clone())).await?;
    let hidden = handle
        .query(&Query::new().filter(filter).hide("resources"))
        .await?;

    let mut sa = SoftAssert::new();
    sa.check(visible.envelope.has_resources(), "未隐藏时缺少 resources");
    sa.check(!hidden.envelope.has_resources(), "hide=resources 时仍返回 resources");
    sa.eq(
        hidden.envelope.subcount(),
        visible.envelope.subcount(),
        "隐藏前后 subcount",
    );
    Ok(Verdict::Done(sa))
}

/// 按 id 升序与降序，结果顺序相反
pub(super) async fn sorting_by_attributes(client: &RestClient, collection: &str) -> CheckResult {
    let handle = client.collection(collection)?;
    let query = |order| Query::expanded().attribute("id").sort_by("id", order);
    let asc = handle.query(&query(SortOrder::Asc)).await?;
    let desc = handle.query(&query(SortOrder::Desc)).await?;

    let mut sa = SoftAssert::new();
    sa.check(asc.envelope.has_resources(), "升序结果缺少 resources");
    sa.check(desc.envelope.has_resources(), "降序结果缺少 resources");
    sa.eq(asc.envelope.subcount(), desc.envelope.subcount(), "升序/降序 subcount");

    let asc_ids: Vec<Option<u64>> = asc.entities.iter().map(numeric_id).collect();
    let desc_ids: Vec<Option<u64>> = desc.entities.iter().map(numeric_id).collect();
    sa.check(
        asc_ids.windows(2).all(|w| w[0] < w[1]),
        format!("升序结果不是递增: {:?}", asc_ids),
    );
    sa.check(
        desc_ids.windows(2).all(|w| w[0] > w[1]),
        format!("降序结果不是递减: {:?}", desc_ids),
    );
    let mut reversed = desc_ids.clone();
    reversed.reverse();
    sa.eq(asc_ids, reversed, "降序结果反转后与升序一致");
    Ok(Verdict::Done(sa))
}

/// 分页信封
///
/// `limit=0` 必须返回 `Api::BadRequestError`；其余情况校验 subcount、pages 和各链接的偏移。
pub(super) async fn paging(client: &RestClient, collection: &str, params: &CheckParams) -> CheckResult {
    let limit = params.limit.unwrap_or(11);
    let offset = params.offset.unwrap_or(0);
    let handle = client.collection(collection)?;
    let mut sa = SoftAssert::new();

    if limit == 0 {
        let pairs = vec![
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
        ];
        match client.get_with(handle.href(), &pairs).await {
            Ok(_) => sa.fail("limit=0 没有返回错误"),
            Err(e) => {
                sa.check(
                    e.is_bad_request() && e.matches("Api::BadRequestError"),
                    format!("limit=0 期望 Api::BadRequestError，实际: {}", e),
                );
            }
        }
        return Ok(Verdict::Done(sa));
    }

    let page = handle.query(&Query::new().page(limit, offset)).await?;
    let envelope = &page.envelope;
    let count = envelope.count();
    let subcount = expected_subcount(count, limit, offset);

    sa.eq(envelope.subcount(), subcount, "subcount");
    sa.eq(envelope.resources().len() as u64, subcount, "resources 数量");
    sa.eq(envelope.pages, Some(expected_pages(count, limit)), "pages");

    let Some(links) = &envelope.links else {
        sa.fail("响应缺少 links");
        return Ok(Verdict::Done(sa));
    };
    let expected = expected_links(count, limit, offset);
    let offset_of = |link: &Option<String>| link.as_deref().and_then(PagingLinks::offset_of);
    let limit_of = |link: &Option<String>| link.as_deref().and_then(PagingLinks::limit_of);

    sa.eq(offset_of(&links.self_link), Some(expected.self_offset), "links.self offset");
    sa.eq(limit_of(&links.self_link), Some(limit), "links.self limit");
    sa.eq(offset_of(&links.first), Some(expected.first_offset), "links.first offset");
    sa.eq(offset_of(&links.last), Some(expected.last_offset), "links.last offset");
    sa.eq(offset_of(&links.next), expected.next_offset, "links.next offset");
    sa.eq(offset_of(&links.previous), expected.previous_offset, "links.previous offset");
    Ok(Verdict::Done(sa))
}

/// 未指定类名时依次检查的基础设施供应商
const VM_VENDORS: &[&str] = &["Microsoft", "Redhat", "Vmware"];

fn infra_vm_class(vendor: &str) -> String {
    format!("ManageIQ::Providers::{}::InfraManager::Vm", vendor)
}

/// 按类型收窄后所有资源类型一致
///
/// 集合第一个资源就是该类型时，收窄结果不能为空。
pub(super) async fn collection_class_valid(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let classes: Vec<String> = match &params.collection_class {
        Some(class) => vec![class.clone()],
        None => VM_VENDORS.iter().map(|v| infra_vm_class(v)).collect(),
    };
    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    let first_type = handle
        .entity_at(0)
        .and_then(|e| e.get_str("type").map(str::to_string));

    let mut sa = SoftAssert::new();
    for class in &classes {
        let page = handle
            .query(&Query::expanded().collection_class(class.as_str()))
            .await?;
        if first_type.as_deref() == Some(class.as_str()) {
            sa.check(page.envelope.count() > 0, format!("{} 类型的资源数量为 0", class));
        }
        for entity in page.entities.iter().take(5) {
            sa.eq(entity.get_str("type"), Some(class.as_str()), "资源类型");
        }
    }
    Ok(Verdict::Done(sa))
}

pub(super) async fn collection_class_invalid(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let class = params
        .collection_class
        .as_deref()
        .unwrap_or("ManageIQ::Providers::Nonexistent::Vm");
    let expected = params
        .expected_error
        .as_deref()
        .unwrap_or("Invalid collection_class");

    let handle = client.collection(collection)?;
    let mut sa = SoftAssert::new();
    match handle.query(&Query::new().collection_class(class)).await {
        Ok(_) => sa.fail(format!("无效 collection_class {} 没有报错", class)),
        Err(e) => {
            sa.check(e.matches(expected), format!("期望错误 `{}`，实际: {}", expected, e));
        }
    }
    Ok(Verdict::Done(sa))
}
