//! 入口文档相关检查

use atp_restapi::{Body, Query, RestClient};
use serde_json::Value;

use super::{CheckResult, Verdict};
use crate::assert::SoftAssert;

pub(super) fn server_info(client: &RestClient) -> CheckResult {
    let info = client.server_info()?;
    let mut sa = SoftAssert::new();
    sa.check(!info.version.is_empty(), "server_info 缺少 version");
    sa.check(!info.build.is_empty(), "server_info 缺少 build");
    sa.check(info.appliance.is_some(), "server_info 缺少 appliance");
    Ok(Verdict::Done(sa))
}

/// 服务器、区域和地域链接都能获取到带 `id` 的资源
pub(super) async fn server_info_hrefs(client: &RestClient) -> CheckResult {
    let info = client.server_info()?.clone();
    let mut sa = SoftAssert::new();
    let items = [
        ("server_href", info.server_href),
        ("zone_href", info.zone_href),
        ("region_href", info.region_href),
    ];
    for (name, href) in items {
        let Some(href) = href else {
            sa.fail(format!("server_info 缺少 {}", name));
            continue;
        };
        match client.get(&href).await {
            Ok(body) => {
                sa.check(body.get("id").is_some(), format!("{} 指向的资源没有 id", name));
            }
            Err(e) => sa.fail(format!("{} 请求失败: {}", name, e)),
        }
    }
    Ok(Verdict::Done(sa))
}

pub(super) async fn default_region(client: &RestClient, collection: &str) -> CheckResult {
    let mut regions = client.collection(collection)?;
    regions.reload().await?;
    let mut sa = SoftAssert::new();
    match regions.entity_at(0) {
        Some(mut region) => {
            region.reload().await?;
            sa.check(region.get("guid").is_some(), "默认地域缺少 guid");
            sa.check(region.get("region").is_some(), "默认地域缺少 region");
        }
        None => sa.fail("没有任何地域"),
    }
    Ok(Verdict::Done(sa))
}

pub(super) fn product_info(client: &RestClient) -> CheckResult {
    let info = client.product_info()?;
    let mut sa = SoftAssert::new();
    sa.check(!info.name.is_empty(), "product_info 缺少 name");
    sa.check(info.name_full.is_some(), "product_info 缺少 name_full");
    sa.check(info.copyright.is_some(), "product_info 缺少 copyright");
    sa.check(info.support_website.is_some(), "product_info 缺少 support_website");
    sa.check(
        info.support_website_text.is_some(),
        "product_info 缺少 support_website_text",
    );
    Ok(Verdict::Done(sa))
}

pub(super) fn identity(client: &RestClient) -> CheckResult {
    let identity = client.identity()?;
    let mut sa = SoftAssert::new();
    sa.check(!identity.userid.is_empty(), "identity 缺少 userid");
    sa.check(identity.name.is_some(), "identity 缺少 name");
    sa.check(identity.group.is_some(), "identity 缺少 group");
    sa.check(identity.role.is_some(), "identity 缺少 role");
    sa.check(identity.tenant.is_some(), "identity 缺少 tenant");
    Ok(Verdict::Done(sa))
}

pub(super) fn user_settings(client: &RestClient) -> CheckResult {
    let mut sa = SoftAssert::new();
    sa.check(
        matches!(client.settings()?, Value::Object(_)),
        "settings 不是对象",
    );
    Ok(Verdict::Done(sa))
}

/// `settings` 集合没有 `resources`，直接返回 `product`/`prototype`
pub(super) async fn settings_collection(client: &RestClient, collection: &str) -> CheckResult {
    let settings = client.collection(collection)?;
    let mut sa = SoftAssert::new();
    match settings.fetch(&Query::new()).await? {
        Body::Flat(map) => {
            for key in ["product", "prototype"] {
                sa.check(map.contains_key(key), format!("settings 缺少 {}", key));
            }
        }
        Body::Paged(_) => sa.fail("settings 返回了分页信封"),
    }
    Ok(Verdict::Done(sa))
}

pub(super) async fn ping(client: &RestClient) -> CheckResult {
    let body = client.ping().await?;
    let mut sa = SoftAssert::new();
    sa.eq(body.as_str(), "pong", "/ping 响应");
    Ok(Verdict::Done(sa))
}
