//! 日期时间过滤检查
//!
//! 以集合中间位置的资源为基准，分别用 `<`、`>`、`=` 过滤。期望 `=` 有匹配、
//! `>` 严格大于基准；不满足时在失败信息中标注已知缺陷。

use atp_restapi::capability::DEFECT_DATETIME_FILTER;
use atp_restapi::{Entity, Filter, FilterOp, Query, RestClient, SortOrder};
use chrono::{DateTime, NaiveDate, Utc};

use super::{CheckParams, CheckResult, Verdict};
use crate::assert::SoftAssert;

const DEFAULT_FIELD: &str = "created_on";
const MIN_RESOURCES: usize = 4;

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn datetime_of(entity: &Entity<'_>, field: &str) -> Option<DateTime<Utc>> {
    entity.get_str(field).and_then(parse_datetime)
}

fn defect_note(client: &RestClient) -> String {
    match client.capabilities() {
        Ok(caps) if caps.defect_applies(DEFECT_DATETIME_FILTER, None) => {
            format!(" (已知缺陷 {})", DEFECT_DATETIME_FILTER)
        }
        _ => String::new(),
    }
}

/// 取中间位置的资源作为基准
async fn baseline(client: &RestClient, collection: &str, field: &str) -> atp_restapi::Result<Option<String>> {
    let mut handle = client.collection(collection)?;
    handle.reload().await?;
    if handle.len() < MIN_RESOURCES {
        return Ok(None);
    }
    Ok(handle
        .entity_at(handle.len() / 2)
        .and_then(|e| e.get_str(field).map(str::to_string)))
}

pub(super) async fn datetime_filtering(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let field = params.attribute.as_deref().unwrap_or(DEFAULT_FIELD);
    let Some(raw) = baseline(client, collection, field).await? else {
        return Ok(Verdict::Skip(format!("{} 中资源不足 {} 个", collection, MIN_RESOURCES)));
    };
    let Some(base) = parse_datetime(&raw) else {
        return Ok(Verdict::Skip(format!("{} 不是日期时间: {}", field, raw)));
    };

    let handle = client.collection(collection)?;
    let filtered = |op| {
        Query::expanded()
            .attribute(field)
            .sort_by(field, SortOrder::Asc)
            .filter(Filter::datetime(field, op, &base))
    };
    let older = handle.query(&filtered(FilterOp::Lt)).await?.entities;
    let newer = handle.query(&filtered(FilterOp::Gt)).await?.entities;
    let matching = handle.query(&filtered(FilterOp::Eq)).await?.entities;

    let note = defect_note(client);
    let mut sa = SoftAssert::new();
    sa.check(
        !matching.is_empty(),
        format!("{}={} 没有匹配{}", field, raw, note),
    );
    if let Some(last_older) = older.last() {
        sa.check(
            datetime_of(last_older, field).is_some_and(|t| t < base),
            format!("{}<{} 返回了不早于基准的资源", field, raw),
        );
    }
    if let Some(first_newer) = newer.first() {
        sa.check(
            datetime_of(first_newer, field).is_some_and(|t| t > base),
            format!("{}>{} 返回了不晚于基准的资源{}", field, raw, note),
        );
    }
    Ok(Verdict::Done(sa))
}

pub(super) async fn date_filtering(
    client: &RestClient,
    collection: &str,
    params: &CheckParams,
) -> CheckResult {
    let field = params.attribute.as_deref().unwrap_or(DEFAULT_FIELD);
    let Some(raw) = baseline(client, collection, field).await? else {
        return Ok(Verdict::Skip(format!("{} 中资源不足 {} 个", collection, MIN_RESOURCES)));
    };
    let Some(base) = parse_datetime(&raw) else {
        return Ok(Verdict::Skip(format!("{} 不是日期时间: {}", field, raw)));
    };
    let day: NaiveDate = base.date_naive();

    let handle = client.collection(collection)?;
    let filtered = |op| {
        Query::expanded()
            .attribute(field)
            .sort_by(field, SortOrder::Desc)
            .filter(Filter::date(field, op, day))
    };
    let older = handle.query(&filtered(FilterOp::Lt)).await?.entities;
    let newer = handle.query(&filtered(FilterOp::Gt)).await?.entities;
    let matching = handle.query(&filtered(FilterOp::Eq)).await?.entities;

    let mut sa = SoftAssert::new();
    sa.check(!matching.is_empty(), format!("{}={} 没有匹配", field, day));
    if let Some(last_newer) = newer.last() {
        sa.check(
            datetime_of(last_newer, field).is_some_and(|t| t > base),
            format!("{}>{} 返回了不晚于基准的资源", field, day),
        );
    }
    if let Some(first_older) = older.first() {
        sa.check(
            datetime_of(first_older, field).is_some_and(|t| t < base),
            format!("{}<{} 返回了不早于基准的资源", field, day),
        );
    }
    Ok(Verdict::Done(sa))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime() {
        let dt = parse_datetime("2018-03-01T10:20:30Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2018-03-01T10:20:30+00:00");
        assert!(parse_datetime("2018-03-01").is_none());
    }
}
