//! 集合查询、分页与批量操作集成测试

mod common;

use atp_restapi::envelope::{expected_links, expected_pages, expected_subcount, PagingLinks};
use atp_restapi::{Body, Feature, Query, ResourceRef, RestError, SortOrder};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::{api_error, appliance, connect, TOKEN};

// ============================================
// 入口与能力协商
// ============================================

#[tokio::test]
async fn test_connect_loads_entry_point() {
    let server = appliance("5.9.0.22").await;
    let client = connect(&server).await;

    assert!(client.collection_names().contains(&"users"));
    assert_eq!(client.server_info().unwrap().version, "5.9.0.22");
    assert_eq!(client.identity().unwrap().userid, "admin");
    assert_eq!(client.product_info().unwrap().name, "ManageIQ");
    assert!(client.capabilities().unwrap().supports(Feature::Ping));
    assert!(!client.capabilities().unwrap().supports(Feature::ArbitrationCollections));

    let err = client.collection("no_such_collection").unwrap_err();
    assert!(matches!(err, RestError::Unsupported(_)));
}

#[tokio::test]
async fn test_versioned_entry_point() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    let mut doc = common::entry_point(&base, "5.9.0.22");
    doc["collections"] = json!([
        {"name": "users", "href": format!("{}/api/v3.0.0/users", base), "description": "Users"}
    ]);
    Mock::given(method("GET"))
        .and(path("/api/v3.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3.0.0/users"))
        .and(query_param("expand", "resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "users", "count": 1, "subcount": 1,
            "resources": [{"id": "1", "href": format!("{}/api/v3.0.0/users/1", base)}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let versioned = client.versioned("3.0.0").await.unwrap();
    assert!(versioned.entry_point().ends_with("/api/v3.0.0"));

    let mut users = versioned.collection("users").unwrap();
    users.reload().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users.count(), 1);

    assert!(client.versioned("9.9.9").await.is_err());
}

#[tokio::test]
async fn test_ping() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    assert_eq!(client.ping().await.unwrap(), "pong");
}

// ============================================
// 查询与分页
// ============================================

#[tokio::test]
async fn test_reload_replaces_cache_in_order() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("expand", "resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "users", "count": 3, "subcount": 3,
            "resources": [
                {"id": "3", "href": format!("{}/api/users/3", base)},
                {"id": "1", "href": format!("{}/api/users/1", base)},
                {"id": "2", "href": format!("{}/api/users/2", base)}
            ],
            "actions": [{"name": "create", "method": "post", "href": format!("{}/api/users", base)}]
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let mut users = client.collection("users").unwrap();
    users.reload().await.unwrap();

    let ids: Vec<String> = users.entities().iter().filter_map(|e| e.id()).collect();
    assert_eq!(ids, vec!["3", "1", "2"]);
    assert_eq!(users.last().unwrap().id().as_deref(), Some("2"));
    assert!(users.verify_actions().is_ok());
}

#[tokio::test]
async fn test_paging_envelope() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    let resources: Vec<_> = (14..=24).map(|i| json!({"id": i.to_string()})).collect();
    Mock::given(method("GET"))
        .and(path("/api/features"))
        .and(query_param("limit", "11"))
        .and(query_param("offset", "13"))
        .and(query_param("expand", "resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "features", "count": 50, "subcount": 11, "pages": 5,
            "resources": resources,
            "links": {
                "self": format!("{}/api/features?limit=11&offset=13", base),
                "next": format!("{}/api/features?limit=11&offset=24", base),
                "previous": format!("{}/api/features?limit=11&offset=2", base),
                "first": format!("{}/api/features?limit=11&offset=0", base),
                "last": format!("{}/api/features?limit=11&offset=44", base)
            }
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let features = client.collection("features").unwrap();
    let page = features
        .query(&Query::expanded().page(11, 13))
        .await
        .unwrap();

    let envelope = &page.envelope;
    let count = envelope.count();
    assert_eq!(envelope.subcount(), expected_subcount(count, 11, 13));
    assert_eq!(envelope.pages, Some(expected_pages(count, 11)));
    assert_eq!(page.entities.len(), 11);

    let expected = expected_links(count, 11, 13);
    let links = envelope.links.as_ref().unwrap();
    assert_eq!(
        links.next.as_deref().and_then(PagingLinks::offset_of),
        expected.next_offset
    );
    assert_eq!(
        links.previous.as_deref().and_then(PagingLinks::offset_of),
        expected.previous_offset
    );
    assert_eq!(
        links.last.as_deref().and_then(PagingLinks::offset_of),
        Some(expected.last_offset)
    );
}

#[tokio::test]
async fn test_limit_zero_is_rejected_locally() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("GET"))
        .and(path("/api/features"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let features = client.collection("features").unwrap();
    let err = features.query(&Query::new().page(0, 5)).await.unwrap_err();
    assert!(err.is_bad_request());
}

#[tokio::test]
async fn test_limit_zero_server_error() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("GET"))
        .and(path("/api/features"))
        .and(query_param("limit", "0"))
        .respond_with(api_error(
            400,
            "bad_request",
            "Api::BadRequestError",
            "Limit must be greater than zero if offset is specified",
        ))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let href = client.collection("features").unwrap().href().to_string();
    let pairs = vec![
        ("limit".to_string(), "0".to_string()),
        ("offset".to_string(), "0".to_string()),
    ];
    let err = client.get_with(&href, &pairs).await.unwrap_err();
    assert!(err.is_bad_request());
    assert!(err.matches("Api::BadRequestError"));
}

#[tokio::test]
async fn test_query_parameters_on_the_wire() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("sort_by", "name"))
        .and(query_param("sort_order", "desc"))
        .and(query_param("filter[]", "userid=admin"))
        .and(query_param("attributes", "id,name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "users", "count": 5, "subcount": 1,
            "resources": [{"id": "1", "name": "Administrator"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let users = client.collection("users").unwrap();
    let query = Query::new()
        .attributes(["id", "name"])
        .sort_by("name", SortOrder::Desc)
        .filter("userid=admin".parse().unwrap());
    let page = users.query(&query).await.unwrap();
    assert_eq!(page.ids(), vec!["1"]);
}

#[tokio::test]
async fn test_hidden_resources_keep_subcount() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("hide", "resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "users", "count": 5, "subcount": 5
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let page = client
        .collection("users")
        .unwrap()
        .query(&Query::new().hide("resources"))
        .await
        .unwrap();
    assert!(!page.envelope.has_resources());
    assert_eq!(page.envelope.subcount(), 5);
    assert!(page.entities.is_empty());
}

#[tokio::test]
async fn test_settings_is_flat() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product": {"maindb": "ExtManagementSystem"},
            "prototype": {"queue_type": "miq_queue"}
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let mut settings = client.collection("settings").unwrap();
    match settings.fetch(&Query::new()).await.unwrap() {
        Body::Flat(map) => {
            assert!(map.contains_key("product"));
            assert!(map.contains_key("prototype"));
        }
        Body::Paged(_) => panic!("settings 应为扁平结构"),
    }
    assert!(matches!(
        settings.reload().await.unwrap_err(),
        RestError::Unsupported(_)
    ));
}

// ============================================
// 批量操作
// ============================================

#[tokio::test]
async fn test_bulk_delete_reports_per_target() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    Mock::given(method("POST"))
        .and(path("/api/services"))
        .and(body_json(json!({
            "action": "delete",
            "resources": [
                {"href": format!("{}/api/services/1", base)},
                {"href": format!("{}/api/services/2", base)}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"success": false, "message": "Couldn't find Service with 'id'=1"},
                {"success": true, "message": "services id: 2 deleting",
                 "href": format!("{}/api/services/2", base)}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let services = client.collection("services").unwrap();
    let targets = vec![
        ResourceRef::href(format!("{}/api/services/1", base)),
        ResourceRef::href(format!("{}/api/services/2", base)),
    ];
    let results = services.delete(&targets).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(!results[0].success);
    assert!(results[0].message.as_deref().unwrap().contains("Couldn't find"));
    assert!(results[1].success);
}

#[tokio::test]
async fn test_results_count_mismatch_is_violation() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("POST"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"success": true}]
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let services = client.collection("services").unwrap();
    let err = services
        .delete(&[ResourceRef::id("1"), ResourceRef::id("2")])
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::ContractViolation(_)));
}

#[tokio::test]
async fn test_non_post_collection_action_is_flagged() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("expand", "resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "notifications", "count": 0, "subcount": 0, "resources": [],
            "actions": [
                {"name": "mark_as_seen", "method": "post", "href": format!("{}/api/notifications", base)},
                {"name": "delete", "method": "delete", "href": format!("{}/api/notifications", base)}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"success": true}]})))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let mut notifications = client.collection("notifications").unwrap();
    notifications.reload().await.unwrap();

    assert!(matches!(
        notifications.verify_actions().unwrap_err(),
        RestError::ContractViolation(_)
    ));
    assert!(matches!(
        notifications.delete(&[ResourceRef::id("1")]).await.unwrap_err(),
        RestError::ContractViolation(_)
    ));
}

#[tokio::test]
async fn test_bulk_query_keeps_criteria_order() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .and(body_json(json!({
            "action": "query",
            "resources": [
                {"id": "2"},
                {"name": "nobody", "userid": "nobody"},
                {"href": format!("{}/api/users/1", base)}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "2", "userid": "alice", "href": format!("{}/api/users/2", base)},
                {"success": false, "message": "Invalid users resource specified"},
                {"id": "1", "userid": "admin", "href": format!("{}/api/users/1", base)}
            ]
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let users = client.collection("users").unwrap();
    let criteria = vec![
        ResourceRef::id("2"),
        ResourceRef::field("name", "nobody").with("userid", "nobody"),
        ResourceRef::href(format!("{}/api/users/1", base)),
    ];
    let results = users.query_by(&criteria).await.unwrap();
    assert!(results[0].success && results[2].success);
    assert!(!results[1].success);

    let found = users.entities_from(&results);
    let ids: Vec<String> = found.iter().filter_map(|e| e.id()).collect();
    assert_eq!(ids, vec!["2", "1"]);
}

#[tokio::test]
async fn test_create_validation_failure_surfaces_message() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("POST"))
        .and(path("/api/pictures"))
        .respond_with(api_error(
            400,
            "bad_request",
            "Api::BadRequestError",
            "Failed to create Picture - Extension must be one of jpg, png or svg",
        ))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let pictures = client.collection("pictures").unwrap();
    let resource = json!({"extension": "bmp", "content": "aGVsbG8="});
    let err = pictures
        .create(vec![resource.as_object().cloned().unwrap()])
        .await
        .unwrap_err();
    assert!(err.is_bad_request());
    assert!(err.matches("Extension must be"));
}

#[tokio::test]
async fn test_create_then_fetch_round_trip() {
    let server = appliance("5.9.0.22").await;
    let base = server.uri();
    let created = json!({
        "id": "31", "href": format!("{}/api/users/31", base),
        "userid": "atp_user", "name": "ATP User", "email": "atp@example.com"
    });
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .and(body_json(json!({
            "action": "create",
            "resources": [{"userid": "atp_user", "name": "ATP User", "email": "atp@example.com"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [created.clone()]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let users = client.collection("users").unwrap();
    let fields = json!({"userid": "atp_user", "name": "ATP User", "email": "atp@example.com"});
    let results = users
        .create(vec![fields.as_object().cloned().unwrap()])
        .await
        .unwrap();
    assert!(results[0].is_resource());

    let entity = users.entities_from(&results).remove(0);
    let fetched = users.get_by_id(entity.id().unwrap().as_str()).await.unwrap();
    for (key, value) in fields.as_object().unwrap() {
        assert_eq!(fetched.get(key), Some(value), "{}", key);
    }
}

#[tokio::test]
async fn test_action_without_targets_sends_empty_list() {
    let server = appliance("5.9.0.22").await;
    Mock::given(method("POST"))
        .and(path("/api/notifications"))
        .and(body_json(json!({"action": "mark_all_seen", "resources": []})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let notifications = client.collection("notifications").unwrap();
    let results = notifications.action("mark_all_seen", &[]).await.unwrap();
    assert!(results.is_empty());
}
