use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use flow_resource::apps::App;
use flow_resource::config::{AppConfig, ManagerSettings, ResourceConfig};
use flow_resource::decode::{FLOW_COMPRESSED_HEADER, GzipSniffing, zip, zip_and_encode};
use flow_resource::flow::{FlowManager, Origin, ResourceError};
use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;
use tempfile::TempDir;

fn order_flow() -> serde_json::Value {
    json!({
        "name": "order",
        "model": "simple",
        "attributes": [{ "name": "limit", "type": "integer", "value": 10 }],
        "rootTask": {
            "id": "root",
            "tasks": [
                { "id": "check", "activityRef": "log" },
                { "id": "ship", "activityRef": "rest" }
            ],
            "links": [{ "type": 1, "from": "check", "to": "ship", "value": "amount <= limit" }]
        }
    })
}

#[tokio::test]
async fn test_res_uri_returns_preloaded_instance() {
    let mgr = FlowManager::new(None);
    let config: ResourceConfig =
        serde_json::from_value(json!({ "id": "main", "data": order_flow() })).unwrap();
    mgr.load_resource(&config).unwrap();

    let via_uri = mgr.get_flow("res://main").await.unwrap().unwrap();
    let direct = mgr.get_resource("main").unwrap();
    assert!(Arc::ptr_eq(&via_uri, &direct));
    assert!(mgr.get_flow("res://other").await.unwrap().is_none());
    assert_eq!(mgr.remote_flow_count(), 0);
}

#[tokio::test]
async fn test_link_expression_evaluates_against_scope() {
    let mgr = FlowManager::new(None);
    let data = zip_and_encode(order_flow().to_string().as_bytes()).unwrap();
    let config: ResourceConfig =
        serde_json::from_value(json!({ "id": "flow:order", "compressed": true, "data": data }))
            .unwrap();
    mgr.load_resource(&config).unwrap();

    let def = mgr.get_flow("res://flow:order").await.unwrap().unwrap();
    let link = def.get_link(0).unwrap();
    let exprs = def.link_expr_manager().unwrap();

    let scope = HashMap::from([("amount".to_string(), json!(5)), ("limit".to_string(), json!(10))]);
    assert!(exprs.eval_link_expr(link, &scope).unwrap());
    let scope = HashMap::from([("amount".to_string(), json!(50)), ("limit".to_string(), json!(10))]);
    assert!(!exprs.eval_link_expr(link, &scope).unwrap());
}

#[tokio::test]
async fn test_unreachable_host_is_not_cached() {
    let mgr = FlowManager::new(None);
    let uri = "http://unreachable.invalid/flow";

    let err = mgr.get_flow(uri).await.unwrap_err();
    assert!(matches!(err, ResourceError::Transport { .. }), "got {err:?}");
    assert_eq!(err.origin(), &Origin::Uri(uri.to_string()));
    assert!(!mgr.is_cached(uri));

    assert!(mgr.get_flow(uri).await.is_err());
}

#[tokio::test]
async fn test_file_uri_is_loaded_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("order.json");
    fs::write(&path, order_flow().to_string()).unwrap();
    let uri = format!("file://{}", path.display());

    let mgr = FlowManager::new(None);
    let first = mgr.get_flow(&uri).await.unwrap().unwrap();
    assert_eq!(first.name(), "order");
    assert_eq!(first.get_attribute("limit").unwrap().value, Some(json!(10)));

    // the cached definition survives the file going away
    fs::remove_file(&path).unwrap();
    let second = mgr.get_flow(&uri).await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_standard_sniffing_reads_gzip_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("order.json.gz");
    fs::write(&path, zip(order_flow().to_string().as_bytes()).unwrap()).unwrap();
    let uri = format!("file://{}", path.display());

    let settings = ManagerSettings {
        gzip_sniffing: GzipSniffing::Standard,
        ..Default::default()
    };
    let app = App::bootstrap(&settings, None, None).unwrap();
    let def = app.flow_manager().get_flow(&uri).await.unwrap().unwrap();
    assert_eq!(def.name(), "order");
}

#[tokio::test]
async fn test_remote_flow_fetched_once() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/flows/order");
            then.status(200)
                .header(FLOW_COMPRESSED_HEADER, "TRUE")
                .body(zip_and_encode(order_flow().to_string().as_bytes()).unwrap());
        })
        .await;

    let mgr = FlowManager::new(None);
    let uri = server.url("/flows/order");
    let first = mgr.get_flow(&uri).await.unwrap().unwrap();
    let second = mgr.get_flow(&uri).await.unwrap().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(mock.hits_async().await, 1);
    assert!(mgr.is_cached(&uri));
}

#[tokio::test]
async fn test_remote_status_error_then_recovery() {
    let server = MockServer::start_async().await;
    let mut missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/flows/late");
            then.status(404);
        })
        .await;

    let mgr = FlowManager::new(None);
    let uri = server.url("/flows/late");
    let err = mgr.get_flow(&uri).await.unwrap_err();
    assert_eq!(
        err,
        ResourceError::Status {
            origin: Origin::Uri(uri.clone()),
            status: 404
        }
    );

    missing.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/flows/late");
            then.status(200).json_body(order_flow());
        })
        .await;

    let def = mgr.get_flow(&uri).await.unwrap().unwrap();
    assert_eq!(def.name(), "order");
}

#[tokio::test]
async fn test_app_descriptor_bootstrap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.json");
    fs::write(
        &path,
        json!({
            "name": "shop",
            "version": "2.1.0",
            "resources": [
                { "id": "flow:order", "data": order_flow() },
                { "id": "flow:packed", "compressed": true,
                  "data": zip_and_encode(order_flow().to_string().as_bytes()).unwrap() },
                { "id": "activity:log", "data": { "ref": "log" } }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.version.as_deref(), Some("2.1.0"));

    let app = App::bootstrap(&ManagerSettings::default(), Some(&config), None).unwrap();
    let mgr = app.flow_manager();
    let mut ids = mgr.resource_ids();
    ids.sort();
    assert_eq!(ids, vec!["flow:order".to_string(), "flow:packed".to_string()]);
    assert!(mgr.get_flow("res://flow:packed").await.unwrap().is_some());
}
