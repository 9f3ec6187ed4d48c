//! Admin REST surface over HTTP.

use serde_json::Value;

mod common;

const CONFIG: &str = r#"
[admin]
api_key = "s3cret"

[[plugins]]
name = "shop"

[[plugins.heads]]
type = "static"
name = "cart"
path = "/cart"
content = "full cart"

[plugins.scenarios.empty-cart]
instructions = "The cart page shows the empty state"

[[plugins.scenarios.empty-cart.heads]]
type = "static"
path = "/cart"
content = "nothing here"
"#;

async fn admin_get(server: &common::TestServer, path: &str) -> (u16, Value) {
    let res = server
        .client
        .get(server.url(&format!("/hydra-admin/rest{path}")))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

async fn admin_post(server: &common::TestServer, path: &str, form: &[(&str, &str)]) -> (u16, Value) {
    let res = server
        .client
        .post(server.url(&format!("/hydra-admin/rest{path}")))
        .bearer_auth("s3cret")
        .form(form)
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

async fn cart(server: &common::TestServer) -> (u16, String) {
    let res = server.client.get(server.url("/cart")).send().await.unwrap();
    (res.status().as_u16(), res.text().await.unwrap())
}

#[tokio::test]
async fn test_requires_api_key() {
    let server = common::start_server(CONFIG).await;
    let res = server
        .client
        .get(server.url("/hydra-admin/rest/plugins"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(res.headers()["www-authenticate"], "Bearer");
}

#[tokio::test]
async fn test_plugin_listing() {
    let server = common::start_server(CONFIG).await;
    let (status, body) = admin_get(&server, "/plugins/shop").await;
    assert_eq!(status, 200);
    assert_eq!(body["heads"][0]["name"], "cart");
    assert_eq!(body["heads"][0]["type"], "static");
    assert_eq!(body["heads"][0]["attached"], true);
    assert_eq!(body["scenarios"][0]["name"], "empty-cart");
    assert_eq!(body["scenarios"][0]["active"], false);
}

#[tokio::test]
async fn test_scenario_overrides_and_restores_heads() {
    let server = common::start_server(CONFIG).await;
    assert_eq!(cart(&server).await, (200, "full cart".to_string()));

    let (status, current) = admin_post(&server, "/plugins/shop/scenarios/empty-cart", &[("active", "true")]).await;
    assert_eq!(status, 200);
    assert_eq!(current["scenario"], "empty-cart");
    assert_eq!(cart(&server).await, (200, "nothing here".to_string()));

    let (_, current) = admin_get(&server, "/current-scenario").await;
    assert_eq!(current, serde_json::json!({"plugin": "shop", "scenario": "empty-cart"}));

    let (status, _) = admin_post(&server, "/plugins/shop/scenarios/empty-cart", &[("active", "false")]).await;
    assert_eq!(status, 200);
    assert_eq!(cart(&server).await, (200, "full cart".to_string()));

    let (_, results) = admin_get(&server, "/test-results").await;
    assert_eq!(results["shop"]["empty-cart"]["passes"], serde_json::json!([]));
    assert_eq!(results["shop"]["empty-cart"]["failures"], serde_json::json!([]));
}

#[tokio::test]
async fn test_unknown_scenario_is_404() {
    let server = common::start_server(CONFIG).await;
    let (status, body) = admin_post(&server, "/plugins/shop/scenarios/nope", &[("active", "true")]).await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_detach_and_reattach_head() {
    let server = common::start_server(CONFIG).await;

    let (status, head) = admin_post(&server, "/plugins/shop/heads/cart", &[("attached", "false")]).await;
    assert_eq!(status, 200);
    assert_eq!(head["attached"], false);
    assert_eq!(cart(&server).await.0, 404);

    let (status, _) = admin_post(&server, "/plugins/shop/heads/cart", &[("attached", "false")]).await;
    assert_eq!(status, 409);

    let (status, _) = admin_post(&server, "/plugins/shop/heads/cart", &[("attached", "true")]).await;
    assert_eq!(status, 200);
    assert_eq!(cart(&server).await.0, 200);
}
