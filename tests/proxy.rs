//! Proxy heads forwarding to a live upstream.

mod common;

#[tokio::test]
async fn test_proxy_forwards_below_mount() {
    let backend = common::start_echo_backend("upstream").await;
    let server = common::start_server(&format!(
        r#"
        [[plugins]]
        name = "api"

        [[plugins.heads]]
        type = "proxy"
        name = "upstream"
        path = "/api"
        proxy_to = "http://{backend}/v1"
        "#
    ))
    .await;

    let res = server
        .client
        .get(server.url("/api/users?page=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-backend"], "upstream");
    assert!(res.headers().get("connection").is_none());
    assert_eq!(res.text().await.unwrap(), "upstream GET /v1/users?page=2");

    let res = server.client.post(server.url("/api")).body("x").send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "upstream POST /v1");
}

#[tokio::test]
async fn test_unreachable_upstream_is_502() {
    // bind then drop to get a port nobody listens on
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let server = common::start_server(&format!(
        r#"
        [[plugins]]
        name = "api"

        [[plugins.heads]]
        type = "proxy"
        path = "/api"
        proxy_to = "http://{closed}"
        "#
    ))
    .await;

    let res = server.client.get(server.url("/api/anything")).send().await.unwrap();
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_repeated_upstream_headers_are_preserved() {
    let backend = common::start_raw_backend(
        "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
    )
    .await;
    let server = common::start_server(&format!(
        r#"
        [[plugins]]
        name = "api"

        [[plugins.heads]]
        type = "proxy"
        path = "/api"
        proxy_to = "http://{backend}"
        "#
    ))
    .await;

    let res = server.client.get(server.url("/api/login")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let cookies: Vec<_> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
    assert_eq!(res.text().await.unwrap(), "ok");
}
