//! Request dispatch and failure containment.

use futures_util::future::{BoxFuture, FutureExt};
use metrics::counter;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::dispatch::{Hydra, Next};
use crate::model::{Request, Response};
use crate::registry::{HeadCursor, HeadMatch};

impl Hydra {
    /// Dispatch a request from the top of the registry.
    pub fn handle(self: &Arc<Self>, req: Request, res: Response) -> BoxFuture<'static, ()> {
        self.dispatch(req, res, None)
    }

    /// Dispatch a request, matching only heads after `after`.
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        mut req: Request,
        res: Response,
        after: Option<HeadCursor>,
    ) -> BoxFuture<'static, ()> {
        let hydra = self.clone();

        async move {
            let Some(matched) = hydra.head_for_path(&req, after.as_ref()) else {
                not_found(&hydra, &req, &res);
                return;
            };

            matched.head.bind_params(&mut req);
            res.set_status(200);
            counter!(
                "hydra_dispatch_total",
                "plugin" => matched.plugin.clone(),
                "head" => matched.head.name().to_string()
            )
            .increment(1);
            tracing::debug!(
                hydra = %hydra.name(),
                plugin = %matched.plugin,
                head = %matched.head.name(),
                method = %req.method,
                path = %req.path(),
                "Dispatching to head"
            );

            let next = Next::new(hydra.clone(), matched.cursor());
            let head = matched.head.clone();
            let sink = res.clone();
            // the handler is invoked inside the future so a panic while
            // building it is caught too
            let outcome = AssertUnwindSafe(async move { head.handle(req, sink, next).await })
                .catch_unwind()
                .await;

            let failure = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            handler_failed(&matched, &res, &failure);
        }
        .boxed()
    }
}

fn not_found(hydra: &Hydra, req: &Request, res: &Response) {
    counter!("hydra_not_found_total").increment(1);
    tracing::debug!(hydra = %hydra.name(), method = %req.method, path = %req.path(), "No head matched");
    res.set_status(404);
    if let Err(e) = res.send("Not Found") {
        tracing::warn!(error = %e, "Could not send 404 response");
    }
}

/// Turn a handler error into a 500, or end the response if it is already
/// streaming.
fn handler_failed(matched: &HeadMatch, res: &Response, failure: &str) {
    counter!(
        "hydra_handler_failures_total",
        "plugin" => matched.plugin.clone(),
        "head" => matched.head.name().to_string()
    )
    .increment(1);
    tracing::error!(
        plugin = %matched.plugin,
        head = %matched.head.name(),
        error = %failure,
        "Head handler failed"
    );

    let outcome = if res.is_ended() {
        Ok(())
    } else if res.head_sent() {
        res.end()
    } else {
        res.set_status(500);
        res.set_header("content-type", "text/plain");
        res.send(format!(
            "Internal Server Error in plugin '{}', head '{}': {}",
            matched.plugin,
            matched.head.name(),
            failure
        ))
    };
    if let Err(e) = outcome {
        tracing::warn!(plugin = %matched.plugin, error = %e, "Could not report handler failure");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Priority;
    use crate::error::HeadError;
    use crate::heads::{Head, StaticHead, StaticResponse};
    use crate::registry::{Plugin, ScenarioDefinition};
    use bytes::Bytes;
    use std::collections::BTreeMap;
    use tokio::sync::oneshot;

    /// Dispatch and wait for the response to end.
    async fn run(hydra: &Arc<Hydra>, req: Request) -> Response {
        let (tx, rx) = oneshot::channel();
        let res = Response::with_completion(move |finished| {
            let _ = tx.send(finished.clone());
        });
        hydra.handle(req, res).await;
        rx.await.expect("response never ended")
    }

    fn get(path: &str) -> Request {
        Request::new("GET", path)
    }

    fn body(res: &Response) -> String {
        String::from_utf8_lossy(&res.body()).into_owned()
    }

    fn text(path: &str, content: &str) -> Head {
        Head::builder(path)
            .static_content(StaticHead::new(StaticResponse::new(content.to_string())))
            .unwrap()
    }

    fn register(hydra: &Hydra, name: &str, heads: Vec<Head>) {
        hydra
            .register_plugin(Plugin::new(name, heads, BTreeMap::new()).unwrap())
            .unwrap();
    }

    #[tokio::test]
    async fn test_basic_dispatch_and_404() {
        let hydra = Arc::new(Hydra::new("test"));
        register(&hydra, "simple", vec![text("/foo", "bar")]);

        let res = run(&hydra, get("/foo")).await;
        assert_eq!(res.status(), 200);
        assert_eq!(body(&res), "bar");

        let res = run(&hydra, get("/other")).await;
        assert_eq!(res.status(), 404);
        assert_eq!(body(&res), "Not Found");
    }

    #[tokio::test]
    async fn test_next_reaches_a_later_head() {
        let hydra = Arc::new(Hydra::new("test"));
        let passthrough = Head::builder("/.*")
            .handler(|req, res, next: Next| async move {
                next.run(req, res).await;
                Ok(())
            })
            .unwrap();
        register(&hydra, "a", vec![passthrough]);
        register(&hydra, "b", vec![text("/.*", "B")]);

        let res = run(&hydra, get("/anything")).await;
        assert_eq!(body(&res), "B");
    }

    #[tokio::test]
    async fn test_next_with_nothing_after_is_404() {
        let hydra = Arc::new(Hydra::new("test"));
        let passthrough = Head::builder("/only")
            .handler(|req, res, next: Next| async move {
                next.run(req, res).await;
                Ok(())
            })
            .unwrap();
        register(&hydra, "a", vec![passthrough]);

        let res = run(&hydra, get("/only")).await;
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn test_middleware_can_rewrite_the_request() {
        let hydra = Arc::new(Hydra::new("test"));
        let rewrite = Head::builder("/old")
            .handler(|_req, res, next: Next| async move {
                next.run(Request::new("GET", "/new"), res).await;
                Ok(())
            })
            .unwrap();
        register(&hydra, "rewriter", vec![rewrite]);
        register(&hydra, "target", vec![text("/new", "moved")]);

        let res = run(&hydra, get("/old")).await;
        assert_eq!(body(&res), "moved");
    }

    #[tokio::test]
    async fn test_high_priority_dynamic_head_wins() {
        let hydra = Arc::new(Hydra::new("test"));
        hydra
            .register_dynamic_head(text("/x", "normal"), Priority::Normal)
            .unwrap();
        hydra
            .register_dynamic_head(text("/x", "high"), Priority::High)
            .unwrap();

        let res = run(&hydra, get("/x")).await;
        assert_eq!(body(&res), "high");
    }

    #[tokio::test]
    async fn test_detached_head_is_skipped() {
        let hydra = Arc::new(Hydra::new("test"));
        let first = Head::builder("/x")
            .name("first")
            .static_content(StaticHead::new(StaticResponse::new("first")))
            .unwrap();
        register(&hydra, "one", vec![first]);
        register(&hydra, "two", vec![text("/x", "second")]);

        hydra.detach_head("one", "first").unwrap();
        assert_eq!(body(&run(&hydra, get("/x")).await), "second");

        hydra.attach_head("one", "first").unwrap();
        assert_eq!(body(&run(&hydra, get("/x")).await), "first");
    }

    #[tokio::test]
    async fn test_params_are_bound_at_dispatch() {
        let hydra = Arc::new(Hydra::new("test"));
        let echo = Head::builder("/users/:id/posts/:post")
            .handler(|req: Request, res: Response, _next| async move {
                let id = req.params.get("id").cloned().unwrap_or_default();
                let post = req.params.get("post").cloned().unwrap_or_default();
                res.send(format!("{id}/{post}"))?;
                Ok(())
            })
            .unwrap();
        register(&hydra, "params", vec![echo]);

        let mut req = get("/users/7/posts/42?x=1");
        req.params.insert("stale".into(), "value".into());
        let res = run(&hydra, req).await;
        assert_eq!(body(&res), "7/42");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let hydra = Arc::new(Hydra::new("test"));
        let failing = Head::builder("/fail")
            .name("broken")
            .handler(|_req, _res, _next| async move { Err(HeadError::msg("database down")) })
            .unwrap();
        register(&hydra, "faulty", vec![failing]);

        let res = run(&hydra, get("/fail")).await;
        assert_eq!(res.status(), 500);
        let text = body(&res);
        assert!(text.contains("faulty"), "{text}");
        assert!(text.contains("broken"), "{text}");
        assert!(text.contains("database down"), "{text}");
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500() {
        let hydra = Arc::new(Hydra::new("test"));
        let panicking = Head::builder("/panic")
            .handler(|_req, _res, _next| async move {
                if true {
                    panic!("boom");
                }
                Ok::<(), HeadError>(())
            })
            .unwrap();
        register(&hydra, "faulty", vec![panicking]);

        let res = run(&hydra, get("/panic")).await;
        assert_eq!(res.status(), 500);
        assert!(body(&res).contains("boom"));
    }

    #[tokio::test]
    async fn test_failure_after_streaming_ends_response() {
        let hydra = Arc::new(Hydra::new("test"));
        let partial = Head::builder("/partial")
            .handler(|_req, res: Response, _next| async move {
                res.write("partial")?;
                Err(HeadError::msg("lost upstream"))
            })
            .unwrap();
        register(&hydra, "faulty", vec![partial]);

        let res = run(&hydra, get("/partial")).await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), Bytes::from("partial"));
    }

    #[tokio::test]
    async fn test_scenario_restart_resets_static_cursor() {
        use crate::heads::RepeatMode;

        let hydra = Arc::new(Hydra::new("test"));
        let seq = Head::builder("/seq")
            .static_content(
                StaticHead::sequence(
                    vec![StaticResponse::new("one"), StaticResponse::new("two")],
                    RepeatMode::RoundRobin,
                )
                .unwrap(),
            )
            .unwrap();
        let scenarios = BTreeMap::from([("s".to_string(), ScenarioDefinition::new(vec![seq]))]);
        hydra
            .register_plugin(Plugin::new("p", vec![], scenarios).unwrap())
            .unwrap();

        hydra.start_scenario("p", "s").unwrap();
        assert_eq!(body(&run(&hydra, get("/seq")).await), "one");
        assert_eq!(body(&run(&hydra, get("/seq")).await), "two");

        hydra.start_scenario("p", "s").unwrap();
        assert_eq!(body(&run(&hydra, get("/seq")).await), "one");

        hydra.stop_scenario().unwrap();
        assert_eq!(run(&hydra, get("/seq")).await.status(), 404);
    }

    #[tokio::test]
    async fn test_assertions_follow_the_active_scenario() {
        let hydra = Arc::new(Hydra::new("test"));
        let assert = hydra.assertions();
        let checker = Head::builder("/check")
            .handler(move |req: Request, res: Response, _next| {
                let assert = assert.clone();
                async move {
                    assert.equal(req.query(), Some("ok"), "query is ok");
                    res.send("checked")?;
                    Ok(())
                }
            })
            .unwrap();
        let scenarios = BTreeMap::from([
            ("first".to_string(), ScenarioDefinition::new(vec![])),
            ("second".to_string(), ScenarioDefinition::new(vec![])),
        ]);
        hydra
            .register_plugin(Plugin::new("p", vec![checker], scenarios).unwrap())
            .unwrap();

        hydra.start_scenario("p", "first").unwrap();
        run(&hydra, get("/check?ok")).await;
        hydra.start_scenario("p", "second").unwrap();
        run(&hydra, get("/check?bad")).await;

        let results = hydra.scenario_results();
        assert_eq!(results["p"]["first"].passes, vec!["query is ok"]);
        assert_eq!(results["p"]["second"].failures.len(), 1);
        assert!(results["p"]["first"].failures.is_empty());
    }
}
