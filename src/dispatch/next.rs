//! The continuation handed to every head.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::dispatch::Hydra;
use crate::error::HeadError;
use crate::model::{Request, Response};
use crate::registry::HeadCursor;

/// Resumes matching just after the head that received it.
///
/// The search continues globally: across the rest of the head's plugin and
/// then every later plugin.
#[derive(Clone)]
pub struct Next {
    hydra: Arc<Hydra>,
    after: HeadCursor,
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("after", &self.after).finish()
    }
}

impl Next {
    pub(crate) fn new(hydra: Arc<Hydra>, after: HeadCursor) -> Self {
        Self { hydra, after }
    }

    /// Dispatch `req` into `res` with the remaining heads.
    pub fn run(&self, req: Request, res: Response) -> BoxFuture<'static, ()> {
        self.hydra.dispatch(req, res, Some(self.after.clone()))
    }

    /// Dispatch into a private response and wait until it ends.
    pub async fn collect(&self, req: Request) -> Result<Response, HeadError> {
        let (tx, rx) = oneshot::channel();
        let private = Response::with_completion(move |finished| {
            let _ = tx.send(finished.clone());
        });
        self.run(req, private).await;
        rx.await.map_err(|_| {
            HeadError::msg(format!(
                "response after head '{}' in plugin '{}' was dropped before it ended",
                self.after.head, self.after.plugin
            ))
        })
    }

    /// Engine this continuation belongs to.
    pub fn hydra(&self) -> &Arc<Hydra> {
        &self.hydra
    }

    pub fn cursor(&self) -> &HeadCursor {
        &self.after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heads::{FilterHead, Head, StaticHead, StaticResponse, WatchdogHead};
    use crate::registry::Plugin;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    async fn fetch(hydra: &Arc<Hydra>, req: Request) -> Response {
        let (tx, rx) = oneshot::channel();
        let res = Response::with_completion(move |finished| {
            let _ = tx.send(finished.clone());
        });
        hydra.handle(req, res).await;
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_filter_rewrites_later_body() {
        let hydra = Arc::new(Hydra::new("test"));
        let upper = Head::builder("/.*")
            .filter(FilterHead::new(|body: Bytes| {
                Ok(Bytes::from(String::from_utf8_lossy(&body).to_uppercase()))
            }))
            .unwrap();
        let source = Head::builder("/greet")
            .static_content(StaticHead::new(StaticResponse::new("hello")))
            .unwrap();
        hydra
            .register_plugin(Plugin::new("filters", vec![upper], BTreeMap::new()).unwrap())
            .unwrap();
        hydra
            .register_plugin(Plugin::new("content", vec![source], BTreeMap::new()).unwrap())
            .unwrap();

        let res = fetch(&hydra, Request::new("GET", "/greet").with_header("accept-encoding", "gzip")).await;
        assert_eq!(res.body(), Bytes::from("HELLO"));
        assert_eq!(res.header("content-length").as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_watchdog_reports_and_passes_through() {
        let hydra = Arc::new(Hydra::new("test"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let watchdog = Head::builder("/.*")
            .watchdog(
                WatchdogHead::new(|_req: &Request, res: &Response| res.status() >= 400)
                    .with_reporter(move |req: &Request, res: &Response| {
                        sink.lock().push(format!("{} {}", req.path(), res.status()));
                    }),
            )
            .unwrap();
        hydra
            .register_plugin(Plugin::new("watch", vec![watchdog], BTreeMap::new()).unwrap())
            .unwrap();

        let res = fetch(&hydra, Request::new("GET", "/missing")).await;
        assert_eq!(res.status(), 404);
        assert_eq!(res.body(), Bytes::from("Not Found"));
        assert_eq!(*seen.lock(), vec!["/missing 404"]);
    }

    #[tokio::test]
    async fn test_collect_fails_when_response_is_dropped() {
        let hydra = Arc::new(Hydra::new("test"));
        let black_hole = Head::builder("/hole")
            .handler(|_req, res: Response, _next| async move {
                drop(res);
                Ok(())
            })
            .unwrap();
        let marker = Head::builder("/never")
            .name("marker")
            .static_content(StaticHead::new(StaticResponse::new("unused")))
            .unwrap();
        hydra
            .register_plugin(Plugin::new("first", vec![marker], BTreeMap::new()).unwrap())
            .unwrap();
        hydra
            .register_plugin(Plugin::new("holes", vec![black_hole], BTreeMap::new()).unwrap())
            .unwrap();

        let next = Next::new(hydra.clone(), HeadCursor::new("first", "marker"));
        assert!(next.collect(Request::new("GET", "/hole")).await.is_err());

        // a cursor that no longer exists matches nothing
        let stale = Next::new(hydra.clone(), HeadCursor::new("first", "gone"));
        let res = stale.collect(Request::new("GET", "/hole")).await.unwrap();
        assert_eq!(res.status(), 404);
    }
}
