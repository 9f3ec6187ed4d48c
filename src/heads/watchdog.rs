//! Observing responses without changing them.

use futures_util::FutureExt;
use std::sync::Arc;

use crate::dispatch::Next;
use crate::heads::HandlerFuture;
use crate::model::{Request, Response};

/// Decides whether a finished exchange deserves a report.
pub type Watcher = Arc<dyn Fn(&Request, &Response) -> bool + Send + Sync>;
/// Called for every exchange the watcher flagged.
pub type Reporter = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

/// Relays whatever the rest of the chain answers and reports on it once it
/// has ended. Streaming is preserved.
#[derive(Clone)]
pub struct WatchdogHead {
    watcher: Watcher,
    reporter: Reporter,
}

impl std::fmt::Debug for WatchdogHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogHead").finish_non_exhaustive()
    }
}

impl WatchdogHead {
    /// A watchdog that logs flagged exchanges.
    pub fn new<W>(watcher: W) -> Self
    where
        W: Fn(&Request, &Response) -> bool + Send + Sync + 'static,
    {
        Self {
            watcher: Arc::new(watcher),
            reporter: Arc::new(|req: &Request, res: &Response| {
                tracing::warn!(
                    method = %req.method,
                    url = %req.url,
                    status = res.status(),
                    "Watchdog triggered"
                );
            }),
        }
    }

    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: Fn(&Request, &Response) + Send + Sync + 'static,
    {
        self.reporter = Arc::new(reporter);
        self
    }

    pub(crate) fn handle(&self, req: Request, res: Response, next: Next) -> HandlerFuture {
        let watcher = self.watcher.clone();
        let reporter = self.reporter.clone();
        let observed = req.clone();

        async move {
            let private = Response::with_completion(move |finished| {
                if watcher(&observed, finished) {
                    reporter(&observed, finished);
                }
            });
            private.chain(&res);
            next.run(req, private).await;
            Ok(())
        }
        .boxed()
    }
}
