//! Body-transforming middleware head.

use bytes::Bytes;
use futures_util::FutureExt;
use std::sync::Arc;

use crate::dispatch::Next;
use crate::error::HeadError;
use crate::heads::HandlerFuture;
use crate::model::{Request, Response};

/// Transformation applied to a complete response body.
pub type BodyFilter = Arc<dyn Fn(Bytes) -> Result<Bytes, HeadError> + Send + Sync>;

/// Lets the rest of the chain answer, then rewrites the body.
#[derive(Clone)]
pub struct FilterHead {
    filter: BodyFilter,
}

impl std::fmt::Debug for FilterHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterHead").finish_non_exhaustive()
    }
}

impl FilterHead {
    pub fn new<F>(filter: F) -> Self
    where
        F: Fn(Bytes) -> Result<Bytes, HeadError> + Send + Sync + 'static,
    {
        Self {
            filter: Arc::new(filter),
        }
    }

    pub(crate) fn handle(&self, mut req: Request, res: Response, next: Next) -> HandlerFuture {
        let filter = self.filter.clone();

        async move {
            // the body must reach the filter uncompressed
            req.remove_header("accept-encoding");

            let finished = next.collect(req).await?;
            let body = filter(finished.body())?;

            let mut headers = finished.headers();
            headers.insert("content-length", body.len().to_string());
            res.write_head(finished.status(), Some(headers))?;
            if !body.is_empty() {
                res.write(body)?;
            }
            res.end()?;
            Ok(())
        }
        .boxed()
    }
}
