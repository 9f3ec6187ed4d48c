//! Forwarding requests to an upstream server.
//!
//! # Responsibilities
//! - Rewrite the request URL onto the upstream base URL
//! - Forward method, headers and the buffered body
//! - Stream the upstream body into the Response chunk by chunk
//!
//! # Design Decisions
//! - Plain HTTP upstreams only (hyper-util legacy client, as the transport uses)
//! - Hop-by-hop headers are not forwarded in either direction
//! - Unreachable upstream → 502 answered by the head itself

use axum::body::Body;
use futures_util::{FutureExt, StreamExt};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::error::{HeadError, HydraError, HydraResult};
use crate::heads::HandlerFuture;
use crate::model::{Headers, Request, Response};

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// True for headers that only apply to a single connection.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Forwards everything below the head's mount path to `proxy_to`.
#[derive(Clone)]
pub struct ProxyHead {
    proxy_to: Url,
    set_host_header: bool,
    client: Client<HttpConnector, Body>,
}

impl std::fmt::Debug for ProxyHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHead")
            .field("proxy_to", &self.proxy_to.as_str())
            .field("set_host_header", &self.set_host_header)
            .finish()
    }
}

impl ProxyHead {
    pub fn new(proxy_to: &str) -> HydraResult<Self> {
        let url = Url::parse(proxy_to).map_err(|e| {
            HydraError::InvalidConfiguration(format!("invalid proxy target '{proxy_to}': {e}"))
        })?;
        if url.scheme() != "http" {
            return Err(HydraError::InvalidConfiguration(format!(
                "unsupported proxy scheme '{}' in '{proxy_to}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(HydraError::InvalidConfiguration(format!(
                "proxy target '{proxy_to}' has no host"
            )));
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self {
            proxy_to: url,
            set_host_header: true,
            client,
        })
    }

    /// Whether `Host` is rewritten to the upstream authority (default: yes).
    pub fn set_host_header(mut self, enabled: bool) -> Self {
        self.set_host_header = enabled;
        self
    }

    pub fn proxy_to(&self) -> &Url {
        &self.proxy_to
    }

    /// Upstream URL for a request path remainder and query.
    pub fn target_url(&self, remainder: &str, query: Option<&str>) -> String {
        let base = self.proxy_to.as_str().trim_end_matches('/');
        let mut target = format!("{base}{remainder}");
        if self.proxy_to.path() == "/" && remainder.is_empty() {
            target.push('/');
        }
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    fn authority(&self) -> String {
        let host = self.proxy_to.host_str().unwrap_or_default();
        match self.proxy_to.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    pub(crate) fn forward(&self, remainder: String, req: Request, res: Response) -> HandlerFuture {
        let target = self.target_url(&remainder, req.query());
        let authority = self.authority();
        let set_host = self.set_host_header;
        let client = self.client.clone();

        async move {
            let mut builder = hyper::Request::builder()
                .method(req.method.as_str())
                .uri(&target);
            for (name, value) in &req.headers {
                // content-length is recomputed from the forwarded body
                if is_hop_by_hop(name) || name == "content-length" || (set_host && name == "host") {
                    continue;
                }
                builder = builder.header(name, value);
            }
            if set_host {
                builder = builder.header("host", authority.as_str());
            }
            let upstream_request = builder
                .body(Body::from(req.raw_body().clone()))
                .map_err(|e| HeadError::Upstream(e.to_string()))?;

            tracing::debug!(method = %req.method, target = %target, "Proxying request");

            let upstream = match client.request(upstream_request).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    tracing::warn!(target = %target, error = %e, "Upstream unreachable");
                    res.set_status(502);
                    res.send(format!("Bad Gateway: could not proxy to {target}: {e}"))?;
                    return Ok(());
                }
            };

            // one entry per field line, so repeated set-cookie survives
            let headers: Headers = upstream
                .headers()
                .iter()
                .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
                .collect();
            res.write_head(upstream.status().as_u16(), Some(headers))?;

            let mut body = Body::new(upstream.into_body()).into_data_stream();
            while let Some(frame) = body.next().await {
                match frame {
                    Ok(chunk) if chunk.is_empty() => continue,
                    Ok(chunk) => res.write(chunk)?,
                    Err(e) => {
                        tracing::warn!(target = %target, error = %e, "Upstream body interrupted");
                        break;
                    }
                }
            }
            res.end()?;
            Ok(())
        }
        .boxed()
    }
}
