//! Streaming an engine [`Response`] back to the client.
//!
//! # Data Flow
//! ```text
//! Response events
//!     head → oneshot  → status + headers of the axum response
//!     data → mpsc     → body stream, chunk by chunk
//!     end  → closes the body stream
//! ```
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped automatically
//! - A response dropped before its head was emitted becomes a 500

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response as HttpResponse, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures_util::stream;
use std::convert::Infallible;
use tokio::sync::{mpsc, oneshot};

use crate::heads::proxy::is_hop_by_hop;
use crate::model::{HeadEvent, Response, ResponseEvent};

/// Receiving side of a response subscribed with [`ResponseBridge::attach`].
pub struct ResponseBridge {
    head: oneshot::Receiver<HeadEvent>,
    body: mpsc::UnboundedReceiver<Bytes>,
}

impl ResponseBridge {
    /// Subscribe to `res`. Must happen before anything is written to it.
    pub fn attach(res: &Response) -> Self {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::unbounded_channel();
        let mut head_tx = Some(head_tx);
        let mut body_tx = Some(body_tx);

        res.subscribe(move |event| match event {
            ResponseEvent::Head(head) => {
                if let Some(tx) = head_tx.take() {
                    let _ = tx.send(head.clone());
                }
            }
            ResponseEvent::Data(chunk) => {
                if let Some(tx) = &body_tx {
                    // client went away; the head keeps running to completion
                    let _ = tx.send(chunk.clone());
                }
            }
            ResponseEvent::End(_) => {
                body_tx = None;
            }
        });

        Self {
            head: head_rx,
            body: body_rx,
        }
    }

    /// Wait for the head and build a response that streams the body.
    pub async fn into_http(self) -> HttpResponse<Body> {
        let Ok(head) = self.head.await else {
            tracing::error!("Response dropped before a head was sent");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        };

        let body = stream::unfold(self.body, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        let mut response = HttpResponse::new(Body::from_stream(body));
        *response.status_mut() =
            StatusCode::from_u16(head.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (name, value) in &head.headers {
            if is_hop_by_hop(name) {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}
