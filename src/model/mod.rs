//! Request/response model shared by every head.
//!
//! # Data Flow
//! ```text
//! transport request (buffered)
//!     → request.rs (Request snapshot, mutated in place down the chain)
//!     → heads write into response.rs (Response event emitter)
//!     → head / data / end events
//!     → chained sinks (other Responses, the transport bridge)
//! ```
//!
//! # Design Decisions
//! - A Response is an explicit state machine: Idle → HeadSent → Streaming → Ended
//! - Listener lists are taken out while they run, so a listener may safely
//!   touch the response that invoked it
//! - Responses are cheap handles (`Arc` inside); clones share state

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::{HeadEvent, Response, ResponseError, ResponseEvent};
