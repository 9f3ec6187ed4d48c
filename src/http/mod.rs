//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum setup, middleware, summon hydra)
//!     → request.rs (request ID, buffer body, build Request)
//!     → [hydra dispatches to heads]
//!     → response.rs (stream Response events to the client)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::ResponseBridge;
pub use server::{AppState, HttpServer};
