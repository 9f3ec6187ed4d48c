//! Hydra: a programmable HTTP interception server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http server ──▶ summoner ──▶ hydra (dispatch)
//!                                                     │
//!                                                     ▼
//!                                      registry: plugins → heads, in order
//!                                                     │
//!                                   first matching, attached head handles it
//!                                        │ next ──▶ following heads
//!                                        ▼
//!     Client Response ◀──────────── Response events (head, data, end)
//!
//!     Cross-cutting: config, scenarios + assertions, admin REST, observability
//! ```

// Core engine
pub mod dispatch;
pub mod heads;
pub mod model;
pub mod registry;
pub mod scenario;

// Plugin loading
pub mod config;
pub mod plugins;
pub mod summoner;

// Serving
pub mod admin;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::schema::HydraConfig;
pub use dispatch::{Hydra, Next, Priority};
pub use error::{HeadError, HydraError, HydraResult};
pub use heads::Head;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use model::{Request, Response};
pub use registry::Plugin;
pub use summoner::Summoner;
