//! Heads: the atomic units of request handling.
//!
//! # Data Flow
//! ```text
//! Head::builder(path)
//!     → name / method / hostname / mount options
//!     → terminal call picks the variant (handler, static, filesystem, ...)
//!     → Head (owned) → registered into a plugin → Arc<Head>
//!
//! Dispatch:
//!     can_handle(request)   attached? method? host? path?
//!     bind_params(request)  path captures → request.params
//!     handle(req, res, next)
//! ```
//!
//! # Design Decisions
//! - Variants form a closed enum (`HeadKind`); common behaviour lives on `Head`
//! - Attachment is an atomic flag so it can flip without a registry swap
//! - Names are assigned at registration when a head is anonymous

pub mod filesystem;
pub mod filter;
pub mod matcher;
pub mod proxy;
pub mod static_head;
pub mod watchdog;

use futures_util::future::{self, BoxFuture, FutureExt};
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dispatch::Next;
use crate::error::{HeadError, HydraError, HydraResult};
use crate::model::{Request, Response};

pub use filesystem::FilesystemHead;
pub use filter::FilterHead;
pub use matcher::{normalize_path, PathMatcher};
pub use proxy::ProxyHead;
pub use static_head::{RepeatMode, StaticHead, StaticResponse};
pub use watchdog::WatchdogHead;

/// Future returned by a head handler.
pub type HandlerFuture = BoxFuture<'static, Result<(), HeadError>>;

/// Arbitrary request handler.
pub type Handler = Arc<dyn Fn(Request, Response, Next) -> HandlerFuture + Send + Sync>;

/// Methods a head answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Vec<String>),
}

impl MethodFilter {
    fn allows(&self, method: &str) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(methods) => methods.iter().any(|m| m.eq_ignore_ascii_case(method)),
        }
    }
}

/// Variant-specific behaviour of a head.
pub enum HeadKind {
    Generic(Handler),
    Static(StaticHead),
    Filesystem(FilesystemHead),
    Proxy(ProxyHead),
    Filter(FilterHead),
    Watchdog(WatchdogHead),
}

impl HeadKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            HeadKind::Generic(_) => "generic",
            HeadKind::Static(_) => "static",
            HeadKind::Filesystem(_) => "filesystem",
            HeadKind::Proxy(_) => "proxy",
            HeadKind::Filter(_) => "filter",
            HeadKind::Watchdog(_) => "watchdog",
        }
    }
}

impl fmt::Debug for HeadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadKind::Generic(_) => f.write_str("Generic"),
            HeadKind::Static(s) => f.debug_tuple("Static").field(s).finish(),
            HeadKind::Filesystem(fs) => f.debug_tuple("Filesystem").field(fs).finish(),
            HeadKind::Proxy(p) => f.debug_tuple("Proxy").field(p).finish(),
            HeadKind::Filter(fl) => f.debug_tuple("Filter").field(fl).finish(),
            HeadKind::Watchdog(w) => f.debug_tuple("Watchdog").field(w).finish(),
        }
    }
}

/// A named, path-matching request handler.
#[derive(Debug)]
pub struct Head {
    name: Option<String>,
    matcher: PathMatcher,
    methods: MethodFilter,
    hostname: Option<Regex>,
    attached: AtomicBool,
    kind: HeadKind,
}

impl Head {
    pub fn builder(path: impl Into<String>) -> HeadBuilder {
        HeadBuilder {
            name: None,
            path: path.into(),
            mount: false,
            methods: MethodFilter::Any,
            hostname: None,
            attached: true,
        }
    }

    /// Name of the head; empty until an anonymous head is registered.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    pub(crate) fn assign_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// Declared path pattern or mount path.
    pub fn path(&self) -> &str {
        self.matcher.declared()
    }

    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn methods(&self) -> &MethodFilter {
        &self.methods
    }

    pub fn kind(&self) -> &HeadKind {
        &self.kind
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Flip the attachment flag. Returns false if it already had that value.
    pub(crate) fn set_attached(&self, attached: bool) -> bool {
        self.attached
            .compare_exchange(!attached, attached, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Pure check: no side effects on the request.
    pub fn can_handle(&self, req: &Request) -> bool {
        if !self.is_attached() || !self.methods.allows(&req.method) {
            return false;
        }
        if let Some(hostname) = &self.hostname {
            if !req.hostname().is_some_and(|h| hostname.is_match(h)) {
                return false;
            }
        }
        self.matcher.matches(req.path())
    }

    /// Replace `req.params` with this head's captures.
    pub fn bind_params(&self, req: &mut Request) {
        req.params = self.matcher.captures(req.path());
    }

    /// Restore per-head mutable state (reply cursors).
    pub fn reset(&self) {
        if let HeadKind::Static(head) = &self.kind {
            head.reset();
        }
    }

    pub fn handle(&self, req: Request, res: Response, next: Next) -> HandlerFuture {
        match &self.kind {
            HeadKind::Generic(handler) => handler(req, res, next),
            HeadKind::Static(head) => future::ready(head.respond(&res)).boxed(),
            HeadKind::Filesystem(head) => head.serve(self.matcher.remainder(req.path()), res),
            HeadKind::Proxy(head) => {
                let remainder = self.matcher.remainder(req.path());
                head.forward(remainder, req, res)
            }
            HeadKind::Filter(head) => head.handle(req, res, next),
            HeadKind::Watchdog(head) => head.handle(req, res, next),
        }
    }
}

/// Options shared by every head variant.
#[derive(Debug, Clone)]
pub struct HeadBuilder {
    name: Option<String>,
    path: String,
    mount: bool,
    methods: MethodFilter,
    hostname: Option<String>,
    attached: bool,
}

impl HeadBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict to a method. `*` accepts any; repeated calls accumulate.
    pub fn method(mut self, method: &str) -> Self {
        if method == "*" {
            self.methods = MethodFilter::Any;
            return self;
        }
        let method = method.to_ascii_uppercase();
        match &mut self.methods {
            MethodFilter::Any => self.methods = MethodFilter::Only(vec![method]),
            MethodFilter::Only(methods) => methods.push(method),
        }
        self
    }

    /// Only answer when the `Host` header matches this regex.
    pub fn hostname(mut self, pattern: impl Into<String>) -> Self {
        self.hostname = Some(pattern.into());
        self
    }

    /// Treat the path as a mount point (prefix match).
    pub fn mount(mut self) -> Self {
        self.mount = true;
        self
    }

    /// Register the head detached.
    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn handler<F, Fut>(self, handler: F) -> HydraResult<Head>
    where
        F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HeadError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |req, res, next| handler(req, res, next).boxed());
        self.build(HeadKind::Generic(handler))
    }

    pub fn static_content(self, head: StaticHead) -> HydraResult<Head> {
        self.build(HeadKind::Static(head))
    }

    pub fn filesystem(self, head: FilesystemHead) -> HydraResult<Head> {
        self.mount().build(HeadKind::Filesystem(head))
    }

    pub fn proxy(self, head: ProxyHead) -> HydraResult<Head> {
        self.mount().build(HeadKind::Proxy(head))
    }

    pub fn filter(self, head: FilterHead) -> HydraResult<Head> {
        self.build(HeadKind::Filter(head))
    }

    pub fn watchdog(self, head: WatchdogHead) -> HydraResult<Head> {
        self.build(HeadKind::Watchdog(head))
    }

    fn build(self, kind: HeadKind) -> HydraResult<Head> {
        if self.name.as_deref() == Some("") {
            return Err(HydraError::InvalidConfiguration(
                "head name must not be empty".to_string(),
            ));
        }
        let matcher = if self.mount {
            PathMatcher::mount(&self.path)
        } else {
            PathMatcher::exact(&self.path)?
        };
        let hostname = self
            .hostname
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    HydraError::InvalidConfiguration(format!(
                        "invalid hostname pattern '{pattern}': {e}"
                    ))
                })
            })
            .transpose()?;

        Ok(Head {
            name: self.name,
            matcher,
            methods: self.methods,
            hostname,
            attached: AtomicBool::new(self.attached),
            kind,
        })
    }
}
