//! Inbound request snapshot.
//!
//! Built once per inbound request by the transport and then handed down the
//! head chain by value. Heads may rewrite the URL, headers or body before
//! delegating to `next`.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::model::Headers;


/// A buffered HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Path plus optional query string, e.g. `/search?q=x`.
    pub url: String,
    /// Upper-case method.
    pub method: String,
    /// Lower-case header names.
    pub headers: Headers,
    /// Path captures of the head currently handling the request.
    pub params: HashMap<String, String>,
    raw_body: Bytes,
    body_params: OnceLock<HashMap<String, String>>,
}

impl Request {
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.as_ref().to_ascii_uppercase(),
            headers: Headers::new(),
            params: HashMap::new(),
            raw_body: Bytes::new(),
            body_params: OnceLock::new(),
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.set_body(body);
        self
    }

    /// URL path with the query string removed.
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    /// Raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Decoded query parameters. Later duplicates win.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First value of `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    pub fn append_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    /// `Host` header without the port.
    pub fn hostname(&self) -> Option<&str> {
        let host = self.header("host")?;
        if host.starts_with('[') {
            // IPv6 literal
            return host.split_once(']').map(|(h, _)| &h[1..]);
        }
        Some(host.split(':').next().unwrap_or(host))
    }

    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    /// Replace the body. Parsed body parameters are recomputed on next access.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.raw_body = body.into();
        self.body_params = OnceLock::new();
    }

    /// Body parameters, parsed lazily according to `content-type`.
    ///
    /// Form bodies and top-level JSON objects are understood; anything else
    /// yields an empty map. Non-string JSON values keep their JSON text.
    pub fn body_params(&self) -> &HashMap<String, String> {
        self.body_params.get_or_init(|| {
            parse_body_params(self.header("content-type"), &self.raw_body)
        })
    }
}

fn parse_body_params(content_type: Option<&str>, body: &[u8]) -> HashMap<String, String> {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match media_type.as_str() {
        "application/x-www-form-urlencoded" => {
            url::form_urlencoded::parse(body).into_owned().collect()
        }
        "application/json" => match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect(),
            Ok(_) => HashMap::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unparseable JSON body");
                HashMap::new()
            }
        },
        _ => HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_is_uppercased() {
        let req = Request::new("post", "/");
        assert_eq!(req.method, "POST");
    }

    #[test]
    fn test_path_strips_query() {
        let req = Request::new("GET", "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust&page=2"));

        let params = req.query_params();
        assert_eq!(params.get("q").map(String::as_str), Some("rust"));
        assert_eq!(params.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = Request::new("GET", "/").with_header("X-Custom", "yes");
        assert_eq!(req.header("x-custom"), Some("yes"));
        assert_eq!(req.header("X-CUSTOM"), Some("yes"));
    }

    #[test]
    fn test_hostname_drops_port() {
        let req = Request::new("GET", "/").with_header("Host", "example.com:8080");
        assert_eq!(req.hostname(), Some("example.com"));

        let req = Request::new("GET", "/").with_header("Host", "[::1]:3000");
        assert_eq!(req.hostname(), Some("::1"));
    }

    #[test]
    fn test_form_body_params() {
        let req = Request::new("POST", "/")
            .with_header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .with_body("attached=false&name=a%20b");
        assert_eq!(req.body_params().get("attached").map(String::as_str), Some("false"));
        assert_eq!(req.body_params().get("name").map(String::as_str), Some("a b"));
    }

    #[test]
    fn test_json_body_params() {
        let req = Request::new("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": true, "name": "x"}"#);
        assert_eq!(req.body_params().get("active").map(String::as_str), Some("true"));
        assert_eq!(req.body_params().get("name").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_body_params_recomputed_after_set_body() {
        let mut req = Request::new("POST", "/")
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("a=1");
        assert_eq!(req.body_params().len(), 1);

        req.set_body("a=1&b=2");
        assert_eq!(req.body_params().len(), 2);
    }

    #[test]
    fn test_unknown_content_type_yields_no_params() {
        let req = Request::new("POST", "/")
            .with_header("content-type", "text/plain")
            .with_body("a=1");
        assert!(req.body_params().is_empty());
    }
}
