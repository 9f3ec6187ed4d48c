//! Canned responses.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{HeadError, HydraError, HydraResult};
use crate::model::{Headers, Response};

/// One canned response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResponse {
    pub content: Bytes,
    pub content_type: Option<String>,
    pub status: u16,
    pub headers: Headers,
}

impl StaticResponse {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            content_type: None,
            status: 200,
            headers: Headers::new(),
        }
    }

    /// JSON body with `application/json`.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(value.to_string()).with_content_type("application/json")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// What happens once every configured response has been served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatMode {
    /// Start over from the first response.
    #[default]
    RoundRobin,
    /// Keep serving the last response.
    RepeatLast,
}

impl FromStr for RepeatMode {
    type Err = HydraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(RepeatMode::RoundRobin),
            "repeat-last" => Ok(RepeatMode::RepeatLast),
            other => Err(HydraError::InvalidConfiguration(format!(
                "unknown repeat mode '{other}'"
            ))),
        }
    }
}

/// A head answering with one of a fixed list of responses.
#[derive(Debug)]
pub struct StaticHead {
    responses: Vec<StaticResponse>,
    repeat: RepeatMode,
    cursor: AtomicUsize,
}

impl StaticHead {
    pub fn new(response: StaticResponse) -> Self {
        Self {
            responses: vec![response],
            repeat: RepeatMode::RoundRobin,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Serve `responses` one after another.
    pub fn sequence(responses: Vec<StaticResponse>, repeat: RepeatMode) -> HydraResult<Self> {
        if responses.is_empty() {
            return Err(HydraError::InvalidConfiguration(
                "static head needs at least one response".to_string(),
            ));
        }
        Ok(Self {
            responses,
            repeat,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn responses(&self) -> &[StaticResponse] {
        &self.responses
    }

    /// Rewind to the first response.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }

    fn next_response(&self) -> &StaticResponse {
        let len = self.responses.len();
        let served = self.cursor.fetch_add(1, Ordering::Relaxed);
        let index = match self.repeat {
            RepeatMode::RoundRobin => served % len,
            RepeatMode::RepeatLast => served.min(len - 1),
        };
        &self.responses[index]
    }

    pub(crate) fn respond(&self, res: &Response) -> Result<(), HeadError> {
        let response = self.next_response();
        res.set_status(response.status);
        for (name, value) in &response.headers {
            res.append_header(name, value);
        }
        if let Some(content_type) = &response.content_type {
            res.set_header("content-type", content_type.clone());
        }
        res.send(response.content.clone())?;
        Ok(())
    }
}
