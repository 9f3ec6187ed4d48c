//! Event-driven response.
//!
//! A `Response` accumulates status, headers and body while emitting three
//! ordered event streams: `head` (once, before any data), `data` (one per
//! write) and `end` (once, last). Heads may build private responses, observe
//! or transform what flows through them, and relay the events to another
//! sink with [`Response::chain`] or replay a finished one with
//! [`Response::forward`].
//!
//! # Design Decisions
//! - Legal transitions are encoded in [`Phase::advance`]
//! - Events are queued while the state lock is held and delivered after it is
//!   released, so write order is preserved and listeners may re-enter
//! - A response is expected to have one logical writer at a time

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::model::Headers;

/// Misuse of the response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("invalid response: head already sent")]
    HeadAlreadySent,

    #[error("invalid response: already ended")]
    AlreadyEnded,

    #[error("invalid response: no end handler")]
    NoEndHandler,

    #[error("invalid response: cannot forward a response that has not ended")]
    Unfinished,
}

/// Final status and headers, emitted once per response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadEvent {
    pub status: u16,
    pub headers: Headers,
}

/// One event in a response's lifetime.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    Head(HeadEvent),
    Data(Bytes),
    /// Carries the finalized response.
    End(Response),
}

/// Lifecycle phase of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    HeadSent,
    Streaming,
    Ended,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    WriteHead,
    Write,
    End,
}

impl Phase {
    /// Transition table.
    fn advance(self, op: Op) -> Result<Phase, ResponseError> {
        match (self, op) {
            (Phase::Ended, _) => Err(ResponseError::AlreadyEnded),
            (Phase::Idle, Op::WriteHead) => Ok(Phase::HeadSent),
            (_, Op::WriteHead) => Err(ResponseError::HeadAlreadySent),
            (_, Op::Write) => Ok(Phase::Streaming),
            (_, Op::End) => Ok(Phase::Ended),
        }
    }
}

enum Listener {
    Head(Box<dyn FnMut(&HeadEvent) + Send>),
    Data(Box<dyn FnMut(&Bytes) + Send>),
    End(Box<dyn FnMut(&Response) + Send>),
    All(Box<dyn FnMut(&ResponseEvent) + Send>),
}

impl Listener {
    fn call(&mut self, event: &ResponseEvent) {
        match (self, event) {
            (Listener::Head(f), ResponseEvent::Head(head)) => f(head),
            (Listener::Data(f), ResponseEvent::Data(chunk)) => f(chunk),
            (Listener::End(f), ResponseEvent::End(response)) => f(response),
            (Listener::All(f), event) => f(event),
            _ => {}
        }
    }
}

struct State {
    phase: Phase,
    status: u16,
    headers: Headers,
    body: BytesMut,
    end_listeners: usize,
}

impl State {
    /// Head event to emit before the first byte or at finalization.
    fn synthesize_head(&self) -> Option<HeadEvent> {
        (self.phase == Phase::Idle).then(|| HeadEvent {
            status: self.status,
            headers: self.headers.clone(),
        })
    }
}

#[derive(Default)]
struct Emitter {
    listeners: Vec<Listener>,
    queue: VecDeque<ResponseEvent>,
    emitting: bool,
}

struct Shared {
    state: Mutex<State>,
    emitter: Mutex<Emitter>,
}

/// Handle to a response. Clones share the same underlying response.
#[derive(Clone)]
pub struct Response {
    shared: Arc<Shared>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("phase", &state.phase)
            .field("body_len", &state.body.len())
            .finish()
    }
}

impl Response {
    /// A bare response with no listeners. Status defaults to 200.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    status: 200,
                    headers: Headers::new(),
                    body: BytesMut::new(),
                    end_listeners: 0,
                }),
                emitter: Mutex::new(Emitter::default()),
            }),
        }
    }

    /// A response whose `callback` runs once when it ends.
    pub fn with_completion<F>(callback: F) -> Self
    where
        F: FnOnce(&Response) + Send + 'static,
    {
        let response = Self::new();
        let mut callback = Some(callback);
        response.on_end(move |finished| {
            if let Some(cb) = callback.take() {
                cb(finished);
            }
        });
        response
    }

    // --- Listeners ---

    pub fn on_head<F>(&self, listener: F) -> &Self
    where
        F: FnMut(&HeadEvent) + Send + 'static,
    {
        self.add_listener(Listener::Head(Box::new(listener)))
    }

    pub fn on_data<F>(&self, listener: F) -> &Self
    where
        F: FnMut(&Bytes) + Send + 'static,
    {
        self.add_listener(Listener::Data(Box::new(listener)))
    }

    pub fn on_end<F>(&self, listener: F) -> &Self
    where
        F: FnMut(&Response) + Send + 'static,
    {
        self.add_listener(Listener::End(Box::new(listener)))
    }

    /// Listen to every event kind with one callback.
    pub fn subscribe<F>(&self, listener: F) -> &Self
    where
        F: FnMut(&ResponseEvent) + Send + 'static,
    {
        self.add_listener(Listener::All(Box::new(listener)))
    }

    fn add_listener(&self, listener: Listener) -> &Self {
        if matches!(listener, Listener::End(_) | Listener::All(_)) {
            self.shared.state.lock().end_listeners += 1;
        }
        self.shared.emitter.lock().listeners.push(listener);
        self
    }

    // --- Accessors ---

    pub fn status(&self) -> u16 {
        self.shared.state.lock().status
    }

    /// Set the status used when the head is emitted.
    pub fn set_status(&self, status: u16) {
        self.shared.state.lock().status = status;
    }

    pub fn headers(&self) -> Headers {
        self.shared.state.lock().headers.clone()
    }

    /// First value of `name`.
    pub fn header(&self, name: &str) -> Option<String> {
        self.shared.state.lock().headers.get(name).map(str::to_string)
    }

    /// Replace every value of `name`.
    pub fn set_header(&self, name: impl AsRef<str>, value: impl Into<String>) {
        self.shared.state.lock().headers.insert(name, value);
    }

    /// Add a value, keeping the ones already set (`set-cookie`).
    pub fn append_header(&self, name: impl AsRef<str>, value: impl Into<String>) {
        self.shared.state.lock().headers.append(name, value);
    }

    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.shared.state.lock().headers.remove(name)
    }

    /// Body accumulated so far. Complete once [`Response::is_ended`] is true.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.shared.state.lock().body)
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    pub fn head_sent(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn is_ended(&self) -> bool {
        self.phase() == Phase::Ended
    }

    fn snapshot(&self) -> (u16, Headers, Bytes) {
        let state = self.shared.state.lock();
        (
            state.status,
            state.headers.clone(),
            Bytes::copy_from_slice(&state.body),
        )
    }

    fn ensure_consumer(&self) -> Result<(), ResponseError> {
        let state = self.shared.state.lock();
        if state.phase == Phase::Ended {
            return Err(ResponseError::AlreadyEnded);
        }
        if state.end_listeners == 0 {
            return Err(ResponseError::NoEndHandler);
        }
        Ok(())
    }

    // --- Writing ---

    /// Emit the head explicitly. Fails if a head was already emitted.
    ///
    /// `None` keeps the headers set so far.
    pub fn write_head(&self, status: u16, headers: Option<Headers>) -> Result<(), ResponseError> {
        {
            let mut state = self.shared.state.lock();
            let next = state.phase.advance(Op::WriteHead)?;
            state.status = status;
            if let Some(headers) = headers {
                state.headers = headers;
            }
            state.phase = next;
            self.enqueue(ResponseEvent::Head(HeadEvent {
                status,
                headers: state.headers.clone(),
            }));
        }
        self.drain();
        Ok(())
    }

    /// Append a chunk, emitting a synthesized head first if needed.
    pub fn write(&self, chunk: impl Into<Bytes>) -> Result<(), ResponseError> {
        let chunk = chunk.into();
        {
            let mut state = self.shared.state.lock();
            let next = state.phase.advance(Op::Write)?;
            if let Some(head) = state.synthesize_head() {
                self.enqueue(ResponseEvent::Head(head));
            }
            state.body.extend_from_slice(&chunk);
            state.phase = next;
            self.enqueue(ResponseEvent::Data(chunk));
        }
        self.drain();
        Ok(())
    }

    /// Finalize the response.
    pub fn end(&self) -> Result<(), ResponseError> {
        self.ensure_consumer()?;
        self.finish()
    }

    /// Write a final chunk and finalize.
    pub fn end_with(&self, chunk: impl Into<Bytes>) -> Result<(), ResponseError> {
        self.ensure_consumer()?;
        self.write(chunk)?;
        self.finish()
    }

    /// `write` followed by `end`.
    pub fn send(&self, body: impl Into<Bytes>) -> Result<(), ResponseError> {
        self.end_with(body)
    }

    fn finish(&self) -> Result<(), ResponseError> {
        {
            let mut state = self.shared.state.lock();
            let next = state.phase.advance(Op::End)?;
            if let Some(head) = state.synthesize_head() {
                self.enqueue(ResponseEvent::Head(head));
            }
            state.phase = next;
            self.enqueue(ResponseEvent::End(self.clone()));
        }
        self.drain();
        Ok(())
    }

    // --- Composition ---

    /// Relay every event of this response to `target`, in order.
    ///
    /// Errors raised by the target are logged and otherwise ignored; a sink
    /// that went away must not break the producer.
    pub fn chain(&self, target: &Response) -> &Self {
        let sink = target.clone();
        self.subscribe(move |event| {
            let outcome = match event {
                ResponseEvent::Head(head) => sink.write_head(head.status, Some(head.headers.clone())),
                ResponseEvent::Data(chunk) => sink.write(chunk.clone()),
                ResponseEvent::End(_) => sink.end(),
            };
            if let Err(e) = outcome {
                tracing::debug!(error = %e, "Chained response rejected event");
            }
        })
    }

    /// Replay a finished response into this one and finalize it.
    pub fn forward(&self, finished: &Response) -> Result<(), ResponseError> {
        if !finished.is_ended() {
            return Err(ResponseError::Unfinished);
        }
        self.ensure_consumer()?;
        let (status, headers, body) = finished.snapshot();
        self.write_head(status, Some(headers))?;
        if !body.is_empty() {
            self.write(body)?;
        }
        self.finish()
    }

    /// Copy status, headers and body from `other` without finalizing.
    ///
    /// No `data` event fires when `other` has an empty body.
    pub fn copy_from(&self, other: &Response) -> Result<(), ResponseError> {
        let (status, headers, body) = other.snapshot();
        {
            let mut state = self.shared.state.lock();
            if state.phase == Phase::Ended {
                return Err(ResponseError::AlreadyEnded);
            }
            state.status = status;
            state.headers = headers;
        }
        if !body.is_empty() {
            self.write(body)?;
        }
        Ok(())
    }

    // --- Event delivery ---

    fn enqueue(&self, event: ResponseEvent) {
        self.shared.emitter.lock().queue.push_back(event);
    }

    /// Deliver queued events unless a delivery loop is already running.
    fn drain(&self) {
        {
            let mut emitter = self.shared.emitter.lock();
            if emitter.emitting {
                return;
            }
            emitter.emitting = true;
        }
        loop {
            let (event, mut running) = {
                let mut emitter = self.shared.emitter.lock();
                match emitter.queue.pop_front() {
                    Some(event) => (event, std::mem::take(&mut emitter.listeners)),
                    None => {
                        emitter.emitting = false;
                        return;
                    }
                }
            };
            for listener in running.iter_mut() {
                listener.call(&event);
            }
            let mut emitter = self.shared.emitter.lock();
            let added = std::mem::replace(&mut emitter.listeners, running);
            emitter.listeners.extend(added);
        }
    }
}
