//! Shared dispatch state for in-flight remote calls.
//!
//! One [`DispatchState`] is shared (behind an `Arc`) by every invocation for
//! the lifetime of the application. It tracks, per function name, which calls
//! are still outstanding, plus two flags UI layers poll:
//! - `fetching`: true iff at least one queue holds a pending entry
//! - `responsive`: outcome of the most recently settled call
//!
//! Every mutation and the `fetching` recomputation happen inside a single
//! critical section, so the flag never disagrees with the queues once a
//! mutation returns. The lock is never held across an `.await`.

use crate::error::{Result, WirecallError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Handle returned by [`DispatchState::enqueue`], used to drain that entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingToken(u64);

impl PendingToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// State of one function's pending queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueState {
    /// Outstanding calls in enqueue order.
    Active(BTreeMap<PendingToken, Value>),
    /// Left behind by a reset; the next enqueue replaces it.
    Reset,
}

impl QueueState {
    pub fn len(&self) -> usize {
        match self {
            QueueState::Active(entries) => entries.len(),
            QueueState::Reset => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Diagnostic record of a call whose failure was absorbed.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFailure {
    /// Function name the call was made against.
    pub function: String,
    /// Rendered error message.
    pub message: String,
    /// Whether the transport (not the payload) failed.
    pub transport: bool,
    /// When the failure was recorded.
    pub at: DateTime<Utc>,
}

impl CallFailure {
    fn new(function: &str, error: &WirecallError) -> Self {
        Self {
            function: function.to_string(),
            message: error.to_string(),
            transport: error.is_transport(),
            at: Utc::now(),
        }
    }
}

/// Point-in-time copy of the dispatch flags and queue sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub fetching: bool,
    pub responsive: bool,
    /// Pending entry count per function; empty and reset queues are omitted.
    pub pending: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct DispatchInner {
    queues: HashMap<String, QueueState>,
    fetching: bool,
    responsive: bool,
    headers: BTreeMap<String, String>,
    api: String,
    last_failure: Option<CallFailure>,
    /// Next token to hand out; allocated under the lock so token order is
    /// enqueue order.
    next_token: u64,
}

impl DispatchInner {
    fn recompute_fetching(&mut self) -> bool {
        self.fetching = self.queues.values().any(|queue| !queue.is_empty());
        self.fetching
    }
}

/// Process-wide record of in-flight remote calls.
#[derive(Debug)]
pub struct DispatchState {
    inner: Mutex<DispatchInner>,
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new("")
    }
}

impl DispatchState {
    /// Create dispatch state for the given API base.
    ///
    /// Starts responsive with nothing in flight.
    pub fn new(api: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(DispatchInner {
                queues: HashMap::new(),
                fetching: false,
                responsive: true,
                headers: BTreeMap::new(),
                api: api.into(),
                last_failure: None,
                next_token: 1,
            }),
        }
    }

    /// Create dispatch state with initial headers.
    pub fn with_headers(api: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        let state = Self::new(api);
        state.lock().headers = headers;
        state
    }

    fn lock(&self) -> MutexGuard<'_, DispatchInner> {
        // A panic while holding the lock cannot leave the maps half-written,
        // so a poisoned guard is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark a call to `name` as in flight and return its drain handle.
    ///
    /// Sets `fetching` before the entry lands; a `Reset` queue is replaced
    /// with a fresh one holding only this entry.
    pub fn enqueue(&self, name: &str, params: Value) -> PendingToken {
        let mut inner = self.lock();
        let token = PendingToken(inner.next_token);
        inner.next_token += 1;
        inner.fetching = true;

        let queue = inner
            .queues
            .entry(name.to_string())
            .or_insert(QueueState::Reset);
        match queue {
            QueueState::Active(entries) => {
                entries.insert(token, params);
            }
            QueueState::Reset => {
                *queue = QueueState::Active(BTreeMap::from([(token, params)]));
            }
        }

        debug!("Enqueued {} (token {}), {} pending", name, token.0, queue.len());
        token
    }

    /// Remove the entry for `token` and recompute `fetching`.
    ///
    /// A queue left with no entries is removed entirely. Draining a token that
    /// is not present (for instance after a reset) only recomputes the flag.
    /// Returns the new `fetching` value.
    pub fn drain(&self, name: &str, token: PendingToken) -> bool {
        let mut inner = self.lock();

        let now_empty = match inner.queues.get_mut(name) {
            Some(QueueState::Active(entries)) => {
                entries.remove(&token);
                entries.is_empty()
            }
            Some(QueueState::Reset) | None => false,
        };
        if now_empty {
            inner.queues.remove(name);
        }

        inner.recompute_fetching()
    }

    /// Recompute `fetching` from the queues and return it.
    pub fn recompute_fetching(&self) -> bool {
        self.lock().recompute_fetching()
    }

    /// Put a function's queue into the `Reset` state, discarding its entries.
    pub fn reset_queue(&self, name: &str) {
        let mut inner = self.lock();
        inner.queues.insert(name.to_string(), QueueState::Reset);
        inner.recompute_fetching();
    }

    /// Reset every known queue.
    pub fn reset_all(&self) {
        let mut inner = self.lock();
        for queue in inner.queues.values_mut() {
            *queue = QueueState::Reset;
        }
        inner.recompute_fetching();
    }

    /// Whether any call is in flight.
    pub fn is_fetching(&self) -> bool {
        self.lock().fetching
    }

    /// Outcome of the most recently settled call.
    pub fn is_responsive(&self) -> bool {
        self.lock().responsive
    }

    pub fn set_responsive(&self, responsive: bool) {
        self.lock().responsive = responsive;
    }

    /// Number of outstanding calls to `name`.
    pub fn pending_count(&self, name: &str) -> usize {
        self.lock().queues.get(name).map(QueueState::len).unwrap_or(0)
    }

    /// Params of the outstanding calls to `name`, in enqueue order.
    pub fn pending(&self, name: &str) -> Vec<Value> {
        match self.lock().queues.get(name) {
            Some(QueueState::Active(entries)) => entries.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Raw queue state for `name`, if the key exists.
    pub fn queue_state(&self, name: &str) -> Option<QueueState> {
        self.lock().queues.get(name).cloned()
    }

    /// Whether a queue key exists for `name`, including reset queues.
    pub fn has_queue(&self, name: &str) -> bool {
        self.lock().queues.contains_key(name)
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        let inner = self.lock();
        DispatchSnapshot {
            fetching: inner.fetching,
            responsive: inner.responsive,
            pending: inner
                .queues
                .iter()
                .filter(|(_, queue)| !queue.is_empty())
                .map(|(name, queue)| (name.clone(), queue.len()))
                .collect(),
        }
    }

    /// Headers sent verbatim with every request.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.lock().headers.clone()
    }

    /// Set or replace a transport header.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        crate::config::validate_header(&name, &value)?;
        self.lock().headers.insert(name, value);
        Ok(())
    }

    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.lock().headers.remove(name)
    }

    /// API base URL.
    pub fn api(&self) -> String {
        self.lock().api.clone()
    }

    pub fn set_api(&self, api: impl Into<String>) -> Result<()> {
        let api = api.into();
        if !api.is_empty() {
            url::Url::parse(&api).map_err(|e| WirecallError::Config {
                message: format!("api {:?} is not an absolute URL: {}", api, e),
            })?;
        }
        self.lock().api = api;
        Ok(())
    }

    /// The most recent absorbed failure, if any.
    pub fn last_failure(&self) -> Option<CallFailure> {
        self.lock().last_failure.clone()
    }

    /// Mark the network unresponsive and keep `error` as the last failure.
    pub(crate) fn record_failure(&self, function: &str, error: &WirecallError) {
        let mut inner = self.lock();
        inner.responsive = false;
        inner.last_failure = Some(CallFailure::new(function, error));
    }

    /// Keep `error` as the last failure without touching `responsive`.
    pub(crate) fn record_diagnostic(&self, function: &str, error: &WirecallError) {
        self.lock().last_failure = Some(CallFailure::new(function, error));
    }
}
