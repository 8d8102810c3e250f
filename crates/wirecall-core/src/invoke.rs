//! Remote function invocation.
//!
//! [`Invoker::build`] turns a function name and bundle hash into a
//! [`RemoteFunction`]. Building is pure; each [`RemoteFunction::call`] runs
//! one round trip:
//! 1. Enqueue the params in the dispatch state (marks `fetching`)
//! 2. Build the request: effective hash, path, verb, body or `payload` query
//! 3. Send, record the status, read and deserialize the body
//! 4. Set `responsive` from the outcome, absorbing any error
//! 5. Drain the entry and recompute `fetching`
//!
//! Callers never see an error. They get `None` and poll
//! [`DispatchState::is_responsive`] or [`DispatchState::last_failure`].

use crate::config::{ClientConfig, NetworkConfig};
use crate::descriptor::{CallerContext, RemoteCall};
use crate::dispatch::{DispatchState, PendingToken};
use crate::error::{Result, WirecallError};
use crate::payload::{serialize_params, PayloadDeserializer, RemoteValue, StructuredDeserializer};
use crate::registry::VersionRegistry;
use crate::status::{PageStatus, StatusSink};
use crate::transport::{HttpTransport, RemoteRequest, RequestPolicy, Transport, TransportResponse};
use crate::verb::{HttpVerb, VerbRules};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

struct InvokerShared<T> {
    dispatch: Arc<DispatchState>,
    transport: T,
    status: Arc<dyn StatusSink>,
    deserializer: Arc<dyn PayloadDeserializer>,
    registry: Arc<VersionRegistry>,
    verbs: VerbRules,
    prefix: String,
    hot_reload: bool,
}

/// Factory for [`RemoteFunction`]s sharing one dispatch state and transport.
pub struct Invoker<T: Transport = HttpTransport> {
    shared: Arc<InvokerShared<T>>,
}

impl<T: Transport> Clone for Invoker<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Invoker<HttpTransport> {
    /// Create an invoker using the `reqwest` transport.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        InvokerBuilder::new(config, transport).build()
    }
}

impl<T: Transport> Invoker<T> {
    /// Create a builder for an invoker over `transport`.
    pub fn builder(config: ClientConfig, transport: T) -> InvokerBuilder<T> {
        InvokerBuilder::new(config, transport)
    }

    /// Bind a remote function. No I/O happens until it is called.
    pub fn build(&self, name: impl Into<String>, hash: impl Into<String>) -> RemoteFunction<T> {
        RemoteFunction {
            call: RemoteCall::new(name, hash),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn dispatch(&self) -> &Arc<DispatchState> {
        &self.shared.dispatch
    }

    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.shared.registry
    }

    pub fn verb_rules(&self) -> &VerbRules {
        &self.shared.verbs
    }
}

/// Builder for configuring an [`Invoker`].
///
/// # Example
///
/// ```rust,ignore
/// use wirecall_core::{ClientConfig, HttpTransport, Invoker};
///
/// let config = ClientConfig::new("http://127.0.0.1:3000");
/// let transport = HttpTransport::from_config(&config)?;
/// let invoker = Invoker::builder(config, transport)
///     .status_sink(page.clone())
///     .build()?;
/// ```
pub struct InvokerBuilder<T> {
    config: ClientConfig,
    transport: T,
    dispatch: Option<Arc<DispatchState>>,
    status: Option<Arc<dyn StatusSink>>,
    deserializer: Option<Arc<dyn PayloadDeserializer>>,
    registry: Option<Arc<VersionRegistry>>,
    verbs: VerbRules,
}

impl<T: Transport> InvokerBuilder<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            dispatch: None,
            status: None,
            deserializer: None,
            registry: None,
            verbs: VerbRules::default(),
        }
    }

    /// Share an existing dispatch state.
    ///
    /// The config's `api` and `headers` are ignored in favor of the ones the
    /// state already holds.
    pub fn dispatch(mut self, dispatch: Arc<DispatchState>) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Where response status codes are reported. Default: a private [`PageStatus`].
    pub fn status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// Payload deserializer. Default: [`StructuredDeserializer`].
    pub fn deserializer(mut self, deserializer: Arc<dyn PayloadDeserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }

    /// Version registry consulted in hot-reload mode.
    pub fn registry(mut self, registry: Arc<VersionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn verb_rules(mut self, verbs: VerbRules) -> Self {
        self.verbs = verbs;
        self
    }

    pub fn build(self) -> Result<Invoker<T>> {
        self.config.validate()?;

        let dispatch = self.dispatch.unwrap_or_else(|| {
            Arc::new(DispatchState::with_headers(
                self.config.api.clone(),
                self.config.headers.clone(),
            ))
        });

        Ok(Invoker {
            shared: Arc::new(InvokerShared {
                dispatch,
                transport: self.transport,
                status: self.status.unwrap_or_else(|| Arc::new(PageStatus::new())),
                deserializer: self
                    .deserializer
                    .unwrap_or_else(|| Arc::new(StructuredDeserializer::new())),
                registry: self.registry.unwrap_or_default(),
                verbs: self.verbs,
                prefix: self.config.prefix.trim_matches('/').to_string(),
                hot_reload: self.config.hot_reload,
            }),
        })
    }
}

/// A callable bound to one remote function.
pub struct RemoteFunction<T: Transport = HttpTransport> {
    call: RemoteCall,
    shared: Arc<InvokerShared<T>>,
}

impl<T: Transport> Clone for RemoteFunction<T> {
    fn clone(&self) -> Self {
        Self {
            call: self.call.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Drains a pending entry when dropped.
///
/// Covers both normal completion and a caller dropping the call future.
struct PendingGuard<'a> {
    dispatch: &'a DispatchState,
    name: &'a str,
    token: PendingToken,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let fetching = self.dispatch.drain(self.name, self.token);
        debug!(
            "Drained {} (token {}), fetching={}",
            self.name,
            self.token.id(),
            fetching
        );
    }
}

impl<T: Transport> RemoteFunction<T> {
    pub fn descriptor(&self) -> &RemoteCall {
        &self.call
    }

    /// The verb this function is called with.
    pub fn verb(&self) -> HttpVerb {
        self.shared.verbs.infer(self.call.name())
    }

    /// Call the remote function.
    ///
    /// `None` params are sent as `{}`. Returns the payload's `result`, or
    /// `None` when the call failed or the payload carried no result.
    pub async fn call(&self, caller: &CallerContext, params: Option<Value>) -> Option<RemoteValue> {
        let params = params.unwrap_or_else(|| json!({}));
        let name = self.call.name();
        let dispatch = &*self.shared.dispatch;

        let token = dispatch.enqueue(name, params.clone());
        let _pending = PendingGuard {
            dispatch,
            name,
            token,
        };

        match self.round_trip(caller, &params).await {
            Ok(result) => {
                dispatch.set_responsive(true);
                result
            }
            Err(e) => {
                warn!("Call to {} failed: {}", self.call, e);
                dispatch.record_failure(name, &e);
                None
            }
        }
    }

    /// Call and convert the result into `R`.
    ///
    /// Timestamps reach `R` as RFC 3339 strings. A result that does not fit
    /// `R` yields `None` and is kept as the dispatch state's last failure
    /// without touching `responsive`.
    pub async fn call_as<R: DeserializeOwned>(
        &self,
        caller: &CallerContext,
        params: Option<Value>,
    ) -> Option<R> {
        let value = self.call(caller, params).await?;
        match serde_json::from_value(value.to_json()) {
            Ok(converted) => Some(converted),
            Err(e) => {
                let err = WirecallError::from(e);
                warn!("Result of {} did not convert: {}", self.call, err);
                self.shared.dispatch.record_diagnostic(self.call.name(), &err);
                None
            }
        }
    }

    /// Build the outbound request without sending it or touching queues.
    pub fn request(&self, caller: &CallerContext, params: &Value) -> Result<RemoteRequest> {
        let verb = self.verb();
        let body = serialize_params(params)?;

        let mut url = self.target_url(caller);
        let body = if verb.sends_body() {
            Some(body)
        } else {
            url.push('?');
            url.push_str(NetworkConfig::PAYLOAD_QUERY_KEY);
            url.push('=');
            url.push_str(&urlencoding::encode(&body));
            None
        };

        Ok(RemoteRequest {
            verb,
            url,
            headers: self.shared.dispatch.headers(),
            body,
            policy: RequestPolicy::REMOTE_CALL,
        })
    }

    /// `{api}/{prefix}/[{version}/]{effective_hash}/{name}.json`
    fn target_url(&self, caller: &CallerContext) -> String {
        let api = self.shared.dispatch.api();
        let api = api.trim_end_matches('/');
        let effective_hash = self.call.effective_hash(caller);

        let mut segments: Vec<&str> = Vec::with_capacity(4);
        if !self.shared.prefix.is_empty() {
            segments.push(&self.shared.prefix);
        }

        let version = if self.shared.hot_reload {
            let version = self
                .shared
                .registry
                .resolve(self.call.hash(), self.call.name());
            if version.is_none() {
                warn!("No hot-reload version registered for {}", self.call);
            }
            version
        } else {
            None
        };
        if let Some(version) = version.as_deref() {
            segments.push(version);
        }
        segments.push(&effective_hash);

        format!(
            "{}/{}/{}{}",
            api,
            segments.join("/"),
            self.call.name(),
            NetworkConfig::PATH_SUFFIX
        )
    }

    async fn round_trip(
        &self,
        caller: &CallerContext,
        params: &Value,
    ) -> Result<Option<RemoteValue>> {
        let request = self.request(caller, params)?;
        let response = self.shared.transport.send(request).await?;
        self.shared.status.record_status(response.status());

        let text = response.text().await?;
        let envelope = self.shared.deserializer.deserialize(&text)?;
        Ok(envelope.result)
    }
}
