//! Outbound request model and the HTTP transport seam.
//!
//! [`Transport`] is split in two steps, `send` and [`TransportResponse::text`],
//! because the invoker records the status code as soon as headers arrive and
//! only then reads the body.

use crate::config::{ClientConfig, NetworkConfig};
use crate::error::{Result, WirecallError};
use crate::verb::HttpVerb;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::{redirect, Client, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Cache behavior requested of intermediaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Default,
    NoCache,
}

/// What to do when the server answers with a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Follow up to [`NetworkConfig::MAX_REDIRECTS`] hops.
    Follow,
    /// Fail the request on any 3xx response.
    Error,
}

/// Whether a `Referer` header is sent on redirected hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferrerPolicy {
    NoReferrer,
    /// Send the previous URL as `Referer` when following a redirect.
    Default,
}

/// Transport options attached to every request.
///
/// A native client has no page origin and no ambient cookie jar, so there is
/// no request mode or credentials option: session credentials travel as
/// explicit dispatch headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    pub cache: CacheMode,
    pub redirect: RedirectMode,
    pub referrer: ReferrerPolicy,
}

impl RequestPolicy {
    /// The fixed policy every remote call uses.
    pub const REMOTE_CALL: RequestPolicy = RequestPolicy {
        cache: CacheMode::NoCache,
        redirect: RedirectMode::Follow,
        referrer: ReferrerPolicy::NoReferrer,
    };
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self::REMOTE_CALL
    }
}

/// A fully built outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub verb: HttpVerb,
    /// Absolute URL, including the `payload` query for GET.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Serialized params; `None` for GET.
    pub body: Option<String>,
    pub policy: RequestPolicy,
}

/// A response whose headers have arrived.
#[async_trait]
pub trait TransportResponse: Send {
    fn status(&self) -> u16;

    /// Read the remaining body as text.
    async fn text(self) -> Result<String>;
}

/// Executes [`RemoteRequest`]s.
#[async_trait]
pub trait Transport: Send + Sync {
    type Response: TransportResponse;

    async fn send(&self, request: RemoteRequest) -> Result<Self::Response>;
}

#[async_trait]
impl<T: Transport> Transport for std::sync::Arc<T> {
    type Response = T::Response;

    async fn send(&self, request: RemoteRequest) -> Result<T::Response> {
        (**self).send(request).await
    }
}

/// `reqwest`-backed transport.
///
/// reqwest fixes redirect and referer handling per client, so one client is
/// kept for each combination a [`RequestPolicy`] can ask for.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Follows redirects, never sends `Referer`.
    client: Client,
    /// Follows redirects and sends `Referer` on each hop.
    referring: Client,
    /// Does not follow redirects.
    direct: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport with no request timeout.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a transport that gives up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::build(Some(timeout))
    }

    /// Create a transport from a client config.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::build(config.request_timeout())
    }

    fn build(timeout: Option<Duration>) -> Result<Self> {
        let following = || redirect::Policy::limited(NetworkConfig::MAX_REDIRECTS);
        Ok(Self {
            client: Self::client(following(), false, timeout)?,
            referring: Self::client(following(), true, timeout)?,
            direct: Self::client(redirect::Policy::none(), false, timeout)?,
            timeout,
        })
    }

    fn client(policy: redirect::Policy, referer: bool, timeout: Option<Duration>) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .redirect(policy)
            .referer(referer);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder.build().map_err(|e| WirecallError::Network {
            message: format!("Failed to create HTTP client: {}", e),
            cause: None,
        })
    }

    fn client_for(&self, policy: &RequestPolicy) -> &Client {
        match (policy.redirect, policy.referrer) {
            (RedirectMode::Error, _) => &self.direct,
            (RedirectMode::Follow, ReferrerPolicy::NoReferrer) => &self.client,
            (RedirectMode::Follow, ReferrerPolicy::Default) => &self.referring,
        }
    }

    /// Get a reference to the client used for [`RequestPolicy::REMOTE_CALL`].
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn header_map(request: &RemoteRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| WirecallError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| WirecallError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        if request.policy.cache == CacheMode::NoCache {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        }

        Ok(headers)
    }
}

/// Map a reqwest failure, reporting timeouts with the configured duration.
fn request_error(err: reqwest::Error, timeout: Option<Duration>, context: &str) -> WirecallError {
    if err.is_timeout() {
        WirecallError::Timeout(timeout.unwrap_or_default())
    } else {
        WirecallError::Network {
            message: format!("{} failed: {}", context, err),
            cause: std::error::Error::source(&err).map(|s| s.to_string()),
        }
    }
}

/// Response half of [`HttpTransport`].
#[derive(Debug)]
pub struct HttpResponse {
    response: Response,
    timeout: Option<Duration>,
}

#[async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    async fn text(self) -> Result<String> {
        let context = format!("Reading body from {}", self.response.url());
        let timeout = self.timeout;
        self.response
            .text()
            .await
            .map_err(|e| request_error(e, timeout, &context))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    type Response = HttpResponse;

    async fn send(&self, request: RemoteRequest) -> Result<HttpResponse> {
        let headers = Self::header_map(&request)?;
        debug!("{} {}", request.verb, request.url);

        let mut builder = self
            .client_for(&request.policy)
            .request(request.verb.into(), &request.url)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            request_error(e, self.timeout, &format!("{} {}", request.verb, request.url))
        })?;

        if request.policy.redirect == RedirectMode::Error && response.status().is_redirection() {
            return Err(WirecallError::Network {
                message: format!(
                    "{} {} was redirected ({}) but redirects are refused",
                    request.verb,
                    request.url,
                    response.status()
                ),
                cause: None,
            });
        }

        Ok(HttpResponse {
            response,
            timeout: self.timeout,
        })
    }
}
