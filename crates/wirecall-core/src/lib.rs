//! wirecall core - client-side remote function invocation over HTTP.
//!
//! A remote function is declared on the client by name and bundle hash. Calling
//! it serializes the params, picks the HTTP verb from the function name, sends
//! the request and hands back the `result` of the response payload. All calls
//! share a [`DispatchState`] that UI layers poll to see what is in flight and
//! whether the server is reachable.
//!
//! # Example
//!
//! ```rust,ignore
//! use wirecall_core::{CallerContext, ClientConfig, Invoker};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> wirecall_core::Result<()> {
//!     let invoker = Invoker::from_config(ClientConfig::new("http://127.0.0.1:3000"))?;
//!     let get_user = invoker.build("getUser", "a1b2c3");
//!
//!     // GET http://127.0.0.1:3000/rpc/a1b2c3/getUser.json?payload=%7B%22id%22%3A1%7D
//!     let user = get_user
//!         .call(&CallerContext::new("a1b2c3"), Some(json!({"id": 1})))
//!         .await;
//!
//!     if !invoker.dispatch().is_responsive() {
//!         eprintln!("server unreachable: {:?}", invoker.dispatch().last_failure());
//!     }
//!     println!("{:?}", user);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod invoke;
pub mod payload;
pub mod registry;
pub mod status;
pub mod transport;
pub mod verb;

// Re-export commonly used types
pub use config::{ClientConfig, NetworkConfig};
pub use descriptor::{CallerContext, RemoteCall};
pub use dispatch::{CallFailure, DispatchSnapshot, DispatchState, PendingToken, QueueState};
pub use error::{Result, WirecallError};
pub use invoke::{Invoker, InvokerBuilder, RemoteFunction};
pub use payload::{
    parse_timestamp, serialize_params, Envelope, PayloadDeserializer, RemoteValue,
    StructuredDeserializer,
};
pub use registry::VersionRegistry;
pub use status::{PageStatus, StatusSink};
pub use transport::{
    CacheMode, HttpResponse, HttpTransport, RedirectMode, ReferrerPolicy, RemoteRequest,
    RequestPolicy, Transport, TransportResponse,
};
pub use verb::{HttpVerb, VerbRule, VerbRules};
