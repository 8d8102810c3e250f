//! Remote call descriptors and call-site context.

use std::fmt;

/// Identifies a server-side function and the client build that declared it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteCall {
    name: String,
    hash: String,
}

impl RemoteCall {
    pub fn new(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
        }
    }

    /// Logical function name, e.g. `getUser`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build hash of the bundle exposing the function.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Path segment used to route the call.
    ///
    /// A call made from a different build than the one that declared it is
    /// addressed as `{hash}-{caller_hash}` so the server can pick between
    /// co-deployed versions.
    pub fn effective_hash(&self, caller: &CallerContext) -> String {
        if self.hash == caller.hash {
            self.hash.clone()
        } else {
            format!("{}-{}", self.hash, caller.hash)
        }
    }
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.hash)
    }
}

/// The build hash of whoever is making the call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerContext {
    hash: String,
}

impl CallerContext {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl From<&RemoteCall> for CallerContext {
    /// A caller living in the same build as the callee.
    fn from(call: &RemoteCall) -> Self {
        Self::new(call.hash())
    }
}
