//! HTTP verb inference from function names.
//!
//! Rules are evaluated top to bottom and the first match wins. A name that
//! matches nothing falls back to POST. Patterns are searched anywhere in the
//! name, so `forgetUser` resolves through the `get` rule as well.

use crate::error::{Result, WirecallError};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static GET_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"get[A-Z]").unwrap());
static PATCH_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"patch[A-Z]").unwrap());
static PUT_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"put[A-Z]").unwrap());
static DELETE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"delete[A-Z]").unwrap());

/// HTTP verbs a remote function can be called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }

    /// Whether params travel in the request body.
    ///
    /// GET carries them in the `payload` query parameter instead.
    pub fn sends_body(&self) -> bool {
        !matches!(self, HttpVerb::Get)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpVerb> for reqwest::Method {
    fn from(verb: HttpVerb) -> Self {
        match verb {
            HttpVerb::Get => reqwest::Method::GET,
            HttpVerb::Post => reqwest::Method::POST,
            HttpVerb::Put => reqwest::Method::PUT,
            HttpVerb::Patch => reqwest::Method::PATCH,
            HttpVerb::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single naming rule.
#[derive(Debug, Clone)]
pub struct VerbRule {
    pattern: Regex,
    verb: HttpVerb,
}

impl VerbRule {
    pub fn new(pattern: Regex, verb: HttpVerb) -> Self {
        Self { pattern, verb }
    }

    /// Rule for the `{word}[A-Z]` naming convention.
    pub fn prefix_word(word: &str, verb: HttpVerb) -> Result<Self> {
        let pattern = Regex::new(&format!("{}[A-Z]", regex::escape(word))).map_err(|e| {
            WirecallError::Config {
                message: format!("Invalid verb rule for {:?}: {}", word, e),
            }
        })?;
        Ok(Self::new(pattern, verb))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    pub fn verb(&self) -> HttpVerb {
        self.verb
    }
}

/// Ordered verb rules with a fallback.
#[derive(Debug, Clone)]
pub struct VerbRules {
    rules: Vec<VerbRule>,
    fallback: HttpVerb,
}

impl Default for VerbRules {
    fn default() -> Self {
        Self {
            rules: vec![
                VerbRule::new(GET_PREFIX.clone(), HttpVerb::Get),
                VerbRule::new(PATCH_PREFIX.clone(), HttpVerb::Patch),
                VerbRule::new(PUT_PREFIX.clone(), HttpVerb::Put),
                VerbRule::new(DELETE_PREFIX.clone(), HttpVerb::Delete),
            ],
            fallback: HttpVerb::Post,
        }
    }
}

impl VerbRules {
    /// An empty rule list; every name resolves to `fallback`.
    pub fn empty(fallback: HttpVerb) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Append a rule. It is consulted after all existing rules.
    pub fn with_rule(mut self, rule: VerbRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Resolve the verb for a function name.
    pub fn infer(&self, name: &str) -> HttpVerb {
        self.rules
            .iter()
            .find(|rule| rule.matches(name))
            .map(VerbRule::verb)
            .unwrap_or(self.fallback)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
