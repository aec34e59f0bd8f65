//! Bypass policy for fetch interception
//!
//! An ordered table of `{name, matcher, action}` rules evaluated top-down.
//! The first matching rule decides; a request matching no rule is
//! intercepted. Bypassed requests go straight to the network and never
//! touch the generation store.

use crate::http::{Method, Request};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Third-party object storage host served outside the app shell
pub const THIRD_PARTY_STORAGE_HOST: &str = "firebasestorage.googleapis.com";

/// Rule name reported for requests that are not GET
pub const NON_GET_RULE: &str = "non-get";

/// Predicate over a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Host contains the given text
    HostContains(String),
    /// Path contains any of the given segments
    PathContains(Vec<String>),
    /// Path ends with any of the given suffixes
    PathSuffix(Vec<String>),
    /// GET with a query string on a path ending with any of the suffixes
    QueryOnSuffix(Vec<String>),
    /// Method is not one of the given methods
    MethodNotIn(Vec<Method>),
}

impl Matcher {
    pub fn matches(&self, request: &Request) -> bool {
        let path = request.url.path();

        match self {
            Self::HostContains(host) => request
                .url
                .host_str()
                .is_some_and(|h| h.contains(host.as_str())),
            Self::PathContains(segments) => segments.iter().any(|s| path.contains(s.as_str())),
            Self::PathSuffix(suffixes) => suffixes.iter().any(|s| path.ends_with(s.as_str())),
            Self::QueryOnSuffix(suffixes) => {
                request.method == Method::Get
                    && request.url.query().is_some()
                    && suffixes.iter().any(|s| path.ends_with(s.as_str()))
            }
            Self::MethodNotIn(methods) => !methods.contains(&request.method),
        }
    }
}

/// What to do with a matching request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Forward to the network untouched
    Bypass,
    /// Serve through the generation store
    Intercept,
}

/// Named policy entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub matcher: Matcher,
    #[serde(default = "default_action")]
    pub action: RuleAction,
}

fn default_action() -> RuleAction {
    RuleAction::Bypass
}

impl PolicyRule {
    pub fn bypass(name: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            name: name.into(),
            matcher,
            action: RuleAction::Bypass,
        }
    }

    pub fn intercept(name: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            name: name.into(),
            matcher,
            action: RuleAction::Intercept,
        }
    }
}

/// Outcome of evaluating the policy for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward to the network; carries the deciding rule
    Bypass { rule: String },
    /// Serve through the cache; carries the deciding rule, if any
    Intercept { rule: Option<String> },
}

impl Decision {
    pub fn is_bypass(&self) -> bool {
        matches!(self, Self::Bypass { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bypass { rule } => write!(f, "bypass ({})", rule),
            Self::Intercept { rule: Some(rule) } => write!(f, "intercept ({})", rule),
            Self::Intercept { rule: None } => write!(f, "intercept"),
        }
    }
}

/// Ordered rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassPolicy {
    pub rules: Vec<PolicyRule>,
}

impl BypassPolicy {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Policy that intercepts everything
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// First matching rule wins
    pub fn evaluate(&self, request: &Request) -> Decision {
        for rule in &self.rules {
            if rule.matcher.matches(request) {
                return match rule.action {
                    RuleAction::Bypass => Decision::Bypass {
                        rule: rule.name.clone(),
                    },
                    RuleAction::Intercept => Decision::Intercept {
                        rule: Some(rule.name.clone()),
                    },
                };
            }
        }
        Decision::Intercept { rule: None }
    }
}

impl Default for BypassPolicy {
    /// Third-party storage, then dev-server module loads, then non-GET
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self::new(vec![
            PolicyRule::bypass(
                "third-party-storage",
                Matcher::HostContains(THIRD_PARTY_STORAGE_HOST.to_string()),
            ),
            PolicyRule::bypass(
                "dev-source-paths",
                Matcher::PathContains(strings(&[
                    "/src/",
                    "/@vite/",
                    "/@react-refresh",
                    "/@fs/",
                    "/node_modules/",
                ])),
            ),
            PolicyRule::bypass(
                "dev-source-extensions",
                Matcher::PathSuffix(strings(&[".jsx", ".tsx", ".ts"])),
            ),
            PolicyRule::bypass(
                "cache-busted-modules",
                Matcher::QueryOnSuffix(strings(&[".js", ".jsx", ".ts", ".tsx", ".mjs"])),
            ),
            PolicyRule::bypass(NON_GET_RULE, Matcher::MethodNotIn(vec![Method::Get])),
        ])
    }
}
