//! Routing entries declared by module interfaces.
//!
//! A [`RoutingEntry`] tells the gateway which requests a module wants to see
//! and at which point of the proxy pipeline:
//!
//! ```text
//! pre filters ──► auth filters ──► handlers (+ redirects) ──► post filters
//! ```
//!
//! Path patterns are slash-separated segments:
//!
//! ```text
//! /users/{id}      `{id}` matches exactly one non-empty segment
//! /files/*         `*` (last segment only) matches any remainder
//! /users           literal segments match themselves
//! ```
//!
//! A plain `path` is a literal prefix: `/users` also matches `/users/42`.

use serde::{Deserialize, Serialize};

/// Default levels per pipeline position, used when an entry omits `level`.
pub const AUTH_LEVEL: i32 = 10;
pub const PRE_LEVEL: i32 = 40;
pub const HANDLER_LEVEL: i32 = 50;
pub const POST_LEVEL: i32 = 60;

/// Filter phase of a routing entry.  Entries without a phase are handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pre,
    Auth,
    Post,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Auth => "auth",
            Phase::Post => "post",
        }
    }
}

/// How the gateway talks to the module for a matched entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyType {
    /// Full request in, response body flows on to the next step.
    #[default]
    RequestResponse,
    /// Full request in, response body is not chained.
    RequestOnly,
    /// Only headers are sent; response headers are merged.
    Headers,
    /// No call; the request is re-matched at `redirectPath`.
    Redirect,
    /// Gateway-internal calls such as tenant initialisation.
    System,
}

impl ProxyType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyType::RequestResponse => "request-response",
            ProxyType::RequestOnly => "request-only",
            ProxyType::Headers => "headers",
            ProxyType::Redirect => "redirect",
            ProxyType::System => "system",
        }
    }
}

/// One path/method matcher of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingEntry {
    /// Accepted methods; `*` accepts all.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Literal path prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Segment pattern with `{name}` placeholders and a trailing `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Priority within the phase, lower runs first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(rename = "type", default)]
    pub proxy_type: ProxyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_desired: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_permissions: Option<Vec<String>>,
}

impl RoutingEntry {
    /// Handler entry for `pattern` accepting `methods`.
    pub fn handler(methods: &[&str], pattern: impl Into<String>) -> Self {
        Self {
            methods: methods.iter().map(|m| m.to_string()).collect(),
            path_pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Filter entry for `pattern` in `phase`, accepting every method.
    pub fn filter(phase: Phase, pattern: impl Into<String>) -> Self {
        Self {
            methods: vec!["*".to_string()],
            path_pattern: Some(pattern.into()),
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Builder: set an explicit level.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Builder: set the proxy type.
    pub fn with_type(mut self, proxy_type: ProxyType) -> Self {
        self.proxy_type = proxy_type;
        self
    }

    /// Builder: turn this entry into a redirect to `target`.
    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.proxy_type = ProxyType::Redirect;
        self.redirect_path = Some(target.into());
        self
    }

    /// Builder: required permissions.
    pub fn with_permissions_required(mut self, perms: &[&str]) -> Self {
        self.permissions_required = Some(perms.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Level used for ordering: the declared one or the phase default.
    pub fn effective_level(&self) -> i32 {
        self.level.unwrap_or(match self.phase {
            Some(Phase::Auth) => AUTH_LEVEL,
            Some(Phase::Pre) => PRE_LEVEL,
            Some(Phase::Post) => POST_LEVEL,
            None => HANDLER_LEVEL,
        })
    }

    pub fn is_handler(&self) -> bool {
        self.phase.is_none()
    }

    /// The declared pattern text (`pathPattern` wins over `path`).
    pub fn pattern_text(&self) -> &str {
        self.path_pattern
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or_default()
    }

    pub fn matches_method(&self, method: &str) -> bool {
        self.methods
            .iter()
            .any(|m| m == "*" || m.eq_ignore_ascii_case(method))
    }

    /// Parsed segments of this entry.  A plain `path` becomes its literal
    /// segments followed by a wildcard.
    pub fn segments(&self) -> Result<Vec<PatternSegment>, String> {
        match (&self.path_pattern, &self.path) {
            (Some(pattern), _) => parse_pattern(pattern),
            (None, Some(path)) => {
                let mut segments = parse_pattern(path.trim_end_matches('/'))?;
                if segments
                    .iter()
                    .any(|s| !matches!(s, PatternSegment::Literal(_)))
                {
                    return Err(format!("path '{path}' must be literal"));
                }
                segments.push(PatternSegment::Wildcard);
                Ok(segments)
            }
            (None, None) => Err("routing entry needs a path or pathPattern".to_string()),
        }
    }
}

/// One compiled segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    Literal(String),
    Placeholder(String),
    /// Matches the remaining segments (possibly none).
    Wildcard,
}

/// Parse a pattern into segments.  `"/"` and `""` are the root (no
/// segments).
pub fn parse_pattern(pattern: &str) -> Result<Vec<PatternSegment>, String> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pattern.strip_prefix('/') else {
        return Err(format!("pattern '{pattern}' must start with '/'"));
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let raw: Vec<&str> = rest.split('/').collect();
    let mut segments = Vec::with_capacity(raw.len());
    for (pos, seg) in raw.iter().enumerate() {
        if *seg == "*" {
            if pos + 1 != raw.len() {
                return Err(format!("'*' must be the last segment in '{pattern}'"));
            }
            segments.push(PatternSegment::Wildcard);
        } else if let Some(name) = seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(format!("invalid placeholder '{seg}' in '{pattern}'"));
            }
            segments.push(PatternSegment::Placeholder(name.to_string()));
        } else if seg.contains(['{', '}', '*']) {
            return Err(format!("invalid segment '{seg}' in '{pattern}'"));
        } else {
            segments.push(PatternSegment::Literal(seg.to_string()));
        }
    }
    Ok(segments)
}
