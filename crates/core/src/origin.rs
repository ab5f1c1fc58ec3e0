//! Cross-origin grant computation.

/// Origins allowed to read relay responses from a browser.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["https://cdpn.io", "https://pmbaker712.github.io"];

/// Value of `Access-Control-Allow-Headers` attached to granted responses.
pub const ALLOWED_REQUEST_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept";

/// Headers to attach for a request whose origin is on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsGrant {
    /// Echoed request origin.
    pub allow_origin: String,
    /// Allowed request headers.
    pub allow_headers: &'static str,
}

/// Static origin allow-list.
///
/// Requests from other origins are still served; the browser enforces the missing grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginGate {
    allowed: Vec<String>,
}

impl Default for OriginGate {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ORIGINS)
    }
}

impl OriginGate {
    /// Gate allowing exactly the given origins.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Allowed origins.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Exact, case-sensitive match against the allow-list.
    pub fn evaluate(&self, origin: &str) -> Option<CorsGrant> {
        self.allowed.iter().any(|o| o == origin).then(|| CorsGrant {
            allow_origin: origin.to_string(),
            allow_headers: ALLOWED_REQUEST_HEADERS,
        })
    }
}
