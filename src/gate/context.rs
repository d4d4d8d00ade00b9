//! # Request context seen by the admission gate.
//!
//! [`HttpContext`] bundles the inbound `http::Request`, the authenticated
//! [`Principal`] (produced by the external auth layer) and a [`HostResponse`]
//! that downstream handlers write into.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Request, StatusCode};

/// Correlation id of one request, stored in the request extensions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One identity attached to a request by the authentication layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Authentication scheme (e.g. `WebJobsAuthLevel`, `Bearer`).
    pub scheme: String,
    /// Whether the identity was authenticated.
    pub authenticated: bool,
    /// Value of the authorization-level claim, if present.
    pub auth_level: Option<String>,
}

impl Identity {
    /// Authenticated identity without an authorization level.
    pub fn authenticated(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            authenticated: true,
            auth_level: None,
        }
    }

    /// Unauthenticated identity; ignored by [`format_identities`].
    pub fn anonymous(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            authenticated: false,
            auth_level: None,
        }
    }

    /// Attaches an authorization-level claim.
    pub fn with_auth_level(mut self, level: impl Into<String>) -> Self {
        self.auth_level = Some(level.into());
        self
    }
}

/// Ordered identity list of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub identities: Vec<Identity>,
}

impl Principal {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }
}

/// Renders the authenticated identities as `(scheme[:level], ...)`.
///
/// Returns an empty string when no identity is authenticated.
///
/// ## Example
/// ```rust
/// use hostvisor::{format_identities, Identity, Principal};
///
/// let p = Principal::new(vec![
///     Identity::authenticated("SchemeA").with_auth_level("X"),
///     Identity::anonymous("Ignored"),
///     Identity::authenticated("SchemeB"),
/// ]);
/// assert_eq!(format_identities(&p), "(SchemeA:X, SchemeB)");
/// assert_eq!(format_identities(&Principal::default()), "");
/// ```
pub fn format_identities(principal: &Principal) -> String {
    let rendered: Vec<String> = principal
        .identities
        .iter()
        .filter(|id| id.authenticated)
        .map(|id| match &id.auth_level {
            Some(level) => format!("{}:{}", id.scheme, level),
            None => id.scheme.clone(),
        })
        .collect();

    if rendered.is_empty() {
        String::new()
    } else {
        format!("({})", rendered.join(", "))
    }
}

/// True if the request path lies under `prefix`, segment-wise and ASCII case-insensitively.
///
/// `/admin` matches `/admin` and `/Admin/host/status`, not `/administrator`.
pub fn is_admin_request<B>(request: &Request<B>, prefix: &str) -> bool {
    let path = request.uri().path().as_bytes();
    let prefix = prefix.trim_end_matches('/').as_bytes();
    if prefix.is_empty() || path.len() < prefix.len() {
        return false;
    }
    path[..prefix.len()].eq_ignore_ascii_case(prefix)
        && matches!(path.get(prefix.len()), None | Some(b'/'))
}

/// Response under construction.
///
/// Once the response has started (body written or headers flushed) its status
/// is frozen: [`HostResponse::set_status`] becomes a no-op.
#[derive(Debug)]
pub struct HostResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    started: bool,
}

impl Default for HostResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            started: false,
        }
    }
}

impl HostResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status; returns `false` (and changes nothing) once started.
    pub fn set_status(&mut self, status: StatusCode) -> bool {
        if self.started {
            return false;
        }
        self.status = status;
        true
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Inserts a header; ignored once started.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        if !self.started {
            self.headers.insert(name, value);
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Marks status and headers as sent.
    pub fn start(&mut self) {
        self.started = true;
    }

    /// Appends to the body, starting the response.
    pub fn write_body(&mut self, bytes: impl AsRef<[u8]>) {
        self.started = true;
        self.body.extend_from_slice(bytes.as_ref());
    }

    pub fn has_started(&self) -> bool {
        self.started
    }
}

/// Per-request state flowing through the gate and the downstream chain.
#[derive(Debug)]
pub struct HttpContext {
    pub request: Request<()>,
    pub user: Principal,
    pub response: HostResponse,
    /// Keys of duplicate headers dropped by the function invocation, if any.
    pub duplicate_headers: Option<String>,
}

impl HttpContext {
    pub fn new(request: Request<()>) -> Self {
        Self {
            request,
            user: Principal::default(),
            response: HostResponse::default(),
            duplicate_headers: None,
        }
    }

    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = user;
        self
    }

    /// Correlation id assigned by the gate, once it ran.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request.extensions().get::<RequestId>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> Request<()> {
        Request::get(path).body(()).unwrap()
    }

    #[test]
    fn test_identities_render_in_source_order() {
        let p = Principal::new(vec![
            Identity::authenticated("SchemeA").with_auth_level("X"),
            Identity::authenticated("SchemeB").with_auth_level("Y"),
        ]);
        assert_eq!(format_identities(&p), "(SchemeA:X, SchemeB:Y)");
    }

    #[test]
    fn test_only_anonymous_identities_render_empty() {
        let p = Principal::new(vec![Identity::anonymous("A").with_auth_level("admin")]);
        assert_eq!(format_identities(&p), "");
    }

    #[test]
    fn test_admin_prefix_is_segment_and_case_insensitive() {
        assert!(is_admin_request(&get("/admin"), "/admin"));
        assert!(is_admin_request(&get("/ADMIN/host/status"), "/admin"));
        assert!(is_admin_request(&get("/admin/"), "/admin/"));
        assert!(!is_admin_request(&get("/administrator"), "/admin"));
        assert!(!is_admin_request(&get("/api/admin"), "/admin"));
        assert!(!is_admin_request(&get("/api/x"), ""));
    }

    #[test]
    fn test_started_response_freezes_status() {
        let mut r = HostResponse::default();
        assert!(r.set_status(StatusCode::ACCEPTED));
        r.write_body("partial");
        assert!(!r.set_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(r.status(), StatusCode::ACCEPTED);
        assert_eq!(r.body(), b"partial");
    }
}
