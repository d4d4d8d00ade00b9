//! # Collaborators of the admission gate.
//!
//! - [`Next`]: the downstream handler chain
//! - [`HostHooks`]: host naming, drain condition and per-request features
//! - [`OfflineResponder`]: content of the offline response

use std::path::Path;

use async_trait::async_trait;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Request, StatusCode};

use super::context::{HostResponse, HttpContext};
use crate::error::HostError;

/// Downstream handler chain invoked for admitted requests.
#[async_trait]
pub trait Next: Send + Sync + 'static {
    async fn run(&self, ctx: &mut HttpContext) -> Result<(), HostError>;
}

/// Host-side hooks applied around every request.
///
/// All methods have no-op defaults.
#[async_trait]
pub trait HostHooks: Send + Sync + 'static {
    /// Synchronizes host naming metadata from the request.
    fn synchronize_host_name(&self, _request: &Request<()>) {}

    /// True while the environment asks requests to be held back (draining).
    fn delay_requests_enabled(&self) -> bool {
        false
    }

    /// Completes once the drain condition cleared.
    async fn delay_completion(&self) {}

    /// Attaches per-request features (service scope) before the downstream runs.
    fn apply_features(&self, _ctx: &mut HttpContext) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl HostHooks for NoopHooks {}

/// Writes the response for a host that is offline.
#[async_trait]
pub trait OfflineResponder: Send + Sync + 'static {
    async fn respond(&self, response: &mut HostResponse, script_path: &Path) -> Result<(), HostError>;
}

/// Name of the offline page looked up under the script root.
pub const APP_OFFLINE_FILE: &str = "app_offline.htm";

const DEFAULT_OFFLINE_PAGE: &str = "<!DOCTYPE html><html><head><title>Function host is offline</title></head>\
<body><h1>Function host is offline</h1><p>The function application is currently offline.</p></body></html>";

/// Responds 503 with `<script_path>/app_offline.htm`, or a built-in page if missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOfflineResponder;

#[async_trait]
impl OfflineResponder for FileOfflineResponder {
    async fn respond(&self, response: &mut HostResponse, script_path: &Path) -> Result<(), HostError> {
        let path = script_path.join(APP_OFFLINE_FILE);
        let page = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_OFFLINE_PAGE.as_bytes().to_vec(),
            Err(e) => {
                return Err(HostError::Internal(
                    anyhow::Error::new(e).context(format!("reading {}", path.display())),
                ));
            }
        };

        response.set_status(StatusCode::SERVICE_UNAVAILABLE);
        response.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response.write_body(page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_app_offline_file() {
        let dir = std::env::temp_dir().join(format!("hostvisor-offline-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(APP_OFFLINE_FILE), "maintenance").await.unwrap();

        let mut response = HostResponse::default();
        FileOfflineResponder.respond(&mut response, &dir).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body(), b"maintenance");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_builtin_page() {
        let dir = std::env::temp_dir().join(format!("hostvisor-missing-{}", uuid::Uuid::new_v4()));

        let mut response = HostResponse::default();
        FileOfflineResponder.respond(&mut response, &dir).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.has_started());
        assert!(String::from_utf8_lossy(response.body()).contains("offline"));
    }
}
