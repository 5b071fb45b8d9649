//! Common test utilities for API testing with mock instances.
//!
//! This module provides a test fixture that creates an in-process router
//! over a registry of `MockInstance`s, so the whole API can be driven without
//! a running qBittorrent.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use qbfleet_core::testing::MockInstance;
use qbfleet_core::{
    Config, EndpointConfig, InstanceApi, InstanceRegistry, LivenessConfig, ServerConfig,
};

/// Re-export fixtures for test convenience
pub use qbfleet_core::testing::fixtures;

const BOUNDARY: &str = "qbfleet-test-boundary";

/// Test fixture for API testing with mock instances.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_list_torrents() {
///     let fixture = TestFixture::new(&["http://qb1:8080"]).await;
///     fixture.instance(0).add_torrent(...).await;
///
///     let response = fixture.get("/api/v1/torrents").await;
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock instances, in the order given
    pub instances: Vec<Arc<MockInstance>>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// One part of a multipart request.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

impl TestFixture {
    /// Create a fixture with one empty mock instance per address.
    pub async fn new(addresses: &[&str]) -> Self {
        let instances: Vec<Arc<MockInstance>> = addresses
            .iter()
            .map(|a| Arc::new(MockInstance::new(a)))
            .collect();

        let registry = Arc::new(InstanceRegistry::from_sessions(
            instances
                .iter()
                .map(|i| Arc::clone(i) as Arc<dyn InstanceApi>),
        ));

        let config = Config {
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            endpoints: addresses
                .iter()
                .map(|a| EndpointConfig {
                    url: a.to_string(),
                    username: "admin".to_string(),
                    password: "adminadmin".to_string(),
                    timeout_secs: 5,
                })
                .collect(),
            liveness: LivenessConfig {
                enabled: false,
                ..Default::default()
            },
        };

        let state = Arc::new(qbfleet_server::state::AppState::new(config, registry));
        let router = qbfleet_server::api::create_router(state);

        Self { router, instances }
    }

    pub fn instance(&self, index: usize) -> &Arc<MockInstance> {
        &self.instances[index]
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a multipart/form-data POST request.
    pub async fn post_multipart(&self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, filename, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            name, filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: application/x-bittorrent\r\n\r\n");
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body_bytes).into_owned())
            })
        };

        TestResponse { status, body }
    }
}

/// Percent-encode an instance address for use as a path segment.
pub fn encode_instance(address: &str) -> String {
    address
        .replace('%', "%25")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
