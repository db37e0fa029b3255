// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP transport.
//!
//! Everything above this module talks to the backend through the
//! [`Transport`] trait, so the synchronizer can run against
//! [`MockTransport`] in tests.
//!
//! # Implementations
//!
//! - `HttpTransport` -- `reqwest` blocking client
//! - `MockTransport` -- scripted responses plus a call log

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// HTTP methods used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request/response collaborator.
pub trait Transport {
    /// Send one request.
    ///
    /// # Arguments
    ///
    /// - `path` -- absolute URL or path below the configured base URL
    /// - `body` -- JSON body, if any
    /// - `token` -- bearer token, if any
    ///
    /// Returns the parsed body when the response is JSON, `None` otherwise.
    /// Any non-2xx status is reported as [`Error::Http`].
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Option<Value>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Option<Value>> {
        (**self).request(method, path, body, token)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Option<Value>> {
        (**self).request(method, path, body, token)
    }
}

// ============================================================================
// reqwest implementation
// ============================================================================

/// Blocking HTTP transport.
///
/// No explicit timeout is set; the `reqwest` default applies.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the configured backend.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("trafsplit/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

impl Transport for HttpTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Option<Value>> {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut req = self.client.request(method.into(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }

        let response = req.send()?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let body = if text.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                text
            };
            tracing::warn!("{} {} -> {}", method, url, status.as_u16());
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Ok(None);
        }

        let text = response.text()?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// One request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub token: Option<String>,
}

/// Scripted response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    Empty,
    Status(u16, String),
}

impl MockResponse {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        MockResponse::Status(status, body.into())
    }
}

/// In-memory transport for tests.
///
/// Scripted routes match on exact method and path. Unscripted `POST`s to a
/// collection (`/api/domains`, `/api/tests`, `/api/variants`,
/// `/api/endpoints`, `/api/variants/{id}/endpoints`) echo the body back with
/// a generated id (`gen-1`, `gen-2`, ...). Other unscripted `GET`s answer
/// 404; everything else answers with an empty body.
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), MockResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
    next_id: Mutex<u64>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Script a response for `method path`.
    pub fn on(&self, method: Method, path: impl Into<String>, response: MockResponse) -> &Self {
        let mut routes = match self.routes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        routes.insert((method, path.into()), response);
        self
    }

    /// Script a JSON body for `method path`.
    pub fn on_json(&self, method: Method, path: impl Into<String>, body: Value) -> &Self {
        self.on(method, path, MockResponse::Json(body))
    }

    /// Every call so far, in dispatch order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Calls matching `method` whose path starts with `prefix`.
    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .collect()
    }

    /// Number of calls matching `method` whose path starts with `prefix`.
    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.calls_to(method, prefix).len()
    }

    /// Forget recorded calls, keeping scripted routes.
    pub fn clear_calls(&self) {
        match self.calls.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn generate_id(&self) -> String {
        let mut next = match self.next_id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = format!("gen-{}", *next);
        *next += 1;
        id
    }

    fn id_field(path: &str) -> Option<&'static str> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["api", "domains"] => Some("domain_id"),
            ["api", "tests"] => Some("test_id"),
            ["api", "variants"] => Some("variant_id"),
            ["api", "endpoints"] => Some("endpoint_id"),
            ["api", "variants", _, "endpoints"] => Some("endpoint_id"),
            _ => None,
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Option<Value>> {
        {
            let mut calls = match self.calls.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            calls.push(RecordedCall {
                method,
                path: path.to_string(),
                body: body.cloned(),
                token: token.map(str::to_string),
            });
        }

        let scripted = {
            let routes = match self.routes.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            routes.get(&(method, path.to_string())).cloned()
        };

        match scripted {
            Some(MockResponse::Json(value)) => Ok(Some(value)),
            Some(MockResponse::Empty) => Ok(None),
            Some(MockResponse::Status(status, body)) => Err(Error::Http { status, body }),
            None => match (method, Self::id_field(path)) {
                (Method::Post, Some(field)) => {
                    let mut echo = body.cloned().unwrap_or_else(|| Value::Object(Default::default()));
                    if let Value::Object(map) = &mut echo {
                        map.insert(field.to_string(), Value::String(self.generate_id()));
                    }
                    Ok(Some(echo))
                }
                (Method::Get, _) => Err(Error::Http {
                    status: 404,
                    body: format!("no route for GET {}", path),
                }),
                _ => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_records_calls() {
        let mock = MockTransport::new();
        mock.request(Method::Delete, "/api/variants/v1", None, Some("tok"))
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::Delete);
        assert_eq!(calls[0].path, "/api/variants/v1");
        assert_eq!(calls[0].token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_mock_generates_ids_on_create() {
        let mock = MockTransport::new();
        let body = json!({ "name": "A", "weight": 1.0 });
        let first = mock
            .request(Method::Post, "/api/variants", Some(&body), None)
            .unwrap()
            .unwrap();
        let second = mock
            .request(Method::Post, "/api/variants/v1/endpoints", Some(&json!({"url": "http://a"})), None)
            .unwrap()
            .unwrap();

        assert_eq!(first["variant_id"], json!("gen-1"));
        assert_eq!(first["name"], json!("A"));
        assert_eq!(second["endpoint_id"], json!("gen-2"));
    }

    #[test]
    fn test_mock_scripted_failure() {
        let mock = MockTransport::new();
        mock.on(
            Method::Put,
            "/api/tests/t1",
            MockResponse::status(500, "boom"),
        );
        let err = mock
            .request(Method::Put, "/api/tests/t1", Some(&json!({})), None)
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_mock_unscripted_get_is_not_found() {
        let mock = MockTransport::new();
        let err = mock.request(Method::Get, "/api/tests/t9", None, None).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_http_transport_url_join() {
        let config = ClientConfig::builder()
            .api_base_url("http://backend:8080/")
            .build();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://backend:8080");
        assert_eq!(transport.url("/api/domains"), "http://backend:8080/api/domains");
        assert_eq!(transport.url("https://other/x"), "https://other/x");
    }
}
