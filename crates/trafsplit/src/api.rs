// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed client for the backend REST API.
//!
//! One method per route. Request bodies are shallow (children are always
//! written through their own collection).

use crate::error::{Error, Result};
use crate::model::{Domain, Endpoint, Identified, Test, Variant};
use crate::transport::{Method, Transport};
use crate::validate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `POST /api/auth/login` body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct LoginResponse {
    token: String,
}

/// REST client bound to one transport and an optional bearer token.
pub struct ApiClient<T: Transport> {
    transport: T,
    token: Option<String>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        self.transport
            .request(method, path, body, self.token.as_deref())
    }

    fn get<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        let value = self.call(Method::Get, path, None)?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    fn get_list<D: DeserializeOwned>(&self, path: &str) -> Result<Vec<D>> {
        match self.call(Method::Get, path, None)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    fn send<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<Option<Value>> {
        let body = serde_json::to_value(body)?;
        self.call(method, path, Some(&body))
    }

    fn create<B, D>(&self, path: &str, body: &B, kind: &'static str) -> Result<D>
    where
        B: Serialize,
        D: DeserializeOwned + Identified,
    {
        let value = self
            .send(Method::Post, path, body)?
            .ok_or(Error::MissingId { kind })?;
        let created: D = serde_json::from_value(value)?;
        if !created.is_saved() {
            return Err(Error::MissingId { kind });
        }
        Ok(created)
    }

    // ------------------------------------------------------------------
    // auth
    // ------------------------------------------------------------------

    /// Log in and keep the returned bearer token.
    pub fn login(&mut self, login: &str, password: &str) -> Result<String> {
        let value = self
            .send(Method::Post, "/api/auth/login", &LoginRequest { login, password })?
            .unwrap_or(Value::Null);
        let response: LoginResponse = serde_json::from_value(value)?;
        self.token = Some(response.token.clone());
        Ok(response.token)
    }

    // ------------------------------------------------------------------
    // domains
    // ------------------------------------------------------------------

    pub fn domains(&self) -> Result<Vec<Domain>> {
        self.get_list("/api/domains")
    }

    pub fn domain(&self, id: &str) -> Result<Domain> {
        self.get(&format!("/api/domains/{}", id))
    }

    /// Create a domain; the returned copy carries the new id.
    pub fn create_domain(&self, domain: &Domain) -> Result<Domain> {
        validate::domain(&domain.shallow())?;
        self.create("/api/domains", &domain.shallow(), "domain")
    }

    pub fn update_domain(&self, id: &str, domain: &Domain) -> Result<()> {
        let body = Domain {
            domain_id: Some(id.to_string()),
            ..domain.shallow()
        };
        self.send(Method::Put, &format!("/api/domains/{}", id), &body)?;
        Ok(())
    }

    /// Delete a domain. The backend drops its tests and endpoints.
    pub fn delete_domain(&self, id: &str) -> Result<()> {
        self.call(Method::Delete, &format!("/api/domains/{}", id), None)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // tests
    // ------------------------------------------------------------------

    pub fn test(&self, id: &str) -> Result<Test> {
        self.get(&format!("/api/tests/{}", id))
    }

    pub fn create_test(&self, test: &Test) -> Result<Test> {
        self.create("/api/tests", &test.shallow(), "test")
    }

    pub fn update_test(&self, id: &str, test: &Test) -> Result<()> {
        let body = Test {
            test_id: Some(id.to_string()),
            ..test.shallow()
        };
        self.send(Method::Put, &format!("/api/tests/{}", id), &body)?;
        Ok(())
    }

    pub fn delete_test(&self, id: &str) -> Result<()> {
        self.call(Method::Delete, &format!("/api/tests/{}", id), None)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // variants
    // ------------------------------------------------------------------

    pub fn variants(&self) -> Result<Vec<Variant>> {
        self.get_list("/api/variants")
    }

    pub fn variants_by_test(&self, test_id: &str) -> Result<Vec<Variant>> {
        self.get_list(&format!("/api/variants/byTestId/{}", test_id))
    }

    pub fn create_variant(&self, variant: &Variant) -> Result<Variant> {
        validate::weight(variant.weight)?;
        self.create("/api/variants", &variant.shallow(), "variant")
    }

    pub fn update_variant(&self, id: &str, variant: &Variant) -> Result<()> {
        validate::weight(variant.weight)?;
        let body = Variant {
            variant_id: Some(id.to_string()),
            ..variant.shallow()
        };
        self.send(Method::Put, &format!("/api/variants/{}", id), &body)?;
        Ok(())
    }

    pub fn delete_variant(&self, id: &str) -> Result<()> {
        self.call(Method::Delete, &format!("/api/variants/{}", id), None)?;
        Ok(())
    }

    pub fn set_variant_weight(&self, id: &str, weight: f64) -> Result<()> {
        validate::weight(weight)?;
        self.send(
            Method::Put,
            &format!("/api/variants/{}/weight", id),
            &json!({ "weight": weight }),
        )?;
        Ok(())
    }

    pub fn set_variant_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.send(
            Method::Put,
            &format!("/api/variants/{}/enabled", id),
            &json!({ "enabled": enabled }),
        )?;
        Ok(())
    }

    /// Stop new traffic to a variant without deleting it.
    pub fn drain_variant(&self, id: &str) -> Result<()> {
        self.call(Method::Post, &format!("/api/variants/{}/drain", id), None)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // endpoints (by id)
    // ------------------------------------------------------------------

    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        self.get_list("/api/endpoints")
    }

    pub fn create_endpoint(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        validate::endpoint(endpoint)?;
        self.create("/api/endpoints", endpoint, "endpoint")
    }

    pub fn update_endpoint(&self, id: &str, endpoint: &Endpoint) -> Result<()> {
        validate::endpoint(endpoint)?;
        let body = Endpoint {
            endpoint_id: Some(id.to_string()),
            ..endpoint.clone()
        };
        self.send(Method::Put, &format!("/api/endpoints/{}", id), &body)?;
        Ok(())
    }

    pub fn delete_endpoint(&self, id: &str) -> Result<()> {
        self.call(Method::Delete, &format!("/api/endpoints/{}", id), None)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // endpoints (by url)
    // ------------------------------------------------------------------

    pub fn variant_endpoints(&self, variant_id: &str) -> Result<Vec<Endpoint>> {
        self.get_list(&format!("/api/variants/{}/endpoints", variant_id))
    }

    /// Attach a URL to a variant. The backend may answer without a body.
    pub fn add_variant_endpoint(
        &self,
        variant_id: &str,
        url: &str,
        description: Option<&str>,
    ) -> Result<Option<Endpoint>> {
        let endpoint = Endpoint {
            description: description.map(str::to_string),
            ..Endpoint::new(url)
        };
        validate::endpoint(&endpoint)?;
        let mut body = json!({ "url": url });
        if let Some(text) = description {
            body["description"] = Value::String(text.to_string());
        }
        let response = self.send(
            Method::Post,
            &format!("/api/variants/{}/endpoints", variant_id),
            &body,
        )?;
        match response {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn delete_variant_endpoint_by_url(&self, variant_id: &str, url: &str) -> Result<()> {
        let path = format!(
            "/api/variants/{}/endpoints?url={}",
            variant_id,
            encode_query_value(url)
        );
        self.call(Method::Delete, &path, None)?;
        Ok(())
    }

    /// Update an endpoint description addressed by URL.
    ///
    /// Rejected locally, with no request sent, above
    /// [`validate::MAX_DESCRIPTION_LEN`] characters.
    pub fn update_endpoint_description(&self, url: &str, description: &str) -> Result<()> {
        validate::description(description)?;
        let path = format!("/api/endpoints?url={}", encode_query_value(url));
        self.send(
            Method::Patch,
            &path,
            &json!({ "description": description }),
        )?;
        Ok(())
    }
}

/// Percent-encode a query value (RFC 3986 unreserved set kept as is).
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockResponse, MockTransport};

    #[test]
    fn test_encode_query_value() {
        assert_eq!(
            encode_query_value("http://a.b/c?d=1&e"),
            "http%3A%2F%2Fa.b%2Fc%3Fd%3D1%26e"
        );
        assert_eq!(encode_query_value("plain-1.2_3~"), "plain-1.2_3~");
    }

    #[test]
    fn test_login_keeps_token() {
        let mock = MockTransport::new();
        mock.on_json(Method::Post, "/api/auth/login", json!({ "token": "abc" }));
        mock.on_json(Method::Get, "/api/domains", json!([]));

        let mut api = ApiClient::new(&mock);
        assert_eq!(api.login("admin", "secret").unwrap(), "abc");
        api.domains().unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].body, Some(json!({ "login": "admin", "password": "secret" })));
        assert_eq!(calls[1].token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_create_variant_requires_id() {
        let mock = MockTransport::new();
        mock.on_json(Method::Post, "/api/variants", json!({ "name": "A" }));
        let api = ApiClient::new(&mock);
        let err = api.create_variant(&Variant::new("A", 1.0)).unwrap_err();
        assert!(matches!(err, Error::MissingId { kind: "variant" }));
    }

    #[test]
    fn test_update_body_is_shallow() {
        let mock = MockTransport::new();
        let api = ApiClient::new(&mock);
        let variant = Variant::new("A", 2.0).with_endpoint(Endpoint::new("http://a"));
        api.update_variant("v1", &variant).unwrap();

        let call = &mock.calls()[0];
        assert_eq!(call.path, "/api/variants/v1");
        let body = call.body.as_ref().unwrap();
        assert_eq!(body["variant_id"], json!("v1"));
        assert!(body.get("endpointModels").is_none());
    }

    #[test]
    fn test_long_description_never_dispatched() {
        let mock = MockTransport::new();
        let api = ApiClient::new(&mock);
        let err = api
            .update_endpoint_description("http://a", &"x".repeat(51))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_delete_by_url_uses_query() {
        let mock = MockTransport::new();
        let api = ApiClient::new(&mock);
        api.delete_variant_endpoint_by_url("v1", "http://x/y").unwrap();
        assert_eq!(
            mock.calls()[0].path,
            "/api/variants/v1/endpoints?url=http%3A%2F%2Fx%2Fy"
        );
    }

    #[test]
    fn test_http_error_propagates() {
        let mock = MockTransport::new();
        mock.on(Method::Post, "/api/variants/v1/drain", MockResponse::status(409, "already drained"));
        let api = ApiClient::new(&mock);
        let err = api.drain_variant("v1").unwrap_err();
        assert_eq!(err.to_string(), "API 409: already drained");
    }

    #[test]
    fn test_empty_list_body() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/api/variants", MockResponse::Empty);
        let api = ApiClient::new(&mock);
        assert!(api.variants().unwrap().is_empty());
    }
}
