// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session context.
//!
//! A [`Session`] is what every operation threads through: the API client
//! (transport + bearer token), the cached entity tree last fetched from the
//! server, and the irreversible-action guard. Nothing here is global, so
//! tests build as many isolated sessions as they like.

use crate::api::ApiClient;
use crate::error::Result;
use crate::guard::{ActionGuard, ActionOutcome, IrreversibleAction};
use crate::merge;
use crate::model::{Domain, Endpoint, Identified, Test, Variant};
use crate::store::{KeyValueStore, TOKEN_KEY};
use crate::transport::Transport;

pub struct Session<T: Transport> {
    api: ApiClient<T>,
    domains: Vec<Domain>,
    guard: ActionGuard,
}

impl<T: Transport> Session<T> {
    /// Create a session without a token.
    pub fn new(transport: T) -> Self {
        Self {
            api: ApiClient::new(transport),
            domains: Vec::new(),
            guard: ActionGuard::new(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.api.set_token(token);
        self
    }

    /// Create a session using the token persisted in `store`, if any.
    pub fn restore<S: KeyValueStore>(transport: T, store: &S) -> Result<Self> {
        let token = store.get(TOKEN_KEY)?;
        Ok(Self::new(transport).with_token(token))
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    /// Log in and persist the token in `store`.
    pub fn login<S: KeyValueStore>(&mut self, store: &S, login: &str, password: &str) -> Result<()> {
        let token = self.api.login(login, password)?;
        store.set(TOKEN_KEY, &token)?;
        tracing::info!("Logged in as {}", login);
        Ok(())
    }

    /// Drop the token locally and in `store`.
    pub fn logout<S: KeyValueStore>(&mut self, store: &S) -> Result<()> {
        self.api.set_token(None);
        store.remove(TOKEN_KEY)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // cached tree
    // ------------------------------------------------------------------

    /// Cached domain tree.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Replace the cache with a snapshot, keeping unsaved local entries.
    pub fn absorb(&mut self, server: Vec<Domain>) {
        self.domains = merge::merge_domains(&self.domains, &server);
    }

    /// Re-fetch every domain.
    pub fn refresh(&mut self) -> Result<&[Domain]> {
        let server = self.api.domains()?;
        tracing::debug!("Fetched {} domains", server.len());
        self.absorb(server);
        Ok(&self.domains)
    }

    /// Re-fetch one domain into the cache.
    pub fn refresh_domain(&mut self, id: &str) -> Result<&Domain> {
        let fresh = self.api.domain(id)?;
        merge::upsert(&mut self.domains, fresh);
        let index = self
            .domains
            .iter()
            .position(|d| d.id() == Some(id))
            .unwrap_or(self.domains.len() - 1);
        Ok(&self.domains[index])
    }

    /// Re-fetch one test into the cache.
    ///
    /// The test lands under the domain it links to, or under the domain
    /// already holding it. A test with neither is returned but not cached.
    pub fn refresh_test(&mut self, id: &str) -> Result<Test> {
        let fresh = self.api.test(id)?;
        let owner = fresh
            .domain
            .as_ref()
            .map(|d| d.domain_id.clone())
            .or_else(|| self.domain_of_test(id).map(str::to_string));

        let slot = match owner {
            Some(domain_id) => self
                .domains
                .iter_mut()
                .find(|d| d.id() == Some(domain_id.as_str())),
            None => None,
        };
        match slot {
            Some(domain) => {
                merge::upsert(&mut domain.tests, fresh.clone());
            }
            None => tracing::debug!("Test {} has no cached domain", id),
        }
        Ok(fresh)
    }

    /// Re-fetch the endpoints of one variant into the cache.
    pub fn refresh_variant_endpoints(&mut self, variant_id: &str) -> Result<Vec<Endpoint>> {
        let endpoints = self.api.variant_endpoints(variant_id)?;
        if let Some(variant) = self.variant_mut(variant_id) {
            variant.endpoints = endpoints.clone();
        }
        Ok(endpoints)
    }

    /// Variants (all, or those of one test) with their endpoints filled in.
    ///
    /// The variant collection routes do not embed endpoints, so each
    /// variant's endpoints are fetched from its own route.
    pub fn variants_with_endpoints(&self, test_id: Option<&str>) -> Result<Vec<Variant>> {
        let mut variants = match test_id {
            Some(id) => self.api.variants_by_test(id)?,
            None => self.api.variants()?,
        };
        for variant in &mut variants {
            if let Some(id) = variant.variant_id.as_deref() {
                variant.endpoints = self.api.variant_endpoints(id)?;
            }
        }
        tracing::debug!("Loaded {} variants with endpoints", variants.len());
        Ok(variants)
    }

    pub fn find_domain(&self, id: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id() == Some(id))
    }

    pub fn find_test(&self, id: &str) -> Option<&Test> {
        self.domains.iter().find_map(|d| d.test(id))
    }

    pub fn find_variant(&self, id: &str) -> Option<&Variant> {
        self.domains
            .iter()
            .flat_map(|d| d.tests.iter())
            .find_map(|t| t.variant(id))
    }

    fn domain_of_test(&self, test_id: &str) -> Option<&str> {
        self.domains
            .iter()
            .find(|d| d.test(test_id).is_some())
            .and_then(|d| d.id())
    }

    fn variant_mut(&mut self, id: &str) -> Option<&mut Variant> {
        self.domains
            .iter_mut()
            .flat_map(|d| d.tests.iter_mut())
            .flat_map(|t| t.variants.iter_mut())
            .find(|v| v.id() == Some(id))
    }

    // ------------------------------------------------------------------
    // single-entity actions
    // ------------------------------------------------------------------

    /// Create a domain and add it to the cache.
    pub fn create_domain(&mut self, domain: &Domain) -> Result<Domain> {
        let created = self.api.create_domain(domain)?;
        merge::upsert(&mut self.domains, created.clone());
        Ok(created)
    }

    /// Delete a domain; its tests, variants and endpoints leave the cache
    /// with it.
    pub fn delete_domain(&mut self, id: &str) -> Result<ActionOutcome> {
        let api = &self.api;
        let outcome = self
            .guard
            .run(IrreversibleAction::DeleteDomain, id, || api.delete_domain(id))?;
        merge::remove(&mut self.domains, id);
        Ok(outcome)
    }

    pub fn delete_test(&mut self, id: &str) -> Result<ActionOutcome> {
        let api = &self.api;
        let outcome = self
            .guard
            .run(IrreversibleAction::DeleteTest, id, || api.delete_test(id))?;
        for domain in &mut self.domains {
            merge::remove(&mut domain.tests, id);
        }
        Ok(outcome)
    }

    pub fn delete_variant(&mut self, id: &str) -> Result<ActionOutcome> {
        let api = &self.api;
        let outcome = self
            .guard
            .run(IrreversibleAction::DeleteVariant, id, || api.delete_variant(id))?;
        for test in self.domains.iter_mut().flat_map(|d| d.tests.iter_mut()) {
            merge::remove(&mut test.variants, id);
        }
        Ok(outcome)
    }

    /// Delete an endpoint by id.
    pub fn delete_endpoint(&mut self, id: &str) -> Result<ActionOutcome> {
        let api = &self.api;
        let outcome = self
            .guard
            .run(IrreversibleAction::DeleteEndpoint, id, || api.delete_endpoint(id))?;
        for domain in &mut self.domains {
            merge::remove(&mut domain.default_endpoints, id);
            for variant in domain.tests.iter_mut().flat_map(|t| t.variants.iter_mut()) {
                merge::remove(&mut variant.endpoints, id);
            }
        }
        Ok(outcome)
    }

    /// Stop new traffic to a variant.
    pub fn drain_variant(&mut self, id: &str) -> Result<ActionOutcome> {
        let api = &self.api;
        let outcome = self
            .guard
            .run(IrreversibleAction::DrainVariant, id, || api.drain_variant(id))?;
        if let Some(variant) = self.variant_mut(id) {
            variant.active = false;
        }
        Ok(outcome)
    }

    pub fn set_variant_weight(&mut self, id: &str, weight: f64) -> Result<()> {
        self.api.set_variant_weight(id, weight)?;
        if let Some(variant) = self.variant_mut(id) {
            variant.weight = weight;
        }
        Ok(())
    }

    /// Enable or disable a variant. Re-enabling allows a later drain.
    pub fn set_variant_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.api.set_variant_enabled(id, enabled)?;
        if enabled {
            self.guard.release(IrreversibleAction::DrainVariant, id);
        }
        if let Some(variant) = self.variant_mut(id) {
            variant.active = enabled;
        }
        Ok(())
    }

    /// Remove a variant endpoint known only by URL.
    pub fn remove_variant_url(&mut self, variant_id: &str, url: &str) -> Result<Vec<Endpoint>> {
        self.api.delete_variant_endpoint_by_url(variant_id, url)?;
        self.refresh_variant_endpoints(variant_id)
    }

    /// Update an endpoint description known only by URL.
    pub fn describe_url(&mut self, url: &str, description: &str) -> Result<()> {
        self.api.update_endpoint_description(url, description)?;
        for domain in &mut self.domains {
            let endpoints = domain.default_endpoints.iter_mut().chain(
                domain
                    .tests
                    .iter_mut()
                    .flat_map(|t| t.variants.iter_mut())
                    .flat_map(|v| v.endpoints.iter_mut()),
            );
            for endpoint in endpoints.filter(|e| e.url == url) {
                endpoint.description = Some(description.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use crate::transport::{Method, MockResponse, MockTransport};
    use serde_json::json;

    fn tree() -> serde_json::Value {
        json!([{
            "domain_id": "d1",
            "host": "shop.example.com",
            "active": true,
            "defaultEndpoints": [{ "endpoint_id": "e0", "url": "http://fallback", "active": true }],
            "tests": [{
                "test_id": "t1",
                "name": "checkout",
                "active": true,
                "variantModels": [
                    { "variant_id": "v1", "name": "A", "active": true, "weight": 5.0,
                      "endpointModels": [{ "endpoint_id": "e1", "url": "http://a", "active": true }] },
                    { "variant_id": "v2", "name": "B", "active": true, "weight": 5.0 }
                ]
            }]
        }])
    }

    fn loaded(mock: &MockTransport) -> Session<&MockTransport> {
        mock.on_json(Method::Get, "/api/domains", tree());
        let mut session = Session::new(mock);
        session.refresh().unwrap();
        mock.clear_calls();
        session
    }

    #[test]
    fn test_refresh_fills_cache() {
        let mock = MockTransport::new();
        let session = loaded(&mock);
        assert_eq!(session.domains().len(), 1);
        assert_eq!(session.find_test("t1").unwrap().variants.len(), 2);
        assert_eq!(session.find_variant("v1").unwrap().endpoints[0].url, "http://a");
    }

    #[test]
    fn test_delete_domain_cascades_locally() {
        let mock = MockTransport::new();
        let mut session = loaded(&mock);

        assert_eq!(session.delete_domain("d1").unwrap(), ActionOutcome::Dispatched);
        assert!(session.find_test("t1").is_none());
        assert!(session.find_variant("v1").is_none());
        assert_eq!(mock.count(Method::Delete, "/api/domains/d1"), 1);
    }

    #[test]
    fn test_repeated_drain_sent_once() {
        let mock = MockTransport::new();
        let mut session = loaded(&mock);

        assert_eq!(session.drain_variant("v1").unwrap(), ActionOutcome::Dispatched);
        assert_eq!(session.drain_variant("v1").unwrap(), ActionOutcome::Skipped);
        assert_eq!(mock.count(Method::Post, "/api/variants/v1/drain"), 1);
        assert!(!session.find_variant("v1").unwrap().active);

        // enabling again allows another drain
        session.set_variant_enabled("v1", true).unwrap();
        assert_eq!(session.drain_variant("v1").unwrap(), ActionOutcome::Dispatched);
        assert_eq!(mock.count(Method::Post, "/api/variants/v1/drain"), 2);
    }

    #[test]
    fn test_failed_delete_can_be_retried() {
        let mock = MockTransport::new();
        let mut session = loaded(&mock);
        mock.on(Method::Delete, "/api/tests/t1", MockResponse::status(503, "busy"));

        assert!(session.delete_test("t1").is_err());
        assert!(session.find_test("t1").is_some());

        mock.on(Method::Delete, "/api/tests/t1", MockResponse::Empty);
        assert_eq!(session.delete_test("t1").unwrap(), ActionOutcome::Dispatched);
        assert!(session.find_test("t1").is_none());
    }

    #[test]
    fn test_describe_url_validates_first() {
        let mock = MockTransport::new();
        let mut session = loaded(&mock);

        let err = session.describe_url("http://a", &"d".repeat(51)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(mock.calls().is_empty());

        session.describe_url("http://a", "primary").unwrap();
        assert_eq!(
            session.find_variant("v1").unwrap().endpoints[0].description.as_deref(),
            Some("primary")
        );
    }

    #[test]
    fn test_variants_carry_their_endpoints() {
        let mock = MockTransport::new();
        mock.on_json(
            Method::Get,
            "/api/variants/byTestId/t1",
            json!([
                { "variant_id": "v1", "name": "A", "active": true, "weight": 5.0 },
                { "variant_id": "v2", "name": "B", "active": false, "weight": 5.0 }
            ]),
        );
        mock.on_json(
            Method::Get,
            "/api/variants/v1/endpoints",
            json!([{ "endpoint_id": "e1", "url": "http://a", "active": true, "alive": true }]),
        );
        mock.on_json(Method::Get, "/api/variants/v2/endpoints", json!([]));

        let session = Session::new(&mock);
        let variants = session.variants_with_endpoints(Some("t1")).unwrap();

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].endpoints[0].url, "http://a");
        assert_eq!(variants[0].endpoints[0].alive, Some(true));
        assert!(variants[1].endpoints.is_empty());
        assert_eq!(mock.count(Method::Get, "/api/variants/v"), 2);
    }

    #[test]
    fn test_login_persists_token() {
        let mock = MockTransport::new();
        mock.on_json(Method::Post, "/api/auth/login", json!({ "token": "tok-1" }));
        let store = MemoryStore::new();

        let mut session = Session::new(&mock);
        session.login(&store, "admin", "pw").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));

        let restored = Session::restore(&mock, &store).unwrap();
        assert_eq!(restored.api().token(), Some("tok-1"));

        session.logout(&store).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }
}
