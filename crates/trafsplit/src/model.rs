// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration tree entities.
//!
//! ```text
//! Domain
//! +-- default endpoints        (Endpoint, parent = Domain)
//! +-- Test
//!     +-- Variant
//!         +-- Endpoint         (parent = Variant)
//! ```
//!
//! Field names on the wire follow the backend models (`variantModels`,
//! `endpointModels`, `defaultEndpoints`, ...). An entity whose id is `None`
//! has never been persisted.

use serde::{Deserialize, Serialize};

/// Entity with an optional server-issued identifier.
pub trait Identified {
    /// Server id, `None` while the entity only exists locally.
    fn id(&self) -> Option<&str>;

    /// True when the entity has been persisted.
    fn is_saved(&self) -> bool {
        self.id().is_some()
    }
}

/// Parent link to a domain (`domainModel`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRef {
    pub domain_id: String,
}

/// Parent link to a test (`testModel`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRef {
    pub test_id: String,
}

/// Parent link to a variant (`variantModel`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRef {
    pub variant_id: String,
}

/// A URL target owned by a variant or directly by a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,

    pub url: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Liveness as reported by the backend. Never sent back.
    #[serde(default, skip_serializing)]
    pub alive: Option<bool>,

    #[serde(
        default,
        rename = "variantModel",
        skip_serializing_if = "Option::is_none"
    )]
    pub variant: Option<VariantRef>,

    #[serde(
        default,
        rename = "domainModel",
        skip_serializing_if = "Option::is_none"
    )]
    pub domain: Option<DomainRef>,
}

/// Weighted traffic-split option within a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub weight: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "testModel", skip_serializing_if = "Option::is_none")]
    pub test: Option<TestRef>,

    #[serde(
        default,
        rename = "endpointModels",
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub endpoints: Vec<Endpoint>,
}

/// Experiment scoped to a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(
        default,
        rename = "domainModel",
        skip_serializing_if = "Option::is_none"
    )]
    pub domain: Option<DomainRef>,

    #[serde(
        default,
        rename = "variantModels",
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub variants: Vec<Variant>,
}

/// Top-level routable host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,

    pub host: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(
        default,
        rename = "defaultEndpoints",
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub default_endpoints: Vec<Endpoint>,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub tests: Vec<Test>,
}

fn default_active() -> bool {
    true
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Endpoint {
    /// New unsaved endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint_id: None,
            url: url.into(),
            active: true,
            description: None,
            alive: None,
            variant: None,
            domain: None,
        }
    }

    /// Set the server id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.endpoint_id = Some(id.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Variant {
    /// New unsaved variant.
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            variant_id: None,
            name: name.into(),
            active: true,
            weight,
            description: None,
            test: None,
            endpoints: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.variant_id = Some(id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Copy without children, as sent in request bodies.
    pub fn shallow(&self) -> Self {
        Self {
            endpoints: Vec::new(),
            ..self.clone()
        }
    }
}

impl Test {
    /// New unsaved test.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            test_id: None,
            name: name.into(),
            active: true,
            subpath: None,
            description: None,
            domain: None,
            variants: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.test_id = Some(id.into());
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Copy without children, as sent in request bodies.
    pub fn shallow(&self) -> Self {
        Self {
            variants: Vec::new(),
            ..self.clone()
        }
    }

    /// Find a variant by server id.
    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.variant_id.as_deref() == Some(id))
    }
}

impl Domain {
    /// New unsaved domain.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            domain_id: None,
            host: host.into(),
            active: true,
            default_endpoints: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.domain_id = Some(id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.default_endpoints.push(endpoint);
        self
    }

    pub fn with_test(mut self, test: Test) -> Self {
        self.tests.push(test);
        self
    }

    /// Copy without children, as sent in request bodies.
    pub fn shallow(&self) -> Self {
        Self {
            default_endpoints: Vec::new(),
            tests: Vec::new(),
            ..self.clone()
        }
    }

    /// Find a test by server id.
    pub fn test(&self, id: &str) -> Option<&Test> {
        self.tests.iter().find(|t| t.test_id.as_deref() == Some(id))
    }
}

impl Identified for Endpoint {
    fn id(&self) -> Option<&str> {
        self.endpoint_id.as_deref()
    }
}

impl Identified for Variant {
    fn id(&self) -> Option<&str> {
        self.variant_id.as_deref()
    }
}

impl Identified for Test {
    fn id(&self) -> Option<&str> {
        self.test_id.as_deref()
    }
}

impl Identified for Domain {
    fn id(&self) -> Option<&str> {
        self.domain_id.as_deref()
    }
}
