// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local checks run before anything is dispatched to the backend.

use crate::model::{Domain, Endpoint, Test, Variant};
use std::collections::HashSet;
use thiserror::Error;

/// Maximum endpoint description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 50;

/// Validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Description may be at most 50 characters (got {0})")]
    DescriptionTooLong(usize),

    #[error("Endpoint URL must not be empty")]
    EmptyUrl,

    #[error("Duplicate endpoint URL in one collection: {0}")]
    DuplicateUrl(String),

    #[error("Variant weight must be a non-negative number (got {0})")]
    InvalidWeight(f64),

    #[error("Domain host must not be empty")]
    EmptyHost,

    #[error("New test '{0}' must belong to a domain")]
    MissingParent(String),
}

/// Check an endpoint description against the length cap.
pub fn description(text: &str) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong(len));
    }
    Ok(())
}

/// Check a variant weight.
pub fn weight(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidWeight(value));
    }
    Ok(())
}

/// Check a single endpoint.
pub fn endpoint(endpoint: &Endpoint) -> Result<(), ValidationError> {
    if endpoint.url.trim().is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if let Some(text) = &endpoint.description {
        description(text)?;
    }
    Ok(())
}

/// Check one endpoint collection: each entry valid, URLs unique.
pub fn endpoints(list: &[Endpoint]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for ep in list {
        endpoint(ep)?;
        if !seen.insert(ep.url.as_str()) {
            return Err(ValidationError::DuplicateUrl(ep.url.clone()));
        }
    }
    Ok(())
}

pub fn variant(variant: &Variant) -> Result<(), ValidationError> {
    weight(variant.weight)?;
    endpoints(&variant.endpoints)
}

/// Check a test subtree. An unsaved test needs its domain link.
pub fn test(test: &Test) -> Result<(), ValidationError> {
    if test.test_id.is_none() && test.domain.is_none() {
        return Err(ValidationError::MissingParent(test.name.clone()));
    }
    test.variants.iter().try_for_each(variant)
}

/// Check a domain and its default endpoints. Tests are validated when
/// they are synchronized.
pub fn domain(domain: &Domain) -> Result<(), ValidationError> {
    if domain.host.trim().is_empty() {
        return Err(ValidationError::EmptyHost);
    }
    endpoints(&domain.default_endpoints)
}
