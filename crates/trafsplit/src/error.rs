// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared by the client, the synchronizer and the local store.

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::sync::SyncReport;
use crate::validate::ValidationError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend answered with a non-2xx status.
    #[error("API {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A create call succeeded but the response carried no identifier.
    #[error("Create {kind} returned no identifier")]
    MissingId { kind: &'static str },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// One or more operations of a reconciliation failed.
    ///
    /// `source` is the first failure in dispatch order; `report` holds the
    /// outcome of every planned operation.
    #[error("Sync incomplete ({} of {} operations failed): {source}", .report.failed(), .report.len())]
    PartialSync {
        source: Box<Error>,
        report: Box<SyncReport>,
    },
}

impl Error {
    /// HTTP status when the error came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::PartialSync { source, .. } => source.status(),
            _ => None,
        }
    }

    /// True when the request never reached the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Store(_) | Error::Config(_)
        )
    }
}
