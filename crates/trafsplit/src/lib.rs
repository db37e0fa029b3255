// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Traffic-split configuration client
//!
//! Edits the configuration tree of a traffic-splitting backend over its
//! REST API and keeps local edits and server state converged.
//!
//! # Features
//!
//! - **Typed API** -- one call per backend route, bearer token auth
//! - **Tree synchronizer** -- minimal create/update/delete plan for an
//!   edited Test or Domain subtree, executed best effort
//! - **Manual ordering** -- drag-and-drop order of top-level lists,
//!   persisted between runs
//! - **Session context** -- token, cached tree and duplicate-action guard
//!   passed explicitly, no globals
//!
//! # Architecture
//!
//! ```text
//! Session
//! +-- ApiClient<T: Transport>   (HttpTransport or MockTransport)
//! +-- cached Domain tree        (refreshed via merge::merge_domains)
//! +-- ActionGuard               (drain / delete sent once)
//!
//! sync::sync_test / sync::save_domain_urls
//!     validate -> Plan -> execute -> refresh
//! ```
//!
//! # Example
//!
//! ```ignore
//! use trafsplit::{ClientConfig, HttpTransport, Session, sync};
//!
//! let config = ClientConfig::resolve(None)?;
//! let mut session = Session::new(HttpTransport::new(&config)?);
//!
//! let original = session.api().test("t1")?;
//! let mut edited = original.clone();
//! edited.variants[0].weight = 7.0;
//! let report = sync::sync_test(&mut session, &original, &mut edited)?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod merge;
pub mod model;
pub mod notice;
pub mod order;
pub mod session;
pub mod store;
pub mod sync;
pub mod transport;
pub mod validate;

pub use api::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{Error, Result};
pub use guard::{ActionGuard, ActionOutcome, IrreversibleAction};
pub use model::{Domain, DomainRef, Endpoint, Identified, Test, TestRef, Variant, VariantRef};
pub use notice::{Notice, Severity};
pub use order::{OrderBook, DOMAIN_ORDER_KEY, VARIANT_ORDER_KEY};
pub use session::Session;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, TOKEN_KEY};
pub use sync::{Plan, ReplaceOutcome, SyncReport};
pub use transport::{HttpTransport, Method, MockResponse, MockTransport, Transport};
pub use validate::ValidationError;
