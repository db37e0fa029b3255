// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hierarchical tree synchronizer.
//!
//! Reconciles one locally edited subtree against the last server copy:
//!
//! - a Test with its Variants and their Endpoints ([`sync_test`])
//! - a Domain with its default Endpoints ([`save_domain_urls`])
//!
//! # Pipeline
//!
//! ```text
//! validate(edited) --> Plan::for_test / Plan::for_domain_urls   (pure)
//!                  --> execute(plan)                            (best effort)
//!                  --> refresh from server into the session cache
//! ```
//!
//! A [`Plan`] is a dependency-ordered list of [`Operation`]s. Parents that
//! do not exist yet are referenced as [`IdRef::Pending`] (the index of the
//! operation creating them) and resolved while the plan runs. Within each
//! level deletes are emitted before creates and updates, so a URL removed
//! and re-added in one edit never collides with itself.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::model::{
    Domain, DomainRef, Endpoint, Identified, Test, TestRef, Variant, VariantRef,
};
use crate::session::Session;
use crate::transport::Transport;
use crate::validate;
use std::collections::HashSet;
use std::fmt;

/// Entity collections on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Domain,
    Test,
    Variant,
    Endpoint,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::Test => "test",
            EntityKind::Variant => "variant",
            EntityKind::Endpoint => "endpoint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Reference to an entity id that may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdRef {
    /// Server id known at planning time.
    Known(String),
    /// Id produced by the create at this plan index.
    Pending(usize),
}

/// Owner of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointParent {
    Variant(IdRef),
    Domain(IdRef),
}

impl EndpointParent {
    fn id_ref(&self) -> &IdRef {
        match self {
            EndpointParent::Variant(r) | EndpointParent::Domain(r) => r,
        }
    }
}

/// Where a created id is written back in the edited tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTarget {
    Domain,
    Test,
    Variant(usize),
    VariantEndpoint(usize, usize),
    DomainEndpoint(usize),
}

/// One network call of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateDomain {
        body: Domain,
    },
    CreateTest {
        domain: Option<String>,
        body: Test,
    },
    UpdateTest {
        id: String,
        body: Test,
    },
    DeleteVariant {
        id: String,
    },
    CreateVariant {
        test: IdRef,
        body: Variant,
        target: IdTarget,
    },
    UpdateVariant {
        id: String,
        test: IdRef,
        body: Variant,
    },
    DeleteEndpoint {
        id: String,
    },
    CreateEndpoint {
        parent: EndpointParent,
        body: Endpoint,
        target: IdTarget,
    },
    UpdateEndpoint {
        id: String,
        parent: EndpointParent,
        body: Endpoint,
    },
}

impl Operation {
    pub fn kind(&self) -> EntityKind {
        match self {
            Operation::CreateDomain { .. } => EntityKind::Domain,
            Operation::CreateTest { .. } | Operation::UpdateTest { .. } => EntityKind::Test,
            Operation::DeleteVariant { .. }
            | Operation::CreateVariant { .. }
            | Operation::UpdateVariant { .. } => EntityKind::Variant,
            Operation::DeleteEndpoint { .. }
            | Operation::CreateEndpoint { .. }
            | Operation::UpdateEndpoint { .. } => EntityKind::Endpoint,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Operation::CreateDomain { .. }
            | Operation::CreateTest { .. }
            | Operation::CreateVariant { .. }
            | Operation::CreateEndpoint { .. } => Action::Create,
            Operation::UpdateTest { .. }
            | Operation::UpdateVariant { .. }
            | Operation::UpdateEndpoint { .. } => Action::Update,
            Operation::DeleteVariant { .. } | Operation::DeleteEndpoint { .. } => Action::Delete,
        }
    }

    /// Parent this operation depends on, if it is still to be created.
    fn pending_parent(&self) -> Option<usize> {
        let parent = match self {
            Operation::CreateVariant { test, .. } | Operation::UpdateVariant { test, .. } => test,
            Operation::CreateEndpoint { parent, .. } | Operation::UpdateEndpoint { parent, .. } => {
                parent.id_ref()
            }
            _ => return None,
        };
        match parent {
            IdRef::Pending(index) => Some(*index),
            IdRef::Known(_) => None,
        }
    }

    fn target(&self) -> Option<IdTarget> {
        match self {
            Operation::CreateDomain { .. } => Some(IdTarget::Domain),
            Operation::CreateTest { .. } => Some(IdTarget::Test),
            Operation::CreateVariant { target, .. } | Operation::CreateEndpoint { target, .. } => {
                Some(*target)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateDomain { body } => write!(f, "create domain {}", body.host),
            Operation::CreateTest { body, .. } => write!(f, "create test '{}'", body.name),
            Operation::UpdateTest { id, .. } => write!(f, "update test {}", id),
            Operation::DeleteVariant { id } => write!(f, "delete variant {}", id),
            Operation::CreateVariant { body, .. } => write!(f, "create variant '{}'", body.name),
            Operation::UpdateVariant { id, .. } => write!(f, "update variant {}", id),
            Operation::DeleteEndpoint { id } => write!(f, "delete endpoint {}", id),
            Operation::CreateEndpoint { body, .. } => write!(f, "create endpoint {}", body.url),
            Operation::UpdateEndpoint { id, body, .. } => {
                write!(f, "update endpoint {} ({})", id, body.url)
            }
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Dependency-ordered list of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    ops: Vec<Operation>,
}

impl Plan {
    /// Plan the reconciliation of a Test subtree.
    ///
    /// The test row itself is always written (created when unsaved, updated
    /// otherwise). Then variants removed from `edited` are deleted, then
    /// every edited variant is created or updated, each followed by the
    /// reconciliation of its endpoints.
    ///
    /// An endpoint id kept anywhere in the edited test is never deleted, so
    /// moving an endpoint between variants becomes an update carrying its
    /// new parent.
    pub fn for_test(original: &Test, edited: &Test) -> Self {
        let mut plan = Plan::default();

        let test_ref = match &edited.test_id {
            Some(id) => {
                plan.push(Operation::UpdateTest {
                    id: id.clone(),
                    body: edited.shallow(),
                });
                IdRef::Known(id.clone())
            }
            None => IdRef::Pending(plan.push(Operation::CreateTest {
                domain: edited.domain.as_ref().map(|d| d.domain_id.clone()),
                body: edited.shallow(),
            })),
        };

        let kept: HashSet<&str> = edited.variants.iter().filter_map(|v| v.id()).collect();
        for variant in &original.variants {
            if let Some(id) = variant.id() {
                if !kept.contains(id) {
                    plan.push(Operation::DeleteVariant { id: id.to_string() });
                }
            }
        }

        let kept_endpoints: HashSet<&str> = edited
            .variants
            .iter()
            .flat_map(|v| v.endpoints.iter())
            .filter_map(|e| e.id())
            .collect();

        for (vi, variant) in edited.variants.iter().enumerate() {
            let (variant_ref, originals) = match &variant.variant_id {
                Some(id) => {
                    plan.push(Operation::UpdateVariant {
                        id: id.clone(),
                        test: test_ref.clone(),
                        body: variant.shallow(),
                    });
                    let originals = original
                        .variant(id)
                        .map(|v| v.endpoints.as_slice())
                        .unwrap_or(&[]);
                    (IdRef::Known(id.clone()), originals)
                }
                None => {
                    let index = plan.push(Operation::CreateVariant {
                        test: test_ref.clone(),
                        body: variant.shallow(),
                        target: IdTarget::Variant(vi),
                    });
                    (IdRef::Pending(index), &[][..])
                }
            };

            plan.endpoints(
                originals,
                &variant.endpoints,
                &kept_endpoints,
                EndpointParent::Variant(variant_ref),
                |ei| IdTarget::VariantEndpoint(vi, ei),
            );
        }

        plan
    }

    /// Plan the reconciliation of a Domain's default endpoints.
    pub fn for_domain_urls(original: &Domain, edited: &Domain) -> Self {
        let mut plan = Plan::default();

        let domain_ref = match &edited.domain_id {
            Some(id) => IdRef::Known(id.clone()),
            None => IdRef::Pending(plan.push(Operation::CreateDomain {
                body: edited.shallow(),
            })),
        };

        let kept: HashSet<&str> = edited.default_endpoints.iter().filter_map(|e| e.id()).collect();
        plan.endpoints(
            &original.default_endpoints,
            &edited.default_endpoints,
            &kept,
            EndpointParent::Domain(domain_ref),
            IdTarget::DomainEndpoint,
        );
        plan
    }

    /// Endpoint collection reconciliation: originals whose id is not in
    /// `kept` are deleted first, then creates and updates, each carrying
    /// `parent`.
    fn endpoints<F>(
        &mut self,
        originals: &[Endpoint],
        edited: &[Endpoint],
        kept: &HashSet<&str>,
        parent: EndpointParent,
        target: F,
    ) where
        F: Fn(usize) -> IdTarget,
    {
        for endpoint in originals {
            if let Some(id) = endpoint.id() {
                if !kept.contains(id) {
                    self.push(Operation::DeleteEndpoint { id: id.to_string() });
                }
            }
        }

        for (ei, endpoint) in edited.iter().enumerate() {
            let body = Endpoint {
                variant: None,
                domain: None,
                ..endpoint.clone()
            };
            match &endpoint.endpoint_id {
                Some(id) => self.push(Operation::UpdateEndpoint {
                    id: id.clone(),
                    parent: parent.clone(),
                    body,
                }),
                None => self.push(Operation::CreateEndpoint {
                    parent: parent.clone(),
                    body,
                    target: target(ei),
                }),
            };
        }
    }

    fn push(&mut self, op: Operation) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations of one kind and action.
    pub fn count(&self, kind: EntityKind, action: Action) -> usize {
        self.ops
            .iter()
            .filter(|op| op.kind() == kind && op.action() == action)
            .count()
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Receives ids produced by creates.
pub trait IdSink {
    fn assign(&mut self, target: IdTarget, id: &str);
}

impl IdSink for Test {
    fn assign(&mut self, target: IdTarget, id: &str) {
        let slot = match target {
            IdTarget::Test => Some(&mut self.test_id),
            IdTarget::Variant(vi) => self.variants.get_mut(vi).map(|v| &mut v.variant_id),
            IdTarget::VariantEndpoint(vi, ei) => self
                .variants
                .get_mut(vi)
                .and_then(|v| v.endpoints.get_mut(ei))
                .map(|e| &mut e.endpoint_id),
            IdTarget::Domain | IdTarget::DomainEndpoint(_) => None,
        };
        if let Some(slot) = slot {
            *slot = Some(id.to_string());
        }
    }
}

impl IdSink for Domain {
    fn assign(&mut self, target: IdTarget, id: &str) {
        let slot = match target {
            IdTarget::Domain => Some(&mut self.domain_id),
            IdTarget::DomainEndpoint(ei) => self
                .default_endpoints
                .get_mut(ei)
                .map(|e| &mut e.endpoint_id),
            _ => None,
        };
        if let Some(slot) = slot {
            *slot = Some(id.to_string());
        }
    }
}

/// Result of one planned operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpStatus {
    /// Update or delete accepted.
    Done,
    /// Create accepted; the new id.
    Created(String),
    /// Call failed.
    Failed { status: Option<u16>, message: String },
    /// Not dispatched: the parent it depends on was never created.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpOutcome {
    pub kind: EntityKind,
    pub action: Action,
    pub label: String,
    pub status: OpStatus,
}

/// Outcome of every operation of a plan, in dispatch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub outcomes: Vec<OpOutcome>,
    /// True when the subtree was re-fetched into the session cache.
    pub refreshed: bool,
}

impl SyncReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OpStatus::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OpStatus::Skipped)
            .count()
    }

    /// Ids returned by creates, in dispatch order.
    pub fn created_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                OpStatus::Created(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True when every operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }
}

/// Run a plan against the API, writing created ids into `sink`.
///
/// Every operation is attempted even after failures, except those whose
/// pending parent was not created. Returns the report and the first error.
pub fn execute<T: Transport>(
    api: &ApiClient<T>,
    plan: &Plan,
    sink: &mut dyn IdSink,
) -> (SyncReport, Option<Error>) {
    let mut resolved: Vec<Option<String>> = vec![None; plan.len()];
    let mut report = SyncReport::default();
    let mut first_error = None;

    for (index, op) in plan.operations().iter().enumerate() {
        let blocked = op
            .pending_parent()
            .is_some_and(|parent| resolved.get(parent).and_then(Option::as_ref).is_none());

        let status = if blocked {
            tracing::warn!("Skipping '{}': parent was not created", op);
            OpStatus::Skipped
        } else {
            match dispatch(api, op, &resolved) {
                Ok(Some(id)) => {
                    if let Some(target) = op.target() {
                        sink.assign(target, &id);
                    }
                    resolved[index] = Some(id.clone());
                    OpStatus::Created(id)
                }
                Ok(None) => OpStatus::Done,
                Err(e) => {
                    tracing::warn!("'{}' failed: {}", op, e);
                    let status = OpStatus::Failed {
                        status: e.status(),
                        message: e.to_string(),
                    };
                    first_error.get_or_insert(e);
                    status
                }
            }
        };

        tracing::debug!("[{}/{}] {} -> {:?}", index + 1, plan.len(), op, status);
        report.outcomes.push(OpOutcome {
            kind: op.kind(),
            action: op.action(),
            label: op.to_string(),
            status,
        });
    }

    (report, first_error)
}

fn resolve(id_ref: &IdRef, resolved: &[Option<String>]) -> Option<String> {
    match id_ref {
        IdRef::Known(id) => Some(id.clone()),
        IdRef::Pending(index) => resolved.get(*index).cloned().flatten(),
    }
}

fn attach_parent(mut body: Endpoint, parent: &EndpointParent, id: String) -> Endpoint {
    match parent {
        EndpointParent::Variant(_) => {
            body.variant = Some(VariantRef { variant_id: id });
            body.domain = None;
        }
        EndpointParent::Domain(_) => {
            body.domain = Some(DomainRef { domain_id: id });
            body.variant = None;
        }
    }
    body
}

/// Send one operation. Returns the new id for creates.
fn dispatch<T: Transport>(
    api: &ApiClient<T>,
    op: &Operation,
    resolved: &[Option<String>],
) -> Result<Option<String>> {
    let missing = |kind| Error::MissingId { kind };

    match op {
        Operation::CreateDomain { body } => {
            let created = api.create_domain(body)?;
            Ok(created.domain_id)
        }
        Operation::CreateTest { domain, body } => {
            let body = Test {
                domain: domain.clone().map(|domain_id| DomainRef { domain_id }),
                ..body.clone()
            };
            let created = api.create_test(&body)?;
            Ok(created.test_id)
        }
        Operation::UpdateTest { id, body } => {
            api.update_test(id, body)?;
            Ok(None)
        }
        Operation::DeleteVariant { id } => {
            api.delete_variant(id)?;
            Ok(None)
        }
        Operation::CreateVariant { test, body, .. } => {
            let test_id = resolve(test, resolved).ok_or_else(|| missing("test"))?;
            let body = Variant {
                test: Some(TestRef { test_id }),
                ..body.clone()
            };
            let created = api.create_variant(&body)?;
            Ok(created.variant_id)
        }
        Operation::UpdateVariant { id, test, body } => {
            let test_id = resolve(test, resolved).ok_or_else(|| missing("test"))?;
            let body = Variant {
                test: Some(TestRef { test_id }),
                ..body.clone()
            };
            api.update_variant(id, &body)?;
            Ok(None)
        }
        Operation::DeleteEndpoint { id } => {
            api.delete_endpoint(id)?;
            Ok(None)
        }
        Operation::CreateEndpoint { parent, body, .. } => {
            let parent_id = resolve(parent.id_ref(), resolved).ok_or_else(|| missing("parent"))?;
            let body = attach_parent(body.clone(), parent, parent_id);
            let created = api.create_endpoint(&body)?;
            Ok(created.endpoint_id)
        }
        Operation::UpdateEndpoint { id, parent, body } => {
            let parent_id = resolve(parent.id_ref(), resolved).ok_or_else(|| missing("parent"))?;
            let body = attach_parent(body.clone(), parent, parent_id);
            api.update_endpoint(id, &body)?;
            Ok(None)
        }
    }
}

/// Combine the sweep result with the refresh result.
///
/// The first sweep error wins; a refresh error is only surfaced when the
/// sweep itself was clean.
fn settle(report: SyncReport, first_error: Option<Error>, refresh: Result<()>) -> Result<SyncReport> {
    match (first_error, refresh) {
        (Some(source), refresh) => {
            if let Err(e) = refresh {
                tracing::warn!("Refresh after failed sync also failed: {}", e);
            }
            Err(Error::PartialSync {
                source: Box::new(source),
                report: Box::new(report),
            })
        }
        (None, Err(e)) => Err(e),
        (None, Ok(())) => Ok(report),
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Reconcile an edited Test subtree with its original server copy.
///
/// Ids of created entities are written into `edited`, so saving the same
/// tree again updates instead of creating duplicates. The test is re-fetched
/// into the session cache once every operation has settled.
pub fn sync_test<T: Transport>(
    session: &mut Session<T>,
    original: &Test,
    edited: &mut Test,
) -> Result<SyncReport> {
    validate::test(edited)?;

    let plan = Plan::for_test(original, edited);
    tracing::info!(
        "Syncing test '{}': {} operations ({} deletes)",
        edited.name,
        plan.len(),
        plan.count(EntityKind::Variant, Action::Delete)
            + plan.count(EntityKind::Endpoint, Action::Delete)
    );

    let (mut report, first_error) = execute(session.api(), &plan, edited);

    let refresh = match edited.test_id.clone() {
        Some(id) => session.refresh_test(&id).map(|_| ()),
        None => Ok(()),
    };
    report.refreshed = refresh.is_ok() && edited.test_id.is_some();

    settle(report, first_error, refresh)
}

/// Reconcile an edited Domain's default endpoints with its original copy.
pub fn save_domain_urls<T: Transport>(
    session: &mut Session<T>,
    original: &Domain,
    edited: &mut Domain,
) -> Result<SyncReport> {
    validate::domain(edited)?;

    let plan = Plan::for_domain_urls(original, edited);
    tracing::info!(
        "Saving URLs of domain {}: {} operations",
        edited.host,
        plan.len()
    );

    let (mut report, first_error) = execute(session.api(), &plan, edited);

    let refresh = match edited.domain_id.clone() {
        Some(id) => session.refresh_domain(&id).map(|_| ()),
        None => Ok(()),
    };
    report.refreshed = refresh.is_ok() && edited.domain_id.is_some();

    settle(report, first_error, refresh)
}

/// What happened to the previous URL during [`replace_endpoint_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Nothing changed.
    Unchanged,
    /// New URL created, no previous URL was given.
    Created,
    /// New URL created and previous URL deleted.
    Replaced,
    /// New URL created; deleting the previous one failed.
    PreviousKept { error: String },
}

/// Change a variant endpoint URL in place.
///
/// The new URL is persisted first, then the old one is deleted on a best
/// effort basis, so a failed delete never loses the new value. With no
/// `previous` URL this is a plain create.
pub fn replace_endpoint_url<T: Transport>(
    session: &mut Session<T>,
    variant_id: &str,
    previous: Option<&str>,
    url: &str,
) -> Result<ReplaceOutcome> {
    if previous == Some(url) {
        return Ok(ReplaceOutcome::Unchanged);
    }

    session.api().add_variant_endpoint(variant_id, url, None)?;

    let outcome = match previous {
        None => ReplaceOutcome::Created,
        Some(old) => match session.api().delete_variant_endpoint_by_url(variant_id, old) {
            Ok(()) => ReplaceOutcome::Replaced,
            Err(e) => {
                tracing::warn!("Kept previous URL {} on variant {}: {}", old, variant_id, e);
                ReplaceOutcome::PreviousKept {
                    error: e.to_string(),
                }
            }
        },
    };

    session.refresh_variant_endpoints(variant_id)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved_test() -> Test {
        Test::new("checkout")
            .with_id("t1")
            .with_variant(
                Variant::new("A", 5.0)
                    .with_id("v1")
                    .with_endpoint(Endpoint::new("http://a1").with_id("e1"))
                    .with_endpoint(Endpoint::new("http://a2").with_id("e2")),
            )
            .with_variant(Variant::new("B", 5.0).with_id("v2"))
    }

    #[test]
    fn test_unchanged_tree_has_no_creates_or_deletes() {
        let original = saved_test();
        let plan = Plan::for_test(&original, &original);

        assert_eq!(plan.count(EntityKind::Test, Action::Update), 1);
        assert_eq!(plan.count(EntityKind::Variant, Action::Update), 2);
        assert_eq!(plan.count(EntityKind::Endpoint, Action::Update), 2);
        assert_eq!(plan.count(EntityKind::Variant, Action::Delete), 0);
        assert_eq!(plan.count(EntityKind::Variant, Action::Create), 0);
        assert_eq!(plan.count(EntityKind::Endpoint, Action::Create), 0);
    }

    #[test]
    fn test_removed_variant_deleted_before_writes() {
        let original = saved_test();
        let mut edited = original.clone();
        edited.variants.remove(1);
        edited.variants.push(Variant::new("C", 1.0));

        let plan = Plan::for_test(&original, &edited);
        let ops = plan.operations();

        assert_eq!(ops[0], Operation::UpdateTest { id: "t1".into(), body: edited.shallow() });
        assert_eq!(ops[1], Operation::DeleteVariant { id: "v2".into() });
        assert!(ops[2..]
            .iter()
            .all(|op| op.action() != Action::Delete || op.kind() == EntityKind::Endpoint));
        assert_eq!(plan.count(EntityKind::Variant, Action::Delete), 1);
        assert_eq!(plan.count(EntityKind::Variant, Action::Create), 1);
    }

    #[test]
    fn test_new_variant_endpoints_reference_pending_create() {
        let original = saved_test();
        let mut edited = original.clone();
        edited
            .variants
            .push(Variant::new("C", 1.0).with_endpoint(Endpoint::new("http://c")));

        let plan = Plan::for_test(&original, &edited);
        let ops = plan.operations();
        let create_at = ops
            .iter()
            .position(|op| matches!(op, Operation::CreateVariant { .. }))
            .unwrap();

        match &ops[create_at + 1] {
            Operation::CreateEndpoint { parent, target, .. } => {
                assert_eq!(*parent, EndpointParent::Variant(IdRef::Pending(create_at)));
                assert_eq!(*target, IdTarget::VariantEndpoint(2, 0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_deletes_precede_creates() {
        let original = saved_test();
        let mut edited = original.clone();
        // "http://a1" is removed and re-added without its id
        edited.variants[0].endpoints = vec![
            Endpoint::new("http://a1"),
            Endpoint::new("http://a2").with_id("e2"),
        ];

        let plan = Plan::for_test(&original, &edited);
        let labels: Vec<String> = plan
            .operations()
            .iter()
            .filter(|op| op.kind() == EntityKind::Endpoint)
            .map(|op| op.to_string())
            .collect();
        assert_eq!(
            labels,
            [
                "delete endpoint e1",
                "create endpoint http://a1",
                "update endpoint e2 (http://a2)",
            ]
        );
    }

    #[test]
    fn test_endpoint_moved_between_variants_is_updated() {
        let original = saved_test();
        let mut edited = original.clone();
        let moved = edited.variants[0].endpoints.remove(1);
        edited.variants[1].endpoints.push(moved);

        let plan = Plan::for_test(&original, &edited);
        assert_eq!(plan.count(EntityKind::Endpoint, Action::Delete), 0);
        assert!(plan.operations().iter().any(|op| matches!(
            op,
            Operation::UpdateEndpoint { id, parent: EndpointParent::Variant(IdRef::Known(v)), .. }
                if id == "e2" && v == "v2"
        )));
    }

    #[test]
    fn test_unsaved_test_is_created_first() {
        let mut edited = Test::new("fresh").with_variant(Variant::new("A", 1.0));
        edited.domain = Some(DomainRef { domain_id: "d1".into() });

        let plan = Plan::for_test(&Test::new("fresh"), &edited);
        let ops = plan.operations();
        assert!(matches!(&ops[0], Operation::CreateTest { domain: Some(d), .. } if d == "d1"));
        assert!(matches!(
            &ops[1],
            Operation::CreateVariant { test: IdRef::Pending(0), .. }
        ));
    }

    #[test]
    fn test_domain_url_plan() {
        let original = Domain::new("h")
            .with_id("d1")
            .with_endpoint(Endpoint::new("http://x").with_id("1"));
        let mut edited = original.clone();
        edited.default_endpoints.clear();

        let plan = Plan::for_domain_urls(&original, &edited);
        assert_eq!(plan.operations(), [Operation::DeleteEndpoint { id: "1".into() }]);
    }

    #[test]
    fn test_id_sink_writes_back() {
        let mut test = Test::new("t").with_variant(
            Variant::new("A", 1.0).with_endpoint(Endpoint::new("http://a")),
        );
        test.assign(IdTarget::Test, "t9");
        test.assign(IdTarget::Variant(0), "v9");
        test.assign(IdTarget::VariantEndpoint(0, 0), "e9");
        // out of range targets are ignored
        test.assign(IdTarget::VariantEndpoint(3, 3), "zz");

        assert_eq!(test.test_id.as_deref(), Some("t9"));
        assert_eq!(test.variants[0].variant_id.as_deref(), Some("v9"));
        assert_eq!(test.variants[0].endpoints[0].endpoint_id.as_deref(), Some("e9"));
    }
}
