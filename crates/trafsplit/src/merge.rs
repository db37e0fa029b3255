// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Merge of local edits with a fresh server snapshot.
//!
//! Applied when a refresh lands: the server copy wins for every persisted
//! entity, entities deleted server-side disappear, and local entities that
//! were never saved survive after the server entries.

use crate::model::{Domain, Identified};

/// Merged view of one list.
pub fn merge_view<T: Identified + Clone>(local: &[T], server: &[T]) -> Vec<T> {
    let mut out: Vec<T> = server.to_vec();
    out.extend(local.iter().filter(|item| !item.is_saved()).cloned());
    out
}

/// Replace (or insert) one entity in a cached list by id.
///
/// Returns `true` when an existing entry was replaced.
pub fn upsert<T: Identified>(list: &mut Vec<T>, fresh: T) -> bool {
    let Some(id) = fresh.id().map(str::to_string) else {
        list.push(fresh);
        return false;
    };
    match list.iter_mut().find(|item| item.id() == Some(id.as_str())) {
        Some(slot) => {
            *slot = fresh;
            true
        }
        None => {
            list.push(fresh);
            false
        }
    }
}

/// Remove an entity (and with it, all of its children) from a cached list.
pub fn remove<T: Identified>(list: &mut Vec<T>, id: &str) -> bool {
    let before = list.len();
    list.retain(|item| item.id() != Some(id));
    list.len() != before
}

/// Merge a whole domain tree: the domain list and, inside every domain,
/// its tests, then inside every test, its variants.
pub fn merge_domains(local: &[Domain], server: &[Domain]) -> Vec<Domain> {
    let mut merged = merge_view(local, server);
    for domain in merged.iter_mut().filter(|d| d.is_saved()) {
        let Some(local_domain) = local.iter().find(|d| d.id().is_some() && d.id() == domain.id())
        else {
            continue;
        };
        domain.tests = merge_view(&local_domain.tests, &domain.tests);
        for test in domain.tests.iter_mut().filter(|t| t.is_saved()) {
            if let Some(local_test) = local_domain
                .tests
                .iter()
                .find(|t| t.id().is_some() && t.id() == test.id())
            {
                test.variants = merge_view(&local_test.variants, &test.variants);
            }
        }
    }
    merged
}
