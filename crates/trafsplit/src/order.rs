// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Manual display order for top-level lists.
//!
//! The backend returns domains and variants in its own order; operators
//! reorder them by drag and drop. That order is kept as a flat list of ids,
//! reconciled against every fresh fetch and persisted through a
//! [`KeyValueStore`].

use crate::model::Identified;
use crate::store::{KeyValueStore, StoreError};
use std::collections::{HashMap, HashSet};

/// Store key for the domain list order.
pub const DOMAIN_ORDER_KEY: &str = "domainOrder";

/// Store key for the variant list order.
pub const VARIANT_ORDER_KEY: &str = "variantOrder";

/// Merge a known order with freshly fetched ids.
///
/// Ids of `incoming` missing from `order` are appended in arrival order,
/// then ids of `order` absent from `incoming` are dropped. The result holds
/// every id of `incoming` exactly once.
pub fn reconcile(order: &[String], incoming: &[String]) -> Vec<String> {
    let present: HashSet<&str> = incoming.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(incoming.len());

    for id in order.iter().chain(incoming.iter()) {
        if present.contains(id.as_str()) && seen.insert(id.as_str()) {
            out.push(id.clone());
        }
    }
    out
}

/// Move `dragged` into the slot `target` holds before the move.
///
/// Moving backward lands right in front of `target`; moving forward lands
/// right after it (`[a, b, c]`, `a` onto `c` gives `[b, c, a]`). Returns
/// `order` unchanged when either id is absent or both are equal.
pub fn move_before(order: &[String], dragged: &str, target: &str) -> Vec<String> {
    if dragged == target {
        return order.to_vec();
    }
    let Some(from) = order.iter().position(|id| id == dragged) else {
        return order.to_vec();
    };
    let Some(to) = order.iter().position(|id| id == target) else {
        return order.to_vec();
    };

    let mut out = order.to_vec();
    let moved = out.remove(from);
    out.insert(to.min(out.len()), moved);
    out
}

/// Sort `items` by `order`.
///
/// Items missing from `order` (including unsaved ones) keep their relative
/// position after the ordered ones.
pub fn arrange<T: Identified>(items: Vec<T>, order: &[String]) -> Vec<T> {
    let rank: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut keyed: Vec<(usize, usize, T)> = items
        .into_iter()
        .enumerate()
        .map(|(pos, item)| {
            let r = item
                .id()
                .and_then(|id| rank.get(id).copied())
                .unwrap_or(usize::MAX);
            (r, pos, item)
        })
        .collect();
    keyed.sort_by_key(|(r, pos, _)| (*r, *pos));
    keyed.into_iter().map(|(_, _, item)| item).collect()
}

/// Ids of persisted items, in list order.
pub fn ids_of<T: Identified>(items: &[T]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.id().map(str::to_string))
        .collect()
}

/// Persisted order for one list.
pub struct OrderBook<S: KeyValueStore> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> OrderBook<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored order, or empty when none (or unreadable) is stored.
    pub fn stored(&self) -> Result<Vec<String>, StoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                tracing::warn!("Ignoring unreadable order under '{}': {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    /// Stored order reconciled with freshly fetched ids.
    pub fn load(&self, fetched: &[String]) -> Result<Vec<String>, StoreError> {
        Ok(reconcile(&self.stored()?, fetched))
    }

    /// Persist `order`.
    pub fn save(&self, order: &[String]) -> Result<(), StoreError> {
        let json = serde_json::to_string(order).map_err(|source| StoreError::Corrupt {
            path: self.key.clone().into(),
            source,
        })?;
        self.store.set(&self.key, &json)
    }

    /// Apply a drag-and-drop move and persist the result.
    pub fn move_before(
        &self,
        order: &[String],
        dragged: &str,
        target: &str,
    ) -> Result<Vec<String>, StoreError> {
        let moved = move_before(order, dragged, target);
        if moved != order {
            self.save(&moved)?;
            tracing::debug!("{}: moved {} before {}", self.key, dragged, target);
        }
        Ok(moved)
    }

    /// Append a newly created id to the stored order.
    pub fn push(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let mut order = self.stored()?;
        if !order.iter().any(|known| known == id) {
            order.push(id.to_string());
        }
        self.save(&order)?;
        Ok(order)
    }

    /// Drop a deleted id from the stored order.
    pub fn forget(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let mut order = self.stored()?;
        order.retain(|known| known != id);
        self.save(&order)?;
        Ok(order)
    }

    /// Load the order for `items`, arrange them, and persist the reconciled
    /// order.
    pub fn apply<T: Identified>(&self, items: Vec<T>) -> Result<Vec<T>, StoreError> {
        let order = self.load(&ids_of(&items))?;
        self.save(&order)?;
        Ok(arrange(items, &order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;
    use crate::store::MemoryStore;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_appends_and_drops() {
        let order = ids(&["b", "a", "gone"]);
        let incoming = ids(&["a", "c", "b", "d"]);
        assert_eq!(reconcile(&order, &incoming), ids(&["b", "a", "c", "d"]));
    }

    #[test]
    fn test_reconcile_empty_order_takes_incoming() {
        assert_eq!(reconcile(&[], &ids(&["x", "y"])), ids(&["x", "y"]));
        assert!(reconcile(&ids(&["x"]), &[]).is_empty());
    }

    #[test]
    fn test_reconcile_deduplicates() {
        let order = ids(&["a", "a"]);
        let incoming = ids(&["b", "a", "b"]);
        assert_eq!(reconcile(&order, &incoming), ids(&["a", "b"]));
    }

    #[test]
    fn test_move_before() {
        let order = ids(&["a", "b", "c"]);
        assert_eq!(move_before(&order, "c", "a"), ids(&["c", "a", "b"]));
        // forward moves land after the target
        assert_eq!(move_before(&order, "a", "c"), ids(&["b", "c", "a"]));
        assert_eq!(move_before(&order, "a", "b"), ids(&["b", "a", "c"]));
        assert_eq!(move_before(&order, "b", "b"), order);
    }

    #[test]
    fn test_move_before_absent_is_noop() {
        let order = ids(&["a", "b"]);
        assert_eq!(move_before(&order, "x", "a"), order);
        assert_eq!(move_before(&order, "a", "x"), order);
    }

    #[test]
    fn test_arrange_keeps_unknown_last() {
        let items = vec![
            Variant::new("A", 1.0).with_id("a"),
            Variant::new("new", 1.0),
            Variant::new("B", 1.0).with_id("b"),
            Variant::new("C", 1.0).with_id("c"),
        ];
        let arranged = arrange(items, &ids(&["c", "a"]));
        let names: Vec<&str> = arranged.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["C", "A", "new", "B"]);
    }

    #[test]
    fn test_order_book_persists() {
        let store = MemoryStore::new();
        let book = OrderBook::new(&store, VARIANT_ORDER_KEY);

        let order = book.load(&ids(&["a", "b", "c"])).unwrap();
        let moved = book.move_before(&order, "c", "a").unwrap();
        assert_eq!(moved, ids(&["c", "a", "b"]));

        // next session: "a" deleted server-side, "d" added
        let next = book.load(&ids(&["b", "c", "d"])).unwrap();
        assert_eq!(next, ids(&["c", "b", "d"]));
    }

    #[test]
    fn test_order_book_push_and_forget() {
        let store = MemoryStore::new();
        let book = OrderBook::new(&store, DOMAIN_ORDER_KEY);
        book.save(&ids(&["b", "a"])).unwrap();

        assert_eq!(book.push("c").unwrap(), ids(&["b", "a", "c"]));
        assert_eq!(book.push("a").unwrap(), ids(&["b", "a", "c"]));
        assert_eq!(book.forget("b").unwrap(), ids(&["a", "c"]));
        assert_eq!(book.stored().unwrap(), ids(&["a", "c"]));
    }

    #[test]
    fn test_order_book_ignores_garbage() {
        let store = MemoryStore::new();
        store.set(DOMAIN_ORDER_KEY, "{oops").unwrap();
        let book = OrderBook::new(&store, DOMAIN_ORDER_KEY);
        assert_eq!(book.load(&ids(&["x"])).unwrap(), ids(&["x"]));
    }
}
