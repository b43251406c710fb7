//! Accessor caches.
//!
//! An [Accessor] resolved for a node is only valid while the base value of that node keeps
//!     the same concrete type, so every cached accessor is stored with the [TypeKey] it was
//!     resolved for and a lookup only hits if the type still matches.
//!
//! There are two levels.
//! The per-render level lives in the [Context](crate::context::Context) and is keyed by [NodeKey].
//! The optional shared level is owned by a compiled template and survives across renders;
//!     entries are only ever inserted, never replaced, so concurrent renders that resolve the
//!     same accessor agree on one entry.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Accessor, TypeKey};
use crate::ast::NodeId;

/// A cached accessor together with the type it was resolved for.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub type_key: TypeKey,
    pub accessor: Accessor,
}

impl CacheEntry {
    /// The accessor if it was resolved for the provided type.
    pub fn get(&self, type_key: TypeKey) -> Option<&Accessor> {
        if self.type_key == type_key {
            Some(&self.accessor)
        } else {
            None
        }
    }
}

/// Template-scoped accessor cache shared by all renders of the template.
#[derive(Debug, Default)]
pub struct SharedAccessorCache {
    entries: RwLock<HashMap<(NodeId, TypeKey), Accessor>>,
}

impl SharedAccessorCache {
    pub fn get(&self, node: NodeId, type_key: TypeKey) -> Option<Accessor> {
        self.entries.read().get(&(node, type_key)).cloned()
    }

    /// Insert the accessor unless an entry already exists, and return the entry in the cache.
    pub fn insert_if_absent(&self, node: NodeId, type_key: TypeKey, accessor: Accessor) -> Accessor {
        if let Some(existing) = self.get(node, type_key) {
            return existing;
        }
        self.entries
            .write()
            .entry((node, type_key))
            .or_insert(accessor)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{AccessorKind, Invoke};
    use crate::value::Value;
    use std::sync::Arc;

    fn accessor(name: &str) -> Accessor {
        let invoke: Invoke = Arc::new(|_, _| Ok(None));
        Accessor::new(name, AccessorKind::Method, invoke)
    }

    #[test]
    fn entry_requires_matching_type() {
        let entry = CacheEntry {
            type_key: TypeKey::of::<String>(),
            accessor: accessor("length"),
        };
        assert!(entry.get(TypeKey::of::<String>()).is_some());
        assert!(entry.get(TypeKey::of::<i64>()).is_none());
    }

    #[test]
    fn first_insert_wins() {
        let cache = SharedAccessorCache::default();
        let node = NodeId(3);
        let key = TypeKey::of::<Value>();
        let first = cache.insert_if_absent(node, key, accessor("first"));
        let second = cache.insert_if_absent(node, key, accessor("second"));
        assert_eq!(first.name, "first");
        assert_eq!(second.name, "first");
        assert_eq!(cache.len(), 1);
        assert!(cache.get(node, TypeKey::of::<String>()).is_none());
    }

    #[test]
    fn concurrent_inserts_agree() {
        let cache = Arc::new(SharedAccessorCache::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache
                        .insert_if_absent(NodeId(0), TypeKey::of::<i64>(), accessor(&format!("a{i}")))
                        .name
                })
            })
            .collect();
        let names: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(names.iter().all(|n| *n == names[0]));
    }
}
