//! Render contexts.
//!
//! A context holds the variable bindings of one render, and also the per-render
//!     accessor cache.
//! Keeping the cache here rather than in the syntax tree is what allows one compiled
//!     template to be rendered by many threads at once: each render brings its own context.

use std::collections::HashMap;

use crate::ast::NodeKey;
use crate::introspect::cache::CacheEntry;
use crate::value::{Map, Value};

/// Variable bindings and per-render state.
pub trait Context {
    fn get(&self, name: &str) -> Option<&Value>;

    fn get_mut(&mut self, name: &str) -> Option<&mut Value>;

    /// Bind a value, returning the previous binding.
    fn put(&mut self, name: &str, value: Value) -> Option<Value>;

    /// Remove a binding, returning it.
    fn remove(&mut self, name: &str) -> Option<Value>;

    fn cache_get(&self, key: NodeKey) -> Option<&CacheEntry>;

    fn cache_put(&mut self, key: NodeKey, entry: CacheEntry);

    /// Names currently bound; used to suggest alternatives for undefined references.
    fn names(&self) -> Vec<String> {
        vec![]
    }
}

/// The default context, backed by a hash map.
#[derive(Debug, Default, Clone)]
pub struct MapContext {
    values: HashMap<String, Value>,
    cache: HashMap<NodeKey, CacheEntry>,
}

impl MapContext {
    pub fn new() -> MapContext {
        Default::default()
    }

    /// Builder-style [put](Context::put).
    pub fn with<V: Into<Value>>(mut self, name: &str, value: V) -> MapContext {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Number of cached accessors.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl From<Map> for MapContext {
    fn from(map: Map) -> Self {
        MapContext {
            values: map.into_iter().collect(),
            cache: HashMap::new(),
        }
    }
}

impl Context for MapContext {
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    fn put(&mut self, name: &str, value: Value) -> Option<Value> {
        self.values.insert(name.to_string(), value)
    }

    fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    fn cache_get(&self, key: NodeKey) -> Option<&CacheEntry> {
        self.cache.get(&key)
    }

    fn cache_put(&mut self, key: NodeKey, entry: CacheEntry) {
        self.cache.insert(key, entry);
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Binds a variable and restores the previous binding when [restore](Binding::restore) is called.
pub(crate) struct Binding {
    name: String,
    previous: Option<Value>,
}

impl Binding {
    pub(crate) fn bind(ctx: &mut dyn Context, name: &str, value: Option<Value>) -> Binding {
        let previous = match value {
            Some(value) => ctx.put(name, value),
            None => ctx.remove(name),
        };
        Binding {
            name: name.to_string(),
            previous,
        }
    }

    pub(crate) fn restore(self, ctx: &mut dyn Context) {
        match self.previous {
            Some(value) => {
                ctx.put(&self.name, value);
            }
            None => {
                ctx.remove(&self.name);
            }
        }
    }
}
