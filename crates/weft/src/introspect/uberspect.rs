//! The default [Introspector].
//!
//! Property accesses `.name` are resolved by trying, in order:
//!
//! 1. the getter `getName()`,
//! 1. the getter `getname()`, i.e. with the first letter of the name in the other case,
//! 1. the boolean getter `isName()`,
//! 1. `get("name")`, but only on map-like classes.
//!
//! Method calls `.name(args)` are resolved by exact name and arity,
//!     then by name ignoring case.

use std::sync::Arc;

use super::{builtin, Accessor, AccessorKind, Class, Introspector};
use crate::value::Value;

/// A strategy for resolving a property access on a class.
pub trait Strategy: Send + Sync {
    fn resolve(&self, class: &Class, name: &str) -> Option<Accessor>;
}

/// Resolves `.name` to `getName()`.
pub struct ExactGetter;

/// Resolves `.name` to `getname()`, with the first letter in the other case.
pub struct CaseFoldedGetter;

/// Resolves `.name` to `isName()`.
pub struct BooleanGetter;

/// Resolves `.name` to `get("name")` on map-like classes.
pub struct IndexedGet;

fn capitalize(name: &str, upper: bool) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let first: String = if upper {
                first.to_uppercase().collect()
            } else {
                first.to_lowercase().collect()
            };
            first + chars.as_str()
        }
    }
}

fn accessor_for(class: &Class, method: &str, kind: AccessorKind) -> Option<Accessor> {
    class
        .find(method, 0)
        .map(|m| Accessor::new(m.name.clone(), kind, m.invoke.clone()))
}

impl Strategy for ExactGetter {
    fn resolve(&self, class: &Class, name: &str) -> Option<Accessor> {
        accessor_for(
            class,
            &format!("get{}", capitalize(name, true)),
            AccessorKind::Getter,
        )
    }
}

impl Strategy for CaseFoldedGetter {
    fn resolve(&self, class: &Class, name: &str) -> Option<Accessor> {
        let first_upper = name.chars().next().map_or(false, char::is_uppercase);
        let folded = format!("get{}", capitalize(name, !first_upper));
        accessor_for(class, &folded, AccessorKind::Getter)
    }
}

impl Strategy for BooleanGetter {
    fn resolve(&self, class: &Class, name: &str) -> Option<Accessor> {
        accessor_for(
            class,
            &format!("is{}", capitalize(name, true)),
            AccessorKind::BooleanGetter,
        )
    }
}

impl Strategy for IndexedGet {
    fn resolve(&self, class: &Class, name: &str) -> Option<Accessor> {
        if !class.is_map_like() {
            return None;
        }
        let get = class.find("get", 1)?;
        Some(
            Accessor::new("get", AccessorKind::IndexedGet, get.invoke.clone())
                .with_bound_args(vec![Value::from(name)]),
        )
    }
}

/// The default introspector.
pub struct Uberspector {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for Uberspector {
    fn default() -> Self {
        Uberspector {
            strategies: vec![
                Box::new(ExactGetter),
                Box::new(CaseFoldedGetter),
                Box::new(BooleanGetter),
                Box::new(IndexedGet),
            ],
        }
    }
}

impl Uberspector {
    /// Create an introspector with a custom list of property strategies.
    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>) -> Uberspector {
        Uberspector { strategies }
    }
}

impl Introspector for Uberspector {
    fn class_of(&self, target: &Value) -> Arc<Class> {
        builtin::class_of(target)
    }

    fn property(&self, target: &Value, name: &str) -> Option<Accessor> {
        let class = self.class_of(target);
        let cacheable = !class.is_per_instance();
        self.strategies
            .iter()
            .find_map(|strategy| strategy.resolve(&class, name))
            .map(|accessor| accessor.with_cacheable(cacheable))
    }

    fn method(&self, target: &Value, name: &str, args: &[Value]) -> Option<Accessor> {
        let class = self.class_of(target);
        let method = class
            .find(name, args.len())
            .or_else(|| class.find_ignore_case(name, args.len()))?;
        Some(
            Accessor::new(method.name.clone(), AccessorKind::Method, method.invoke.clone())
                .with_cacheable(!class.is_per_instance()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::Object;
    use std::any::Any;

    struct Person {
        name: String,
        admin: bool,
    }

    impl Object for Person {
        fn class(&self) -> Arc<Class> {
            Class::builder::<Person>("Person")
                .getter("getName", |p| Some(Value::from(p.name.as_str())))
                .getter("geturl", |_| Some(Value::from("http://x")))
                .getter("isAdmin", |p| Some(Value::Bool(p.admin)))
                .method("greet", Some(1), |p, args| {
                    Some(Value::String(format!("{} greets {}", p.name, args[0])))
                })
                .build()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn person() -> Value {
        Value::object(Person {
            name: "Ada".into(),
            admin: true,
        })
    }

    fn property(target: &Value, name: &str) -> Option<(String, AccessorKind, Option<Value>)> {
        let accessor = Uberspector::default().property(target, name)?;
        let result = accessor.invoke(target, &[]).unwrap();
        Some((accessor.name.clone(), accessor.kind, result))
    }

    #[test]
    fn exact_getter() {
        let (name, kind, value) = property(&person(), "name").unwrap();
        assert_eq!(name, "getName");
        assert_eq!(kind, AccessorKind::Getter);
        assert_eq!(value, Some(Value::from("Ada")));
    }

    #[test]
    fn case_folded_getter() {
        let (name, _, _) = property(&person(), "Url").unwrap();
        assert_eq!(name, "geturl");
    }

    #[test]
    fn boolean_getter() {
        let (name, kind, value) = property(&person(), "admin").unwrap();
        assert_eq!(name, "isAdmin");
        assert_eq!(kind, AccessorKind::BooleanGetter);
        assert_eq!(value, Some(Value::Bool(true)));
    }

    #[test]
    fn indexed_get_only_on_map_like() {
        let map = Value::from_iter([("size", "big")]);
        let (name, kind, value) = property(&map, "size").unwrap();
        assert_eq!(name, "get");
        assert_eq!(kind, AccessorKind::IndexedGet);
        assert_eq!(value, Some(Value::from("big")));
        assert!(property(&person(), "missing").is_none());
    }

    #[test]
    fn method_by_arity_then_ignoring_case() {
        let uberspector = Uberspector::default();
        let target = person();
        let args = [Value::from("Bob")];
        let accessor = uberspector.method(&target, "GREET", &args).unwrap();
        assert_eq!(accessor.name, "greet");
        assert_eq!(
            accessor.invoke(&target, &args).unwrap(),
            Some(Value::from("Ada greets Bob"))
        );
        assert!(uberspector.method(&target, "greet", &[]).is_none());
    }

    #[test]
    fn custom_strategy_list() {
        let uberspector = Uberspector::with_strategies(vec![Box::new(BooleanGetter)]);
        assert!(uberspector.property(&person(), "name").is_none());
        assert!(uberspector.property(&person(), "admin").is_some());
    }
}
