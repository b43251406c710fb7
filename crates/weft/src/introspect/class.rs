//! Class descriptors.

use std::marker::PhantomData;
use std::sync::Arc;

use super::{Invoke, Object, TypeKey};
use crate::error::Cause;
use crate::value::Value;

/// A named method of a class.
#[derive(Clone)]
pub struct Method {
    pub name: String,
    /// Number of arguments; `None` accepts any number.
    pub arity: Option<usize>,
    pub invoke: Invoke,
}

impl Method {
    pub fn accepts(&self, num_args: usize) -> bool {
        self.arity.map_or(true, |arity| arity == num_args)
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/", self.name)?;
        match self.arity {
            None => write!(f, "*"),
            Some(arity) => write!(f, "{arity}"),
        }
    }
}

/// Description of a type that templates can access.
#[derive(Debug)]
pub struct Class {
    name: String,
    type_key: TypeKey,
    methods: Vec<Method>,
    map_like: bool,
    per_instance: bool,
}

impl Class {
    /// Start describing the user type `T`.
    pub fn builder<T: Object>(name: &str) -> ClassBuilder<T> {
        ClassBuilder::with_downcast(name, downcast_object::<T>)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Methods in the order they were registered.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Find the first method with this exact name that accepts the number of arguments.
    pub fn find(&self, name: &str, num_args: usize) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.accepts(num_args))
    }

    /// Like [find](Class::find) but comparing names case-insensitively.
    pub fn find_ignore_case(&self, name: &str, num_args: usize) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name) && m.accepts(num_args))
    }

    /// Whether `.name` on values of this class falls back to `get("name")`.
    pub fn is_map_like(&self) -> bool {
        self.map_like
    }

    /// Whether the methods available depend on the instance, which disables caching.
    pub fn is_per_instance(&self) -> bool {
        self.per_instance
    }

    /// Method names, used for "did you mean" suggestions.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name.as_str()).collect()
    }
}

fn downcast_object<T: Object>(value: &Value) -> Option<&T> {
    value.downcast_ref::<T>()
}

/// Builder for a [Class] whose methods operate on a `&T`.
pub struct ClassBuilder<T: 'static> {
    name: String,
    type_key: TypeKey,
    methods: Vec<Method>,
    map_like: bool,
    per_instance: bool,
    downcast: fn(&Value) -> Option<&T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ClassBuilder<T> {
    /// Create a builder that extracts the `&T` from a value with the provided function.
    pub fn with_downcast(name: &str, downcast: fn(&Value) -> Option<&T>) -> ClassBuilder<T> {
        ClassBuilder {
            name: name.to_string(),
            type_key: TypeKey::of::<T>(),
            methods: vec![],
            map_like: false,
            per_instance: false,
            downcast,
            _marker: PhantomData,
        }
    }

    /// Register a method that can fail.
    pub fn fallible_method<F>(mut self, name: &str, arity: Option<usize>, f: F) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Option<Value>, Cause> + Send + Sync + 'static,
    {
        let downcast = self.downcast;
        let class_name = self.name.clone();
        let invoke: Invoke = Arc::new(move |target: &Value, args: &[Value]| {
            match downcast(target) {
                Some(t) => f(t, args),
                None => Err(format!(
                    "a {} cannot be used as a {class_name}",
                    target.type_name()
                )
                .into()),
            }
        });
        self.methods.push(Method {
            name: name.to_string(),
            arity,
            invoke,
        });
        self
    }

    /// Register a method that always succeeds.
    pub fn method<F>(self, name: &str, arity: Option<usize>, f: F) -> Self
    where
        F: Fn(&T, &[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.fallible_method(name, arity, move |t, args| Ok(f(t, args)))
    }

    /// Register a method without arguments, such as `getName` or `isEmpty`.
    pub fn getter<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.fallible_method(name, Some(0), move |t, _| Ok(f(t)))
    }

    /// Make `.name` fall back to calling `get("name")`.
    pub fn map_like(mut self) -> Self {
        self.map_like = true;
        self
    }

    /// Mark the class as having methods that depend on the instance.
    ///
    /// Accessors resolved on such classes are never cached.
    pub fn per_instance(mut self) -> Self {
        self.per_instance = true;
        self
    }

    pub fn build(self) -> Arc<Class> {
        Arc::new(Class {
            name: self.name,
            type_key: self.type_key,
            methods: self.methods,
            map_like: self.map_like,
            per_instance: self.per_instance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Counter(i64);

    impl Object for Counter {
        fn class(&self) -> Arc<Class> {
            Class::builder::<Counter>("Counter")
                .getter("getCount", |c| Some(Value::Int(c.0)))
                .method("add", Some(1), |c, args| {
                    Some(Value::Int(c.0 + args[0].as_int()?))
                })
                .fallible_method("fail", None, |_, _| Err("boom".into()))
                .build()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn typed_methods_receive_the_object() {
        let value = Value::object(Counter(4));
        let class = Counter(0).class();
        let add = class.find("add", 1).unwrap();
        assert_eq!((add.invoke)(&value, &[Value::Int(3)]).unwrap(), Some(Value::Int(7)));
        assert!(class.find("add", 2).is_none());
        assert!(class.find_ignore_case("GETCOUNT", 0).is_some());
    }

    #[test]
    fn variadic_arity() {
        let class = Counter(0).class();
        assert!(class.find("fail", 0).is_some());
        assert!(class.find("fail", 3).is_some());
    }

    #[test]
    fn wrong_target_is_an_error() {
        let class = Counter(0).class();
        let get = class.find("getCount", 0).unwrap();
        assert!((get.invoke)(&Value::Int(1), &[]).is_err());
    }

    #[test]
    fn type_key_is_the_object_type() {
        assert_eq!(Value::object(Counter(1)).type_key(), TypeKey::of::<Counter>());
    }
}
