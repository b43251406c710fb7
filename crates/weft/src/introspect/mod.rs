//! Reflection-like dispatch of member and method accesses.
//!
//! Rust has no runtime reflection, so every type that a template can call into is described
//!     by a [Class]: a name, a [TypeKey] identifying the concrete type, and a list of
//!     named methods with their arity.
//! Built-in values (strings, lists, maps, numbers) have built-in classes,
//!     see the [builtin] module; user types implement [Object] and build their class
//!     with a [ClassBuilder].
//!
//! When the renderer meets `$x.name` or `$x.name(args)` it asks an [Introspector] for an
//!     [Accessor] that implements the access on the current value of `$x`.
//! The default introspector, the [Uberspector](uberspect::Uberspector), runs an ordered
//!     list of strategies over the class of the value.
//! Resolved accessors are cached per node and per concrete type; see the [cache] module.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::Cause;
use crate::value::Value;

pub mod builtin;
pub mod cache;
pub mod class;
pub mod uberspect;

pub use class::{Class, ClassBuilder, Method};
pub use uberspect::Uberspector;

/// Identity of a concrete Rust type.
///
/// The name is only used in diagnostics; equality is decided by the type id.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> TypeKey {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// A user type that templates can access.
///
/// ```
/// use std::sync::{Arc, OnceLock};
/// use weft::introspect::{Class, Object};
/// use weft::Value;
///
/// struct User { name: String }
///
/// impl Object for User {
///     fn class(&self) -> Arc<Class> {
///         static CLASS: OnceLock<Arc<Class>> = OnceLock::new();
///         CLASS
///             .get_or_init(|| {
///                 Class::builder::<User>("User")
///                     .getter("getName", |u| Some(Value::from(u.name.as_str())))
///                     .build()
///             })
///             .clone()
///     }
///
///     fn as_any(&self) -> &dyn std::any::Any {
///         self
///     }
/// }
/// ```
pub trait Object: Send + Sync + 'static {
    fn class(&self) -> Arc<Class>;

    fn as_any(&self) -> &dyn Any;

    fn type_key(&self) -> TypeKey {
        self.class().type_key()
    }

    /// Text printed when a reference evaluates to this object.
    fn to_text(&self) -> String {
        self.class().name().to_string()
    }

    /// Elements visited by `#foreach`, if the object is iterable.
    fn iter(&self) -> Option<Vec<Value>> {
        None
    }
}

/// The type-erased implementation of a method.
///
/// It receives the target value and the evaluated arguments and returns the result,
///     which may be absent.
/// An error return means the method itself failed.
pub type Invoke = Arc<dyn Fn(&Value, &[Value]) -> Result<Option<Value>, Cause> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// `getName()` invoked for `.name`.
    Getter,
    /// `isName()` invoked for `.name`.
    BooleanGetter,
    /// `get("name")` invoked for `.name` on a map-like value.
    IndexedGet,
    /// A method invoked for `.name(args)` or an index.
    Method,
}

/// A resolved member or method access.
#[derive(Clone)]
pub struct Accessor {
    /// Name of the underlying method.
    pub name: String,
    pub kind: AccessorKind,
    invoke: Invoke,
    /// Arguments inserted before the call arguments.
    bound_args: Vec<Value>,
    /// Whether the accessor may be reused for other values of the same type.
    pub cacheable: bool,
}

impl Accessor {
    pub fn new<N: Into<String>>(name: N, kind: AccessorKind, invoke: Invoke) -> Accessor {
        Accessor {
            name: name.into(),
            kind,
            invoke,
            bound_args: vec![],
            cacheable: true,
        }
    }

    pub fn with_bound_args(mut self, bound_args: Vec<Value>) -> Accessor {
        self.bound_args = bound_args;
        self
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Accessor {
        self.cacheable = cacheable;
        self
    }

    pub fn invoke(&self, target: &Value, args: &[Value]) -> Result<Option<Value>, Cause> {
        if self.bound_args.is_empty() {
            return (self.invoke)(target, args);
        }
        let mut all = Vec::with_capacity(self.bound_args.len() + args.len());
        all.extend_from_slice(&self.bound_args);
        all.extend_from_slice(args);
        (self.invoke)(target, &all)
    }
}

impl std::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bound_args", &self.bound_args)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

/// Resolves accesses on runtime values.
pub trait Introspector: Send + Sync {
    /// The class describing a value.
    fn class_of(&self, target: &Value) -> Arc<Class>;

    /// Resolve `.name` on the target.
    fn property(&self, target: &Value, name: &str) -> Option<Accessor>;

    /// Resolve `.name(args)` on the target.
    fn method(&self, target: &Value, name: &str, args: &[Value]) -> Option<Accessor>;

    /// Elements of the target for `#foreach`, or `None` if it cannot be iterated.
    fn iterate(&self, target: &Value) -> Option<Vec<Value>> {
        match target {
            Value::List(list) => Some(list.clone()),
            Value::Map(map) => Some(map.values().cloned().collect()),
            Value::Object(object) => object.iter(),
            _ => None,
        }
    }
}
