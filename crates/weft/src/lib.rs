//! # Weft: a template language with reflective reference resolution.
//!
//! Weft templates mix literal text with references like `$user.name` and directives
//!     like `#if`, `#foreach` and `#macro`.
//! A template is compiled once into an immutable [Template] and can then be rendered
//!     any number of times, from any number of threads, against different [contexts](Context).
//!
//! ```
//! use weft::{Engine, MapContext};
//!
//! let engine = Engine::new();
//! let template = engine.compile("hello", "Hello $name.toUpperCase()!").unwrap();
//! let mut ctx = MapContext::new().with("name", "world");
//! assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "Hello WORLD!");
//! ```
//!
//! Members and methods of values are resolved at render time by an
//!     [Introspector](introspect::Introspector). Host types take part by implementing
//!     [Object](introspect::Object).

extern crate weft_stdext;

pub mod ast;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod parse;
pub mod render;
pub mod template;
pub mod token;
pub mod value;

pub use config::Config;
pub use context::{Context, MapContext};
pub use engine::{Engine, EngineBuilder, FileResourceLoader, MemoryResourceLoader, ResourceLoader};
pub use error::{CompileError, Error, InvocationError, RenderError, ResourceError, TemplateError};
pub use render::output::{IoOutput, Output};
pub use template::Template;
pub use value::{Map, Value};

/// Module that re-exports all of the crate's traits.
///
/// ```
/// use weft::traits::*;
/// ```
pub mod traits {
    pub use super::context::Context;
    pub use super::engine::ResourceLoader;
    pub use super::error::TemplateError;
    pub use super::introspect::{Introspector, Object};
    pub use super::render::diagnostics::Diagnostics;
    pub use super::render::events::EventHandler;
    pub use super::render::output::Output;
}
