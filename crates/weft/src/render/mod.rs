//! The interpreter.
//!
//! A render walks the syntax tree of a compiled template. Every node supports some of
//!     four operations:
//!
//! - *render* writes the node to the output,
//! - *value* evaluates an expression node to a [Value], or to nothing,
//! - *evaluate* evaluates a node as a condition,
//! - *apply* applies a member, method or index access to a base value.
//!
//! All state that changes during a render lives in the [Renderer] and in the [Context]
//!     passed to it. The template itself is never modified, so any number of renders of
//!     the same template can run at once on different threads.

use log::Level;
use weft_stdext::algorithms::spellcheck;

use crate::ast::reference::Mode;
use crate::ast::{BinaryOp, NodeId, NodeKey, NodeKind, UnaryOp};
use crate::context::{Binding, Context};
use crate::engine::Engine;
use crate::error::{Error, InvocationError, RenderError, TemplateError};
use crate::introspect::builtin::resolve_index;
use crate::introspect::cache::CacheEntry;
use crate::introspect::{Accessor, Class, Introspector};
use crate::template::Template;
use crate::value::{Map, Value};

pub mod diagnostics;
pub mod events;
pub mod ops;
pub mod output;

use diagnostics::Diagnostic;
use output::Output;

/// How control leaves a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// `#break`: leave the innermost `#foreach` or macro body.
    Break,
    /// `#stop`: end the render.
    Stop,
}

/// What a reference lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// The value is used; a miss is reported, and is an error in strict mode.
    Value,
    /// Only the presence of the value matters; a miss is silent.
    Test,
}

/// State of an `#if` while its branches are tried in order.
enum Branching {
    Evaluating(usize),
    Rendered(Flow),
    NoneMatched,
}

/// A step on the left hand side of `#set`.
enum Key {
    Name(String),
    Index(Value),
}

impl Key {
    fn text(&self) -> String {
        match self {
            Key::Name(name) => name.clone(),
            Key::Index(value) => value.to_text(),
        }
    }
}

pub(crate) struct Renderer<'e> {
    engine: &'e Engine,
    /// Templates with a render in progress, outermost first.
    ///
    /// Macros are looked up in the current template and then in these, innermost first.
    callers: Vec<Template>,
    macro_depth: usize,
    parse_depth: usize,
}

impl<'e> Renderer<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Renderer<'e> {
        Renderer {
            engine,
            callers: Vec::new(),
            macro_depth: 0,
            parse_depth: 0,
        }
    }

    pub(crate) fn render_template(
        &mut self,
        t: &Template,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        self.render_node(t, t.ast().root(), ctx, out)
    }

    fn render_node(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let ast = t.ast();
        let kind = ast.kind(id);
        if kind.directive_name().is_some() && !matches!(kind, NodeKind::MacroCall { .. }) {
            write_backslashes(ast.first_token(id).escape_count(), out)?;
        }
        match kind {
            NodeKind::Template | NodeKind::Block => {
                for &child in ast.children(id) {
                    match self.render_node(t, child, ctx, out)? {
                        Flow::Continue => {}
                        flow => return Ok(flow),
                    }
                }
            }
            NodeKind::Text => out.write(&ast.first_token(id).text)?,
            NodeKind::TextBlock => {
                let text = &ast.first_token(id).text;
                let inner = text.strip_prefix("#[[").unwrap_or(text);
                out.write(inner.strip_suffix("]]#").unwrap_or(inner))?;
            }
            NodeKind::EscapedDirective => {
                let token = ast.first_token(id);
                write_backslashes(token.escape_count(), out)?;
                out.write(&token.text)?;
            }
            NodeKind::Reference { .. } => self.render_reference(t, id, ctx, out)?,
            NodeKind::Set => self.render_set(t, id, ctx)?,
            NodeKind::If => return self.render_if(t, id, ctx, out),
            NodeKind::Foreach => return self.render_foreach(t, id, ctx, out),
            NodeKind::MacroCall { name } => return self.render_macro_call(t, id, name, ctx, out),
            NodeKind::Define => return self.render_define(t, id, ctx),
            NodeKind::Evaluate => return self.render_evaluate(t, id, ctx, out),
            NodeKind::Include => self.render_include(t, id, ctx, out)?,
            NodeKind::Parse => return self.render_parse(t, id, ctx, out),
            NodeKind::Break => return Ok(Flow::Break),
            NodeKind::Stop => return Ok(Flow::Stop),
            // Macro definitions are collected when the template is compiled.
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn render_reference(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<(), RenderError> {
        let root = match t.reference_root(id) {
            Some(root) => root,
            None => return Ok(()),
        };
        let text = match root.flavor.mode {
            Mode::Runt => root.literal.clone(),
            Mode::Escaped => match self.reference_value(t, id, ctx, Lookup::Test)? {
                Some(_) => root.present_text(""),
                None => root.absent_text(),
            },
            Mode::Live => {
                let lookup = if root.flavor.quiet {
                    Lookup::Test
                } else {
                    Lookup::Value
                };
                let engine = self.engine;
                let events = engine.events();
                match self.reference_value(t, id, ctx, lookup)? {
                    Some(value) => {
                        let value = events.reference_insert(&root.literal, value);
                        root.present_text(&value.to_text())
                    }
                    None => match events.invalid_reference(&root.literal) {
                        Some(value) => root.present_text(&value.to_text()),
                        None => root.absent_text(),
                    },
                }
            }
        };
        out.write(&text)?;
        Ok(())
    }

    /// Look up the root of a reference in the context and apply its accesses in turn.
    fn reference_value(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        lookup: Lookup,
    ) -> Result<Option<Value>, RenderError> {
        let root = match t.reference_root(id) {
            Some(root) => root,
            None => return Ok(None),
        };
        if root.flavor.mode == Mode::Runt {
            return Ok(Some(Value::String(root.literal.clone())));
        }
        let mut value = match ctx.get(&root.name) {
            Some(value) => value.clone(),
            None => {
                let names = ctx.names();
                let suggestion =
                    spellcheck::closest(names.iter().map(String::as_str), &root.name);
                let message = format!("${} is not defined", root.name);
                return self.miss(t, id, id, lookup, message, suggestion);
            }
        };
        let ast = t.ast();
        for &child in ast.children(id) {
            match self.apply(t, child, &value, ctx)? {
                Some(next) => value = next,
                None => {
                    let suggestion = match ast.kind(child) {
                        NodeKind::Member { name } | NodeKind::Method { name } => {
                            let class = self.engine.introspector().class_of(&value);
                            spellcheck::closest(property_names(&class).iter().map(String::as_str), name)
                        }
                        _ => None,
                    };
                    let message = format!(
                        "{} has no value on a {}",
                        ast.literal(child),
                        value.type_name()
                    );
                    return self.miss(t, id, child, lookup, message, suggestion);
                }
            }
        }
        Ok(Some(value))
    }

    fn miss(
        &self,
        t: &Template,
        reference: NodeId,
        at: NodeId,
        lookup: Lookup,
        message: String,
        suggestion: Option<String>,
    ) -> Result<Option<Value>, RenderError> {
        if lookup == Lookup::Test {
            return Ok(None);
        }
        let literal = t
            .reference_root(reference)
            .map(|root| root.literal.clone())
            .unwrap_or_default();
        if self.engine.config().strict {
            return Err(RenderError::UndefinedReference {
                reference: literal,
                suggestion,
                trace: t.trace(at),
            });
        }
        let message = match suggestion {
            Some(suggestion) => format!("{literal}: {message} (did you mean {suggestion}?)"),
            None => format!("{literal}: {message}"),
        };
        self.report(t, at, Level::Debug, message);
        Ok(None)
    }

    /// Apply a member, method or index access to a base value.
    fn apply(
        &mut self,
        t: &Template,
        id: NodeId,
        base: &Value,
        ctx: &mut dyn Context,
    ) -> Result<Option<Value>, RenderError> {
        let ast = t.ast();
        match ast.kind(id) {
            NodeKind::Member { name } => {
                let accessor = self.resolve(t, id, base, ctx, |i| i.property(base, name));
                match accessor {
                    Some(accessor) => self.invoke(t, id, &accessor, base, &[]),
                    None => Ok(None),
                }
            }
            NodeKind::Method { name } => {
                let args = match self.arguments(t, id, ctx)? {
                    Some(args) => args,
                    None => return Ok(None),
                };
                let accessor = self.resolve(t, id, base, ctx, |i| i.method(base, name, &args));
                match accessor {
                    Some(accessor) => self.invoke(t, id, &accessor, base, &args),
                    None => Ok(None),
                }
            }
            NodeKind::Index => {
                let index = match ast.child(id, 0) {
                    Some(child) => self.value(t, child, ctx)?,
                    None => None,
                };
                let args = match index {
                    Some(index) => vec![index],
                    None => return Ok(None),
                };
                let accessor = self.resolve(t, id, base, ctx, |i| i.method(base, "get", &args));
                match accessor {
                    Some(accessor) => self.invoke(t, id, &accessor, base, &args),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Values of the arguments of a method call, or `None` if any has no value.
    fn arguments(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<Option<Vec<Value>>, RenderError> {
        let ast = t.ast();
        let mut args = Vec::with_capacity(ast.children(id).len());
        for (i, &child) in ast.children(id).iter().enumerate() {
            match self.value(t, child, ctx)? {
                Some(arg) => args.push(arg),
                None => {
                    self.report(
                        t,
                        child,
                        Level::Debug,
                        format!("argument {} of {} has no value", i + 1, ast.literal(id)),
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(args))
    }

    /// Find the accessor for a node and the type of its base value.
    ///
    /// The per-render cache in the context is consulted first, then the template's
    ///     shared cache if it has one, and only then the introspector.
    fn resolve<F>(
        &self,
        t: &Template,
        id: NodeId,
        base: &Value,
        ctx: &mut dyn Context,
        find: F,
    ) -> Option<Accessor>
    where
        F: FnOnce(&dyn Introspector) -> Option<Accessor>,
    {
        let key = NodeKey {
            template: t.id(),
            node: id,
        };
        let type_key = base.type_key();
        if let Some(accessor) = ctx.cache_get(key).and_then(|entry| entry.get(type_key)) {
            return Some(accessor.clone());
        }
        let shared = t.shared_cache();
        if let Some(accessor) = shared.and_then(|cache| cache.get(id, type_key)) {
            ctx.cache_put(
                key,
                CacheEntry {
                    type_key,
                    accessor: accessor.clone(),
                },
            );
            return Some(accessor);
        }
        let mut accessor = find(self.engine.introspector())?;
        if accessor.cacheable {
            if let Some(cache) = shared {
                accessor = cache.insert_if_absent(id, type_key, accessor);
            }
            ctx.cache_put(
                key,
                CacheEntry {
                    type_key,
                    accessor: accessor.clone(),
                },
            );
        }
        Some(accessor)
    }

    fn invoke(
        &self,
        t: &Template,
        id: NodeId,
        accessor: &Accessor,
        base: &Value,
        args: &[Value],
    ) -> Result<Option<Value>, RenderError> {
        match accessor.invoke(base, args) {
            Ok(value) => Ok(value),
            Err(cause) => {
                let err = InvocationError::new(accessor.name.clone(), base.type_name(), cause)
                    .with_trace(t.trace(id));
                self.engine
                    .events()
                    .method_exception(err)
                    .map_err(RenderError::Invocation)
            }
        }
    }

    /// Evaluate an expression node to a value.
    fn value(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<Option<Value>, RenderError> {
        let ast = t.ast();
        let children = ast.children(id);
        Ok(match ast.kind(id) {
            NodeKind::Reference { .. } => return self.reference_value(t, id, ctx, Lookup::Value),
            NodeKind::StringLiteral { .. } => self.string_value(t, id, ctx),
            NodeKind::IntegerLiteral(i) => Some(Value::Int(*i)),
            NodeKind::FloatLiteral(f) => Some(Value::Float(*f)),
            NodeKind::BooleanLiteral(b) => Some(Value::Bool(*b)),
            NodeKind::List => {
                let mut list = Vec::with_capacity(children.len());
                for &child in children {
                    match self.value(t, child, ctx)? {
                        Some(value) => list.push(value),
                        None => self.report(
                            t,
                            child,
                            Level::Debug,
                            "list element has no value and is left out".into(),
                        ),
                    }
                }
                Some(Value::List(list))
            }
            NodeKind::Map => {
                let mut map = Map::with_capacity(children.len() / 2);
                for pair in children.chunks(2) {
                    let (key, value) = match pair {
                        [key, value] => (*key, *value),
                        _ => continue,
                    };
                    let k = self.value(t, key, ctx)?;
                    let v = self.value(t, value, ctx)?;
                    match (k, v) {
                        (Some(k), Some(v)) => {
                            map.insert(k.to_text(), v);
                        }
                        _ => self.report(
                            t,
                            key,
                            Level::Debug,
                            "map entry has no key or no value and is left out".into(),
                        ),
                    }
                }
                Some(Value::Map(map))
            }
            NodeKind::Range => {
                let (from, to) = self.range_operands(t, id, ctx)?;
                let max_len = self.engine.config().max_range_length;
                self.outcome(t, id, ops::range(from.as_ref(), to.as_ref(), max_len))
            }
            NodeKind::Binary(BinaryOp::And | BinaryOp::Or) | NodeKind::Unary(UnaryOp::Not) => {
                Some(Value::Bool(self.evaluate(t, id, ctx)?))
            }
            NodeKind::Binary(op) => {
                let (lhs, rhs) = match children {
                    [lhs, rhs] => (self.value(t, *lhs, ctx)?, self.value(t, *rhs, ctx)?),
                    _ => return Ok(None),
                };
                match ops::binary(*op, lhs.as_ref(), rhs.as_ref()) {
                    Ok(value) => Some(value),
                    Err(message) => {
                        self.report(t, id, Level::Warn, message);
                        if is_comparison(*op) {
                            Some(Value::Bool(false))
                        } else {
                            None
                        }
                    }
                }
            }
            NodeKind::Unary(UnaryOp::Negate) => {
                let operand = match children.first() {
                    Some(&child) => self.value(t, child, ctx)?,
                    None => None,
                };
                self.outcome(t, id, ops::negate(operand.as_ref()))
            }
            _ => None,
        })
    }

    fn range_operands(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<(Option<Value>, Option<Value>), RenderError> {
        let children = t.ast().children(id);
        let from = match children.first() {
            Some(&child) => self.value(t, child, ctx)?,
            None => None,
        };
        let to = match children.get(1) {
            Some(&child) => self.value(t, child, ctx)?,
            None => None,
        };
        Ok((from, to))
    }

    fn outcome(&self, t: &Template, id: NodeId, result: Result<Value, String>) -> Option<Value> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.report(t, id, Level::Warn, message);
                None
            }
        }
    }

    /// Evaluate a node as a condition.
    ///
    /// Logical operators short-circuit. A missing reference is false and never an error,
    ///     even in strict mode.
    fn evaluate(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<bool, RenderError> {
        let ast = t.ast();
        let children = ast.children(id);
        match (ast.kind(id), children) {
            (NodeKind::Reference { .. }, _) => Ok(Value::is_truthy(
                self.reference_value(t, id, ctx, Lookup::Test)?.as_ref(),
            )),
            (NodeKind::Binary(BinaryOp::And), [lhs, rhs]) => {
                Ok(self.evaluate(t, *lhs, ctx)? && self.evaluate(t, *rhs, ctx)?)
            }
            (NodeKind::Binary(BinaryOp::Or), [lhs, rhs]) => {
                Ok(self.evaluate(t, *lhs, ctx)? || self.evaluate(t, *rhs, ctx)?)
            }
            (NodeKind::Unary(UnaryOp::Not), [operand]) => Ok(!self.evaluate(t, *operand, ctx)?),
            _ => Ok(Value::is_truthy(self.value(t, id, ctx)?.as_ref())),
        }
    }

    /// The value of a string literal.
    ///
    /// An interpolated literal renders its nested template; if that fails the literal
    ///     text is used instead.
    fn string_value(&mut self, t: &Template, id: NodeId, ctx: &mut dyn Context) -> Option<Value> {
        let init = t.string_literal(id)?;
        let nested = match &init.nested {
            Some(nested) => nested,
            None => return Some(Value::String(init.text.clone())),
        };
        let mut buffer = String::new();
        self.callers.push(t.clone());
        let result = self.render_template(nested, ctx, &mut buffer);
        self.callers.pop();
        match result {
            Ok(_) => {
                if buffer.ends_with(' ') {
                    buffer.pop();
                }
                Some(Value::String(buffer))
            }
            Err(err) => {
                self.report(
                    t,
                    id,
                    Level::Warn,
                    format!("string literal used as is: {}", err.title()),
                );
                Some(Value::String(init.text.clone()))
            }
        }
    }

    fn render_set(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<(), RenderError> {
        let ast = t.ast();
        let (target, rhs) = match ast.children(id) {
            [target, rhs] => (*target, *rhs),
            _ => return Ok(()),
        };
        let value = self.value(t, rhs, ctx)?;
        let root = match t.reference_root(target) {
            Some(root) => root,
            None => return Ok(()),
        };
        if value.is_none() {
            self.report(
                t,
                id,
                Level::Debug,
                format!(
                    "the right hand side of #set has no value; {} is removed",
                    root.literal
                ),
            );
        }
        let segments = ast.children(target);
        if segments.is_empty() {
            match value {
                Some(value) => ctx.put(&root.name, value),
                None => ctx.remove(&root.name),
            };
            return Ok(());
        }
        let mut path = Vec::with_capacity(segments.len());
        for &segment in segments {
            path.push(match ast.kind(segment) {
                NodeKind::Member { name } => Key::Name(name.clone()),
                NodeKind::Index => {
                    let index = match ast.child(segment, 0) {
                        Some(child) => self.value(t, child, ctx)?,
                        None => None,
                    };
                    match index {
                        Some(index) => Key::Index(index),
                        None => {
                            self.report(
                                t,
                                segment,
                                Level::Debug,
                                format!("index has no value; {} is not set", root.literal),
                            );
                            return Ok(());
                        }
                    }
                }
                _ => {
                    self.report(
                        t,
                        segment,
                        Level::Warn,
                        format!("cannot assign through a method call in {}", root.literal),
                    );
                    return Ok(());
                }
            });
        }
        self.assign(t, id, &root.name, path, value, ctx)
    }

    /// Store a value at the end of a path of members and indices.
    ///
    /// Maps and lists held in the context are updated in place. Once the path reaches an
    ///     object, the rest of it is followed with getters and the last step calls a
    ///     setter on the object.
    fn assign(
        &mut self,
        t: &Template,
        id: NodeId,
        root: &str,
        mut path: Vec<Key>,
        value: Option<Value>,
        ctx: &mut dyn Context,
    ) -> Result<(), RenderError> {
        let last = match path.pop() {
            Some(last) => last,
            None => return Ok(()),
        };
        let mut object_at: Option<(Value, usize)> = None;
        {
            let mut cursor: &mut Value = match ctx.get_mut(root) {
                Some(cursor) => cursor,
                None => {
                    self.report(
                        t,
                        id,
                        Level::Debug,
                        format!("${root} is not defined and cannot be assigned into"),
                    );
                    return Ok(());
                }
            };
            for (i, key) in path.iter().enumerate() {
                if let Value::Object(object) = &*cursor {
                    object_at = Some((Value::Object(object.clone()), i));
                    break;
                }
                let next = match (cursor, key) {
                    (Value::Map(map), key) => map.get_mut(key.text().as_str()),
                    (Value::List(list), Key::Index(Value::Int(n))) => {
                        match resolve_index(*n, list.len()) {
                            Some(i) => list.get_mut(i),
                            None => None,
                        }
                    }
                    _ => None,
                };
                cursor = match next {
                    Some(next) => next,
                    None => {
                        self.report(
                            t,
                            id,
                            Level::Debug,
                            format!("${root}: no {} to assign into", key.text()),
                        );
                        return Ok(());
                    }
                };
            }
            if object_at.is_none() {
                if let Value::Object(object) = &*cursor {
                    object_at = Some((Value::Object(object.clone()), path.len()));
                } else {
                    let message = store(cursor, &last, value);
                    if let Some(message) = message {
                        self.report(t, id, Level::Warn, format!("${root}: {message}"));
                    }
                    return Ok(());
                }
            }
        }
        let (mut base, start) = match object_at {
            Some(found) => found,
            None => return Ok(()),
        };
        for key in &path[start..] {
            base = match self.get_key(t, id, &base, key)? {
                Some(next) => next,
                None => {
                    self.report(
                        t,
                        id,
                        Level::Debug,
                        format!("${root}: {} has no value", key.text()),
                    );
                    return Ok(());
                }
            };
        }
        self.set_key(t, id, &base, &last, value)
    }

    fn get_key(
        &self,
        t: &Template,
        id: NodeId,
        base: &Value,
        key: &Key,
    ) -> Result<Option<Value>, RenderError> {
        let introspector = self.engine.introspector();
        let (accessor, args) = match key {
            Key::Name(name) => (introspector.property(base, name), vec![]),
            Key::Index(index) => {
                let args = vec![index.clone()];
                (introspector.method(base, "get", &args), args)
            }
        };
        match accessor {
            Some(accessor) => self.invoke(t, id, &accessor, base, &args),
            None => Ok(None),
        }
    }

    /// Call a setter on an object: `set<Name>(value)`, falling back to `put(name, value)`.
    fn set_key(
        &self,
        t: &Template,
        id: NodeId,
        base: &Value,
        key: &Key,
        value: Option<Value>,
    ) -> Result<(), RenderError> {
        if !matches!(base, Value::Object(_)) {
            self.report(
                t,
                id,
                Level::Warn,
                format!(
                    "cannot assign into a {} returned by a getter",
                    base.type_name()
                ),
            );
            return Ok(());
        }
        let value = match value {
            Some(value) => value,
            None => return Ok(()),
        };
        let introspector = self.engine.introspector();
        let (setter, args) = match key {
            Key::Name(name) => {
                let args = vec![value.clone()];
                match introspector.method(base, &setter_name(name), &args) {
                    Some(setter) => (Some(setter), args),
                    None => {
                        let args = vec![Value::String(name.clone()), value];
                        (introspector.method(base, "put", &args), args)
                    }
                }
            }
            Key::Index(index) => {
                let args = vec![index.clone(), value];
                match introspector.method(base, "set", &args) {
                    Some(setter) => (Some(setter), args),
                    None => (introspector.method(base, "put", &args), args),
                }
            }
        };
        match setter {
            Some(setter) => {
                self.invoke(t, id, &setter, base, &args)?;
            }
            None => self.report(
                t,
                id,
                Level::Warn,
                format!("a {} has no setter for {}", base.type_name(), key.text()),
            ),
        }
        Ok(())
    }

    fn render_if(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let ast = t.ast();
        let children = ast.children(id);
        // (condition, block); the condition of #else is always true.
        let mut branches: Vec<(Option<NodeId>, NodeId)> = Vec::with_capacity(children.len());
        if let [condition, block, ..] = children {
            branches.push((Some(*condition), *block));
        }
        for &branch in children.iter().skip(2) {
            match (ast.kind(branch), ast.children(branch)) {
                (NodeKind::ElseIf, [condition, block]) => branches.push((Some(*condition), *block)),
                (NodeKind::Else, [block]) => branches.push((None, *block)),
                _ => {}
            }
        }
        let mut state = Branching::Evaluating(0);
        loop {
            state = match state {
                Branching::Evaluating(i) => match branches.get(i) {
                    None => Branching::NoneMatched,
                    Some(&(condition, block)) => {
                        let matched = match condition {
                            Some(condition) => self.evaluate(t, condition, ctx)?,
                            None => true,
                        };
                        if matched {
                            Branching::Rendered(self.render_node(t, block, ctx, out)?)
                        } else {
                            Branching::Evaluating(i + 1)
                        }
                    }
                },
                Branching::Rendered(flow) => return Ok(flow),
                Branching::NoneMatched => return Ok(Flow::Continue),
            }
        }
    }

    fn render_foreach(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let ast = t.ast();
        let (variable, iterable, block) = match ast.children(id) {
            [variable, iterable, block, ..] => (*variable, *iterable, *block),
            _ => return Ok(Flow::Continue),
        };
        let otherwise = ast
            .child(id, 3)
            .and_then(|branch| ast.child(branch, 0));
        let name = match t.reference_root(variable) {
            Some(root) => root.name.clone(),
            None => return Ok(Flow::Continue),
        };
        let (items, count): (Box<dyn Iterator<Item = Value>>, usize) =
            if ast.kind(iterable) == &NodeKind::Range {
                let (from, to) = self.range_operands(t, iterable, ctx)?;
                match ops::range_bounds(from.as_ref(), to.as_ref()) {
                    Ok((from, to)) => (
                        Box::new(ops::range_values(from, to)),
                        ops::range_len(from, to),
                    ),
                    Err(message) => {
                        self.report(t, iterable, Level::Warn, message);
                        (Box::new(std::iter::empty()), 0)
                    }
                }
            } else {
                let items = match self.value(t, iterable, ctx)? {
                    Some(value) => {
                        let items = self.engine.introspector().iterate(&value);
                        if items.is_none() {
                            self.report(
                                t,
                                iterable,
                                Level::Debug,
                                format!("a {} cannot be iterated", value.type_name()),
                            );
                        }
                        items.unwrap_or_default()
                    }
                    None => vec![],
                };
                let count = items.len();
                (Box::new(items.into_iter()), count)
            };
        if count == 0 {
            return match otherwise {
                Some(block) => self.render_node(t, block, ctx, out),
                None => Ok(Flow::Continue),
            };
        }
        let variable_binding = Binding::bind(ctx, &name, None);
        let loop_binding = Binding::bind(ctx, "foreach", None);
        let result = self.iterate(t, id, &name, items, count, block, ctx, out);
        loop_binding.restore(ctx);
        variable_binding.restore(ctx);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn iterate(
        &mut self,
        t: &Template,
        id: NodeId,
        name: &str,
        items: Box<dyn Iterator<Item = Value>>,
        count: usize,
        block: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let limit = self.engine.config().max_foreach_iterations;
        for (i, item) in items.enumerate() {
            if let Some(limit) = limit {
                if i >= limit {
                    return Err(RenderError::LoopLimit {
                        limit,
                        trace: t.trace(id),
                    });
                }
            }
            ctx.put(name, item);
            ctx.put("foreach", loop_state(i, count));
            match self.render_node(t, block, ctx, out)? {
                Flow::Continue => {}
                Flow::Break => break,
                Flow::Stop => return Ok(Flow::Stop),
            }
        }
        Ok(Flow::Continue)
    }

    fn render_macro_call(
        &mut self,
        t: &Template,
        id: NodeId,
        name: &str,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let ast = t.ast();
        let found = std::iter::once(t)
            .chain(self.callers.iter().rev())
            .find_map(|candidate| {
                candidate
                    .macro_node(name)
                    .map(|node| (candidate.clone(), node))
            });
        let (definition, node) = match found {
            Some(found) => found,
            None => {
                let known: Vec<&str> = std::iter::once(t)
                    .chain(self.callers.iter())
                    .flat_map(|candidate| candidate.macro_names())
                    .collect();
                let message = match spellcheck::closest(known, name) {
                    Some(suggestion) => {
                        format!("#{name} is not a macro (did you mean #{suggestion}?)")
                    }
                    None => format!("#{name} is not a macro"),
                };
                self.report(t, id, Level::Debug, message);
                out.write(&ast.literal(id))?;
                return Ok(Flow::Continue);
            }
        };
        let limit = self.engine.config().max_macro_depth;
        if self.macro_depth >= limit {
            return Err(RenderError::MacroDepth {
                name: name.to_string(),
                limit,
                trace: t.trace(id),
            });
        }
        write_backslashes(ast.first_token(id).escape_count(), out)?;
        let parameters = match definition.ast().kind(node) {
            NodeKind::Macro { parameters, .. } => parameters.clone(),
            _ => vec![],
        };
        let body = match definition.ast().child(node, 0) {
            Some(body) => body,
            None => return Ok(Flow::Continue),
        };
        let mut args = Vec::with_capacity(ast.children(id).len());
        for &arg in ast.children(id) {
            args.push(self.value(t, arg, ctx)?);
        }
        if args.len() != parameters.len() {
            self.report(
                t,
                id,
                Level::Debug,
                format!(
                    "#{name} takes {} arguments but {} were given",
                    parameters.len(),
                    args.len()
                ),
            );
        }
        let mut args = args.into_iter();
        let mut bindings = Vec::with_capacity(parameters.len());
        for parameter in &parameters {
            bindings.push(Binding::bind(ctx, parameter, args.next().flatten()));
        }
        self.macro_depth += 1;
        self.callers.push(t.clone());
        let result = self.render_node(&definition, body, ctx, out);
        self.callers.pop();
        self.macro_depth -= 1;
        for binding in bindings.into_iter().rev() {
            binding.restore(ctx);
        }
        Ok(match result? {
            Flow::Stop => Flow::Stop,
            _ => Flow::Continue,
        })
    }

    fn render_define(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<Flow, RenderError> {
        let ast = t.ast();
        let (target, block) = match ast.children(id) {
            [target, block] => (*target, *block),
            _ => return Ok(Flow::Continue),
        };
        let mut buffer = String::new();
        let flow = self.render_node(t, block, ctx, &mut buffer)?;
        if let Some(root) = t.reference_root(target) {
            ctx.put(&root.name, Value::String(buffer));
        }
        Ok(match flow {
            Flow::Stop => Flow::Stop,
            _ => Flow::Continue,
        })
    }

    fn render_evaluate(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let source = match t.ast().child(id, 0) {
            Some(arg) => self.value(t, arg, ctx)?,
            None => None,
        };
        let source = match source {
            Some(source) => source.to_text(),
            None => return Ok(Flow::Continue),
        };
        let token = t.ast().first_token(id);
        let name = format!(
            "{} (#evaluate at {}:{})",
            t.name(),
            token.line,
            token.column
        );
        let nested = self.engine.compile_evaluated(&name, &source)?;
        self.render_nested(t, &nested, ctx, out)
    }

    fn render_include(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<(), RenderError> {
        for &arg in t.ast().children(id) {
            let name = match self.resource_name(t, arg, ctx)? {
                Some(name) => name,
                None => continue,
            };
            let text = self
                .engine
                .loader()
                .read_to_string(&name)
                .map_err(|err| RenderError::Resource(err.with_trace(t.trace(arg))))?;
            out.write(&text)?;
        }
        Ok(())
    }

    fn render_parse(
        &mut self,
        t: &Template,
        id: NodeId,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        let arg = match t.ast().child(id, 0) {
            Some(arg) => arg,
            None => return Ok(Flow::Continue),
        };
        let name = match self.resource_name(t, arg, ctx)? {
            Some(name) => name,
            None => return Ok(Flow::Continue),
        };
        let limit = self.engine.config().max_parse_depth;
        if self.parse_depth >= limit {
            return Err(RenderError::ParseDepth {
                limit,
                trace: t.trace(id),
            });
        }
        let template = self.engine.get_template(&name).map_err(|err| match err {
            Error::Compile(err) => RenderError::Compile(Box::new(err)),
            Error::Resource(err) => RenderError::Resource(err.with_trace(t.trace(arg))),
            Error::Render(err) => err,
        })?;
        self.parse_depth += 1;
        let result = self.render_nested(t, &template, ctx, out);
        self.parse_depth -= 1;
        result
    }

    /// The resource named by an `#include` or `#parse` argument, after the include event.
    fn resource_name(
        &mut self,
        t: &Template,
        arg: NodeId,
        ctx: &mut dyn Context,
    ) -> Result<Option<String>, RenderError> {
        let name = match self.value(t, arg, ctx)? {
            Some(name) => name.to_text(),
            None => return Ok(None),
        };
        let name = self.engine.events().include(&name, t.name());
        if name.is_none() {
            self.report(
                t,
                arg,
                Level::Debug,
                "resource skipped by an event handler".into(),
            );
        }
        Ok(name)
    }

    /// Render another template from inside this one.
    ///
    /// `#break` ends the nested template only; `#stop` ends the whole render.
    fn render_nested(
        &mut self,
        caller: &Template,
        nested: &Template,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<Flow, RenderError> {
        self.callers.push(caller.clone());
        let result = self.render_template(nested, ctx, out);
        self.callers.pop();
        Ok(match result? {
            Flow::Stop => Flow::Stop,
            _ => Flow::Continue,
        })
    }

    fn report(&self, t: &Template, id: NodeId, level: Level, message: String) {
        let token = t.ast().first_token(id);
        self.engine.diagnostics().report(&Diagnostic {
            level,
            template: t.name().to_string(),
            line: token.line,
            column: token.column,
            message,
        });
    }
}

fn write_backslashes(escapes: usize, out: &mut dyn Output) -> Result<(), RenderError> {
    if escapes >= 2 {
        out.write(&"\\".repeat(escapes / 2))?;
    }
    Ok(())
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual
    )
}

/// The value of `$foreach` in iteration `i` of `count`.
fn loop_state(i: usize, count: usize) -> Value {
    [
        ("count", Value::from(i + 1)),
        ("index", Value::from(i)),
        ("hasNext", Value::Bool(i + 1 < count)),
        ("first", Value::Bool(i == 0)),
        ("last", Value::Bool(i + 1 == count)),
    ]
    .into_iter()
    .collect()
}

/// Names usable as `.name` on instances of a class.
fn property_names(class: &Class) -> Vec<String> {
    let mut names = Vec::new();
    for method in class.method_names() {
        for prefix in ["get", "is"] {
            if let Some(rest) = method.strip_prefix(prefix) {
                let mut chars = rest.chars();
                if let Some(first) = chars.next().filter(|c| c.is_uppercase()) {
                    names.push(first.to_lowercase().chain(chars).collect());
                }
            }
        }
        names.push(method.to_string());
    }
    names
}

fn setter_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".into(),
    }
}

/// Store into a map or list; returns a message if that is not possible.
fn store(target: &mut Value, key: &Key, value: Option<Value>) -> Option<String> {
    match (target, key) {
        (Value::Map(map), key) => {
            match value {
                Some(value) => {
                    map.insert(key.text(), value);
                }
                None => {
                    map.shift_remove(key.text().as_str());
                }
            }
            None
        }
        (Value::List(list), Key::Index(Value::Int(n))) => {
            let i = match resolve_index(*n, list.len()) {
                Some(i) => i,
                None => return Some(format!("index {n} is out of range")),
            };
            match value {
                Some(value) => {
                    list[i] = value;
                    None
                }
                None => Some("list elements cannot be removed".into()),
            }
        }
        (other, key) => Some(format!(
            "cannot assign {} on a {}",
            key.text(),
            other.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::MapContext;
    use crate::engine::MemoryResourceLoader;
    use crate::render::diagnostics::RecordingDiagnostics;
    use crate::Config;

    fn render_with(engine: &Engine, source: &str, ctx: &mut MapContext) -> String {
        let template = engine.compile("test", source).unwrap();
        engine.render_to_string(&template, ctx).unwrap()
    }

    fn render(source: &str) -> String {
        render_with(&Engine::new(), source, &mut MapContext::new())
    }

    macro_rules! render_tests {
        ($( ($name: ident, $source: expr, $expected: expr), )+) => {
            $(
            #[test]
            fn $name() {
                let mut ctx = MapContext::new()
                    .with("name", "World")
                    .with("n", 3)
                    .with("list", vec![1, 2, 3])
                    .with("empty", Vec::<i64>::new());
                assert_eq!(render_with(&Engine::new(), $source, &mut ctx), $expected);
            }
            )+
        };
    }

    render_tests![
        (plain_text, "hello", "hello"),
        (reference, "Hello $name!", "Hello World!"),
        (formal_reference, "${name}s", "Worlds"),
        (undefined_reference_literal, "$nope", "$nope"),
        (undefined_quiet_reference, "[$!nope]", "[]"),
        (undefined_formal_quiet_reference, "[$!{nope}]", "[]"),
        (escaped_reference, "\\\\$name", "\\$name"),
        (live_after_one_backslash, "\\$name", "World"),
        (live_after_three_backslashes, "\\\\\\$name", "\\World"),
        (escaped_undefined_reference, "\\\\$nope", "\\\\$nope"),
        (method_call, "$name.toUpperCase()", "WORLD"),
        (property_via_boolean_getter, "$name.empty", "false"),
        (index, "$list[1]", "2"),
        (negative_index, "$list[-1]", "3"),
        (index_out_of_range, "$list[9]", "$list[9]"),
        (arithmetic, "#set($x = $n * 2 + 1)$x", "7"),
        (integer_division, "#set($x = 7 / 2)$x", "3"),
        (float_promotion, "#set($x = $n / 2.0)$x", "1.5"),
        (string_concatenation, "#set($x = $name + '!')$x", "World!"),
        (if_true, "#if($n > 2)big#end", "big"),
        (if_else, "#if($n > 5)big#else small#end", " small"),
        (elseif, "#if($n == 1)one#elseif($n == 3)three#else other#end", "three"),
        (if_undefined_is_false, "#if($nope)yes#else no#end", " no"),
        (if_empty_list_is_true, "#if($empty)yes#else no#end", "yes"),
        (logical_short_circuit, "#if($n == 3 || $nope.foo())yes#end", "yes"),
        (not, "#if(!$nope)yes#end", "yes"),
        (foreach, "#foreach($i in $list)$i,#end", "1,2,3,"),
        (foreach_range, "#foreach($i in [3..1])$i#end", "321"),
        (foreach_state, "#foreach($i in $list)$foreach.count#if($foreach.hasNext)-#end#end", "1-2-3"),
        (foreach_else, "#foreach($i in $empty)x#else none#end", " none"),
        (foreach_break, "#foreach($i in $list)#if($i == 2)#break#end$i#end", "1"),
        (foreach_restores_variable, "#set($i = 'x')#foreach($i in $list)#end$i", "x"),
        (stop, "a#stop b", "a"),
        (stop_in_loop, "#foreach($i in $list)$i#stop#end after", "1"),
        (macro_call, "#macro(greet $who)Hi $who#end#greet('Bob')", "Hi Bob"),
        (macro_restores_arguments, "#set($who = 'me')#macro(m $who)$who#end#m('you') $who", "you me"),
        (macro_missing_argument, "#macro(m $a $b)[$!b]#end#m(1)", "[]"),
        (undefined_macro_is_text, "#nothing here", "#nothing here"),
        (escaped_directive, "\\\\#if", "\\#if"),
        (live_directive_after_one_backslash, "\\#if(true)x#end", "x"),
        (escaped_macro_call, "\\\\#greet", "\\#greet"),
        (define, "#define($d)Hello $name#end$d", "Hello World"),
        (evaluate, "#evaluate('#set($x = 5)$x')", "5"),
        (text_block, "#[[$name #if]]#", "$name #if"),
        (comment, "a## comment\nb", "ab"),
        (block_comment, "a#* x\ny *#b", "ab"),
        (interpolated_string, "#set($s = \"Hi $name\")$s", "Hi World"),
        (single_quoted_string, "#set($s = 'Hi $name')$s", "Hi $name"),
        (interpolated_directive, "#set($s = \"#if(true)yes#end\")$s", "yes"),
        (list_literal, "#set($l = [1, 'a', $n])$l", "[1, a, 3]"),
        (map_literal, "#set($m = {'a': 1, 'b': $n})$m.b $m.a", "3 1"),
        (set_map_entry, "#set($m = {})#set($m.k = 'v')$m.k", "v"),
        (set_list_element, "#set($l = [1, 2])#set($l[0] = 9)$l", "[9, 2]"),
        (set_absent_removes, "#set($x = 1)#set($x = $nope)$x", "$x"),
        (division_by_zero, "#set($x = 1 / 0)$x", "$x"),
        (comparison_with_absent_is_false, "#if($nope < 3)yes#else no#end", " no"),
    ];

    #[test]
    fn diagnostics_are_reported() {
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let engine = Engine::builder().diagnostics(diagnostics.clone()).build();
        let mut ctx = MapContext::new().with("name", "x");
        render_with(&engine, "$nam #set($a = 1 / 0)", &mut ctx);
        let records = diagnostics.take();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].level, Level::Debug);
        assert!(records[0].message.contains("did you mean name?"));
        assert_eq!(records[1].level, Level::Warn);
        assert_eq!((records[1].line, records[1].column), (1, 16));
        assert!(records[2].message.contains("$a is removed"));
    }

    #[test]
    fn quiet_and_conditions_do_not_report() {
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let engine = Engine::builder().diagnostics(diagnostics.clone()).build();
        render_with(&engine, "$!nope #if($nope)#end", &mut MapContext::new());
        assert!(diagnostics.take().is_empty());
    }

    #[test]
    fn strict_mode_undefined_reference() {
        let engine = Engine::builder()
            .config(Config::default().with_strict(true))
            .build();
        let template = engine.compile("page", "a\n  $nam").unwrap();
        let mut ctx = MapContext::new().with("name", "x");
        match engine.render_to_string(&template, &mut ctx) {
            Err(RenderError::UndefinedReference {
                reference,
                suggestion,
                trace,
            }) => {
                assert_eq!(reference, "$nam");
                assert_eq!(suggestion.as_deref(), Some("name"));
                assert_eq!((trace.line_number, trace.index), (2, 2));
            }
            other => panic!("expected an undefined reference error, got {other:?}"),
        }
    }

    #[test]
    fn strict_mode_allows_quiet_and_conditions() {
        let engine = Engine::builder()
            .config(Config::default().with_strict(true))
            .build();
        let out = render_with(&engine, "[$!nope]#if($nope)x#end", &mut MapContext::new());
        assert_eq!(out, "[]");
    }

    #[test]
    fn macro_recursion_is_limited() {
        let engine = Engine::builder()
            .config(Config::default().with_max_macro_depth(5))
            .build();
        let template = engine.compile("t", "#macro(r)#r()#end#r()").unwrap();
        let result = engine.render_to_string(&template, &mut MapContext::new());
        assert!(matches!(result, Err(RenderError::MacroDepth { limit: 5, .. })));
    }

    #[test]
    fn foreach_iterations_are_limited() {
        let engine = Engine::builder()
            .config(Config::default().with_max_foreach_iterations(Some(2)))
            .build();
        let template = engine.compile("t", "#foreach($i in [1..3])$i#end").unwrap();
        let mut ctx = MapContext::new();
        let result = engine.render_to_string(&template, &mut ctx);
        assert!(matches!(result, Err(RenderError::LoopLimit { limit: 2, .. })));
        assert!(ctx.get("i").is_none());

        let engine = Engine::builder()
            .config(Config::default().with_max_foreach_iterations(Some(3)))
            .build();
        let template = engine
            .compile("t", "#foreach($i in [0..9223372036854775807])$i#end")
            .unwrap();
        let result = engine.render_to_string(&template, &mut MapContext::new());
        assert!(matches!(result, Err(RenderError::LoopLimit { limit: 3, .. })));
    }

    #[test]
    fn foreach_steps_through_range_lazily() {
        let engine = Engine::builder()
            .config(Config::default().with_max_range_length(2))
            .build();
        let mut ctx = MapContext::new();
        let source = "#foreach($i in [9223372036854775807..0])$i#if($foreach.index == 1)#break#end,#end";
        assert_eq!(
            render_with(&engine, source, &mut ctx),
            "9223372036854775807,9223372036854775806"
        );
        assert_eq!(
            render_with(&engine, "#foreach($i in [3..1])$i#if($foreach.last).#end#end", &mut ctx),
            "321."
        );
    }

    #[test]
    fn long_range_literal_is_undefined() {
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let engine = Engine::builder()
            .config(Config::default().with_max_range_length(3))
            .diagnostics(diagnostics.clone())
            .build();
        let mut ctx = MapContext::new();
        assert_eq!(render_with(&engine, "#set($r = [1..3])$r.size()", &mut ctx), "3");
        assert!(diagnostics.take().is_empty());
        assert_eq!(
            render_with(&engine, "#set($r = [0..9223372036854775807])[$!r]", &mut ctx),
            "[]"
        );
        let records = diagnostics.take();
        assert_eq!(records[0].level, Level::Warn);
        assert!(records[0].message.contains("more than the limit of 3"));
    }

    #[test]
    fn include_and_parse() {
        let loader = MemoryResourceLoader::new()
            .with("raw", "$name")
            .with("child", "#macro(shout $s)$s.toUpperCase()#end$name")
            .with("loop", "#parse('loop')");
        let engine = Engine::builder().resource_loader(loader).build();
        let mut ctx = MapContext::new().with("name", "x");
        assert_eq!(render_with(&engine, "#include('raw')", &mut ctx), "$name");
        assert_eq!(render_with(&engine, "#parse('child')", &mut ctx), "x");
        let template = engine.compile("t", "#parse('loop')").unwrap();
        assert!(matches!(
            engine.render_to_string(&template, &mut ctx),
            Err(RenderError::ParseDepth { .. })
        ));
        let template = engine.compile("t", "#include('missing')").unwrap();
        assert!(matches!(
            engine.render_to_string(&template, &mut ctx),
            Err(RenderError::Resource(_))
        ));
    }

    #[test]
    fn macros_of_the_caller_are_visible_in_parsed_templates() {
        let loader = MemoryResourceLoader::new().with("child", "#shout('hi')");
        let engine = Engine::builder().resource_loader(loader).build();
        let out = render_with(
            &engine,
            "#macro(shout $s)$s.toUpperCase()#end#parse('child')",
            &mut MapContext::new(),
        );
        assert_eq!(out, "HI");
    }

    #[test]
    fn evaluate_compile_error() {
        let engine = Engine::new();
        let template = engine.compile("t", "#evaluate('#if(')").unwrap();
        let result = engine.render_to_string(&template, &mut MapContext::new());
        assert!(matches!(result, Err(RenderError::Compile(_))));
    }

    #[test]
    fn accessors_are_cached_per_node_and_type() {
        let engine = Engine::new();
        let template = engine.compile("t", "$a.size() $a.size()").unwrap();
        let mut ctx = MapContext::new().with("a", vec![1, 2, 3]);
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "3 3");
        assert_eq!(ctx.cache_len(), 2);
        ctx.put("a", [("x", 1)].into_iter().collect());
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "1 1");
        assert_eq!(ctx.cache_len(), 2);
    }

    #[test]
    fn evaluate_reuses_cached_accessors() {
        let engine = Engine::new();
        let template = engine
            .compile("t", "#foreach($i in [1..50])#evaluate('$a.size()')#end")
            .unwrap();
        let mut ctx = MapContext::new().with("a", vec![1, 2]);
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "2".repeat(50));
        assert_eq!(ctx.cache_len(), 1);
        engine.render_to_string(&template, &mut ctx).unwrap();
        assert_eq!(ctx.cache_len(), 1);

        let source = "#foreach($s in ['$a.size()', '$a.isEmpty()'])#evaluate($s)#end";
        let template = engine.compile("u", source).unwrap();
        let mut ctx = MapContext::new().with("a", vec![1, 2]);
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "2false");
        engine.render_to_string(&template, &mut ctx).unwrap();
        assert_eq!(ctx.cache_len(), 2);
    }

    #[test]
    fn shared_cache_is_filled() {
        let engine = Engine::builder()
            .config(Config::default().with_shared_accessor_cache(true))
            .build();
        let template = engine.compile("t", "$a.length()").unwrap();
        let mut ctx = MapContext::new().with("a", "abc");
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "3");
        assert_eq!(template.shared_cache().map(|c| c.len()), Some(1));
        let mut fresh = MapContext::new().with("a", "abcd");
        assert_eq!(engine.render_to_string(&template, &mut fresh).unwrap(), "4");
    }

    #[test]
    fn invocation_errors_propagate() {
        let template = Engine::new().compile("t", "$s.charAt(10)").unwrap();
        let mut ctx = MapContext::new().with("s", "abc");
        match Engine::new().render_to_string(&template, &mut ctx) {
            Err(RenderError::Invocation(err)) => {
                assert_eq!(err.accessor, "charAt");
                assert_eq!(err.target_type, "String");
                assert!(err.trace.is_some());
            }
            other => panic!("expected an invocation error, got {other:?}"),
        }
    }

    #[test]
    fn property_names_include_getters() {
        let class = crate::introspect::builtin::class_of(&Value::from("s"));
        let names = property_names(&class);
        assert!(names.iter().any(|n| n == "length"));
    }

    #[test]
    fn loop_state_fields() {
        let state = loop_state(0, 1);
        let map = state.as_map().unwrap();
        assert_eq!(map.get("count"), Some(&Value::Int(1)));
        assert_eq!(map.get("last"), Some(&Value::Bool(true)));
    }

    #[test]
    fn render_empty() {
        assert_eq!(render(""), "");
    }
}
