//! Compiled templates.
//!
//! Compiling a template parses it and then runs an init pass over the tree that computes
//!     everything rendering needs which depends only on the source:
//!
//! - the [root](ReferenceRoot) of every reference,
//! - the unescaped text of every string literal, and for double quoted literals
//!     that contain `$` or `#`, a nested template rendered when the literal is evaluated,
//! - the table of macros defined in the template.
//!
//! The results are kept in a side table indexed by node, so the tree itself is never mutated.
//! A compiled template is immutable and can be shared freely between threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ast::reference::ReferenceRoot;
use crate::ast::{Ast, NodeId, NodeKind, TemplateId};
use crate::config::Config;
use crate::error::{CompileError, TemplateError};
use crate::introspect::cache::SharedAccessorCache;
use crate::parse;
use crate::token::trace::SourceCodeTrace;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A compiled template; cloning is cheap.
#[derive(Clone)]
pub struct Template {
    inner: Arc<Inner>,
}

struct Inner {
    id: TemplateId,
    name: String,
    source: String,
    ast: Ast,
    init: Vec<NodeInit>,
    macros: HashMap<String, NodeId>,
    shared_cache: Option<SharedAccessorCache>,
}

pub(crate) enum NodeInit {
    None,
    Reference(ReferenceRoot),
    String(StringInit),
}

pub(crate) struct StringInit {
    /// The unescaped text without the quotes.
    pub text: String,
    /// Template rendered to produce the value of an interpolated literal.
    ///
    /// The template source is the text with a space appended.
    pub nested: Option<Template>,
}

impl Template {
    pub fn compile(name: &str, source: &str, config: &Config) -> Result<Template, CompileError> {
        let ast = parse::parse(source).map_err(|err| err.traced(name, source))?;
        let mut init = Vec::with_capacity(ast.num_nodes());
        let mut macros = HashMap::new();
        for id in ast.node_ids() {
            init.push(match ast.kind(id) {
                NodeKind::Reference { name: root } => {
                    let mut leading = String::new();
                    ast.first_token(id).write_literal_trimmed(&mut leading);
                    NodeInit::Reference(ReferenceRoot::extract(root, &leading, &ast.literal(id)))
                }
                NodeKind::StringLiteral { interpolated } => {
                    NodeInit::String(init_string(name, &ast, id, *interpolated, config))
                }
                NodeKind::Macro {
                    name: macro_name, ..
                } => {
                    if macros.contains_key(macro_name) {
                        let token = ast.first_token(id);
                        log::warn!(
                            target: "weft::parse",
                            "{name}:{}:{}: macro #{macro_name} is defined more than once; the first definition is used",
                            token.line,
                            token.column
                        );
                    } else {
                        macros.insert(macro_name.clone(), id);
                    }
                    NodeInit::None
                }
                _ => NodeInit::None,
            });
        }
        Ok(Template {
            inner: Arc::new(Inner {
                id: TemplateId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.to_string(),
                source: source.to_string(),
                ast,
                init,
                macros,
                shared_cache: if config.shared_accessor_cache {
                    Some(SharedAccessorCache::default())
                } else {
                    None
                },
            }),
        })
    }

    pub fn id(&self) -> TemplateId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn ast(&self) -> &Ast {
        &self.inner.ast
    }

    /// Names of the macros defined in this template, sorted.
    pub fn macro_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.macros.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn shared_cache(&self) -> Option<&SharedAccessorCache> {
        self.inner.shared_cache.as_ref()
    }

    /// A trace pointing at the source of a node.
    pub fn trace(&self, id: NodeId) -> SourceCodeTrace {
        let token = self.inner.ast.first_token(id);
        SourceCodeTrace::new(
            self.name(),
            self.source(),
            token.line,
            token.column,
            self.inner.ast.literal(id),
        )
    }

    pub(crate) fn reference_root(&self, id: NodeId) -> Option<&ReferenceRoot> {
        match &self.inner.init[id.index()] {
            NodeInit::Reference(root) => Some(root),
            _ => None,
        }
    }

    pub(crate) fn string_literal(&self, id: NodeId) -> Option<&StringInit> {
        match &self.inner.init[id.index()] {
            NodeInit::String(init) => Some(init),
            _ => None,
        }
    }

    pub(crate) fn macro_node(&self, name: &str) -> Option<NodeId> {
        self.inner.macros.get(name).copied()
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

fn init_string(
    template: &str,
    ast: &Ast,
    id: NodeId,
    interpolated: bool,
    config: &Config,
) -> StringInit {
    let token = ast.first_token(id);
    let text = unescape(&token.text);
    let interpolate = interpolated
        && config.interpolate_string_literals
        && (text.contains('$') || text.contains('#'));
    if !interpolate {
        return StringInit { text, nested: None };
    }
    let name = format!(
        "{template} (string literal at {}:{})",
        token.line, token.column
    );
    let nested = match Template::compile(&name, &format!("{text} "), config) {
        Ok(nested) => Some(nested),
        Err(err) => {
            log::debug!(
                target: "weft::parse",
                "{name}: not interpolated because it does not parse: {}",
                err.title()
            );
            None
        }
    };
    StringInit { text, nested }
}

/// Unescape a quoted string literal.
///
/// A doubled quote character stands for one quote, and `\uXXXX` for the code point XXXX.
pub fn unescape(raw: &str) -> String {
    let mut chars = raw.chars();
    let quote = match chars.next() {
        Some(c @ ('"' | '\'')) => c,
        _ => return raw.to_string(),
    };
    let body: Vec<char> = chars.collect();
    let body = match body.last() {
        Some(c) if *c == quote => &body[..body.len() - 1],
        _ => &body[..],
    };
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        if c == quote && body.get(i + 1) == Some(&quote) {
            out.push(quote);
            i += 2;
            continue;
        }
        if c == '\\' && body.get(i + 1) == Some(&'u') && i + 6 <= body.len() {
            let hex: String = body[i + 2..i + 6].iter().collect();
            if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                out.push(decoded);
                i += 6;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}
