//! The abstract syntax tree.
//!
//! Nodes live in an arena owned by the [Ast] and refer to each other by [NodeId].
//! Each node also records the first and last token of its span,
//!     which is enough to reconstruct its literal spelling from the token arena.
//!
//! The tree is built once by the [parser](crate::parse) and never changes afterwards.
//! Everything a render needs to mutate lives in the render call instead;
//!     see [NodeKey] for how per-render state refers back to nodes.

use crate::token::{Token, TokenId};

pub mod reference;

/// Index of a node inside the arena of an [Ast].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a template, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub(crate) u64);

/// Identity of a node across all compiled templates.
///
/// Per-render caches are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub template: TemplateId,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Kind of a node, together with anything captured about it at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The root of a template.
    Template,
    /// The body of a directive.
    Block,
    Text,
    Comment,
    /// `#[[ ]]#`.
    TextBlock,
    EscapedDirective,
    /// A reference; the children are the member, method and index accesses.
    Reference {
        name: String,
    },
    /// `.name`.
    Member {
        name: String,
    },
    /// `.name(args)`; the children are the arguments.
    Method {
        name: String,
    },
    /// `[index]`; the only child is the index expression.
    Index,
    /// A quoted string; only double quoted strings are interpolated.
    StringLiteral {
        interpolated: bool,
    },
    IntegerLiteral(i64),
    FloatLiteral(f64),
    BooleanLiteral(bool),
    /// `[a, b]`.
    List,
    /// `[a..b]`.
    Range,
    /// `{k: v}`; the children alternate between keys and values.
    Map,
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// `#set($ref = expr)`.
    Set,
    /// `#if`; the children are the condition, the block, then any `#elseif` and `#else` nodes.
    If,
    /// The children are the condition and the block.
    ElseIf,
    /// The only child is the block.
    Else,
    /// `#foreach($v in expr)`; the children are the variable, the iterable, the block
    ///     and an optional `#else`.
    Foreach,
    /// A macro definition; the only child is the body.
    Macro {
        name: String,
        parameters: Vec<String>,
    },
    /// A macro call; the children are the arguments.
    MacroCall {
        name: String,
    },
    /// `#define($ref)`; the children are the reference and the block.
    Define,
    Evaluate,
    Include,
    Parse,
    Break,
    Stop,
}

impl NodeKind {
    /// The directive keyword for directive nodes.
    pub fn directive_name(&self) -> Option<&str> {
        Some(match self {
            NodeKind::Set => "set",
            NodeKind::If => "if",
            NodeKind::ElseIf => "elseif",
            NodeKind::Else => "else",
            NodeKind::Foreach => "foreach",
            NodeKind::Macro { .. } => "macro",
            NodeKind::MacroCall { name } => name,
            NodeKind::Define => "define",
            NodeKind::Evaluate => "evaluate",
            NodeKind::Include => "include",
            NodeKind::Parse => "parse",
            NodeKind::Break => "break",
            NodeKind::Stop => "stop",
            _ => return None,
        })
    }
}

/// A node of the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub first: TokenId,
    pub last: TokenId,
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Ast {
    pub(crate) tokens: Vec<Token>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Ast {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn child(&self, id: NodeId, i: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(i).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id.index()]
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn first_token(&self, id: NodeId) -> &Token {
        self.token(self.node(id).first)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All node ids, in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Reconstruct the source text of a node from its tokens.
    ///
    /// Whitespace skipped before the first token is not part of the node.
    pub fn literal(&self, id: NodeId) -> String {
        let node = self.node(id);
        let mut s = String::new();
        if node.last < node.first {
            return s;
        }
        for i in node.first.index()..=node.last.index() {
            let token = &self.tokens[i];
            if i == node.first.index() {
                token.write_literal_trimmed(&mut s);
            } else {
                token.write_literal(&mut s);
            }
        }
        s
    }

    /// Write an indented outline of the tree, one node per line.
    pub fn dump(&self) -> String {
        let mut s = String::new();
        self.dump_node(self.root, 0, &mut s);
        s
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let token = self.first_token(id);
        let description = match &node.kind {
            NodeKind::Text | NodeKind::Comment | NodeKind::TextBlock => {
                format!("{:?} {:?}", node.kind, self.literal(id))
            }
            kind => format!("{kind:?}"),
        };
        out.push_str(&format!(
            "{}{} @{}:{}\n",
            "  ".repeat(depth),
            description,
            token.line,
            token.column
        ));
        for child in &node.children {
            self.dump_node(*child, depth + 1, out);
        }
    }
}
