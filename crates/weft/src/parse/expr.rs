//! Expressions inside directive and method arguments.
//!
//! Precedence, from loosest to tightest:
//!
//! ```text
//! expression     = or
//! or             = and ( ( "||" | "or" ) and )*
//! and            = equality ( ( "&&" | "and" ) equality )*
//! equality       = relational ( ( "==" | "!=" | "eq" | "ne" ) relational )*
//! relational     = additive ( ( "<" | "<=" | ">" | ">=" | "lt" | "le" | "gt" | "ge" ) additive )*
//! additive       = multiplicative ( ( "+" | "-" ) multiplicative )*
//! multiplicative = unary ( ( "*" | "/" | "%" ) unary )*
//! unary          = ( "!" | "not" | "-" ) unary | primary
//! primary        = reference | string | integer | float | "true" | "false"
//!                | "[" [ expression ( "," expression )* ] "]" | "[" expression ".." expression "]"
//!                | "{" [ expression ":" expression ( "," expression ":" expression )* ] "}"
//!                | "(" expression ")" | identifier
//! ```
//!
//! All binary operators are left associative.

use super::Parser;
use crate::ast::{BinaryOp, Node, NodeId, NodeKind, UnaryOp};
use crate::error::ParseError;
use crate::token::Kind;

impl Parser {
    pub(super) fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(0)
    }

    /// Parse a chain of binary operators at the given level of [LEVELS] or tighter.
    fn parse_binary(&mut self, level: usize) -> Result<NodeId, ParseError> {
        if level == LEVELS.len() {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = binary_op(LEVELS[level], self.peek_kind()) {
            self.advance();
            let rhs = self.parse_binary(level + 1)?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let first = self.nodes[lhs.index()].first;
        let last = self.nodes[rhs.index()].last;
        self.nodes.push(Node {
            kind: NodeKind::Binary(op),
            children: Vec::new(),
            parent: None,
            first,
            last,
        });
        self.add_child(id, lhs);
        self.add_child(id, rhs);
        id
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let op = match self.peek_kind() {
            Kind::Not => UnaryOp::Not,
            Kind::Minus => UnaryOp::Negate,
            _ => return self.parse_primary(),
        };
        let node = self.open(NodeKind::Unary(op));
        self.advance();
        let operand = self.parse_unary()?;
        self.add_child(node, operand);
        self.close(node);
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        match self.peek_kind() {
            Kind::Dollar => self.parse_reference(),
            Kind::StringLiteral => {
                let interpolated = self.peek().text.starts_with('"');
                Ok(self.leaf(NodeKind::StringLiteral { interpolated }))
            }
            Kind::IntegerLiteral => {
                let i = self.peek().text.parse::<i64>().map_err(|_| {
                    ParseError::new("integer literal out of range", self.peek())
                        .with_note(format!("integers must be between {} and {}", i64::MIN, i64::MAX))
                })?;
                Ok(self.leaf(NodeKind::IntegerLiteral(i)))
            }
            Kind::FloatLiteral => {
                let f = self
                    .peek()
                    .text
                    .parse::<f64>()
                    .map_err(|_| ParseError::new("invalid floating point literal", self.peek()))?;
                Ok(self.leaf(NodeKind::FloatLiteral(f)))
            }
            Kind::True => Ok(self.leaf(NodeKind::BooleanLiteral(true))),
            Kind::False => Ok(self.leaf(NodeKind::BooleanLiteral(false))),
            Kind::LeftBracket => self.parse_list_or_range(),
            Kind::LeftBrace => self.parse_map(),
            Kind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Kind::RightParen, "to close the parenthesized expression")?;
                Ok(inner)
            }
            Kind::Identifier => {
                // A bare word evaluates to itself.
                let name = self.peek().text.clone();
                Ok(self.leaf(NodeKind::Reference { name }))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_list_or_range(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::List);
        self.advance();
        if self.peek_kind() == Kind::RightBracket {
            self.advance();
            self.close(node);
            return Ok(node);
        }
        let first = self.parse_expression()?;
        self.add_child(node, first);
        if self.peek_kind() == Kind::DotDot {
            self.advance();
            let last = self.parse_expression()?;
            self.add_child(node, last);
            self.expect(Kind::RightBracket, "to close the range")?;
            self.nodes[node.index()].kind = NodeKind::Range;
            self.close(node);
            return Ok(node);
        }
        loop {
            match self.peek_kind() {
                Kind::RightBracket => {
                    self.advance();
                    break;
                }
                Kind::Comma => {
                    self.advance();
                    let element = self.parse_expression()?;
                    self.add_child(node, element);
                }
                _ => return Err(self.unexpected("`,` or `]` in the list")),
            }
        }
        self.close(node);
        Ok(node)
    }

    fn parse_map(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::Map);
        self.advance();
        loop {
            if self.peek_kind() == Kind::RightBrace {
                self.advance();
                break;
            }
            let key = self.parse_expression()?;
            self.add_child(node, key);
            self.expect(Kind::Colon, "after the map key")?;
            let value = self.parse_expression()?;
            self.add_child(node, value);
            match self.peek_kind() {
                Kind::Comma => {
                    self.advance();
                }
                Kind::RightBrace => {}
                _ => return Err(self.unexpected("`,` or `}` in the map")),
            }
        }
        self.close(node);
        Ok(node)
    }
}

#[derive(Clone, Copy)]
enum Level {
    Or,
    And,
    Equality,
    Relational,
    Additive,
    Multiplicative,
}

const LEVELS: [Level; 6] = [
    Level::Or,
    Level::And,
    Level::Equality,
    Level::Relational,
    Level::Additive,
    Level::Multiplicative,
];

fn binary_op(level: Level, kind: Kind) -> Option<BinaryOp> {
    Some(match (level, kind) {
        (Level::Or, Kind::Or) => BinaryOp::Or,
        (Level::And, Kind::And) => BinaryOp::And,
        (Level::Equality, Kind::Equal) => BinaryOp::Equal,
        (Level::Equality, Kind::NotEqual) => BinaryOp::NotEqual,
        (Level::Relational, Kind::Less) => BinaryOp::Less,
        (Level::Relational, Kind::LessEqual) => BinaryOp::LessEqual,
        (Level::Relational, Kind::Greater) => BinaryOp::Greater,
        (Level::Relational, Kind::GreaterEqual) => BinaryOp::GreaterEqual,
        (Level::Additive, Kind::Plus) => BinaryOp::Add,
        (Level::Additive, Kind::Minus) => BinaryOp::Subtract,
        (Level::Multiplicative, Kind::Star) => BinaryOp::Multiply,
        (Level::Multiplicative, Kind::Slash) => BinaryOp::Divide,
        (Level::Multiplicative, Kind::Percent) => BinaryOp::Modulo,
        _ => return None,
    })
}
