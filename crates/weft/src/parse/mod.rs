//! The Weft parser.
//!
//! A recursive descent parser that turns the token stream into an [Ast].
//! The grammar of the template level is
//!
//! ```text
//! content    = ( text | comment | text-block | reference | directive )*
//! reference  = "$" identifier ( "." identifier [ "(" arguments ")" ] | "[" expression "]" )* [ "}" ]
//! directive  = "#set" "(" reference "=" expression ")"
//!            | "#if" "(" expression ")" content ( "#elseif" "(" expression ")" content )* [ "#else" content ] "#end"
//!            | "#foreach" "(" reference "in" expression ")" content [ "#else" content ] "#end"
//!            | "#macro" "(" identifier reference* ")" content "#end"
//!            | "#define" "(" reference ")" content "#end"
//!            | "#evaluate" "(" expression ")" | "#parse" "(" expression ")"
//!            | "#include" "(" expression ( "," expression )* ")"
//!            | "#break" | "#stop"
//!            | "#" identifier [ "(" arguments ")" ]
//! ```
//!
//! and the expression grammar is in the [expr] module.
//!
//! Every node opens on the first token not yet consumed and closes on the last token consumed,
//!     so its span covers exactly its source text.
//! Parsing either succeeds and returns a complete tree or fails without returning anything.

use crate::ast::{Ast, Node, NodeId, NodeKind};
use crate::error::{CompileError, ParseError};
use crate::token::lexer::{directive_name, Lexer};
use crate::token::{Kind, Token, TokenId};

mod expr;

/// Lex and parse template source.
pub fn parse(source: &str) -> Result<Ast, CompileError> {
    let tokens = Lexer::tokenize(source)?;
    Ok(Parser::new(tokens).parse()?)
}

const BLOCK_ENDS: [&str; 3] = ["elseif", "else", "end"];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<Node>,
}

impl Parser {
    /// Create a parser for a token stream ending with an [EndOfInput](Kind::EndOfInput) token.
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            pos: 0,
            nodes: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Ast, ParseError> {
        if self.tokens.last().map(|t| t.kind) != Some(Kind::EndOfInput) {
            let line = self.tokens.last().map(|t| t.line).unwrap_or(1);
            self.tokens.push(Token::new(Kind::EndOfInput, "", line, 1));
        }
        let root = self.open(NodeKind::Template);
        self.parse_content(root, &[])?;
        self.close(root);
        Ok(Ast {
            tokens: self.tokens,
            nodes: self.nodes,
            root,
        })
    }

    // Token helpers

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> Kind {
        self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> TokenId {
        let id = TokenId(self.pos as u32);
        if self.tokens[self.pos].kind != Kind::EndOfInput {
            self.pos += 1;
        }
        id
    }

    fn expect(&mut self, kind: Kind, context: &str) -> Result<TokenId, ParseError> {
        if self.peek_kind() != kind {
            return Err(self.unexpected(&format!("{} {context}", kind.describe())));
        }
        Ok(self.advance())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(
            format!("expected {expected}, found {}", token.kind.describe()),
            token,
        )
    }

    // Node helpers

    fn open(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let first = TokenId(self.pos as u32);
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
            parent: None,
            first,
            last: first,
        });
        id
    }

    fn close(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        let first = node.first.0 as usize;
        node.last = if self.pos > first {
            TokenId(self.pos as u32 - 1)
        } else {
            // An empty node; its span is empty because last < first.
            TokenId(node.first.0.saturating_sub(1))
        };
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    fn leaf(&mut self, kind: NodeKind) -> NodeId {
        let id = self.open(kind);
        self.advance();
        self.close(id);
        id
    }

    // Template level

    /// Parse content into `parent` until the end of input or one of the terminating directives.
    ///
    /// The terminating directive is not consumed; its name is returned.
    fn parse_content(
        &mut self,
        parent: NodeId,
        terminators: &[&str],
    ) -> Result<Option<String>, ParseError> {
        loop {
            let child = match self.peek_kind() {
                Kind::EndOfInput => return Ok(None),
                Kind::Text => self.leaf(NodeKind::Text),
                Kind::Comment => self.leaf(NodeKind::Comment),
                Kind::TextBlock => self.leaf(NodeKind::TextBlock),
                Kind::EscapedDirective => self.leaf(NodeKind::EscapedDirective),
                Kind::Dollar => self.parse_reference()?,
                Kind::Directive => {
                    let token = self.peek();
                    let name = directive_name(&token.text).to_string();
                    if terminators.contains(&name.as_str()) {
                        return Ok(Some(name));
                    }
                    if BLOCK_ENDS.contains(&name.as_str()) {
                        return Err(ParseError::new(format!("unexpected #{name}"), token)
                            .with_note(match terminators.is_empty() {
                                true => "there is no open block here",
                                false => "this directive is not allowed in the current block",
                            }));
                    }
                    self.parse_directive(&name)?
                }
                _ => return Err(self.unexpected("text, a reference or a directive")),
            };
            self.add_child(parent, child);
        }
    }

    fn parse_block(&mut self, terminators: &[&str]) -> Result<(NodeId, Option<String>), ParseError> {
        let block = self.open(NodeKind::Block);
        let terminator = self.parse_content(block, terminators)?;
        self.close(block);
        Ok((block, terminator))
    }

    fn missing_end(&self, directive: NodeId) -> ParseError {
        let token = &self.tokens[self.nodes[directive.index()].first.index()];
        ParseError::new(
            format!("missing #end for {}", token.text.trim_end()),
            token,
        )
        .with_note("the input ended before the block was closed")
    }

    /// Parse a reference starting at a `$` token.
    fn parse_reference(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::Reference {
            name: String::new(),
        });
        let formal = self.peek().text.ends_with('{');
        self.expect(Kind::Dollar, "to start a reference")?;
        let root = self.expect(Kind::Identifier, "after `$`")?;
        let name = self.tokens[root.index()].text.clone();
        loop {
            if self.peek().special.is_some() {
                break;
            }
            let child = match self.peek_kind() {
                Kind::Dot => {
                    let member = self.open(NodeKind::Index);
                    self.advance();
                    let identifier = self.expect(Kind::Identifier, "after `.`")?;
                    let name = self.tokens[identifier.index()].text.clone();
                    let is_call =
                        self.peek_kind() == Kind::LeftParen && self.peek().special.is_none();
                    if is_call {
                        self.advance();
                        self.parse_arguments(member, Kind::RightParen)?;
                        self.nodes[member.index()].kind = NodeKind::Method { name };
                    } else {
                        self.nodes[member.index()].kind = NodeKind::Member { name };
                    }
                    self.close(member);
                    member
                }
                Kind::LeftBracket => {
                    let index = self.open(NodeKind::Index);
                    self.advance();
                    let expression = self.parse_expression()?;
                    self.add_child(index, expression);
                    self.expect(Kind::RightBracket, "to close the index")?;
                    self.close(index);
                    index
                }
                _ => break,
            };
            self.add_child(node, child);
        }
        if formal {
            self.expect(Kind::RightBrace, "to close the formal reference")?;
        }
        self.nodes[node.index()].kind = NodeKind::Reference { name };
        self.close(node);
        Ok(node)
    }

    /// Parse expressions separated by optional commas up to the closing token, which is consumed.
    fn parse_arguments(&mut self, parent: NodeId, close: Kind) -> Result<(), ParseError> {
        loop {
            if self.peek_kind() == close {
                self.advance();
                return Ok(());
            }
            let argument = self.parse_expression()?;
            self.add_child(parent, argument);
            match self.peek_kind() {
                Kind::Comma => {
                    self.advance();
                }
                kind if kind == close => {}
                Kind::EndOfInput => {
                    return Err(self.unexpected(&format!("`,` or {}", close.describe())))
                }
                // Macro arguments may be separated by whitespace alone.
                _ => {}
            }
        }
    }

    fn parse_directive(&mut self, name: &str) -> Result<NodeId, ParseError> {
        match name {
            "set" => self.parse_set(),
            "if" => self.parse_if(),
            "foreach" => self.parse_foreach(),
            "macro" => self.parse_macro(),
            "define" => self.parse_define(),
            "evaluate" => self.parse_single_argument(NodeKind::Evaluate),
            "parse" => self.parse_single_argument(NodeKind::Parse),
            "include" => {
                let node = self.open(NodeKind::Include);
                self.advance();
                self.expect(Kind::LeftParen, "after #include")?;
                self.parse_arguments(node, Kind::RightParen)?;
                if self.nodes[node.index()].children.is_empty() {
                    return Err(ParseError::new(
                        "#include requires at least one argument",
                        &self.tokens[self.nodes[node.index()].first.index()],
                    ));
                }
                self.close(node);
                Ok(node)
            }
            "break" => Ok(self.leaf(NodeKind::Break)),
            "stop" => Ok(self.leaf(NodeKind::Stop)),
            _ => {
                let node = self.open(NodeKind::MacroCall {
                    name: name.to_string(),
                });
                self.advance();
                if self.peek_kind() == Kind::LeftParen {
                    self.advance();
                    self.parse_arguments(node, Kind::RightParen)?;
                }
                self.close(node);
                Ok(node)
            }
        }
    }

    fn parse_parenthesized(&mut self, directive: &str) -> Result<NodeId, ParseError> {
        self.expect(Kind::LeftParen, &format!("after #{directive}"))?;
        let expression = self.parse_expression()?;
        self.expect(Kind::RightParen, &format!("to close #{directive}"))?;
        Ok(expression)
    }

    fn parse_single_argument(&mut self, kind: NodeKind) -> Result<NodeId, ParseError> {
        let name = kind.directive_name().unwrap_or_default().to_string();
        let node = self.open(kind);
        self.advance();
        let argument = self.parse_parenthesized(&name)?;
        self.add_child(node, argument);
        self.close(node);
        Ok(node)
    }

    fn parse_set(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::Set);
        self.advance();
        self.expect(Kind::LeftParen, "after #set")?;
        if self.peek_kind() != Kind::Dollar {
            return Err(self.unexpected("a reference to assign to"));
        }
        let target = self.parse_reference()?;
        self.add_child(node, target);
        self.expect(Kind::Assign, "after the reference in #set")?;
        let value = self.parse_expression()?;
        self.add_child(node, value);
        self.expect(Kind::RightParen, "to close #set")?;
        self.close(node);
        Ok(node)
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::If);
        self.advance();
        let condition = self.parse_parenthesized("if")?;
        self.add_child(node, condition);
        let (block, mut terminator) = self.parse_block(&BLOCK_ENDS)?;
        self.add_child(node, block);
        loop {
            match terminator.as_deref() {
                Some("elseif") => {
                    let branch = self.open(NodeKind::ElseIf);
                    self.advance();
                    let condition = self.parse_parenthesized("elseif")?;
                    self.add_child(branch, condition);
                    let (block, next) = self.parse_block(&BLOCK_ENDS)?;
                    self.add_child(branch, block);
                    self.close(branch);
                    self.add_child(node, branch);
                    terminator = next;
                }
                Some("else") => {
                    let branch = self.parse_else()?;
                    self.add_child(node, branch);
                    terminator = Some("end".into());
                }
                Some(_) => {
                    self.advance();
                    break;
                }
                None => return Err(self.missing_end(node)),
            }
        }
        self.close(node);
        Ok(node)
    }

    /// Parse `#else` up to and including the matching `#end`.
    ///
    /// The `#end` is consumed here but belongs to the enclosing directive's span;
    ///     the else node itself closes before it.
    fn parse_else(&mut self) -> Result<NodeId, ParseError> {
        let branch = self.open(NodeKind::Else);
        self.advance();
        let (block, terminator) = self.parse_block(&["end"])?;
        self.add_child(branch, block);
        self.close(branch);
        if terminator.is_none() {
            return Err(self.missing_end(branch));
        }
        Ok(branch)
    }

    fn parse_foreach(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::Foreach);
        self.advance();
        self.expect(Kind::LeftParen, "after #foreach")?;
        if self.peek_kind() != Kind::Dollar {
            return Err(self.unexpected("a loop variable"));
        }
        let variable = self.parse_reference()?;
        if !self.nodes[variable.index()].children.is_empty() {
            return Err(ParseError::new(
                "the loop variable must be a simple reference",
                &self.tokens[self.nodes[variable.index()].first.index()],
            ));
        }
        self.add_child(node, variable);
        self.expect(Kind::In, "after the loop variable")?;
        let iterable = self.parse_expression()?;
        self.add_child(node, iterable);
        self.expect(Kind::RightParen, "to close #foreach")?;
        let (block, terminator) = self.parse_block(&["else", "end"])?;
        self.add_child(node, block);
        match terminator.as_deref() {
            None => return Err(self.missing_end(node)),
            Some("else") => {
                let branch = self.parse_else()?;
                self.add_child(node, branch);
            }
            Some(_) => {}
        }
        self.advance();
        self.close(node);
        Ok(node)
    }

    fn parse_macro(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::Macro {
            name: String::new(),
            parameters: Vec::new(),
        });
        self.advance();
        self.expect(Kind::LeftParen, "after #macro")?;
        let name = self.expect(Kind::Identifier, "naming the macro")?;
        let name = self.tokens[name.index()].text.clone();
        let mut parameters = Vec::new();
        loop {
            match self.peek_kind() {
                Kind::RightParen => {
                    self.advance();
                    break;
                }
                Kind::Comma => {
                    self.advance();
                }
                Kind::Dollar => {
                    let formal = self.peek().text.ends_with('{');
                    self.advance();
                    let parameter = self.expect(Kind::Identifier, "naming the parameter")?;
                    parameters.push(self.tokens[parameter.index()].text.clone());
                    if formal {
                        self.expect(Kind::RightBrace, "to close the parameter")?;
                    }
                }
                _ => return Err(self.unexpected("a parameter or `)`")),
            }
        }
        let (block, terminator) = self.parse_block(&["end"])?;
        self.add_child(node, block);
        if terminator.is_none() {
            return Err(self.missing_end(node));
        }
        self.advance();
        self.nodes[node.index()].kind = NodeKind::Macro { name, parameters };
        self.close(node);
        Ok(node)
    }

    fn parse_define(&mut self) -> Result<NodeId, ParseError> {
        let node = self.open(NodeKind::Define);
        self.advance();
        self.expect(Kind::LeftParen, "after #define")?;
        if self.peek_kind() != Kind::Dollar {
            return Err(self.unexpected("a reference to define"));
        }
        let target = self.parse_reference()?;
        self.add_child(node, target);
        self.expect(Kind::RightParen, "to close #define")?;
        let (block, terminator) = self.parse_block(&["end"])?;
        self.add_child(node, block);
        if terminator.is_none() {
            return Err(self.missing_end(node));
        }
        self.advance();
        self.close(node);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A compact description of a subtree, e.g. `If[Reference(a), Block[Text]]`.
    fn shape(ast: &Ast, id: NodeId) -> String {
        let node = ast.node(id);
        let head = match &node.kind {
            NodeKind::Reference { name } => format!("Reference({name})"),
            NodeKind::Member { name } => format!("Member({name})"),
            NodeKind::Method { name } => format!("Method({name})"),
            NodeKind::MacroCall { name } => format!("MacroCall({name})"),
            NodeKind::Macro { name, parameters } => {
                format!("Macro({name}; {})", parameters.join(", "))
            }
            NodeKind::IntegerLiteral(i) => format!("{i}"),
            NodeKind::FloatLiteral(f) => format!("{f:?}"),
            NodeKind::BooleanLiteral(b) => format!("{b}"),
            NodeKind::Binary(op) => op.symbol().to_string(),
            NodeKind::Unary(op) => format!("{op:?}"),
            NodeKind::StringLiteral { .. } => format!("String({})", ast.literal(id)),
            kind => {
                let s = format!("{kind:?}");
                s.split(' ').next().unwrap_or_default().to_string()
            }
        };
        if node.children.is_empty() {
            return head;
        }
        let children: Vec<String> = node.children.iter().map(|c| shape(ast, *c)).collect();
        format!("{head}[{}]", children.join(", "))
    }

    fn parse_test(input: &str, expected: &str) {
        let ast = parse(input).unwrap();
        let root = ast.root();
        let children: Vec<String> = ast.children(root).iter().map(|c| shape(&ast, *c)).collect();
        assert_eq!(children.join(", "), expected);
    }

    macro_rules! parse_tests {
        ($( ($name: ident, $input: expr, $expected: expr), )+) => {
            $(
            #[test]
            fn $name() {
                parse_test($input, $expected);
            }
            )+
        };
    }

    parse_tests![
        (text_only, "Hello", "Text"),
        (
            reference_chain,
            "$a.b.c(1, $d)[0]",
            "Reference(a)[Member(b), Method(c)[1, Reference(d)], Index[0]]"
        ),
        (
            formal_reference,
            "${a.b}c",
            "Reference(a)[Member(b)], Text"
        ),
        (
            set_with_arithmetic,
            "#set($x = 1 + 2 * 3)",
            "Set[Reference(x), +[1, *[2, 3]]]"
        ),
        (
            precedence_of_logical_operators,
            "#set($x = !$a || $b && $c == 1)",
            "Set[Reference(x), ||[Not[Reference(a)], &&[Reference(b), ==[Reference(c), 1]]]]"
        ),
        (
            parentheses_group,
            "#set($x = (1 + 2) * 3)",
            "Set[Reference(x), *[+[1, 2], 3]]"
        ),
        (
            unary_minus,
            "#set($x = -$y - 1)",
            "Set[Reference(x), -[Negate[Reference(y)], 1]]"
        ),
        (
            if_elseif_else,
            "#if($a)A#elseif($b)B#else C#end",
            "If[Reference(a), Block[Text], ElseIf[Reference(b), Block[Text]], Else[Block[Text]]]"
        ),
        (
            foreach_with_else,
            "#foreach($i in [1..3])$i#else none#end",
            "Foreach[Reference(i), Range[1, 3], Block[Reference(i)], Else[Block[Text]]]"
        ),
        (
            list_and_map_literals,
            "#set($x = [1, 'a', {\"k\": true}])",
            "Set[Reference(x), List[1, String('a'), Map[String(\"k\"), true]]]"
        ),
        (
            macro_definition_and_call,
            "#macro(greet $who)Hi $who#end#greet('Bob')",
            "Macro(greet; who)[Block[Text, Reference(who)]], MacroCall(greet)[String('Bob')]"
        ),
        (
            macro_call_without_arguments,
            "#greet and more",
            "MacroCall(greet), Text"
        ),
        (
            macro_arguments_without_commas,
            "#m($a 1 'x')",
            "MacroCall(m)[Reference(a), 1, String('x')]"
        ),
        (
            define_and_evaluate,
            "#define($d)x#end#evaluate($d)",
            "Define[Reference(d), Block[Text]], Evaluate[Reference(d)]"
        ),
        (
            include_and_parse,
            "#include('a', 'b')#parse('c')",
            "Include[String('a'), String('b')], Parse[String('c')]"
        ),
        (
            comments_and_blocks,
            "a## c\n#* d *##[[ $x ]]#",
            "Text, Comment, Comment, TextBlock"
        ),
        (
            bare_word_is_runt_reference,
            "#if(word)x#end",
            "If[Reference(word), Block[Text]]"
        ),
        (
            break_and_stop,
            "#foreach($i in $l)#break#end#stop",
            "Foreach[Reference(i), Reference(l), Block[Break]], Stop"
        ),
        (
            float_literal,
            "#set($f = 2.5)",
            "Set[Reference(f), 2.5]"
        ),
    ];

    #[test]
    fn literal_reconstructs_the_source() {
        let input = "a \\\\$!{b.c( 1 ,$d )} #if( $x )y#end";
        let ast = parse(input).unwrap();
        let reference = ast.children(ast.root())[1];
        assert_eq!(ast.literal(reference), "\\\\$!{b.c( 1 ,$d )}");
        assert_eq!(ast.literal(ast.root()), input);
        let method = ast.children(reference)[0];
        let argument = ast.children(method)[1];
        assert_eq!(ast.literal(argument), "$d");
    }

    #[test]
    fn parent_links() {
        let ast = parse("#if($a)$b#end").unwrap();
        let if_node = ast.children(ast.root())[0];
        let block = ast.children(if_node)[1];
        let reference = ast.children(block)[0];
        assert_eq!(ast.parent(reference), Some(block));
        assert_eq!(ast.parent(block), Some(if_node));
        assert_eq!(ast.parent(ast.root()), None);
    }

    #[test]
    fn empty_block_has_empty_literal() {
        let ast = parse("#if($a)#end").unwrap();
        let if_node = ast.children(ast.root())[0];
        let block = ast.children(if_node)[1];
        assert_eq!(ast.literal(block), "");
    }

    macro_rules! parse_error_tests {
        ($( ($name: ident, $input: expr, $line: expr, $column: expr), )+) => {
            $(
            #[test]
            fn $name() {
                match parse($input) {
                    Err(CompileError::Parse(err)) => {
                        assert_eq!((err.line, err.column), ($line, $column), "{}", err.message)
                    }
                    other => panic!("expected a parse error, got {other:?}"),
                }
            }
            )+
        };
    }

    parse_error_tests![
        (missing_end, "x\n#if($a)\nyes", 2, 1),
        (unexpected_end, "a #end", 1, 3),
        (elseif_after_else, "#if($a)#else#elseif($b)#end", 1, 13),
        (set_without_reference, "#set(1 = 2)", 1, 6),
        (missing_expression, "#if()#end", 1, 5),
        (foreach_without_in, "#foreach($i $l)#end", 1, 13),
        (unclosed_formal_reference, "${a b}", 1, 4),
        (integer_out_of_range, "#set($a = 99999999999999999999)", 1, 11),
    ];
}
