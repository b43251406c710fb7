//! The Weft lexer, which reads template source and outputs [tokens](Token).
//!
//! Template source is mostly plain text with islands of code:
//!     references like `$user.name`, directives like `#if($x > 1)`,
//!     comments and unparsed blocks.
//! Which characters are meaningful depends on where the lexer is,
//!     so the lexer is a state machine with the nine states of [State].
//! Entering an island pushes the current state onto a stack of frames,
//!     and leaving it pops the stack.
//!
//! Each frame carries its own pair of delimiter counters.
//! When a region is entered on a `(` (directive and method arguments) or `[` (an index),
//!     every opening delimiter increments the open counter and every closing delimiter
//!     increments the close counter.
//! The region only ends at the closing delimiter that balances the counters of its own
//!     frame; closing delimiters of nested groups just advance the count.
//! This is what makes chains like `$a.method(1, $b.other((2)))` come out right
//!     without any help from the parser.
//!
//! Popping an empty stack is not an error: the lexer goes back to the default state.

use super::source::CharSource;
use super::{Kind, Token};
use crate::error::LexicalError;

/// The lexical states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    /// Plain text.
    Default,
    /// Inside the parenthesized arguments of a directive.
    Directive,
    /// Expecting the identifier of a reference or of a member.
    Reference,
    /// After an identifier of a reference, looking for `.`, `[`, `(` or `}`.
    RefModifier,
    /// Inside `[ ]` after a reference.
    RefIndex,
    /// Inside the parenthesized arguments of a method call.
    RefArgs,
    SingleLineComment,
    MultiLineComment,
    TextBlock,
}

/// Saved lexer registers.
#[derive(Debug, Clone, Copy)]
struct Frame {
    state: State,
    paren_open: u32,
    paren_close: u32,
    formal: bool,
    after_member: bool,
    eat_line: bool,
    in_set: bool,
}

/// Directives that never take arguments.
const NO_ARGUMENT_DIRECTIVES: [&str; 4] = ["else", "end", "stop", "break"];

/// Directives whose line ending is consumed when they end a line.
const LINE_DIRECTIVES: [&str; 8] = [
    "set", "if", "elseif", "else", "end", "foreach", "macro", "define",
];

/// Keywords recognized inside argument lists.
///
/// A word matching a keyword exactly becomes the keyword token;
///     longer words such as `index` stay identifiers.
const KEYWORDS: [(&str, Kind); 12] = [
    ("in", Kind::In),
    ("true", Kind::True),
    ("false", Kind::False),
    ("and", Kind::And),
    ("or", Kind::Or),
    ("not", Kind::Not),
    ("eq", Kind::Equal),
    ("ne", Kind::NotEqual),
    ("lt", Kind::Less),
    ("le", Kind::LessEqual),
    ("gt", Kind::Greater),
    ("ge", Kind::GreaterEqual),
];

/// The Weft lexer
pub struct Lexer {
    source: CharSource,
    state: State,
    paren_open: u32,
    paren_close: u32,
    formal: bool,
    after_member: bool,
    member_pending: bool,
    eat_line: bool,
    stack: Vec<Frame>,
    in_reference: bool,
    in_directive: bool,
    in_comment: bool,
    in_set: bool,
    pending_special: Option<Box<Token>>,
}

impl Lexer {
    pub fn new(source: &str) -> Lexer {
        Lexer {
            source: CharSource::new(source),
            state: State::Default,
            paren_open: 0,
            paren_close: 0,
            formal: false,
            after_member: false,
            member_pending: false,
            eat_line: false,
            stack: Vec::new(),
            in_reference: false,
            in_directive: false,
            in_comment: false,
            in_set: false,
            pending_special: None,
        }
    }

    /// Lex a whole source, including the final [EndOfInput](Kind::EndOfInput) token.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == Kind::EndOfInput;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn in_reference(&self) -> bool {
        self.in_reference
    }

    pub fn in_directive(&self) -> bool {
        self.in_directive
    }

    pub fn in_comment(&self) -> bool {
        self.in_comment
    }

    pub fn in_set(&self) -> bool {
        self.in_set
    }

    /// Return the next token.
    ///
    /// After the input is exhausted this keeps returning [EndOfInput](Kind::EndOfInput) tokens.
    pub fn next_token(&mut self) -> Result<Token, LexicalError> {
        loop {
            let token = match self.state {
                State::Default => self.lex_default(),
                State::Directive | State::RefArgs | State::RefIndex => self.lex_arguments()?,
                State::Reference => self.lex_reference()?,
                State::RefModifier => self.lex_modifier(),
                State::SingleLineComment => self.lex_single_line_comment(),
                State::MultiLineComment => self.lex_multi_line_comment()?,
                State::TextBlock => self.lex_text_block()?,
            };
            if let Some(token) = token {
                return Ok(token);
            }
        }
    }

    fn push(&mut self, state: State) {
        self.stack.push(Frame {
            state: self.state,
            paren_open: self.paren_open,
            paren_close: self.paren_close,
            formal: self.formal,
            after_member: self.after_member,
            eat_line: self.eat_line,
            in_set: self.in_set,
        });
        self.state = state;
        self.paren_open = 0;
        self.paren_close = 0;
        self.formal = false;
        self.after_member = false;
        self.eat_line = false;
        self.in_set = false;
        self.refresh_flags();
    }

    fn pop(&mut self) {
        let frame = self.stack.pop().unwrap_or(Frame {
            state: State::Default,
            paren_open: 0,
            paren_close: 0,
            formal: false,
            after_member: false,
            eat_line: false,
            in_set: false,
        });
        self.state = frame.state;
        self.paren_open = frame.paren_open;
        self.paren_close = frame.paren_close;
        self.formal = frame.formal;
        self.after_member = frame.after_member;
        self.eat_line = frame.eat_line;
        self.in_set = frame.in_set;
        self.refresh_flags();
    }

    fn refresh_flags(&mut self) {
        let states = self
            .stack
            .iter()
            .map(|frame| frame.state)
            .chain(std::iter::once(self.state));
        self.in_reference = false;
        self.in_directive = false;
        for state in states {
            match state {
                State::Reference | State::RefModifier | State::RefIndex | State::RefArgs => {
                    self.in_reference = true
                }
                State::Directive => self.in_directive = true,
                _ => {}
            }
        }
        self.in_comment = matches!(
            self.state,
            State::SingleLineComment | State::MultiLineComment
        );
    }

    /// Build a token from the text between `start` and the current position.
    fn emit(&mut self, kind: Kind, start: usize) -> Token {
        let (line, column) = self.source.location(start);
        let text = self.source.slice(start, self.source.position());
        Token::new(kind, text, line, column).with_special(self.pending_special.take())
    }

    /// Record skipped text as special, chained in front of any special already pending.
    fn skip(&mut self, kind: Kind, start: usize) {
        let skipped = self.emit(kind, start);
        self.pending_special = Some(Box::new(skipped));
    }

    fn error<T: Into<String>>(&self, message: T) -> LexicalError {
        LexicalError::new(
            message,
            self.state,
            self.source.line(),
            self.source.column(),
            self.source.trailing_context(20),
        )
    }

    fn end_of_input(&mut self) -> Token {
        let start = self.source.position();
        self.emit(Kind::EndOfInput, start)
    }

    // Default state

    fn lex_default(&mut self) -> Option<Token> {
        if self.source.is_exhausted() {
            return Some(self.end_of_input());
        }
        if let Some(token) = self.lex_structural() {
            return token;
        }
        let start = self.source.position();
        while self.source.next().is_some() {
            match self.source.peek() {
                None => break,
                Some('$') | Some('#') | Some('\\') => {
                    if self.structural_length().is_some() {
                        break;
                    }
                }
                _ => {}
            }
        }
        Some(self.emit(Kind::Text, start))
    }

    /// Number of backslashes starting at the current position.
    fn backslash_run(&self) -> usize {
        let mut n = 0;
        while self.source.peek_nth(n) == Some('\\') {
            n += 1;
        }
        n
    }

    /// If something other than text starts at the current position, return the number of
    ///     backslashes in front of it.
    fn structural_length(&self) -> Option<usize> {
        let n = self.backslash_run();
        match self.source.peek_nth(n) {
            Some('$') if self.reference_length(n).is_some() => Some(n),
            Some('#') if n == 0 => {
                if self.source.starts_with("##")
                    || self.source.starts_with("#*")
                    || self.source.starts_with("#[[")
                    || self.directive_length(0).is_some()
                {
                    Some(0)
                } else {
                    None
                }
            }
            Some('#') if self.directive_length(n).is_some() => Some(n),
            _ => None,
        }
    }

    /// Length of the reference marker (`$`, `$!`, `${`, `$!{`) starting at `offset`,
    ///     provided an identifier follows it.
    fn reference_length(&self, offset: usize) -> Option<usize> {
        if self.source.peek_nth(offset) != Some('$') {
            return None;
        }
        let mut n = 1;
        if self.source.peek_nth(offset + n) == Some('!') {
            n += 1;
        }
        if self.source.peek_nth(offset + n) == Some('{') {
            n += 1;
        }
        match self.source.peek_nth(offset + n) {
            Some(c) if is_identifier_start(c) => Some(n),
            _ => None,
        }
    }

    /// Length of the directive keyword (`#name` or `#{name}`) starting at `offset`.
    fn directive_length(&self, offset: usize) -> Option<usize> {
        if self.source.peek_nth(offset) != Some('#') {
            return None;
        }
        let mut n = 1;
        let braced = self.source.peek_nth(offset + n) == Some('{');
        if braced {
            n += 1;
        }
        match self.source.peek_nth(offset + n) {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return None,
        }
        while matches!(self.source.peek_nth(offset + n), Some(c) if is_identifier_part(c)) {
            n += 1;
        }
        if braced {
            if self.source.peek_nth(offset + n) != Some('}') {
                return None;
            }
            n += 1;
        }
        Some(n)
    }

    /// Lex a reference start, directive, comment or text block at the current position.
    ///
    /// Returns `None` if plain text starts here.
    /// Returns `Some(None)` if only the state changed.
    fn lex_structural(&mut self) -> Option<Option<Token>> {
        let n = self.structural_length()?;
        if self.source.peek_nth(n) == Some('$') {
            self.skip_escapes(n);
            return Some(Some(self.start_reference()));
        }
        if n == 0 {
            let next_state = if self.source.starts_with("##") {
                Some(State::SingleLineComment)
            } else if self.source.starts_with("#*") {
                Some(State::MultiLineComment)
            } else if self.source.starts_with("#[[") {
                Some(State::TextBlock)
            } else {
                None
            };
            if let Some(state) = next_state {
                self.push(state);
                return Some(None);
            }
        }
        self.skip_escapes(n);
        Some(Some(self.lex_directive(n)))
    }

    fn skip_escapes(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let start = self.source.position();
        for _ in 0..n {
            self.source.next();
        }
        self.skip(Kind::Escapes, start);
    }

    /// Consume a reference marker and enter the reference state.
    ///
    /// The caller has checked that an identifier follows the marker.
    fn start_reference(&mut self) -> Token {
        let start = self.source.position();
        let n = self.reference_length(0).unwrap_or(1);
        for _ in 0..n {
            self.source.next();
        }
        let token = self.emit(Kind::Dollar, start);
        // Registers of the current region are saved unchanged; a method call that
        //     just finished must not be followed by another one.
        self.after_member = false;
        self.push(State::Reference);
        self.formal = token.text.ends_with('{');
        token
    }

    fn lex_directive(&mut self, num_backslashes: usize) -> Token {
        let start = self.source.position();
        let length = self.directive_length(0).unwrap_or(1);
        for _ in 0..length {
            self.source.next();
        }
        let raw = self.source.slice(start, self.source.position());
        let name = directive_name(&raw).to_string();
        if super::is_escaped(num_backslashes) {
            return self.emit(Kind::EscapedDirective, start);
        }
        let takes_arguments = !NO_ARGUMENT_DIRECTIVES.contains(&name.as_str());
        let eat_line = LINE_DIRECTIVES.contains(&name.as_str());
        if takes_arguments && self.next_non_blank() == Some('(') {
            let token = self.emit(Kind::Directive, start);
            self.push(State::Directive);
            self.eat_line = eat_line;
            self.in_set = name == "set";
            return token;
        }
        if eat_line && !takes_arguments {
            self.consume_line_ending();
        }
        self.emit(Kind::Directive, start)
    }

    fn next_non_blank(&self) -> Option<char> {
        let mut n = 0;
        loop {
            match self.source.peek_nth(n) {
                Some(' ') | Some('\t') => n += 1,
                other => return other,
            }
        }
    }

    /// Consume trailing blanks and one line ending, but only if nothing else is on the line.
    fn consume_line_ending(&mut self) {
        let mut n = 0;
        while matches!(self.source.peek_nth(n), Some(' ') | Some('\t')) {
            n += 1;
        }
        if self.source.peek_nth(n) == Some('\r') {
            n += 1;
        }
        if self.source.peek_nth(n) != Some('\n') {
            return;
        }
        for _ in 0..=n {
            self.source.next();
        }
    }

    // Reference states

    fn lex_reference(&mut self) -> Result<Option<Token>, LexicalError> {
        let start = self.source.position();
        match self.source.peek() {
            Some(c) if is_identifier_start(c) => {}
            _ => return Err(self.error("expected an identifier")),
        }
        while matches!(self.source.peek(), Some(c) if is_identifier_part(c)) {
            self.source.next();
        }
        let token = self.emit(Kind::Identifier, start);
        self.after_member = self.member_pending;
        self.member_pending = false;
        self.state = State::RefModifier;
        self.refresh_flags();
        Ok(Some(token))
    }

    fn lex_modifier(&mut self) -> Option<Token> {
        let start = self.source.position();
        match self.source.peek() {
            Some('.') => {
                self.source.next();
                match self.source.peek() {
                    Some(c) if is_identifier_start(c) => {
                        let token = self.emit(Kind::Dot, start);
                        self.member_pending = true;
                        self.after_member = false;
                        self.state = State::Reference;
                        self.refresh_flags();
                        Some(token)
                    }
                    _ => {
                        self.source.backup(1);
                        self.pop();
                        None
                    }
                }
            }
            Some('[') => {
                self.source.next();
                let token = self.emit(Kind::LeftBracket, start);
                self.after_member = false;
                self.push(State::RefIndex);
                self.paren_open = 1;
                Some(token)
            }
            Some('(') if self.after_member => {
                self.source.next();
                let token = self.emit(Kind::LeftParen, start);
                self.after_member = false;
                self.push(State::RefArgs);
                self.paren_open = 1;
                Some(token)
            }
            Some('}') if self.formal => {
                self.source.next();
                let token = self.emit(Kind::RightBrace, start);
                self.pop();
                Some(token)
            }
            _ => {
                self.pop();
                None
            }
        }
    }

    // Argument lists

    fn lex_arguments(&mut self) -> Result<Option<Token>, LexicalError> {
        let whitespace_start = self.source.position();
        while matches!(self.source.peek(), Some(c) if c.is_whitespace()) {
            self.source.next();
        }
        if self.source.position() > whitespace_start {
            self.skip(Kind::Whitespace, whitespace_start);
        }
        let c = match self.source.peek() {
            None => {
                let what = match self.state {
                    State::RefIndex => "an index",
                    State::RefArgs => "method arguments",
                    _ => "directive arguments",
                };
                return Err(self.error(format!("unexpected end of input inside {what}")));
            }
            Some(c) => c,
        };
        if c == '$' && self.reference_length(0).is_some() {
            return Ok(Some(self.start_reference()));
        }
        let start = self.source.position();
        self.source.next();
        let mut closes_region = false;
        let kind = match c {
            '"' | '\'' => self.lex_string_literal(c)?,
            '0'..='9' => self.lex_number(),
            c if is_identifier_start(c) => {
                while matches!(self.source.peek(), Some(c) if is_identifier_part(c)) {
                    self.source.next();
                }
                let word = self.source.slice(start, self.source.position());
                KEYWORDS
                    .iter()
                    .find(|(keyword, _)| *keyword == word)
                    .map(|(_, kind)| *kind)
                    .unwrap_or(Kind::Identifier)
            }
            '(' => {
                if self.state != State::RefIndex {
                    self.paren_open += 1;
                }
                Kind::LeftParen
            }
            ')' => {
                if self.state != State::RefIndex {
                    self.paren_close += 1;
                    closes_region = self.paren_close >= self.paren_open;
                }
                Kind::RightParen
            }
            '[' => {
                if self.state == State::RefIndex {
                    self.paren_open += 1;
                }
                Kind::LeftBracket
            }
            ']' => {
                if self.state == State::RefIndex {
                    self.paren_close += 1;
                    closes_region = self.paren_close >= self.paren_open;
                }
                Kind::RightBracket
            }
            '{' => Kind::LeftBrace,
            '}' => Kind::RightBrace,
            ',' => Kind::Comma,
            ':' => Kind::Colon,
            '.' => {
                if self.source.peek() != Some('.') {
                    self.source.backup(1);
                    return Err(self.error("unexpected character `.`"));
                }
                self.source.next();
                Kind::DotDot
            }
            '=' => self.one_or_two('=', Kind::Assign, Kind::Equal),
            '!' => self.one_or_two('=', Kind::Not, Kind::NotEqual),
            '<' => self.one_or_two('=', Kind::Less, Kind::LessEqual),
            '>' => self.one_or_two('=', Kind::Greater, Kind::GreaterEqual),
            '&' | '|' => {
                if self.source.peek() != Some(c) {
                    self.source.backup(1);
                    return Err(self.error(format!("unexpected character `{c}`")));
                }
                self.source.next();
                if c == '&' {
                    Kind::And
                } else {
                    Kind::Or
                }
            }
            '+' => Kind::Plus,
            '-' => Kind::Minus,
            '*' => Kind::Star,
            '/' => Kind::Slash,
            '%' => Kind::Percent,
            _ => {
                self.source.backup(1);
                return Err(self.error(format!("unexpected character `{c}`")));
            }
        };
        if closes_region && self.eat_line {
            self.consume_line_ending();
        }
        let token = self.emit(kind, start);
        if closes_region {
            self.pop();
        }
        Ok(Some(token))
    }

    fn one_or_two(&mut self, second: char, one: Kind, two: Kind) -> Kind {
        if self.source.peek() == Some(second) {
            self.source.next();
            two
        } else {
            one
        }
    }

    /// Lex the rest of a string literal; a doubled quote stands for one quote.
    fn lex_string_literal(&mut self, quote: char) -> Result<Kind, LexicalError> {
        loop {
            match self.source.next() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => {
                    if self.source.peek() == Some(quote) {
                        self.source.next();
                    } else {
                        return Ok(Kind::StringLiteral);
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn lex_number(&mut self) -> Kind {
        while matches!(self.source.peek(), Some(c) if c.is_ascii_digit()) {
            self.source.next();
        }
        let is_float = self.source.peek() == Some('.')
            && matches!(self.source.peek_nth(1), Some(c) if c.is_ascii_digit());
        if !is_float {
            return Kind::IntegerLiteral;
        }
        self.source.next();
        while matches!(self.source.peek(), Some(c) if c.is_ascii_digit()) {
            self.source.next();
        }
        Kind::FloatLiteral
    }

    // Comments and text blocks

    fn lex_single_line_comment(&mut self) -> Option<Token> {
        let start = self.source.position();
        while let Some(c) = self.source.next() {
            if c == '\n' {
                break;
            }
        }
        let token = self.emit(Kind::Comment, start);
        self.pop();
        Some(token)
    }

    fn lex_multi_line_comment(&mut self) -> Result<Option<Token>, LexicalError> {
        let start = self.source.position();
        self.source.next();
        self.source.next();
        self.consume_until("*#", "unterminated comment", start)?;
        let token = self.emit(Kind::Comment, start);
        self.pop();
        Ok(Some(token))
    }

    fn lex_text_block(&mut self) -> Result<Option<Token>, LexicalError> {
        let start = self.source.position();
        for _ in 0..3 {
            self.source.next();
        }
        self.consume_until("]]#", "unterminated text block", start)?;
        let token = self.emit(Kind::TextBlock, start);
        self.pop();
        Ok(Some(token))
    }

    fn consume_until(
        &mut self,
        terminator: &str,
        message: &str,
        start: usize,
    ) -> Result<(), LexicalError> {
        loop {
            if self.source.starts_with(terminator) {
                for _ in terminator.chars() {
                    self.source.next();
                }
                return Ok(());
            }
            if self.source.next().is_none() {
                let (line, column) = self.source.location(start);
                let mut err = self.error(message);
                err.line = line;
                err.column = column;
                return Err(err);
            }
        }
    }
}

/// The name of a directive given its raw text: `#{else}` and `#else` are both `else`.
pub fn directive_name(raw: &str) -> &str {
    raw.trim_end()
        .trim_start_matches('#')
        .trim_start_matches('{')
        .trim_end_matches('}')
}

pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
