//! Tokens and the machinery for producing them.
//!
//! A Weft token is a fairly heavyweight object compared to tokens in many
//!     other interpreters: it owns its text and also owns the text that the lexer skipped
//!     immediately before it (whitespace inside argument lists, the backslash run in front
//!     of a reference or directive).
//! The skipped text is kept in the [special](Token::special) chain.
//! Concatenating the special chain and the text of every token in a range
//!     reproduces the source code of that range exactly,
//!     which is how nodes of the syntax tree reconstruct their literal spelling.

pub mod lexer;
pub mod source;
pub mod trace;

/// Index of a token inside the token arena of a compiled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub(crate) u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A run of plain text.
    Text,
    /// A `##` comment (including its line ending) or a `#* *#` comment.
    Comment,
    /// A `#[[ ]]#` unparsed block; the text includes the delimiters.
    TextBlock,
    /// A directive whose backslash prefix turns it into literal text.
    EscapedDirective,
    /// A directive keyword such as `#if` or `#{else}`.
    Directive,
    /// The start of a reference: one of `$`, `$!`, `${` or `$!{`.
    Dollar,
    Identifier,
    StringLiteral,
    IntegerLiteral,
    FloatLiteral,
    True,
    False,
    In,
    Dot,
    DotDot,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Not,
    /// Skipped whitespace; only ever appears in a special chain.
    Whitespace,
    /// Skipped backslash run; only ever appears in a special chain.
    Escapes,
    EndOfInput,
}

impl Kind {
    /// A human readable description used in parse errors.
    pub fn describe(&self) -> &'static str {
        use Kind::*;
        match self {
            Text => "text",
            Comment => "a comment",
            TextBlock => "an unparsed text block",
            EscapedDirective => "an escaped directive",
            Directive => "a directive",
            Dollar => "a reference",
            Identifier => "an identifier",
            StringLiteral => "a string literal",
            IntegerLiteral => "an integer literal",
            FloatLiteral => "a floating point literal",
            True => "`true`",
            False => "`false`",
            In => "`in`",
            Dot => "`.`",
            DotDot => "`..`",
            Comma => "`,`",
            Colon => "`:`",
            LeftParen => "`(`",
            RightParen => "`)`",
            LeftBracket => "`[`",
            RightBracket => "`]`",
            LeftBrace => "`{`",
            RightBrace => "`}`",
            Assign => "`=`",
            Plus => "`+`",
            Minus => "`-`",
            Star => "`*`",
            Slash => "`/`",
            Percent => "`%`",
            Equal => "`==`",
            NotEqual => "`!=`",
            Less => "`<`",
            LessEqual => "`<=`",
            Greater => "`>`",
            GreaterEqual => "`>=`",
            And => "`&&`",
            Or => "`||`",
            Not => "`!`",
            Whitespace => "whitespace",
            Escapes => "backslashes",
            EndOfInput => "the end of the input",
        }
    }
}

/// A token produced by the [lexer](lexer::Lexer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: Kind,
    pub text: String,
    /// Line of the first character of [text](Token::text), starting at 1.
    pub line: u32,
    /// Column of the first character of [text](Token::text), starting at 1.
    pub column: u32,
    /// Text skipped immediately before this token.
    pub special: Option<Box<Token>>,
}

impl Token {
    pub fn new<T: Into<String>>(kind: Kind, text: T, line: u32, column: u32) -> Token {
        Token {
            kind,
            text: text.into(),
            line,
            column,
            special: None,
        }
    }

    pub fn with_special(mut self, special: Option<Box<Token>>) -> Token {
        self.special = special;
        self
    }

    /// Writes the special chain followed by the text of this token.
    pub fn write_literal(&self, out: &mut String) {
        if let Some(special) = &self.special {
            special.write_literal(out);
        }
        out.push_str(&self.text);
    }

    /// Like [write_literal](Token::write_literal) but drops leading whitespace specials.
    ///
    /// A node that starts with this token does not own the whitespace that separated
    ///     it from the previous token.
    pub fn write_literal_trimmed(&self, out: &mut String) {
        if let Some(special) = &self.special {
            if special.kind != Kind::Whitespace {
                special.write_literal_trimmed(out);
            }
        }
        out.push_str(&self.text);
    }

    pub fn literal(&self) -> String {
        let mut s = String::new();
        self.write_literal(&mut s);
        s
    }

    /// Number of backslashes in the special chain directly in front of this token.
    pub fn escape_count(&self) -> usize {
        match &self.special {
            Some(special) if special.kind == Kind::Escapes => special.text.len(),
            _ => 0,
        }
    }
}

/// Whether a backslash run of the given length escapes the reference or directive after it.
///
/// A run of `n` backslashes escapes iff `n` is positive and even.
/// Half of the run, rounded down, is emitted as literal backslashes in both cases.
pub fn is_escaped(num_backslashes: usize) -> bool {
    num_backslashes > 0 && num_backslashes % 2 == 0
}

/// Write tokens to a string, reproducing the source they were lexed from.
pub fn write_tokens<'a, T>(tokens: T) -> String
where
    T: IntoIterator<Item = &'a Token>,
{
    let mut s = String::new();
    for token in tokens {
        token.write_literal(&mut s);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_includes_special_chain() {
        let escapes = Token::new(Kind::Escapes, "\\\\", 1, 1)
            .with_special(Some(Box::new(Token::new(Kind::Whitespace, " ", 1, 1))));
        let token = Token::new(Kind::Dollar, "$!", 1, 4).with_special(Some(Box::new(escapes)));
        assert_eq!(token.literal(), " \\\\$!");
        let mut trimmed = String::new();
        token.write_literal_trimmed(&mut trimmed);
        assert_eq!(trimmed, "\\\\$!");
        assert_eq!(token.escape_count(), 2);
    }

    #[test]
    fn escape_parity() {
        assert!(!is_escaped(0));
        assert!(!is_escaped(1));
        assert!(is_escaped(2));
        assert!(!is_escaped(3));
        assert!(is_escaped(4));
    }
}
