//! Character sources for the lexer.
//!
//! The lexer reads characters one at a time and occasionally needs to give some back:
//!     after a `.` in a reference it looks at one more character to decide whether the dot
//!     starts a member access, and pushes both back if it does not.
//! [CharSource] supports this through [backup](CharSource::backup).

/// A source of characters with position tracking and push-back.
#[derive(Debug, Clone)]
pub struct CharSource {
    chars: Vec<char>,
    pos: usize,
    // Index of the first character of each line.
    line_starts: Vec<usize>,
}

impl CharSource {
    pub fn new(source: &str) -> CharSource {
        let chars: Vec<char> = source.chars().collect();
        let mut line_starts = vec![0];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\n' {
                line_starts.push(i + 1);
            }
        }
        CharSource {
            chars,
            pos: 0,
            line_starts,
        }
    }

    /// Consume and return the next character.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    pub fn peek(&self) -> Option<char> {
        self.peek_nth(0)
    }

    /// Return the character `n` positions ahead without consuming anything.
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    /// Whether the unconsumed input starts with the provided string.
    pub fn starts_with(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Give back the last `n` consumed characters.
    ///
    /// Panics if fewer than `n` characters have been consumed.
    pub fn backup(&mut self, n: usize) {
        assert!(n <= self.pos, "cannot back up past the start of the source");
        self.pos -= n;
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Offset of the next character, counted in characters.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Line of the next character, starting at 1.
    pub fn line(&self) -> u32 {
        self.location(self.pos).0
    }

    /// Column of the next character, starting at 1.
    pub fn column(&self) -> u32 {
        self.location(self.pos).1
    }

    /// Line and column of the character at the provided offset.
    pub fn location(&self, offset: usize) -> (u32, u32) {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = offset - self.line_starts[line_index];
        (line_index as u32 + 1, column as u32 + 1)
    }

    /// The text between two offsets.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    /// Up to `n` characters of unconsumed input, for error messages.
    pub fn trailing_context(&self, n: usize) -> String {
        let end = std::cmp::min(self.chars.len(), self.pos + n);
        self.slice(self.pos, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_and_columns() {
        let mut source = CharSource::new("ab\ncd");
        assert_eq!((source.line(), source.column()), (1, 1));
        source.next();
        source.next();
        assert_eq!((source.line(), source.column()), (1, 3));
        assert_eq!(source.next(), Some('\n'));
        assert_eq!((source.line(), source.column()), (2, 1));
        source.next();
        assert_eq!((source.line(), source.column()), (2, 2));
    }

    #[test]
    fn backup_restores_position() {
        let mut source = CharSource::new("x\ny");
        source.next();
        source.next();
        source.next();
        assert!(source.is_exhausted());
        source.backup(2);
        assert_eq!((source.line(), source.column()), (1, 2));
        assert_eq!(source.next(), Some('\n'));
    }

    #[test]
    fn starts_with_and_peek() {
        let mut source = CharSource::new("#[[x]]#");
        assert!(source.starts_with("#[["));
        assert!(!source.starts_with("#*"));
        source.next();
        assert_eq!(source.peek(), Some('['));
        assert_eq!(source.peek_nth(2), Some('x'));
        assert_eq!(source.peek_nth(10), None);
    }
}
