//! Root extraction for references.
//!
//! The leading token of a reference is its marker, `$`, `$!`, `${` or `$!{`,
//!     together with any run of backslashes in front of it.
//! Everything the renderer needs to know about how to print the reference is derived from
//!     that text once, when the template is compiled, and stored in a [ReferenceRoot].

use crate::token::is_escaped;

/// How a reference is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The reference is evaluated.
    Live,
    /// The reference is preceded by an escaping backslash run and printed literally.
    Escaped,
    /// The text looked like a reference but has no `$` marker; it is plain text.
    Runt,
}

/// Flavor of a reference.
///
/// Quiet and formal combine freely with each other and with the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flavor {
    pub mode: Mode,
    /// `$!name`: prints nothing when the value is absent.
    pub quiet: bool,
    /// `${name}`.
    pub formal: bool,
}

impl Flavor {
    pub fn is_plain(&self) -> bool {
        self.mode == Mode::Live && !self.quiet && !self.formal
    }
}

/// Facts about a reference fixed when the template is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRoot {
    /// The first identifier of the reference.
    pub name: String,
    pub flavor: Flavor,
    /// Literal backslashes printed in front of the reference.
    pub prefix: String,
    /// The spelling of the reference without its backslash run.
    ///
    /// This is printed when the reference is escaped or has no value.
    pub literal: String,
}

impl ReferenceRoot {
    /// Derive the root of a reference.
    ///
    /// `leading` is the literal of the reference's first token including its backslash run,
    ///     and `literal` is the literal of the whole reference.
    pub fn extract(name: &str, leading: &str, literal: &str) -> ReferenceRoot {
        let dollar = match leading.find('$') {
            None => {
                return ReferenceRoot {
                    name: name.to_string(),
                    flavor: Flavor {
                        mode: Mode::Runt,
                        quiet: false,
                        formal: false,
                    },
                    prefix: String::new(),
                    literal: literal.to_string(),
                }
            }
            Some(i) => i,
        };
        let num_backslashes = leading[..dollar]
            .chars()
            .rev()
            .take_while(|c| *c == '\\')
            .count();
        let marker = &leading[dollar..];
        let flavor = Flavor {
            mode: if is_escaped(num_backslashes) {
                Mode::Escaped
            } else {
                Mode::Live
            },
            quiet: marker.starts_with("$!"),
            formal: marker.contains('{'),
        };
        let literal = match literal.find('$') {
            Some(i) => &literal[i..],
            None => literal,
        };
        ReferenceRoot {
            name: name.to_string(),
            flavor,
            prefix: "\\".repeat(num_backslashes / 2),
            literal: literal.to_string(),
        }
    }

    /// The text to print when the reference has no value.
    pub fn absent_text(&self) -> String {
        match self.flavor.mode {
            Mode::Runt => self.literal.clone(),
            Mode::Escaped => format!("{}\\{}", self.prefix, self.literal),
            Mode::Live if self.flavor.quiet => self.prefix.clone(),
            Mode::Live => format!("{}{}", self.prefix, self.literal),
        }
    }

    /// The text to print when the reference has a value with the provided text.
    pub fn present_text(&self, value: &str) -> String {
        match self.flavor.mode {
            Mode::Runt => self.literal.clone(),
            Mode::Escaped => format!("{}{}", self.prefix, self.literal),
            Mode::Live => format!("{}{}", self.prefix, value),
        }
    }
}
