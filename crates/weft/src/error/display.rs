use super::TemplateError;
use crate::token::trace::SourceCodeTrace;
use weft_stdext::color::{ColoredString, Colorize};

pub fn format_error(f: &mut std::fmt::Formatter<'_>, err: &dyn TemplateError) -> std::fmt::Result {
    let line = PrimaryLine {
        source: err.trace(),
        title: err.title(),
        annotation: err.source_annotation(),
        notes: err.notes(),
    };
    write!(f, "{line}")
}

/// An error rendered as a header, the offending source line and notes.
///
/// Everything below the header hangs off a gutter wide enough for the line number:
///
/// ```text
/// Error: unexpected #end
///   >>> page.wft:2:3
///   |
/// 2 |   #end
///   |   ^^^^ no block to close
/// ```
#[derive(Debug)]
struct PrimaryLine<'a> {
    source: Option<&'a SourceCodeTrace>,
    title: String,
    annotation: String,
    notes: Vec<String>,
}

impl std::fmt::Display for PrimaryLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gutter = Gutter {
            width: self
                .source
                .map_or(1, |source| source.line_number.to_string().len()),
        };
        writeln!(
            f,
            "{}: {}",
            "Error".bright_red().bold(),
            self.title.as_str().bold()
        )?;
        if let Some(source) = self.source {
            gutter.write_trace(f, source, &self.annotation)?;
        }
        for note in &self.notes {
            let mut lines = note.trim_end().lines();
            let Some(first) = lines.next() else {
                continue;
            };
            gutter.write(f, "", Some('|'), "")?;
            gutter.write(f, "", Some('='), &format!("{} {first}", "note:".bold()))?;
            for line in lines {
                gutter.write(f, "", None, &format!("      {line}"))?;
            }
        }
        Ok(())
    }
}

/// The left column of an error message.
struct Gutter {
    width: usize,
}

impl Gutter {
    /// Write one line: `label` right aligned in the gutter, then the separator, then the content.
    fn write(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        label: &str,
        separator: Option<char>,
        content: &str,
    ) -> std::fmt::Result {
        let gutter = match separator {
            Some(c) => format!("{label:>width$} {c} ", width = self.width),
            None => format!("{label:>width$}   ", width = self.width),
        };
        writeln!(f, "{}{}", gutter.as_str().bright_cyan(), content)
    }

    fn write_trace(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        s: &SourceCodeTrace,
        annotation: &str,
    ) -> std::fmt::Result {
        writeln!(
            f,
            "{:width$}{} {}:{}:{}",
            "",
            ">>>".bright_cyan().bold(),
            s.origin,
            s.line_number,
            s.index + 1,
            width = self.width + 1,
        )?;
        self.write(f, "", Some('|'), "")?;
        let width = std::cmp::max(1, s.value.chars().count());
        self.write(
            f,
            &s.line_number.to_string(),
            Some('|'),
            &highlight_substring(&s.line_content, s.index, width),
        )?;
        self.write(
            f,
            "",
            Some('|'),
            &format!(
                "{}{} {}",
                " ".repeat(s.index),
                caret(width),
                annotation.bright_red().bold()
            ),
        )
    }
}

fn caret(width: usize) -> ColoredString {
    "^".repeat(width).as_str().bright_red().bold()
}

/// Bold the characters `start..start+length` of the line, counted in characters.
fn highlight_substring(line: &str, start: usize, length: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() < start + length {
        return line.trim_end().into();
    }
    let before: String = chars[..start].iter().collect();
    let middle: String = chars[start..start + length].iter().collect();
    let after: String = chars[start + length..].iter().collect();
    format![
        "{}{}{}",
        before,
        middle.as_str().bold(),
        after.trim_end(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::token::{Kind, Token};

    #[test]
    fn error_display_includes_source_line() {
        let token = Token::new(Kind::Directive, "#end", 2, 3);
        let err = ParseError::new("unexpected #end", &token)
            .with_note("there is no open block to close")
            .traced("page.wft", "first\n  #end\n");
        let s = format!("{err}");
        assert!(s.contains("unexpected #end"));
        assert!(s.contains("page.wft:2:3"));
        assert!(s.contains("^^^^"));
        assert!(s.contains("there is no open block to close"));
    }

    #[test]
    fn error_display_without_trace() {
        let err = crate::error::ResourceError::new("missing.wft", "not found");
        let s = format!("{err}");
        assert!(s.contains("missing.wft"));
        assert!(s.contains("not found"));
    }
}
