//! Error handling
//!
//! Errors fall into four groups:
//!
//! - [LexicalError] and [ParseError], wrapped together in [CompileError]:
//!     the template source is malformed and the template is not compiled.
//! - Resolution misses, like an undefined variable or a division by zero.
//!     These are not errors at all: the expression evaluates to nothing,
//!     a [diagnostic](crate::render::diagnostics) is emitted and rendering continues.
//!     The only exception is [strict mode](crate::Config::strict), where an undefined reference
//!     becomes [RenderError::UndefinedReference].
//! - [InvocationError]: a getter or method of the data failed while it was running.
//! - Failures writing to the output, which abort the render.
//!
//! All errors implement [TemplateError], which is used to print them
//!     with the offending source line and a caret annotation.

use std::sync::Arc;

use crate::token::lexer::State;
use crate::token::trace::SourceCodeTrace;
use crate::token::Token;

pub mod display;

/// Implementations of this trait describe an error in a template.
pub trait TemplateError: std::fmt::Debug {
    fn title(&self) -> String;

    fn notes(&self) -> Vec<String> {
        vec![]
    }

    fn source_annotation(&self) -> String {
        "error occurred here".into()
    }

    fn trace(&self) -> Option<&SourceCodeTrace> {
        None
    }
}

macro_rules! display_via_format_error {
    ( $( $error_type: ty, )+ ) => {
        $(
            impl std::fmt::Display for $error_type {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    display::format_error(f, self)
                }
            }
        )+
    };
}

/// Error returned when no lexical rule matches the input.
#[derive(Debug, Clone)]
pub struct LexicalError {
    pub message: String,
    /// The lexical state the lexer was in.
    pub state: State,
    pub line: u32,
    pub column: u32,
    /// The input following the error position.
    pub context: String,
    pub trace: Option<SourceCodeTrace>,
}

impl LexicalError {
    pub fn new<T: Into<String>>(
        message: T,
        state: State,
        line: u32,
        column: u32,
        context: String,
    ) -> LexicalError {
        LexicalError {
            message: message.into(),
            state,
            line,
            column,
            context,
            trace: None,
        }
    }

    pub(crate) fn traced(mut self, origin: &str, source: &str) -> LexicalError {
        let value = self.context.chars().next().map(String::from).unwrap_or_default();
        self.trace = Some(SourceCodeTrace::new(
            origin,
            source,
            self.line,
            self.column,
            value,
        ));
        self
    }
}

impl TemplateError for LexicalError {
    fn title(&self) -> String {
        self.message.clone()
    }

    fn notes(&self) -> Vec<String> {
        vec![format!("the lexer was in the {:?} state", self.state)]
    }

    fn source_annotation(&self) -> String {
        "no lexical rule matches here".into()
    }

    fn trace(&self) -> Option<&SourceCodeTrace> {
        self.trace.as_ref()
    }
}

/// Error returned when the token stream does not match the grammar.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    /// The offending text.
    pub text: String,
    pub notes: Vec<String>,
    pub trace: Option<SourceCodeTrace>,
}

impl ParseError {
    pub fn new<T: Into<String>>(message: T, token: &Token) -> ParseError {
        ParseError {
            message: message.into(),
            line: token.line,
            column: token.column,
            text: token.text.clone(),
            notes: vec![],
            trace: None,
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> ParseError {
        self.notes.push(note.into());
        self
    }

    pub(crate) fn traced(mut self, origin: &str, source: &str) -> ParseError {
        self.trace = Some(SourceCodeTrace::new(
            origin,
            source,
            self.line,
            self.column,
            self.text.clone(),
        ));
        self
    }
}

impl TemplateError for ParseError {
    fn title(&self) -> String {
        self.message.clone()
    }

    fn notes(&self) -> Vec<String> {
        self.notes.clone()
    }

    fn source_annotation(&self) -> String {
        if self.text.is_empty() {
            "input ended here".into()
        } else {
            "unexpected token".into()
        }
    }

    fn trace(&self) -> Option<&SourceCodeTrace> {
        self.trace.as_ref()
    }
}

/// Error returned when a template fails to compile.
#[derive(Debug, Clone)]
pub enum CompileError {
    Lexical(LexicalError),
    Parse(ParseError),
}

impl CompileError {
    pub fn line(&self) -> u32 {
        match self {
            CompileError::Lexical(err) => err.line,
            CompileError::Parse(err) => err.line,
        }
    }

    pub fn column(&self) -> u32 {
        match self {
            CompileError::Lexical(err) => err.column,
            CompileError::Parse(err) => err.column,
        }
    }

    pub(crate) fn traced(self, origin: &str, source: &str) -> CompileError {
        match self {
            CompileError::Lexical(err) => CompileError::Lexical(err.traced(origin, source)),
            CompileError::Parse(err) => CompileError::Parse(err.traced(origin, source)),
        }
    }

    fn inner(&self) -> &dyn TemplateError {
        match self {
            CompileError::Lexical(err) => err,
            CompileError::Parse(err) => err,
        }
    }
}

impl From<LexicalError> for CompileError {
    fn from(err: LexicalError) -> Self {
        CompileError::Lexical(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl TemplateError for CompileError {
    fn title(&self) -> String {
        self.inner().title()
    }
    fn notes(&self) -> Vec<String> {
        self.inner().notes()
    }
    fn source_annotation(&self) -> String {
        self.inner().source_annotation()
    }
    fn trace(&self) -> Option<&SourceCodeTrace> {
        self.inner().trace()
    }
}

/// The cause of a failed getter or method invocation.
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by a getter or method of the data while it was running.
///
/// Failing to find a getter or method is not an invocation error;
///     it just makes the reference evaluate to nothing.
#[derive(Debug, Clone)]
pub struct InvocationError {
    /// Name of the getter or method that failed.
    pub accessor: String,
    /// Name of the type the accessor was invoked on.
    pub target_type: String,
    pub cause: Arc<dyn std::error::Error + Send + Sync>,
    pub trace: Option<SourceCodeTrace>,
}

impl InvocationError {
    pub fn new<A: Into<String>, T: Into<String>>(
        accessor: A,
        target_type: T,
        cause: Cause,
    ) -> InvocationError {
        InvocationError {
            accessor: accessor.into(),
            target_type: target_type.into(),
            cause: Arc::from(cause),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SourceCodeTrace) -> InvocationError {
        self.trace = Some(trace);
        self
    }
}

impl TemplateError for InvocationError {
    fn title(&self) -> String {
        format!(
            "invocation of `{}` on {} failed",
            self.accessor, self.target_type
        )
    }

    fn notes(&self) -> Vec<String> {
        vec![format!("cause: {}", self.cause)]
    }

    fn source_annotation(&self) -> String {
        "the failing accessor was invoked here".into()
    }

    fn trace(&self) -> Option<&SourceCodeTrace> {
        self.trace.as_ref()
    }
}

/// Error returned when a template or included resource cannot be loaded.
#[derive(Debug, Clone)]
pub struct ResourceError {
    pub name: String,
    pub message: String,
    pub trace: Option<SourceCodeTrace>,
}

impl ResourceError {
    pub fn new<N: Into<String>, M: Into<String>>(name: N, message: M) -> ResourceError {
        ResourceError {
            name: name.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SourceCodeTrace) -> ResourceError {
        self.trace = Some(trace);
        self
    }
}

impl TemplateError for ResourceError {
    fn title(&self) -> String {
        format!("failed to load resource `{}`", self.name)
    }

    fn notes(&self) -> Vec<String> {
        vec![self.message.clone()]
    }

    fn source_annotation(&self) -> String {
        "resource requested here".into()
    }

    fn trace(&self) -> Option<&SourceCodeTrace> {
        self.trace.as_ref()
    }
}

/// Error returned when rendering a template fails.
#[derive(Debug)]
pub enum RenderError {
    /// Writing to the output failed.
    Io(std::io::Error),
    Invocation(InvocationError),
    /// Macro calls nested deeper than [max_macro_depth](crate::Config::max_macro_depth).
    MacroDepth {
        name: String,
        limit: usize,
        trace: SourceCodeTrace,
    },
    /// `#parse` nested deeper than [max_parse_depth](crate::Config::max_parse_depth).
    ParseDepth {
        limit: usize,
        trace: SourceCodeTrace,
    },
    /// A `#foreach` ran more than [max_foreach_iterations](crate::Config::max_foreach_iterations) times.
    LoopLimit {
        limit: usize,
        trace: SourceCodeTrace,
    },
    Resource(ResourceError),
    /// A template loaded by `#parse` or `#evaluate` failed to compile.
    Compile(Box<CompileError>),
    /// An undefined reference in [strict mode](crate::Config::strict).
    UndefinedReference {
        reference: String,
        suggestion: Option<String>,
        trace: SourceCodeTrace,
    },
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<InvocationError> for RenderError {
    fn from(err: InvocationError) -> Self {
        RenderError::Invocation(err)
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<CompileError> for RenderError {
    fn from(err: CompileError) -> Self {
        RenderError::Compile(Box::new(err))
    }
}

impl TemplateError for RenderError {
    fn title(&self) -> String {
        match self {
            RenderError::Io(err) => format!("failed to write output: {err}"),
            RenderError::Invocation(err) => err.title(),
            RenderError::MacroDepth { name, .. } => {
                format!("macro calls nested too deeply while calling #{name}")
            }
            RenderError::ParseDepth { .. } => "#parse nested too deeply".into(),
            RenderError::LoopLimit { .. } => "#foreach ran too many iterations".into(),
            RenderError::Resource(err) => err.title(),
            RenderError::Compile(err) => err.title(),
            RenderError::UndefinedReference { reference, .. } => {
                format!("undefined reference {reference}")
            }
        }
    }

    fn notes(&self) -> Vec<String> {
        match self {
            RenderError::Io(_) => vec![],
            RenderError::Invocation(err) => err.notes(),
            RenderError::MacroDepth { limit, .. } => {
                vec![format!("the maximum macro call depth is {limit}")]
            }
            RenderError::ParseDepth { limit, .. } => {
                vec![format!("the maximum #parse depth is {limit}")]
            }
            RenderError::LoopLimit { limit, .. } => {
                vec![format!("the maximum number of iterations is {limit}")]
            }
            RenderError::Resource(err) => err.notes(),
            RenderError::Compile(err) => err.notes(),
            RenderError::UndefinedReference { suggestion, .. } => {
                let mut notes = vec!["strict mode is enabled".to_string()];
                if let Some(suggestion) = suggestion {
                    use weft_stdext::color::Colorize;
                    notes.push(format!["did you mean {}?", suggestion.as_str().bold()]);
                }
                notes
            }
        }
    }

    fn source_annotation(&self) -> String {
        match self {
            RenderError::Invocation(err) => err.source_annotation(),
            RenderError::Resource(err) => err.source_annotation(),
            RenderError::Compile(err) => err.source_annotation(),
            RenderError::UndefinedReference { .. } => "not defined".into(),
            _ => "error occurred here".into(),
        }
    }

    fn trace(&self) -> Option<&SourceCodeTrace> {
        match self {
            RenderError::Io(_) => None,
            RenderError::Invocation(err) => err.trace(),
            RenderError::MacroDepth { trace, .. }
            | RenderError::ParseDepth { trace, .. }
            | RenderError::LoopLimit { trace, .. }
            | RenderError::UndefinedReference { trace, .. } => Some(trace),
            RenderError::Resource(err) => err.trace(),
            RenderError::Compile(err) => err.trace(),
        }
    }
}

/// Any error returned by the [Engine](crate::Engine).
#[derive(Debug)]
pub enum Error {
    Compile(CompileError),
    Render(RenderError),
    Resource(ResourceError),
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Error::Compile(err)
    }
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        Error::Render(err)
    }
}

impl From<ResourceError> for Error {
    fn from(err: ResourceError) -> Self {
        Error::Resource(err)
    }
}

impl TemplateError for Error {
    fn title(&self) -> String {
        self.inner().title()
    }
    fn notes(&self) -> Vec<String> {
        self.inner().notes()
    }
    fn source_annotation(&self) -> String {
        self.inner().source_annotation()
    }
    fn trace(&self) -> Option<&SourceCodeTrace> {
        self.inner().trace()
    }
}

impl Error {
    fn inner(&self) -> &dyn TemplateError {
        match self {
            Error::Compile(err) => err,
            Error::Render(err) => err,
            Error::Resource(err) => err,
        }
    }
}

display_via_format_error!(
    LexicalError,
    ParseError,
    CompileError,
    InvocationError,
    ResourceError,
    RenderError,
    Error,
);

impl std::error::Error for LexicalError {}
impl std::error::Error for ParseError {}
impl std::error::Error for ResourceError {}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Lexical(err) => Some(err),
            CompileError::Parse(err) => Some(err),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(err) => Some(err),
            RenderError::Invocation(err) => Some(err),
            RenderError::Resource(err) => Some(err),
            RenderError::Compile(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Compile(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Resource(err) => Some(err),
        }
    }
}
