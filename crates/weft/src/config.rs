//! Engine configuration.

use std::path::PathBuf;

/// Configuration of an [Engine](crate::Engine).
///
/// With the `serde` feature the configuration can be deserialized; missing fields
///     take their default values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Config {
    /// Make undefined references an error instead of rendering their literal text.
    pub strict: bool,
    /// Maximum nesting of macro calls.
    pub max_macro_depth: usize,
    /// Maximum nesting of `#parse`.
    pub max_parse_depth: usize,
    /// Maximum number of iterations of a single `#foreach`; unlimited if unset.
    pub max_foreach_iterations: Option<usize>,
    /// Maximum number of elements of a range literal that is turned into a list.
    ///
    /// `#foreach` steps through a range literal without building the list, so this
    ///     does not apply to ranges iterated directly.
    pub max_range_length: usize,
    /// Share resolved accessors between renders of the same template.
    pub shared_accessor_cache: bool,
    /// Keep templates loaded by name so they are only compiled once.
    pub cache_templates: bool,
    /// Directory the default resource loader reads templates from.
    pub template_root: Option<PathBuf>,
    /// Interpolate references and directives inside double quoted string literals.
    pub interpolate_string_literals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strict: false,
            max_macro_depth: 20,
            max_parse_depth: 10,
            max_foreach_iterations: None,
            max_range_length: 1 << 20,
            shared_accessor_cache: false,
            cache_templates: true,
            template_root: None,
            interpolate_string_literals: true,
        }
    }
}

impl Config {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_max_macro_depth(mut self, max_macro_depth: usize) -> Self {
        self.max_macro_depth = max_macro_depth;
        self
    }

    pub fn with_max_parse_depth(mut self, max_parse_depth: usize) -> Self {
        self.max_parse_depth = max_parse_depth;
        self
    }

    pub fn with_max_foreach_iterations(mut self, max: Option<usize>) -> Self {
        self.max_foreach_iterations = max;
        self
    }

    pub fn with_max_range_length(mut self, max_range_length: usize) -> Self {
        self.max_range_length = max_range_length;
        self
    }

    pub fn with_shared_accessor_cache(mut self, shared: bool) -> Self {
        self.shared_accessor_cache = shared;
        self
    }

    pub fn with_cache_templates(mut self, cache: bool) -> Self {
        self.cache_templates = cache;
        self
    }

    pub fn with_template_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.template_root = Some(root.into());
        self
    }

    pub fn with_interpolate_string_literals(mut self, interpolate: bool) -> Self {
        self.interpolate_string_literals = interpolate;
        self
    }
}
