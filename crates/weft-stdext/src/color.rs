//! Terminal coloring
//!
//! Weft uses the [Colored crate](https://docs.rs/colored/latest/colored/) to color
//!     error messages printed to a terminal.
//! Library users embedding the engine in a server usually don't want escape codes
//!     in their logs, so the dependency sits behind the `color` Cargo feature.
//!
//! This module contains a single trait [`Colorize`].
//! With the feature enabled every method forwards to the Colored crate;
//!     without it every method returns the string unchanged.
//! Downstream code calls the methods the same way in both cases:
//!
//! ```
//! use weft_stdext::color::Colorize;
//! println!["{}", "undefined macro".bold().bright_red()];
//! ```

#[cfg(feature = "color")]
pub type ColoredString = colored::ColoredString;

#[cfg(not(feature = "color"))]
pub type ColoredString = String;

macro_rules! colorize_impl {
    ( $( $method_name: ident, )+ ) => {
        /// Trait that provides coloring methods on strings.
        ///
        /// See the module documentation for information.
        pub trait Colorize {
            $(
                fn $method_name(self) -> ColoredString;
            )+
        }
        #[cfg(feature = "color")]
        impl Colorize for ColoredString {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self)
                }
            )+
        }
        #[cfg(feature = "color")]
        impl Colorize for &str {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self)
                }
            )+
        }
        #[cfg(not(feature = "color"))]
        impl Colorize for &str {
            $(
                fn $method_name(self) -> ColoredString {
                    self.to_string()
                }
            )+
        }
        #[cfg(not(feature = "color"))]
        impl Colorize for String {
            $(
                fn $method_name(self) -> ColoredString {
                    self
                }
            )+
        }
    };
}

colorize_impl!(
    bold,
    bright_cyan,
    bright_red,
    bright_yellow,
    dimmed,
    yellow,
);
