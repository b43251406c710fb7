//! Small algorithms and helpers used across the Weft crates.
//!
//! Nothing here knows about templates.
//! The modules are kept in a separate crate so that the engine, the testing library
//!     and the command line tool can share them without depending on each other.

pub mod algorithms;
pub mod color;
