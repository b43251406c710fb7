//! Algorithms

pub mod spellcheck;
