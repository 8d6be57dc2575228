//! File helpers shared by the built-in stages and the verifier.
//!
//! - [`jsonl`]: typed JSON Lines read/write (intermediate stage output)
//! - [`csv`]: typed CSV read/write (final output)
//! - [`files`]: regular-file listing and output directory creation

pub mod csv;
pub mod files;
pub mod jsonl;
