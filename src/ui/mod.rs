//! ui
//!
//! User-facing output.
//!
//! # Design
//!
//! All human-readable output goes through [`output`] so the quiet and debug
//! flags are honoured in one place. Diagnostics for operators go through
//! `tracing` instead and end up on stderr.

pub mod output;
