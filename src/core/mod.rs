//! core
//!
//! Core domain types, schemas, and operations for amitree.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Version, ImageId
//! - [`naming`] - Naming convention for composite image names
//! - [`tree`] - Inheritance tree and its incremental builder
//! - [`scan`] - Directory walk feeding the tree builder
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Exclusive project lock for build runs
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Tree construction and naming are deterministic

pub mod config;
pub mod lock;
pub mod naming;
pub mod scan;
pub mod tree;
pub mod types;
