//! amitree - Build machine images in inheritance order
//!
//! amitree reads a directory tree whose nesting encodes which image is built
//! from which, compiles it into an ordered build plan, and drives Packer so
//! that every image is built only once the image it derives from exists in
//! the EC2 registry.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Plan compilation and build orchestration
//! - [`core`] - Domain types, naming, tree construction, config, locking
//! - [`builder`] - Abstraction over the image builder (Packer)
//! - [`registry`] - Abstraction over the image registry (EC2 via the AWS CLI)
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! amitree maintains the following invariants:
//!
//! 1. Every step in a plan comes after the step that produces its source
//! 2. An image is never built while an image of the same name is registered
//! 3. An image is never built before its source image is registered
//! 4. Only one build run touches a project at a time

pub mod builder;
pub mod cli;
pub mod core;
pub mod engine;
pub mod registry;
pub mod ui;
