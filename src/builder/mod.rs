//! builder
//!
//! Abstraction over the external image builder.
//!
//! # Architecture
//!
//! The orchestrator only ever talks to the [`ImageBuilder`] trait. The
//! Packer implementation is selected by the CLI; tests inject the mock.
//!
//! # Modules
//!
//! - `traits`: Core `ImageBuilder` trait and request type
//! - [`packer`]: Packer implementation (`packer build`)
//! - [`mock`]: Mock implementation for deterministic testing

pub mod mock;
pub mod packer;
mod traits;

pub use traits::*;
