//! registry
//!
//! Abstraction over the external image registry.
//!
//! # Architecture
//!
//! The [`ImageRegistryClient`] trait is the only way the orchestrator learns
//! which images exist. Queries always return the complete set of images
//! owned by the caller as an [`ImageRegistry`] snapshot.
//!
//! # Modules
//!
//! - `traits`: Core `ImageRegistryClient` trait and snapshot type
//! - [`aws`]: AWS CLI implementation (`aws ec2 describe-images`)
//! - [`mock`]: Mock implementation for deterministic testing

pub mod aws;
pub mod mock;
mod traits;

pub use traits::*;
