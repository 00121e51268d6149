//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Version`] - Provisioner script version number
//! - [`ImageId`] - Opaque registry identifier for a built image
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use amitree::core::types::{ImageId, Version};
//!
//! let version: Version = "12".parse().unwrap();
//! assert_eq!(version.get(), 12);
//!
//! let id = ImageId::new("ami-0abc1234").unwrap();
//! assert_eq!(id.as_str(), "ami-0abc1234");
//!
//! assert!("+3".parse::<Version>().is_err());
//! assert!(ImageId::new("").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid image id: {0}")]
    InvalidImageId(String),
}

/// A provisioner script version.
///
/// Versions are non-negative integers written in plain decimal digits.
/// Signs, whitespace and empty strings are rejected even where
/// `u64::from_str` would accept them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Wrap a raw version number.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl FromStr for Version {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(TypeError::InvalidVersion(format!(
                "'{s}' is not a non-negative integer"
            )));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| TypeError::InvalidVersion(format!("'{s}': {e}")))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque image identifier returned by the image registry.
///
/// The identifier is never interpreted; it is only handed back to the
/// image builder as the source of a new image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    /// Create a validated image identifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidImageId` if the id is empty or contains
    /// whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidImageId("image id cannot be empty".into()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidImageId(format!(
                "image id '{id}' cannot contain whitespace"
            )));
        }
        Ok(Self(id))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImageId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
