//! registry::traits
//!
//! Image registry client trait and the registry snapshot type.
//!
//! # Design
//!
//! The registry is queried as a whole: every query returns the complete set
//! of `(name, image id)` pairs owned by the caller. Snapshots are replaced
//! wholesale, never merged.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::ImageId;

/// Errors from registry queries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The query command could not be started.
    #[error("failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The query command exited unsuccessfully.
    #[error("registry query exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// The response was not in the expected format.
    #[error("failed to parse registry response: {0}")]
    Parse(String),

    /// A record in the response was invalid.
    #[error("invalid image record: {0}")]
    InvalidRecord(String),
}

/// A snapshot of the images in the registry, keyed by image name.
///
/// # Example
///
/// ```
/// use amitree::core::types::ImageId;
/// use amitree::registry::ImageRegistry;
///
/// let registry: ImageRegistry = [("base-2_ami".to_string(), ImageId::new("ami-1").unwrap())]
///     .into_iter()
///     .collect();
/// assert!(registry.contains("base-2_ami"));
/// assert_eq!(registry.get("base-2_ami").map(|id| id.as_str()), Some("ami-1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageRegistry {
    images: BTreeMap<String, ImageId>,
}

impl ImageRegistry {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an image with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    /// The id of the image with this name.
    pub fn get(&self, name: &str) -> Option<&ImageId> {
        self.images.get(name)
    }

    /// Add or replace an image.
    pub fn insert(&mut self, name: impl Into<String>, id: ImageId) {
        self.images.insert(name.into(), id);
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the snapshot holds no images.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Iterate over `(name, id)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageId)> {
        self.images.iter().map(|(name, id)| (name.as_str(), id))
    }
}

impl FromIterator<(String, ImageId)> for ImageRegistry {
    fn from_iter<I: IntoIterator<Item = (String, ImageId)>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

/// Query interface for the external image registry.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so they can be shared with the
/// async runtime.
#[async_trait]
pub trait ImageRegistryClient: Send + Sync {
    /// Get the client name (e.g., "aws", "mock").
    fn name(&self) -> &'static str;

    /// Fetch the complete current set of images owned by the caller.
    ///
    /// # Errors
    ///
    /// - `Spawn` / `CommandFailed` if the query could not be run
    /// - `Parse` / `InvalidRecord` if the response is malformed
    async fn fetch_images(&self) -> Result<ImageRegistry, RegistryError>;
}
