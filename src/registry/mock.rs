//! registry::mock
//!
//! In-memory registry for deterministic testing.
//!
//! # Example
//!
//! ```
//! use amitree::registry::mock::MockRegistry;
//! use amitree::registry::ImageRegistryClient;
//!
//! # tokio_test::block_on(async {
//! let registry = MockRegistry::with_images([("base-1_ami", "ami-1")]);
//! registry.register("web-1_base-1_ami", "ami-2");
//!
//! let snapshot = registry.fetch_images().await.unwrap();
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(registry.fetch_count(), 1);
//! # });
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{ImageRegistry, ImageRegistryClient, RegistryError};
use crate::core::types::ImageId;

/// Mock registry for testing.
///
/// Clones share state, so a test can keep a handle while the orchestrator
/// (or a [`MockBuilder`](crate::builder::mock::MockBuilder)) holds another.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    inner: Arc<Mutex<MockRegistryInner>>,
}

#[derive(Debug, Default)]
struct MockRegistryInner {
    images: ImageRegistry,
    fail_with: Option<RegistryError>,
    fetch_count: usize,
}

impl MockRegistry {
    /// Create an empty mock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock registry holding `(name, id)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if an id is not a valid [`ImageId`].
    pub fn with_images<'a>(images: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let registry = Self::new();
        for (name, id) in images {
            registry.register(name, id);
        }
        registry
    }

    /// Make every subsequent fetch fail with this error.
    pub fn fail_with(self, error: RegistryError) -> Self {
        self.inner.lock().unwrap().fail_with = Some(error);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_failure(&self) {
        self.inner.lock().unwrap().fail_with = None;
    }

    /// Add or replace an image.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid [`ImageId`].
    pub fn register(&self, name: &str, id: &str) {
        let id = ImageId::new(id).expect("mock image id must be valid");
        self.inner.lock().unwrap().images.insert(name, id);
    }

    /// Current contents, without counting as a fetch.
    pub fn images(&self) -> ImageRegistry {
        self.inner.lock().unwrap().images.clone()
    }

    /// Number of fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetch_count
    }
}

#[async_trait]
impl ImageRegistryClient for MockRegistry {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_images(&self) -> Result<ImageRegistry, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_count += 1;
        if let Some(error) = &inner.fail_with {
            return Err(error.clone());
        }
        Ok(inner.images.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_returns_snapshot_copy() {
        let registry = MockRegistry::with_images([("a", "ami-a")]);
        let snapshot = registry.fetch_images().await.unwrap();
        registry.register("b", "ami-b");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.images().len(), 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let registry = MockRegistry::new();
        let handle = registry.clone();
        handle.register("a", "ami-a");
        assert!(registry.fetch_images().await.unwrap().contains("a"));
        assert_eq!(handle.fetch_count(), 1);
    }

    #[tokio::test]
    async fn configured_failure() {
        let registry =
            MockRegistry::new().fail_with(RegistryError::Parse("broken".into()));
        assert_eq!(
            registry.fetch_images().await,
            Err(RegistryError::Parse("broken".into()))
        );

        registry.clear_failure();
        assert!(registry.fetch_images().await.is_ok());
        assert_eq!(registry.fetch_count(), 2);
    }
}
