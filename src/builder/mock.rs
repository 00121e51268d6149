//! builder::mock
//!
//! Mock image builder for deterministic testing.
//!
//! # Design
//!
//! The mock records every request it receives. It can be linked to a
//! [`MockRegistry`] so that successful builds register the new image, the
//! way a real Packer template registers the AMI it creates. Individual
//! targets can be configured to fail.
//!
//! # Example
//!
//! ```
//! use amitree::builder::mock::MockBuilder;
//! use amitree::builder::{BuildRequest, ImageBuilder};
//! use amitree::core::types::ImageId;
//! use amitree::registry::mock::MockRegistry;
//!
//! # tokio_test::block_on(async {
//! let registry = MockRegistry::new();
//! let builder = MockBuilder::registering_into(registry.clone());
//!
//! builder.build(&BuildRequest {
//!     target_name: "web-1_base-1_ami".to_string(),
//!     source_image: ImageId::new("ami-base").unwrap(),
//!     provisioner_path: "ami/base/web/provisioners/1.sh".to_string(),
//! }).await.unwrap();
//!
//! assert_eq!(builder.build_count(), 1);
//! assert!(registry.images().contains("web-1_base-1_ami"));
//! # });
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{BuildRequest, BuilderError, ImageBuilder};
use crate::registry::mock::MockRegistry;

/// Mock builder for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockBuilder {
    inner: Arc<Mutex<MockBuilderInner>>,
}

#[derive(Debug, Default)]
struct MockBuilderInner {
    /// Recorded requests, in call order.
    requests: Vec<BuildRequest>,
    /// Targets whose build fails.
    failing: BTreeSet<String>,
    /// Registry receiving successfully built images.
    registry: Option<MockRegistry>,
    /// Counter for generated image ids.
    next_id: u64,
}

impl MockBuilder {
    /// Create a mock builder that registers nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock builder that registers built images into `registry`.
    pub fn registering_into(registry: MockRegistry) -> Self {
        let builder = Self::new();
        builder.inner.lock().unwrap().registry = Some(registry);
        builder
    }

    /// Make builds of `target` fail.
    pub fn fail_on(self, target: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing
            .insert(target.to_string());
        self
    }

    /// All recorded requests, in call order.
    pub fn requests(&self) -> Vec<BuildRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Target names of all recorded requests, in call order.
    pub fn built_targets(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.target_name)
            .collect()
    }

    /// Number of recorded requests.
    pub fn build_count(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    /// Clear recorded requests.
    pub fn clear_requests(&self) {
        self.inner.lock().unwrap().requests.clear();
    }
}

#[async_trait]
impl ImageBuilder for MockBuilder {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn build(&self, request: &BuildRequest) -> Result<(), BuilderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request.clone());

        if inner.failing.contains(&request.target_name) {
            return Err(BuilderError::Failed {
                target: request.target_name.clone(),
                status: "exit status: 1".to_string(),
            });
        }

        inner.next_id += 1;
        let id = format!("ami-mock{:04}", inner.next_id);
        if let Some(registry) = &inner.registry {
            registry.register(&request.target_name, &id);
        }
        Ok(())
    }
}
