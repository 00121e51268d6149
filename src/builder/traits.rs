//! builder::traits
//!
//! Image builder trait definition.
//!
//! # Design
//!
//! Building an image is a long-running external process. The trait is async
//! so the orchestrator can await it, but the orchestrator never runs two
//! builds at once: every call completes (and the registry is refreshed)
//! before the next step starts.
//!
//! A successful build is expected to register the new image in the
//! external registry under the requested target name.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::ImageId;

/// Errors from image builds.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuilderError {
    /// The builder process could not be started.
    #[error("failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The builder ran but reported failure.
    #[error("build of {target} failed: {status}")]
    Failed { target: String, status: String },
}

/// Everything the builder needs to produce one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Name to register the new image under.
    pub target_name: String,
    /// Registry id of the image to build from.
    pub source_image: ImageId,
    /// Provisioner script, relative to the project directory.
    pub provisioner_path: String,
}

/// The ImageBuilder trait for materializing images.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Get the builder name (e.g., "packer", "mock").
    fn name(&self) -> &'static str;

    /// Build one image, returning once the build has finished.
    ///
    /// # Errors
    ///
    /// - `Spawn` if the builder could not be started
    /// - `Failed` if the build did not succeed
    async fn build(&self, request: &BuildRequest) -> Result<(), BuilderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_error_display() {
        assert_eq!(
            BuilderError::Failed {
                target: "web-1_base-2_ami".into(),
                status: "exit status: 1".into(),
            }
            .to_string(),
            "build of web-1_base-2_ami failed: exit status: 1"
        );
        assert_eq!(
            BuilderError::Spawn {
                command: "packer".into(),
                message: "No such file or directory".into(),
            }
            .to_string(),
            "failed to run 'packer': No such file or directory"
        );
    }
}
