//! registry::aws
//!
//! Image registry backed by the AWS CLI.
//!
//! Runs
//!
//! ```text
//! aws ec2 describe-images --owners self \
//!     --query "Images[*].[Name,ImageId]" --output json
//! ```
//!
//! and parses the resulting JSON array of `[name, id]` pairs. Images
//! without a name cannot be referenced by the plan and are skipped.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::traits::{ImageRegistry, ImageRegistryClient, RegistryError};
use crate::core::types::ImageId;

const DESCRIBE_QUERY: &str = "Images[*].[Name,ImageId]";

/// Registry client shelling out to `aws ec2 describe-images`.
#[derive(Debug, Clone)]
pub struct AwsCliRegistry {
    binary: PathBuf,
    owners: Vec<String>,
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCliRegistry {
    /// Create a client using the given `aws` binary, owned by `self`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            owners: vec!["self".to_string()],
            region: None,
            profile: None,
        }
    }

    /// Query images owned by these accounts instead of `self`.
    pub fn with_owners(mut self, owners: Vec<String>) -> Self {
        if !owners.is_empty() {
            self.owners = owners;
        }
        self
    }

    /// Query a specific region.
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    /// Use a named CLI profile.
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Arguments passed to the `aws` binary.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["ec2", "describe-images", "--owners"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend(self.owners.iter().cloned());
        args.extend(
            ["--query", DESCRIBE_QUERY, "--output", "json"]
                .into_iter()
                .map(String::from),
        );
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }
}

#[async_trait]
impl ImageRegistryClient for AwsCliRegistry {
    fn name(&self) -> &'static str {
        "aws"
    }

    async fn fetch_images(&self) -> Result<ImageRegistry, RegistryError> {
        let args = self.args();
        debug!(binary = %self.binary.display(), ?args, "querying image registry");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| RegistryError::Spawn {
                command: self.binary.display().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RegistryError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let registry = parse_describe_images(&stdout)?;
        debug!(images = registry.len(), "registry snapshot fetched");
        Ok(registry)
    }
}

/// Parse the JSON output of `describe-images --query Images[*].[Name,ImageId]`.
///
/// # Example
///
/// ```
/// use amitree::registry::aws::parse_describe_images;
///
/// let registry = parse_describe_images(r#"[["base-2_ami", "ami-0a1"], [null, "ami-0b2"]]"#).unwrap();
/// assert_eq!(registry.len(), 1);
/// assert_eq!(registry.get("base-2_ami").unwrap().as_str(), "ami-0a1");
/// ```
pub fn parse_describe_images(json: &str) -> Result<ImageRegistry, RegistryError> {
    let records: Vec<(Option<String>, String)> =
        serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))?;

    records
        .into_iter()
        .filter_map(|(name, id)| name.map(|name| (name, id)))
        .map(|(name, id)| {
            ImageId::new(id)
                .map(|id| (name.clone(), id))
                .map_err(|e| RegistryError::InvalidRecord(format!("{name}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args() {
        let registry = AwsCliRegistry::new("aws");
        assert_eq!(
            registry.args(),
            vec![
                "ec2",
                "describe-images",
                "--owners",
                "self",
                "--query",
                "Images[*].[Name,ImageId]",
                "--output",
                "json",
            ]
        );
    }

    #[test]
    fn region_profile_and_owners() {
        let registry = AwsCliRegistry::new("aws")
            .with_owners(vec!["123456789012".into()])
            .with_region(Some("eu-west-1".into()))
            .with_profile(Some("images".into()));
        let args = registry.args();
        assert_eq!(&args[2..4], &["--owners", "123456789012"]);
        assert!(args.ends_with(&[
            "--region".to_string(),
            "eu-west-1".to_string(),
            "--profile".to_string(),
            "images".to_string(),
        ]));
    }

    #[test]
    fn empty_owner_list_keeps_self() {
        let registry = AwsCliRegistry::new("aws").with_owners(vec![]);
        assert_eq!(registry.args()[3], "self");
    }

    #[test]
    fn parses_pairs() {
        let registry =
            parse_describe_images(r#"[["a", "ami-1"], ["b", "ami-2"]]"#).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("b").unwrap().as_str(), "ami-2");
    }

    #[test]
    fn parses_empty_response() {
        assert!(parse_describe_images("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_response() {
        assert!(matches!(
            parse_describe_images("{\"Images\": []}"),
            Err(RegistryError::Parse(_))
        ));
        assert!(matches!(
            parse_describe_images(r#"[["a", ""]]"#),
            Err(RegistryError::InvalidRecord(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fetches_from_command_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("aws");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '[[\"base-1_ami\", \"ami-0123\"]]'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let registry = AwsCliRegistry::new(&script).fetch_images().await.unwrap();
        assert_eq!(registry.get("base-1_ami").unwrap().as_str(), "ami-0123");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_command_failure() {
        let registry = AwsCliRegistry::new("false");
        assert!(matches!(
            registry.fetch_images().await,
            Err(RegistryError::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn reports_missing_binary() {
        let registry = AwsCliRegistry::new("/nonexistent/amitree-test/aws");
        assert!(matches!(
            registry.fetch_images().await,
            Err(RegistryError::Spawn { .. })
        ));
    }
}
