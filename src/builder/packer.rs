//! builder::packer
//!
//! Image builder backed by HashiCorp Packer.
//!
//! Each build runs
//!
//! ```text
//! packer build -var ami_name=<target> -var source_ami=<source id> \
//!     -var provisioner_script=<absolute script path> [-var k=v ...] <template>
//! ```
//!
//! in the project directory, with Packer's output streamed straight to the
//! terminal. The template is expected to register the image under
//! `ami_name`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::traits::{BuildRequest, BuilderError, ImageBuilder};

/// Default Packer template, relative to the project directory.
pub const DEFAULT_TEMPLATE: &str = "ami_build.pkr.hcl";

/// Builder shelling out to `packer build`.
#[derive(Debug, Clone)]
pub struct PackerBuilder {
    binary: PathBuf,
    template: PathBuf,
    project_dir: PathBuf,
    extra_vars: BTreeMap<String, String>,
}

impl PackerBuilder {
    /// Create a builder running `binary` with `template` in `project_dir`.
    pub fn new(
        binary: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            template: template.into(),
            project_dir: project_dir.into(),
            extra_vars: BTreeMap::new(),
        }
    }

    /// Pass additional `-var key=value` pairs to every build.
    pub fn with_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.extra_vars = vars;
        self
    }

    /// Arguments passed to the `packer` binary for a request.
    pub fn args(&self, request: &BuildRequest) -> Vec<String> {
        let script = self.project_dir.join(&request.provisioner_path);
        let mut vars = vec![
            format!("ami_name={}", request.target_name),
            format!("source_ami={}", request.source_image),
            format!("provisioner_script={}", script.display()),
        ];
        vars.extend(self.extra_vars.iter().map(|(k, v)| format!("{k}={v}")));

        let mut args = vec!["build".to_string()];
        for var in vars {
            args.push("-var".to_string());
            args.push(var);
        }
        args.push(self.template.display().to_string());
        args
    }
}

#[async_trait]
impl ImageBuilder for PackerBuilder {
    fn name(&self) -> &'static str {
        "packer"
    }

    async fn build(&self, request: &BuildRequest) -> Result<(), BuilderError> {
        let args = self.args(request);
        info!(
            target_name = %request.target_name,
            source = %request.source_image,
            provisioner = %request.provisioner_path,
            "running packer build"
        );
        debug!(binary = %self.binary.display(), ?args, "packer invocation");

        let status = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.project_dir)
            .status()
            .await
            .map_err(|e| BuilderError::Spawn {
                command: self.binary.display().to_string(),
                message: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BuilderError::Failed {
                target: request.target_name.clone(),
                status: status.to_string(),
            })
        }
    }
}
