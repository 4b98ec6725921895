use crate::sandbox::Sandbox;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::path::Path;
use std::process::Output;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

lazy_static! {
    static ref DEPLOYMENT_URL: Regex =
        Regex::new(r"https?://[^\s]+\.vercel\.app").expect("deployment URL pattern is valid");
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Folder not found")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Deployed(String),
    Failed(String),
}

/// Result of one publish request. Not persisted anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub folder_name: String,
    pub outcome: DeploymentOutcome,
}

impl DeploymentRecord {
    pub fn deployed_url(&self) -> Option<&str> {
        match &self.outcome {
            DeploymentOutcome::Deployed(url) => Some(url),
            DeploymentOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub cli: String,
    pub token: Option<String>,
    pub install: bool,
    pub timeout: Duration,
}

/// Ships a folder under the storage root through the hosting CLI.
pub struct Publisher {
    sandbox: Arc<Sandbox>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(sandbox: Arc<Sandbox>, config: PublisherConfig) -> Self {
        Self { sandbox, config }
    }

    pub async fn publish(&self, folder_name: &str) -> Result<DeploymentRecord, PublishError> {
        let folder = self
            .sandbox
            .resolve(folder_name)
            .ok()
            .filter(|p| p.is_dir() && p.as_path() != self.sandbox.root())
            .ok_or_else(|| PublishError::NotFound(folder_name.to_string()))?;

        info!("Deploying folder: {}", folder.display());
        let start_time = Instant::now();
        let outcome = match self.deploy(&folder).await {
            Ok(stdout) => match extract_deployment_url(&stdout) {
                Some(url) => DeploymentOutcome::Deployed(url),
                None => {
                    warn!("No deployment URL in CLI output for '{}'", folder_name);
                    DeploymentOutcome::Failed("No deployment URL in CLI output".to_string())
                }
            },
            Err(reason) => {
                warn!("Failed to deploy '{}': {}", folder_name, reason);
                DeploymentOutcome::Failed(reason)
            }
        };
        info!(
            "Deployment of '{}' finished in {:.2?}: {:?}",
            folder_name,
            start_time.elapsed(),
            outcome
        );

        Ok(DeploymentRecord {
            folder_name: folder_name.to_string(),
            outcome,
        })
    }

    async fn deploy(&self, folder: &Path) -> Result<String, String> {
        if self.config.install {
            let mut install = Command::new("npm");
            install.args(["install", "-g", self.config.cli.as_str()]);
            self.run(install).await?;
        }

        let mut deploy = Command::new(&self.config.cli);
        deploy
            .arg("deploy")
            .arg(format!("--cwd={}", folder.display()))
            .arg("--prod")
            .arg("--yes");
        if let Some(token) = &self.config.token {
            deploy.arg(format!("--token={}", token));
        }

        let output = self.run(deploy).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("Deploy CLI output:\n{}", stdout);
        Ok(stdout)
    }

    async fn run(&self, mut command: Command) -> Result<Output, String> {
        let program = command.as_std().get_program().to_string_lossy().to_string();
        command.kill_on_drop(true);
        let output = tokio::time::timeout(self.config.timeout, command.output())
            .await
            .map_err(|_| format!("{} timed out after {:?}", program, self.config.timeout))?
            .map_err(|e| format!("failed to run {}: {}", program, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("Deploy CLI stderr: {}", stderr.trim());
        }
        if !output.status.success() {
            return Err(format!("{} exited with {}", program, output.status));
        }
        Ok(output)
    }
}

/// First hosting-provider URL in the CLI's output.
pub fn extract_deployment_url(stdout: &str) -> Option<String> {
    DEPLOYMENT_URL.find(stdout).map(|m| m.as_str().to_string())
}
