//! Execution substrate port
//!
//! The substrate runs one isolated build task to completion or failure on
//! its own schedule; the platform only ever submits. There is no
//! cancellation path and no completion callback here — the builder reports
//! progress over the log bus.

use async_trait::async_trait;

use crate::errors::BerthError;
use crate::models::deployment::Deployment;

mod http;
mod process;

pub use http::HttpRunner;
pub use process::ProcessRunner;

/// Default output directory produced by static site builds
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Everything a build task needs, expressed as the environment contract the
/// builder binary reads on startup
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub deployment_id: String,
    pub git_url: String,
    pub framework: Option<String>,
    pub install_command: Option<String>,
    pub build_command: Option<String>,
    pub output_dir: String,
}

impl BuildTask {
    pub fn for_deployment(deployment: &Deployment) -> Self {
        Self {
            deployment_id: deployment.id.clone(),
            git_url: deployment.source.git_url.clone(),
            framework: deployment.source.framework.clone(),
            install_command: deployment.source.install_command.clone(),
            build_command: deployment.source.build_command.clone(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }

    /// The task's environment, in submission order
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("DEPLOYMENT_ID".to_string(), self.deployment_id.clone()),
            ("GIT_REPOSITORY_URL".to_string(), self.git_url.clone()),
            ("OUTPUT_DIR".to_string(), self.output_dir.clone()),
        ];
        if let Some(framework) = &self.framework {
            env.push(("FRAMEWORK".to_string(), framework.clone()));
        }
        if let Some(install) = &self.install_command {
            env.push(("INSTALL_COMMAND".to_string(), install.clone()));
        }
        if let Some(build) = &self.build_command {
            env.push(("BUILD_COMMAND".to_string(), build.clone()));
        }
        env
    }
}

/// Substrate port: submit a task, learn nothing more
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Submit one build task. Success means the substrate accepted the
    /// task, not that the build started or finished.
    async fn submit(&self, task: &BuildTask) -> Result<(), BerthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::SourceRef;

    #[test]
    fn test_environment_includes_overrides() {
        let deployment = Deployment::new(
            "acme-site".to_string(),
            "acme site".to_string(),
            SourceRef {
                git_url: "https://github.com/acme/site".to_string(),
                framework: Some("react".to_string()),
                install_command: None,
                build_command: Some("npm run export".to_string()),
            },
        );

        let task = BuildTask::for_deployment(&deployment);
        let env = task.environment();

        assert!(env.contains(&("DEPLOYMENT_ID".to_string(), "acme-site".to_string())));
        assert!(env.contains(&("FRAMEWORK".to_string(), "react".to_string())));
        assert!(env.contains(&("BUILD_COMMAND".to_string(), "npm run export".to_string())));
        assert!(!env.iter().any(|(k, _)| k == "INSTALL_COMMAND"));
    }
}
