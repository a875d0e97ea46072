//! Deployment records and slug handling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a deployment.
///
/// `status` is the only field that changes after creation. QUEUED is
/// persisted before the build task is submitted, so a crash between the two
/// leaves a detectably stuck record rather than an untracked running build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    NotStarted,
    Queued,
    InProgress,
    Ready,
    Failed,
}

impl DeploymentStatus {
    /// A build is considered live from queueing until a terminal event.
    pub fn is_live(&self) -> bool {
        matches!(self, DeploymentStatus::Queued | DeploymentStatus::InProgress)
    }
}

/// Where the deployment's sources come from and how to build them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Git repository URL
    pub git_url: String,

    /// Framework preset selecting default install/build commands
    pub framework: Option<String>,

    /// Explicit install command override
    pub install_command: Option<String>,

    /// Explicit build command override
    pub build_command: Option<String>,
}

/// One build-and-publish attempt.
///
/// `id` is the subdomain-safe slug: it keys the log channel, the
/// object-storage prefix and the edge-router subdomain, and is never reused
/// even after the deployment is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub source: SourceRef,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(id: String, name: String, source: SourceRef) -> Self {
        Self {
            id,
            name,
            source,
            status: DeploymentStatus::NotStarted,
            created_at: Utc::now(),
        }
    }
}

/// Minimum length for a human-chosen deployment name
pub const MIN_NAME_LEN: usize = 3;

/// Maximum slug length (DNS label limit)
pub const MAX_SLUG_LEN: usize = 63;

/// Reduce a human-chosen name to a subdomain-safe slug matching
/// `^[a-z0-9-]+$`. Returns an empty string when nothing usable remains.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }

    out.truncate(MAX_SLUG_LEN);
    out.trim_end_matches('-').to_string()
}

/// Generate a slug for a deployment created without a name
pub fn generated_slug() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("site-{}", &id[..8])
}

/// Append a short random suffix, used when the plain slug was retired by a
/// deleted deployment
pub fn suffixed_slug(slug: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let mut base = slug.to_string();
    base.truncate(MAX_SLUG_LEN - 5);
    format!("{}-{}", base.trim_end_matches('-'), &id[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme Site"), "acme-site");
        assert_eq!(slugify("acme-site"), "acme-site");
        assert_eq!(slugify("  My__Cool Site!  "), "my-cool-site");
    }

    #[test]
    fn test_slugify_charset() {
        let slug = slugify("Ünïcode & Friends 2024");
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!slug.starts_with('-'));
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_generated_slug_shape() {
        let slug = generated_slug();
        assert!(slug.starts_with("site-"));
        assert_eq!(slug.len(), "site-".len() + 8);
    }

    #[test]
    fn test_suffixed_slug_differs() {
        let a = suffixed_slug("acme-site");
        let b = suffixed_slug("acme-site");
        assert!(a.starts_with("acme-site-"));
        assert_ne!(a, b);
    }
}
