//! Bus topic definitions
//!
//! One log topic and one status topic per deployment; the API server
//! subscribes with wildcards so no per-deployment setup is needed.

/// Bus topic patterns
pub struct Topics;

impl Topics {
    /// Log stream topic for a deployment
    pub fn logs(deployment_id: &str) -> String {
        format!("berth/logs/{}", deployment_id)
    }

    /// Status event topic for a deployment
    pub fn status(deployment_id: &str) -> String {
        format!("berth/status/{}", deployment_id)
    }

    /// Wildcard matching every deployment's log topic
    pub fn logs_wildcard() -> &'static str {
        "berth/logs/+"
    }

    /// Wildcard matching every deployment's status topic
    pub fn status_wildcard() -> &'static str {
        "berth/status/+"
    }

    /// Extract the deployment ID from a log or status topic
    pub fn parse_deployment_id(topic: &str) -> Option<String> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() == 3 && parts[0] == "berth" && (parts[1] == "logs" || parts[1] == "status") {
            Some(parts[2].to_string())
        } else {
            None
        }
    }

    /// Check if a topic carries log lines
    pub fn is_logs_topic(topic: &str) -> bool {
        topic.starts_with("berth/logs/")
    }

    /// Check if a topic carries status events
    pub fn is_status_topic(topic: &str) -> bool {
        topic.starts_with("berth/status/")
    }
}
