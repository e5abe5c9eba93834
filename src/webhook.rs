//! Webhook payload structures

use serde::Deserialize;

pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Event kinds the server acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Push,
    /// Sent by the hosting service when a webhook is created or tested.
    Ping,
}

impl EventKind {
    pub fn from_header(value: Option<&str>) -> Option<Self> {
        match value? {
            "push" => Some(EventKind::Push),
            "ping" => Some(EventKind::Ping),
            _ => None,
        }
    }
}

/// The part of a push payload needed to pick and run a command.
/// Other fields are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
}

impl PushEvent {
    pub fn repository_name(&self) -> &str {
        &self.repository.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_from_header() {
        assert_eq!(EventKind::from_header(Some("push")), Some(EventKind::Push));
        assert_eq!(EventKind::from_header(Some("ping")), Some(EventKind::Ping));
        assert_eq!(EventKind::from_header(Some("issues")), None);
        assert_eq!(EventKind::from_header(Some("Push")), None);
        assert_eq!(EventKind::from_header(None), None);
    }

    #[test]
    fn parses_push_payload_ignoring_extra_fields() {
        let body = r#"{
            "ref": "refs/heads/dev",
            "after": "abc123",
            "repository": {"name": "site", "full_name": "acme/site", "private": false}
        }"#;
        let event: PushEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.git_ref, "refs/heads/dev");
        assert_eq!(event.repository_name(), "site");
    }

    #[test]
    fn missing_repository_name_fails() {
        let body = r#"{"ref": "refs/heads/dev", "repository": {}}"#;
        assert!(serde_json::from_str::<PushEvent>(body).is_err());
    }
}
