use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::EndpointConfig;
use crate::webhook::PushEvent;

/// One accepted push waiting for (or undergoing) command execution.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub event: PushEvent,
    pub endpoint: Arc<EndpointConfig>,
    pub received_at: DateTime<Utc>,
}

impl Job {
    pub fn new(event: PushEvent, endpoint: Arc<EndpointConfig>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            event,
            endpoint,
            received_at: Utc::now(),
        }
    }

    pub fn git_ref(&self) -> &str {
        &self.event.git_ref
    }

    pub fn repo_name(&self) -> &str {
        &self.endpoint.repo_name
    }
}
