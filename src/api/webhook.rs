//! Per-endpoint webhook handler

use axum::{
    body::{self, Body},
    extract::State as AxumState,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::EndpointConfig;
use crate::api::validate::{Precheck, check_headers, check_push_body};
use crate::error::RejectError;
use crate::job::Job;
use crate::queue::{JobSender, SubmitError};
use crate::webhook::PushEvent;

/// Push payloads are capped at 25 MB by the hosting service.
pub const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Handler state for one configured URL path.
#[derive(Debug)]
pub struct Dispatcher {
    path: String,
    endpoint: Arc<EndpointConfig>,
    secret: Option<Vec<u8>>,
    jobs: JobSender,
}

pub type SharedDispatcher = Arc<Dispatcher>;

impl Dispatcher {
    pub fn new(path: impl Into<String>, endpoint: EndpointConfig, jobs: JobSender) -> Self {
        let secret = endpoint.secret_bytes();
        Self {
            path: path.into(),
            endpoint: Arc::new(endpoint),
            secret,
            jobs,
        }
    }

    /// Validate one request and, if it is an acceptable push, queue a job.
    ///
    /// Header checks run before the body is read, so a ping or a request
    /// rejected on its headers is answered whatever its body size.
    pub async fn dispatch(&self, method: &Method, headers: &HeaderMap, body: Body) -> Response {
        let event = match self.accept(method, headers, body).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!(path = %self.path, "Ping event received");
                return StatusCode::OK.into_response();
            }
            Err(reject) => {
                self.log_rejection(&reject);
                return reject.into_response();
            }
        };

        let job = Job::new(event, Arc::clone(&self.endpoint));
        let job_id = job.id.clone();
        let git_ref = job.git_ref().to_string();

        match self.jobs.submit(job) {
            Ok(()) => {
                info!(
                    job_id = %job_id,
                    repo = %self.endpoint.repo_name,
                    git_ref = %git_ref,
                    pending = self.jobs.pending(),
                    "Queued job"
                );
                (StatusCode::OK, format!("{}\n", job_id)).into_response()
            }
            Err(SubmitError::Full(_)) => {
                warn!(
                    repo = %self.endpoint.repo_name,
                    git_ref = %git_ref,
                    capacity = self.jobs.capacity(),
                    "Buffer spillover, dropping job"
                );
                RejectError::Spillover.into_response()
            }
            Err(SubmitError::Closed(_)) => {
                error!(repo = %self.endpoint.repo_name, "Job queue closed, executor is gone");
                RejectError::QueueClosed.into_response()
            }
        }
    }

    /// `Ok(None)` for a ping, `Ok(Some(_))` for a push that passed every check.
    async fn accept(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<Option<PushEvent>, RejectError> {
        let signature = match check_headers(method, headers)? {
            Precheck::Ping => return Ok(None),
            Precheck::Push(signature) => signature,
        };
        let bytes = body::to_bytes(body, MAX_PAYLOAD_BYTES)
            .await
            .map_err(RejectError::UnreadableBody)?;
        check_push_body(&signature, &bytes, &self.endpoint, self.secret.as_deref()).map(Some)
    }

    fn log_rejection(&self, reject: &RejectError) {
        match reject {
            RejectError::MalformedJson(e) => {
                warn!(path = %self.path, "Malformed json: {}", e)
            }
            RejectError::RepositoryMismatch { got, want } => warn!(
                path = %self.path,
                "Repository names mismatch: got {:?}, want {:?}",
                got,
                want
            ),
            RejectError::UnreadableBody(e) => {
                warn!(path = %self.path, "Could not read body: {}", e)
            }
            RejectError::Signature(e) => warn!(path = %self.path, "Rejected request: {}", e),
            RejectError::UnsupportedEvent(event) => {
                info!(path = %self.path, "Unsupported event type {:?}", event)
            }
            other => debug!(path = %self.path, "Rejected request: {}", other),
        }
    }
}

/// Handles every method on a configured path; non-POST gets 405.
pub async fn handle_webhook(
    AxumState(dispatcher): AxumState<SharedDispatcher>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    dispatcher.dispatch(&method, &headers, body).await
}
