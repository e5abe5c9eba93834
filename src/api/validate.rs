//! Ordered request checks. The first failing check decides the response.

use axum::http::{HeaderMap, Method, header};

use crate::EndpointConfig;
use crate::error::RejectError;
use crate::signature::{self, SIGNATURE_HEADER, Signature, Verified};
use crate::webhook::{EVENT_HEADER, EventKind, PushEvent};

/// Outcome of the header checks, decided before any body bytes are read.
#[derive(Debug, PartialEq, Eq)]
pub enum Precheck {
    /// Acknowledge only, nothing to run.
    Ping,
    /// A push whose body still needs decoding and verifying.
    Push(Signature),
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `application/json`, optionally followed by parameters such as `; charset=utf-8`.
fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Method, event type, content type and signature syntax, in that order.
pub fn check_headers(method: &Method, headers: &HeaderMap) -> Result<Precheck, RejectError> {
    if method != Method::POST {
        return Err(RejectError::MethodNotAllowed);
    }

    let event = header_str(headers, EVENT_HEADER);
    match EventKind::from_header(event) {
        Some(EventKind::Push) => {}
        Some(EventKind::Ping) => return Ok(Precheck::Ping),
        None => return Err(RejectError::UnsupportedEvent(event.map(str::to_owned))),
    }

    if !is_json(header_str(headers, header::CONTENT_TYPE.as_str())) {
        return Err(RejectError::UnsupportedMediaType);
    }

    // The header must be well formed even when the endpoint has no secret.
    let signature = Signature::parse(header_str(headers, SIGNATURE_HEADER))?;
    Ok(Precheck::Push(signature))
}

/// JSON body (hashed on the way through), digest, then repository name.
pub fn check_push_body(
    signature: &Signature,
    body: &[u8],
    endpoint: &EndpointConfig,
    secret: Option<&[u8]>,
) -> Result<PushEvent, RejectError> {
    let event: PushEvent = match signature::decode_verified(body, secret, signature) {
        Verified::Ok(event) => event,
        Verified::Unparseable(e) => return Err(RejectError::MalformedJson(e)),
        Verified::Rejected(e) => return Err(e.into()),
    };

    if event.repository_name() != endpoint.repo_name {
        return Err(RejectError::RepositoryMismatch {
            got: event.repository_name().to_string(),
            want: endpoint.repo_name.clone(),
        });
    }

    Ok(event)
}
