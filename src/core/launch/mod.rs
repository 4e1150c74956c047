pub mod types;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::core::endpoint::ServiceEndpoint;
use crate::core::transport::{ApiRequest, Transport, fetch_text};

pub use types::{
    Conflict, ConflictAction, LaunchOutcome, LaunchStatus, NegotiationState, RunningVm,
};
use types::ServiceReply;

pub const LAUNCH_SUBMITTED: &str = "Launch request submitted.";
pub const LAUNCH_CANCELLED: &str = "Launch cancelled.";
pub const SHUTDOWN_SUBMITTED: &str = "Host shutdown requested.";
pub const SHUTDOWN_CANCELLED: &str = "Host shutdown cancelled.";

/// Picks what happens to the running VM when the service reports a conflict.
///
/// Called at most once per negotiation, and only when the first reply is
/// `needs_action`.
pub trait ConflictResolver {
    fn resolve(&self, conflict: &Conflict) -> ConflictAction;
}

impl<F> ConflictResolver for F
where
    F: Fn(&Conflict) -> ConflictAction,
{
    fn resolve(&self, conflict: &Conflict) -> ConflictAction {
        self(conflict)
    }
}

/// A preset answer, for non-interactive use.
impl ConflictResolver for ConflictAction {
    fn resolve(&self, _conflict: &Conflict) -> ConflictAction {
        *self
    }
}

pub fn can_transition(from: NegotiationState, to: NegotiationState) -> bool {
    match from {
        NegotiationState::Start => to == NegotiationState::AwaitingFirstResponse,
        NegotiationState::AwaitingFirstResponse => matches!(
            to,
            NegotiationState::Done | NegotiationState::NeedsOperatorDecision
        ),
        NegotiationState::NeedsOperatorDecision => matches!(
            to,
            NegotiationState::Cancelled | NegotiationState::AwaitingSecondResponse
        ),
        NegotiationState::AwaitingSecondResponse => to == NegotiationState::Done,
        NegotiationState::Done | NegotiationState::Cancelled => false,
    }
}

/// `POST {base}/api/launch` for `vmid`, resolving a conflict through `resolver` if the
/// service asks for one.
pub async fn launch<R>(
    transport: &dyn Transport,
    endpoint: &ServiceEndpoint,
    vmid: u64,
    resolver: &R,
) -> LaunchOutcome
where
    R: ConflictResolver + ?Sized,
{
    let mut payload = Map::new();
    payload.insert("vmid".to_string(), json!(vmid));
    let request = NegotiatedRequest {
        subject: format!("launch of VM {}", vmid),
        url: endpoint.launch_url(),
        payload,
        submitted: LAUNCH_SUBMITTED,
        cancelled: LAUNCH_CANCELLED,
    };
    negotiate(transport, request, resolver).await
}

/// `POST {base}/api/host-shutdown`. Same conflict cycle as a launch: a running VM must be
/// dealt with before the host goes down.
pub async fn shutdown_host<R>(
    transport: &dyn Transport,
    endpoint: &ServiceEndpoint,
    resolver: &R,
) -> LaunchOutcome
where
    R: ConflictResolver + ?Sized,
{
    let request = NegotiatedRequest {
        subject: "host shutdown".to_string(),
        url: endpoint.host_shutdown_url(),
        payload: Map::new(),
        submitted: SHUTDOWN_SUBMITTED,
        cancelled: SHUTDOWN_CANCELLED,
    };
    negotiate(transport, request, resolver).await
}

struct NegotiatedRequest {
    subject: String,
    url: String,
    payload: Map<String, Value>,
    submitted: &'static str,
    cancelled: &'static str,
}

struct Negotiation<'a> {
    subject: &'a str,
    state: NegotiationState,
}

impl<'a> Negotiation<'a> {
    fn new(subject: &'a str) -> Self {
        Self {
            subject,
            state: NegotiationState::Start,
        }
    }

    fn advance(&mut self, to: NegotiationState) {
        debug_assert!(
            can_transition(self.state, to),
            "illegal negotiation transition {:?} -> {:?}",
            self.state,
            to
        );
        debug!("{}: {:?} -> {:?}", self.subject, self.state, to);
        self.state = to;
    }
}

async fn negotiate<R>(
    transport: &dyn Transport,
    request: NegotiatedRequest,
    resolver: &R,
) -> LaunchOutcome
where
    R: ConflictResolver + ?Sized,
{
    let NegotiatedRequest {
        subject,
        url,
        mut payload,
        submitted,
        cancelled,
    } = request;
    let mut negotiation = Negotiation::new(&subject);

    negotiation.advance(NegotiationState::AwaitingFirstResponse);
    let first_body = fetch_text(
        transport,
        &ApiRequest::post(url.clone(), Value::Object(payload.clone())),
    )
    .await;
    let first = ServiceReply::parse(&first_body);
    let first_status = first.status();
    debug!("{}: first reply status {:?}", subject, first.status);

    if first_status.is_terminal() {
        negotiation.advance(NegotiationState::Done);
        return finish(first, first_status, None, submitted, negotiation.state);
    }

    negotiation.advance(NegotiationState::NeedsOperatorDecision);
    let conflict = first.conflict();
    if let Some(running) = &conflict.running_vm {
        info!("{}: service reports {} still running", subject, running);
    }

    let action = resolver.resolve(&conflict);
    if action == ConflictAction::Cancel {
        negotiation.advance(NegotiationState::Cancelled);
        info!("{}: cancelled by operator", subject);
        return LaunchOutcome::cancelled(cancelled);
    }

    negotiation.advance(NegotiationState::AwaitingSecondResponse);
    info!("{}: resubmitting with action '{}'", subject, action);
    payload.insert("action".to_string(), json!(action.as_str()));
    let second_body = fetch_text(transport, &ApiRequest::post(url, Value::Object(payload))).await;
    let second = ServiceReply::parse(&second_body);

    let mut second_status = second.status();
    if second_status == LaunchStatus::NeedsAction {
        warn!(
            "{}: service asked for a decision again after '{}'; giving up",
            subject, action
        );
        second_status = LaunchStatus::Unknown;
    }

    negotiation.advance(NegotiationState::Done);
    finish(second, second_status, Some(action), submitted, negotiation.state)
}

fn finish(
    reply: ServiceReply,
    status: LaunchStatus,
    action: Option<ConflictAction>,
    submitted: &str,
    state: NegotiationState,
) -> LaunchOutcome {
    LaunchOutcome {
        status,
        message: reply.message_or(submitted),
        state,
        action,
        error: reply.error.filter(|e| !e.is_empty()),
    }
}

#[cfg(test)]
mod tests;
