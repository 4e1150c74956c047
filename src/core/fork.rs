use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::core::endpoint::ServiceEndpoint;
use crate::core::inventory::extract_field;
use crate::core::launch::LaunchStatus;
use crate::core::launch::types::ServiceReply;
use crate::core::transport::{ApiRequest, Transport, fetch_text};

pub const FORK_SUBMITTED: &str = "Fork request submitted.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkOutcome {
    pub created: bool,
    pub new_vmid: Option<u64>,
    pub message: String,
    pub error: Option<String>,
}

/// `POST {base}/api/fork`: clones `vmid` under a new name. The service replies once the
/// clone shows up in its own listing.
pub async fn fork_vm(
    transport: &dyn Transport,
    endpoint: &ServiceEndpoint,
    vmid: u64,
    name: &str,
) -> ForkOutcome {
    let payload: Value = json!({ "vmid": vmid, "name": name });
    let body = fetch_text(transport, &ApiRequest::post(endpoint.fork_url(), payload)).await;
    let reply = ServiceReply::parse(&body);

    let created = reply.status() == LaunchStatus::Ok && reply.error.is_none();
    let new_vmid = extract_field(&body, "vmid").and_then(|id| id.parse::<u64>().ok());
    if created {
        info!("Forked VM {} as '{}' ({:?})", vmid, name, new_vmid);
    }

    ForkOutcome {
        created,
        new_vmid,
        message: reply.message_or(FORK_SUBMITTED),
        error: reply.error.filter(|e| !e.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::testing::ScriptedTransport;

    fn endpoint() -> ServiceEndpoint {
        ServiceEndpoint::parse("http://svc").unwrap()
    }

    #[tokio::test]
    async fn created_reply_reports_new_vmid() {
        let transport = ScriptedTransport::with_bodies(&[
            r#"{"status":"created","message":"VM fork created.","vmid":203}"#,
        ]);

        let outcome = fork_vm(&transport, &endpoint(), 101, "alpha-copy").await;

        assert!(outcome.created);
        assert_eq!(outcome.new_vmid, Some(203));
        assert_eq!(outcome.message, "VM fork created.");
        let requests = transport.requests();
        assert_eq!(requests[0].url, "http://svc/api/fork");
        assert_eq!(
            requests[0].body,
            Some(json!({ "vmid": 101, "name": "alpha-copy" }))
        );
    }

    #[tokio::test]
    async fn error_reply_is_not_created() {
        let transport = ScriptedTransport::with_bodies(&[
            r#"{"error":"Timed out waiting for VM 300 to appear"}"#,
        ]);

        let outcome = fork_vm(&transport, &endpoint(), 101, "x").await;

        assert!(!outcome.created);
        assert_eq!(outcome.new_vmid, None);
        assert_eq!(outcome.message, FORK_SUBMITTED);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Timed out waiting for VM 300 to appear")
        );
    }

    #[tokio::test]
    async fn transport_failure_is_not_created() {
        let transport = ScriptedTransport::new(&[None]);
        let outcome = fork_vm(&transport, &endpoint(), 1, "x").await;
        assert!(!outcome.created);
        assert_eq!(outcome.message, FORK_SUBMITTED);
    }
}
