use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::inventory::extract::{FirstWins, field_text};
use crate::core::inventory::{UNNAMED_VM, extract_field};

/// Resolution the operator picks for the VM that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    Shutdown,
    Hibernate,
    Terminate,
    Cancel,
}

impl ConflictAction {
    /// Actions that lead to a second request, in prompt order.
    pub const RESOLVING: [ConflictAction; 3] = [
        ConflictAction::Shutdown,
        ConflictAction::Hibernate,
        ConflictAction::Terminate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConflictAction::Shutdown => "shutdown",
            ConflictAction::Hibernate => "hibernate",
            ConflictAction::Terminate => "terminate",
            ConflictAction::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shutdown" => Some(ConflictAction::Shutdown),
            "hibernate" => Some(ConflictAction::Hibernate),
            "terminate" => Some(ConflictAction::Terminate),
            "cancel" => Some(ConflictAction::Cancel),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConflictAction::Shutdown => "Shutdown",
            ConflictAction::Hibernate => "Hibernate",
            ConflictAction::Terminate => "Terminate",
            ConflictAction::Cancel => "Cancel",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConflictAction::Shutdown => "ask the guest to power off cleanly",
            ConflictAction::Hibernate => "suspend the guest to disk",
            ConflictAction::Terminate => "stop the guest immediately",
            ConflictAction::Cancel => "leave it running and abort",
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a negotiated request, normalized from the service's open-ended string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    Ok,
    NeedsAction,
    Error,
    Unknown,
    Cancelled,
}

impl LaunchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LaunchStatus::Ok => "ok",
            LaunchStatus::NeedsAction => "needs_action",
            LaunchStatus::Error => "error",
            LaunchStatus::Unknown => "unknown",
            LaunchStatus::Cancelled => "cancelled",
        }
    }

    /// Only the exact literal `needs_action` keeps a negotiation open.
    /// Padding or case changes make it terminal. The other literals are matched loosely.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return LaunchStatus::Unknown;
        };
        if raw == "needs_action" {
            return LaunchStatus::NeedsAction;
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" | "started" | "updated" | "already_running" | "created" => LaunchStatus::Ok,
            "cancelled" | "canceled" => LaunchStatus::Cancelled,
            "error" | "failed" => LaunchStatus::Error,
            _ => LaunchStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != LaunchStatus::NeedsAction
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningVm {
    pub vmid: u64,
    pub name: String,
}

impl fmt::Display for RunningVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.vmid)
    }
}

/// What the service said when it asked for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conflict {
    pub running_vm: Option<RunningVm>,
    pub allowed_actions: Vec<ConflictAction>,
    pub message: Option<String>,
}

impl Conflict {
    /// Resolving actions to offer. Falls back to all three when the service did not say.
    pub fn choices(&self) -> Vec<ConflictAction> {
        let offered: Vec<ConflictAction> = self
            .allowed_actions
            .iter()
            .copied()
            .filter(|action| *action != ConflictAction::Cancel)
            .collect();
        if offered.is_empty() {
            ConflictAction::RESOLVING.to_vec()
        } else {
            offered
        }
    }
}

/// Where a negotiation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    Start,
    AwaitingFirstResponse,
    NeedsOperatorDecision,
    AwaitingSecondResponse,
    Done,
    Cancelled,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Done | NegotiationState::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchOutcome {
    pub status: LaunchStatus,
    pub message: String,
    pub state: NegotiationState,
    pub action: Option<ConflictAction>,
    pub error: Option<String>,
}

impl LaunchOutcome {
    pub(crate) fn cancelled(message: &str) -> Self {
        Self {
            status: LaunchStatus::Cancelled,
            message: message.to_string(),
            state: NegotiationState::Cancelled,
            action: Some(ConflictAction::Cancel),
            error: None,
        }
    }

    /// True when the negotiation reached `Done`, i.e. the service acted on it.
    pub fn reached_service(&self) -> bool {
        self.state == NegotiationState::Done
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == NegotiationState::Cancelled
    }
}

/// Fields the negotiation reads out of one service reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ServiceReply {
    pub status: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub running_vm: Option<RunningVm>,
    pub allowed_actions: Vec<ConflictAction>,
}

impl ServiceReply {
    pub(crate) fn parse(body: &str) -> Self {
        match serde_json::from_str::<FirstWins>(body) {
            Ok(FirstWins(Value::Object(map))) => Self::from_map(&map),
            _ => Self {
                status: extract_field(body, "status"),
                message: extract_field(body, "message"),
                error: extract_field(body, "error"),
                ..Self::default()
            },
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let text = |key: &str| map.get(key).and_then(field_text);
        let running_vm = map
            .get("running_vm")
            .and_then(Value::as_object)
            .and_then(|vm| {
                Some(RunningVm {
                    vmid: vm.get("vmid")?.as_u64()?,
                    name: vm
                        .get("name")
                        .and_then(Value::as_str)
                        .filter(|name| !name.is_empty())
                        .unwrap_or(UNNAMED_VM)
                        .to_string(),
                })
            });
        let allowed_actions = map
            .get("allowed_actions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(ConflictAction::parse)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            status: text("status"),
            message: text("message"),
            error: text("error"),
            running_vm,
            allowed_actions,
        }
    }

    pub(crate) fn status(&self) -> LaunchStatus {
        LaunchStatus::normalize(self.status.as_deref().filter(|s| !s.is_empty()))
    }

    pub(crate) fn conflict(&self) -> Conflict {
        Conflict {
            running_vm: self.running_vm.clone(),
            allowed_actions: self.allowed_actions.clone(),
            message: self.message.clone(),
        }
    }

    pub(crate) fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}
