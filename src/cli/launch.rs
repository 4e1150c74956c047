use anyhow::{Result, bail};

use crate::cli::list::print_inventory;
use crate::cli::prompt::PromptResolver;
use crate::cli::{parse_action_flag, parse_vmid_arg};
use crate::core::launch::{ConflictAction, ConflictResolver, LaunchOutcome, LaunchStatus};
use crate::core::session::VmSession;
use crate::core::terminal::{print_error, print_info, print_step, print_success, print_warn};
use crate::core::transport::Transport;

pub async fn run_launch<T: Transport>(session: &mut VmSession<T>, args: &[String]) -> Result<()> {
    let Some(vmid) = parse_vmid_arg(args) else {
        bail!("Usage: vm-launcher launch <vmid> [--action <action>]");
    };
    let preset = match parse_action_flag(args) {
        Ok(preset) => preset,
        Err(raw) => bail!(
            "Unknown action '{}'. Expected shutdown, hibernate, terminate or cancel.",
            raw
        ),
    };

    session.refresh().await;
    match session.find(vmid) {
        Some(vm) => print_step(&format!("Launching {}", vm)),
        None => {
            print_warn(&format!(
                "VM {} is not in the current inventory; asking the server anyway.",
                vmid
            ));
            print_step(&format!("Launching VM {}", vmid));
        }
    }

    let resolver = preset_or_prompt(preset);
    let outcome = session.launch(vmid, &*resolver).await;
    report_outcome(&outcome);
    if outcome.reached_service() {
        print_inventory(session);
    }
    Ok(())
}

/// Prints one negotiation result the same way for launches and host shutdowns.
pub(crate) fn report_outcome(outcome: &LaunchOutcome) {
    if let Some(action) = outcome.action.filter(|_| !outcome.is_cancelled()) {
        print_info(&format!("Resolved the running VM with '{}'.", action));
    }
    match outcome.status {
        LaunchStatus::Ok => print_success(&outcome.message),
        LaunchStatus::Cancelled => print_info(&outcome.message),
        LaunchStatus::Error => print_error(&outcome.message),
        LaunchStatus::NeedsAction | LaunchStatus::Unknown => print_warn(&outcome.message),
    }
    if let Some(error) = outcome.error.as_deref()
        && error != outcome.message
    {
        print_error(error);
    }
}

/// `--action` answers the conflict up front; otherwise the operator is asked.
pub(crate) fn preset_or_prompt(preset: Option<ConflictAction>) -> Box<dyn ConflictResolver> {
    match preset {
        Some(action) => Box::new(action),
        None => Box::new(PromptResolver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::Conflict;

    #[test]
    fn preset_action_answers_without_prompting() {
        let resolver = preset_or_prompt(Some(ConflictAction::Hibernate));
        assert_eq!(
            resolver.resolve(&Conflict::default()),
            ConflictAction::Hibernate
        );
    }
}
