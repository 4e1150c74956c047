use std::fmt;

use crate::core::launch::{Conflict, ConflictAction, ConflictResolver};

/// Asks on the terminal which action to take on the running VM. Escaping the prompt,
/// or any prompt failure, counts as cancel.
pub(crate) struct PromptResolver;

#[derive(Clone, Copy)]
struct ActionChoice(ConflictAction);

impl fmt::Display for ActionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {}", self.0.label(), self.0.description())
    }
}

impl ConflictResolver for PromptResolver {
    fn resolve(&self, conflict: &Conflict) -> ConflictAction {
        let options: Vec<ActionChoice> = prompt_options(conflict)
            .into_iter()
            .map(ActionChoice)
            .collect();
        let message = prompt_message(conflict);
        let mut select = inquire::Select::new(&message, options);
        if let Some(help) = conflict.message.as_deref() {
            select = select.with_help_message(help);
        }
        match select.prompt() {
            Ok(choice) => choice.0,
            Err(_) => ConflictAction::Cancel,
        }
    }
}

pub(crate) fn prompt_message(conflict: &Conflict) -> String {
    match &conflict.running_vm {
        Some(vm) => format!("{} is running. Choose an action for it:", vm),
        None => {
            "Another VM is running. Choose an action for the currently running VM:".to_string()
        }
    }
}

/// Offered actions with cancel always last.
pub(crate) fn prompt_options(conflict: &Conflict) -> Vec<ConflictAction> {
    let mut options = conflict.choices();
    options.push(ConflictAction::Cancel);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::RunningVm;

    #[test]
    fn message_names_running_vm() {
        let conflict = Conflict {
            running_vm: Some(RunningVm {
                vmid: 101,
                name: "alpha".to_string(),
            }),
            ..Conflict::default()
        };
        assert_eq!(
            prompt_message(&conflict),
            "alpha (#101) is running. Choose an action for it:"
        );
        assert!(prompt_message(&Conflict::default()).starts_with("Another VM is running."));
    }

    #[test]
    fn cancel_is_always_offered_last() {
        assert_eq!(
            prompt_options(&Conflict::default()),
            vec![
                ConflictAction::Shutdown,
                ConflictAction::Hibernate,
                ConflictAction::Terminate,
                ConflictAction::Cancel,
            ]
        );
        let narrowed = Conflict {
            allowed_actions: vec![ConflictAction::Cancel, ConflictAction::Terminate],
            ..Conflict::default()
        };
        assert_eq!(
            prompt_options(&narrowed),
            vec![ConflictAction::Terminate, ConflictAction::Cancel]
        );
    }
}
