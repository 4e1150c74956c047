use anyhow::{Result, bail};

use crate::cli::launch::{preset_or_prompt, report_outcome};
use crate::cli::{has_flag, parse_action_flag};
use crate::core::launch::SHUTDOWN_CANCELLED;
use crate::core::session::VmSession;
use crate::core::terminal::{print_info, print_step};
use crate::core::transport::Transport;

pub async fn run_host_shutdown<T: Transport>(
    session: &mut VmSession<T>,
    args: &[String],
) -> Result<()> {
    let preset = match parse_action_flag(args) {
        Ok(preset) => preset,
        Err(raw) => bail!(
            "Unknown action '{}'. Expected shutdown, hibernate, terminate or cancel.",
            raw
        ),
    };

    if !has_flag(args, 2, &["--yes", "-y"]) {
        let confirmed = inquire::Confirm::new("Power off the VM host?")
            .with_default(false)
            .with_help_message("Running VMs must be stopped first; you will be asked how.")
            .prompt()?;
        if !confirmed {
            print_info(SHUTDOWN_CANCELLED);
            return Ok(());
        }
    }

    print_step("Requesting host shutdown");
    let resolver = preset_or_prompt(preset);
    let outcome = session.shutdown_host(&*resolver).await;
    report_outcome(&outcome);
    Ok(())
}
