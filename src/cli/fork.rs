use anyhow::{Result, bail};

use crate::cli::list::print_inventory;
use crate::cli::{parse_string_flag, parse_vmid_arg};
use crate::core::session::VmSession;
use crate::core::terminal::{print_step, print_success};
use crate::core::transport::Transport;

pub async fn run_fork<T: Transport>(session: &mut VmSession<T>, args: &[String]) -> Result<()> {
    let Some(vmid) = parse_vmid_arg(args) else {
        bail!("Usage: vm-launcher fork <vmid> --name <new-name>");
    };

    let name = match parse_string_flag(args, 2, "--name") {
        Some(name) => name,
        None => inquire::Text::new("Name for the new VM:")
            .with_default(&format!("vm-{}-copy", vmid))
            .prompt()?,
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("A name is required for the new VM.");
    }

    print_step(&format!("Forking VM {} as '{}'", vmid, name));
    let outcome = session.fork(vmid, &name).await;
    if !outcome.created {
        bail!(
            "Fork of VM {} failed: {}",
            vmid,
            outcome.error.as_deref().unwrap_or(&outcome.message)
        );
    }

    match outcome.new_vmid {
        Some(new_vmid) => print_success(&format!("{} New VM id: {}.", outcome.message, new_vmid)),
        None => print_success(&outcome.message),
    }
    print_inventory(session);
    Ok(())
}
