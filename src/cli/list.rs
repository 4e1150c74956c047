use anyhow::Result;
use console::style;

use crate::core::inventory::VmRecord;
use crate::core::session::VmSession;
use crate::core::terminal::{GuideSection, print_info};
use crate::core::transport::Transport;

pub async fn run_list<T: Transport>(session: &mut VmSession<T>, json: bool) -> Result<()> {
    session.refresh().await;
    if json {
        println!("{}", serde_json::to_string_pretty(session.vms())?);
        return Ok(());
    }
    print_inventory(session);
    Ok(())
}

pub(crate) fn print_inventory<T: Transport>(session: &VmSession<T>) {
    let vms = session.vms();
    let title = format!("VMs · {}", session.endpoint());
    if vms.is_empty() {
        GuideSection::new(&title)
            .text("No VMs reported by the server.")
            .print();
        println!();
        return;
    }

    let mut section = GuideSection::new(&title);
    for vm in vms {
        section = section.bullet(&format_vm_line(vm));
        if !vm.tags().is_empty() {
            section = section.text(&format!("  tags: {}", vm.tags().join(", ")));
        }
        if let Some(notes) = vm.notes() {
            let first = notes.lines().next().unwrap_or_default();
            section = section.text(&format!("  notes: {}", first));
        }
    }
    section.print();
    println!();
    print_info(&format!("Loaded {} VMs.", vms.len()));
}

pub(crate) fn format_vm_line(vm: &VmRecord) -> String {
    let status = vm.status();
    let styled_status = if vm.is_running() {
        style(status).green().bold().to_string()
    } else if status.eq_ignore_ascii_case("stopped") {
        style(status).dim().to_string()
    } else {
        style(status).yellow().to_string()
    };
    let kill = if vm.is_easy_kill() {
        format!(" {}", style("[EASY-KILL]").red())
    } else {
        String::new()
    };
    format!(
        "{} (#{}) - {}{}",
        style(vm.name()).white().bold(),
        vm.id(),
        styled_status,
        kill
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_line_matches_plain_layout() {
        console::set_colors_enabled(false);
        let vm = VmRecord::new(101, Some("web1".into()), Some("running".into()));
        assert_eq!(format_vm_line(&vm), "web1 (#101) - running");

        let vm = VmRecord::new(7, None, None).with_tags(vec!["easy-kill".into()]);
        assert_eq!(format_vm_line(&vm), "Unnamed (#7) - unknown [EASY-KILL]");
    }
}
