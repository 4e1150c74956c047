mod fork;
mod launch;
mod list;
mod prompt;
mod shutdown;

use std::path::Path;

use anyhow::{Result, bail};
use console::style;
use inquire::InquireError;
use tracing::Level;

use crate::core::config::LauncherConfig;
use crate::core::launch::ConflictAction;
use crate::core::session::VmSession;
use crate::core::terminal::{GuideSection, print_status};
use crate::core::transport::HttpTransport;
use crate::logging;
use crate::platform::{NativePlatform, Platform};

/// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--server", "--timeout", "--action", "--name"];

fn print_help() {
    GuideSection::new("Inventory")
        .command("list", "Show the VMs the server knows about (--json for raw records)")
        .print();

    GuideSection::new("Lifecycle")
        .command("launch <vmid>", "Start a VM, resolving any running one first")
        .command("fork <vmid>", "Clone a VM under a new name (--name <name>)")
        .command(
            "host-shutdown",
            "Power off the host once no VM is running (--yes skips the confirm)",
        )
        .print();

    GuideSection::new("Setup")
        .command("config", "Show the effective configuration")
        .command("help", "Show this guide")
        .print();

    GuideSection::new("Options")
        .text("--server <url>     VM service address (default http://127.0.0.1:3000)")
        .text("--timeout <secs>   Per-request timeout")
        .text("--action <action>  shutdown | hibernate | terminate | cancel, skips the prompt")
        .text("--verbose, -v      Debug logging on stderr")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("vm-launcher").green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GlobalFlags {
    pub server: Option<String>,
    pub timeout_secs: Option<u64>,
    pub verbose: bool,
}

pub(crate) fn parse_global_flags(args: &[String], start: usize) -> GlobalFlags {
    let mut flags = GlobalFlags::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--server" => {
                if i + 1 < args.len() {
                    flags.server = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--timeout" => {
                if i + 1 < args.len() {
                    flags.timeout_secs = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                flags.verbose = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    flags
}

pub(crate) fn parse_string_flag(args: &[String], start: usize, flag: &str) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 < args.len() {
                return Some(args[i + 1].clone());
            }
            return None;
        }
        i += 1;
    }
    None
}

pub(crate) fn has_flag(args: &[String], start: usize, names: &[&str]) -> bool {
    args.iter()
        .skip(start)
        .any(|arg| names.contains(&arg.as_str()))
}

pub(crate) fn first_positional(args: &[String], start: usize) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_FLAGS.contains(&arg) {
            i += 2;
        } else if arg.starts_with('-') {
            i += 1;
        } else {
            return Some(arg.to_string());
        }
    }
    None
}

pub(crate) fn parse_vmid_arg(args: &[String]) -> Option<u64> {
    first_positional(args, 2)?.trim().parse().ok()
}

/// `Ok(None)` when `--action` is absent, `Err` with the raw text when it is unrecognized.
pub(crate) fn parse_action_flag(args: &[String]) -> Result<Option<ConflictAction>, String> {
    match parse_string_flag(args, 2, "--action") {
        Some(raw) => ConflictAction::parse(&raw).map(Some).ok_or(raw),
        None => Ok(None),
    }
}

fn show_config(config: &LauncherConfig, data_dir: &Path) {
    let config_path = LauncherConfig::path_in(data_dir);
    let file_state = if config_path.exists() {
        "present"
    } else {
        "absent, using defaults"
    };
    print_status(
        "Config file",
        &format!("{} ({})", config_path.display(), file_state),
    );
    print_status("Server", &config.server);
    print_status("Timeout", &format!("{}s", config.timeout().as_secs()));
    print_status("Log level", &config.log_level().to_string());
}

/// True when the operator backed out of an interactive prompt.
pub fn is_prompt_cancel(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("");
    if matches!(cmd, "" | "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let flags = parse_global_flags(&args, 2);
    let data_dir = NativePlatform::data_dir();
    let mut config = LauncherConfig::load(&data_dir).await?;
    config.apply_env();
    config.apply_server_override(flags.server.clone());
    if let Some(timeout_secs) = flags.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    logging::init(if flags.verbose {
        Level::DEBUG
    } else {
        config.log_level()
    });

    match cmd {
        "config" => {
            show_config(&config, &data_dir);
            return Ok(());
        }
        "list" | "ls" | "launch" | "fork" | "host-shutdown" => {}
        other => {
            print_help();
            bail!("Unknown command '{}'.", other);
        }
    }

    let transport = HttpTransport::new(config.timeout())?;
    let mut session = VmSession::connect(&config.server, transport)?;

    match cmd {
        "list" | "ls" => list::run_list(&mut session, has_flag(&args, 2, &["--json"])).await,
        "launch" => launch::run_launch(&mut session, &args).await,
        "fork" => fork::run_fork(&mut session, &args).await,
        "host-shutdown" => shutdown::run_host_shutdown(&mut session, &args).await,
        _ => Ok(()),
    }
}
