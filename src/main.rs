use vm_launcher::cli;
use vm_launcher::core::terminal;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_main().await {
        if cli::is_prompt_cancel(&e) {
            terminal::print_info("Cancelled.");
        } else {
            terminal::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
