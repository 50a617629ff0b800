use colored::Colorize;
use formprobe::command_argument_builder;
use formprobe::handlers::{
    handle_crawl, handle_payloads, handle_scan, init_logging, print_banner,
};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_logging(quiet, verbose);

    let result = match chosen_command.subcommand() {
        Some(("scan", primary_command)) => handle_scan(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("payloads", _)) => {
            handle_payloads();
            Ok(())
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
